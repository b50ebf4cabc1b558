// Method Registry - Stores callable method definitions and their invokers
//
// The registry holds every method exposed by the host's modules. Each entry
// has a definition (identity, display name, signature) and an invoker thunk.
// Entries are collected by explicit static registration: modules generated
// by `#[module]` hand over their definitions when the registry is built.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use tracing::{debug, info};

use statecraft_types::{Conversion, ConversionError, Typed, Value, ValueKind};

// ─────────────────────────────────────────────────────────────────────────────
// Method Identity
// ─────────────────────────────────────────────────────────────────────────────

/// Stable identity of a registered method: declaring module plus native name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodKey {
    pub module: String,
    pub method: String,
}

impl MethodKey {
    pub fn new(module: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            method: method.into(),
        }
    }
}

impl std::fmt::Display for MethodKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}::{}", self.module, self.method)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Method Invoker
// ─────────────────────────────────────────────────────────────────────────────

/// Errors raised by a method thunk
#[derive(Debug, thiserror::Error)]
pub enum MethodError {
    #[error("Expected {expected} arguments, got {actual}")]
    Arity { expected: usize, actual: usize },
    #[error("Missing argument '{0}'")]
    MissingArgument(String),
    #[error("Invalid argument '{name}': {source}")]
    Argument {
        name: String,
        #[source]
        source: ConversionError,
    },
    #[error("{0}")]
    Failed(String),
}

/// Trait for invoking a registered method with positional values
pub trait MethodInvoker: Send + Sync {
    fn invoke(&self, args: &[Value]) -> Result<Value, MethodError>;
}

/// Function-based invoker (what `#[module]` generates)
pub struct FnMethodInvoker<F>
where
    F: Fn(&[Value]) -> Result<Value, MethodError> + Send + Sync,
{
    func: F,
}

impl<F> FnMethodInvoker<F>
where
    F: Fn(&[Value]) -> Result<Value, MethodError> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> MethodInvoker for FnMethodInvoker<F>
where
    F: Fn(&[Value]) -> Result<Value, MethodError> + Send + Sync,
{
    fn invoke(&self, args: &[Value]) -> Result<Value, MethodError> {
        (self.func)(args)
    }
}

/// Pull the next positional argument and extract it as `T`
///
/// Used by generated thunks.
pub fn take_argument<T, I>(args: &mut I, name: &str) -> Result<T, MethodError>
where
    T: Typed,
    I: Iterator<Item = Value>,
{
    let value = args
        .next()
        .ok_or_else(|| MethodError::MissingArgument(name.to_string()))?;
    T::from_value(value).map_err(|source| MethodError::Argument {
        name: name.to_string(),
        source,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Method Definitions
// ─────────────────────────────────────────────────────────────────────────────

/// A declared method parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDef {
    pub name: String,
    pub kind: ValueKind,
}

impl ParamDef {
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Definition of a callable method (one registry entry)
pub struct MethodDef {
    /// Declaring module name
    pub module: String,
    /// Native method name
    pub method: String,
    /// Display name from the `#[method]` annotation
    pub display_name: String,
    /// Doc comment of the method, if any
    pub description: Option<String>,
    /// Return kind; `None` marks an action
    pub returns: Option<ValueKind>,
    /// Ordered parameter list
    pub parameters: Vec<ParamDef>,
    /// Invocation thunk
    pub invoker: Arc<dyn MethodInvoker>,
}

impl MethodDef {
    /// Define a method backed by a closure
    pub fn from_fn<F>(
        key: MethodKey,
        display_name: impl Into<String>,
        returns: Option<ValueKind>,
        parameters: Vec<ParamDef>,
        func: F,
    ) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, MethodError> + Send + Sync + 'static,
    {
        Self {
            module: key.module,
            method: key.method,
            display_name: display_name.into(),
            description: None,
            returns,
            parameters,
            invoker: Arc::new(FnMethodInvoker::new(func)),
        }
    }

    pub fn key(&self) -> MethodKey {
        MethodKey::new(self.module.clone(), self.method.clone())
    }

    /// Actions return nothing and are invoked for their side effect
    pub fn is_action(&self) -> bool {
        self.returns.is_none()
    }

    /// Whether this method's result can feed a slot of `kind`
    pub fn can_produce(&self, kind: &ValueKind) -> bool {
        self.returns
            .as_ref()
            .is_some_and(|returns| Conversion::global().can_convert(returns, kind))
    }

    /// Invoke with resolved positional values
    pub fn invoke(&self, args: &[Value]) -> Result<Value, MethodError> {
        if args.len() != self.parameters.len() {
            return Err(MethodError::Arity {
                expected: self.parameters.len(),
                actual: args.len(),
            });
        }
        self.invoker.invoke(args)
    }
}

impl std::fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodDef")
            .field("module", &self.module)
            .field("method", &self.method)
            .field("display_name", &self.display_name)
            .field("returns", &self.returns)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Modules
// ─────────────────────────────────────────────────────────────────────────────

/// A host capability provider exposing callable methods
///
/// Implemented by the `#[module]` attribute macro.
pub trait Module {
    fn module_name() -> &'static str;
    fn methods() -> Vec<MethodDef>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Method Registry
// ─────────────────────────────────────────────────────────────────────────────

/// Errors raised while building or installing a registry
#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    #[error("Method registered twice: {0}")]
    DuplicateMethod(MethodKey),
    #[error("A global method registry is already installed")]
    AlreadyInstalled,
}

/// Collects modules before discovery
#[derive(Default)]
pub struct RegistryBuilder {
    sources: Vec<(&'static str, fn() -> Vec<MethodDef>)>,
    extra: Vec<MethodDef>,
}

impl RegistryBuilder {
    /// Add every method of a module
    pub fn module<M: Module>(mut self) -> Self {
        self.sources
            .push((M::module_name(), M::methods as fn() -> Vec<MethodDef>));
        self
    }

    /// Add a single hand-written definition
    pub fn method(mut self, def: MethodDef) -> Self {
        self.extra.push(def);
        self
    }

    /// Enumerate all modules and build the registry
    pub fn discover(self) -> Result<MethodRegistry, RegistryError> {
        let mut registry = MethodRegistry::new();
        for (module, methods) in self.sources {
            let defs = methods();
            debug!(module, count = defs.len(), "Discovered module methods");
            for def in defs {
                registry.register(def)?;
            }
        }
        for def in self.extra {
            registry.register(def)?;
        }
        info!("Method registry ready with {} methods", registry.len());
        Ok(registry)
    }
}

/// Registry of all callable methods, in discovery order
#[derive(Debug, Default)]
pub struct MethodRegistry {
    entries: Vec<Arc<MethodDef>>,
    by_key: HashMap<MethodKey, usize>,
}

static GLOBAL: OnceLock<Arc<MethodRegistry>> = OnceLock::new();

impl MethodRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Start collecting modules
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Install the process-wide registry (once)
    pub fn install(registry: MethodRegistry) -> Result<Arc<MethodRegistry>, RegistryError> {
        let registry = Arc::new(registry);
        GLOBAL
            .set(Arc::clone(&registry))
            .map_err(|_| RegistryError::AlreadyInstalled)?;
        Ok(registry)
    }

    /// The process-wide registry, if installed
    pub fn global() -> Option<Arc<MethodRegistry>> {
        GLOBAL.get().cloned()
    }

    /// Register a method definition
    pub fn register(&mut self, def: MethodDef) -> Result<(), RegistryError> {
        let key = def.key();
        if self.by_key.contains_key(&key) {
            return Err(RegistryError::DuplicateMethod(key));
        }
        self.by_key.insert(key, self.entries.len());
        self.entries.push(Arc::new(def));
        Ok(())
    }

    /// Get a method definition by identity
    pub fn get(&self, key: &MethodKey) -> Option<&Arc<MethodDef>> {
        self.by_key.get(key).map(|&i| &self.entries[i])
    }

    /// Get a method definition by module and native name
    pub fn find(&self, module: &str, method: &str) -> Option<&Arc<MethodDef>> {
        self.get(&MethodKey::new(module, method))
    }

    /// Display name for a method identity (empty if unknown)
    pub fn display_name(&self, key: &MethodKey) -> &str {
        self.get(key).map(|d| d.display_name.as_str()).unwrap_or("")
    }

    /// All methods, in discovery order
    pub fn methods(&self) -> impl Iterator<Item = &Arc<MethodDef>> {
        self.entries.iter()
    }

    /// Methods with no return value
    pub fn actions(&self) -> Vec<&Arc<MethodDef>> {
        self.entries.iter().filter(|d| d.is_action()).collect()
    }

    /// Methods whose result can stand in for a value of `kind`
    pub fn filters(&self, kind: &ValueKind) -> Vec<&Arc<MethodDef>> {
        self.entries.iter().filter(|d| d.can_produce(kind)).collect()
    }

    /// Methods usable as transition conditions
    pub fn conditions(&self) -> Vec<&Arc<MethodDef>> {
        self.filters(&ValueKind::Bool)
    }

    /// Get all module names
    pub fn modules(&self) -> Vec<String> {
        let mut modules: Vec<_> = self.entries.iter().map(|d| d.module.clone()).collect();
        modules.sort();
        modules.dedup();
        modules
    }

    /// Get method count
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module;

    struct Probe;

    #[module(name = "Probe")]
    impl Probe {
        /// Always holds.
        #[method(name = "Probe/always")]
        fn always() -> bool {
            true
        }

        #[method("Probe/count")]
        fn count() -> i32 {
            3
        }

        #[method(name = "Probe/scale")]
        fn scale(value: f64, factor: f64) -> f64 {
            value * factor
        }

        #[method(name = "Probe/log")]
        fn log(_message: String) {}

        #[allow(dead_code)]
        fn helper() -> i32 {
            0
        }
    }

    fn registry() -> MethodRegistry {
        MethodRegistry::builder().module::<Probe>().discover().unwrap()
    }

    #[test]
    fn test_empty_registry() {
        let registry = MethodRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_discovers_only_annotated_methods() {
        let registry = registry();
        assert_eq!(registry.len(), 4);
        assert!(registry.find("Probe", "helper").is_none());
        assert_eq!(registry.modules(), vec!["Probe".to_string()]);
    }

    #[test]
    fn test_captures_signature() {
        let registry = registry();
        let scale = registry.find("Probe", "scale").unwrap();
        assert_eq!(scale.display_name, "Probe/scale");
        assert_eq!(scale.returns, Some(ValueKind::Double));
        assert_eq!(
            scale.parameters,
            vec![
                ParamDef::new("value", ValueKind::Double),
                ParamDef::new("factor", ValueKind::Double),
            ]
        );

        let always = registry.find("Probe", "always").unwrap();
        assert_eq!(always.description.as_deref(), Some("Always holds."));

        let log = registry.find("Probe", "log").unwrap();
        assert!(log.is_action());
        assert_eq!(log.parameters[0].name, "message");
    }

    #[test]
    fn test_actions_and_filters() {
        let registry = registry();
        let actions: Vec<_> = registry.actions().iter().map(|d| d.method.clone()).collect();
        assert_eq!(actions, vec!["log".to_string()]);

        let conditions: Vec<_> = registry
            .conditions()
            .iter()
            .map(|d| d.method.clone())
            .collect();
        assert_eq!(conditions, vec!["always".to_string()]);

        // int and double results both feed a float slot; bool does not.
        let float_filters: Vec<_> = registry
            .filters(&ValueKind::Float)
            .iter()
            .map(|d| d.method.clone())
            .collect();
        assert_eq!(float_filters, vec!["count".to_string(), "scale".to_string()]);

        // every method with a result feeds an any slot, bool ones included
        let any_filters: Vec<_> = registry
            .filters(&ValueKind::Any)
            .iter()
            .map(|d| d.method.clone())
            .collect();
        assert_eq!(any_filters, vec!["always", "count", "scale"]);
    }

    #[test]
    fn test_global_registry_installs_once() {
        let installed = MethodRegistry::install(registry()).unwrap();
        let global = MethodRegistry::global().unwrap();
        assert!(Arc::ptr_eq(&installed, &global));
        assert!(global.find("Probe", "scale").is_some());

        let again = MethodRegistry::install(MethodRegistry::new());
        assert!(matches!(again, Err(RegistryError::AlreadyInstalled)));
        assert_eq!(MethodRegistry::global().unwrap().len(), 4);
    }

    #[test]
    fn test_display_name_lookup() {
        let registry = registry();
        assert_eq!(
            registry.display_name(&MethodKey::new("Probe", "count")),
            "Probe/count"
        );
        assert_eq!(registry.display_name(&MethodKey::new("Probe", "gone")), "");
    }

    #[test]
    fn test_generated_thunk_invokes_with_coercion() {
        let registry = registry();
        let scale = registry.find("Probe", "scale").unwrap();
        let result = scale.invoke(&[Value::Int(4), Value::Double(0.5)]).unwrap();
        assert_eq!(result, Value::Double(2.0));

        let err = scale.invoke(&[Value::Int(4)]).unwrap_err();
        assert!(matches!(err, MethodError::Arity { expected: 2, actual: 1 }));

        let err = scale
            .invoke(&[Value::from("x"), Value::Double(1.0)])
            .unwrap_err();
        assert!(matches!(err, MethodError::Argument { ref name, .. } if name == "value"));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let result = MethodRegistry::builder()
            .module::<Probe>()
            .module::<Probe>()
            .discover();
        assert!(matches!(result, Err(RegistryError::DuplicateMethod(_))));
    }

    #[test]
    fn test_hand_written_definition() {
        let registry = MethodRegistry::builder()
            .method(MethodDef::from_fn(
                MethodKey::new("Manual", "answer"),
                "Manual/answer",
                Some(ValueKind::Int),
                vec![],
                |_| Ok(Value::Int(42)),
            ))
            .discover()
            .unwrap();
        let def = registry.find("Manual", "answer").unwrap();
        assert_eq!(def.invoke(&[]).unwrap(), Value::Int(42));
    }
}
