// Graph entities - parameters, arguments, bound methods, states, transitions
//
// These are owned by `StateGraph`. Structural mutation that has to keep graph
// invariants (argument binding, action/condition lists) goes through the
// graph; the entities expose read access and the edits that are always safe.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use statecraft_types::{MethodId, ParameterId, StateId, Value, ValueCell, ValueError, ValueKind};

use crate::{MethodDef, MethodKey};

// ─────────────────────────────────────────────────────────────────────────────
// Parameter
// ─────────────────────────────────────────────────────────────────────────────

/// A named, typed machine variable referenced by Parameter-style arguments
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: String,
    kind: ValueKind,
    cell: ValueCell,
}

impl Parameter {
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            cell: ValueCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared kind
    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }

    /// Current value (the kind's default until assigned)
    pub fn value(&self) -> Value {
        self.cell.get(&self.kind)
    }

    /// Current value, caching the default on first read
    pub fn materialize(&mut self) -> &Value {
        self.cell.materialize(&self.kind)
    }

    /// Assign a value; its kind must equal the declared kind
    pub fn set_value(&mut self, value: Value) -> Result<(), ValueError> {
        self.cell.set(&self.kind, value)
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Change the declared kind; the next read re-materializes
    pub(crate) fn set_kind(&mut self, kind: ValueKind) {
        self.kind = kind;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Argument
// ─────────────────────────────────────────────────────────────────────────────

/// Where an argument takes its value from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgumentStyle {
    /// Literal value stored in the argument
    #[default]
    Constant,
    /// Live reference to a machine parameter
    Parameter,
    /// Nested call to another bound method
    Filter,
}

/// One typed input of a bound method call
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    name: String,
    kind: ValueKind,
    style: ArgumentStyle,
    cell: ValueCell,
}

impl Argument {
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            style: ArgumentStyle::Constant,
            cell: ValueCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Kind the bound method expects for this argument
    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }

    pub fn style(&self) -> ArgumentStyle {
        self.style
    }

    /// Kind of the stored value, derived from the style
    pub fn effective_kind(&self) -> ValueKind {
        match self.style {
            ArgumentStyle::Constant => self.kind.clone(),
            ArgumentStyle::Parameter => ValueKind::Parameter,
            ArgumentStyle::Filter => ValueKind::Method,
        }
    }

    /// Stored value (default of the effective kind until assigned)
    pub fn value(&self) -> Value {
        self.cell.get(&self.effective_kind())
    }

    /// Stored value, caching the default on first read
    pub fn materialize(&mut self) -> &Value {
        let kind = self.effective_kind();
        self.cell.materialize(&kind)
    }

    /// Referenced parameter, for Parameter-style arguments
    pub fn parameter(&self) -> Option<ParameterId> {
        match self.style {
            ArgumentStyle::Parameter => self.value().as_parameter(),
            _ => None,
        }
    }

    /// Referenced bound method, for Filter-style arguments
    pub fn filter(&self) -> Option<MethodId> {
        match self.style {
            ArgumentStyle::Filter => self.value().as_method(),
            _ => None,
        }
    }

    pub(crate) fn set_style(&mut self, style: ArgumentStyle) {
        self.style = style;
    }

    /// Drop the stored reference or value, keeping the style
    pub(crate) fn unbind(&mut self) {
        self.cell.clear();
    }

    /// Assign against the style-derived kind
    pub(crate) fn set_value(&mut self, value: Value) -> Result<(), ValueError> {
        let kind = self.effective_kind();
        self.cell.set(&kind, value)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Bound Method
// ─────────────────────────────────────────────────────────────────────────────

/// A registry entry paired with one argument per declared parameter
#[derive(Debug, Clone)]
pub struct Method {
    def: Arc<MethodDef>,
    pub(crate) arguments: Vec<Argument>,
}

impl Method {
    /// Bind a registry entry with default Constant arguments
    pub fn bind(def: Arc<MethodDef>) -> Self {
        let arguments = def
            .parameters
            .iter()
            .map(|p| Argument::new(p.name.clone(), p.kind.clone()))
            .collect();
        Self { def, arguments }
    }

    pub fn def(&self) -> &Arc<MethodDef> {
        &self.def
    }

    pub fn key(&self) -> MethodKey {
        self.def.key()
    }

    pub fn display_name(&self) -> &str {
        &self.def.display_name
    }

    pub fn is_action(&self) -> bool {
        self.def.is_action()
    }

    pub fn returns(&self) -> Option<&ValueKind> {
        self.def.returns.as_ref()
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    pub fn argument(&self, index: usize) -> Option<&Argument> {
        self.arguments.get(index)
    }

    pub(crate) fn argument_mut(&mut self, index: usize) -> Option<&mut Argument> {
        self.arguments.get_mut(index)
    }

    /// Methods referenced by Filter-style arguments
    pub fn filters(&self) -> impl Iterator<Item = MethodId> + '_ {
        self.arguments.iter().filter_map(Argument::filter)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// State & Transition
// ─────────────────────────────────────────────────────────────────────────────

/// Directed edge gated by an ordered list of conditions
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    from: StateId,
    to: StateId,
    pub(crate) conditions: Vec<MethodId>,
}

impl Transition {
    pub(crate) fn new(from: StateId, to: StateId) -> Self {
        Self {
            from,
            to,
            conditions: Vec::new(),
        }
    }

    pub fn from(&self) -> StateId {
        self.from
    }

    pub fn to(&self) -> StateId {
        self.to
    }

    pub fn conditions(&self) -> &[MethodId] {
        &self.conditions
    }
}

/// A named node with entry actions and outgoing transitions
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    name: String,
    position: [f32; 2],
    pub(crate) actions: Vec<MethodId>,
    pub(crate) transitions: Vec<Transition>,
}

impl State {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            position: [0.0, 0.0],
            actions: Vec::new(),
            transitions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Editor layout position
    pub fn position(&self) -> [f32; 2] {
        self.position
    }

    pub fn set_position(&mut self, position: [f32; 2]) {
        self.position = position;
    }

    pub fn actions(&self) -> &[MethodId] {
        &self.actions
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }
}
