// Codec - Persisted form of a state graph
//
// Identity entities (parameters, states, bound methods, handles) are written
// once into per-kind record lists and referenced everywhere else through a
// shared object table. Table indices are assigned on first encounter:
// parameters, then states, then methods and handles in the order actions,
// conditions and arguments reach them. Scalars are stored as the JSON text of
// the typed value, with the empty string meaning "no value". Non-finite
// floats are written as `inf`, `-inf` and `nan`. Values in `any` slots carry
// their kind next to the text, and references they hold go through the object
// table like every other reference. Scalars are decoded eagerly at load, so
// malformed text fails the load instead of the first read.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use statecraft_types::{
    Handle, HandleId, MethodId, ParameterId, StateId, Value, ValueKind,
};

use crate::{ArgumentStyle, GraphError, MethodKey, MethodRegistry, StateGraph};

/// Version written to and accepted from the `format` field
pub const FORMAT_VERSION: u32 = 1;

/// Errors raised while saving or loading a graph
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Unsupported format version {0} (expected {FORMAT_VERSION})")]
    UnsupportedVersion(u32),
    #[error("Method {0} is not registered")]
    DanglingMethodReference(MethodKey),
    #[error("{method} expects {expected} arguments, saved graph has {actual}")]
    ArgumentCountMismatch {
        method: MethodKey,
        expected: usize,
        actual: usize,
    },
    #[error("Object index {0} does not resolve to a record")]
    DanglingObjectIndex(usize),
    #[error("Object {index} is a {actual}, expected a {expected}")]
    UnexpectedObject {
        index: usize,
        expected: ObjectKind,
        actual: ObjectKind,
    },
    #[error("Invalid object reference {0:?}")]
    InvalidReference(String),
    #[error("Invalid {kind} value {text:?}: {source}")]
    InvalidValue {
        kind: ValueKind,
        text: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

// ─────────────────────────────────────────────────────────────────────────────
// Persisted records
// ─────────────────────────────────────────────────────────────────────────────

/// Kind of entity an object-table entry points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Parameter,
    State,
    Method,
    Handle,
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ObjectKind::Parameter => "parameter",
            ObjectKind::State => "state",
            ObjectKind::Method => "method",
            ObjectKind::Handle => "handle",
        };
        f.write_str(name)
    }
}

/// Object-table entry: record list and position within it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub kind: ObjectKind,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ValueKind,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedTransition {
    pub to: usize,
    #[serde(default)]
    pub conditions: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedState {
    pub name: String,
    #[serde(default)]
    pub position: [f32; 2],
    #[serde(default)]
    pub actions: Vec<usize>,
    #[serde(default)]
    pub transitions: Vec<SavedTransition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedArgument {
    pub style: ArgumentStyle,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedMethod {
    pub module: String,
    pub method: String,
    #[serde(default)]
    pub arguments: Vec<SavedArgument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedHandle {
    pub type_id: String,
    pub id: HandleId,
}

/// Value stored in an `any` slot, encoded with its own kind's rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct AnyValue {
    kind: ValueKind,
    value: String,
}

/// Serializable snapshot of a [`StateGraph`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedGraph {
    pub format: u32,
    pub initial: Option<usize>,
    pub objects: Vec<ObjectRef>,
    #[serde(default)]
    pub parameters: Vec<SavedParameter>,
    #[serde(default)]
    pub states: Vec<SavedState>,
    #[serde(default)]
    pub methods: Vec<SavedMethod>,
    #[serde(default)]
    pub handles: Vec<SavedHandle>,
}

impl SavedGraph {
    /// Snapshot a graph
    pub fn from_graph(graph: &StateGraph) -> Result<Self, CodecError> {
        let saved = Encoder::new(graph).encode()?;
        info!(
            states = saved.states.len(),
            methods = saved.methods.len(),
            objects = saved.objects.len(),
            "Graph encoded"
        );
        Ok(saved)
    }

    /// Rebuild a graph, resolving methods against `registry`
    pub fn into_graph(self, registry: &MethodRegistry) -> Result<StateGraph, CodecError> {
        let graph = Decoder::new(&self, registry)?.decode()?;
        info!(
            states = self.states.len(),
            methods = self.methods.len(),
            "Graph decoded"
        );
        Ok(graph)
    }

    pub fn to_json(&self) -> Result<String, CodecError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, CodecError> {
        Ok(serde_json::from_str(text)?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Encoding
// ─────────────────────────────────────────────────────────────────────────────

struct Encoder<'g> {
    graph: &'g StateGraph,
    objects: Vec<ObjectRef>,
    parameter_index: HashMap<ParameterId, usize>,
    state_index: HashMap<StateId, usize>,
    method_index: HashMap<MethodId, usize>,
    handle_index: HashMap<HandleId, usize>,
    methods: Vec<Option<SavedMethod>>,
    handles: Vec<SavedHandle>,
}

impl<'g> Encoder<'g> {
    fn new(graph: &'g StateGraph) -> Self {
        Self {
            graph,
            objects: Vec::new(),
            parameter_index: HashMap::new(),
            state_index: HashMap::new(),
            method_index: HashMap::new(),
            handle_index: HashMap::new(),
            methods: Vec::new(),
            handles: Vec::new(),
        }
    }

    fn push_object(&mut self, kind: ObjectKind, index: usize) -> usize {
        self.objects.push(ObjectRef { kind, index });
        self.objects.len() - 1
    }

    fn encode(mut self) -> Result<SavedGraph, CodecError> {
        let graph = self.graph;

        let parameters: Vec<_> = graph.parameters().collect();
        for (position, (id, _)) in parameters.iter().enumerate() {
            let object = self.push_object(ObjectKind::Parameter, position);
            self.parameter_index.insert(*id, object);
        }
        let states: Vec<_> = graph.states().collect();
        for (position, (id, _)) in states.iter().enumerate() {
            let object = self.push_object(ObjectKind::State, position);
            self.state_index.insert(*id, object);
        }

        let mut saved_parameters = Vec::with_capacity(parameters.len());
        for (_, parameter) in &parameters {
            let value = self.encode_value(parameter.kind(), &parameter.value())?;
            saved_parameters.push(SavedParameter {
                name: parameter.name().to_string(),
                kind: parameter.kind().clone(),
                value,
            });
        }

        let mut saved_states = Vec::with_capacity(states.len());
        for (_, state) in &states {
            let mut actions = Vec::with_capacity(state.actions().len());
            for &action in state.actions() {
                actions.push(self.method(action)?);
            }
            let mut transitions = Vec::with_capacity(state.transitions().len());
            for transition in state.transitions() {
                let mut conditions = Vec::with_capacity(transition.conditions().len());
                for &condition in transition.conditions() {
                    conditions.push(self.method(condition)?);
                }
                let to = self.state(transition.to())?;
                transitions.push(SavedTransition { to, conditions });
            }
            saved_states.push(SavedState {
                name: state.name().to_string(),
                position: state.position(),
                actions,
                transitions,
            });
        }

        // methods no state reaches are still part of the graph
        for (id, _) in graph.methods() {
            self.method(id)?;
        }

        let initial = graph.initial().map(|id| self.state(id)).transpose()?;
        Ok(SavedGraph {
            format: FORMAT_VERSION,
            initial,
            objects: self.objects,
            parameters: saved_parameters,
            states: saved_states,
            methods: self.methods.into_iter().flatten().collect(),
            handles: self.handles,
        })
    }

    fn state(&self, id: StateId) -> Result<usize, CodecError> {
        self.state_index
            .get(&id)
            .copied()
            .ok_or(CodecError::Graph(GraphError::UnknownState(id)))
    }

    /// Object index of a bound method, writing its record on first encounter
    fn method(&mut self, id: MethodId) -> Result<usize, CodecError> {
        if let Some(&object) = self.method_index.get(&id) {
            return Ok(object);
        }
        let graph = self.graph;
        let method = graph
            .method(id)
            .ok_or(GraphError::UnknownMethod(id))?;

        let slot = self.methods.len();
        self.methods.push(None);
        let object = self.push_object(ObjectKind::Method, slot);
        self.method_index.insert(id, object);

        let mut arguments = Vec::with_capacity(method.arguments().len());
        for argument in method.arguments() {
            let value = match argument.style() {
                ArgumentStyle::Constant => self.encode_value(argument.kind(), &argument.value())?,
                ArgumentStyle::Parameter => match argument.parameter() {
                    Some(pid) => self
                        .parameter_index
                        .get(&pid)
                        .map(usize::to_string)
                        .unwrap_or_default(),
                    None => String::new(),
                },
                ArgumentStyle::Filter => match argument.filter() {
                    Some(filter) => self.method(filter)?.to_string(),
                    None => String::new(),
                },
            };
            arguments.push(SavedArgument {
                style: argument.style(),
                value,
            });
        }

        let key = method.key();
        self.methods[slot] = Some(SavedMethod {
            module: key.module,
            method: key.method,
            arguments,
        });
        Ok(object)
    }

    fn handle(&mut self, handle: &Handle) -> usize {
        if let Some(&object) = self.handle_index.get(&handle.id) {
            return object;
        }
        let slot = self.handles.len();
        self.handles.push(SavedHandle {
            type_id: handle.type_id.clone(),
            id: handle.id,
        });
        let object = self.push_object(ObjectKind::Handle, slot);
        self.handle_index.insert(handle.id, object);
        object
    }

    fn encode_value(&mut self, kind: &ValueKind, value: &Value) -> Result<String, CodecError> {
        let text = match (kind, value) {
            (_, Value::Null) => String::new(),
            (ValueKind::Any, other) => {
                let Some(inner) = other.kind() else {
                    return Ok(String::new());
                };
                let value = self.encode_value(&inner, other)?;
                serde_json::to_string(&AnyValue { kind: inner, value })?
            }
            (_, Value::Handle(handle)) => self.handle(handle).to_string(),
            (_, Value::Parameter(id)) => self
                .parameter_index
                .get(id)
                .ok_or(GraphError::MissingParameter(*id))?
                .to_string(),
            (_, Value::Method(id)) => self.method(*id)?.to_string(),
            (_, Value::Bool(v)) => serde_json::to_string(v)?,
            (_, Value::Int(v)) => serde_json::to_string(v)?,
            (_, Value::Long(v)) => serde_json::to_string(v)?,
            (_, Value::Float(v)) if !v.is_finite() => non_finite_text(f64::from(*v)).to_string(),
            (_, Value::Float(v)) => serde_json::to_string(v)?,
            (_, Value::Double(v)) if !v.is_finite() => non_finite_text(*v).to_string(),
            (_, Value::Double(v)) => serde_json::to_string(v)?,
            (_, Value::String(v)) => serde_json::to_string(v)?,
        };
        Ok(text)
    }
}

fn non_finite_text(v: f64) -> &'static str {
    if v.is_nan() {
        "nan"
    } else if v > 0.0 {
        "inf"
    } else {
        "-inf"
    }
}

fn non_finite_value(text: &str) -> Option<f64> {
    match text {
        "inf" => Some(f64::INFINITY),
        "-inf" => Some(f64::NEG_INFINITY),
        "nan" => Some(f64::NAN),
        _ => None,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Decoding
// ─────────────────────────────────────────────────────────────────────────────

struct Decoder<'s> {
    saved: &'s SavedGraph,
    registry: &'s MethodRegistry,
    graph: StateGraph,
    parameters: Vec<ParameterId>,
    states: Vec<StateId>,
    methods: Vec<MethodId>,
    handles: Vec<Handle>,
}

impl<'s> Decoder<'s> {
    fn new(saved: &'s SavedGraph, registry: &'s MethodRegistry) -> Result<Self, CodecError> {
        if saved.format != FORMAT_VERSION {
            return Err(CodecError::UnsupportedVersion(saved.format));
        }
        Ok(Self {
            saved,
            registry,
            graph: StateGraph::new(),
            parameters: Vec::new(),
            states: Vec::new(),
            methods: Vec::new(),
            handles: Vec::new(),
        })
    }

    fn decode(mut self) -> Result<StateGraph, CodecError> {
        let saved = self.saved;

        for (index, object) in saved.objects.iter().enumerate() {
            let len = match object.kind {
                ObjectKind::Parameter => saved.parameters.len(),
                ObjectKind::State => saved.states.len(),
                ObjectKind::Method => saved.methods.len(),
                ObjectKind::Handle => saved.handles.len(),
            };
            if object.index >= len {
                return Err(CodecError::DanglingObjectIndex(index));
            }
        }

        // First pass: create every entity so references can resolve
        for parameter in &saved.parameters {
            let id = self
                .graph
                .add_parameter(parameter.name.clone(), parameter.kind.clone())?;
            self.parameters.push(id);
        }
        for state in &saved.states {
            let id = self.graph.add_state(state.name.clone());
            if let Some(entry) = self.graph.state_mut(id) {
                entry.set_position(state.position);
            }
            self.states.push(id);
        }
        let registry = self.registry;
        for method in &saved.methods {
            let key = MethodKey::new(method.module.clone(), method.method.clone());
            let def = registry
                .get(&key)
                .ok_or_else(|| CodecError::DanglingMethodReference(key.clone()))?;
            if def.parameters.len() != method.arguments.len() {
                return Err(CodecError::ArgumentCountMismatch {
                    method: key,
                    expected: def.parameters.len(),
                    actual: method.arguments.len(),
                });
            }
            self.methods.push(self.graph.bind(std::sync::Arc::clone(def)));
        }
        self.handles = saved
            .handles
            .iter()
            .map(|h| Handle::with_id(h.id, h.type_id.clone()))
            .collect();

        // Second pass: values and links
        for (position, parameter) in saved.parameters.iter().enumerate() {
            if let Some(value) = self.decode_value(&parameter.kind, &parameter.value)? {
                let id = self.parameters[position];
                self.graph
                    .parameter_mut(id)
                    .ok_or(GraphError::MissingParameter(id))?
                    .set_value(value)
                    .map_err(GraphError::from)?;
            }
        }

        for (position, method) in saved.methods.iter().enumerate() {
            let id = self.methods[position];
            for (index, argument) in method.arguments.iter().enumerate() {
                let value = match argument.style {
                    ArgumentStyle::Constant => {
                        let kind = self
                            .graph
                            .method(id)
                            .and_then(|m| m.argument(index))
                            .map(|a| a.kind().clone())
                            .ok_or(GraphError::UnknownArgument { method: id, index })?;
                        self.decode_value(&kind, &argument.value)?
                    }
                    ArgumentStyle::Parameter => self
                        .reference(&argument.value)?
                        .map(|object| self.parameter(object).map(Value::Parameter))
                        .transpose()?,
                    ArgumentStyle::Filter => self
                        .reference(&argument.value)?
                        .map(|object| self.method(object).map(Value::Method))
                        .transpose()?,
                };
                match (argument.style, value) {
                    // unset constants keep the kind's default
                    (ArgumentStyle::Constant, None) => {}
                    (style, value) => {
                        self.graph
                            .set_argument(id, index, style, value.unwrap_or_default())?;
                    }
                }
            }
        }

        for (position, state) in saved.states.iter().enumerate() {
            let id = self.states[position];
            for &action in &state.actions {
                let method = self.method(action)?;
                self.graph.add_action(id, method)?;
            }
            for transition in &state.transitions {
                let to = self.state(transition.to)?;
                let index = self.graph.add_transition(id, to)?;
                for &condition in &transition.conditions {
                    let method = self.method(condition)?;
                    self.graph.add_condition(id, index, method)?;
                }
            }
        }

        if let Some(initial) = saved.initial {
            let initial = self.state(initial)?;
            self.graph.set_initial(initial)?;
        }

        debug!(objects = saved.objects.len(), "Object table resolved");
        Ok(self.graph)
    }

    fn object(&self, index: usize, expected: ObjectKind) -> Result<usize, CodecError> {
        let object = self
            .saved
            .objects
            .get(index)
            .ok_or(CodecError::DanglingObjectIndex(index))?;
        if object.kind != expected {
            return Err(CodecError::UnexpectedObject {
                index,
                expected,
                actual: object.kind,
            });
        }
        Ok(object.index)
    }

    fn parameter(&self, index: usize) -> Result<ParameterId, CodecError> {
        Ok(self.parameters[self.object(index, ObjectKind::Parameter)?])
    }

    fn state(&self, index: usize) -> Result<StateId, CodecError> {
        Ok(self.states[self.object(index, ObjectKind::State)?])
    }

    fn method(&self, index: usize) -> Result<MethodId, CodecError> {
        Ok(self.methods[self.object(index, ObjectKind::Method)?])
    }

    fn handle(&self, index: usize) -> Result<Handle, CodecError> {
        Ok(self.handles[self.object(index, ObjectKind::Handle)?].clone())
    }

    /// Object index stored as text; empty means unbound
    fn reference(&self, text: &str) -> Result<Option<usize>, CodecError> {
        if text.is_empty() {
            return Ok(None);
        }
        text.parse()
            .map(Some)
            .map_err(|_| CodecError::InvalidReference(text.to_string()))
    }

    fn required(&self, text: &str) -> Result<usize, CodecError> {
        self.reference(text)?
            .ok_or_else(|| CodecError::InvalidReference(text.to_string()))
    }

    /// Decode a stored value; `None` leaves the slot at its default
    fn decode_value(&self, kind: &ValueKind, text: &str) -> Result<Option<Value>, CodecError> {
        if text.is_empty() {
            return Ok(None);
        }
        let invalid = |source| CodecError::InvalidValue {
            kind: kind.clone(),
            text: text.to_string(),
            source,
        };
        let value = match kind {
            ValueKind::Bool => Value::Bool(serde_json::from_str(text).map_err(invalid)?),
            ValueKind::Int => Value::Int(serde_json::from_str(text).map_err(invalid)?),
            ValueKind::Long => Value::Long(serde_json::from_str(text).map_err(invalid)?),
            ValueKind::Float => match non_finite_value(text) {
                Some(v) => Value::Float(v as f32),
                None => Value::Float(serde_json::from_str(text).map_err(invalid)?),
            },
            ValueKind::Double => match non_finite_value(text) {
                Some(v) => Value::Double(v),
                None => Value::Double(serde_json::from_str(text).map_err(invalid)?),
            },
            ValueKind::String => Value::String(serde_json::from_str(text).map_err(invalid)?),
            ValueKind::Any => {
                let any: AnyValue = serde_json::from_str(text).map_err(invalid)?;
                if any.kind == ValueKind::Any {
                    return Err(CodecError::InvalidReference(text.to_string()));
                }
                return self.decode_value(&any.kind, &any.value);
            }
            ValueKind::Object(_) => Value::Handle(self.handle(self.required(text)?)?),
            ValueKind::Parameter => Value::Parameter(self.parameter(self.required(text)?)?),
            ValueKind::Method => Value::Method(self.method(self.required(text)?)?),
        };
        Ok(Some(value))
    }
}
