// State Graph - Arena of parameters, states and bound methods
//
// Every identity-bearing entity lives in an arena slot and is referenced
// elsewhere by id. Removing an entity leaves a tombstone so other ids stay
// valid. States own their outgoing transitions; transitions only name their
// target.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use statecraft_types::{
    Conversion, MethodId, ParameterId, StateId, Value, ValueError, ValueKind,
};

use crate::{Argument, ArgumentStyle, Method, MethodDef, Parameter, State, Transition};

// ─────────────────────────────────────────────────────────────────────────────
// Graph Error
// ─────────────────────────────────────────────────────────────────────────────

/// Errors raised by graph editing operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    #[error("Parameter not found: {0}")]
    UnknownParameter(String),
    #[error("Parameter not found: {0}")]
    MissingParameter(ParameterId),
    #[error("Parameter already exists: {0}")]
    DuplicateParameter(String),
    #[error("Parameters cannot be declared as {0}")]
    InvalidParameterKind(ValueKind),
    #[error("State not found: {0}")]
    UnknownState(StateId),
    #[error("Method not found: {0}")]
    UnknownMethod(MethodId),
    #[error("{state} has no transition at index {index}")]
    UnknownTransition { state: StateId, index: usize },
    #[error("{state} has no action at index {index}")]
    UnknownAction { state: StateId, index: usize },
    #[error("{method} has no argument at index {index}")]
    UnknownArgument { method: MethodId, index: usize },
    #[error("'{0}' returns a value and cannot be used as an action")]
    NotAnAction(String),
    #[error("'{0}' does not produce a boolean and cannot be used as a condition")]
    NotACondition(String),
    #[error("Parameter '{parameter}' cannot feed an argument of kind {expected}")]
    IncompatibleParameter { parameter: String, expected: ValueKind },
    #[error("'{method}' cannot feed an argument of kind {expected}")]
    IncompatibleFilter { method: String, expected: ValueKind },
    #[error("Binding {0} as a filter would create a cycle")]
    FilterCycle(MethodId),
    #[error(transparent)]
    Value(#[from] ValueError),
}

// ─────────────────────────────────────────────────────────────────────────────
// State Graph
// ─────────────────────────────────────────────────────────────────────────────

/// Editable definition of a state machine
#[derive(Debug, Clone, Default)]
pub struct StateGraph {
    parameters: Vec<Option<Parameter>>,
    states: Vec<Option<State>>,
    methods: Vec<Option<Method>>,
    initial: Option<StateId>,
}

impl StateGraph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    // ── Parameters ──────────────────────────────────────────────────────────

    /// Declare a parameter; names are unique
    pub fn add_parameter(
        &mut self,
        name: impl Into<String>,
        kind: ValueKind,
    ) -> Result<ParameterId, GraphError> {
        let name = name.into();
        if matches!(kind, ValueKind::Parameter | ValueKind::Method) {
            return Err(GraphError::InvalidParameterKind(kind));
        }
        if self.parameter_id(&name).is_some() {
            return Err(GraphError::DuplicateParameter(name));
        }
        let id = ParameterId::from_index(self.parameters.len());
        debug!(%id, %name, %kind, "Parameter added");
        self.parameters.push(Some(Parameter::new(name, kind)));
        Ok(id)
    }

    pub fn parameter(&self, id: ParameterId) -> Option<&Parameter> {
        self.parameters.get(id.index()).and_then(Option::as_ref)
    }

    pub fn parameter_mut(&mut self, id: ParameterId) -> Option<&mut Parameter> {
        self.parameters.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Look up a parameter by name
    pub fn parameter_id(&self, name: &str) -> Option<ParameterId> {
        self.parameters()
            .find(|(_, p)| p.name() == name)
            .map(|(id, _)| id)
    }

    /// Live parameters in declaration order
    pub fn parameters(&self) -> impl Iterator<Item = (ParameterId, &Parameter)> {
        self.parameters
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.as_ref().map(|p| (ParameterId::from_index(i), p)))
    }

    /// Assign a parameter by name
    pub fn set_parameter(&mut self, name: &str, value: Value) -> Result<(), GraphError> {
        let id = self
            .parameter_id(name)
            .ok_or_else(|| GraphError::UnknownParameter(name.to_string()))?;
        self.parameters[id.index()]
            .as_mut()
            .ok_or(GraphError::MissingParameter(id))?
            .set_value(value)?;
        Ok(())
    }

    /// Change a parameter's declared kind
    pub fn set_parameter_kind(
        &mut self,
        id: ParameterId,
        kind: ValueKind,
    ) -> Result<(), GraphError> {
        if matches!(kind, ValueKind::Parameter | ValueKind::Method) {
            return Err(GraphError::InvalidParameterKind(kind));
        }
        self.parameter_mut(id)
            .ok_or(GraphError::MissingParameter(id))?
            .set_kind(kind);
        Ok(())
    }

    /// Remove a parameter; arguments referencing it become unbound
    pub fn remove_parameter(&mut self, id: ParameterId) -> Option<Parameter> {
        let removed = self.parameters.get_mut(id.index())?.take()?;
        for method in self.methods.iter_mut().flatten() {
            for arg in method.arguments.iter_mut() {
                if arg.parameter() == Some(id) {
                    arg.unbind();
                }
            }
        }
        Some(removed)
    }

    // ── States ──────────────────────────────────────────────────────────────

    /// Add a state; the first state added becomes the initial state
    pub fn add_state(&mut self, name: impl Into<String>) -> StateId {
        let id = StateId::from_index(self.states.len());
        self.states.push(Some(State::new(name)));
        if self.initial.is_none() {
            self.initial = Some(id);
        }
        id
    }

    pub fn state(&self, id: StateId) -> Option<&State> {
        self.states.get(id.index()).and_then(Option::as_ref)
    }

    /// Mutable access for renaming and layout
    pub fn state_mut(&mut self, id: StateId) -> Option<&mut State> {
        self.states.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// First state with the given name
    pub fn state_id(&self, name: &str) -> Option<StateId> {
        self.states().find(|(_, s)| s.name() == name).map(|(id, _)| id)
    }

    /// Live states in creation order
    pub fn states(&self) -> impl Iterator<Item = (StateId, &State)> {
        self.states
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|s| (StateId::from_index(i), s)))
    }

    pub fn initial(&self) -> Option<StateId> {
        self.initial
    }

    pub fn set_initial(&mut self, id: StateId) -> Result<(), GraphError> {
        if self.state(id).is_none() {
            return Err(GraphError::UnknownState(id));
        }
        self.initial = Some(id);
        Ok(())
    }

    /// Remove a state together with every transition that targets it
    pub fn remove_state(&mut self, id: StateId) -> Option<State> {
        let removed = self.states.get_mut(id.index())?.take()?;
        for state in self.states.iter_mut().flatten() {
            state.transitions.retain(|t| t.to() != id);
        }
        if self.initial == Some(id) {
            let first = self.states().next().map(|(first, _)| first);
            self.initial = first;
        }
        Some(removed)
    }

    // ── Bound methods ───────────────────────────────────────────────────────

    /// Bind a registry entry; arguments start as Constant defaults
    pub fn bind(&mut self, def: Arc<MethodDef>) -> MethodId {
        let id = MethodId::from_index(self.methods.len());
        debug!(%id, method = %def.key(), "Method bound");
        self.methods.push(Some(Method::bind(def)));
        id
    }

    pub fn method(&self, id: MethodId) -> Option<&Method> {
        self.methods.get(id.index()).and_then(Option::as_ref)
    }

    /// Live bound methods in creation order
    pub fn methods(&self) -> impl Iterator<Item = (MethodId, &Method)> {
        self.methods
            .iter()
            .enumerate()
            .filter_map(|(i, m)| m.as_ref().map(|m| (MethodId::from_index(i), m)))
    }

    /// Remove a bound method, detaching it from actions, conditions and filters
    pub fn remove_method(&mut self, id: MethodId) -> Option<Method> {
        let removed = self.methods.get_mut(id.index())?.take()?;
        for state in self.states.iter_mut().flatten() {
            state.actions.retain(|&m| m != id);
            for transition in state.transitions.iter_mut() {
                transition.conditions.retain(|&m| m != id);
            }
        }
        for method in self.methods.iter_mut().flatten() {
            for arg in method.arguments.iter_mut() {
                if arg.filter() == Some(id) {
                    arg.unbind();
                }
            }
        }
        Some(removed)
    }

    /// Set an argument's style and value
    ///
    /// Parameter and Filter styles take `Value::Parameter` / `Value::Method`
    /// (or `Value::Null` to unbind). The referenced entity must exist and be
    /// convertible to the argument's kind, and a filter must not lead back to
    /// the method that uses it.
    pub fn set_argument(
        &mut self,
        method: MethodId,
        index: usize,
        style: ArgumentStyle,
        value: Value,
    ) -> Result<(), GraphError> {
        let current = self
            .method(method)
            .ok_or(GraphError::UnknownMethod(method))?
            .argument(index)
            .ok_or(GraphError::UnknownArgument { method, index })?;

        let mut candidate: Argument = current.clone();
        candidate.set_style(style);
        candidate.set_value(value)?;

        let conversion = Conversion::global();
        if let Some(pid) = candidate.parameter() {
            let parameter = self
                .parameter(pid)
                .ok_or(GraphError::MissingParameter(pid))?;
            if !conversion.can_convert(parameter.kind(), candidate.kind()) {
                return Err(GraphError::IncompatibleParameter {
                    parameter: parameter.name().to_string(),
                    expected: candidate.kind().clone(),
                });
            }
        }
        if let Some(filter) = candidate.filter() {
            let target = self
                .method(filter)
                .ok_or(GraphError::UnknownMethod(filter))?;
            if !target.def().can_produce(candidate.kind()) {
                return Err(GraphError::IncompatibleFilter {
                    method: target.display_name().to_string(),
                    expected: candidate.kind().clone(),
                });
            }
            if filter == method || self.filter_reaches(filter, method) {
                return Err(GraphError::FilterCycle(filter));
            }
        }

        if let Some(slot) = self.methods[method.index()]
            .as_mut()
            .and_then(|m| m.argument_mut(index))
        {
            *slot = candidate;
        }
        Ok(())
    }

    /// Whether following filter arguments from `from` reaches `target`
    pub fn filter_reaches(&self, from: MethodId, target: MethodId) -> bool {
        let mut stack = vec![from];
        let mut seen = HashSet::new();
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            if !seen.insert(id) {
                continue;
            }
            if let Some(method) = self.method(id) {
                stack.extend(method.filters());
            }
        }
        false
    }

    // ── Actions & transitions ───────────────────────────────────────────────

    /// Append an entry action to a state
    pub fn add_action(&mut self, state: StateId, method: MethodId) -> Result<(), GraphError> {
        let bound = self.method(method).ok_or(GraphError::UnknownMethod(method))?;
        if !bound.is_action() {
            return Err(GraphError::NotAnAction(bound.display_name().to_string()));
        }
        self.state_mut(state)
            .ok_or(GraphError::UnknownState(state))?
            .actions
            .push(method);
        Ok(())
    }

    /// Remove the action at `index`, returning its method id
    pub fn remove_action(&mut self, state: StateId, index: usize) -> Result<MethodId, GraphError> {
        let actions = &mut self
            .state_mut(state)
            .ok_or(GraphError::UnknownState(state))?
            .actions;
        if index >= actions.len() {
            return Err(GraphError::UnknownAction { state, index });
        }
        Ok(actions.remove(index))
    }

    /// Add a transition; returns its index in the source state's list
    pub fn add_transition(&mut self, from: StateId, to: StateId) -> Result<usize, GraphError> {
        if self.state(to).is_none() {
            return Err(GraphError::UnknownState(to));
        }
        let source = self.state_mut(from).ok_or(GraphError::UnknownState(from))?;
        source.transitions.push(Transition::new(from, to));
        Ok(source.transitions.len() - 1)
    }

    pub fn remove_transition(
        &mut self,
        from: StateId,
        index: usize,
    ) -> Result<Transition, GraphError> {
        let transitions = &mut self
            .state_mut(from)
            .ok_or(GraphError::UnknownState(from))?
            .transitions;
        if index >= transitions.len() {
            return Err(GraphError::UnknownTransition { state: from, index });
        }
        Ok(transitions.remove(index))
    }

    /// Append a condition to a transition
    pub fn add_condition(
        &mut self,
        from: StateId,
        transition: usize,
        method: MethodId,
    ) -> Result<(), GraphError> {
        let bound = self.method(method).ok_or(GraphError::UnknownMethod(method))?;
        if !bound.def().can_produce(&ValueKind::Bool) {
            return Err(GraphError::NotACondition(bound.display_name().to_string()));
        }
        self.state_mut(from)
            .ok_or(GraphError::UnknownState(from))?
            .transitions
            .get_mut(transition)
            .ok_or(GraphError::UnknownTransition {
                state: from,
                index: transition,
            })?
            .conditions
            .push(method);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn test_parameters_are_unique_and_typed() {
        let mut graph = StateGraph::new();
        let speed = graph.add_parameter("speed", ValueKind::Float).unwrap();
        assert_eq!(
            graph.add_parameter("speed", ValueKind::Int),
            Err(GraphError::DuplicateParameter("speed".to_string()))
        );
        assert_eq!(
            graph.add_parameter("bad", ValueKind::Method),
            Err(GraphError::InvalidParameterKind(ValueKind::Method))
        );

        assert_eq!(graph.parameter_id("speed"), Some(speed));
        assert!(matches!(
            graph.set_parameter("speed", Value::from("fast")),
            Err(GraphError::Value(ValueError::TypeMismatch { .. }))
        ));
        graph.set_parameter("speed", Value::Float(4.0)).unwrap();
        assert_eq!(graph.parameter(speed).unwrap().value(), Value::Float(4.0));
    }

    #[test]
    fn test_first_state_is_initial() {
        let mut graph = StateGraph::new();
        let idle = graph.add_state("Idle");
        let run = graph.add_state("Run");
        assert_eq!(graph.initial(), Some(idle));
        graph.set_initial(run).unwrap();
        assert_eq!(graph.initial(), Some(run));
    }

    #[test]
    fn test_remove_state_drops_incoming_transitions() {
        let mut graph = StateGraph::new();
        let a = graph.add_state("A");
        let b = graph.add_state("B");
        graph.add_transition(a, b).unwrap();
        graph.add_transition(b, a).unwrap();

        graph.remove_state(a).unwrap();
        assert!(graph.state(a).is_none());
        assert!(graph.state(b).unwrap().transitions().is_empty());
        assert_eq!(graph.initial(), Some(b));
    }

    #[test]
    fn test_actions_and_conditions_are_classified() {
        let registry = testing::registry();
        let mut graph = StateGraph::new();
        let idle = graph.add_state("Idle");
        let t = graph.add_transition(idle, idle).unwrap();

        let say = graph.bind(testing::def(&registry, "Effects", "say"));
        let open = graph.bind(testing::def(&registry, "Gate", "open"));

        assert!(matches!(
            graph.add_action(idle, open),
            Err(GraphError::NotAnAction(_))
        ));
        assert!(matches!(
            graph.add_condition(idle, t, say),
            Err(GraphError::NotACondition(_))
        ));

        graph.add_action(idle, say).unwrap();
        graph.add_condition(idle, t, open).unwrap();
        assert_eq!(graph.state(idle).unwrap().actions(), &[say]);
        assert_eq!(graph.state(idle).unwrap().transitions()[0].conditions(), &[open]);
    }

    #[test]
    fn test_set_argument_validates_references() {
        let registry = testing::registry();
        let mut graph = StateGraph::new();
        let label = graph.add_parameter("label", ValueKind::String).unwrap();
        let speed = graph.add_parameter("speed", ValueKind::Int).unwrap();

        let record = graph.bind(testing::def(&registry, "Effects", "record_float"));
        let seven = graph.bind(testing::def(&registry, "Numbers", "seven"));
        let open = graph.bind(testing::def(&registry, "Gate", "open"));

        // string parameters do not feed float arguments
        assert!(matches!(
            graph.set_argument(record, 0, ArgumentStyle::Parameter, Value::Parameter(label)),
            Err(GraphError::IncompatibleParameter { .. })
        ));
        graph
            .set_argument(record, 0, ArgumentStyle::Parameter, Value::Parameter(speed))
            .unwrap();

        // bool filters do not feed float arguments
        assert!(matches!(
            graph.set_argument(record, 0, ArgumentStyle::Filter, Value::Method(open)),
            Err(GraphError::IncompatibleFilter { .. })
        ));
        graph
            .set_argument(record, 0, ArgumentStyle::Filter, Value::Method(seven))
            .unwrap();
        assert_eq!(graph.method(record).unwrap().arguments()[0].filter(), Some(seven));

        // constant values are checked against the declared kind
        assert!(matches!(
            graph.set_argument(record, 0, ArgumentStyle::Constant, Value::Int(1)),
            Err(GraphError::Value(_))
        ));
        // failed edits leave the argument untouched
        assert_eq!(graph.method(record).unwrap().arguments()[0].filter(), Some(seven));

        assert_eq!(
            graph.set_argument(record, 3, ArgumentStyle::Constant, Value::Float(1.0)),
            Err(GraphError::UnknownArgument { method: record, index: 3 })
        );
    }

    #[test]
    fn test_filter_cycles_are_rejected() {
        let registry = testing::registry();
        let mut graph = StateGraph::new();
        let add = testing::def(&registry, "Numbers", "add");
        let a = graph.bind(Arc::clone(&add));
        let b = graph.bind(Arc::clone(&add));
        let c = graph.bind(add);

        assert_eq!(
            graph.set_argument(a, 0, ArgumentStyle::Filter, Value::Method(a)),
            Err(GraphError::FilterCycle(a))
        );

        graph.set_argument(a, 0, ArgumentStyle::Filter, Value::Method(b)).unwrap();
        graph.set_argument(b, 1, ArgumentStyle::Filter, Value::Method(c)).unwrap();
        assert!(graph.filter_reaches(a, c));
        assert_eq!(
            graph.set_argument(c, 0, ArgumentStyle::Filter, Value::Method(a)),
            Err(GraphError::FilterCycle(a))
        );

        // a diamond is fine
        graph.set_argument(a, 1, ArgumentStyle::Filter, Value::Method(c)).unwrap();
    }

    #[test]
    fn test_remove_method_detaches_references() {
        let registry = testing::registry();
        let mut graph = StateGraph::new();
        let idle = graph.add_state("Idle");
        let say = graph.bind(testing::def(&registry, "Effects", "say"));
        let record = graph.bind(testing::def(&registry, "Effects", "record_int"));
        let seven = graph.bind(testing::def(&registry, "Numbers", "seven"));
        graph.add_action(idle, say).unwrap();
        graph.add_action(idle, record).unwrap();
        graph
            .set_argument(record, 0, ArgumentStyle::Filter, Value::Method(seven))
            .unwrap();

        graph.remove_method(say).unwrap();
        graph.remove_method(seven).unwrap();
        assert_eq!(graph.state(idle).unwrap().actions(), &[record]);
        let arg = &graph.method(record).unwrap().arguments()[0];
        assert_eq!(arg.style(), ArgumentStyle::Filter);
        assert_eq!(arg.filter(), None);
        assert_eq!(graph.methods().count(), 1);
    }

    #[test]
    fn test_remove_action_and_transition_check_indices() {
        let registry = testing::registry();
        let mut graph = StateGraph::new();
        let idle = graph.add_state("Idle");
        let walk = graph.add_state("Walk");
        let say = graph.bind(testing::def(&registry, "Effects", "say"));
        let touch = graph.bind(testing::def(&registry, "Effects", "touch"));
        graph.add_action(idle, say).unwrap();
        graph.add_action(idle, touch).unwrap();
        graph.add_transition(idle, walk).unwrap();
        graph.add_transition(idle, idle).unwrap();

        assert_eq!(
            graph.remove_action(idle, 2),
            Err(GraphError::UnknownAction { state: idle, index: 2 })
        );
        assert_eq!(graph.remove_action(idle, 0), Ok(say));
        assert_eq!(graph.state(idle).unwrap().actions(), &[touch]);

        assert_eq!(
            graph.remove_transition(idle, 5).unwrap_err(),
            GraphError::UnknownTransition { state: idle, index: 5 }
        );
        let removed = graph.remove_transition(idle, 0).unwrap();
        assert_eq!(removed.to(), walk);
        let remaining = graph.state(idle).unwrap().transitions();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].to(), idle);

        graph.remove_state(walk).unwrap();
        assert_eq!(
            graph.remove_action(walk, 0),
            Err(GraphError::UnknownState(walk))
        );
    }

    #[test]
    fn test_parameter_kind_change_rematerializes() {
        let mut graph = StateGraph::new();
        let speed = graph.add_parameter("speed", ValueKind::Int).unwrap();
        graph.set_parameter("speed", Value::Int(9)).unwrap();

        graph.set_parameter_kind(speed, ValueKind::Double).unwrap();
        assert_eq!(graph.parameter(speed).unwrap().kind(), &ValueKind::Double);
        assert_eq!(graph.parameter(speed).unwrap().value(), Value::Double(0.0));
        graph.set_parameter("speed", Value::Double(1.5)).unwrap();
        assert_eq!(graph.parameter(speed).unwrap().value(), Value::Double(1.5));

        assert_eq!(
            graph.set_parameter_kind(speed, ValueKind::Method),
            Err(GraphError::InvalidParameterKind(ValueKind::Method))
        );
        graph.remove_parameter(speed).unwrap();
        assert_eq!(
            graph.set_parameter_kind(speed, ValueKind::Int),
            Err(GraphError::MissingParameter(speed))
        );
    }
}
