// Evaluator - Resolves bound method arguments and runs registry thunks

use tracing::{debug, trace};

use statecraft_types::{Conversion, ConversionError, MethodId, ParameterId, StateId, Value, ValueKind};

use crate::{ArgumentStyle, MethodError, MethodKey, StateGraph, Transition};

/// Errors raised while invoking bound methods
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error("Method not found: {0}")]
    UnknownMethod(MethodId),
    #[error("State not found: {0}")]
    UnknownState(StateId),
    #[error("Parameter not found: {0}")]
    UnknownParameter(ParameterId),
    #[error("Argument '{argument}' of {method} is not bound")]
    UnboundArgument { method: MethodKey, argument: String },
    #[error("Argument '{argument}' of {method}: {source}")]
    Conversion {
        method: MethodKey,
        argument: String,
        #[source]
        source: ConversionError,
    },
    #[error("{method} did not produce a boolean")]
    NotBoolean { method: MethodKey },
    #[error("{method} failed: {source}")]
    Method {
        method: MethodKey,
        #[source]
        source: MethodError,
    },
    #[error("Filter cycle through {0}")]
    FilterCycle(MethodId),
}

/// Read-only view over a graph that evaluates bound methods
///
/// Filters are evaluated depth first, and a method's thunk only runs once
/// every one of its arguments has resolved.
pub struct Evaluator<'g> {
    graph: &'g StateGraph,
}

impl<'g> Evaluator<'g> {
    pub fn new(graph: &'g StateGraph) -> Self {
        Self { graph }
    }

    /// Invoke a bound method and return its raw result
    pub fn invoke(&self, id: MethodId) -> Result<Value, InvokeError> {
        let mut stack = Vec::new();
        self.invoke_with(id, &mut stack)
    }

    fn invoke_with(&self, id: MethodId, stack: &mut Vec<MethodId>) -> Result<Value, InvokeError> {
        if stack.contains(&id) {
            return Err(InvokeError::FilterCycle(id));
        }
        let method = self.graph.method(id).ok_or(InvokeError::UnknownMethod(id))?;
        let key = method.key();

        stack.push(id);
        let mut values = Vec::with_capacity(method.arguments().len());
        for argument in method.arguments() {
            let unbound = || InvokeError::UnboundArgument {
                method: key.clone(),
                argument: argument.name().to_string(),
            };
            let raw = match argument.style() {
                ArgumentStyle::Constant => argument.value(),
                ArgumentStyle::Parameter => {
                    let pid = argument.parameter().ok_or_else(unbound)?;
                    self.graph
                        .parameter(pid)
                        .ok_or(InvokeError::UnknownParameter(pid))?
                        .value()
                }
                ArgumentStyle::Filter => {
                    let filter = argument.filter().ok_or_else(unbound)?;
                    self.invoke_with(filter, stack)?
                }
            };
            let value = Conversion::global()
                .convert(raw, argument.kind())
                .map_err(|source| InvokeError::Conversion {
                    method: key.clone(),
                    argument: argument.name().to_string(),
                    source,
                })?;
            values.push(value);
        }
        stack.pop();

        trace!(method = %key, ?values, "Invoking");
        method
            .def()
            .invoke(&values)
            .map_err(|source| InvokeError::Method { method: key, source })
    }

    /// Invoke a condition and coerce its result to a boolean
    pub fn check(&self, id: MethodId) -> Result<bool, InvokeError> {
        let result = self.invoke(id)?;
        let method = || {
            self.graph
                .method(id)
                .map(|m| m.key())
                .unwrap_or_else(|| MethodKey::new("", ""))
        };
        match Conversion::global().convert(result, &ValueKind::Bool) {
            Ok(Value::Bool(b)) => Ok(b),
            Ok(_) => Err(InvokeError::NotBoolean { method: method() }),
            Err(source) => Err(InvokeError::Conversion {
                method: method(),
                argument: "result".to_string(),
                source,
            }),
        }
    }

    /// All conditions hold, evaluated in order up to the first false
    pub fn transition_satisfied(&self, transition: &Transition) -> Result<bool, InvokeError> {
        for &condition in transition.conditions() {
            if !self.check(condition)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Index of the first satisfied outgoing transition of `state`
    pub fn select_transition(&self, state: StateId) -> Result<Option<usize>, InvokeError> {
        let source = self.graph.state(state).ok_or(InvokeError::UnknownState(state))?;
        for (index, transition) in source.transitions().iter().enumerate() {
            if self.transition_satisfied(transition)? {
                debug!(%state, index, to = %transition.to(), "Transition selected");
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    /// Run the entry actions of `state` in list order
    pub fn run_actions(&self, state: StateId) -> Result<(), InvokeError> {
        let target = self.graph.state(state).ok_or(InvokeError::UnknownState(state))?;
        for &action in target.actions() {
            self.invoke(action)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, Door};
    use statecraft_types::Handle;

    #[test]
    fn test_first_satisfied_transition_wins() {
        let registry = testing::registry();
        let mut graph = StateGraph::new();
        let start = graph.add_state("Start");
        let a = graph.add_state("A");
        let b = graph.add_state("B");
        let c = graph.add_state("C");

        let open = testing::def(&registry, "Gate", "open");
        let closed = testing::def(&registry, "Gate", "closed");

        let t1 = graph.add_transition(start, a).unwrap();
        let m = graph.bind(closed);
        graph.add_condition(start, t1, m).unwrap();
        let m = graph.bind(std::sync::Arc::clone(&open));
        graph.add_condition(start, t1, m).unwrap();

        let t2 = graph.add_transition(start, b).unwrap();
        for _ in 0..2 {
            let m = graph.bind(std::sync::Arc::clone(&open));
            graph.add_condition(start, t2, m).unwrap();
        }

        let t3 = graph.add_transition(start, c).unwrap();
        let m = graph.bind(open);
        graph.add_condition(start, t3, m).unwrap();

        testing::take_calls();
        let selected = Evaluator::new(&graph).select_transition(start).unwrap();
        assert_eq!(selected, Some(t2));
        // T1 stops at its first false condition; T3 is never evaluated
        assert_eq!(testing::take_calls(), vec!["closed", "open", "open"]);
    }

    #[test]
    fn test_transition_without_conditions_is_satisfied() {
        let mut graph = StateGraph::new();
        let a = graph.add_state("A");
        let b = graph.add_state("B");
        graph.add_transition(a, b).unwrap();
        assert_eq!(Evaluator::new(&graph).select_transition(a).unwrap(), Some(0));
        assert_eq!(Evaluator::new(&graph).select_transition(b).unwrap(), None);
    }

    #[test]
    fn test_filter_result_is_coerced() {
        let registry = testing::registry();
        let mut graph = StateGraph::new();
        let record = graph.bind(testing::def(&registry, "Effects", "record_float"));
        let seven = graph.bind(testing::def(&registry, "Numbers", "seven"));
        graph
            .set_argument(record, 0, ArgumentStyle::Filter, Value::Method(seven))
            .unwrap();

        testing::take_calls();
        Evaluator::new(&graph).invoke(record).unwrap();
        assert_eq!(testing::take_calls(), vec!["float:7"]);
    }

    #[test]
    fn test_failed_filter_aborts_outer_call() {
        let registry = testing::registry();
        let mut graph = StateGraph::new();
        let record = graph.bind(testing::def(&registry, "Effects", "record_int"));
        let huge = graph.bind(testing::def(&registry, "Numbers", "huge"));
        graph
            .set_argument(record, 0, ArgumentStyle::Filter, Value::Method(huge))
            .unwrap();

        testing::take_calls();
        let err = Evaluator::new(&graph).invoke(record).unwrap_err();
        assert!(matches!(
            err,
            InvokeError::Conversion {
                source: ConversionError::Overflow { .. },
                ..
            }
        ));
        assert!(testing::take_calls().is_empty());
    }

    #[test]
    fn test_parameter_arguments_read_live_values() {
        let registry = testing::registry();
        let mut graph = StateGraph::new();
        let speed = graph.add_parameter("speed", ValueKind::Int).unwrap();
        let at_least = graph.bind(testing::def(&registry, "Gate", "at_least"));
        graph
            .set_argument(at_least, 0, ArgumentStyle::Parameter, Value::Parameter(speed))
            .unwrap();
        graph
            .set_argument(at_least, 1, ArgumentStyle::Constant, Value::Float(2.5))
            .unwrap();

        assert!(!Evaluator::new(&graph).check(at_least).unwrap());
        graph.set_parameter("speed", Value::Int(3)).unwrap();
        assert!(Evaluator::new(&graph).check(at_least).unwrap());
    }

    #[test]
    fn test_nested_filters_evaluate_depth_first() {
        let registry = testing::registry();
        let mut graph = StateGraph::new();
        let add = testing::def(&registry, "Numbers", "add");
        let outer = graph.bind(std::sync::Arc::clone(&add));
        let inner = graph.bind(add);
        let seven = graph.bind(testing::def(&registry, "Numbers", "seven"));

        graph.set_argument(inner, 0, ArgumentStyle::Filter, Value::Method(seven)).unwrap();
        graph.set_argument(inner, 1, ArgumentStyle::Constant, Value::Int(5)).unwrap();
        graph.set_argument(outer, 0, ArgumentStyle::Filter, Value::Method(inner)).unwrap();
        graph.set_argument(outer, 1, ArgumentStyle::Filter, Value::Method(seven)).unwrap();

        assert_eq!(Evaluator::new(&graph).invoke(outer).unwrap(), Value::Int(19));
    }

    #[test]
    fn test_unbound_references_fail() {
        let registry = testing::registry();
        let mut graph = StateGraph::new();
        let record = graph.bind(testing::def(&registry, "Effects", "record_int"));
        graph
            .set_argument(record, 0, ArgumentStyle::Filter, Value::Null)
            .unwrap();

        let err = Evaluator::new(&graph).invoke(record).unwrap_err();
        assert!(matches!(
            err,
            InvokeError::UnboundArgument { ref argument, .. } if argument == "value"
        ));
    }

    #[test]
    fn test_handle_arguments_pass_through() {
        let registry = testing::registry();
        let mut graph = StateGraph::new();
        let touch = graph.bind(testing::def(&registry, "Effects", "touch"));

        // no handle assigned yet
        assert!(matches!(
            Evaluator::new(&graph).invoke(touch),
            Err(InvokeError::Method { .. })
        ));

        let door = Door(Handle::new("Door"));
        graph
            .set_argument(touch, 0, ArgumentStyle::Constant, Value::Handle(door.0.clone()))
            .unwrap();
        testing::take_calls();
        Evaluator::new(&graph).invoke(touch).unwrap();
        assert_eq!(testing::take_calls(), vec![format!("touch:{}", door.0.id)]);
    }

    #[test]
    fn test_actions_run_in_order() {
        let registry = testing::registry();
        let mut graph = StateGraph::new();
        let idle = graph.add_state("Idle");
        let say = testing::def(&registry, "Effects", "say");
        for text in ["one", "two"] {
            let m = graph.bind(std::sync::Arc::clone(&say));
            graph
                .set_argument(m, 0, ArgumentStyle::Constant, Value::from(text))
                .unwrap();
            graph.add_action(idle, m).unwrap();
        }

        testing::take_calls();
        Evaluator::new(&graph).run_actions(idle).unwrap();
        assert_eq!(testing::take_calls(), vec!["say:one", "say:two"]);
    }
}
