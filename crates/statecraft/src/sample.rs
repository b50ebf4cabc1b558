//! Sample graph written by `statecraft new`

use std::sync::Arc;

use statecraft_runtime::{ArgumentStyle, GraphError, MethodDef, MethodRegistry, StateGraph};
use statecraft_types::{MethodId, Value, ValueKind};

/// Errors raised while assembling the sample graph
#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    #[error("Registry is missing {0}")]
    MissingMethod(String),
    #[error(transparent)]
    Graph(#[from] GraphError),
}

struct Builder<'r> {
    registry: &'r MethodRegistry,
    graph: StateGraph,
}

impl Builder<'_> {
    fn def(&self, module: &str, method: &str) -> Result<Arc<MethodDef>, SampleError> {
        self.registry
            .find(module, method)
            .cloned()
            .ok_or_else(|| SampleError::MissingMethod(format!("{module}::{method}")))
    }

    fn bind(&mut self, module: &str, method: &str) -> Result<MethodId, SampleError> {
        let def = self.def(module, method)?;
        Ok(self.graph.bind(def))
    }

    fn constant(&mut self, method: MethodId, index: usize, value: Value) -> Result<(), SampleError> {
        self.graph
            .set_argument(method, index, ArgumentStyle::Constant, value)?;
        Ok(())
    }

    /// `Logic/<compare>(Player/health, threshold)`
    fn health_check(&mut self, compare: &str, threshold: f64) -> Result<MethodId, SampleError> {
        let check = self.bind("Logic", compare)?;
        let health = self.bind("Player", "health")?;
        self.graph
            .set_argument(check, 0, ArgumentStyle::Filter, Value::Method(health))?;
        self.constant(check, 1, Value::Double(threshold))?;
        Ok(check)
    }
}

/// Build the demo graph
///
/// `Alive` takes damage on every entry and loops back to itself until health
/// drops below 50, then `Resting` heals by the `regen` parameter until health
/// is back above 80. `Dead` is terminal.
pub fn build(registry: &MethodRegistry) -> Result<StateGraph, SampleError> {
    let mut b = Builder {
        registry,
        graph: StateGraph::new(),
    };

    let regen = b.graph.add_parameter("regen", ValueKind::Int)?;
    b.graph.set_parameter("regen", Value::Int(25))?;

    let alive = b.graph.add_state("Alive");
    let resting = b.graph.add_state("Resting");
    let dead = b.graph.add_state("Dead");
    if let Some(state) = b.graph.state_mut(resting) {
        state.set_position([240.0, 0.0]);
    }
    if let Some(state) = b.graph.state_mut(dead) {
        state.set_position([0.0, 160.0]);
    }

    // Alive: take a hit and complain
    let damage = b.bind("Player", "damage")?;
    b.constant(damage, 0, Value::Int(30))?;
    b.graph.add_action(alive, damage)?;
    let print = b.bind("Console", "print")?;
    b.constant(print, 0, Value::from("ouch"))?;
    b.graph.add_action(alive, print)?;

    // Resting: heal by the regen parameter
    let heal = b.bind("Player", "heal")?;
    b.graph
        .set_argument(heal, 0, ArgumentStyle::Parameter, Value::Parameter(regen))?;
    b.graph.add_action(resting, heal)?;

    // Dead: say goodbye
    let farewell = b.bind("Console", "print")?;
    b.constant(farewell, 0, Value::from("game over"))?;
    b.graph.add_action(dead, farewell)?;

    // Alive -> Dead when the player is no longer alive
    let t = b.graph.add_transition(alive, dead)?;
    let not = b.bind("Logic", "not")?;
    let is_alive = b.bind("Player", "is_alive")?;
    b.graph
        .set_argument(not, 0, ArgumentStyle::Filter, Value::Method(is_alive))?;
    b.graph.add_condition(alive, t, not)?;

    // Alive -> Resting when health < 50
    let t = b.graph.add_transition(alive, resting)?;
    let low = b.health_check("less_than", 50.0)?;
    b.graph.add_condition(alive, t, low)?;

    // Alive -> Alive otherwise
    let t = b.graph.add_transition(alive, alive)?;
    let always = b.bind("Logic", "always")?;
    b.graph.add_condition(alive, t, always)?;

    // Resting -> Alive when health > 80, else keep resting
    let t = b.graph.add_transition(resting, alive)?;
    let high = b.health_check("greater_than", 80.0)?;
    b.graph.add_condition(resting, t, high)?;
    let t = b.graph.add_transition(resting, resting)?;
    b.graph.add_condition(resting, t, always)?;

    Ok(b.graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules;
    use statecraft_runtime::{Machine, SavedGraph, TickOutcome};

    #[test]
    fn test_sample_is_well_formed() {
        let registry = modules::registry().unwrap();
        let graph = build(&registry).unwrap();
        assert_eq!(graph.states().count(), 3);
        assert_eq!(graph.parameters().count(), 1);
        let alive = graph.state_id("Alive").unwrap();
        assert_eq!(graph.initial(), Some(alive));
        assert_eq!(graph.state(alive).unwrap().transitions().len(), 3);
    }

    #[test]
    fn test_sample_cycles_between_alive_and_resting() {
        let registry = modules::registry().unwrap();
        let graph = build(&registry).unwrap();
        let json = SavedGraph::from_graph(&graph).unwrap().to_json().unwrap();
        let graph = SavedGraph::from_json(&json)
            .unwrap()
            .into_graph(&registry)
            .unwrap();

        modules::reset_world();
        let mut machine = Machine::new(graph);
        let alive = machine.start().unwrap();
        let resting = machine.graph().state_id("Resting").unwrap();
        assert_eq!(modules::world().health, 70);

        // 70 -> 40 by looping through Alive
        assert!(matches!(
            machine.tick().unwrap(),
            TickOutcome::Transitioned { to, .. } if to == alive
        ));
        assert_eq!(modules::world().health, 40);

        // 40 < 50 moves to Resting and heals to 65
        assert!(matches!(
            machine.tick().unwrap(),
            TickOutcome::Transitioned { to, .. } if to == resting
        ));
        assert_eq!(modules::world().health, 65);

        // rests once more to 90, then returns to Alive
        machine.tick().unwrap();
        assert_eq!(modules::world().health, 90);
        assert!(matches!(
            machine.tick().unwrap(),
            TickOutcome::Transitioned { to, .. } if to == alive
        ));
        assert_eq!(modules::world().health, 60);
    }
}
