// Machine - Tick-driven execution of a state graph

use tracing::{debug, info};

use statecraft_types::{StateId, Value};

use crate::{Evaluator, GraphError, InvokeError, State, StateGraph};

/// Errors raised while driving a machine
#[derive(Debug, thiserror::Error)]
pub enum MachineError {
    #[error("Machine has not been started")]
    NotStarted,
    #[error("Graph has no initial state")]
    NoInitialState,
    #[error("State not found: {0}")]
    UnknownState(StateId),
    #[error(transparent)]
    Invoke(#[from] InvokeError),
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Result of a single tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No outgoing transition was satisfied
    Stayed(StateId),
    /// The machine moved along `transition` of `from`
    Transitioned {
        from: StateId,
        to: StateId,
        transition: usize,
    },
}

/// A state graph plus the state currently active
#[derive(Debug)]
pub struct Machine {
    graph: StateGraph,
    current: Option<StateId>,
    ticks: u64,
}

impl Machine {
    pub fn new(graph: StateGraph) -> Self {
        Self {
            graph,
            current: None,
            ticks: 0,
        }
    }

    /// Enter the graph's initial state
    pub fn start(&mut self) -> Result<StateId, MachineError> {
        let initial = self.graph.initial().ok_or(MachineError::NoInitialState)?;
        self.start_at(initial)
    }

    /// Enter `state` and run its actions
    pub fn start_at(&mut self, state: StateId) -> Result<StateId, MachineError> {
        let name = self
            .graph
            .state(state)
            .ok_or(MachineError::UnknownState(state))?
            .name()
            .to_string();
        info!(%state, %name, "Machine started");
        self.enter(state)?;
        Ok(state)
    }

    /// Take the first satisfied transition of the current state, if any
    ///
    /// When an entry action of the destination fails, the machine has
    /// already switched to the destination and the error is returned.
    pub fn tick(&mut self) -> Result<TickOutcome, MachineError> {
        let from = self.current.ok_or(MachineError::NotStarted)?;
        self.ticks += 1;

        let selected = Evaluator::new(&self.graph).select_transition(from)?;
        let Some(index) = selected else {
            debug!(state = %from, tick = self.ticks, "No transition satisfied");
            return Ok(TickOutcome::Stayed(from));
        };

        let to = self
            .graph
            .state(from)
            .and_then(|s| s.transitions().get(index))
            .map(|t| t.to())
            .ok_or(MachineError::UnknownState(from))?;
        info!(
            from = %self.state_name(from),
            to = %self.state_name(to),
            tick = self.ticks,
            "Transition"
        );
        self.enter(to)?;
        Ok(TickOutcome::Transitioned {
            from,
            to,
            transition: index,
        })
    }

    fn enter(&mut self, state: StateId) -> Result<(), MachineError> {
        self.current = Some(state);
        Evaluator::new(&self.graph).run_actions(state)?;
        Ok(())
    }

    fn state_name(&self, id: StateId) -> &str {
        self.graph.state(id).map(State::name).unwrap_or("")
    }

    /// Update a parameter between ticks
    pub fn set_parameter(&mut self, name: &str, value: Value) -> Result<(), MachineError> {
        self.graph.set_parameter(name, value)?;
        Ok(())
    }

    pub fn current(&self) -> Option<StateId> {
        self.current
    }

    pub fn current_state(&self) -> Option<&State> {
        self.current.and_then(|id| self.graph.state(id))
    }

    pub fn graph(&self) -> &StateGraph {
        &self.graph
    }

    /// Ticks taken since creation
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}
