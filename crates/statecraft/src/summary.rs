//! Graph summary printed by `statecraft check`

use std::fmt;

use statecraft_runtime::{ArgumentStyle, MethodKey, StateGraph};

/// An argument whose parameter or filter reference is not set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnboundArgument {
    pub method: MethodKey,
    pub argument: String,
    pub style: ArgumentStyle,
}

/// Counts and findings for a loaded graph
#[derive(Debug, Clone, PartialEq)]
pub struct GraphSummary {
    pub initial: Option<String>,
    pub states: usize,
    pub transitions: usize,
    pub methods: usize,
    pub parameters: Vec<(String, String)>,
    pub unbound: Vec<UnboundArgument>,
    /// States with no outgoing transitions
    pub terminal: Vec<String>,
}

impl GraphSummary {
    pub fn of(graph: &StateGraph) -> Self {
        let mut unbound = Vec::new();
        for (_, method) in graph.methods() {
            for argument in method.arguments() {
                let missing = match argument.style() {
                    ArgumentStyle::Constant => false,
                    ArgumentStyle::Parameter => argument.parameter().is_none(),
                    ArgumentStyle::Filter => argument.filter().is_none(),
                };
                if missing {
                    unbound.push(UnboundArgument {
                        method: method.key(),
                        argument: argument.name().to_string(),
                        style: argument.style(),
                    });
                }
            }
        }

        Self {
            initial: graph
                .initial()
                .and_then(|id| graph.state(id))
                .map(|s| s.name().to_string()),
            states: graph.states().count(),
            transitions: graph.states().map(|(_, s)| s.transitions().len()).sum(),
            methods: graph.methods().count(),
            parameters: graph
                .parameters()
                .map(|(_, p)| (p.name().to_string(), p.kind().to_string()))
                .collect(),
            unbound,
            terminal: graph
                .states()
                .filter(|(_, s)| s.transitions().is_empty())
                .map(|(_, s)| s.name().to_string())
                .collect(),
        }
    }

    /// Whether every reference argument is bound
    pub fn is_complete(&self) -> bool {
        self.unbound.is_empty()
    }
}

impl fmt::Display for GraphSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "initial:     {}", self.initial.as_deref().unwrap_or("-"))?;
        writeln!(f, "states:      {}", self.states)?;
        writeln!(f, "transitions: {}", self.transitions)?;
        writeln!(f, "methods:     {}", self.methods)?;
        for (name, kind) in &self.parameters {
            writeln!(f, "parameter:   {name}: {kind}")?;
        }
        for name in &self.terminal {
            writeln!(f, "terminal:    {name}")?;
        }
        for arg in &self.unbound {
            writeln!(f, "unbound:     {} '{}' ({:?})", arg.method, arg.argument, arg.style)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{modules, sample};
    use statecraft_types::Value;

    #[test]
    fn test_sample_summary() {
        let registry = modules::registry().unwrap();
        let graph = sample::build(&registry).unwrap();
        let summary = GraphSummary::of(&graph);

        assert_eq!(summary.initial.as_deref(), Some("Alive"));
        assert_eq!(summary.states, 3);
        assert_eq!(summary.transitions, 5);
        assert_eq!(summary.parameters, vec![("regen".to_string(), "int".to_string())]);
        assert_eq!(summary.terminal, vec!["Dead".to_string()]);
        assert!(summary.is_complete());
    }

    #[test]
    fn test_reports_unbound_filters() {
        let registry = modules::registry().unwrap();
        let mut graph = sample::build(&registry).unwrap();
        let not = registry.find("Logic", "not").unwrap();
        let method = graph.bind(std::sync::Arc::clone(not));
        graph
            .set_argument(method, 0, ArgumentStyle::Filter, Value::Null)
            .unwrap();

        let summary = GraphSummary::of(&graph);
        assert_eq!(
            summary.unbound,
            vec![UnboundArgument {
                method: MethodKey::new("Logic", "not"),
                argument: "value".to_string(),
                style: ArgumentStyle::Filter,
            }]
        );
        assert!(summary.to_string().contains("unbound:     Logic::not 'value'"));
    }
}
