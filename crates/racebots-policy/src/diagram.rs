//! Graphviz rendering of a policy's last decision.

use std::fmt;
use std::io;
use std::path::Path;

use racebots_core::PolicyActivations;

/// Weights smaller than this are drawn dashed.
const FAINT_WEIGHT: f32 = 0.05;

/// Render activations and connections as a left-to-right DOT graph.
///
/// Neurons are filled green for positive activations and red for negative
/// ones; edges use the same colors for weight sign and scale their width
/// with magnitude.
#[must_use]
pub fn network_diagram(activations: &PolicyActivations) -> String {
    NetworkDiagram(activations).to_string()
}

/// Write [`network_diagram`] output to `path`.
pub fn write_network_diagram(path: &Path, activations: &PolicyActivations) -> io::Result<()> {
    std::fs::write(path, network_diagram(activations))
}

struct NetworkDiagram<'a>(&'a PolicyActivations);

impl fmt::Display for NetworkDiagram<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let activations = self.0;
        writeln!(f, "digraph policy {{")?;
        writeln!(f, "  rankdir=LR;")?;
        writeln!(f, "  splines=false;")?;
        writeln!(f, "  node [shape=circle, style=filled, fontsize=10];")?;
        for (index, layer) in activations.layers.iter().enumerate() {
            writeln!(f, "  subgraph cluster_{index} {{")?;
            writeln!(f, "    label=\"{}\";", escape(&layer.name))?;
            writeln!(f, "    color=lightgrey;")?;
            for (neuron, value) in layer.values.iter().enumerate() {
                writeln!(
                    f,
                    "    n{index}_{neuron} [label=\"{value:.2}\", fillcolor=\"{}\"];",
                    fill_color(*value)
                )?;
            }
            writeln!(f, "  }}")?;
        }
        for connection in &activations.connections {
            let style = if connection.weight.abs() < FAINT_WEIGHT {
                "dashed"
            } else {
                "solid"
            };
            writeln!(
                f,
                "  n{}_{} -> n{}_{} [color=\"{}\", penwidth={:.2}, style={style}];",
                connection.layer,
                connection.from,
                connection.layer + 1,
                connection.to,
                if connection.weight >= 0.0 {
                    "darkgreen"
                } else {
                    "red"
                },
                0.5 + connection.weight.abs().min(4.0),
            )?;
        }
        writeln!(f, "}}")
    }
}

fn fill_color(value: f32) -> &'static str {
    if !value.is_finite() {
        "grey"
    } else if value > 0.0 {
        "palegreen"
    } else if value < 0.0 {
        "lightpink"
    } else {
        "white"
    }
}

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use racebots_core::{ActivationLayer, Connection};

    fn sample() -> PolicyActivations {
        PolicyActivations {
            layers: vec![
                ActivationLayer {
                    name: "input".to_string(),
                    values: vec![0.5, -0.25],
                },
                ActivationLayer {
                    name: "output".to_string(),
                    values: vec![0.0],
                },
            ],
            connections: vec![
                Connection {
                    layer: 0,
                    from: 0,
                    to: 0,
                    weight: 1.5,
                },
                Connection {
                    layer: 0,
                    from: 1,
                    to: 0,
                    weight: -0.01,
                },
            ],
        }
    }

    #[test]
    fn diagram_lists_neurons_and_edges() {
        let dot = network_diagram(&sample());
        assert!(dot.starts_with("digraph policy {"));
        assert!(dot.trim_end().ends_with('}'));
        assert!(dot.contains("n0_0 [label=\"0.50\", fillcolor=\"palegreen\"]"));
        assert!(dot.contains("n0_1 [label=\"-0.25\", fillcolor=\"lightpink\"]"));
        assert!(dot.contains("n1_0 [label=\"0.00\", fillcolor=\"white\"]"));
        assert!(dot.contains("n0_0 -> n1_0 [color=\"darkgreen\", penwidth=2.00, style=solid]"));
        assert!(dot.contains("n0_1 -> n1_0 [color=\"red\", penwidth=0.51, style=dashed]"));
    }

    #[test]
    fn layer_names_are_escaped() {
        let activations = PolicyActivations {
            layers: vec![ActivationLayer {
                name: "say \"hi\"".to_string(),
                values: Vec::new(),
            }],
            connections: Vec::new(),
        };
        assert!(network_diagram(&activations).contains("label=\"say \\\"hi\\\"\";"));
    }
}
