//! Architecture diagrams.
//!
//! [`to_dot`] renders a program as a Graphviz digraph: one cluster per
//! node holding a component box and the node's topics, blue edges from a
//! node to the topics it publishes, green edges from a topic to every node
//! listening on it and dashed edges for requests. [`to_html`] wraps the
//! same graph in a page that renders it in the browser with viz.js.

use std::fmt::Write as _;

use indexmap::IndexSet;

use crate::parser::{Handler, Program, Stmt, StmtKind};

const VIZ_JS: &str = "https://cdnjs.cloudflare.com/ajax/libs/viz.js/2.1.2/viz.js";
const VIZ_RENDER_JS: &str = "https://cdnjs.cloudflare.com/ajax/libs/viz.js/2.1.2/full.render.js";

/// DOT id of a topic.
pub fn topic_id(node: &str, handle: &str) -> String {
    format!("{}__{}", node, handle)
}

fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Edge {
    Publish { node: String, topic: String },
    Listen { topic: String, node: String },
    Request { from: String, to: String, func: String },
}

/// Edges in first-seen order, each once.
#[derive(Default)]
struct EdgeSet {
    edges: IndexSet<Edge>,
}

impl EdgeSet {
    fn scan(&mut self, node: &str, body: &[Stmt]) {
        for stmt in body {
            match &stmt.kind {
                StmtKind::Publish { topic, .. } => {
                    self.edges.insert(Edge::Publish {
                        node: node.to_string(),
                        topic: topic_id(node, &topic.name),
                    });
                }
                StmtKind::Request { node: target, func, .. } if !target.is_error() => {
                    self.edges.insert(Edge::Request {
                        from: node.to_string(),
                        to: target.name.clone(),
                        func: func.name.clone(),
                    });
                }
                StmtKind::If {
                    then_body,
                    elifs,
                    else_body,
                    ..
                } => {
                    self.scan(node, then_body);
                    for (_, body) in elifs {
                        self.scan(node, body);
                    }
                    if let Some(body) = else_body {
                        self.scan(node, body);
                    }
                }
                _ => {}
            }
        }
    }

    fn listen(&mut self, node: &str, source: Option<&str>, topic: &str, handler: &Handler) {
        self.edges.insert(Edge::Listen {
            topic: topic_id(source.unwrap_or(node), topic),
            node: node.to_string(),
        });
        self.scan(node, handler.body());
    }
}

/// Render `program` as a Graphviz digraph.
pub fn to_dot(program: &Program) -> String {
    let mut out = String::new();
    out.push_str("digraph RivetArchitecture {\n");
    out.push_str("  rankdir=LR;\n");
    out.push_str("  node [fontname=\"Arial\", shape=box, style=filled, fillcolor=white];\n");
    out.push_str("  edge [fontname=\"Arial\", fontsize=10];\n");
    out.push_str("  graph [style=filled, fillcolor=\"#eeeeee\"];\n");

    for node in program.nodes() {
        let name = &node.name.name;
        let _ = writeln!(out);
        let _ = writeln!(out, "  subgraph {} {{", quote(&format!("cluster_{}", name)));
        let _ = writeln!(out, "    label = {};", quote(&format!("{} : {}", name, node.type_name.name)));
        out.push_str("    style = rounded;\n");
        out.push_str("    color = black;\n");
        out.push_str("    bgcolor = white;\n");
        let _ = writeln!(
            out,
            "    {} [label={}, shape=component, fillcolor=\"#d0e0ff\"];",
            quote(name),
            quote(name)
        );
        for topic in &node.topics {
            // `\n` stays escaped: Graphviz turns it into a line break.
            let label = format!(
                "\"{}\\n<{}>\"",
                topic.path.replace('\\', "\\\\").replace('"', "\\\""),
                topic.ty.kind
            );
            let _ = writeln!(
                out,
                "    {} [label={}, shape=ellipse, style=filled, fillcolor=\"#ddffdd\"];",
                quote(&topic_id(name, &topic.handle.name)),
                label
            );
        }
        out.push_str("  }\n");
    }

    let mut edges = EdgeSet::default();
    for node in program.nodes() {
        let name = &node.name.name;
        for listener in &node.listeners {
            let source = listener.source_node.as_ref().map(|s| s.name.as_str());
            edges.listen(name, source, &listener.topic.name, &listener.handler);
        }
        for req in &node.requests {
            edges.scan(name, req.handler.body());
        }
        for func in &node.private_funcs {
            edges.scan(name, &func.body);
        }
    }
    for mode in program.modes() {
        let name = &mode.node.name;
        edges.scan(name, &mode.body);
        for listener in &mode.listeners {
            let source = listener.source_node.as_ref().map(|s| s.name.as_str());
            edges.listen(name, source, &listener.topic.name, &listener.handler);
        }
    }

    if !edges.edges.is_empty() {
        out.push('\n');
    }
    for edge in &edges.edges {
        let _ = match edge {
            Edge::Publish { node, topic } => {
                writeln!(out, "  {} -> {} [color=blue];", quote(node), quote(topic))
            }
            Edge::Listen { topic, node } => {
                writeln!(out, "  {} -> {} [color=green];", quote(topic), quote(node))
            }
            Edge::Request { from, to, func } => writeln!(
                out,
                "  {} -> {} [style=dashed, label={}];",
                quote(from),
                quote(to),
                quote(func)
            ),
        };
    }
    out.push_str("}\n");
    out
}

/// Escape text for a JavaScript template literal.
fn template_literal(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('`', "\\`")
        .replace("${", "\\${")
}

/// A standalone page that renders the architecture diagram.
pub fn to_html(program: &Program) -> String {
    let dot = template_literal(&to_dot(program));
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Rivet System Architecture</title>
    <style>
        body {{ margin: 0; padding: 0; overflow: hidden; background-color: #f0f0f0; }}
        #graph {{ width: 100vw; height: 100vh; display: flex; justify-content: center; align-items: center; }}
        svg {{ width: 100%; height: 100%; }}
    </style>
</head>
<body>
    <div id="graph">Loading Diagram...</div>
    <script src="{viz}"></script>
    <script src="{render}"></script>
    <script>
        var dotLines = `{dot}`;
        var viz = new Viz();
        viz.renderSVGElement(dotLines)
            .then(function(element) {{
                var container = document.getElementById("graph");
                container.innerHTML = "";
                container.appendChild(element);
            }})
            .catch(function(error) {{
                console.error(error);
                document.getElementById("graph").innerHTML =
                    "<h3 style='color:red'>Error rendering graph</h3><pre>" + error + "</pre>";
            }});
    </script>
</body>
</html>
"#,
        viz = VIZ_JS,
        render = VIZ_RENDER_JS,
        dot = dot
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Diagnostics;
    use crate::parser::parse_source;

    fn program(src: &str) -> Program {
        let mut diags = Diagnostics::new();
        let program = parse_source(src, &mut diags);
        assert!(!diags.has_errors());
        program
    }

    const SRC: &str = "node Cam : Camera\n    topic frame : Image = \"/cam/frame\"\n    onRequest shoot()\n        frame.publish(frame)\n\
                       node Ai : Detector\n    onListen Cam.frame(f: Image)\n        request Cam.shoot()\n        request Cam.shoot()\n";

    #[test]
    fn test_clusters_and_topics() {
        let dot = to_dot(&program(SRC));
        assert!(dot.starts_with("digraph RivetArchitecture {\n  rankdir=LR;"));
        assert!(dot.contains("subgraph \"cluster_Cam\" {"));
        assert!(dot.contains("label = \"Cam : Camera\";"));
        assert!(dot.contains("\"Cam__frame\" [label=\"/cam/frame\\n<Image>\", shape=ellipse"));
    }

    #[test]
    fn test_edges_are_colored_and_deduplicated() {
        let dot = to_dot(&program(SRC));
        assert!(dot.contains("\"Cam\" -> \"Cam__frame\" [color=blue];"));
        assert!(dot.contains("\"Cam__frame\" -> \"Ai\" [color=green];"));
        assert_eq!(
            dot.matches("\"Ai\" -> \"Cam\" [style=dashed, label=\"shoot\"];").count(),
            1
        );
    }

    #[test]
    fn test_html_embeds_escaped_dot() {
        let html = to_html(&program(SRC));
        assert!(html.contains("viz.js/2.1.2/viz.js"));
        assert!(html.contains("var dotLines = `digraph RivetArchitecture"));
        assert!(html.contains("/cam/frame\\\\n<Image>"));
    }
}
