use petgraph::Direction;
use petgraph::Graph;
use petgraph::visit::EdgeRef;

use crate::activity::ArcStr;

/// What a vertex of the blueprint stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// A root trigger created with [`start`](crate::start).
    Start,
    /// A subtask running an activity.
    Activity,
    /// A terminal callback created with [`After::finish`](crate::After::finish).
    Joined,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vertex {
    pub name: &'static str,
    pub kind: Kind,
}

/// Snapshot of the dependency graph wired over a single collector.
///
/// Edges point from a dependency to the node it gates. The `Display`
/// implementation renders the graph as a Mermaid flowchart.
#[derive(Debug, Clone)]
pub struct Blueprint {
    name: ArcStr,
    graph: Graph<Vertex, ()>,
}

impl Blueprint {
    pub(crate) fn new(name: ArcStr, graph: Graph<Vertex, ()>) -> Self {
        Self { name, graph }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of vertices.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.graph.node_weights()
    }

    /// Names of the direct dependencies of every vertex called `name`.
    pub fn dependencies_of(&self, name: &str) -> Vec<&'static str> {
        let mut found: Vec<_> = self
            .graph
            .node_indices()
            .filter(|&index| self.graph[index].name == name)
            .flat_map(|index| self.graph.edges_directed(index, Direction::Incoming))
            .map(|edge| self.graph[edge.source()].name)
            .collect();

        found.sort_unstable();
        found
    }
}

impl std::fmt::Display for Blueprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "graph LR")?;

        for index in self.graph.node_indices() {
            let vertex = &self.graph[index];
            let name = vertex.name.replace('"', "\\\"");
            match vertex.kind {
                Kind::Start => writeln!(f, "    {}([\"{}\"])", index.index(), name)?,
                Kind::Activity => writeln!(f, "    {}[\"{}\"]", index.index(), name)?,
                Kind::Joined => writeln!(f, "    {}{{\"{}\"}}", index.index(), name)?,
            }
        }

        for edge in self.graph.edge_references() {
            writeln!(
                f,
                "    {} --> {}",
                edge.source().index(),
                edge.target().index()
            )?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Blueprint {
        let mut graph = Graph::new();
        let start = graph.add_node(Vertex {
            name: "start",
            kind: Kind::Start,
        });
        let fetch = graph.add_node(Vertex {
            name: "Fetch",
            kind: Kind::Activity,
        });
        let parse = graph.add_node(Vertex {
            name: "Parse",
            kind: Kind::Activity,
        });
        let joined = graph.add_node(Vertex {
            name: "joined",
            kind: Kind::Joined,
        });
        graph.add_edge(start, fetch, ());
        graph.add_edge(fetch, parse, ());
        graph.add_edge(fetch, joined, ());
        graph.add_edge(parse, joined, ());

        Blueprint::new("sample".into(), graph)
    }

    #[test]
    fn test_dependencies_of() {
        let blueprint = sample();
        assert_eq!(blueprint.len(), 4);
        assert_eq!(blueprint.dependencies_of("joined"), vec!["Fetch", "Parse"]);
        assert_eq!(blueprint.dependencies_of("Fetch"), vec!["start"]);
        assert!(blueprint.dependencies_of("start").is_empty());
        assert!(blueprint.dependencies_of("missing").is_empty());
    }

    #[test]
    fn test_render_mermaid() {
        let rendered = sample().to_string();
        assert!(rendered.starts_with("graph LR\n"));
        assert!(rendered.contains("    0([\"start\"])\n"));
        assert!(rendered.contains("    1[\"Fetch\"]\n"));
        assert!(rendered.contains("    3{\"joined\"}\n"));
        assert!(rendered.contains("    1 --> 2\n"));
        assert!(rendered.contains("    2 --> 3\n"));
    }
}
