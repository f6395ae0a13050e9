#[derive(Debug, Eq, PartialEq)]
pub enum SortError<Node> {
    /// Nodes that could never be scheduled because they sit on (or behind) a cycle.
    CycleDetected(Vec<Node>),
    /// An edge mentions a node that is not part of the graph.
    UnknownNode(Node),
}

impl<Node> std::error::Error for SortError<Node> where Node: core::fmt::Display + core::fmt::Debug {}

impl<Node: std::fmt::Display + std::fmt::Debug> std::fmt::Display for SortError<Node> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SortError::CycleDetected(nodes) => {
                write!(f, "Cycle detected between:")?;
                for node in nodes {
                    write!(f, " {}", node)?;
                }
                Ok(())
            }
            SortError::UnknownNode(node) => write!(f, "Unknown node: {}", node),
        }
    }
}
