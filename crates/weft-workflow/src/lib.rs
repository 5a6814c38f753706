mod graph;
mod node;
mod workflow;

pub use graph::Graph;
pub use node::{Binding, Edge, Node, OutputBinding, Source};
pub use workflow::WorkflowGraph;
