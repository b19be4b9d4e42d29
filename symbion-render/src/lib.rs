//! Turns merged reports into display graphs.
//!
//! Everything here is a pure function of its inputs: the same report can be
//! rendered from any number of threads at once.

pub mod mapping;
pub mod render;
pub mod renderable;

pub use mapping::{MapFunc, PseudoFunc, TopologySelector};
pub use render::{render, render_edge_metadata, render_topology, LeafMap, Reduce, Renderer};
pub use renderable::{AggregateMetadata, MappedNode, RenderableNode, RenderableNodes};
