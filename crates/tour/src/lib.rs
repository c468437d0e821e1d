//! Panorama tour graph: nodes, directed links and hotspots, kept mutually
//! consistent by the operations in `links`.

pub mod batch;
pub mod error;
pub mod events;
pub mod graph;
pub mod links;
pub mod node;
pub mod shared;

pub use batch::*;
pub use error::*;
pub use events::*;
pub use graph::*;
pub use node::*;
pub use shared::*;
