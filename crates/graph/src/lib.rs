#![forbid(unsafe_code)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]

//! Graph model, deterministic random generation, and the four graph
//! algorithms served by `graphpipe` (max-flow, SCC count, MST weight,
//! k-clique count).

pub mod algorithm;

mod generate;
mod graph;

pub use algorithm::{Algorithm, Params};
pub use generate::generate;
pub use graph::{Graph, GraphError};
