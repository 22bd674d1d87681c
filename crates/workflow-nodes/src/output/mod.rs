//! Output nodes
//!
//! Nodes that display results.

mod display;

pub use display::{output_value, DisplayValue, UniversalDisplayTask};
