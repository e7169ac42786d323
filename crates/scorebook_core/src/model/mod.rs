//! Plain domain values shared by graph, sheet and book layers.
//!
//! # Responsibility
//! - Define pipeline steps, symbol nodes, relation edges and parameters.
//! - Stay free of storage and lifecycle concerns.
//!
//! # Invariants
//! - Every inter is identified by a stable `InterId`.
//! - Removal is represented by the inter removed flag plus graph detachment.

pub mod geometry;
pub mod inter;
pub mod params;
pub mod relation;
pub mod step;
