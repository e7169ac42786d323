//! Symbol interpretation graph and its reversible edit machinery.
//!
//! # Responsibility
//! - Hold recognized symbols and relations of one sheet.
//! - Express user corrections as tasks recorded in a linear edit log.
//!
//! # Invariants
//! - Graph mutations coming from corrections go through `InterTask`s so they
//!   can be undone.
//! - Edit faults are returned, never swallowed.

pub mod graph;
pub mod history;
pub mod task;
