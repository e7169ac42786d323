//! Inter domain model.
//!
//! # Responsibility
//! - Define the symbol candidate stored as a node of a symbol graph.
//! - Provide lifecycle helpers for the removed/alive flag.
//!
//! # Invariants
//! - `id` is stable and never reused for another inter.
//! - An inter held by a graph is never flagged removed.

use crate::model::geometry::Rectangle;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of one inter, preserved across undo/redo and reload.
pub type InterId = Uuid;

/// Symbol type tag carried by every inter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    NoteheadBlack,
    NoteheadVoid,
    WholeNote,
    Stem,
    Beam,
    Ledger,
    Sharp,
    Flat,
    Natural,
    AugmentationDot,
    Slur,
    Clef,
    TimeSignature,
    Barline,
    Text,
}

impl Shape {
    pub fn is_head(self) -> bool {
        matches!(
            self,
            Shape::NoteheadBlack | Shape::NoteheadVoid | Shape::WholeNote
        )
    }

    pub fn is_accidental(self) -> bool {
        matches!(self, Shape::Sharp | Shape::Flat | Shape::Natural)
    }
}

/// One recognized symbol candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inter {
    pub id: InterId,
    pub shape: Shape,
    pub bounds: Rectangle,
    /// Recognition confidence in `[0, 1]`.
    pub grade: f64,
    #[serde(default)]
    removed: bool,
}

impl Inter {
    /// Creates an inter with a generated stable ID.
    pub fn new(shape: Shape, bounds: Rectangle, grade: f64) -> Self {
        Self::with_id(Uuid::new_v4(), shape, bounds, grade)
    }

    /// Creates an inter with a caller-provided stable ID.
    ///
    /// Grade values outside `[0, 1]` are clamped.
    pub fn with_id(id: InterId, shape: Shape, bounds: Rectangle, grade: f64) -> Self {
        Self {
            id,
            shape,
            bounds,
            grade: grade.clamp(0.0, 1.0),
            removed: false,
        }
    }

    /// Flags this inter as removed from its graph.
    pub fn mark_removed(&mut self) {
        self.removed = true;
    }

    /// Clears the removed flag before re-insertion.
    pub fn restore(&mut self) {
        self.removed = false;
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }
}

impl Display for Inter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}#{}", self.shape, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::{Inter, Shape};
    use crate::model::geometry::Rectangle;

    #[test]
    fn new_inter_is_alive_and_grade_is_clamped() {
        let inter = Inter::new(Shape::Stem, Rectangle::new(0, 0, 2, 30), 1.7);
        assert!(!inter.is_removed());
        assert_eq!(inter.grade, 1.0);
    }

    #[test]
    fn removed_flag_round_trips() {
        let mut inter = Inter::new(Shape::Sharp, Rectangle::new(0, 0, 8, 20), 0.8);
        inter.mark_removed();
        assert!(inter.is_removed());
        inter.restore();
        assert!(!inter.is_removed());
        assert!(Shape::Sharp.is_accidental());
        assert!(Shape::WholeNote.is_head());
    }
}
