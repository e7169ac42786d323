//! Physical system layout derived by the grid step.

use crate::model::geometry::Rectangle;
use serde::{Deserialize, Serialize};

/// One system of staves on a sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemFrame {
    /// 1-based system id within the sheet.
    pub id: u32,
    /// Staff ids, top to bottom.
    pub staff_ids: Vec<u32>,
    pub bounds: Rectangle,
}

impl SystemFrame {
    pub fn new(id: u32, staff_ids: Vec<u32>, bounds: Rectangle) -> Self {
        Self {
            id,
            staff_ids,
            bounds,
        }
    }

    pub fn first_staff(&self) -> Option<u32> {
        self.staff_ids.first().copied()
    }

    pub fn last_staff(&self) -> Option<u32> {
        self.staff_ids.last().copied()
    }

    pub fn contains_staff(&self, staff_id: u32) -> bool {
        self.staff_ids.contains(&staff_id)
    }
}
