//! Heavy per-page payload and its lifecycle stub.
//!
//! # Responsibility
//! - Hold the symbol graph, derived layout and edit log of one sheet.
//! - Convert between the resident sheet and its plain persisted record.
//!
//! # Invariants
//! - A sheet is owned by exactly one `SheetStub` while resident.
//! - The edit log is transient: a reloaded sheet starts with empty history.
//! - `Sheet::attach` is the only way to turn a persisted record back into a
//!   sheet; it rebuilds every non-persisted index.

pub mod codec;
pub mod pipeline;
pub mod stub;
pub mod system;

use crate::sheet::codec::{CodecError, CodecResult};
use crate::sheet::system::SystemFrame;
use crate::sig::graph::{GraphRecord, SymbolGraph};
use crate::sig::history::EditLog;
use crate::sig::task::{EditResult, InterTask};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Plain persisted shape of a sheet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SheetRecord {
    pub number: u32,
    pub graph: GraphRecord,
    #[serde(default)]
    pub systems: Vec<SystemFrame>,
}

/// Resident materialization of one page.
#[derive(Debug)]
pub struct Sheet {
    number: u32,
    graph: SymbolGraph,
    systems: Vec<SystemFrame>,
    history: EditLog,
}

impl Sheet {
    /// Fresh, empty sheet for first-time processing.
    pub fn new(number: u32) -> Self {
        Self {
            number,
            graph: SymbolGraph::new(),
            systems: Vec::new(),
            history: EditLog::new(),
        }
    }

    /// Second construction phase after decoding: validates the record against
    /// the owning stub and rebuilds graph indices.
    pub fn attach(record: SheetRecord, number: u32) -> CodecResult<Self> {
        if record.number != number {
            return Err(CodecError::InvalidData(format!(
                "sheet record number {} does not match stub number {number}",
                record.number
            )));
        }

        let mut system_ids: Vec<u32> = record.systems.iter().map(|system| system.id).collect();
        system_ids.sort_unstable();
        system_ids.dedup();
        if system_ids.len() != record.systems.len() {
            return Err(CodecError::InvalidData(format!(
                "duplicate system id in sheet {number}"
            )));
        }

        let graph = SymbolGraph::from_record(record.graph)?;
        Ok(Self {
            number,
            graph,
            systems: record.systems,
            history: EditLog::new(),
        })
    }

    pub fn to_record(&self) -> SheetRecord {
        SheetRecord {
            number: self.number,
            graph: self.graph.to_record(),
            systems: self.systems.clone(),
        }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn graph(&self) -> &SymbolGraph {
        &self.graph
    }

    /// Direct graph access for step algorithms populating the sheet.
    ///
    /// Corrections should go through `apply_task` instead.
    pub fn graph_mut(&mut self) -> &mut SymbolGraph {
        &mut self.graph
    }

    pub fn systems(&self) -> &[SystemFrame] {
        &self.systems
    }

    pub fn set_systems(&mut self, systems: Vec<SystemFrame>) {
        self.systems = systems;
    }

    pub fn history(&self) -> &EditLog {
        &self.history
    }

    /// Bounds the number of edits kept for undo; `None` keeps them all.
    pub fn set_history_limit(&mut self, limit: Option<usize>) {
        self.history.set_capacity_limit(limit);
    }

    /// Applies `task` to the graph and records it in the edit log.
    pub fn apply_task(&mut self, task: Box<dyn InterTask>) -> EditResult<()> {
        self.history.push(task, &mut self.graph)
    }

    pub fn undo(&mut self) -> EditResult<bool> {
        self.history.undo(&mut self.graph)
    }

    pub fn redo(&mut self) -> EditResult<bool> {
        self.history.redo(&mut self.graph)
    }
}

impl Display for Sheet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sheet{{#{}}}", self.number)
    }
}

#[cfg(test)]
mod tests {
    use super::{Sheet, SheetRecord};
    use crate::model::geometry::Rectangle;
    use crate::model::inter::{Inter, Shape};
    use crate::model::relation::{Relation, RelationKind};
    use crate::sheet::codec::CodecError;
    use crate::sheet::system::SystemFrame;
    use crate::sig::graph::GraphError;

    #[test]
    fn attach_restores_graph_and_systems() {
        let mut sheet = Sheet::new(3);
        let head = Inter::new(Shape::NoteheadBlack, Rectangle::new(1, 2, 10, 8), 0.9);
        let stem = Inter::new(Shape::Stem, Rectangle::new(10, 0, 2, 30), 0.8);
        let (head_id, stem_id) = (head.id, stem.id);
        sheet.graph_mut().add_inter(head).unwrap();
        sheet.graph_mut().add_inter(stem).unwrap();
        sheet
            .graph_mut()
            .add_relation(Relation::new(RelationKind::HeadStem, head_id, stem_id))
            .unwrap();
        sheet.set_systems(vec![SystemFrame::new(
            1,
            vec![1, 2],
            Rectangle::new(0, 0, 100, 50),
        )]);

        let reloaded = Sheet::attach(sheet.to_record(), 3).unwrap();
        assert_eq!(reloaded.graph(), sheet.graph());
        assert_eq!(reloaded.systems(), sheet.systems());
        assert!(reloaded.history().is_empty());
    }

    #[test]
    fn attach_rejects_mismatched_number() {
        let err = Sheet::attach(Sheet::new(2).to_record(), 5).unwrap_err();
        assert!(matches!(err, CodecError::InvalidData(_)));
    }

    #[test]
    fn attach_rejects_dangling_relation() {
        let head = Inter::new(Shape::NoteheadBlack, Rectangle::new(1, 2, 10, 8), 0.9);
        let mut record = SheetRecord {
            number: 1,
            ..SheetRecord::default()
        };
        let missing = Inter::new(Shape::Stem, Rectangle::default(), 0.1);
        let relation = Relation::new(RelationKind::HeadStem, head.id, missing.id);
        record.graph.inters.push(head);
        record.graph.relations.push(relation);

        let err = Sheet::attach(record, 1).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Graph(GraphError::DanglingRelation(_))
        ));
    }
}
