//! Reversible edit tasks over a symbol graph.
//!
//! # Responsibility
//! - Capture one mutation intent (add, remove, modify an inter).
//! - Apply, reverse and replay that mutation on a caller-provided graph.
//!
//! # Invariants
//! - Tasks are immutable after construction; inter identity is preserved
//!   across undo/redo.
//! - An addition never carries two partnerships for the same edge.
//! - Insertion checks every partner before mutating, so a failed apply
//!   leaves the graph untouched.
//! - Any graph mismatch during apply/undo is a fault returned to the caller.

use crate::model::geometry::Rectangle;
use crate::model::inter::{Inter, InterId};
use crate::model::relation::{Partnership, Relation};
use crate::sig::graph::{GraphError, SymbolGraph};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

pub type EditResult<T> = Result<T, EditError>;

/// Task phase during which a fault was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPhase {
    Do,
    Undo,
    Redo,
}

impl TaskPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Do => "do",
            Self::Undo => "undo",
            Self::Redo => "redo",
        }
    }
}

/// Edit task failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    /// Task cannot be built because its inter is not in the graph.
    UnknownInter(InterId),
    /// Task cannot be built because two partnerships describe the same edge.
    DuplicatePartnership(Relation),
    /// Graph state does not match what the task expects.
    Inconsistent {
        action: &'static str,
        phase: TaskPhase,
        source: GraphError,
    },
}

impl Display for EditError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownInter(id) => write!(f, "cannot build edit task: inter not in graph: {id}"),
            Self::DuplicatePartnership(relation) => write!(
                f,
                "cannot build edit task: relation {:?} ({} -> {}) listed twice",
                relation.kind, relation.source, relation.target
            ),
            Self::Inconsistent {
                action,
                phase,
                source,
            } => write!(
                f,
                "edit log out of sync with graph during `{action}` {}: {source}",
                phase.as_str()
            ),
        }
    }
}

impl Error for EditError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::UnknownInter(_) | Self::DuplicatePartnership(_) => None,
            Self::Inconsistent { source, .. } => Some(source),
        }
    }
}

/// Reversible command mutating a symbol graph.
pub trait InterTask: Debug {
    /// Applies the mutation for the first time.
    fn perform_do(&self, graph: &mut SymbolGraph) -> EditResult<()>;

    /// Reverses the effect of the last `perform_do`/`perform_redo`.
    fn perform_undo(&self, graph: &mut SymbolGraph) -> EditResult<()>;

    /// Re-applies the mutation after an undo; replays `perform_do` unless a
    /// task kind needs its own path.
    fn perform_redo(&self, graph: &mut SymbolGraph) -> EditResult<()> {
        self.perform_do(graph)
    }

    /// Short verb used in logs and undo/redo labels.
    fn action_name(&self) -> &'static str;

    fn inter_id(&self) -> InterId;
}

fn fault(action: &'static str, phase: TaskPhase) -> impl Fn(GraphError) -> EditError {
    move |source| EditError::Inconsistent {
        action,
        phase,
        source,
    }
}

/// Inserts `inter` with `bounds` and recreates its partnerships.
fn insert_with_partnerships(
    graph: &mut SymbolGraph,
    inter: &Inter,
    bounds: Rectangle,
    partnerships: &[Partnership],
    action: &'static str,
    phase: TaskPhase,
) -> EditResult<()> {
    let fault = fault(action, phase);
    if graph.contains(inter.id) {
        return Err(fault(GraphError::DuplicateInter(inter.id)));
    }
    for partnership in partnerships {
        if partnership.partner == inter.id {
            return Err(fault(GraphError::SelfRelation(inter.id)));
        }
        if !graph.contains(partnership.partner) {
            return Err(fault(GraphError::DanglingRelation(
                partnership.relation_for(inter.id),
            )));
        }
    }

    let mut inter = inter.clone();
    inter.bounds = bounds;
    let id = inter.id;
    graph.add_inter(inter).map_err(&fault)?;
    for partnership in partnerships {
        graph
            .add_relation(partnership.relation_for(id))
            .map_err(&fault)?;
    }
    Ok(())
}

/// Adds an inter together with its relations.
#[derive(Debug, Clone)]
pub struct AdditionTask {
    inter: Inter,
    initial_bounds: Rectangle,
    partnerships: Vec<Partnership>,
}

impl AdditionTask {
    /// Builds an addition of `inter` placed at `initial_bounds`.
    ///
    /// # Errors
    /// - `EditError::DuplicatePartnership` when two partnerships yield the
    ///   same edge, including both orientations of an undirected kind.
    pub fn new(
        inter: Inter,
        initial_bounds: Rectangle,
        partnerships: Vec<Partnership>,
    ) -> EditResult<Self> {
        let mut seen = BTreeSet::new();
        for partnership in &partnerships {
            let relation = partnership.relation_for(inter.id);
            if !seen.insert(relation) {
                return Err(EditError::DuplicatePartnership(relation));
            }
        }
        Ok(Self {
            inter,
            initial_bounds,
            partnerships,
        })
    }

    pub fn initial_bounds(&self) -> Rectangle {
        self.initial_bounds
    }

    pub fn partnerships(&self) -> &[Partnership] {
        &self.partnerships
    }
}

impl InterTask for AdditionTask {
    fn perform_do(&self, graph: &mut SymbolGraph) -> EditResult<()> {
        insert_with_partnerships(
            graph,
            &self.inter,
            self.initial_bounds,
            &self.partnerships,
            self.action_name(),
            TaskPhase::Do,
        )
    }

    fn perform_undo(&self, graph: &mut SymbolGraph) -> EditResult<()> {
        graph
            .remove_inter(self.inter.id)
            .map(|_| ())
            .map_err(fault(self.action_name(), TaskPhase::Undo))
    }

    fn action_name(&self) -> &'static str {
        "add"
    }

    fn inter_id(&self) -> InterId {
        self.inter.id
    }
}

/// Removes an inter, remembering enough state to put it back.
#[derive(Debug, Clone)]
pub struct RemovalTask {
    inter: Inter,
    partnerships: Vec<Partnership>,
}

impl RemovalTask {
    /// Captures the inter, its bounds and its relations as currently in `graph`.
    pub fn new(graph: &SymbolGraph, id: InterId) -> EditResult<Self> {
        let inter = graph.inter(id).cloned().ok_or(EditError::UnknownInter(id))?;
        let partnerships = graph
            .relations_of(id)
            .iter()
            .filter_map(|relation| Partnership::from_relation(relation, id))
            .collect();
        Ok(Self {
            inter,
            partnerships,
        })
    }

    pub fn partnerships(&self) -> &[Partnership] {
        &self.partnerships
    }
}

impl InterTask for RemovalTask {
    fn perform_do(&self, graph: &mut SymbolGraph) -> EditResult<()> {
        graph
            .remove_inter(self.inter.id)
            .map(|_| ())
            .map_err(fault(self.action_name(), TaskPhase::Do))
    }

    fn perform_undo(&self, graph: &mut SymbolGraph) -> EditResult<()> {
        insert_with_partnerships(
            graph,
            &self.inter,
            self.inter.bounds,
            &self.partnerships,
            self.action_name(),
            TaskPhase::Undo,
        )
    }

    fn action_name(&self) -> &'static str {
        "remove"
    }

    fn inter_id(&self) -> InterId {
        self.inter.id
    }
}

/// Changes the bounds of an inter already in the graph.
#[derive(Debug, Clone)]
pub struct ModificationTask {
    inter_id: InterId,
    old_bounds: Rectangle,
    new_bounds: Rectangle,
}

impl ModificationTask {
    pub fn new(graph: &SymbolGraph, id: InterId, new_bounds: Rectangle) -> EditResult<Self> {
        let inter = graph.inter(id).ok_or(EditError::UnknownInter(id))?;
        Ok(Self {
            inter_id: id,
            old_bounds: inter.bounds,
            new_bounds,
        })
    }

    pub fn old_bounds(&self) -> Rectangle {
        self.old_bounds
    }

    pub fn new_bounds(&self) -> Rectangle {
        self.new_bounds
    }
}

impl InterTask for ModificationTask {
    fn perform_do(&self, graph: &mut SymbolGraph) -> EditResult<()> {
        graph
            .set_bounds(self.inter_id, self.new_bounds)
            .map(|_| ())
            .map_err(fault(self.action_name(), TaskPhase::Do))
    }

    fn perform_undo(&self, graph: &mut SymbolGraph) -> EditResult<()> {
        graph
            .set_bounds(self.inter_id, self.old_bounds)
            .map(|_| ())
            .map_err(fault(self.action_name(), TaskPhase::Undo))
    }

    fn action_name(&self) -> &'static str {
        "edit"
    }

    fn inter_id(&self) -> InterId {
        self.inter_id
    }
}
