//! Symbol interpretation graph.
//!
//! # Responsibility
//! - Own the inters of one sheet and the relations between them.
//! - Keep a per-shape lookup index in sync with node membership.
//!
//! # Invariants
//! - A relation never references an inter absent from the graph.
//! - Removing an inter detaches every incident relation.
//! - Inters held by the graph are never flagged removed.
//! - The shape index is derived data; it is rebuilt, never persisted.

use crate::model::geometry::Rectangle;
use crate::model::inter::{Inter, InterId, Shape};
use crate::model::relation::Relation;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type GraphResult<T> = Result<T, GraphError>;

/// Structural graph violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    UnknownInter(InterId),
    DuplicateInter(InterId),
    DanglingRelation(Relation),
    SelfRelation(InterId),
}

impl Display for GraphError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownInter(id) => write!(f, "inter not in graph: {id}"),
            Self::DuplicateInter(id) => write!(f, "inter already in graph: {id}"),
            Self::DanglingRelation(relation) => write!(
                f,
                "relation {:?} references missing inter ({} -> {})",
                relation.kind, relation.source, relation.target
            ),
            Self::SelfRelation(id) => write!(f, "relation from inter {id} to itself"),
        }
    }
}

impl Error for GraphError {}

/// Plain persisted shape of a graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphRecord {
    pub inters: Vec<Inter>,
    pub relations: Vec<Relation>,
}

/// Mutable graph of inters and typed relations.
#[derive(Debug, Clone, Default)]
pub struct SymbolGraph {
    inters: BTreeMap<InterId, Inter>,
    relations: BTreeSet<Relation>,
    by_shape: BTreeMap<Shape, BTreeSet<InterId>>,
}

impl PartialEq for SymbolGraph {
    fn eq(&self, other: &Self) -> bool {
        // Derived index is not part of the observable state.
        self.inters == other.inters && self.relations == other.relations
    }
}

impl SymbolGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a graph from its persisted record, validating every relation.
    pub fn from_record(record: GraphRecord) -> GraphResult<Self> {
        let mut graph = Self::new();
        for inter in record.inters {
            graph.add_inter(inter)?;
        }
        for relation in record.relations {
            graph.add_relation(relation)?;
        }
        Ok(graph)
    }

    pub fn to_record(&self) -> GraphRecord {
        GraphRecord {
            inters: self.inters.values().cloned().collect(),
            relations: self.relations.iter().copied().collect(),
        }
    }

    pub fn inter_count(&self) -> usize {
        self.inters.len()
    }

    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inters.is_empty()
    }

    pub fn contains(&self, id: InterId) -> bool {
        self.inters.contains_key(&id)
    }

    pub fn inter(&self, id: InterId) -> Option<&Inter> {
        self.inters.get(&id)
    }

    /// Inters ordered by id.
    pub fn inters(&self) -> impl Iterator<Item = &Inter> {
        self.inters.values()
    }

    pub fn relations(&self) -> impl Iterator<Item = &Relation> {
        self.relations.iter()
    }

    pub fn contains_relation(&self, relation: &Relation) -> bool {
        self.relations.contains(&relation.normalized())
    }

    /// Relations having `id` as source or target.
    pub fn relations_of(&self, id: InterId) -> Vec<Relation> {
        self.relations
            .iter()
            .filter(|relation| relation.touches(id))
            .copied()
            .collect()
    }

    pub fn inters_of_shape(&self, shape: Shape) -> Vec<&Inter> {
        let Some(ids) = self.by_shape.get(&shape) else {
            return vec![];
        };
        ids.iter().filter_map(|id| self.inters.get(id)).collect()
    }

    /// Inserts an alive inter.
    pub fn add_inter(&mut self, mut inter: Inter) -> GraphResult<()> {
        if self.inters.contains_key(&inter.id) {
            return Err(GraphError::DuplicateInter(inter.id));
        }
        inter.restore();
        self.by_shape.entry(inter.shape).or_default().insert(inter.id);
        self.inters.insert(inter.id, inter);
        Ok(())
    }

    /// Takes an inter out of the graph together with its incident relations.
    ///
    /// The returned inter is flagged removed; the returned relations are the
    /// detached edges, in graph order.
    pub fn remove_inter(&mut self, id: InterId) -> GraphResult<(Inter, Vec<Relation>)> {
        let mut inter = self
            .inters
            .remove(&id)
            .ok_or(GraphError::UnknownInter(id))?;

        let detached = self.relations_of(id);
        self.relations.retain(|relation| !relation.touches(id));

        if let Some(ids) = self.by_shape.get_mut(&inter.shape) {
            ids.remove(&id);
            if ids.is_empty() {
                self.by_shape.remove(&inter.shape);
            }
        }

        inter.mark_removed();
        Ok((inter, detached))
    }

    /// Inserts a relation between two present inters.
    ///
    /// Undirected relations are stored in canonical endpoint order whatever
    /// orientation they arrive in.
    ///
    /// Returns `false` when the same relation already exists.
    pub fn add_relation(&mut self, relation: Relation) -> GraphResult<bool> {
        let relation = relation.normalized();
        if relation.source == relation.target {
            return Err(GraphError::SelfRelation(relation.source));
        }
        if !self.contains(relation.source) || !self.contains(relation.target) {
            return Err(GraphError::DanglingRelation(relation));
        }
        Ok(self.relations.insert(relation))
    }

    pub fn remove_relation(&mut self, relation: &Relation) -> bool {
        self.relations.remove(&relation.normalized())
    }

    /// Replaces inter bounds and returns the previous bounds.
    pub fn set_bounds(&mut self, id: InterId, bounds: Rectangle) -> GraphResult<Rectangle> {
        let inter = self
            .inters
            .get_mut(&id)
            .ok_or(GraphError::UnknownInter(id))?;
        Ok(std::mem::replace(&mut inter.bounds, bounds))
    }
}
