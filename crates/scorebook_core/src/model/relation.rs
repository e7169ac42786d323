//! Relation edges and deferred partnerships.
//!
//! # Invariants
//! - Undirected relations are stored with `source <= target`, so both
//!   orientations denote the same edge.
//! - A `Partnership` is consumed once, when its owning inter enters a graph.

use crate::model::inter::InterId;
use serde::{Deserialize, Serialize};

/// Relation type between two inters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// Head -> stem.
    HeadStem,
    /// Beam -> stem.
    BeamStem,
    /// Accidental -> head.
    AlterHead,
    /// Augmentation dot -> head.
    AugmentationDot,
    /// Slur -> head at either end.
    SlurHead,
    /// Ledger -> head.
    LedgerHead,
    /// Mutually exclusive interpretations.
    Exclusion,
}

impl RelationKind {
    pub fn is_directed(self) -> bool {
        !matches!(self, RelationKind::Exclusion)
    }
}

/// Concrete edge of a symbol graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Relation {
    pub kind: RelationKind,
    pub source: InterId,
    pub target: InterId,
}

impl Relation {
    /// Builds a relation, normalizing endpoint order for undirected kinds.
    pub fn new(kind: RelationKind, source: InterId, target: InterId) -> Self {
        if !kind.is_directed() && target < source {
            return Self {
                kind,
                source: target,
                target: source,
            };
        }
        Self {
            kind,
            source,
            target,
        }
    }

    /// Same edge in canonical endpoint order.
    pub fn normalized(self) -> Self {
        Self::new(self.kind, self.source, self.target)
    }

    pub fn touches(&self, id: InterId) -> bool {
        self.source == id || self.target == id
    }

    /// Opposite endpoint as seen from `id`, if `id` is an endpoint.
    pub fn other_end(&self, id: InterId) -> Option<InterId> {
        if self.source == id {
            Some(self.target)
        } else if self.target == id {
            Some(self.source)
        } else {
            None
        }
    }
}

/// Relation descriptor not yet attached to a concrete inter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Partnership {
    pub kind: RelationKind,
    pub partner: InterId,
    /// `true` when the owning inter is the relation source.
    pub outgoing: bool,
}

impl Partnership {
    pub fn new(kind: RelationKind, partner: InterId, outgoing: bool) -> Self {
        Self {
            kind,
            partner,
            outgoing,
        }
    }

    /// Partnership that recreates `relation` around `inter`.
    ///
    /// Returns `None` when `inter` is not an endpoint of `relation`.
    pub fn from_relation(relation: &Relation, inter: InterId) -> Option<Self> {
        let partner = relation.other_end(inter)?;
        Some(Self::new(relation.kind, partner, relation.source == inter))
    }

    /// Concrete relation obtained when this partnership is owned by `inter`.
    pub fn relation_for(&self, inter: InterId) -> Relation {
        if self.outgoing {
            Relation::new(self.kind, inter, self.partner)
        } else {
            Relation::new(self.kind, self.partner, inter)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Partnership, Relation, RelationKind};
    use uuid::Uuid;

    #[test]
    fn undirected_relation_is_normalized() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(
            Relation::new(RelationKind::Exclusion, a, b),
            Relation::new(RelationKind::Exclusion, b, a)
        );
        assert_ne!(
            Relation::new(RelationKind::HeadStem, a, b),
            Relation::new(RelationKind::HeadStem, b, a)
        );
    }

    #[test]
    fn partnership_recreates_original_relation() {
        let head = Uuid::new_v4();
        let stem = Uuid::new_v4();
        let relation = Relation::new(RelationKind::HeadStem, head, stem);

        let from_head = Partnership::from_relation(&relation, head).expect("head is endpoint");
        assert!(from_head.outgoing);
        assert_eq!(from_head.relation_for(head), relation);

        let from_stem = Partnership::from_relation(&relation, stem).expect("stem is endpoint");
        assert!(!from_stem.outgoing);
        assert_eq!(from_stem.relation_for(stem), relation);

        assert!(Partnership::from_relation(&relation, Uuid::new_v4()).is_none());
    }
}
