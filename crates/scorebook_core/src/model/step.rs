//! Pipeline step enumeration.
//!
//! # Responsibility
//! - Define the fixed processing order applied to every sheet.
//! - Provide stable text names used by persisted stub records.
//!
//! # Invariants
//! - Declaration order is the pipeline order; `Ord` follows it.
//! - `Step::Load` is always the first step.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// One stage of the sheet analysis pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Step {
    /// Sheet image is read and the blank sheet structure is created.
    Load,
    /// Gray image is binarized with the sheet pixel filter.
    Binary,
    /// Interline and line thickness are measured.
    Scale,
    /// Staff lines, bar lines and systems are retrieved.
    Grid,
    /// Clefs, keys and time signatures at system start.
    Headers,
    /// Stem candidates are seeded.
    StemSeeds,
    Beams,
    Ledgers,
    Heads,
    Stems,
    /// Conflicting inters are reduced.
    Reduction,
    /// Text lines are recognized with the sheet language.
    Texts,
    Symbols,
    /// Symbol relations are finalized.
    Links,
    Rhythms,
    /// Sheet is connected to its page structure.
    Page,
}

impl Step {
    /// All steps in pipeline order.
    pub const ALL: [Step; 16] = [
        Step::Load,
        Step::Binary,
        Step::Scale,
        Step::Grid,
        Step::Headers,
        Step::StemSeeds,
        Step::Beams,
        Step::Ledgers,
        Step::Heads,
        Step::Stems,
        Step::Reduction,
        Step::Texts,
        Step::Symbols,
        Step::Links,
        Step::Rhythms,
        Step::Page,
    ];

    /// First step of the pipeline.
    pub fn first() -> Step {
        Step::ALL[0]
    }

    /// Steps from the pipeline start up to and including `self`.
    pub fn up_to(self) -> impl Iterator<Item = Step> {
        Step::ALL.into_iter().take_while(move |step| *step <= self)
    }

    /// Stable persisted name.
    pub fn as_str(self) -> &'static str {
        match self {
            Step::Load => "LOAD",
            Step::Binary => "BINARY",
            Step::Scale => "SCALE",
            Step::Grid => "GRID",
            Step::Headers => "HEADERS",
            Step::StemSeeds => "STEM_SEEDS",
            Step::Beams => "BEAMS",
            Step::Ledgers => "LEDGERS",
            Step::Heads => "HEADS",
            Step::Stems => "STEMS",
            Step::Reduction => "REDUCTION",
            Step::Texts => "TEXTS",
            Step::Symbols => "SYMBOLS",
            Step::Links => "LINKS",
            Step::Rhythms => "RHYTHMS",
            Step::Page => "PAGE",
        }
    }

    /// Parses a persisted name, case-insensitively.
    pub fn parse(value: &str) -> Option<Step> {
        let normalized = value.trim().to_ascii_uppercase();
        Step::ALL
            .into_iter()
            .find(|step| step.as_str() == normalized)
    }
}

impl Display for Step {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::Step;

    #[test]
    fn all_is_sorted_by_pipeline_order() {
        let mut sorted = Step::ALL;
        sorted.sort();
        assert_eq!(sorted, Step::ALL);
        assert_eq!(Step::first(), Step::Load);
    }

    #[test]
    fn up_to_includes_target_and_predecessors_only() {
        let steps: Vec<Step> = Step::Scale.up_to().collect();
        assert_eq!(steps, vec![Step::Load, Step::Binary, Step::Scale]);
    }

    #[test]
    fn parse_accepts_every_persisted_name() {
        for step in Step::ALL {
            assert_eq!(Step::parse(step.as_str()), Some(step));
        }
        assert_eq!(Step::parse(" stem_seeds "), Some(Step::StemSeeds));
        assert_eq!(Step::parse("unknown"), None);
    }
}
