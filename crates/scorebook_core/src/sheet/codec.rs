//! Persisted encoding of sheets and stub step sets.
//!
//! # Responsibility
//! - Encode a resident sheet into its JSON payload and decode it back into a
//!   plain `SheetRecord`.
//! - Encode done-step sets as space separated step names.
//!
//! # Invariants
//! - Decoding never builds a `Sheet` directly; callers finish with
//!   `Sheet::attach`.
//! - Unknown step names are rejected instead of being dropped.

use crate::model::step::Step;
use crate::sheet::{Sheet, SheetRecord};
use crate::sig::graph::GraphError;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type CodecResult<T> = Result<T, CodecError>;

#[derive(Debug)]
pub enum CodecError {
    Json(serde_json::Error),
    Graph(GraphError),
    InvalidData(String),
}

impl Display for CodecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(err) => write!(f, "malformed sheet payload: {err}"),
            Self::Graph(err) => write!(f, "inconsistent sheet graph: {err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for CodecError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            Self::Graph(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<GraphError> for CodecError {
    fn from(value: GraphError) -> Self {
        Self::Graph(value)
    }
}

pub fn encode_sheet(sheet: &Sheet) -> CodecResult<String> {
    Ok(serde_json::to_string(&sheet.to_record())?)
}

pub fn decode_sheet(payload: &str) -> CodecResult<SheetRecord> {
    Ok(serde_json::from_str(payload)?)
}

pub fn encode_steps(steps: &BTreeSet<Step>) -> String {
    steps
        .iter()
        .map(|step| step.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn decode_steps(value: &str) -> CodecResult<BTreeSet<Step>> {
    value
        .split_whitespace()
        .map(|name| {
            Step::parse(name)
                .ok_or_else(|| CodecError::InvalidData(format!("unknown step name `{name}`")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{decode_sheet, decode_steps, encode_sheet, encode_steps, CodecError};
    use crate::model::step::Step;
    use crate::sheet::Sheet;
    use std::collections::BTreeSet;

    #[test]
    fn steps_are_written_in_pipeline_order() {
        let steps: BTreeSet<Step> = [Step::Grid, Step::Load, Step::Binary].into_iter().collect();
        assert_eq!(encode_steps(&steps), "LOAD BINARY GRID");
        assert_eq!(decode_steps("LOAD  BINARY GRID").unwrap(), steps);
        assert!(decode_steps("").unwrap().is_empty());
    }

    #[test]
    fn unknown_step_is_rejected() {
        let err = decode_steps("LOAD WARP").unwrap_err();
        assert!(matches!(err, CodecError::InvalidData(message) if message.contains("WARP")));
    }

    #[test]
    fn garbage_payload_is_a_json_error() {
        assert!(matches!(decode_sheet("{not json"), Err(CodecError::Json(_))));
        let payload = encode_sheet(&Sheet::new(4)).unwrap();
        assert_eq!(decode_sheet(&payload).unwrap().number, 4);
    }
}
