//! Inheritable processing parameters.
//!
//! # Responsibility
//! - Describe the binarization pixel filter and OCR text language.
//! - Resolve a sheet-local override against the book-wide default.
//!
//! # Invariants
//! - A `LiveParam` without local override always reports its inherited value.
//! - Text languages are `+`-joined three-letter lowercase codes.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

static LANGUAGE_SPEC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z]{3}(\+[a-z]{3})*$").expect("valid language regex"));

/// Default OCR language when nothing else is configured.
pub const DEFAULT_LANGUAGE: &str = "eng";

/// Binarization filter applied at `Step::Binary`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterDescriptor {
    /// Fixed gray threshold.
    Global { threshold: u8 },
    /// Threshold computed from local mean and standard deviation.
    Adaptive { mean_coeff: f64, std_dev_coeff: f64 },
}

impl Default for FilterDescriptor {
    fn default() -> Self {
        FilterDescriptor::Adaptive {
            mean_coeff: 0.7,
            std_dev_coeff: 0.9,
        }
    }
}

/// Rejected parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    InvalidLanguage(String),
}

impl Display for ParamError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLanguage(value) => {
                write!(f, "invalid text language `{value}`; expected e.g. `eng+deu`")
            }
        }
    }
}

impl Error for ParamError {}

/// Normalizes and validates a text language list such as `eng+ita`.
pub fn normalize_language(value: &str) -> Result<String, ParamError> {
    let normalized = value.trim().to_ascii_lowercase();
    if LANGUAGE_SPEC_RE.is_match(&normalized) {
        Ok(normalized)
    } else {
        Err(ParamError::InvalidLanguage(value.to_string()))
    }
}

/// Parameter value with an optional local override over an inherited default.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveParam<T: Clone> {
    inherited: T,
    specific: Option<T>,
}

impl<T: Clone> LiveParam<T> {
    pub fn new(inherited: T) -> Self {
        Self {
            inherited,
            specific: None,
        }
    }

    pub fn with_specific(inherited: T, specific: Option<T>) -> Self {
        Self {
            inherited,
            specific,
        }
    }

    /// Effective value: local override first, then inherited default.
    pub fn value(&self) -> &T {
        self.specific.as_ref().unwrap_or(&self.inherited)
    }

    pub fn specific(&self) -> Option<&T> {
        self.specific.as_ref()
    }

    pub fn inherited(&self) -> &T {
        &self.inherited
    }

    pub fn is_specific(&self) -> bool {
        self.specific.is_some()
    }

    /// Sets or clears the local override. Returns whether the effective value
    /// source changed.
    pub fn set_specific(&mut self, value: Option<T>) -> bool
    where
        T: PartialEq,
    {
        if self.specific == value {
            return false;
        }
        self.specific = value;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_language, FilterDescriptor, LiveParam, ParamError};

    #[test]
    fn live_param_prefers_specific_value() {
        let mut param = LiveParam::new(FilterDescriptor::default());
        assert!(!param.is_specific());
        assert_eq!(*param.value(), FilterDescriptor::default());

        let global = FilterDescriptor::Global { threshold: 140 };
        assert!(param.set_specific(Some(global)));
        assert!(!param.set_specific(Some(global)));
        assert_eq!(*param.value(), global);

        assert!(param.set_specific(None));
        assert_eq!(*param.value(), FilterDescriptor::default());
    }

    #[test]
    fn normalize_language_accepts_joined_codes() {
        assert_eq!(normalize_language(" ENG+deu ").unwrap(), "eng+deu");
        assert_eq!(
            normalize_language("english"),
            Err(ParamError::InvalidLanguage("english".to_string()))
        );
        assert!(normalize_language("eng+").is_err());
    }
}
