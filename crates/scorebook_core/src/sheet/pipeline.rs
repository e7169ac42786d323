//! Contract for the step algorithms that populate a sheet.
//!
//! Recognition itself lives outside this crate; a `StepRunner` receives the
//! resident sheet and the effective parameters of its stub.

use crate::model::params::FilterDescriptor;
use crate::model::step::Step;
use crate::sheet::Sheet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Effective parameters handed to a step algorithm.
#[derive(Debug, Clone, PartialEq)]
pub struct StepContext {
    pub number: u32,
    pub filter: FilterDescriptor,
    pub language: String,
}

/// Failure reported by a step algorithm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepError {
    pub step: Step,
    pub message: String,
}

impl StepError {
    pub fn new(step: Step, message: impl Into<String>) -> Self {
        Self {
            step,
            message: message.into(),
        }
    }
}

impl Display for StepError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "step {} failed: {}", self.step, self.message)
    }
}

impl Error for StepError {}

/// Executes one pipeline step on a resident sheet.
pub trait StepRunner {
    fn run(&mut self, step: Step, sheet: &mut Sheet, context: &StepContext)
        -> Result<(), StepError>;
}
