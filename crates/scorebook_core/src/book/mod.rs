//! Book container contracts consumed by sheet stubs.
//!
//! # Responsibility
//! - Define the narrow interface a stub needs from its containing book.
//! - Define scoped sheet storage handles and stub notification events.
//!
//! # Invariants
//! - A `SheetStorage` handle is released when dropped; callers keep it in the
//!   narrowest scope that covers the read.
//! - `Container::notify` never blocks and never fails the calling operation.

pub mod sqlite_book;

use crate::db::DbError;
use crate::model::params::{FilterDescriptor, ParamError};
use crate::repo::project_repo::RepoError;
use crate::sheet::codec::CodecError;
use crate::sheet::stub::SheetStub;
use crate::sheet::Sheet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub type BookResult<T> = Result<T, BookError>;

#[derive(Debug)]
pub enum BookError {
    Db(DbError),
    Repo(RepoError),
    Codec(CodecError),
    Param(ParamError),
    /// No persisted payload exists for this stub number.
    MissingSheet(u32),
    SheetOutOfRange { number: u32, sheet_count: u32 },
    UnknownStub(u32),
    /// A book needs at least one sheet.
    EmptyBook,
    /// `create` on a file that already holds a book.
    ProjectExists(PathBuf),
    Closed,
}

impl Display for BookError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Codec(err) => write!(f, "{err}"),
            Self::Param(err) => write!(f, "{err}"),
            Self::MissingSheet(number) => write!(f, "no persisted sheet #{number}"),
            Self::SheetOutOfRange {
                number,
                sheet_count,
            } => write!(f, "sheet #{number} outside book of {sheet_count} sheet(s)"),
            Self::UnknownStub(number) => write!(f, "no stub #{number} in book"),
            Self::EmptyBook => write!(f, "a book needs at least one sheet"),
            Self::ProjectExists(path) => {
                write!(f, "project already holds a book: {}", path.display())
            }
            Self::Closed => write!(f, "book is closed"),
        }
    }
}

impl Error for BookError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Codec(err) => Some(err),
            Self::Param(err) => Some(err),
            Self::MissingSheet(_)
            | Self::SheetOutOfRange { .. }
            | Self::UnknownStub(_)
            | Self::EmptyBook
            | Self::ProjectExists(_)
            | Self::Closed => None,
        }
    }
}

impl From<DbError> for BookError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<RepoError> for BookError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<CodecError> for BookError {
    fn from(value: CodecError) -> Self {
        Self::Codec(value)
    }
}

impl From<ParamError> for BookError {
    fn from(value: ParamError) -> Self {
        Self::Param(value)
    }
}

/// Stub state change reported to a presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StubEvent {
    ValidityChanged { number: u32, id: String, valid: bool },
    SheetUnloaded { number: u32, id: String },
    StructuralReset { number: u32, id: String },
}

impl StubEvent {
    pub fn number(&self) -> u32 {
        match self {
            Self::ValidityChanged { number, .. }
            | Self::SheetUnloaded { number, .. }
            | Self::StructuralReset { number, .. } => *number,
        }
    }
}

/// Open handle on the persisted form of one sheet.
pub trait SheetStorage {
    /// Reads the persisted sheet payload.
    fn read_payload(&mut self) -> BookResult<String>;
}

/// Narrow view of the containing book used by `SheetStub`.
pub trait Container {
    /// Base name shared by all stub identifiers.
    fn radix(&self) -> &str;

    fn is_multi_sheet(&self) -> bool;

    /// Whether several books are open at the same time.
    fn is_multi_book(&self) -> bool;

    fn is_closing(&self) -> bool;

    /// Stubs still held by the book, not counting one being closed.
    fn remaining_stubs(&self) -> usize;

    fn close(&mut self);

    fn set_modified(&mut self, modified: bool);

    /// Book default for the pixel filter.
    fn default_filter(&self) -> FilterDescriptor;

    /// Book default for the OCR text language.
    fn default_language(&self) -> String;

    /// Persists every stub of the book; `current` is the stub asking for it,
    /// temporarily not reachable through the book itself.
    fn store(&mut self, current: &SheetStub) -> BookResult<()>;

    /// Opens the persisted form of sheet `number`.
    fn open_sheet_storage(&self, number: u32) -> BookResult<Box<dyn SheetStorage + '_>>;

    /// Most edits a resident sheet keeps for undo; `None` keeps them all.
    fn history_limit(&self) -> Option<usize> {
        None
    }

    /// Builds a blank sheet for first-time processing.
    fn create_sheet(&self, number: u32) -> BookResult<Sheet> {
        Ok(Sheet::new(number))
    }

    fn notify(&self, event: StubEvent);
}
