//! SQLite-backed book owning the stubs of one score.
//!
//! # Responsibility
//! - Create and open project files and rebuild stubs from their records.
//! - Serve as the `Container` of its stubs: storage, defaults, notifications.
//! - Expose per-stub lifecycle operations to callers.
//!
//! # Invariants
//! - Stubs are kept sorted by number and cover `1..=sheet_count` exactly.
//! - `store` writes book metadata, every stub and every resident sheet in one
//!   transaction; on success no stub is left modified.
//! - While a stub operation runs, that stub is detached from `stubs` and
//!   handed to `store` explicitly.

use crate::book::{BookError, BookResult, Container, SheetStorage, StubEvent};
use crate::config::ViewParameters;
use crate::db::{open_db, open_db_in_memory, open_db_read_only, DbError};
use crate::model::params::{normalize_language, FilterDescriptor, DEFAULT_LANGUAGE};
use crate::model::step::Step;
use crate::repo::project_repo::{
    BookRecord, ProjectRepository, ProjectSnapshot, RepoError, SqliteProjectRepository,
};
use crate::sheet::codec::encode_sheet;
use crate::sheet::pipeline::StepRunner;
use crate::sheet::stub::{SheetStub, StubResult};
use crate::sheet::Sheet;
use crate::sig::task::InterTask;
use log::{debug, error, info};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Instant;

/// Book-wide parameter defaults inherited by every stub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookDefaults {
    pub filter: FilterDescriptor,
    pub language: String,
}

impl Default for BookDefaults {
    fn default() -> Self {
        Self {
            filter: FilterDescriptor::default(),
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

/// Score book persisted in one SQLite project file.
pub struct SqliteBook {
    conn: Connection,
    /// `None` for in-memory books.
    path: Option<PathBuf>,
    radix: String,
    sheet_count: u32,
    defaults: BookDefaults,
    multi_book: bool,
    closing: bool,
    modified: bool,
    history_limit: Option<usize>,
    events: Option<Sender<StubEvent>>,
    stubs: Vec<SheetStub>,
}

impl SqliteBook {
    /// Creates a new book of `sheet_count` blank stubs in the project file at
    /// `path`.
    pub fn create(
        path: impl AsRef<Path>,
        radix: &str,
        sheet_count: u32,
        defaults: BookDefaults,
    ) -> BookResult<Self> {
        let path = path.as_ref();
        let conn = open_db(path)?;
        if SqliteProjectRepository::try_new(&conn)?.load_book()?.is_some() {
            error!(
                "event=book_create module=book status=error error_code=project_exists path={}",
                path.display()
            );
            return Err(BookError::ProjectExists(path.to_path_buf()));
        }
        Self::initialize(conn, Some(path.to_path_buf()), radix, sheet_count, defaults)
    }

    /// Creates a book backed by an in-memory database.
    pub fn create_in_memory(
        radix: &str,
        sheet_count: u32,
        defaults: BookDefaults,
    ) -> BookResult<Self> {
        let conn = open_db_in_memory()?;
        Self::initialize(conn, None, radix, sheet_count, defaults)
    }

    /// Opens an existing project file and rebuilds its stubs.
    pub fn open(path: impl AsRef<Path>) -> BookResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DbError::MissingProject(path.to_path_buf()).into());
        }

        let started_at = Instant::now();
        let conn = open_db(path)?;
        let (record, stub_records) = {
            let repo = SqliteProjectRepository::try_new(&conn)?;
            let record = repo.load_book()?.ok_or_else(|| {
                RepoError::InvalidData("project file holds no book record".to_string())
            })?;
            (record, repo.list_stubs()?)
        };

        let numbers: Vec<u32> = stub_records.iter().map(|stub| stub.number).collect();
        if !numbers.iter().copied().eq(1..=record.sheet_count) {
            return Err(RepoError::InvalidData(format!(
                "stub numbers {numbers:?} do not cover sheets 1..={}",
                record.sheet_count
            ))
            .into());
        }

        let mut book = Self::with_connection(
            conn,
            Some(path.to_path_buf()),
            record.radix,
            record.sheet_count,
            BookDefaults {
                filter: record.filter,
                language: record.language,
            },
        );
        book.stubs = stub_records
            .into_iter()
            .map(|stub| SheetStub::attach(stub, &book))
            .collect();

        info!(
            "event=book_open module=book status=ok radix={} sheets={} duration_ms={}",
            book.radix,
            book.sheet_count,
            started_at.elapsed().as_millis()
        );
        Ok(book)
    }

    fn initialize(
        conn: Connection,
        path: Option<PathBuf>,
        radix: &str,
        sheet_count: u32,
        defaults: BookDefaults,
    ) -> BookResult<Self> {
        if sheet_count == 0 {
            return Err(BookError::EmptyBook);
        }
        let defaults = BookDefaults {
            language: normalize_language(&defaults.language)?,
            ..defaults
        };

        let mut book = Self::with_connection(conn, path, radix.to_string(), sheet_count, defaults);
        book.stubs = (1..=sheet_count)
            .map(|number| SheetStub::new(number, &book))
            .collect();
        book.store_stubs(None)?;

        info!(
            "event=book_create module=book status=ok radix={} sheets={}",
            book.radix, book.sheet_count
        );
        Ok(book)
    }

    fn with_connection(
        conn: Connection,
        path: Option<PathBuf>,
        radix: String,
        sheet_count: u32,
        defaults: BookDefaults,
    ) -> Self {
        Self {
            conn,
            path,
            radix,
            sheet_count,
            defaults,
            multi_book: false,
            closing: false,
            modified: false,
            history_limit: None,
            events: None,
            stubs: Vec::new(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn sheet_count(&self) -> u32 {
        self.sheet_count
    }

    pub fn defaults(&self) -> &BookDefaults {
        &self.defaults
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Bounds the undo history of every sheet, resident or loaded later.
    pub fn set_history_limit(&mut self, limit: Option<usize>) {
        self.history_limit = limit;
        for sheet in self.stubs.iter_mut().filter_map(SheetStub::resident_sheet_mut) {
            sheet.set_history_limit(limit);
        }
    }

    /// Marks whether other books are open alongside this one.
    pub fn set_multi_book(&mut self, multi_book: bool) {
        self.multi_book = multi_book;
    }

    /// Starts delivering stub events to the returned receiver, replacing any
    /// previous subscription.
    pub fn subscribe(&mut self) -> Receiver<StubEvent> {
        let (sender, receiver) = mpsc::channel();
        self.events = Some(sender);
        receiver
    }

    pub fn stubs(&self) -> &[SheetStub] {
        &self.stubs
    }

    pub fn stub(&self, number: u32) -> Option<&SheetStub> {
        self.stub_index(number)
            .ok()
            .and_then(|index| self.stubs.get(index))
    }

    /// Stubs to present, hiding invalid sheets unless the view shows them.
    pub fn displayable_stubs<'a>(
        &'a self,
        view: &'a ViewParameters,
    ) -> impl Iterator<Item = &'a SheetStub> + 'a {
        self.stubs
            .iter()
            .filter(move |stub| view.invalid_sheet_display || stub.is_valid())
    }

    /// Persists the whole book.
    pub fn store(&mut self) -> BookResult<()> {
        self.store_stubs(None)
    }

    /// Runs the pipeline of stub `number` up to `step`.
    pub fn ensure_step(
        &mut self,
        number: u32,
        runner: &mut dyn StepRunner,
        step: Step,
    ) -> BookResult<bool> {
        self.with_stub(number, |stub, book| stub.ensure_step(book, runner, step))
    }

    /// Makes the sheet of stub `number` resident. Returns whether it is.
    pub fn load_sheet(&mut self, number: u32) -> BookResult<bool> {
        self.with_stub(number, |stub, book| stub.get_sheet(book).is_some())
    }

    /// Resident sheet of stub `number`, if any.
    pub fn sheet(&self, number: u32) -> Option<&Sheet> {
        self.stub(number).and_then(SheetStub::sheet)
    }

    pub fn swap_sheet(&mut self, number: u32) -> StubResult<()> {
        self.with_stub(number, |stub, book| stub.swap_sheet(book))?
    }

    /// Evicts every resident sheet, storing the book first when dirty.
    pub fn swap_all_sheets(&mut self) -> StubResult<()> {
        let resident: Vec<u32> = self
            .stubs
            .iter()
            .filter(|stub| stub.has_sheet())
            .map(SheetStub::number)
            .collect();
        for number in resident {
            self.swap_sheet(number)?;
        }
        Ok(())
    }

    pub fn invalidate(&mut self, number: u32) -> BookResult<()> {
        self.with_stub(number, |stub, book| stub.invalidate(book))
    }

    pub fn reset(&mut self, number: u32) -> BookResult<()> {
        self.with_stub(number, |stub, book| stub.reset(book))
    }

    pub fn set_stub_filter(
        &mut self,
        number: u32,
        filter: Option<FilterDescriptor>,
    ) -> BookResult<bool> {
        self.with_stub(number, |stub, book| stub.set_filter(filter, book))
    }

    pub fn set_stub_language(&mut self, number: u32, language: Option<&str>) -> StubResult<bool> {
        self.with_stub(number, |stub, book| stub.set_language(language, book))?
    }

    pub fn apply_task(&mut self, number: u32, task: Box<dyn InterTask>) -> StubResult<()> {
        self.with_stub(number, |stub, book| stub.apply_task(book, task))?
    }

    pub fn undo(&mut self, number: u32) -> StubResult<bool> {
        self.with_stub(number, |stub, book| stub.undo(book))?
    }

    pub fn redo(&mut self, number: u32) -> StubResult<bool> {
        self.with_stub(number, |stub, book| stub.redo(book))?
    }

    /// Removes stub `number`; removing the last one closes the book.
    pub fn close_stub(&mut self, number: u32) -> BookResult<()> {
        self.ensure_open()?;
        let index = self.stub_index(number)?;
        let stub = self.stubs.remove(index);
        stub.close(self);
        Ok(())
    }

    /// Closes the book and drops every stub. Unsaved changes are discarded.
    pub fn close_book(&mut self) {
        if self.closing {
            return;
        }
        self.closing = true;
        let dropped = std::mem::take(&mut self.stubs);
        info!(
            "event=book_close module=book status=ok radix={} stubs={} modified={}",
            self.radix,
            dropped.len(),
            self.modified
        );
    }

    fn ensure_open(&self) -> BookResult<()> {
        if self.closing {
            return Err(BookError::Closed);
        }
        Ok(())
    }

    fn stub_index(&self, number: u32) -> BookResult<usize> {
        self.stubs
            .binary_search_by_key(&number, SheetStub::number)
            .map_err(|_| BookError::UnknownStub(number))
    }

    /// Detaches stub `number` while `op` runs against the book.
    fn with_stub<R>(
        &mut self,
        number: u32,
        op: impl FnOnce(&mut SheetStub, &mut Self) -> R,
    ) -> BookResult<R> {
        self.ensure_open()?;
        let index = self.stub_index(number)?;
        let mut stub = self.stubs.remove(index);
        let result = op(&mut stub, self);
        self.stubs.insert(index, stub);
        Ok(result)
    }

    fn store_stubs(&mut self, current: Option<&SheetStub>) -> BookResult<()> {
        let started_at = Instant::now();
        let snapshot = self.snapshot(current)?;

        let stored = SqliteProjectRepository::try_new(&self.conn)
            .and_then(|repo| repo.store_snapshot(&snapshot));
        if let Err(err) = stored {
            error!(
                "event=book_store module=book status=error radix={} duration_ms={} error={}",
                self.radix,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }

        for stub in &mut self.stubs {
            stub.mark_clean();
        }
        self.modified = false;
        info!(
            "event=book_store module=book status=ok radix={} stubs={} sheets={} duration_ms={}",
            self.radix,
            snapshot.stubs.len(),
            snapshot.sheets.len(),
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    fn snapshot(&self, current: Option<&SheetStub>) -> BookResult<ProjectSnapshot> {
        let mut stubs: Vec<&SheetStub> = self.stubs.iter().chain(current).collect();
        stubs.sort_by_key(|stub| stub.number());

        let mut snapshot = ProjectSnapshot {
            book: Some(BookRecord {
                radix: self.radix.clone(),
                sheet_count: self.sheet_count,
                filter: self.defaults.filter,
                language: self.defaults.language.clone(),
            }),
            ..ProjectSnapshot::default()
        };
        for stub in stubs {
            snapshot.stubs.push(stub.to_record());
            if !stub.is_done(Step::Load) {
                snapshot.discarded_sheets.push(stub.number());
            } else if let Some(sheet) = stub.sheet() {
                snapshot.sheets.push((stub.number(), encode_sheet(sheet)?));
            }
        }
        Ok(snapshot)
    }
}

impl Container for SqliteBook {
    fn radix(&self) -> &str {
        &self.radix
    }

    fn is_multi_sheet(&self) -> bool {
        self.sheet_count > 1
    }

    fn is_multi_book(&self) -> bool {
        self.multi_book
    }

    fn is_closing(&self) -> bool {
        self.closing
    }

    fn remaining_stubs(&self) -> usize {
        self.stubs.len()
    }

    fn close(&mut self) {
        self.close_book();
    }

    fn set_modified(&mut self, modified: bool) {
        self.modified = modified;
    }

    fn default_filter(&self) -> FilterDescriptor {
        self.defaults.filter
    }

    fn default_language(&self) -> String {
        self.defaults.language.clone()
    }

    fn store(&mut self, current: &SheetStub) -> BookResult<()> {
        self.store_stubs(Some(current))
    }

    fn history_limit(&self) -> Option<usize> {
        self.history_limit
    }

    fn open_sheet_storage(&self, number: u32) -> BookResult<Box<dyn SheetStorage + '_>> {
        let conn = match &self.path {
            Some(path) => StorageConnection::Owned(open_db_read_only(path)?),
            None => StorageConnection::Shared(&self.conn),
        };
        debug!("event=sheet_storage module=book status=open number={number}");
        Ok(Box::new(SqliteSheetStorage { conn, number }))
    }

    fn create_sheet(&self, number: u32) -> BookResult<Sheet> {
        if number == 0 || number > self.sheet_count {
            return Err(BookError::SheetOutOfRange {
                number,
                sheet_count: self.sheet_count,
            });
        }
        Ok(Sheet::new(number))
    }

    fn notify(&self, event: StubEvent) {
        if let Some(sender) = &self.events {
            if sender.send(event).is_err() {
                debug!("event=stub_notify module=book status=skipped reason=no_receiver");
            }
        }
    }
}

enum StorageConnection<'a> {
    /// Dedicated read-only connection, closed with the handle.
    Owned(Connection),
    /// In-memory books can only be read through their own connection.
    Shared(&'a Connection),
}

struct SqliteSheetStorage<'a> {
    conn: StorageConnection<'a>,
    number: u32,
}

impl SheetStorage for SqliteSheetStorage<'_> {
    fn read_payload(&mut self) -> BookResult<String> {
        let conn = match &self.conn {
            StorageConnection::Owned(conn) => conn,
            StorageConnection::Shared(conn) => *conn,
        };
        SqliteProjectRepository::try_new(conn)?
            .load_sheet(self.number)?
            .ok_or(BookError::MissingSheet(self.number))
    }
}

impl Drop for SqliteSheetStorage<'_> {
    fn drop(&mut self) {
        debug!(
            "event=sheet_storage module=book status=closed number={}",
            self.number
        );
    }
}
