//! Sheet stub lifecycle state machine.
//!
//! # Responsibility
//! - Track done steps, validity and modification of one page, always
//!   resident, independently of the heavy `Sheet`.
//! - Materialize the sheet on demand (fresh or reloaded) and evict it.
//! - Route edit tasks to the resident sheet.
//!
//! # Invariants
//! - `done_steps` only grows, except through `reset`.
//! - A dirty stub is stored before its sheet is released.
//! - Reload failures leave the sheet absent and are reported, never raised.
//! - The persisted storage handle is released before reload returns.

use crate::book::{BookError, BookResult, Container, StubEvent};
use crate::model::params::{normalize_language, FilterDescriptor, LiveParam, ParamError};
use crate::model::step::Step;
use crate::sheet::codec::decode_sheet;
use crate::sheet::pipeline::{StepContext, StepRunner};
use crate::sheet::Sheet;
use crate::sig::task::{EditError, InterTask};
use log::{error, info, warn};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub type StubResult<T> = Result<T, StubError>;

#[derive(Debug)]
pub enum StubError {
    /// Sheet could be neither found resident, created nor reloaded.
    NoSheet(String),
    Edit(EditError),
    Book(BookError),
    Param(ParamError),
    Unsupported(&'static str),
}

impl Display for StubError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSheet(id) => write!(f, "no sheet available for {id}"),
            Self::Edit(err) => write!(f, "{err}"),
            Self::Book(err) => write!(f, "{err}"),
            Self::Param(err) => write!(f, "{err}"),
            Self::Unsupported(operation) => write!(f, "operation not supported: {operation}"),
        }
    }
}

impl Error for StubError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Edit(err) => Some(err),
            Self::Book(err) => Some(err),
            Self::Param(err) => Some(err),
            Self::NoSheet(_) | Self::Unsupported(_) => None,
        }
    }
}

impl From<EditError> for StubError {
    fn from(value: EditError) -> Self {
        Self::Edit(value)
    }
}

impl From<BookError> for StubError {
    fn from(value: BookError) -> Self {
        Self::Book(value)
    }
}

impl From<ParamError> for StubError {
    fn from(value: ParamError) -> Self {
        Self::Param(value)
    }
}

/// Persisted part of a stub.
#[derive(Debug, Clone, PartialEq)]
pub struct StubRecord {
    pub number: u32,
    pub done_steps: BTreeSet<Step>,
    pub invalid: bool,
    pub filter: Option<FilterDescriptor>,
    pub language: Option<String>,
}

impl StubRecord {
    pub fn new(number: u32) -> Self {
        Self {
            number,
            done_steps: BTreeSet::new(),
            invalid: false,
            filter: None,
            language: None,
        }
    }
}

/// Lightweight, always-resident descriptor of one page.
#[derive(Debug)]
pub struct SheetStub {
    number: u32,
    done_steps: BTreeSet<Step>,
    invalid: bool,
    modified: bool,
    sheet: Option<Sheet>,
    current_step: Option<Step>,
    filter_param: LiveParam<FilterDescriptor>,
    language_param: LiveParam<String>,
}

impl SheetStub {
    /// Creates the stub of sheet `number` (1-based) in `book`.
    pub fn new(number: u32, book: &dyn Container) -> Self {
        Self::attach(StubRecord::new(number), book)
    }

    /// Second construction phase after loading a record: rebuilds transient
    /// state (parameter inheritance) from the containing book.
    pub fn attach(record: StubRecord, book: &dyn Container) -> Self {
        Self {
            number: record.number,
            done_steps: record.done_steps,
            invalid: record.invalid,
            modified: false,
            sheet: None,
            current_step: None,
            filter_param: LiveParam::with_specific(book.default_filter(), record.filter),
            language_param: LiveParam::with_specific(book.default_language(), record.language),
        }
    }

    pub fn to_record(&self) -> StubRecord {
        StubRecord {
            number: self.number,
            done_steps: self.done_steps.clone(),
            invalid: self.invalid,
            filter: self.filter_param.specific().copied(),
            language: self.language_param.specific().cloned(),
        }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    /// Identifier: `radix#number` in multi-sheet books, `radix` otherwise.
    pub fn id(&self, book: &dyn Container) -> String {
        if book.is_multi_sheet() {
            format!("{}#{}", book.radix(), self.number)
        } else {
            book.radix().to_string()
        }
    }

    /// Prefix for log and display lines.
    pub fn log_prefix(&self, book: &dyn Container) -> String {
        if book.is_multi_book() {
            format!("[{}] ", self.id(book))
        } else if book.is_multi_sheet() {
            format!("[#{}] ", self.number)
        } else {
            String::new()
        }
    }

    /// Records `step` as completed.
    pub fn mark_done(&mut self, step: Step) {
        self.done_steps.insert(step);
    }

    pub fn is_done(&self, step: Step) -> bool {
        self.done_steps.contains(&step)
    }

    /// Highest completed step in pipeline order.
    pub fn latest_step(&self) -> Option<Step> {
        self.done_steps.last().copied()
    }

    pub fn done_steps(&self) -> impl Iterator<Item = Step> + '_ {
        self.done_steps.iter().copied()
    }

    pub fn current_step(&self) -> Option<Step> {
        self.current_step
    }

    pub fn set_current_step(&mut self, step: Option<Step>) {
        self.current_step = step;
    }

    pub fn is_valid(&self) -> bool {
        !self.invalid
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Sets the modified flag; a dirty stub makes its book dirty too.
    pub fn set_modified(&mut self, modified: bool, book: &mut dyn Container) {
        self.modified = modified;
        if modified {
            book.set_modified(true);
        }
    }

    /// Clears the modified flag after the book persisted this stub.
    pub(crate) fn mark_clean(&mut self) {
        self.modified = false;
    }

    pub fn has_sheet(&self) -> bool {
        self.sheet.is_some()
    }

    /// Resident sheet, without materializing it.
    pub fn sheet(&self) -> Option<&Sheet> {
        self.sheet.as_ref()
    }

    pub(crate) fn resident_sheet_mut(&mut self) -> Option<&mut Sheet> {
        self.sheet.as_mut()
    }

    /// Resident sheet, materializing it when absent.
    ///
    /// Returns `None` when the sheet can be neither created nor reloaded;
    /// the failure is logged and the stub stays usable for a retry.
    pub fn get_sheet(&mut self, book: &dyn Container) -> Option<&mut Sheet> {
        if self.sheet.is_none() {
            self.sheet = self.materialize(book).map(|mut sheet| {
                sheet.set_history_limit(book.history_limit());
                sheet
            });
        }
        self.sheet.as_mut()
    }

    fn materialize(&self, book: &dyn Container) -> Option<Sheet> {
        if !self.is_done(Step::Load) {
            return match book.create_sheet(self.number) {
                Ok(sheet) => Some(sheet),
                Err(err) => {
                    warn!(
                        "event=sheet_create module=sheet status=error stub={} error={}",
                        self.id(book),
                        err
                    );
                    None
                }
            };
        }

        let started_at = Instant::now();
        match self.reload(book) {
            Ok(sheet) => {
                info!(
                    "event=sheet_load module=sheet status=ok stub={} inters={} duration_ms={}",
                    self.id(book),
                    sheet.graph().inter_count(),
                    started_at.elapsed().as_millis()
                );
                Some(sheet)
            }
            Err(err) => {
                warn!(
                    "event=sheet_load module=sheet status=error stub={} duration_ms={} error={}",
                    self.id(book),
                    started_at.elapsed().as_millis(),
                    err
                );
                None
            }
        }
    }

    fn reload(&self, book: &dyn Container) -> BookResult<Sheet> {
        let record = {
            let mut storage = book.open_sheet_storage(self.number)?;
            let payload = storage.read_payload()?;
            decode_sheet(&payload)?
        };
        Ok(Sheet::attach(record, self.number)?)
    }

    /// Makes sure `step` is done, running every missing step up to it.
    ///
    /// Returns whether `step` is now done. Materialization and step failures
    /// are logged and reported as `false`.
    pub fn ensure_step(
        &mut self,
        book: &mut dyn Container,
        runner: &mut dyn StepRunner,
        step: Step,
    ) -> bool {
        if self.is_done(step) {
            return true;
        }

        let id = self.id(book);
        let context = StepContext {
            number: self.number,
            filter: *self.filter_param.value(),
            language: self.language_param.value().clone(),
        };

        if self.get_sheet(book).is_none() {
            error!(
                "event=step_run module=sheet status=error stub={} step={} error_code=no_sheet",
                id, step
            );
            return false;
        }
        let Some(sheet) = self.sheet.as_mut() else {
            return false;
        };

        let mut ran_any = false;
        for pending in step.up_to() {
            if self.done_steps.contains(&pending) {
                continue;
            }
            self.current_step = Some(pending);
            let started_at = Instant::now();
            match runner.run(pending, sheet, &context) {
                Ok(()) => {
                    self.done_steps.insert(pending);
                    ran_any = true;
                    info!(
                        "event=step_run module=sheet status=ok stub={} step={} duration_ms={}",
                        id,
                        pending,
                        started_at.elapsed().as_millis()
                    );
                }
                Err(err) => {
                    error!(
                        "event=step_run module=sheet status=error stub={} step={} error={}",
                        id, pending, err
                    );
                    break;
                }
            }
        }
        self.current_step = None;

        if ran_any {
            self.set_modified(true, book);
        }
        self.is_done(step)
    }

    /// Flags the sheet as containing no music.
    pub fn invalidate(&mut self, book: &mut dyn Container) {
        if self.invalid {
            return;
        }
        self.invalid = true;
        self.set_modified(true, book);

        let id = self.id(book);
        info!("event=stub_invalidate module=sheet status=ok stub={id}");
        book.notify(StubEvent::ValidityChanged {
            number: self.number,
            id,
            valid: false,
        });
    }

    /// Forgets all processing: done steps, validity flag and resident sheet.
    pub fn reset(&mut self, book: &mut dyn Container) {
        self.done_steps.clear();
        self.invalid = false;
        self.sheet = None;
        self.current_step = None;
        self.set_modified(true, book);

        let id = self.id(book);
        info!("event=stub_reset module=sheet status=ok stub={id}");
        book.notify(StubEvent::StructuralReset {
            number: self.number,
            id,
        });
    }

    /// Releases the resident sheet, storing the book first when dirty.
    ///
    /// A failed store keeps the sheet resident and returns the error.
    pub fn swap_sheet(&mut self, book: &mut dyn Container) -> StubResult<()> {
        let id = self.id(book);
        if self.modified {
            info!("event=book_store module=sheet status=start stub={id} reason=swap");
            if let Err(err) = book.store(self) {
                error!(
                    "event=book_store module=sheet status=error stub={} reason=swap error={}",
                    id, err
                );
                return Err(err.into());
            }
            self.modified = false;
        }

        if let Some(sheet) = self.sheet.take() {
            info!("event=sheet_swap module=sheet status=ok stub={id} disposed={sheet}");
        }
        book.notify(StubEvent::SheetUnloaded {
            number: self.number,
            id,
        });
        Ok(())
    }

    /// Closing the last stub of a book closes the book.
    pub fn close(&self, book: &mut dyn Container) {
        if book.is_closing() {
            return;
        }
        if book.remaining_stubs() > 0 {
            info!(
                "event=stub_close module=sheet status=ok stub={}",
                self.id(book)
            );
        } else {
            info!(
                "event=stub_close module=sheet status=ok stub={} closing_book=true",
                self.id(book)
            );
            book.close();
        }
    }

    /// Persisting a single sheet on its own is not available.
    pub fn store_sheet(&self) -> StubResult<()> {
        Err(StubError::Unsupported("store_sheet"))
    }

    pub fn filter_param(&self) -> &LiveParam<FilterDescriptor> {
        &self.filter_param
    }

    pub fn language_param(&self) -> &LiveParam<String> {
        &self.language_param
    }

    /// Sets or clears the sheet-specific filter. Returns whether it changed.
    pub fn set_filter(
        &mut self,
        filter: Option<FilterDescriptor>,
        book: &mut dyn Container,
    ) -> bool {
        let changed = self.filter_param.set_specific(filter);
        if changed {
            self.set_modified(true, book);
        }
        changed
    }

    /// Sets or clears the sheet-specific OCR language. Returns whether it
    /// changed.
    pub fn set_language(
        &mut self,
        language: Option<&str>,
        book: &mut dyn Container,
    ) -> StubResult<bool> {
        let language = language.map(normalize_language).transpose()?;
        let changed = self.language_param.set_specific(language);
        if changed {
            self.set_modified(true, book);
        }
        Ok(changed)
    }

    /// Applies an edit task to the sheet, materializing it if needed.
    pub fn apply_task(
        &mut self,
        book: &mut dyn Container,
        task: Box<dyn InterTask>,
    ) -> StubResult<()> {
        let id = self.id(book);
        let sheet = self.get_sheet(book).ok_or(StubError::NoSheet(id))?;
        sheet.apply_task(task)?;
        self.set_modified(true, book);
        Ok(())
    }

    /// Undoes the latest edit of the resident sheet.
    ///
    /// Returns `Ok(false)` when there is nothing to undo.
    pub fn undo(&mut self, book: &mut dyn Container) -> StubResult<bool> {
        let id = self.id(book);
        let sheet = self.sheet.as_mut().ok_or(StubError::NoSheet(id))?;
        let undone = sheet.undo()?;
        if undone {
            self.set_modified(true, book);
        }
        Ok(undone)
    }

    /// Redoes the latest undone edit of the resident sheet.
    pub fn redo(&mut self, book: &mut dyn Container) -> StubResult<bool> {
        let id = self.id(book);
        let sheet = self.sheet.as_mut().ok_or(StubError::NoSheet(id))?;
        let redone = sheet.redo()?;
        if redone {
            self.set_modified(true, book);
        }
        Ok(redone)
    }
}

impl Display for SheetStub {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SheetStub{{#{}}}", self.number)
    }
}
