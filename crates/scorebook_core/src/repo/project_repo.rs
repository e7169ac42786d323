//! Project-file repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist book metadata, stub records and sheet payloads.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Sheet payloads are addressed by stub number only.
//! - A snapshot is written in one transaction: either every stub and sheet of
//!   the snapshot is stored, or nothing is.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::params::{normalize_language, FilterDescriptor};
use crate::sheet::codec::{decode_steps, encode_steps};
use crate::sheet::stub::StubRecord;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted project data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "project connection at schema {actual_version}, expected {expected_version}"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidData(_) | Self::UninitializedConnection { .. } => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Book-wide persisted metadata and parameter defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct BookRecord {
    pub radix: String,
    pub sheet_count: u32,
    pub filter: FilterDescriptor,
    pub language: String,
}

/// Everything one `store` writes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectSnapshot {
    pub book: Option<BookRecord>,
    pub stubs: Vec<StubRecord>,
    /// `(number, payload)` of every resident sheet.
    pub sheets: Vec<(u32, String)>,
    /// Stub numbers whose persisted sheet is stale and must be dropped.
    pub discarded_sheets: Vec<u32>,
}

/// Repository interface for project persistence.
pub trait ProjectRepository {
    fn load_book(&self) -> RepoResult<Option<BookRecord>>;
    fn list_stubs(&self) -> RepoResult<Vec<StubRecord>>;
    fn load_sheet(&self, number: u32) -> RepoResult<Option<String>>;
    fn store_snapshot(&self, snapshot: &ProjectSnapshot) -> RepoResult<()>;
}

/// SQLite-backed project repository.
pub struct SqliteProjectRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProjectRepository<'conn> {
    /// Wraps a connection after checking it is migrated to the current schema.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        let expected_version = latest_version();
        let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        if actual_version != expected_version {
            return Err(RepoError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        Ok(Self { conn })
    }
}

impl ProjectRepository for SqliteProjectRepository<'_> {
    fn load_book(&self) -> RepoResult<Option<BookRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT radix, sheet_count, filter, language FROM book WHERE id = 1;",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>("radix")?,
                        row.get::<_, i64>("sheet_count")?,
                        row.get::<_, Option<String>>("filter")?,
                        row.get::<_, Option<String>>("language")?,
                    ))
                },
            )
            .optional()?;

        let Some((radix, sheet_count, filter, language)) = row else {
            return Ok(None);
        };
        let sheet_count = u32::try_from(sheet_count).map_err(|_| {
            RepoError::InvalidData(format!("invalid sheet_count `{sheet_count}` in book"))
        })?;
        Ok(Some(BookRecord {
            radix,
            sheet_count,
            filter: parse_filter(filter.as_deref())?.unwrap_or_default(),
            language: parse_language(language.as_deref())?
                .unwrap_or_else(|| crate::model::params::DEFAULT_LANGUAGE.to_string()),
        }))
    }

    fn list_stubs(&self) -> RepoResult<Vec<StubRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT number, done_steps, invalid, filter, language
             FROM sheet_stubs
             ORDER BY number ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut stubs = Vec::new();
        while let Some(row) = rows.next()? {
            stubs.push(parse_stub_row(row)?);
        }
        Ok(stubs)
    }

    fn load_sheet(&self, number: u32) -> RepoResult<Option<String>> {
        let payload = self
            .conn
            .query_row(
                "SELECT payload FROM sheets WHERE number = ?1;",
                [number],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(payload)
    }

    fn store_snapshot(&self, snapshot: &ProjectSnapshot) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        if let Some(book) = &snapshot.book {
            tx.execute(
                "INSERT INTO book (id, radix, sheet_count, filter, language)
                 VALUES (1, ?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                    radix = excluded.radix,
                    sheet_count = excluded.sheet_count,
                    filter = excluded.filter,
                    language = excluded.language,
                    updated_at = (strftime('%s', 'now') * 1000);",
                params![
                    book.radix.as_str(),
                    book.sheet_count,
                    encode_filter(&book.filter)?,
                    book.language.as_str(),
                ],
            )?;
        }

        for stub in &snapshot.stubs {
            let filter = match &stub.filter {
                Some(filter) => Some(encode_filter(filter)?),
                None => None,
            };
            tx.execute(
                "INSERT INTO sheet_stubs (number, done_steps, invalid, filter, language)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(number) DO UPDATE SET
                    done_steps = excluded.done_steps,
                    invalid = excluded.invalid,
                    filter = excluded.filter,
                    language = excluded.language,
                    updated_at = (strftime('%s', 'now') * 1000);",
                params![
                    stub.number,
                    encode_steps(&stub.done_steps),
                    bool_to_int(stub.invalid),
                    filter,
                    stub.language.as_deref(),
                ],
            )?;
        }

        for number in &snapshot.discarded_sheets {
            tx.execute("DELETE FROM sheets WHERE number = ?1;", [number])?;
        }

        for (number, payload) in &snapshot.sheets {
            tx.execute(
                "INSERT INTO sheets (number, payload)
                 VALUES (?1, ?2)
                 ON CONFLICT(number) DO UPDATE SET
                    payload = excluded.payload,
                    updated_at = (strftime('%s', 'now') * 1000);",
                params![number, payload.as_str()],
            )?;
        }

        tx.commit()?;
        Ok(())
    }
}

fn parse_stub_row(row: &Row<'_>) -> RepoResult<StubRecord> {
    let number: i64 = row.get("number")?;
    let number = u32::try_from(number)
        .ok()
        .filter(|value| *value >= 1)
        .ok_or_else(|| {
            RepoError::InvalidData(format!("invalid stub number `{number}` in sheet_stubs"))
        })?;

    let steps_text: String = row.get("done_steps")?;
    let done_steps = decode_steps(&steps_text)
        .map_err(|err| RepoError::InvalidData(format!("sheet_stubs.done_steps: {err}")))?;

    let invalid = match row.get::<_, i64>("invalid")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid flag value `{other}` in sheet_stubs.invalid"
            )));
        }
    };

    Ok(StubRecord {
        number,
        done_steps,
        invalid,
        filter: parse_filter(row.get::<_, Option<String>>("filter")?.as_deref())?,
        language: parse_language(row.get::<_, Option<String>>("language")?.as_deref())?,
    })
}

fn encode_filter(filter: &FilterDescriptor) -> RepoResult<String> {
    serde_json::to_string(filter)
        .map_err(|err| RepoError::InvalidData(format!("cannot encode filter: {err}")))
}

fn parse_filter(value: Option<&str>) -> RepoResult<Option<FilterDescriptor>> {
    value
        .map(|text| {
            serde_json::from_str(text)
                .map_err(|err| RepoError::InvalidData(format!("invalid filter `{text}`: {err}")))
        })
        .transpose()
}

fn parse_language(value: Option<&str>) -> RepoResult<Option<String>> {
    value
        .map(|text| normalize_language(text).map_err(|err| RepoError::InvalidData(err.to_string())))
        .transpose()
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
