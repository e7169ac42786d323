use scorebook_core::db::migrations::latest_version;
use scorebook_core::db::{open_db, open_db_in_memory, DbError};
use scorebook_core::repo::project_repo::{
    BookRecord, ProjectRepository, ProjectSnapshot, RepoError, SqliteProjectRepository,
};
use scorebook_core::sheet::stub::StubRecord;
use scorebook_core::{FilterDescriptor, Step};
use rusqlite::Connection;
use std::collections::BTreeSet;

fn book_record(sheet_count: u32) -> BookRecord {
    BookRecord {
        radix: "Score".to_string(),
        sheet_count,
        filter: FilterDescriptor::Global { threshold: 120 },
        language: "eng+fra".to_string(),
    }
}

fn stub_record(number: u32, steps: &[Step]) -> StubRecord {
    StubRecord {
        done_steps: steps.iter().copied().collect(),
        ..StubRecord::new(number)
    }
}

fn table_count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

#[test]
fn open_db_in_memory_creates_project_tables() {
    let conn = open_db_in_memory().unwrap();
    let version: u32 = conn
        .query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(version, latest_version());
    for table in ["book", "sheet_stubs", "sheets"] {
        assert_eq!(table_count(&conn, table), 0);
    }
}

#[test]
fn project_with_newer_schema_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.scorebook");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn repository_requires_migrated_connection() {
    let conn = Connection::open_in_memory().unwrap();
    assert!(matches!(
        SqliteProjectRepository::try_new(&conn),
        Err(RepoError::UninitializedConnection {
            actual_version: 0,
            ..
        })
    ));
}

#[test]
fn snapshot_round_trips_book_stubs_and_sheets() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteProjectRepository::try_new(&conn).unwrap();
    assert_eq!(repo.load_book().unwrap(), None);

    let mut second = stub_record(2, &[Step::Load, Step::Binary]);
    second.invalid = true;
    second.language = Some("deu".to_string());
    second.filter = Some(FilterDescriptor::default());
    let snapshot = ProjectSnapshot {
        book: Some(book_record(2)),
        stubs: vec![stub_record(1, &[]), second.clone()],
        sheets: vec![(2, "{\"number\":2}".to_string())],
        discarded_sheets: vec![1],
    };
    repo.store_snapshot(&snapshot).unwrap();

    assert_eq!(repo.load_book().unwrap(), Some(book_record(2)));
    assert_eq!(repo.list_stubs().unwrap(), vec![stub_record(1, &[]), second]);
    assert_eq!(repo.load_sheet(2).unwrap().as_deref(), Some("{\"number\":2}"));
    assert_eq!(repo.load_sheet(1).unwrap(), None);
}

#[test]
fn discarded_sheet_is_deleted() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteProjectRepository::try_new(&conn).unwrap();
    repo.store_snapshot(&ProjectSnapshot {
        book: Some(book_record(1)),
        stubs: vec![stub_record(1, &[Step::Load])],
        sheets: vec![(1, "{}".to_string())],
        discarded_sheets: Vec::new(),
    })
    .unwrap();

    repo.store_snapshot(&ProjectSnapshot {
        stubs: vec![stub_record(1, &[])],
        discarded_sheets: vec![1],
        ..ProjectSnapshot::default()
    })
    .unwrap();
    assert_eq!(repo.load_sheet(1).unwrap(), None);
    assert_eq!(repo.list_stubs().unwrap()[0].done_steps, BTreeSet::new());
}

#[test]
fn failed_snapshot_writes_nothing() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteProjectRepository::try_new(&conn).unwrap();

    // Sheet 7 has no stub row, so the foreign key fails after the stubs went in.
    let err = repo.store_snapshot(&ProjectSnapshot {
        book: Some(book_record(1)),
        stubs: vec![stub_record(1, &[Step::Load])],
        sheets: vec![(7, "{}".to_string())],
        discarded_sheets: Vec::new(),
    });
    assert!(err.is_err());
    assert_eq!(table_count(&conn, "book"), 0);
    assert_eq!(table_count(&conn, "sheet_stubs"), 0);
}

#[test]
fn corrupt_stub_rows_are_rejected() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO sheet_stubs (number, done_steps) VALUES (1, 'LOAD WARP');",
        [],
    )
    .unwrap();
    let repo = SqliteProjectRepository::try_new(&conn).unwrap();
    assert!(matches!(
        repo.list_stubs(),
        Err(RepoError::InvalidData(_))
    ));
}
