use scorebook_core::db::DbError;
use scorebook_core::{
    AdditionTask, BookDefaults, BookError, Container, FilterDescriptor, Inter, Partnership,
    Rectangle, RelationKind, Shape, Sheet, SqliteBook, Step, StepContext, StepError, StepRunner,
    StubError, StubEvent,
};
use std::path::Path;

/// Marks steps as run and seeds one stem when the grid step runs.
#[derive(Default)]
struct SeedingRunner {
    ran: Vec<(u32, Step)>,
}

impl StepRunner for SeedingRunner {
    fn run(&mut self, step: Step, sheet: &mut Sheet, context: &StepContext) -> Result<(), StepError> {
        if step == Step::Grid {
            let stem = Inter::new(Shape::Stem, Rectangle::new(40, 0, 2, 60), 0.8);
            sheet
                .graph_mut()
                .add_inter(stem)
                .map_err(|err| StepError::new(step, err.to_string()))?;
        }
        self.ran.push((context.number, step));
        Ok(())
    }
}

fn create_book(path: &Path, sheet_count: u32) -> SqliteBook {
    SqliteBook::create(path, "Score", sheet_count, BookDefaults::default()).unwrap()
}

fn add_head_on_stem(book: &mut SqliteBook, number: u32) -> Inter {
    let stem_id = book.sheet(number).unwrap().graph().inters_of_shape(Shape::Stem)[0].id;
    let head = Inter::new(Shape::NoteheadBlack, Rectangle::new(30, 50, 12, 10), 0.9);
    book.apply_task(
        number,
        Box::new(
            AdditionTask::new(
                head.clone(),
                head.bounds,
                vec![Partnership::new(RelationKind::HeadStem, stem_id, true)],
            )
            .unwrap(),
        ),
    )
    .unwrap();
    head
}

#[test]
fn stub_ids_follow_sheet_count() {
    let dir = tempfile::tempdir().unwrap();

    let single = create_book(&dir.path().join("single.scorebook"), 1);
    let stub = single.stub(1).unwrap();
    assert_eq!(stub.id(&single), "Score");
    assert_eq!(stub.log_prefix(&single), "");

    let mut multi = create_book(&dir.path().join("multi.scorebook"), 3);
    let stub = multi.stub(2).unwrap();
    assert_eq!(stub.id(&multi), "Score#2");
    assert_eq!(stub.log_prefix(&multi), "[#2] ");

    multi.set_multi_book(true);
    let stub = multi.stub(2).unwrap();
    assert_eq!(stub.log_prefix(&multi), "[Score#2] ");
}

#[test]
fn done_steps_grow_in_pipeline_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut book = create_book(&dir.path().join("score.scorebook"), 2);
    let mut runner = SeedingRunner::default();

    assert!(book.ensure_step(1, &mut runner, Step::Scale).unwrap());
    assert_eq!(
        runner.ran,
        vec![(1, Step::Load), (1, Step::Binary), (1, Step::Scale)]
    );
    assert!(book.ensure_step(1, &mut runner, Step::Grid).unwrap());
    assert_eq!(runner.ran.len(), 4);

    let stub = book.stub(1).unwrap();
    assert_eq!(stub.latest_step(), Some(Step::Grid));
    let done: Vec<Step> = stub.done_steps().collect();
    assert_eq!(done, Step::Grid.up_to().collect::<Vec<_>>());
    assert_eq!(book.stub(2).unwrap().latest_step(), None);
}

#[test]
fn evicted_sheet_reloads_equal_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("score.scorebook");
    let mut book = create_book(&path, 2);
    let mut runner = SeedingRunner::default();

    assert!(book.ensure_step(2, &mut runner, Step::Grid).unwrap());
    add_head_on_stem(&mut book, 2);
    let graph = book.sheet(2).unwrap().graph().clone();
    assert_eq!(graph.relation_count(), 1);

    book.swap_sheet(2).unwrap();
    assert!(book.sheet(2).is_none());
    assert!(!book.stub(2).unwrap().is_modified());

    assert!(book.load_sheet(2).unwrap());
    assert_eq!(book.sheet(2).unwrap().graph(), &graph);
    assert!(book.sheet(2).unwrap().history().is_empty());

    drop(book);
    let mut reopened = SqliteBook::open(&path).unwrap();
    let stub = reopened.stub(2).unwrap();
    assert_eq!(stub.latest_step(), Some(Step::Grid));
    assert!(!stub.has_sheet());
    assert!(reopened.load_sheet(2).unwrap());
    assert_eq!(reopened.sheet(2).unwrap().graph(), &graph);
}

#[test]
fn edits_undo_and_redo_through_book() {
    let dir = tempfile::tempdir().unwrap();
    let mut book = create_book(&dir.path().join("score.scorebook"), 1);
    let mut runner = SeedingRunner::default();
    assert!(book.ensure_step(1, &mut runner, Step::Grid).unwrap());
    book.store().unwrap();
    assert!(!book.is_modified());

    let head = add_head_on_stem(&mut book, 1);
    assert!(book.is_modified());
    assert!(book.undo(1).unwrap());
    assert!(!book.sheet(1).unwrap().graph().contains(head.id));
    assert!(book.redo(1).unwrap());
    assert!(book.sheet(1).unwrap().graph().contains(head.id));
    assert!(!book.redo(1).unwrap());
}

#[test]
fn undo_without_resident_sheet_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut book = create_book(&dir.path().join("score.scorebook"), 1);
    assert!(matches!(book.undo(1), Err(StubError::NoSheet(id)) if id == "Score"));
}

#[test]
fn reload_failure_leaves_sheet_absent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("score.scorebook");
    let mut book = create_book(&path, 1);
    let mut runner = SeedingRunner::default();
    assert!(book.ensure_step(1, &mut runner, Step::Binary).unwrap());
    book.swap_sheet(1).unwrap();

    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute("UPDATE sheets SET payload = 'garbage' WHERE number = 1;", [])
        .unwrap();
    drop(conn);

    assert!(!book.load_sheet(1).unwrap());
    assert!(book.sheet(1).is_none());
    assert!(!book.ensure_step(1, &mut runner, Step::Scale).unwrap());
}

#[test]
fn invalidate_persists_and_notifies() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("score.scorebook");
    let mut book = create_book(&path, 3);
    let events = book.subscribe();

    book.invalidate(3).unwrap();
    book.invalidate(3).unwrap();
    assert!(!book.stub(3).unwrap().is_valid());
    assert!(book.is_modified());
    book.store().unwrap();

    let received: Vec<StubEvent> = events.try_iter().collect();
    assert_eq!(
        received,
        vec![StubEvent::ValidityChanged {
            number: 3,
            id: "Score#3".to_string(),
            valid: false,
        }]
    );

    drop(book);
    let reopened = SqliteBook::open(&path).unwrap();
    assert!(!reopened.stub(3).unwrap().is_valid());
    assert!(reopened.stub(1).unwrap().is_valid());
}

#[test]
fn reset_drops_progress_and_persisted_sheet() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("score.scorebook");
    let mut book = create_book(&path, 2);
    let events = book.subscribe();
    let mut runner = SeedingRunner::default();
    assert!(book.ensure_step(1, &mut runner, Step::Grid).unwrap());
    book.swap_sheet(1).unwrap();

    book.reset(1).unwrap();
    assert_eq!(book.stub(1).unwrap().latest_step(), None);
    book.store().unwrap();

    let kinds: Vec<StubEvent> = events.try_iter().collect();
    assert!(matches!(kinds[0], StubEvent::SheetUnloaded { number: 1, .. }));
    assert!(matches!(kinds[1], StubEvent::StructuralReset { number: 1, .. }));

    let conn = rusqlite::Connection::open(&path).unwrap();
    let sheets: i64 = conn
        .query_row("SELECT COUNT(*) FROM sheets;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(sheets, 0);

    assert!(book.load_sheet(1).unwrap());
    assert!(book.sheet(1).unwrap().graph().is_empty());
}

#[test]
fn stub_parameters_persist_as_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("score.scorebook");
    let defaults = BookDefaults {
        filter: FilterDescriptor::Global { threshold: 150 },
        language: "ita".to_string(),
    };
    let mut book = SqliteBook::create(&path, "Opera", 2, defaults).unwrap();

    assert!(book.set_stub_language(2, Some("deu+eng")).unwrap());
    assert!(book.set_stub_filter(1, Some(FilterDescriptor::default())).unwrap());
    assert!(matches!(
        book.set_stub_language(1, Some("german")),
        Err(StubError::Param(_))
    ));
    book.store().unwrap();
    drop(book);

    let book = SqliteBook::open(&path).unwrap();
    let first = book.stub(1).unwrap();
    assert_eq!(*first.filter_param().value(), FilterDescriptor::default());
    assert_eq!(first.language_param().value(), "ita");
    assert!(!first.language_param().is_specific());

    let second = book.stub(2).unwrap();
    assert_eq!(
        *second.filter_param().value(),
        FilterDescriptor::Global { threshold: 150 }
    );
    assert_eq!(second.language_param().value(), "deu+eng");
}

#[test]
fn closing_every_stub_closes_book() {
    let dir = tempfile::tempdir().unwrap();
    let mut book = create_book(&dir.path().join("score.scorebook"), 2);

    book.close_stub(2).unwrap();
    assert!(!book.is_closing());
    assert!(matches!(book.close_stub(2), Err(BookError::UnknownStub(2))));

    book.close_stub(1).unwrap();
    assert!(book.is_closing());
    assert!(book.stubs().is_empty());
    assert!(matches!(book.reset(1), Err(BookError::Closed)));
}

#[test]
fn swap_all_sheets_evicts_every_resident_sheet() {
    let dir = tempfile::tempdir().unwrap();
    let mut book = create_book(&dir.path().join("score.scorebook"), 3);
    let mut runner = SeedingRunner::default();
    for number in 1..=3 {
        assert!(book.ensure_step(number, &mut runner, Step::Binary).unwrap());
    }

    book.swap_all_sheets().unwrap();
    assert!(book.stubs().iter().all(|stub| !stub.has_sheet()));
    assert!(!book.is_modified());
}

#[test]
fn open_and_create_guard_project_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("score.scorebook");

    assert!(matches!(
        SqliteBook::open(&path).err(),
        Some(BookError::Db(DbError::MissingProject(_)))
    ));
    assert!(!path.exists());

    drop(create_book(&path, 1));
    assert!(matches!(
        SqliteBook::create(&path, "Score", 1, BookDefaults::default()).err(),
        Some(BookError::ProjectExists(_))
    ));
}
