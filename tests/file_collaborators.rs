use speed_sweep::{
    notify::{Notifier, OutboxNotifier},
    scheduler::{Activation, FileScheduler, Scheduler},
    sheet::{CellRange, CsvSheet, Sheet},
    state::JobStateRepository,
    store::{FileStore, KeyValueStore},
};
use std::time::Duration;

fn row(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|c| c.to_string()).collect()
}

#[test]
fn file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/state.json");

    let store = FileStore::new(&path);
    assert_eq!(store.get("cursor").unwrap(), None);
    store.set("cursor", "3").unwrap();
    store.set("job_id", "abc").unwrap();

    let reopened = FileStore::new(&path);
    assert_eq!(reopened.get("cursor").unwrap().as_deref(), Some("3"));
    reopened.delete("cursor").unwrap();
    reopened.delete("missing").unwrap();
    assert_eq!(store.keys().unwrap(), vec!["job_id".to_string()]);
}

#[test]
fn job_state_round_trips_through_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    {
        let store = FileStore::new(&path);
        JobStateRepository::new(&store).reset("job-9", "fp", 7).unwrap();
    }
    let store = FileStore::new(&path);
    let repo = JobStateRepository::new(&store);
    assert_eq!(repo.cursor().unwrap(), Some(0));
    assert_eq!(repo.job_id().unwrap().as_deref(), Some("job-9"));
    assert_eq!(repo.url_count().unwrap(), Some(7));
    repo.clear().unwrap();
    assert!(store.keys().unwrap().is_empty());
}

#[test]
fn csv_sheet_reads_urls_and_appends_block() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sheet.csv");
    std::fs::write(
        &path,
        "Page Speed\n,Site\n,URL,https://a.example,https://b.example\n",
    )
    .unwrap();

    let sheet = CsvSheet::new(&path);
    assert_eq!(sheet.last_row().unwrap(), 3);
    assert_eq!(sheet.last_column().unwrap(), 4);
    assert_eq!(
        sheet.read_range(3, 3, 1, 2).unwrap(),
        vec![row(&["https://a.example", "https://b.example"])]
    );

    sheet
        .write_range(5, 1, &[row(&["14/11/2023", "Mobile Performance", "91", "-"])])
        .unwrap();
    sheet
        .set_bold(CellRange {
            row: 5,
            col: 1,
            rows: 1,
            cols: 2,
        })
        .unwrap();

    let reopened = CsvSheet::new(&path);
    assert_eq!(reopened.last_row().unwrap(), 5);
    assert_eq!(
        reopened.read_range(5, 1, 1, 4).unwrap(),
        vec![row(&["14/11/2023", "Mobile Performance", "91", "-"])]
    );
    assert_eq!(reopened.read_range(4, 1, 1, 2).unwrap(), vec![row(&["", ""])]);
    let grid = reopened.load().unwrap();
    assert!(grid.is_bold(5, 2));
    assert!(!grid.is_bold(5, 3));
}

#[test]
fn sheet_rejects_zero_coordinates() {
    let dir = tempfile::tempdir().unwrap();
    let sheet = CsvSheet::new(&dir.path().join("sheet.csv"));
    assert!(sheet.read_range(0, 1, 1, 1).is_err());
    assert!(sheet.write_range(1, 0, &[row(&["x"])]).is_err());
}

#[test]
fn file_scheduler_persists_and_cancels() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("schedule.json");

    let sched = FileScheduler::new(&path);
    let later = sched
        .schedule_after(1_000, Duration::from_secs(60), Activation::RunChunk)
        .unwrap();
    let sooner = sched
        .schedule_after(1_000, Duration::from_secs(1), Activation::RunChunk)
        .unwrap();
    assert_ne!(later, sooner);

    let reopened = FileScheduler::new(&path);
    let next = reopened.next_due().unwrap().unwrap();
    assert_eq!(next.handle, sooner);
    assert_eq!(next.due_at_ms, 2_000);

    reopened.cancel(&sooner).unwrap();
    assert_eq!(sched.list_scheduled().unwrap().len(), 1);
    assert_eq!(sched.cancel_all().unwrap(), 1);
    assert!(reopened.next_due().unwrap().is_none());
    assert_eq!(reopened.cancel_all().unwrap(), 0);
}

#[test]
fn outbox_notifier_writes_message_file() {
    let dir = tempfile::tempdir().unwrap();
    let outbox = dir.path().join("outbox");
    OutboxNotifier::new(&outbox)
        .send("ops@example.org", "Sweep done", "All URLs measured.")
        .unwrap();

    let files: Vec<_> = std::fs::read_dir(&outbox)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].extension().and_then(|e| e.to_str()), Some("eml"));
    let msg = std::fs::read_to_string(&files[0]).unwrap();
    assert!(msg.starts_with("To: ops@example.org\r\n"));
    assert!(msg.contains("Subject: Sweep done\r\n"));
    assert!(msg.ends_with("All URLs measured.\r\n"));
}
