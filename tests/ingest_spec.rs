mod helpers;

use std::fs;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};

use discussion_prompts::audio::WavNormalizer;
use discussion_prompts::db::Database;
use discussion_prompts::error::IngestError;
use discussion_prompts::ingest::{AudioIngestor, IngestOutcome};
use discussion_prompts::models::*;
use discussion_prompts::paths::{PathResolver, StudentWorkDirs};
use uuid::Uuid;

use helpers::{read_i16, write_float_tone, TEST_SAMPLE_RATE};

/// Collects formatted log output in memory.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with a subscriber writing into the returned buffer.
fn with_captured_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    with_captured_logs_at(tracing::Level::DEBUG, f)
}

/// Like [`with_captured_logs`], keeping only events at `level` or above.
fn with_captured_logs_at<T>(level: tracing::Level, f: impl FnOnce() -> T) -> (T, String) {
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(level)
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, logs.contents())
}

struct Fixture {
    _dir: tempfile::TempDir,
    root: std::path::PathBuf,
    db: Database,
    dirs: StudentWorkDirs,
    comment: TaskComment,
    discussion: DiscussionComment,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().to_path_buf();
    let db = Database::open_memory().expect("db");
    db.migrate().expect("migrate");
    let comment = db
        .create_task_comment(CreateTaskCommentInput {
            task_id: Uuid::new_v4(),
            author: "tutor".to_string(),
            content: String::new(),
        })
        .expect("comment");
    let discussion = db.create_discussion_comment(comment.id).expect("discussion");

    Fixture {
        dirs: StudentWorkDirs::new(&root),
        _dir: dir,
        root,
        db,
        comment,
        discussion,
    }
}

fn ingestor(dirs: &StudentWorkDirs) -> AudioIngestor {
    AudioIngestor::new(
        Arc::new(dirs.clone()),
        Arc::new(WavNormalizer::new(tracing::info_span!("audio"))),
        tracing::info_span!("ingest"),
    )
}

fn upload(root: &Path, name: &str) -> std::path::PathBuf {
    let path = root.join(name);
    write_float_tone(&path, 440.0, 800);
    path
}

#[test]
fn prompt_upload_is_normalized_into_the_numbered_prompt_path() {
    let f = fixture();
    let source = upload(&f.root, "upload.wav");

    let (outcome, logs) = with_captured_logs(|| {
        ingestor(&f.dirs)
            .add_prompt(&f.db, &f.discussion, &source, 2)
            .expect("ingest")
    });

    let target = f.dirs.prompt_path(&f.comment, 2);
    assert_eq!(outcome, IngestOutcome::Stored { path: target.clone() });

    let (spec, samples) = read_i16(&target);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(spec.sample_rate, TEST_SAMPLE_RATE);
    assert_eq!(samples.len(), 800);

    assert!(logs.contains(&target.display().to_string()));

    let saved = f
        .db
        .get_discussion_comment(f.discussion.id)
        .unwrap()
        .unwrap();
    assert!(saved.updated_at >= f.discussion.updated_at);
}

#[test]
fn temp_files_do_not_outlive_the_ingest() {
    let f = fixture();
    let source = upload(&f.root, "upload.wav");

    ingestor(&f.dirs)
        .add_prompt(&f.db, &f.discussion, &source, 0)
        .expect("ingest");

    let dir = f.dirs.discussion_dir(f.comment.task_id);
    let names: Vec<String> = fs::read_dir(&dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec![format!("{}_0.wav", f.comment.id)]);
}

#[test]
fn reply_upload_goes_to_the_reply_path() {
    let f = fixture();
    let source = upload(&f.root, "reply.wav");

    let outcome = ingestor(&f.dirs)
        .add_reply(&f.db, &f.discussion, &source)
        .expect("ingest");

    let target = f.dirs.reply_path(&f.comment, f.discussion.id);
    assert_eq!(outcome, IngestOutcome::Stored { path: target.clone() });
    assert!(target.exists());
    assert!(!f.dirs.prompt_path(&f.comment, 0).exists());
}

#[test]
fn rejected_audio_leaves_target_and_record_untouched() {
    let f = fixture();
    let source = f.root.join("garbage.wav");
    fs::write(&source, b"this is not a wav file").unwrap();
    let target = f.dirs.prompt_path(&f.comment, 0);
    fs::create_dir_all(target.parent().unwrap()).unwrap();
    fs::write(&target, b"earlier prompt").unwrap();

    let (outcome, logs) = with_captured_logs_at(tracing::Level::INFO, || {
        ingestor(&f.dirs)
            .add_prompt(&f.db, &f.discussion, &source, 0)
            .expect("ingest")
    });

    assert_eq!(outcome, IngestOutcome::Rejected);
    assert_eq!(fs::read(&target).unwrap(), b"earlier prompt");
    assert!(logs.is_empty(), "unexpected log output: {}", logs);

    let saved = f
        .db
        .get_discussion_comment(f.discussion.id)
        .unwrap()
        .unwrap();
    assert_eq!(saved.updated_at, f.discussion.updated_at);
}

#[test]
fn replacing_a_prompt_overwrites_the_file() {
    let f = fixture();
    let first = f.root.join("first.wav");
    write_float_tone(&first, 220.0, 100);
    let second = f.root.join("second.wav");
    write_float_tone(&second, 220.0, 300);
    let ingestor = ingestor(&f.dirs);

    ingestor.add_prompt(&f.db, &f.discussion, &first, 0).unwrap();
    ingestor.add_prompt(&f.db, &f.discussion, &second, 0).unwrap();

    let (_, samples) = read_i16(f.dirs.prompt_path(&f.comment, 0));
    assert_eq!(samples.len(), 300);
}

#[test]
fn orphaned_discussion_is_a_persistence_error() {
    let f = fixture();
    let source = upload(&f.root, "upload.wav");
    let orphan = DiscussionComment {
        task_comment_id: Uuid::new_v4(),
        ..f.discussion.clone()
    };

    let err = ingestor(&f.dirs)
        .add_prompt(&f.db, &orphan, &source, 0)
        .unwrap_err();

    assert!(matches!(err, IngestError::Persistence(_)));
    assert!(!f.dirs.prompt_path(&f.comment, 0).exists());
}

#[test]
fn upload_keeps_a_start_recorded_after_the_discussion_was_loaded() {
    let f = fixture();
    let source = upload(&f.root, "upload.wav");
    let snapshot = f.discussion.clone();

    let started = f.db.start_discussion(f.discussion.id).unwrap().unwrap();
    ingestor(&f.dirs)
        .add_prompt(&f.db, &snapshot, &source, 0)
        .expect("ingest");

    let saved = f
        .db
        .get_discussion_comment(f.discussion.id)
        .unwrap()
        .unwrap();
    assert_eq!(saved.status(), DiscussionStatus::Opened);
    assert_eq!(saved.time_started(), started.time_started());
    assert!(saved.updated_at >= started.updated_at);
}

#[test]
fn reply_upload_keeps_a_finish_recorded_after_the_discussion_was_loaded() {
    let f = fixture();
    let source = upload(&f.root, "reply.wav");
    let snapshot = f.discussion.clone();

    let finished = f.db.finish_discussion(f.discussion.id).unwrap().unwrap();
    ingestor(&f.dirs)
        .add_reply(&f.db, &snapshot, &source)
        .expect("ingest");

    let saved = f
        .db
        .get_discussion_comment(f.discussion.id)
        .unwrap()
        .unwrap();
    assert_eq!(saved.status(), DiscussionStatus::Complete);
    assert_eq!(saved.time_completed(), finished.time_completed());
}
