//! Write controller: the sole writer of artifact files.
//!
//! - `overwrite == false` and the target exists: write to the first free sibling
//!   `<stem>-assistant-v<N><ext>`, leaving the original untouched.
//! - `overwrite == true`, `backup == true` and the target exists: copy it to
//!   `<target>.bak_<%Y%m%dT%H%M%S>` before replacing. An existing backup is never
//!   replaced; a second one in the same second becomes `<target>.bak_<ts>-1`, then `-2`.
//! - Replacement goes through a temp file in the same directory and a rename.
//! - Writes to the same target are serialized by a per-path async mutex, dropped from
//!   the table once no writer holds it. File I/O runs on the blocking pool.

use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write as _};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::info;

use super::ArtifactRef;
use crate::error::AssistError;

const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriteOptions {
    pub backup: bool,
    pub overwrite: bool,
}

/// Where the artifact actually landed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WriteOutcome {
    pub written_to: PathBuf,
    pub backup_file: Option<PathBuf>,
}

#[derive(Default)]
pub struct WriteController {
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl WriteController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes `value` as pretty JSON to `target`. Remote targets are rejected with
    /// [`AssistError::WriteTarget`] before anything touches the filesystem.
    pub async fn write_json(
        &self,
        target: &str,
        value: &Value,
        options: WriteOptions,
    ) -> Result<WriteOutcome, AssistError> {
        let path = match ArtifactRef::parse(target)? {
            ArtifactRef::Local(path) => path,
            ArtifactRef::Remote(_) => return Err(AssistError::WriteTarget(target.to_string())),
        };
        let lock = self.lock_for(&path);
        let result = {
            let _guard = lock.lock().await;
            let (path, value) = (path.clone(), value.clone());
            tokio::task::spawn_blocking(move || write_locked(&path, &value, options))
                .await
                .map_err(|e| AssistError::Io(std::io::Error::new(ErrorKind::Other, e)))
        };
        drop(lock);
        self.release(&path);
        let outcome = result??;
        info!(
            written_to = %outcome.written_to.display(),
            backup = ?outcome.backup_file,
            "artifact written"
        );
        Ok(outcome)
    }

    fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        self.locks.entry(path.to_path_buf()).or_default().clone()
    }

    /// Drops the mutex for `path` when only the table still refers to it.
    fn release(&self, path: &Path) {
        self.locks.remove_if(path, |_, lock| Arc::strong_count(lock) == 1);
    }
}

fn write_locked(
    target: &Path,
    value: &Value,
    options: WriteOptions,
) -> Result<WriteOutcome, AssistError> {
    let final_target = if !options.overwrite && target.exists() {
        versioned_sibling(target)
    } else {
        target.to_path_buf()
    };

    let mut backup_file = None;
    if options.overwrite && options.backup && final_target.exists() {
        let backup = backup_path(&final_target, chrono::Local::now());
        backup_file = Some(copy_to_fresh_backup(&final_target, &backup)?);
    }

    replace_atomically(&final_target, value)?;
    Ok(WriteOutcome {
        written_to: final_target,
        backup_file,
    })
}

/// First `<stem>-assistant-v<N><ext>` next to `target` that does not exist yet.
fn versioned_sibling(target: &Path) -> PathBuf {
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = target
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let mut n = 1u32;
    loop {
        let candidate = target.with_file_name(format!("{}-assistant-v{}{}", stem, n, ext));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

fn backup_path<Tz>(target: &Path, now: chrono::DateTime<Tz>) -> PathBuf
where
    Tz: chrono::TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut name = OsString::from(target.as_os_str());
    name.push(format!(".bak_{}", now.format(BACKUP_TIMESTAMP_FORMAT)));
    PathBuf::from(name)
}

/// Copies `source` to `backup`, or to `backup-1`, `backup-2`, ... when taken.
/// Returns the path actually written.
fn copy_to_fresh_backup(source: &Path, backup: &Path) -> std::io::Result<PathBuf> {
    let mut n = 0u32;
    loop {
        let candidate = if n == 0 {
            backup.to_path_buf()
        } else {
            let mut name = OsString::from(backup.as_os_str());
            name.push(format!("-{}", n));
            PathBuf::from(name)
        };
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(mut dest) => {
                std::io::copy(&mut File::open(source)?, &mut dest)?;
                dest.set_permissions(std::fs::metadata(source)?.permissions())?;
                return Ok(candidate);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => n += 1,
            Err(e) => return Err(e),
        }
    }
}

fn replace_atomically(target: &Path, value: &Value) -> Result<(), AssistError> {
    let dir = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, value)?;
    tmp.flush()?;
    if let Ok(meta) = std::fs::metadata(target) {
        std::fs::set_permissions(tmp.path(), meta.permissions())?;
    }
    tmp.persist(target).map_err(|e| AssistError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn read(path: &Path) -> Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn versioned_sibling_inserts_suffix_before_extension() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("x.json");
        assert_eq!(versioned_sibling(&target), dir.path().join("x-assistant-v1.json"));
        std::fs::write(dir.path().join("x-assistant-v1.json"), "{}").unwrap();
        assert_eq!(versioned_sibling(&target), dir.path().join("x-assistant-v2.json"));
    }

    #[test]
    fn versioned_sibling_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("conceptset");
        assert_eq!(versioned_sibling(&target), dir.path().join("conceptset-assistant-v1"));
    }

    #[test]
    fn backup_path_appends_timestamp() {
        let now = chrono::Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
        let p = backup_path(Path::new("/data/cs.json"), now);
        assert_eq!(p, PathBuf::from("/data/cs.json.bak_20240305T070809"));
    }

    #[test]
    fn backup_never_replaces_an_existing_backup() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("cs.json");
        let backup = dir.path().join("cs.json.bak_20240305T070809");

        std::fs::write(&target, r#"{"v": 0}"#).unwrap();
        let first = copy_to_fresh_backup(&target, &backup).unwrap();
        std::fs::write(&target, r#"{"v": 1}"#).unwrap();
        let second = copy_to_fresh_backup(&target, &backup).unwrap();
        std::fs::write(&target, r#"{"v": 2}"#).unwrap();
        let third = copy_to_fresh_backup(&target, &backup).unwrap();

        assert_eq!(first, backup);
        assert_eq!(second, dir.path().join("cs.json.bak_20240305T070809-1"));
        assert_eq!(third, dir.path().join("cs.json.bak_20240305T070809-2"));
        assert_eq!(read(&first), json!({"v": 0}));
        assert_eq!(read(&second), json!({"v": 1}));
        assert_eq!(read(&third), json!({"v": 2}));
    }

    #[tokio::test]
    async fn back_to_back_overwrites_keep_every_backup() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("cs.json");
        std::fs::write(&target, r#"{"v": 0}"#).unwrap();
        let controller = WriteController::new();
        let opts = WriteOptions { backup: true, overwrite: true };
        let t = target.to_str().unwrap();

        let a = controller.write_json(t, &json!({"v": 1}), opts).await.unwrap();
        let b = controller.write_json(t, &json!({"v": 2}), opts).await.unwrap();

        let (a, b) = (a.backup_file.unwrap(), b.backup_file.unwrap());
        assert_ne!(a, b);
        assert_eq!(read(&a), json!({"v": 0}));
        assert_eq!(read(&b), json!({"v": 1}));
        assert_eq!(read(&target), json!({"v": 2}));
    }

    #[tokio::test]
    async fn idle_path_locks_are_released() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("x.json");
        let controller = WriteController::new();
        controller
            .write_json(
                target.to_str().unwrap(),
                &json!({}),
                WriteOptions { backup: false, overwrite: true },
            )
            .await
            .unwrap();
        assert!(controller.locks.is_empty());
    }

    #[tokio::test]
    async fn no_overwrite_writes_fresh_sibling_and_keeps_original() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("x.json");
        std::fs::write(&target, r#"{"original": true}"#).unwrap();
        let controller = WriteController::new();
        let outcome = controller
            .write_json(
                target.to_str().unwrap(),
                &json!({"updated": true}),
                WriteOptions { backup: true, overwrite: false },
            )
            .await
            .unwrap();
        assert_eq!(outcome.written_to, dir.path().join("x-assistant-v1.json"));
        assert_eq!(outcome.backup_file, None);
        assert_eq!(read(&target), json!({"original": true}));
        assert_eq!(read(&outcome.written_to), json!({"updated": true}));
    }

    #[tokio::test]
    async fn overwrite_with_backup_copies_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("cs.json");
        std::fs::write(&target, r#"{"v": 1}"#).unwrap();
        let controller = WriteController::new();
        let outcome = controller
            .write_json(
                target.to_str().unwrap(),
                &json!({"v": 2}),
                WriteOptions { backup: true, overwrite: true },
            )
            .await
            .unwrap();
        assert_eq!(outcome.written_to, target);
        let backup = outcome.backup_file.expect("backup created");
        assert!(backup.to_string_lossy().contains("cs.json.bak_"));
        assert_eq!(read(&backup), json!({"v": 1}));
        assert_eq!(read(&target), json!({"v": 2}));
    }

    #[tokio::test]
    async fn overwrite_without_backup_replaces_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("cs.json");
        std::fs::write(&target, "[]").unwrap();
        let outcome = WriteController::new()
            .write_json(
                target.to_str().unwrap(),
                &json!([1]),
                WriteOptions { backup: false, overwrite: true },
            )
            .await
            .unwrap();
        assert_eq!(outcome.backup_file, None);
        assert_eq!(read(&target), json!([1]));
    }

    #[tokio::test]
    async fn new_target_is_written_directly() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("new.json");
        let outcome = WriteController::new()
            .write_json(
                target.to_str().unwrap(),
                &json!({"items": []}),
                WriteOptions { backup: true, overwrite: false },
            )
            .await
            .unwrap();
        assert_eq!(outcome.written_to, target);
        assert_eq!(outcome.backup_file, None);
    }

    #[tokio::test]
    async fn remote_target_is_rejected() {
        let err = WriteController::new()
            .write_json(
                "https://example.org/cs.json",
                &json!({}),
                WriteOptions { backup: true, overwrite: true },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AssistError::WriteTarget(_)));
    }

    #[tokio::test]
    async fn concurrent_non_overwriting_writes_get_distinct_versions() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("x.json");
        std::fs::write(&target, "{}").unwrap();
        let controller = Arc::new(WriteController::new());
        let opts = WriteOptions { backup: false, overwrite: false };
        let t = target.to_str().unwrap().to_string();
        let v1 = json!({"n": 1});
        let v2 = json!({"n": 2});
        let (a, b) = tokio::join!(
            controller.write_json(&t, &v1, opts),
            controller.write_json(&t, &v2, opts),
        );
        let mut written = vec![a.unwrap().written_to, b.unwrap().written_to];
        written.sort();
        assert_eq!(
            written,
            vec![
                dir.path().join("x-assistant-v1.json"),
                dir.path().join("x-assistant-v2.json")
            ]
        );
    }
}
