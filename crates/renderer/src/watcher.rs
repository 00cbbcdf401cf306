//! Modification-time polling for the shader file being viewed.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

/// Fixed-interval schedule, independent of the frame rate.
#[derive(Debug, Clone)]
pub struct PeriodicTask {
    interval: Duration,
    next_due: Instant,
}

impl PeriodicTask {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            next_due: now + interval,
        }
    }

    pub fn next_due(&self) -> Instant {
        self.next_due
    }

    /// Returns `true` when the task should run at `now`. Missed periods are
    /// coalesced into a single run.
    pub fn poll(&mut self, now: Instant) -> bool {
        if now < self.next_due {
            return false;
        }
        self.next_due = now + self.interval;
        true
    }
}

#[derive(Debug, Clone, Default)]
pub struct ShaderWatcher {
    path: Option<PathBuf>,
    last_modified: Option<SystemTime>,
}

impl ShaderWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Starts watching `path`, forgetting the previous file's timestamp.
    pub fn watch(&mut self, path: impl Into<PathBuf>) {
        self.path = Some(path.into());
        self.last_modified = None;
    }

    /// Records the current timestamp without reporting a change.
    pub fn mark_current(&mut self) {
        if let Some(modified) = self.path.as_deref().and_then(modified_time) {
            self.last_modified = Some(modified);
        }
    }

    /// Re-stats the watched file. Returns its path when the modification time
    /// is strictly newer than the recorded one; the new time is recorded
    /// before returning, so a failed reload is not retried until the file
    /// changes again. A file that cannot be stat'ed never triggers.
    pub fn check(&mut self) -> Option<PathBuf> {
        let path = self.path.as_ref()?;
        let modified = modified_time(path)?;
        if self.last_modified.is_some_and(|last| modified <= last) {
            return None;
        }
        self.last_modified = Some(modified);
        Some(path.clone())
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    match fs::metadata(path).and_then(|meta| meta.modified()) {
        Ok(modified) => Some(modified),
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "cannot stat shader file");
            None
        }
    }
}

/// Reads a shader file. An unreadable file is logged and yields an empty
/// source, which the program manager rejects as a compile error.
pub fn read_shader_source(path: &Path) -> String {
    match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            tracing::error!(path = %path.display(), error = %err, "failed to read shader file");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_with_mtime(path: &Path, contents: &str, modified: SystemTime) {
        let mut file = File::create(path).expect("create shader");
        file.write_all(contents.as_bytes()).expect("write shader");
        file.set_modified(modified).expect("set mtime");
    }

    #[test]
    fn periodic_task_fires_once_per_interval() {
        let start = Instant::now();
        let mut task = PeriodicTask::new(Duration::from_millis(500), start);
        assert!(!task.poll(start + Duration::from_millis(499)));
        assert!(task.poll(start + Duration::from_millis(500)));
        assert!(!task.poll(start + Duration::from_millis(600)));
        // a long stall runs once, not once per missed period
        assert!(task.poll(start + Duration::from_secs(5)));
        assert!(!task.poll(start + Duration::from_millis(5100)));
    }

    #[test]
    fn triggers_only_on_strictly_newer_mtime() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("scene.frag");
        let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        write_with_mtime(&path, "a", base);

        let mut watcher = ShaderWatcher::new();
        watcher.watch(&path);
        watcher.mark_current();
        assert_eq!(watcher.check(), None);

        write_with_mtime(&path, "b", base);
        assert_eq!(watcher.check(), None);

        write_with_mtime(&path, "c", base + Duration::from_secs(2));
        assert_eq!(watcher.check().as_deref(), Some(path.as_path()));
        assert_eq!(watcher.check(), None);

        write_with_mtime(&path, "d", base + Duration::from_secs(1));
        assert_eq!(watcher.check(), None);
    }

    #[test]
    fn first_check_without_baseline_triggers() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("scene.frag");
        std::fs::write(&path, "x").expect("write");
        let mut watcher = ShaderWatcher::new();
        watcher.watch(&path);
        assert!(watcher.check().is_some());
        assert!(watcher.check().is_none());
    }

    #[test]
    fn missing_file_never_triggers() {
        let dir = TempDir::new().expect("temp dir");
        let mut watcher = ShaderWatcher::new();
        watcher.watch(dir.path().join("missing.frag"));
        watcher.mark_current();
        assert!(watcher.check().is_none());

        let path = dir.path().join("scene.frag");
        std::fs::write(&path, "x").expect("write");
        watcher.watch(&path);
        assert_eq!(watcher.path(), Some(path.as_path()));
        assert!(watcher.check().is_some());
    }

    #[test]
    fn unreadable_shader_reads_as_empty() {
        let dir = TempDir::new().expect("temp dir");
        assert_eq!(read_shader_source(&dir.path().join("nope.frag")), "");
        let path = dir.path().join("ok.frag");
        std::fs::write(&path, "vec3 render").expect("write");
        assert_eq!(read_shader_source(&path), "vec3 render");
    }
}
