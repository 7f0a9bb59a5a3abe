use super::{BackendError, LockInfo, StateBackend};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How long a lock file that cannot be parsed still counts as held. Covers a
/// holder that has created the file but not written it yet.
const UNREADABLE_LOCK_GRACE: Duration = Duration::from_secs(60);

/// State file on the local filesystem, locked through `<path>.lock`.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    path: PathBuf,
    lock_path: PathBuf,
}

#[derive(Debug)]
enum LockFile {
    Missing,
    Owned(LockInfo),
    Unreadable { age: Duration },
}

fn read_lock_file(path: &Path) -> LockFile {
    let unreadable = || LockFile::Unreadable {
        age: std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .unwrap_or_default(),
    };

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return LockFile::Missing,
        Err(e) => {
            tracing::warn!(path = %path.display(), "failed to read lock file: {}", e);
            return unreadable();
        }
    };
    match serde_json::from_str(&content) {
        Ok(info) => LockFile::Owned(info),
        Err(e) => {
            tracing::debug!(path = %path.display(), "unparsable lock file: {}", e);
            unreadable()
        }
    }
}

impl LocalBackend {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let mut lock_path = path.clone().into_os_string();
        lock_path.push(".lock");
        Self {
            path,
            lock_path: PathBuf::from(lock_path),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    fn read_lock(&self) -> Option<LockInfo> {
        match read_lock_file(&self.lock_path) {
            LockFile::Owned(info) => Some(info),
            LockFile::Missing | LockFile::Unreadable { .. } => None,
        }
    }

    /// Returns true if the lock is held. A lock whose owner is gone, or that
    /// has stayed unparsable past the grace period, is removed.
    fn held(&self) -> bool {
        match read_lock_file(&self.lock_path) {
            LockFile::Missing => false,
            LockFile::Owned(info) if process_alive(info.pid) => true,
            LockFile::Owned(stale) => {
                tracing::info!(pid = stale.pid, id = %stale.id, "removing stale lock");
                !self.remove_stale(|current| {
                    matches!(current, LockFile::Owned(info) if info.id == stale.id && info.pid == stale.pid)
                })
            }
            LockFile::Unreadable { age } if age < UNREADABLE_LOCK_GRACE => true,
            LockFile::Unreadable { age } => {
                tracing::warn!(
                    path = %self.lock_path.display(),
                    age_secs = age.as_secs(),
                    "removing unreadable lock file"
                );
                !self.remove_stale(|current| {
                    matches!(current, LockFile::Unreadable { age } if *age >= UNREADABLE_LOCK_GRACE)
                })
            }
        }
    }

    /// Move the lock file aside, then delete it only if it is still the lock
    /// judged stale. A lock another process created in between is put back.
    /// Returns true when the stale lock is gone.
    fn remove_stale(&self, is_stale: impl Fn(&LockFile) -> bool) -> bool {
        let mut aside = self.lock_path.clone().into_os_string();
        aside.push(format!(
            ".stale-{}-{}",
            std::process::id(),
            chrono::Utc::now().timestamp_micros()
        ));
        let aside = PathBuf::from(aside);

        match std::fs::rename(&self.lock_path, &aside) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return true,
            Err(e) => {
                tracing::warn!(path = %self.lock_path.display(), "failed to move stale lock aside: {}", e);
                return false;
            }
        }

        let removed = is_stale(&read_lock_file(&aside));
        if !removed {
            tracing::debug!(path = %self.lock_path.display(), "lock was replaced, restoring it");
            if let Err(e) = std::fs::hard_link(&aside, &self.lock_path) {
                tracing::warn!(path = %self.lock_path.display(), "failed to restore lock: {}", e);
            }
        }
        if let Err(e) = std::fs::remove_file(&aside) {
            tracing::warn!(path = %aside.display(), "failed to remove old lock: {}", e);
        }
        removed
    }

    fn try_create(&self, info: &LockInfo) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.lock_path)?;
        let written = serde_json::to_vec_pretty(info)
            .map_err(std::io::Error::from)
            .and_then(|body| {
                file.write_all(&body)?;
                file.sync_all()
            });
        if written.is_err() {
            // An empty lock file would block other runs for the grace period.
            let _ = std::fs::remove_file(&self.lock_path);
        }
        written
    }
}

#[async_trait]
impl StateBackend for LocalBackend {
    async fn initialize(&self) -> Result<(), BackendError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| BackendError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }

    async fn configured(&self) -> bool {
        match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => parent.is_dir(),
            None => true,
        }
    }

    async fn lock(&self, lock_id: &str, info: Value) -> bool {
        let info = LockInfo::new(lock_id, info);
        for _ in 0..2 {
            match self.try_create(&info) {
                Ok(()) => {
                    tracing::debug!(path = %self.lock_path.display(), id = lock_id, "acquired lock");
                    return true;
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if self.held() {
                        return false;
                    }
                }
                Err(e) => {
                    tracing::warn!(path = %self.lock_path.display(), "failed to create lock file: {}", e);
                    return false;
                }
            }
        }
        false
    }

    async fn unlock(&self, lock_id: &str) -> bool {
        let Some(current) = self.read_lock() else {
            return false;
        };
        if current.id != lock_id || current.pid != std::process::id() {
            tracing::warn!(
                held_by = %current.id,
                pid = current.pid,
                "refusing to release a lock owned by someone else"
            );
            return false;
        }
        match std::fs::remove_file(&self.lock_path) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(path = %self.lock_path.display(), "failed to remove lock file: {}", e);
                false
            }
        }
    }

    async fn locked(&self) -> bool {
        self.held()
    }

    async fn lock_info(&self) -> Option<LockInfo> {
        if self.held() {
            self.read_lock()
        } else {
            None
        }
    }

    fn terraform_block(&self) -> Value {
        json!({ "local": { "path": self.path } })
    }
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    if pid == 0 || pid > i32::MAX as u32 {
        return false;
    }
    // Signal 0 only checks for existence; EPERM means it exists under another user.
    let result = unsafe { libc::kill(pid as i32, 0) };
    result == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
fn process_alive(pid: u32) -> bool {
    pid != 0
}
