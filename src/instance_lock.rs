//! One sign process per machine.
//!
//! Two sign processes would fight over the terminal and the Arduinos, so the
//! daemon holds a listening Unix socket for its whole lifetime. The kernel
//! drops the listener when the process dies, so a leftover socket file that
//! nobody answers on is stale and gets replaced.

use log::{debug, info};
use std::ffi::OsString;
use std::io;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const SOCKET_NAME: &str = "open-sign.sock";

#[derive(Debug, Error)]
pub enum InstanceLockError {
    #[error("another sign is already running ({0})")]
    AlreadyRunning(PathBuf),

    #[error("failed to acquire instance lock: {0}")]
    Io(#[from] io::Error),
}

/// Held for the lifetime of the process; removes its socket on drop.
pub struct InstanceLock {
    _listener: UnixListener,
    path: PathBuf,
}

impl InstanceLock {
    /// Lock at [`socket_path`].
    pub fn acquire() -> Result<Self, InstanceLockError> {
        Self::acquire_at(socket_path(std::env::var_os("XDG_RUNTIME_DIR")))
    }

    pub fn acquire_at(path: PathBuf) -> Result<Self, InstanceLockError> {
        if path.exists() {
            if UnixStream::connect(&path).is_ok() {
                return Err(InstanceLockError::AlreadyRunning(path));
            }
            debug!("Removing stale lock socket {}", path.display());
            std::fs::remove_file(&path)?;
        }

        let listener = UnixListener::bind(&path).map_err(|e| match e.kind() {
            io::ErrorKind::AddrInUse => InstanceLockError::AlreadyRunning(path.clone()),
            _ => InstanceLockError::Io(e),
        })?;
        info!("Instance lock held at {}", path.display());
        Ok(Self {
            _listener: listener,
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// The lock socket inside the runtime dir, or `/tmp` without one.
pub fn socket_path(runtime_dir: Option<OsString>) -> PathBuf {
    runtime_dir
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(SOCKET_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_path() {
        assert_eq!(
            socket_path(Some("/run/user/1000".into())),
            PathBuf::from("/run/user/1000/open-sign.sock")
        );
        assert_eq!(socket_path(None), PathBuf::from("/tmp/open-sign.sock"));
        assert_eq!(socket_path(Some("".into())), PathBuf::from("/tmp/open-sign.sock"));
    }

    #[test]
    fn test_second_instance_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SOCKET_NAME);

        let first = InstanceLock::acquire_at(path.clone()).unwrap();
        assert!(matches!(
            InstanceLock::acquire_at(path.clone()),
            Err(InstanceLockError::AlreadyRunning(_))
        ));

        drop(first);
        assert!(!path.exists());
        assert!(InstanceLock::acquire_at(path).is_ok());
    }

    #[test]
    fn test_stale_socket_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SOCKET_NAME);
        // a bound-then-dropped listener leaves a socket file nobody answers on
        drop(UnixListener::bind(&path).unwrap());
        assert!(path.exists());

        let lock = InstanceLock::acquire_at(path.clone()).unwrap();
        assert_eq!(lock.path(), path.as_path());
    }
}
