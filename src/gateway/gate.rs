//! Fail-fast mutual exclusion in front of an upstream sampler.
//!
//! # Responsibilities
//! - Grant at most one permit per lock domain at a time
//! - Never wait: a held gate answers `Busy` immediately
//! - Release on drop, whatever path the request takes
//!
//! # Gate kinds
//! - [`FileGate`]: advisory `flock` on a lock file. The file is opened (and
//!   created if absent) on every attempt and the lock dies with the handle.
//!   Excludes other processes using the same path.
//! - [`SlotGate`]: single-slot semaphore owned by the server. Only excludes
//!   requests inside this process.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use fs2::FileExt;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::{GateConfig, GateKind};

/// Why a permit was not granted.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("gate '{0}' is held by another request")]
    Busy(String),
    #[error("cannot open lock file {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot lock {path:?}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A mutual-exclusion resource guarding one upstream.
pub trait Gate: Send + Sync + std::fmt::Debug {
    /// Gate identifier, for logs and metrics.
    fn name(&self) -> &str;

    /// Try to take the gate without blocking.
    fn try_enter(&self) -> Result<GatePermit, GateError>;
}

/// Proof of exclusive access. Dropping it opens the gate again.
#[derive(Debug)]
pub struct GatePermit {
    _hold: Hold,
}

#[derive(Debug)]
enum Hold {
    File(LockedFile),
    Slot(OwnedSemaphorePermit),
}

#[derive(Debug)]
struct LockedFile {
    file: File,
    path: PathBuf,
}

impl Drop for LockedFile {
    fn drop(&mut self) {
        // The close that follows releases it too.
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(path = ?self.path, error = %e, "Failed to unlock gate file");
        }
        tracing::trace!(path = ?self.path, "Gate file released");
    }
}

/// Advisory file lock gate.
#[derive(Debug)]
pub struct FileGate {
    name: String,
    path: PathBuf,
}

impl FileGate {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Gate for FileGate {
    fn name(&self) -> &str {
        &self.name
    }

    fn try_enter(&self) -> Result<GatePermit, GateError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|source| GateError::Open {
                path: self.path.clone(),
                source,
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(GatePermit {
                _hold: Hold::File(LockedFile {
                    file,
                    path: self.path.clone(),
                }),
            }),
            Err(e) if is_contended(&e) => Err(GateError::Busy(self.name.clone())),
            Err(source) => Err(GateError::Lock {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

fn is_contended(e: &std::io::Error) -> bool {
    e.kind() == std::io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// In-process single-slot gate.
#[derive(Debug)]
pub struct SlotGate {
    name: String,
    slot: Arc<Semaphore>,
}

impl SlotGate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slot: Arc::new(Semaphore::new(1)),
        }
    }

    /// Whether the slot is currently free.
    pub fn is_free(&self) -> bool {
        self.slot.available_permits() > 0
    }
}

impl Gate for SlotGate {
    fn name(&self) -> &str {
        &self.name
    }

    fn try_enter(&self) -> Result<GatePermit, GateError> {
        match self.slot.clone().try_acquire_owned() {
            Ok(permit) => Ok(GatePermit {
                _hold: Hold::Slot(permit),
            }),
            // The semaphore is never closed, so every failure is contention.
            Err(_) => Err(GateError::Busy(self.name.clone())),
        }
    }
}

/// Hands out one gate instance per definition.
///
/// Route tables rebuilt on config reload resolve their gates here, so an
/// unchanged definition keeps the very same semaphore and requests in flight
/// across the reload still exclude new ones.
///
/// A definition is the whole `GateConfig`. Renaming a gate or changing its
/// kind or path starts a new lock domain: a request still holding a renamed
/// `memory` gate's slot does not exclude requests on the new one. Renamed
/// `file` gates on the same path still exclude each other through the lock.
#[derive(Debug, Default)]
pub struct GateRegistry {
    gates: DashMap<GateConfig, Arc<dyn Gate>>,
}

impl GateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the gate for a definition, creating it on first use.
    ///
    /// Returns `None` for a file gate without a path.
    pub fn resolve(&self, config: &GateConfig) -> Option<Arc<dyn Gate>> {
        if let Some(existing) = self.gates.get(config) {
            return Some(existing.clone());
        }

        let gate: Arc<dyn Gate> = match config.kind {
            GateKind::File => Arc::new(FileGate::new(&config.name, config.path.clone()?)),
            GateKind::Memory => Arc::new(SlotGate::new(&config.name)),
        };
        Some(self.gates.entry(config.clone()).or_insert(gate).clone())
    }

    /// Forget definitions no longer in use.
    pub fn retain(&self, live: &[GateConfig]) {
        self.gates.retain(|k, _| live.contains(k));
    }

    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_gate_excludes_second_holder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flock");
        let first = FileGate::new("a", &path);
        let second = FileGate::new("b", &path);

        let permit = first.try_enter().unwrap();
        assert!(path.exists(), "lock file is created on demand");
        assert!(matches!(second.try_enter(), Err(GateError::Busy(name)) if name == "b"));

        drop(permit);
        assert!(second.try_enter().is_ok());
    }

    #[test]
    fn file_gate_reports_unopenable_path() {
        let dir = tempfile::tempdir().unwrap();
        let gate = FileGate::new("bad", dir.path().join("missing").join("flock"));
        assert!(matches!(gate.try_enter(), Err(GateError::Open { .. })));
    }

    #[test]
    fn slot_gate_is_fail_fast() {
        let gate = SlotGate::new("mem");
        let permit = gate.try_enter().unwrap();
        assert!(!gate.is_free());
        assert!(matches!(gate.try_enter(), Err(GateError::Busy(_))));
        drop(permit);
        assert!(gate.is_free());
        assert!(gate.try_enter().is_ok());
    }

    #[test]
    fn registry_reuses_unchanged_definitions() {
        let registry = GateRegistry::new();
        let mem = GateConfig {
            name: "mem".into(),
            kind: GateKind::Memory,
            path: None,
        };

        let a = registry.resolve(&mem).unwrap();
        let b = registry.resolve(&mem).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let _held = a.try_enter().unwrap();
        assert!(b.try_enter().is_err());

        registry.retain(&[]);
        assert!(registry.is_empty());
        let c = registry.resolve(&mem).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn renamed_gate_is_a_new_domain() {
        let registry = GateRegistry::new();
        let dir = tempfile::tempdir().unwrap();
        let old_mem = GateConfig {
            name: "old".into(),
            kind: GateKind::Memory,
            path: None,
        };
        let new_mem = GateConfig {
            name: "new".into(),
            ..old_mem.clone()
        };

        let held = registry.resolve(&old_mem).unwrap().try_enter().unwrap();
        registry.retain(std::slice::from_ref(&new_mem));
        assert!(registry.resolve(&new_mem).unwrap().try_enter().is_ok());
        drop(held);

        let old_file = GateConfig {
            name: "old".into(),
            kind: GateKind::File,
            path: Some(dir.path().join("flock")),
        };
        let new_file = GateConfig {
            name: "new".into(),
            ..old_file.clone()
        };
        let _held = registry.resolve(&old_file).unwrap().try_enter().unwrap();
        registry.retain(std::slice::from_ref(&new_file));
        assert!(matches!(
            registry.resolve(&new_file).unwrap().try_enter(),
            Err(GateError::Busy(name)) if name == "new"
        ));
    }

    #[test]
    fn registry_rejects_file_gate_without_path() {
        let registry = GateRegistry::new();
        let broken = GateConfig {
            name: "f".into(),
            kind: GateKind::File,
            path: None,
        };
        assert!(registry.resolve(&broken).is_none());
        assert_eq!(registry.len(), 0);
    }
}
