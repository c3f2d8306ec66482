//! repo.rs
//! The persistence boundary: get/save of whole networks by id.
//!
//! The core is agnostic to the storage medium; both implementations here
//! round-trip through serde so a loaded network always has its ephemeral
//! caches rebuilt.

use crate::graph::Network;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum RepoError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("network (de)serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Storage-medium-agnostic access to persisted networks.
pub trait NetworkRepository {
    fn get_by_id(&self, id: &str) -> Result<Option<Network>, RepoError>;
    fn save(&self, id: &str, network: &Network) -> Result<(), RepoError>;
}

/// Keeps serialized networks in memory. Intended for tests and previews;
/// storing the JSON form keeps its isolation semantics identical to the
/// file-backed repository.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    entries: Mutex<HashMap<String, String>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NetworkRepository for InMemoryRepository {
    fn get_by_id(&self, id: &str) -> Result<Option<Network>, RepoError> {
        // A panic while holding the lock leaves the map intact, so a
        // poisoned mutex is still safe to read through.
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(id) {
            Some(json) => {
                let mut network: Network = serde_json::from_str(json)?;
                network.rebuild_caches();
                Ok(Some(network))
            }
            None => Ok(None),
        }
    }

    fn save(&self, id: &str, network: &Network) -> Result<(), RepoError> {
        let json = serde_json::to_string(network)?;
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.to_string(), json);
        Ok(())
    }
}

/// One pretty-printed JSON document per network id under a root directory.
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    root: PathBuf,
}

impl JsonFileRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl NetworkRepository for JsonFileRepository {
    fn get_by_id(&self, id: &str) -> Result<Option<Network>, RepoError> {
        let path = self.path_for(id);
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&path)?;
        let mut network: Network = serde_json::from_str(&json)?;
        network.rebuild_caches();
        debug!(id, path = %path.display(), "network loaded");
        Ok(Some(network))
    }

    fn save(&self, id: &str, network: &Network) -> Result<(), RepoError> {
        std::fs::create_dir_all(&self.root)?;
        let path = self.path_for(id);
        let json = serde_json::to_string_pretty(network)?;
        std::fs::write(&path, json)?;
        debug!(id, path = %path.display(), "network saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::{Distance, Height, PointCode, Reading};

    fn sample_network() -> Network {
        let mut net = Network::new();
        let code = |s: &str| PointCode::new(s).unwrap();
        net.set_benchmark_height(&code("BM1"), Height::Known(52.430)).unwrap();
        let run = net.add_run("Line 1", Some(1));
        net.add_observation(
            run,
            &code("BM1"),
            &code("TP1"),
            Reading(1.402),
            Reading(0.977),
            Distance::new(31.0).unwrap(),
            Distance::new(29.0).unwrap(),
        )
        .unwrap();
        net
    }

    fn assert_restored(restored: &Network) {
        let bm = restored.point_by_code(&PointCode::new("BM1").unwrap()).unwrap();
        assert_eq!(restored.point(bm).unwrap().height, Height::Known(52.430));
        assert_eq!(restored.observations().count(), 1);
        assert_eq!(restored.run_count(), 1);
    }

    #[test]
    fn in_memory_round_trip() {
        let repo = InMemoryRepository::new();
        assert!(repo.get_by_id("net-1").unwrap().is_none());

        repo.save("net-1", &sample_network()).unwrap();
        let restored = repo.get_by_id("net-1").unwrap().unwrap();
        assert_restored(&restored);
    }

    #[test]
    fn in_memory_entries_are_isolated_from_callers() {
        let repo = InMemoryRepository::new();
        let mut original = sample_network();
        repo.save("net-1", &original).unwrap();

        // Mutating the caller's copy must not leak into storage.
        original.add_run("Line 2", None);
        let restored = repo.get_by_id("net-1").unwrap().unwrap();
        assert_eq!(restored.run_count(), 1);
    }

    #[test]
    fn in_memory_repository_survives_a_poisoned_lock() {
        let repo = InMemoryRepository::new();
        repo.save("net-1", &sample_network()).unwrap();

        let poisoned = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = repo.entries.lock().unwrap();
            panic!("poison the lock");
        }));
        assert!(poisoned.is_err());

        let restored = repo.get_by_id("net-1").unwrap().unwrap();
        assert_restored(&restored);
        repo.save("net-2", &sample_network()).unwrap();
    }

    #[test]
    fn file_repository_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonFileRepository::new(dir.path().join("networks"));

        assert!(repo.get_by_id("survey-2024").unwrap().is_none());
        repo.save("survey-2024", &sample_network()).unwrap();
        assert!(repo.root().join("survey-2024.json").exists());

        let restored = repo.get_by_id("survey-2024").unwrap().unwrap();
        assert_restored(&restored);
    }

    #[test]
    fn corrupt_file_surfaces_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonFileRepository::new(dir.path());
        std::fs::write(dir.path().join("bad.json"), "{not json").unwrap();

        match repo.get_by_id("bad") {
            Err(RepoError::Serialization(_)) => {}
            other => panic!("expected serialization error, got {other:?}"),
        }
    }
}
