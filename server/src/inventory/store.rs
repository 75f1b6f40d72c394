//! Drone inventory storage

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

/// A drone record as listed to operator tooling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub name: String,
}

impl Device {
    /// Build a record whose id is derived from its display name
    pub fn from_name(name: &str) -> Self {
        let name = name.trim();
        Self {
            id: name.replace(' ', "_"),
            name: name.to_string(),
        }
    }
}

/// Fleet listed when no inventory file exists yet
pub fn default_fleet() -> Vec<Device> {
    (1..=3)
        .map(|n| Device::from_name(&format!("Quadcopter {}", n)))
        .collect()
}

/// Errors raised by inventory operations
#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("device name must not be empty")]
    EmptyName,

    #[error("device {0} already exists")]
    Duplicate(String),

    #[error("device {0} not found")]
    NotFound(String),

    #[error("inventory file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("inventory file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// In-memory drone inventory, optionally mirrored to a JSON file
#[derive(Debug)]
pub struct InventoryStore {
    devices: RwLock<Vec<Device>>,
    path: Option<PathBuf>,
}

impl InventoryStore {
    /// In-memory store seeded with the given devices
    pub fn in_memory(devices: Vec<Device>) -> Self {
        Self {
            devices: RwLock::new(devices),
            path: None,
        }
    }

    /// Open a store backed by `path`.
    ///
    /// A missing file is created with the default fleet.
    pub async fn open(path: PathBuf) -> Result<Self, InventoryError> {
        let devices = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let devices: Vec<Device> = serde_json::from_slice(&bytes)?;
                info!("Loaded {} device(s) from {}", devices.len(), path.display());
                devices
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let devices = default_fleet();
                write_file(&path, &devices).await?;
                info!("Created inventory file {} with default fleet", path.display());
                devices
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            devices: RwLock::new(devices),
            path: Some(path),
        })
    }

    /// All devices, in insertion order
    pub async fn list(&self) -> Vec<Device> {
        self.devices.read().await.clone()
    }

    /// Add a device by display name
    pub async fn add(&self, name: &str) -> Result<Device, InventoryError> {
        if name.trim().is_empty() {
            return Err(InventoryError::EmptyName);
        }

        let device = Device::from_name(name);
        let mut devices = self.devices.write().await;
        if devices.iter().any(|d| d.id == device.id) {
            return Err(InventoryError::Duplicate(device.id));
        }

        devices.push(device.clone());
        if let Err(e) = self.persist(&devices).await {
            devices.pop();
            return Err(e);
        }
        Ok(device)
    }

    /// Remove a device by id
    pub async fn remove(&self, id: &str) -> Result<Device, InventoryError> {
        let mut devices = self.devices.write().await;
        let pos = devices
            .iter()
            .position(|d| d.id == id)
            .ok_or_else(|| InventoryError::NotFound(id.to_string()))?;

        let removed = devices.remove(pos);
        if let Err(e) = self.persist(&devices).await {
            devices.insert(pos, removed);
            return Err(e);
        }
        Ok(removed)
    }

    async fn persist(&self, devices: &[Device]) -> Result<(), InventoryError> {
        match &self.path {
            Some(path) => write_file(path, devices).await,
            None => Ok(()),
        }
    }
}

impl Default for InventoryStore {
    fn default() -> Self {
        Self::in_memory(default_fleet())
    }
}

async fn write_file(path: &Path, devices: &[Device]) -> Result<(), InventoryError> {
    let json = serde_json::to_vec_pretty(devices)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_fleet() {
        let fleet = default_fleet();
        assert_eq!(fleet.len(), 3);
        assert_eq!(fleet[0].id, "Quadcopter_1");
        assert_eq!(fleet[0].name, "Quadcopter 1");
    }

    #[tokio::test]
    async fn test_add_and_remove() {
        let store = InventoryStore::default();

        let added = store.add("  Heavy Lifter 2 ").await.expect("add failed");
        assert_eq!(added.id, "Heavy_Lifter_2");
        assert_eq!(added.name, "Heavy Lifter 2");
        assert_eq!(store.list().await.len(), 4);

        let removed = store.remove("Quadcopter_2").await.expect("remove failed");
        assert_eq!(removed.name, "Quadcopter 2");
        let ids: Vec<_> = store.list().await.into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["Quadcopter_1", "Quadcopter_3", "Heavy_Lifter_2"]);
    }

    #[tokio::test]
    async fn test_add_rejects_bad_names() {
        let store = InventoryStore::default();

        assert!(matches!(store.add("   ").await, Err(InventoryError::EmptyName)));
        assert!(matches!(
            store.add("Quadcopter 1").await,
            Err(InventoryError::Duplicate(id)) if id == "Quadcopter_1"
        ));
        assert_eq!(store.list().await, default_fleet());
    }

    #[tokio::test]
    async fn test_remove_unknown() {
        let store = InventoryStore::default();
        assert!(matches!(
            store.remove("Ghost").await,
            Err(InventoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let path = dir.path().join("drones.json");

        let store = InventoryStore::open(path.clone()).await.expect("open failed");
        assert_eq!(store.list().await, default_fleet());
        assert!(path.exists());

        store.add("Scout").await.expect("add failed");
        store.remove("Quadcopter_3").await.expect("remove failed");
        drop(store);

        let reopened = InventoryStore::open(path).await.expect("reopen failed");
        let ids: Vec<_> = reopened.list().await.into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["Quadcopter_1", "Quadcopter_2", "Scout"]);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let path = dir.path().join("drones.json");
        std::fs::write(&path, b"not json").expect("write failed");

        assert!(matches!(
            InventoryStore::open(path).await,
            Err(InventoryError::Json(_))
        ));
    }
}
