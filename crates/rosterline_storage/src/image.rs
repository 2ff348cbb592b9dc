//! Portable JSON image of a snapshot store.

use crate::snapshot::DailySnapshot;
use crate::store::{SnapshotStore, StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

const IMAGE_VERSION: u32 = 1;

/// Every snapshot in a store plus its fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreImage {
    /// Image format version
    pub version: u32,
    /// Hex fingerprint of the exported store
    pub fingerprint: String,
    /// Snapshots ordered by team then date
    pub snapshots: Vec<DailySnapshot>,
}

impl StoreImage {
    /// Capture the current contents of a store
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be read
    pub fn export(store: &SnapshotStore) -> StoreResult<Self> {
        Ok(Self {
            version: IMAGE_VERSION,
            fingerprint: store.fingerprint()?.to_hex(),
            snapshots: store.snapshots()?,
        })
    }

    /// Rebuild a store from the image
    ///
    /// # Errors
    ///
    /// Returns `Image` on version or fingerprint mismatch, and any write
    /// error the snapshots trigger
    pub fn restore(&self) -> StoreResult<SnapshotStore> {
        if self.version != IMAGE_VERSION {
            return Err(StoreError::Image {
                reason: format!("version mismatch: expected {}, got {}", IMAGE_VERSION, self.version),
            });
        }

        let mut snapshots = self.snapshots.clone();
        snapshots.sort_by_key(|s| (s.team_id, s.date));

        let store = SnapshotStore::new();
        for snapshot in snapshots {
            store.put_snapshot(snapshot)?;
        }

        let fingerprint = store.fingerprint()?.to_hex();
        if fingerprint != self.fingerprint {
            return Err(StoreError::Image {
                reason: format!("fingerprint mismatch: image says {}, content hashes to {}", self.fingerprint, fingerprint),
            });
        }
        tracing::debug!(snapshots = self.snapshots.len(), "restored store image");
        Ok(store)
    }

    /// Write the image as JSON
    ///
    /// # Errors
    ///
    /// Returns `Image` on I/O or encoding failure
    pub fn save(&self, path: &Path) -> StoreResult<()> {
        let json = serde_json::to_vec_pretty(self).map_err(|e| StoreError::Image {
            reason: format!("failed to encode image: {}", e),
        })?;
        std::fs::write(path, json).map_err(|e| StoreError::Image {
            reason: format!("failed to write {}: {}", path.display(), e),
        })
    }

    /// Read an image written by [`StoreImage::save`]
    ///
    /// # Errors
    ///
    /// Returns `Image` on I/O or decoding failure
    pub fn load(path: &Path) -> StoreResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| StoreError::Image {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Image {
            reason: format!("failed to decode image: {}", e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::RosterState;
    use chrono::NaiveDate;
    use rosterline_core::{PlayerId, TeamId};

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, n).unwrap()
    }

    fn sample() -> SnapshotStore {
        let store = SnapshotStore::new();
        let roster: RosterState = [PlayerId::new(7), PlayerId::new(8)].into_iter().collect();
        store.put(TeamId::new(2), day(1), roster.clone()).unwrap();
        store.put(TeamId::new(2), day(2), RosterState::new()).unwrap();
        store.put(TeamId::new(1), day(1), roster).unwrap();
        store
    }

    #[test]
    fn test_export_restore() {
        let store = sample();
        let image = StoreImage::export(&store).unwrap();
        assert_eq!(image.snapshots.len(), 3);
        let restored = image.restore().unwrap();
        assert_eq!(restored.fingerprint().unwrap(), store.fingerprint().unwrap());
    }

    #[test]
    fn test_restore_detects_tampering() {
        let mut image = StoreImage::export(&sample()).unwrap();
        image.snapshots[0].roster.insert(PlayerId::new(99));
        let err = image.restore().unwrap_err();
        assert!(matches!(err, StoreError::Image { .. }));
    }

    #[test]
    fn test_restore_rejects_unknown_version() {
        let mut image = StoreImage::export(&sample()).unwrap();
        image.version = 9;
        assert!(image.restore().is_err());
    }

    #[test]
    fn test_save_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let image = StoreImage::export(&sample()).unwrap();
        image.save(&path).unwrap();
        assert_eq!(StoreImage::load(&path).unwrap(), image);
    }
}
