//! Durable snapshot of the device store.
//!
//! Snapshots are best-effort: a failed write is logged by the caller and
//! never takes the service down. The file is written to a temporary
//! sibling and atomically renamed into place so readers never observe a
//! torn snapshot.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::DeviceState;
use crate::GuardError;

use super::DeviceStore;

/// On-disk snapshot shape: `{generatedAt, devices}`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Wall-clock milliseconds at which the snapshot was taken
    pub generated_at: i64,
    /// Every tracked device
    pub devices: Vec<DeviceState>,
}

/// Serialize the store to `path` via write-to-temp + atomic rename.
pub fn save(path: &Path, store: &DeviceStore, now_ms: i64) -> Result<(), GuardError> {
    let snapshot = Snapshot {
        generated_at: now_ms,
        devices: store.get_all(),
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let bytes = serde_json::to_vec_pretty(&snapshot)?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, bytes)?;
    fs::rename(&tmp_path, path)?;

    tracing::debug!(
        path = %path.display(),
        devices = snapshot.devices.len(),
        "snapshot persisted"
    );
    Ok(())
}

/// Load a snapshot into the store, refreshing every `last_update` to
/// `now_ms` so a restart does not mass-prune the restored world.
///
/// Returns the number of restored devices; a missing file restores
/// nothing and is not an error.
pub fn load(path: &Path, store: &DeviceStore, now_ms: i64) -> Result<usize, GuardError> {
    if !path.exists() {
        return Ok(0);
    }

    let bytes = fs::read(path)?;
    let mut snapshot: Snapshot = serde_json::from_slice(&bytes)?;
    for device in &mut snapshot.devices {
        device.last_update = now_ms;
    }

    let restored = snapshot.devices.len();
    store.replace_all(snapshot.devices);
    tracing::info!(path = %path.display(), devices = restored, "snapshot restored");
    Ok(restored)
}
