//! YAML definitions loader.
//!
//! Devices live under `inventory/hardware/active` (powered equipment)
//! and `inventory/hardware/passive` (patch panels) below the definitions
//! root. Each file holds one device. Parse failures are collected per
//! file so one typo doesn't hide the rest of the tree.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use rackforge_core::model::DeviceSpec;

use crate::error::CliError;

/// Subdirectories scanned for device definitions, in load order.
const DEVICE_DIRS: [&str; 2] = ["inventory/hardware/active", "inventory/hardware/passive"];

/// Result of loading a definitions tree.
pub struct LoadedDefinitions {
    pub devices: Vec<DeviceSpec>,
    pub errors: Vec<(PathBuf, String)>,
}

/// Load every device definition under `root`.
pub fn load_devices(root: &Path) -> Result<LoadedDefinitions, CliError> {
    let mut devices = Vec::new();
    let mut errors = Vec::new();

    for dir in DEVICE_DIRS {
        let dir = root.join(dir);
        if !dir.is_dir() {
            debug!(dir = %dir.display(), "definitions directory absent, skipping");
            continue;
        }

        for path in yaml_files(&dir)? {
            match parse_device(&path) {
                Ok(device) => {
                    debug!(file = %path.display(), device = device.name, "loaded device definition");
                    devices.push(device);
                }
                Err(message) => {
                    warn!(file = %path.display(), error = message, "definition failed to parse");
                    errors.push((path, message));
                }
            }
        }
    }

    Ok(LoadedDefinitions { devices, errors })
}

/// All `.yaml`/`.yml` files directly in `dir`, sorted for stable order.
fn yaml_files(dir: &Path) -> Result<Vec<PathBuf>, CliError> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == "yaml" || ext == "yml")
        })
        .collect();
    files.sort();
    Ok(files)
}

fn parse_device(path: &Path) -> Result<DeviceSpec, String> {
    let raw = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    serde_yaml::from_str(&raw).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::load_devices;

    #[test]
    fn loads_devices_and_collects_errors() {
        let root = tempfile::tempdir().unwrap();
        let active = root.path().join("inventory/hardware/active");
        std::fs::create_dir_all(&active).unwrap();

        std::fs::write(
            active.join("sw-01.yaml"),
            "name: sw-01\nsite_slug: fra1\ndevice_type_slug: x-48\nrole_slug: leaf\n",
        )
        .unwrap();
        std::fs::write(active.join("broken.yaml"), "name: [unterminated\n").unwrap();
        std::fs::write(active.join("notes.txt"), "not yaml\n").unwrap();

        let loaded = load_devices(root.path()).unwrap();
        assert_eq!(loaded.devices.len(), 1);
        assert_eq!(loaded.devices[0].name, "sw-01");
        assert_eq!(loaded.errors.len(), 1);
    }

    #[test]
    fn missing_directories_are_not_an_error() {
        let root = tempfile::tempdir().unwrap();
        let loaded = load_devices(root.path()).unwrap();
        assert!(loaded.devices.is_empty());
        assert!(loaded.errors.is_empty());
    }
}
