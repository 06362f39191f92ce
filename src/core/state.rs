//! Lock file management: load, save (atomic), path derivation.

use super::error::{MusabiError, Result};
use super::types::{ResourceLock, StackLock};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

/// Derive the lock file path for a stack within the state directory.
pub fn lock_file_path(state_dir: &Path, stack: &str) -> PathBuf {
    state_dir.join(stack).join("synth.lock.yaml")
}

/// Load a stack's lock file. Returns None if the file doesn't exist.
pub fn load_lock(state_dir: &Path, stack: &str) -> Result<Option<StackLock>> {
    let path = lock_file_path(state_dir, stack);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path).map_err(|source| MusabiError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let lock: StackLock = serde_yaml_ng::from_str(&content).map_err(|e| MusabiError::State {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(Some(lock))
}

/// Save a lock file atomically (write to temp, then rename).
pub fn save_lock(state_dir: &Path, lock: &StackLock) -> Result<PathBuf> {
    let path = lock_file_path(state_dir, &lock.stack);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let yaml = serde_yaml_ng::to_string(lock)?;
    let tmp_path = path.with_extension("lock.yaml.tmp");
    std::fs::write(&tmp_path, yaml)?;
    std::fs::rename(&tmp_path, &path)?;

    tracing::debug!(path = %path.display(), resources = lock.resources.len(), "lock saved");
    Ok(path)
}

/// Create a lock for a freshly written template.
pub fn new_lock(
    stack: &str,
    template_file: &str,
    template_hash: &str,
    resources: IndexMap<String, ResourceLock>,
) -> StackLock {
    use crate::tripwire::eventlog::now_iso8601;
    StackLock {
        schema: "1.0".to_string(),
        stack: stack.to_string(),
        generated_at: now_iso8601(),
        generator: format!("musabi {}", env!("CARGO_PKG_VERSION")),
        template_file: template_file.to_string(),
        template_hash: template_hash.to_string(),
        resources,
    }
}
