//! Drift detection: compare a written template against its lock hash.
//!
//! The template handed to the provisioning engine must be the one `musabi`
//! synthesized; a hand edit between synth and deploy shows up here.

use crate::core::types::StackLock;
use crate::tripwire::hasher;
use std::path::Path;

/// A single drift finding.
#[derive(Debug, Clone)]
pub struct DriftFinding {
    pub stack: String,
    pub template_file: String,
    pub expected_hash: String,
    pub actual_hash: String,
    pub detail: String,
}

/// Check the template file recorded in a lock.
pub fn detect_drift(lock: &StackLock) -> Option<DriftFinding> {
    let path = Path::new(&lock.template_file);
    let finding = |actual_hash: String, detail: String| DriftFinding {
        stack: lock.stack.clone(),
        template_file: lock.template_file.clone(),
        expected_hash: lock.template_hash.clone(),
        actual_hash,
        detail,
    };

    if !path.exists() {
        return Some(finding(
            "MISSING".to_string(),
            format!("{} does not exist", lock.template_file),
        ));
    }

    let actual = hasher::hash_file(path).unwrap_or_else(|e| format!("ERROR:{}", e));
    if actual != lock.template_hash {
        return Some(finding(
            actual,
            format!("{} changed since synth", lock.template_file),
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_lock(template_file: &Path, template_hash: &str) -> StackLock {
        StackLock {
            schema: "1.0".to_string(),
            stack: "musabiStack".to_string(),
            generated_at: "2026-02-16T14:00:00Z".to_string(),
            generator: "musabi 0.1.0".to_string(),
            template_file: template_file.display().to_string(),
            template_hash: template_hash.to_string(),
            resources: indexmap::IndexMap::new(),
        }
    }

    #[test]
    fn test_drift_none_when_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("musabiStack.template.json");
        std::fs::write(&file, "{}").unwrap();
        let hash = hasher::hash_file(&file).unwrap();
        assert!(detect_drift(&make_lock(&file, &hash)).is_none());
    }

    #[test]
    fn test_drift_hand_edit_detected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("musabiStack.template.json");
        std::fs::write(&file, "{}").unwrap();
        let hash = hasher::hash_file(&file).unwrap();
        std::fs::write(&file, r#"{"Resources":{}}"#).unwrap();

        let finding = detect_drift(&make_lock(&file, &hash)).unwrap();
        assert_eq!(finding.stack, "musabiStack");
        assert_ne!(finding.actual_hash, finding.expected_hash);
        assert!(finding.detail.contains("changed"));
    }

    #[test]
    fn test_drift_missing_template() {
        let finding = detect_drift(&make_lock(
            Path::new("/nonexistent/musabiStack.template.json"),
            "blake3:abc",
        ))
        .unwrap();
        assert_eq!(finding.actual_hash, "MISSING");
    }
}
