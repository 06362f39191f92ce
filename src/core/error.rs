//! Error type shared by the library and the CLI.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MusabiError {
    #[error("{} validation error(s)", .0.len())]
    Validation(Vec<String>),

    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("invalid CIDR block '{0}'")]
    InvalidCidr(String),

    #[error("resource '{from}' references unknown resource '{to}'")]
    UnknownReference { from: String, to: String },

    #[error("dependency cycle among: {0}")]
    DependencyCycle(String),

    #[error("duplicate logical ID: {0}")]
    DuplicateLogicalId(String),

    #[error("{0} already exists")]
    Exists(String),

    #[error("cannot read state at {path}: {reason}")]
    State { path: String, reason: String },

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MusabiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_validation_counts() {
        let e = MusabiError::Validation(vec!["a".into(), "b".into()]);
        assert_eq!(e.to_string(), "2 validation error(s)");
    }

    #[test]
    fn test_error_unknown_reference_display() {
        let e = MusabiError::UnknownReference {
            from: "Rule".into(),
            to: "Ghost".into(),
        };
        assert!(e.to_string().contains("unknown resource 'Ghost'"));
    }
}
