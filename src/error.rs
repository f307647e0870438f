use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("expected a document at the top level, found {kind}")]
    NotADocument { kind: &'static str },
    #[error("invalid JSON document: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("pair '{0}' must be in the form 'source:canonical'")]
    InvalidPair(String),
    #[error("invalid audit configuration: {0}")]
    InvalidConfig(#[from] serde_yaml::Error),
    #[error("invalid setting '{setting}': {message}")]
    InvalidSetting {
        setting: &'static str,
        message: String,
    },
}
