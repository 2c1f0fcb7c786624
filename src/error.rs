use std::fmt;
use thiserror::Error;

/// Envelope step an error originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Validate,
    ResolveConfiguration,
    Connect,
    Lookup,
    Mutate,
    Sync,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Validate => "argument validation",
            Step::ResolveConfiguration => "configuration resolution",
            Step::Connect => "directory connection",
            Step::Lookup => "directory lookup",
            Step::Mutate => "directory update",
            Step::Sync => "delta sync",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum RunbookError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Remote operation failed during {step}: {message}")]
    RemoteOperation { step: Step, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Interactive prompt error: {0}")]
    Dialoguer(#[from] dialoguer::Error),
}

impl RunbookError {
    pub fn remote(step: Step, message: impl Into<String>) -> Self {
        RunbookError::RemoteOperation {
            step,
            message: message.into(),
        }
    }

    /// The step the failure belongs to, for logging
    pub fn step(&self) -> Option<Step> {
        match self {
            RunbookError::Validation(_) => Some(Step::Validate),
            RunbookError::Configuration(_) => Some(Step::ResolveConfiguration),
            RunbookError::NotFound(_) => Some(Step::Lookup),
            RunbookError::RemoteOperation { step, .. } => Some(*step),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RunbookError>;

/// Turn an LDAP result code into a readable message with an operator hint
pub fn enhance_ldap_error(code: u32, text: &str) -> String {
    let (name, hint) = match code {
        19 => (
            "constraintViolation",
            "\nHint: The password may not meet the domain complexity or history policy.",
        ),
        32 => (
            "noSuchObject",
            "\nHint: The target object or container does not exist. Check the path and names.",
        ),
        49 => (
            "invalidCredentials",
            "\nHint: Check the DomainCredentials username and password.",
        ),
        50 => (
            "insufficientAccessRights",
            "\nHint: The runbook account lacks the delegated rights for this operation.",
        ),
        53 => (
            "unwillingToPerform",
            "\nHint: Password changes require an LDAPS connection and a policy-compliant password.",
        ),
        68 => (
            "entryAlreadyExists",
            "\nHint: An object with this name already exists in the target container.",
        ),
        _ => ("ldapError", ""),
    };

    let text = text.trim_end_matches('\0').trim();
    if text.is_empty() {
        format!("{} ({}){}", name, code, hint)
    } else {
        format!("{} ({}): {}{}", name, code, text, hint)
    }
}
