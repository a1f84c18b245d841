use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// One unit of the compile pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Decode,
    Resources,
    HostSystem,
    Datacenter,
    Network,
    Storage,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode => write!(f, "decode"),
            Self::Resources => write!(f, "resources"),
            Self::HostSystem => write!(f, "host_system"),
            Self::Datacenter => write!(f, "datacenter"),
            Self::Network => write!(f, "network"),
            Self::Storage => write!(f, "storage"),
        }
    }
}

/// Coarse classification surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Decode,
    Validation,
    NotFound,
    Timeout,
    Unsupported,
    Range,
    Cancelled,
    Remote,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode => write!(f, "decode"),
            Self::Validation => write!(f, "validation"),
            Self::NotFound => write!(f, "not_found"),
            Self::Timeout => write!(f, "timeout"),
            Self::Unsupported => write!(f, "unsupported"),
            Self::Range => write!(f, "range"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Remote => write!(f, "remote"),
        }
    }
}

/// Kind of object a not-found error refers to. Deliberately coarse: the
/// caller learns *what* could not be found, never *why*.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Datacenter,
    VirtualMachine,
    Datastore,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Datacenter => write!(f, "datacenter"),
            Self::VirtualMachine => write!(f, "virtual machine"),
            Self::Datastore => write!(f, "datastore"),
        }
    }
}

/// Failure of a single stage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    #[error("malformed specification: {0}")]
    Decode(String),

    #[error("invalid network fields: {}", fields.join(", "))]
    Validation { fields: Vec<String> },

    #[error("unsupported guest operating system {name:?} ({word_size}-bit)")]
    UnsupportedOs { name: String, word_size: i64 },

    #[error("{field} = {value} is outside the allowed range 1..={max}")]
    Range {
        field: &'static str,
        value: i64,
        max: i64,
    },

    #[error("{0} not found")]
    NotFound(Resource),

    #[error("remote call did not complete within {0:?}")]
    Timeout(Duration),

    #[error("cancelled by caller")]
    Cancelled,

    #[error("control plane error: {0}")]
    Remote(String),
}

impl StageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Decode(_) => ErrorKind::Decode,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::UnsupportedOs { .. } => ErrorKind::Unsupported,
            Self::Range { .. } => ErrorKind::Range,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Remote(_) => ErrorKind::Remote,
        }
    }

    /// Offending field names; empty for anything but validation failures.
    pub fn fields(&self) -> &[String] {
        match self {
            Self::Validation { fields } => fields,
            _ => &[],
        }
    }

    pub fn at(self, stage: Stage) -> CompileError {
        CompileError {
            stage,
            source: self,
        }
    }
}

/// A stage failure tagged with the stage that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{stage} stage failed: {source}")]
pub struct CompileError {
    stage: Stage,
    #[source]
    source: StageError,
}

impl CompileError {
    pub fn new(stage: Stage, source: StageError) -> Self {
        Self { stage, source }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }

    pub fn fields(&self) -> &[String] {
        self.source.fields()
    }

    pub fn stage_error(&self) -> &StageError {
        &self.source
    }

    /// Serializable summary for callers that report over a wire.
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            stage: self.stage,
            kind: self.kind(),
            fields: self.fields().to_vec(),
            message: self.source.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub stage: Stage,
    pub kind: ErrorKind,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
    pub message: String,
}
