use std::fmt;
use thiserror::Error;

/// Result alias used across the generator.
pub type GenResult<T> = Result<T, GenError>;

/// Pipeline state a translation run is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Collecting,
    Filtering,
    Ordering,
    Resolving,
    Rendering,
    Emitting,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Collecting => "collecting",
            Stage::Filtering => "filtering",
            Stage::Ordering => "ordering",
            Stage::Resolving => "resolving",
            Stage::Rendering => "rendering",
            Stage::Emitting => "emitting",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Fatal errors. Any of these aborts the run and no document is produced.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenError {
    /// Aggregates that contain each other by value.
    #[error("structural cycle detected while {stage}: {}", .path.join(" -> "))]
    StructuralCycle { stage: Stage, path: Vec<String> },

    /// Two distinct entities resolve to the same output identifier.
    #[error("name collision while {stage}: '{identifier}' is produced by both {first} and {second}")]
    NameCollision {
        stage: Stage,
        identifier: String,
        first: String,
        second: String,
    },

    /// A whitelist entry could not be compiled into a matcher.
    #[error("invalid whitelist pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

impl GenError {
    pub fn stage(&self) -> Stage {
        match self {
            GenError::StructuralCycle { stage, .. } => *stage,
            GenError::NameCollision { stage, .. } => *stage,
            GenError::InvalidPattern { .. } => Stage::Filtering,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// No representable output form; a best-effort declaration was emitted.
    UnsupportedConstruct,
    /// An expression could not be reduced; its text passes through verbatim.
    UnresolvedExpression,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarningKind::UnsupportedConstruct => f.write_str("unsupported construct"),
            WarningKind::UnresolvedExpression => f.write_str("unresolved expression"),
        }
    }
}

/// Non-fatal diagnostic attached to one declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub declaration: String,
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    pub fn unsupported(declaration: &str, message: impl Into<String>) -> Self {
        Self {
            declaration: declaration.to_string(),
            kind: WarningKind::UnsupportedConstruct,
            message: message.into(),
        }
    }

    pub fn unresolved(declaration: &str, message: impl Into<String>) -> Self {
        Self {
            declaration: declaration.to_string(),
            kind: WarningKind::UnresolvedExpression,
            message: message.into(),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}: {}", self.kind, self.declaration, self.message)
    }
}
