use domus_trigger::CompileError;
use thiserror::Error;

/// Rule errors
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("rule '{rule}': {source}")]
    Compile {
        rule: String,
        #[source]
        source: CompileError,
    },

    #[error("duplicate rule name: {0}")]
    Duplicate(String),

    #[error("invalid rule '{rule}': {reason}")]
    Invalid { rule: String, reason: String },
}

impl RuleError {
    /// Name of the rule the error belongs to
    pub fn rule(&self) -> &str {
        match self {
            Self::Compile { rule, .. } | Self::Invalid { rule, .. } => rule,
            Self::Duplicate(rule) => rule,
        }
    }
}

/// Result type for rule operations
pub type RuleResult<T> = Result<T, RuleError>;
