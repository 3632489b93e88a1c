//! Engine-level failures.
//!
//! Analysis findings are [`Diagnostic`](crate::frontend::diagnostics::Diagnostic) values, never errors. An
//! `EngineError` means the engine could not be set up as asked, typically because of a bad configuration.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid exclude pattern `{pattern}`: {source}")]
    InvalidExclude {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("unknown rule `{0}` in configuration")]
    UnknownRule(String),

    #[error("invalid parameter `{param}` for rule `{rule}`: {reason}")]
    InvalidRuleParam {
        rule: String,
        param: String,
        reason: String,
    },
}

pub type EngineResult<T> = Result<T, EngineError>;
