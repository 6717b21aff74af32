//! Dispatch table construction errors.
//!
//! The builder is total on well-formed inputs; every variant here is fatal
//! and aborts the build. `InternalInvariant` indicates a builder bug rather
//! than bad input. User-visible compilation errors are the driver's job.

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Clone, Diagnostic)]
pub enum BuildError {
    #[error("malformed class hierarchy at '{class}': {reason}")]
    #[diagnostic(code(dispatch::hierarchy_malformed))]
    HierarchyMalformed { class: String, reason: String },

    #[error(
        "selector '{selector}' merges implementations with {left} and {right} type parameters"
    )]
    #[diagnostic(code(dispatch::parameter_shape_conflict))]
    ParameterShapeConflict {
        selector: String,
        left: u32,
        right: u32,
    },

    #[error("member '{member}' ({role}) has no selector id in the attribute metadata")]
    #[diagnostic(code(dispatch::selector_metadata_missing))]
    SelectorMetadataMissing { member: String, role: &'static str },

    #[error("internal invariant violated: {message}{}", fmt_context(.context))]
    #[diagnostic(code(dispatch::internal_invariant))]
    InternalInvariant {
        message: &'static str,
        context: Option<String>,
    },
}

impl BuildError {
    /// Internal invariant violation (builder bug).
    pub fn internal(message: &'static str) -> Self {
        BuildError::InternalInvariant {
            message,
            context: None,
        }
    }

    /// Internal invariant violation with context for debugging.
    pub fn internal_with_context(message: &'static str, context: impl Into<String>) -> Self {
        BuildError::InternalInvariant {
            message,
            context: Some(context.into()),
        }
    }
}

fn fmt_context(context: &Option<String>) -> String {
    match context {
        Some(context) => format!(" ({context})"),
        None => String::new(),
    }
}
