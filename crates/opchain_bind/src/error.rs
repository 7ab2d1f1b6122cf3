//! Error types for binding and invocation through the binder.

use opchain_runtime::InvocationError;
use opchain_spec::OpError;
use thiserror::Error;

/// Errors raised while including, binding or mutating a resource.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    /// No resource with this name was included.
    #[error("unknown resource '{0}'")]
    UnknownResource(String),

    /// A resource with this name was already included.
    #[error("resource '{0}' is already included")]
    DuplicateResource(String),

    /// The resource has no effective operation with this alias.
    #[error("resource '{resource}' has no operation '{alias}'")]
    UnknownAlias {
        /// Resource that was searched.
        resource: String,
        /// Alias that was not found.
        alias: String,
    },

    /// A bind listener refused the new binding. The previous one stays.
    #[error("binding of '{resource}' rejected: {reason}")]
    Rejected {
        /// Resource being bound.
        resource: String,
        /// Reason given by the listener.
        reason: String,
    },

    /// A patched or declared spec was rejected.
    #[error(transparent)]
    Spec(#[from] OpError),
}

impl BindError {
    /// Creates an [`UnknownResource`](Self::UnknownResource).
    pub fn unknown_resource(name: impl Into<String>) -> Self {
        Self::UnknownResource(name.into())
    }
}

/// Errors raised by [`Binder::call`](crate::Binder::call).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// No resource with this name is bound.
    #[error("unknown resource '{0}'")]
    UnknownResource(String),

    /// The resource has no operation with this alias.
    #[error("resource '{resource}' has no operation '{alias}'")]
    UnknownAlias {
        /// Resource that was searched.
        resource: String,
        /// Alias that was not found.
        alias: String,
    },

    /// The operation exists but is hidden from the callable surface.
    #[error("operation '{resource}.{alias}' is not callable")]
    NotCallable {
        /// Owning resource.
        resource: String,
        /// Hidden alias.
        alias: String,
    },

    /// The invocation ran and failed.
    #[error(transparent)]
    Invocation(#[from] InvocationError),
}

impl CallError {
    /// Returns the invocation failure, if the operation ran.
    #[must_use]
    pub fn invocation(&self) -> Option<&InvocationError> {
        match self {
            CallError::Invocation(err) => Some(err),
            _ => None,
        }
    }
}
