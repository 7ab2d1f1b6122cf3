//! Canonical behavior families and the per-operation policies derived from them.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::OpError;

/// Canonical behavior family of an operation.
///
/// Every target except [`Target::Custom`] has a canonical implementation
/// dispatched by the engine; `Custom` carries an explicit handler instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// Create one instance.
    Create,
    /// Read one identified instance.
    Read,
    /// Partially update one identified instance.
    Update,
    /// Fully replace one identified instance.
    Replace,
    /// Merge fields into one identified instance.
    Merge,
    /// Delete one identified instance.
    Delete,
    /// List instances matching filters.
    List,
    /// Delete every instance matching filters.
    Clear,
    /// Create many instances.
    BulkCreate,
    /// Partially update many instances.
    BulkUpdate,
    /// Replace many instances.
    BulkReplace,
    /// Merge into many instances.
    BulkMerge,
    /// Delete many instances.
    BulkDelete,
    /// Business logic supplied by the operation's handler.
    Custom,
}

impl Target {
    /// All targets with a canonical implementation, in declaration order.
    pub const CANONICAL: [Target; 13] = [
        Target::Create,
        Target::Read,
        Target::Update,
        Target::Replace,
        Target::Merge,
        Target::Delete,
        Target::List,
        Target::Clear,
        Target::BulkCreate,
        Target::BulkUpdate,
        Target::BulkReplace,
        Target::BulkMerge,
        Target::BulkDelete,
    ];

    /// Returns the snake-case name, which is also the canonical alias.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Target::Create => "create",
            Target::Read => "read",
            Target::Update => "update",
            Target::Replace => "replace",
            Target::Merge => "merge",
            Target::Delete => "delete",
            Target::List => "list",
            Target::Clear => "clear",
            Target::BulkCreate => "bulk_create",
            Target::BulkUpdate => "bulk_update",
            Target::BulkReplace => "bulk_replace",
            Target::BulkMerge => "bulk_merge",
            Target::BulkDelete => "bulk_delete",
            Target::Custom => "custom",
        }
    }

    /// Returns the default arity for the target.
    ///
    /// Single-instance verbs address a member; everything else a collection.
    #[must_use]
    pub const fn default_arity(self) -> Arity {
        match self {
            Target::Read | Target::Update | Target::Replace | Target::Merge | Target::Delete => {
                Arity::Member
            }
            _ => Arity::Collection,
        }
    }

    /// Returns whether this is one of the `bulk_*` targets.
    #[must_use]
    pub const fn is_bulk(self) -> bool {
        matches!(
            self,
            Target::BulkCreate
                | Target::BulkUpdate
                | Target::BulkReplace
                | Target::BulkMerge
                | Target::BulkDelete
        )
    }

    /// Returns whether the target has a canonical implementation.
    #[must_use]
    pub const fn is_canonical(self) -> bool {
        !matches!(self, Target::Custom)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Target {
    type Err = OpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Target::CANONICAL
            .into_iter()
            .chain([Target::Custom])
            .find(|t| t.as_str() == s)
            .ok_or_else(|| OpError::spec_conflict(format!("unknown target '{s}'")))
    }
}

/// Whether an operation addresses a single identified instance or a set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arity {
    /// A single instance addressed by identifier.
    Member,
    /// A set of instances.
    Collection,
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Member => f.write_str("member"),
            Arity::Collection => f.write_str("collection"),
        }
    }
}

/// Transactional participation policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistPolicy {
    /// Participate in the engine-managed transaction (the usual case).
    #[default]
    Default,
    /// Always participate, even for read-like targets.
    Always,
    /// Never begin or commit a transaction.
    Skip,
}

impl PersistPolicy {
    /// Returns whether the engine injects begin/commit steps.
    #[must_use]
    pub const fn persists(self) -> bool {
        !matches!(self, PersistPolicy::Skip)
    }
}
