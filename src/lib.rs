//! An operation execution engine: declarative operation specs bound to
//! resources and run through transactional phase chains.
//!

pub use opchain_internal::*;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use opchain_internal::prelude::*;
}
