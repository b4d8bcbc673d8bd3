//! Canopy - nested-set access control
//!
//! Resources (and optionally roles) are kept as nested-set trees; allow/deny
//! rules attached to tree nodes are resolved so that the most specific rule
//! wins and the absence of a rule means deny.

pub mod authz;
pub mod entities;
pub mod errors;
pub mod settings;
pub mod storage;
pub mod tree;

pub use authz::{Canopy, RoleTopology};
pub use errors::{CanopyError, EntityKind};
