use async_trait::async_trait;
use sea_orm::{DatabaseConnection, DatabaseTransaction};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::authz::flat::FlatWithTags;
use crate::authz::hierarchical::Hierarchical;
use crate::errors::CanopyError;
use crate::tree::TreeNode;

/// How roles relate to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoleTopology {
    /// Roles form a nested-set tree; a role inherits the rules of its ancestors.
    Hierarchical,
    /// Roles are flat and grouped by tags; rules may target roles or tags.
    #[default]
    FlatWithTags,
}

impl RoleTopology {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleTopology::Hierarchical => "hierarchical",
            RoleTopology::FlatWithTags => "flat-with-tags",
        }
    }

    pub(crate) fn strategy(self) -> Box<dyn RoleStrategy> {
        match self {
            RoleTopology::Hierarchical => Box::new(Hierarchical),
            RoleTopology::FlatWithTags => Box::new(FlatWithTags),
        }
    }
}

impl fmt::Display for RoleTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleTopology {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hierarchical" => Ok(RoleTopology::Hierarchical),
            "flat-with-tags" => Ok(RoleTopology::FlatWithTags),
            other => Err(format!(
                "unknown role topology `{other}` (expected `hierarchical` or `flat-with-tags`)"
            )),
        }
    }
}

/// Who a rule is keyed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "lowercase")]
pub enum Subject {
    Role(String),
    Tag(String),
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Role(alias) => write!(f, "role/{alias}"),
            Subject::Tag(name) => write!(f, "tag/{name}"),
        }
    }
}

/// A rule that matched an authorization query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Right bound of the resource the rule is attached to. Larger means more general.
    pub specificity: i32,
    pub resource: String,
    pub subject: Subject,
    pub allowed: bool,
}

/// Matching rules, split by the source they were gathered from.
///
/// Each list arrives ordered from the most general resource to the most
/// specific one, denies after allows on the same resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateSet {
    pub by_role: Vec<Candidate>,
    pub by_tag: Vec<Candidate>,
}

/// A rule as listed for audit, with human-readable labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlEntry {
    pub specificity: i32,
    pub resource: String,
    pub resource_description: Option<String>,
    pub action: String,
    pub action_description: Option<String>,
    pub subject: Subject,
    pub subject_description: Option<String>,
    pub allowed: bool,
}

impl ControlEntry {
    pub fn subject_label(&self) -> &str {
        match (&self.subject_description, &self.subject) {
            (Some(label), _) => label,
            (None, Subject::Role(alias)) | (None, Subject::Tag(alias)) => alias,
        }
    }

    pub fn action_label(&self) -> &str {
        self.action_description.as_deref().unwrap_or(&self.action)
    }
}

/// Topology-specific role management and subject expansion.
#[async_trait]
pub trait RoleStrategy: Send + Sync + fmt::Debug {
    fn topology(&self) -> RoleTopology;

    /// Bring the role table into the shape this topology expects.
    async fn prepare(&self, db: &DatabaseConnection) -> Result<(), CanopyError>;

    /// Create a role. `related` is the parent (hierarchical) or the tags to
    /// attach (flat). Returns `false` when a hierarchical parent is missing.
    async fn add_role(
        &self,
        db: &DatabaseConnection,
        alias: &str,
        related: &[String],
        description: Option<String>,
    ) -> Result<bool, CanopyError>;

    async fn remove_role(&self, db: &DatabaseConnection, alias: &str) -> Result<(), CanopyError>;

    /// Rules for `action_id` on any of `resource_path` that apply to `roles`.
    async fn candidates(
        &self,
        txn: &DatabaseTransaction,
        roles: &[String],
        action_id: i32,
        resource_path: &[TreeNode],
    ) -> Result<CandidateSet, CanopyError>;

    /// Every rule attached to any of `resource_path`.
    async fn controls(
        &self,
        txn: &DatabaseTransaction,
        resource_path: &[TreeNode],
    ) -> Result<Vec<ControlEntry>, CanopyError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topology_round_trips_through_str() {
        for topology in [RoleTopology::Hierarchical, RoleTopology::FlatWithTags] {
            assert_eq!(topology.as_str().parse::<RoleTopology>(), Ok(topology));
            assert_eq!(topology.strategy().topology(), topology);
        }
        assert!("tree".parse::<RoleTopology>().is_err());
    }

    #[test]
    fn test_topology_serde_names() {
        let json = serde_json::to_string(&RoleTopology::FlatWithTags).unwrap();
        assert_eq!(json, "\"flat-with-tags\"");
        let parsed: RoleTopology = serde_json::from_str("\"hierarchical\"").unwrap();
        assert_eq!(parsed, RoleTopology::Hierarchical);
    }
}
