use async_trait::async_trait;
use sea_orm::{DatabaseConnection, DatabaseTransaction};
use std::collections::HashMap;

use crate::authz::rules;
use crate::authz::topology::{CandidateSet, ControlEntry, RoleStrategy, RoleTopology, Subject};
use crate::entities::role;
use crate::errors::CanopyError;
use crate::tree::{self, TreeNode, ROOT_ALIAS};

/// Roles live in a nested-set tree rooted at `root`. A subject role inherits
/// every rule attached to one of its ancestors.
#[derive(Debug, Default, Clone, Copy)]
pub struct Hierarchical;

#[async_trait]
impl RoleStrategy for Hierarchical {
    fn topology(&self) -> RoleTopology {
        RoleTopology::Hierarchical
    }

    async fn prepare(&self, db: &DatabaseConnection) -> Result<(), CanopyError> {
        tree::ensure_root::<role::Entity, _>(db).await
    }

    async fn add_role(
        &self,
        db: &DatabaseConnection,
        alias: &str,
        related: &[String],
        description: Option<String>,
    ) -> Result<bool, CanopyError> {
        let parent = related.first().map(String::as_str).unwrap_or(ROOT_ALIAS);
        tree::insert::<role::Entity, _>(db, alias, parent, description).await
    }

    async fn remove_role(&self, db: &DatabaseConnection, alias: &str) -> Result<(), CanopyError> {
        tree::remove::<role::Entity, _>(db, alias).await?;
        Ok(())
    }

    async fn candidates(
        &self,
        txn: &DatabaseTransaction,
        roles: &[String],
        action_id: i32,
        resource_path: &[TreeNode],
    ) -> Result<CandidateSet, CanopyError> {
        // Every subject role plus all of their ancestors
        let mut lineage: HashMap<i32, String> = HashMap::new();
        for alias in roles {
            for ancestor in tree::ancestor_path::<role::Entity, _>(txn, alias, true).await? {
                lineage.insert(ancestor.id, ancestor.alias);
            }
        }
        let role_ids: Vec<i32> = lineage.keys().copied().collect();

        let rows = rules::role_rules(txn, resource_path, Some(action_id), Some(&role_ids)).await?;
        let by_role = rules::candidates(&rows, resource_path, |id| {
            lineage.get(&id).cloned().map(Subject::Role)
        });

        Ok(CandidateSet {
            by_role,
            by_tag: Vec::new(),
        })
    }

    async fn controls(
        &self,
        txn: &DatabaseTransaction,
        resource_path: &[TreeNode],
    ) -> Result<Vec<ControlEntry>, CanopyError> {
        rules::role_entries(txn, resource_path).await
    }
}
