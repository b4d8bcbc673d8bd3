use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, Set, TransactionTrait,
};
use std::collections::HashMap;

use crate::authz::rules;
use crate::authz::topology::{CandidateSet, ControlEntry, RoleStrategy, RoleTopology, Subject};
use crate::entities::{role, role_tag, tag};
use crate::errors::{CanopyError, EntityKind};
use crate::storage;
use crate::tree::TreeNode;

/// Roles are plain rows grouped by tags. Rules may be keyed by a role or by
/// any tag the role carries.
#[derive(Debug, Default, Clone, Copy)]
pub struct FlatWithTags;

#[async_trait]
impl RoleStrategy for FlatWithTags {
    fn topology(&self) -> RoleTopology {
        RoleTopology::FlatWithTags
    }

    /// Drop any leftovers of a role tree.
    async fn prepare(&self, db: &DatabaseConnection) -> Result<(), CanopyError> {
        let result = role::Entity::delete_many()
            .filter(role::Column::Lt.is_not_null())
            .filter(role::Column::Rt.is_not_null())
            .exec(db)
            .await?;
        if result.rows_affected > 0 {
            tracing::info!(removed = result.rows_affected, "Dropped tree-shaped roles");
        }
        Ok(())
    }

    /// Insert the role and attach `related` as tags, creating missing tags.
    /// Either everything is stored or nothing is.
    async fn add_role(
        &self,
        db: &DatabaseConnection,
        alias: &str,
        related: &[String],
        description: Option<String>,
    ) -> Result<bool, CanopyError> {
        let alias = alias.to_string();
        let mut tags: Vec<String> = Vec::with_capacity(related.len());
        for name in related {
            if !tags.contains(name) {
                tags.push(name.clone());
            }
        }

        db.transaction::<_, bool, CanopyError>(move |txn| {
            Box::pin(async move {
                let created = role::ActiveModel {
                    alias: Set(alias.clone()),
                    description: Set(description),
                    ..Default::default()
                }
                .insert(txn)
                .await
                .map_err(CanopyError::from_db)?;

                for name in &tags {
                    let tag_id = storage::ensure_tag(txn, name).await?;
                    role_tag::Entity::insert(role_tag::ActiveModel {
                        role_id: Set(created.id),
                        tag_id: Set(tag_id),
                    })
                    .exec_without_returning(txn)
                    .await?;
                }

                tracing::info!(alias = %alias, tags = ?tags, "Added role");
                Ok(true)
            })
        })
        .await
        .map_err(CanopyError::from)
    }

    async fn remove_role(&self, db: &DatabaseConnection, alias: &str) -> Result<(), CanopyError> {
        let result = role::Entity::delete_many()
            .filter(role::Column::Alias.eq(alias))
            .exec(db)
            .await?;
        if result.rows_affected == 0 {
            return Err(CanopyError::not_found(EntityKind::Role, alias));
        }
        tracing::info!(alias, "Removed role");
        Ok(())
    }

    async fn candidates(
        &self,
        txn: &DatabaseTransaction,
        roles: &[String],
        action_id: i32,
        resource_path: &[TreeNode],
    ) -> Result<CandidateSet, CanopyError> {
        let mut role_names: HashMap<i32, String> = HashMap::new();
        for alias in roles {
            let id = storage::role_id(txn, alias).await?;
            role_names.insert(id, alias.clone());
        }
        let role_ids: Vec<i32> = role_names.keys().copied().collect();

        let rows = rules::role_rules(txn, resource_path, Some(action_id), Some(&role_ids)).await?;
        let by_role = rules::candidates(&rows, resource_path, |id| {
            role_names.get(&id).cloned().map(Subject::Role)
        });

        let tag_ids = storage::tag_ids_for_roles(txn, &role_ids).await?;
        let by_tag = if tag_ids.is_empty() {
            Vec::new()
        } else {
            let tag_names: HashMap<i32, String> = tag::Entity::find()
                .filter(tag::Column::Id.is_in(tag_ids.iter().copied()))
                .all(txn)
                .await?
                .into_iter()
                .map(|t| (t.id, t.name))
                .collect();
            let rows =
                rules::tag_rules(txn, resource_path, Some(action_id), Some(&tag_ids)).await?;
            rules::candidates(&rows, resource_path, |id| {
                tag_names.get(&id).cloned().map(Subject::Tag)
            })
        };

        Ok(CandidateSet { by_role, by_tag })
    }

    async fn controls(
        &self,
        txn: &DatabaseTransaction,
        resource_path: &[TreeNode],
    ) -> Result<Vec<ControlEntry>, CanopyError> {
        let mut entries = rules::role_entries(txn, resource_path).await?;
        entries.extend(rules::tag_entries(txn, resource_path).await?);
        Ok(entries)
    }
}
