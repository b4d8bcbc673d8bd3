pub mod engine;
pub mod events;
pub mod flat;
pub mod hierarchical;
mod rules;
pub mod topology;

use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use sea_orm_migration::MigratorTrait;

use crate::entities::{resource, role};
use crate::errors::CanopyError;
use crate::storage::{self, TagReport};
use crate::tree::{self, NodeFilter, TreeBranch, TreeNode};

pub use engine::Decision;
pub use events::{HandlerError, HandlerId, RoleDeletedHandler, RoleEvents};
pub use topology::{Candidate, CandidateSet, ControlEntry, RoleStrategy, RoleTopology, Subject};

/// Access-control engine over one database connection.
///
/// The role topology is chosen at construction and never changes.
#[derive(Debug)]
pub struct Canopy {
    db: DatabaseConnection,
    strategy: Box<dyn RoleStrategy>,
    events: RoleEvents,
}

impl Canopy {
    pub fn new(db: DatabaseConnection, topology: RoleTopology) -> Self {
        Self {
            db,
            strategy: topology.strategy(),
            events: RoleEvents::default(),
        }
    }

    /// Construct the engine and make sure both trees are in shape.
    pub async fn open(db: DatabaseConnection, topology: RoleTopology) -> Result<Self, CanopyError> {
        let canopy = Self::new(db, topology);
        canopy.prepare_trees().await?;
        Ok(canopy)
    }

    pub fn with_role_deleted_handler(mut self, handler: RoleDeletedHandler) -> Self {
        self.events.subscribe(handler);
        self
    }

    pub fn on_role_deleted(&mut self, handler: RoleDeletedHandler) -> HandlerId {
        self.events.subscribe(handler)
    }

    pub fn unsubscribe_role_deleted(&mut self, id: HandlerId) -> bool {
        self.events.unsubscribe(id)
    }

    pub fn topology(&self) -> RoleTopology {
        self.strategy.topology()
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    // Schema and maintenance

    pub async fn migrate_up(&self) -> Result<(), CanopyError> {
        migration::Migrator::up(&self.db, None).await?;
        tracing::info!("Applied access-control schema");
        Ok(())
    }

    pub async fn migrate_down(&self) -> Result<(), CanopyError> {
        migration::Migrator::down(&self.db, None).await?;
        tracing::info!("Dropped access-control schema");
        Ok(())
    }

    /// Ensure the resource root and bring the role table into the topology's shape.
    pub async fn prepare_trees(&self) -> Result<(), CanopyError> {
        tree::ensure_root::<resource::Entity, _>(&self.db).await?;
        self.strategy.prepare(&self.db).await
    }

    /// Wipe every record and start again from fresh trees.
    pub async fn purge(&self) -> Result<(), CanopyError> {
        storage::purge(&self.db).await?;
        self.prepare_trees().await
    }

    // Resources

    pub async fn add_resource(
        &self,
        alias: &str,
        parent: &str,
        description: Option<String>,
    ) -> Result<bool, CanopyError> {
        tree::insert::<resource::Entity, _>(&self.db, alias, parent, description).await
    }

    pub async fn edit_resource(&self, alias: &str, description: &str) -> Result<(), CanopyError> {
        tree::edit::<resource::Entity, _>(&self.db, alias, description).await
    }

    /// Remove a resource with its subtree and every rule attached to them.
    pub async fn remove_resource(&self, alias: &str) -> Result<u64, CanopyError> {
        tree::remove::<resource::Entity, _>(&self.db, alias).await
    }

    pub async fn resource(&self, alias: &str) -> Result<TreeNode, CanopyError> {
        tree::node::<resource::Entity, _>(&self.db, alias).await
    }

    pub async fn resource_path(
        &self,
        alias: &str,
        inclusive: bool,
    ) -> Result<Vec<TreeNode>, CanopyError> {
        tree::ancestor_path::<resource::Entity, _>(&self.db, alias, inclusive).await
    }

    pub async fn resource_tree(
        &self,
        alias: &str,
        exclude_prefixes: &[String],
    ) -> Result<Vec<TreeBranch>, CanopyError> {
        tree::descendants::<resource::Entity, _>(&self.db, alias, exclude_prefixes).await
    }

    pub async fn resource_descendants(
        &self,
        alias: &str,
        include_prefixes: &[String],
        filters: &[NodeFilter],
        page_size: u64,
        page: u64,
    ) -> Result<(u64, Vec<String>), CanopyError> {
        tree::paged_descendants::<resource::Entity, _>(
            &self.db,
            alias,
            include_prefixes,
            filters,
            page_size,
            page,
        )
        .await
    }

    // Roles

    /// Create a role. Under the hierarchical topology `related[0]` names the
    /// parent (root when empty) and `Ok(false)` means it does not exist.
    /// Under flat-with-tags every entry of `related` is attached as a tag.
    pub async fn add_role(
        &self,
        alias: &str,
        related: &[String],
        description: Option<String>,
    ) -> Result<bool, CanopyError> {
        self.strategy
            .add_role(&self.db, alias, related, description)
            .await
    }

    pub async fn edit_role(&self, alias: &str, description: &str) -> Result<(), CanopyError> {
        storage::edit_role(&self.db, alias, description).await
    }

    /// Remove a role, then notify role-deleted subscribers with its alias.
    pub async fn remove_role(&self, alias: &str) -> Result<(), CanopyError> {
        self.strategy.remove_role(&self.db, alias).await?;
        self.events.publish(alias)
    }

    pub async fn roles_search(&self, keyword: &str) -> Result<Vec<role::Model>, CanopyError> {
        storage::roles_search(&self.db, keyword).await
    }

    pub async fn roles(&self, aliases: &[String]) -> Result<Vec<role::Model>, CanopyError> {
        storage::roles(&self.db, aliases).await
    }

    // Actions

    pub async fn add_action(
        &self,
        alias: &str,
        description: Option<String>,
    ) -> Result<(), CanopyError> {
        storage::add_action(&self.db, alias, description).await
    }

    pub async fn edit_action(&self, alias: &str, description: &str) -> Result<(), CanopyError> {
        storage::edit_action(&self.db, alias, description).await
    }

    pub async fn remove_action(&self, alias: &str) -> Result<(), CanopyError> {
        storage::remove_action(&self.db, alias).await
    }

    // Tags

    pub async fn add_tag(&self, name: &str) -> Result<(), CanopyError> {
        storage::add_tag(&self.db, name).await
    }

    pub async fn remove_tag(&self, name: &str) -> Result<(), CanopyError> {
        storage::remove_tag(&self.db, name).await
    }

    pub async fn tag_role(&self, role: &str, tags: &[String]) -> Result<TagReport, CanopyError> {
        storage::tag_role(&self.db, role, tags).await
    }

    pub async fn untag_role(&self, role: &str, tags: &[String]) -> Result<u64, CanopyError> {
        storage::untag_role(&self.db, role, tags).await
    }

    // Rules

    pub async fn enforce(
        &self,
        allowed: bool,
        action: &str,
        role: &str,
        resource: &str,
    ) -> Result<(), CanopyError> {
        storage::enforce(&self.db, allowed, action, role, resource).await
    }

    pub async fn lift(&self, action: &str, role: &str, resource: &str) -> Result<u64, CanopyError> {
        storage::lift(&self.db, action, role, resource).await
    }

    pub async fn enforce_tag(
        &self,
        allowed: bool,
        action: &str,
        tag: &str,
        resource: &str,
    ) -> Result<(), CanopyError> {
        storage::enforce_tag(&self.db, allowed, action, tag, resource).await
    }

    pub async fn lift_tag(&self, action: &str, tag: &str, resource: &str) -> Result<u64, CanopyError> {
        storage::lift_tag(&self.db, action, tag, resource).await
    }

    // Resolution

    /// Whether any of `roles` may perform `action` on `resource`.
    ///
    /// The most specific matching rule wins; with no matching rule, or no
    /// roles at all, the answer is deny.
    pub async fn allowed<S: AsRef<str>>(
        &self,
        roles: &[S],
        action: &str,
        resource: &str,
    ) -> Result<bool, CanopyError> {
        Ok(self.explain(roles, action, resource).await?.allowed)
    }

    /// Like [`Canopy::allowed`], also returning the rules that were weighed.
    pub async fn explain<S: AsRef<str>>(
        &self,
        roles: &[S],
        action: &str,
        resource: &str,
    ) -> Result<Decision, CanopyError> {
        if roles.is_empty() {
            return Ok(Decision::deny());
        }
        let roles: Vec<String> = roles.iter().map(|r| r.as_ref().to_string()).collect();

        let txn = self.db.begin().await?;
        let result = self.resolve(&txn, &roles, action, resource).await;
        let decision = finish(txn, result).await?;

        tracing::debug!(
            roles = ?roles,
            action,
            resource,
            candidates = decision.considered.len(),
            allowed = decision.allowed,
            "Resolved access"
        );
        Ok(decision)
    }

    async fn resolve(
        &self,
        txn: &DatabaseTransaction,
        roles: &[String],
        action: &str,
        resource: &str,
    ) -> Result<Decision, CanopyError> {
        let action_id = storage::action_id(txn, action).await?;
        let path = tree::ancestor_path::<resource::Entity, _>(txn, resource, true).await?;
        let set = self.strategy.candidates(txn, roles, action_id, &path).await?;
        Ok(engine::reduce(engine::order(set)))
    }

    /// Every rule on `resource` or one of its ancestors, most general first.
    pub async fn controls(&self, resource: &str) -> Result<Vec<ControlEntry>, CanopyError> {
        let txn = self.db.begin().await?;
        let result = async {
            let path = tree::ancestor_path::<resource::Entity, _>(&txn, resource, true).await?;
            self.strategy.controls(&txn, &path).await
        }
        .await;
        let mut entries = finish(txn, result).await?;
        engine::sort_controls(&mut entries);
        Ok(entries)
    }
}

/// Close a read transaction according to the outcome of the work done in it.
async fn finish<T>(
    txn: DatabaseTransaction,
    result: Result<T, CanopyError>,
) -> Result<T, CanopyError> {
    match result {
        Ok(value) => {
            txn.commit().await?;
            Ok(value)
        }
        Err(e) => {
            txn.rollback().await?;
            Err(e)
        }
    }
}
