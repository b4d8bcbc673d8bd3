use crate::entities::{action, control, resource, role, role_tag, tag, tcontrol};
use crate::errors::{ignore_conflict, CanopyError, EntityKind};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, Database, DatabaseConnection, DbBackend,
    EntityName, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set, Statement,
};
use serde::{Deserialize, Serialize};

use crate::settings::Database as DbCfg;

pub async fn init(cfg: &DbCfg) -> Result<DatabaseConnection, CanopyError> {
    let db = Database::connect(&cfg.url).await?;
    Ok(db)
}

/// Restart the auto-increment counter of `table`.
///
/// `table` always comes from an entity definition, never from callers.
pub async fn reset_identity<C: ConnectionTrait>(db: &C, table: &str) -> Result<(), CanopyError> {
    let backend = db.get_database_backend();
    let stmt = if backend == DbBackend::Sqlite {
        Statement::from_sql_and_values(
            backend,
            "DELETE FROM sqlite_sequence WHERE name = ?",
            [table.into()],
        )
    } else if backend == DbBackend::MySql {
        Statement::from_string(backend, format!("ALTER TABLE `{table}` AUTO_INCREMENT = 1"))
    } else {
        Statement::from_string(
            backend,
            format!("ALTER SEQUENCE \"{table}_id_seq\" RESTART WITH 1"),
        )
    };
    db.execute(stmt).await?;
    Ok(())
}

/// Delete every row of the given tables, optionally restarting their identity counters.
pub async fn reset_tables<C: ConnectionTrait>(
    db: &C,
    tables: &[&str],
    reset_identity_counter: bool,
) -> Result<(), CanopyError> {
    let backend = db.get_database_backend();
    for table in tables {
        let quoted = if backend == DbBackend::MySql {
            format!("`{table}`")
        } else {
            format!("\"{table}\"")
        };
        db.execute(Statement::from_string(backend, format!("DELETE FROM {quoted}")))
            .await?;
        if reset_identity_counter {
            reset_identity(db, table).await?;
        }
    }
    Ok(())
}

/// Remove all rules, associations, roles, resources, actions and tags.
pub async fn purge<C: ConnectionTrait>(db: &C) -> Result<(), CanopyError> {
    reset_tables(
        db,
        &[
            control::Entity.table_name(),
            tcontrol::Entity.table_name(),
            role_tag::Entity.table_name(),
        ],
        false,
    )
    .await?;
    reset_tables(
        db,
        &[
            role::Entity.table_name(),
            resource::Entity.table_name(),
            action::Entity.table_name(),
            tag::Entity.table_name(),
        ],
        true,
    )
    .await?;
    tracing::warn!("Purged all access-control data");
    Ok(())
}

// Lookups

pub async fn role_by_alias<C: ConnectionTrait>(
    db: &C,
    alias: &str,
) -> Result<Option<role::Model>, CanopyError> {
    let model = role::Entity::find()
        .filter(role::Column::Alias.eq(alias))
        .one(db)
        .await?;
    Ok(model)
}

pub async fn role_id<C: ConnectionTrait>(db: &C, alias: &str) -> Result<i32, CanopyError> {
    role_by_alias(db, alias)
        .await?
        .map(|r| r.id)
        .ok_or_else(|| CanopyError::not_found(EntityKind::Role, alias))
}

pub async fn action_by_alias<C: ConnectionTrait>(
    db: &C,
    alias: &str,
) -> Result<Option<action::Model>, CanopyError> {
    let model = action::Entity::find()
        .filter(action::Column::Alias.eq(alias))
        .one(db)
        .await?;
    Ok(model)
}

pub async fn action_id<C: ConnectionTrait>(db: &C, alias: &str) -> Result<i32, CanopyError> {
    action_by_alias(db, alias)
        .await?
        .map(|a| a.id)
        .ok_or_else(|| CanopyError::not_found(EntityKind::Action, alias))
}

pub async fn resource_id<C: ConnectionTrait>(db: &C, alias: &str) -> Result<i32, CanopyError> {
    let model = resource::Entity::find()
        .filter(resource::Column::Alias.eq(alias))
        .one(db)
        .await?;
    model
        .map(|r| r.id)
        .ok_or_else(|| CanopyError::not_found(EntityKind::Resource, alias))
}

pub async fn tag_by_name<C: ConnectionTrait>(
    db: &C,
    name: &str,
) -> Result<Option<tag::Model>, CanopyError> {
    let model = tag::Entity::find()
        .filter(tag::Column::Name.eq(name))
        .one(db)
        .await?;
    Ok(model)
}

pub async fn tag_id<C: ConnectionTrait>(db: &C, name: &str) -> Result<i32, CanopyError> {
    tag_by_name(db, name)
        .await?
        .map(|t| t.id)
        .ok_or_else(|| CanopyError::not_found(EntityKind::Tag, name))
}

/// Roles whose alias contains `keyword`, ordered by description.
pub async fn roles_search<C: ConnectionTrait>(
    db: &C,
    keyword: &str,
) -> Result<Vec<role::Model>, CanopyError> {
    let roles = role::Entity::find()
        .filter(role::Column::Alias.contains(keyword))
        .order_by_asc(role::Column::Description)
        .all(db)
        .await?;
    Ok(roles)
}

/// Roles matching `aliases`, or every role when `aliases` is empty.
pub async fn roles<C: ConnectionTrait>(
    db: &C,
    aliases: &[String],
) -> Result<Vec<role::Model>, CanopyError> {
    let mut query = role::Entity::find();
    if !aliases.is_empty() {
        query = query.filter(role::Column::Alias.is_in(aliases.iter().cloned()));
    }
    let roles = query
        .order_by_asc(role::Column::Description)
        .all(db)
        .await?;
    Ok(roles)
}

/// Replace a role's description. Works for tree and flat roles alike.
pub async fn edit_role<C: ConnectionTrait>(
    db: &C,
    alias: &str,
    description: &str,
) -> Result<(), CanopyError> {
    let existing = role_by_alias(db, alias)
        .await?
        .ok_or_else(|| CanopyError::not_found(EntityKind::Role, alias))?;

    let mut model: role::ActiveModel = existing.into();
    model.description = Set(Some(description.to_string()));
    model.update(db).await?;
    Ok(())
}

// Actions

/// Create an action. Re-creating an existing alias is a no-op.
pub async fn add_action<C: ConnectionTrait>(
    db: &C,
    alias: &str,
    description: Option<String>,
) -> Result<(), CanopyError> {
    let model = action::ActiveModel {
        alias: Set(alias.to_string()),
        description: Set(description),
        ..Default::default()
    };
    ignore_conflict(model.insert(db).await)
}

pub async fn edit_action<C: ConnectionTrait>(
    db: &C,
    alias: &str,
    description: &str,
) -> Result<(), CanopyError> {
    let existing = action_by_alias(db, alias)
        .await?
        .ok_or_else(|| CanopyError::not_found(EntityKind::Action, alias))?;

    let mut model: action::ActiveModel = existing.into();
    model.description = Set(Some(description.to_string()));
    model.update(db).await?;
    Ok(())
}

pub async fn remove_action<C: ConnectionTrait>(db: &C, alias: &str) -> Result<(), CanopyError> {
    let result = action::Entity::delete_many()
        .filter(action::Column::Alias.eq(alias))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(CanopyError::not_found(EntityKind::Action, alias));
    }
    Ok(())
}

// Tags

/// Create a tag. Re-creating an existing name is a no-op.
pub async fn add_tag<C: ConnectionTrait>(db: &C, name: &str) -> Result<(), CanopyError> {
    let model = tag::ActiveModel {
        name: Set(name.to_string()),
        ..Default::default()
    };
    ignore_conflict(model.insert(db).await)
}

/// Look a tag up, creating it first when missing.
///
/// Checks before inserting so it can run inside a transaction without
/// tripping a unique violation.
pub async fn ensure_tag<C: ConnectionTrait>(db: &C, name: &str) -> Result<i32, CanopyError> {
    if let Some(tag) = tag_by_name(db, name).await? {
        return Ok(tag.id);
    }
    let model = tag::ActiveModel {
        name: Set(name.to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(CanopyError::from_db)?;
    Ok(model.id)
}

pub async fn remove_tag<C: ConnectionTrait>(db: &C, name: &str) -> Result<(), CanopyError> {
    let result = tag::Entity::delete_many()
        .filter(tag::Column::Name.eq(name))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(CanopyError::not_found(EntityKind::Tag, name));
    }
    Ok(())
}

/// What happened to one tag during [`tag_role`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TagOutcome {
    Tagged,
    AlreadyTagged,
    /// The tag does not exist; nothing was attached.
    MissingTag,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagResult {
    pub tag: String,
    #[serde(flatten)]
    pub outcome: TagOutcome,
}

/// Per-tag outcome of a best-effort tagging call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagReport {
    pub role_found: bool,
    pub results: Vec<TagResult>,
}

impl TagReport {
    /// The call as a whole succeeded; individual tags may still have been skipped.
    pub fn succeeded(&self) -> bool {
        self.role_found
    }

    pub fn tagged(&self) -> impl Iterator<Item = &str> {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, TagOutcome::Tagged | TagOutcome::AlreadyTagged))
            .map(|r| r.tag.as_str())
    }
}

/// Attach `tags` to a role, one at a time.
///
/// Missing tags and per-tag failures are recorded and skipped. A missing
/// role yields a report with `role_found == false` rather than an error.
pub async fn tag_role<C: ConnectionTrait>(
    db: &C,
    role_alias: &str,
    tags: &[String],
) -> Result<TagReport, CanopyError> {
    let Some(role) = role_by_alias(db, role_alias).await? else {
        tracing::warn!(role = role_alias, "Tagging skipped, role not found");
        return Ok(TagReport {
            role_found: false,
            results: Vec::new(),
        });
    };

    let mut results = Vec::with_capacity(tags.len());
    for name in tags {
        let outcome = match attach_tag(db, role.id, name).await {
            Ok(outcome) => outcome,
            Err(e) => TagOutcome::Failed {
                reason: e.to_string(),
            },
        };
        if !matches!(outcome, TagOutcome::Tagged | TagOutcome::AlreadyTagged) {
            tracing::warn!(role = role_alias, tag = %name, ?outcome, "Tag not attached");
        }
        results.push(TagResult {
            tag: name.clone(),
            outcome,
        });
    }

    Ok(TagReport {
        role_found: true,
        results,
    })
}

async fn attach_tag<C: ConnectionTrait>(
    db: &C,
    role_id: i32,
    name: &str,
) -> Result<TagOutcome, CanopyError> {
    let Some(tag) = tag_by_name(db, name).await? else {
        return Ok(TagOutcome::MissingTag);
    };

    let link = role_tag::ActiveModel {
        role_id: Set(role_id),
        tag_id: Set(tag.id),
    };
    match role_tag::Entity::insert(link)
        .exec_without_returning(db)
        .await
        .map_err(CanopyError::from_db)
    {
        Ok(_) => Ok(TagOutcome::Tagged),
        Err(e) if e.is_conflict() => Ok(TagOutcome::AlreadyTagged),
        Err(e) => Err(e),
    }
}

/// Detach `tags` from a role. Unknown roles or tags simply remove nothing.
pub async fn untag_role<C: ConnectionTrait>(
    db: &C,
    role_alias: &str,
    tags: &[String],
) -> Result<u64, CanopyError> {
    let Some(role) = role_by_alias(db, role_alias).await? else {
        return Ok(0);
    };
    if tags.is_empty() {
        return Ok(0);
    }

    let tag_ids: Vec<i32> = tag::Entity::find()
        .select_only()
        .column(tag::Column::Id)
        .filter(tag::Column::Name.is_in(tags.iter().cloned()))
        .into_tuple()
        .all(db)
        .await?;
    if tag_ids.is_empty() {
        return Ok(0);
    }

    let result = role_tag::Entity::delete_many()
        .filter(role_tag::Column::RoleId.eq(role.id))
        .filter(role_tag::Column::TagId.is_in(tag_ids))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// Ids of every tag attached to any of `role_ids`.
pub async fn tag_ids_for_roles<C: ConnectionTrait>(
    db: &C,
    role_ids: &[i32],
) -> Result<Vec<i32>, CanopyError> {
    if role_ids.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i32> = role_tag::Entity::find()
        .select_only()
        .column(role_tag::Column::TagId)
        .distinct()
        .filter(role_tag::Column::RoleId.is_in(role_ids.iter().copied()))
        .into_tuple()
        .all(db)
        .await?;
    Ok(ids)
}

// Rules

/// Record an allow/deny rule for a role.
///
/// If a rule for the same (role, action, resource) already exists it is kept
/// as is; the first recorded outcome wins.
pub async fn enforce<C: ConnectionTrait>(
    db: &C,
    allowed: bool,
    action: &str,
    role: &str,
    resource: &str,
) -> Result<(), CanopyError> {
    let action_id = action_id(db, action).await?;
    let role_id = role_id(db, role).await?;
    let resource_id = resource_id(db, resource).await?;

    let rule = control::ActiveModel {
        role_id: Set(role_id),
        action_id: Set(action_id),
        resource_id: Set(resource_id),
        allowed: Set(allowed),
    };
    ignore_conflict(control::Entity::insert(rule).exec_without_returning(db).await)?;
    tracing::info!(role, action, resource, allowed, "Enforced role rule");
    Ok(())
}

/// Delete a role rule. Lifting a rule that does not exist is not an error.
pub async fn lift<C: ConnectionTrait>(
    db: &C,
    action: &str,
    role: &str,
    resource: &str,
) -> Result<u64, CanopyError> {
    let action_id = action_id(db, action).await?;
    let role_id = role_id(db, role).await?;
    let resource_id = resource_id(db, resource).await?;

    let result = control::Entity::delete_many()
        .filter(control::Column::RoleId.eq(role_id))
        .filter(control::Column::ActionId.eq(action_id))
        .filter(control::Column::ResourceId.eq(resource_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// Record an allow/deny rule for a tag. First recorded outcome wins.
pub async fn enforce_tag<C: ConnectionTrait>(
    db: &C,
    allowed: bool,
    action: &str,
    tag: &str,
    resource: &str,
) -> Result<(), CanopyError> {
    let action_id = action_id(db, action).await?;
    let tag_id = tag_id(db, tag).await?;
    let resource_id = resource_id(db, resource).await?;

    let rule = tcontrol::ActiveModel {
        tag_id: Set(tag_id),
        action_id: Set(action_id),
        resource_id: Set(resource_id),
        allowed: Set(allowed),
    };
    ignore_conflict(tcontrol::Entity::insert(rule).exec_without_returning(db).await)?;
    tracing::info!(tag, action, resource, allowed, "Enforced tag rule");
    Ok(())
}

pub async fn lift_tag<C: ConnectionTrait>(
    db: &C,
    action: &str,
    tag: &str,
    resource: &str,
) -> Result<u64, CanopyError> {
    let action_id = action_id(db, action).await?;
    let tag_id = tag_id(db, tag).await?;
    let resource_id = resource_id(db, resource).await?;

    let result = tcontrol::Entity::delete_many()
        .filter(tcontrol::Column::TagId.eq(tag_id))
        .filter(tcontrol::Column::ActionId.eq(action_id))
        .filter(tcontrol::Column::ResourceId.eq(resource_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree;
    use sea_orm::{Database, DatabaseConnection};
    use sea_orm_migration::MigratorTrait;
    use tempfile::NamedTempFile;

    /// Test database helper that keeps temp file alive
    struct TestDb {
        connection: DatabaseConnection,
        _temp_file: NamedTempFile,
    }

    impl TestDb {
        async fn new() -> Self {
            let temp_file = NamedTempFile::new().expect("Failed to create temp file");
            let db_path = temp_file.path().to_str().expect("Invalid temp file path");
            let db_url = format!("sqlite://{}?mode=rwc", db_path);

            let connection = Database::connect(&db_url)
                .await
                .expect("Failed to connect to test database");

            migration::Migrator::up(&connection, None)
                .await
                .expect("Failed to run migrations");

            Self {
                connection,
                _temp_file: temp_file,
            }
        }

        fn connection(&self) -> &DatabaseConnection {
            &self.connection
        }
    }

    async fn add_flat_role(db: &DatabaseConnection, alias: &str) {
        role::ActiveModel {
            alias: Set(alias.to_string()),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("Failed to create role");
    }

    // ============================================================================
    // Action Tests
    // ============================================================================

    #[tokio::test]
    async fn test_add_action_is_idempotent() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        add_action(db, "view", Some("View".into())).await.unwrap();
        add_action(db, "view", Some("Other".into())).await.unwrap();

        let all = action::Entity::find().all(db).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].description.as_deref(), Some("View"));
    }

    #[tokio::test]
    async fn test_edit_and_remove_action() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        add_action(db, "edit", None).await.unwrap();
        edit_action(db, "edit", "Edit things").await.unwrap();
        let model = action_by_alias(db, "edit").await.unwrap().unwrap();
        assert_eq!(model.description.as_deref(), Some("Edit things"));

        remove_action(db, "edit").await.unwrap();
        let again = remove_action(db, "edit").await;
        assert!(matches!(
            again,
            Err(CanopyError::NotFound {
                kind: EntityKind::Action,
                ..
            })
        ));
        assert!(matches!(
            edit_action(db, "edit", "x").await,
            Err(CanopyError::NotFound { .. })
        ));
    }

    // ============================================================================
    // Tag Tests
    // ============================================================================

    #[tokio::test]
    async fn test_tag_create_and_delete() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        add_tag(db, "staff").await.unwrap();
        add_tag(db, "staff").await.unwrap();
        assert_eq!(tag::Entity::find().all(db).await.unwrap().len(), 1);

        remove_tag(db, "staff").await.unwrap();
        assert!(matches!(
            remove_tag(db, "staff").await,
            Err(CanopyError::NotFound {
                kind: EntityKind::Tag,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_ensure_tag_reuses_existing() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        let first = ensure_tag(db, "staff").await.unwrap();
        let second = ensure_tag(db, "staff").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(tag_id(db, "staff").await.unwrap(), first);
    }

    #[tokio::test]
    async fn test_edit_role_description() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        add_flat_role(db, "carol").await;
        edit_role(db, "carol", "Carol").await.unwrap();
        let role = role_by_alias(db, "carol").await.unwrap().unwrap();
        assert_eq!(role.description.as_deref(), Some("Carol"));

        assert!(matches!(
            edit_role(db, "nobody", "x").await,
            Err(CanopyError::NotFound {
                kind: EntityKind::Role,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_tag_role_reports_each_tag() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        add_flat_role(db, "alice").await;
        add_tag(db, "staff").await.unwrap();
        add_tag(db, "ops").await.unwrap();
        tag_role(db, "alice", &["ops".to_string()]).await.unwrap();

        let report = tag_role(
            db,
            "alice",
            &["staff".to_string(), "ghost".to_string(), "ops".to_string()],
        )
        .await
        .unwrap();

        assert!(report.succeeded());
        let outcomes: Vec<_> = report.results.iter().map(|r| r.outcome.clone()).collect();
        assert_eq!(
            outcomes,
            vec![
                TagOutcome::Tagged,
                TagOutcome::MissingTag,
                TagOutcome::AlreadyTagged
            ]
        );
        assert_eq!(report.tagged().collect::<Vec<_>>(), vec!["staff", "ops"]);

        let role = role_by_alias(db, "alice").await.unwrap().unwrap();
        let mut ids = tag_ids_for_roles(db, &[role.id]).await.unwrap();
        ids.sort();
        assert_eq!(ids.len(), 2);
    }

    #[tokio::test]
    async fn test_tag_role_missing_role_fails_softly() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();
        add_tag(db, "staff").await.unwrap();

        let report = tag_role(db, "nobody", &["staff".to_string()]).await.unwrap();
        assert!(!report.succeeded());
        assert!(report.results.is_empty());
    }

    #[tokio::test]
    async fn test_untag_role_never_fails() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        add_flat_role(db, "bob").await;
        add_tag(db, "staff").await.unwrap();
        tag_role(db, "bob", &["staff".to_string()]).await.unwrap();

        assert_eq!(untag_role(db, "ghost", &["staff".to_string()]).await.unwrap(), 0);
        assert_eq!(untag_role(db, "bob", &["nope".to_string()]).await.unwrap(), 0);
        assert_eq!(untag_role(db, "bob", &["staff".to_string()]).await.unwrap(), 1);
        assert_eq!(untag_role(db, "bob", &["staff".to_string()]).await.unwrap(), 0);
    }

    // ============================================================================
    // Rule Tests
    // ============================================================================

    #[tokio::test]
    async fn test_enforce_first_write_wins() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();
        tree::ensure_root::<resource::Entity, _>(db).await.unwrap();
        add_flat_role(db, "alice").await;
        add_action(db, "view", None).await.unwrap();

        enforce(db, true, "view", "alice", "root").await.unwrap();
        enforce(db, false, "view", "alice", "root").await.unwrap();

        let rules = control::Entity::find().all(db).await.unwrap();
        assert_eq!(rules.len(), 1);
        assert!(rules[0].allowed);

        assert_eq!(lift(db, "view", "alice", "root").await.unwrap(), 1);
        assert_eq!(lift(db, "view", "alice", "root").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_enforce_names_the_missing_entity() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();
        tree::ensure_root::<resource::Entity, _>(db).await.unwrap();
        add_flat_role(db, "alice").await;

        let err = enforce(db, true, "view", "alice", "root").await.unwrap_err();
        assert!(matches!(
            err,
            CanopyError::NotFound {
                kind: EntityKind::Action,
                ..
            }
        ));

        add_action(db, "view", None).await.unwrap();
        let err = enforce_tag(db, true, "view", "staff", "root")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CanopyError::NotFound {
                kind: EntityKind::Tag,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_purge_resets_identities() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();
        tree::ensure_root::<resource::Entity, _>(db).await.unwrap();
        tree::insert::<resource::Entity, _>(db, "a", "root", None)
            .await
            .unwrap();
        add_action(db, "view", None).await.unwrap();
        add_flat_role(db, "alice").await;
        enforce(db, true, "view", "alice", "a").await.unwrap();

        purge(db).await.unwrap();

        assert!(control::Entity::find().all(db).await.unwrap().is_empty());
        assert!(resource::Entity::find().all(db).await.unwrap().is_empty());
        assert!(role::Entity::find().all(db).await.unwrap().is_empty());

        tree::ensure_root::<resource::Entity, _>(db).await.unwrap();
        let root = tree::node::<resource::Entity, _>(db, tree::ROOT_ALIAS)
            .await
            .unwrap();
        assert_eq!(root.id, 1);
    }
}
