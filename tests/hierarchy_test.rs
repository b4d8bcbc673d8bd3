mod helpers;

use canopy::authz::HandlerError;
use canopy::entities::{control, role};
use canopy::{Canopy, CanopyError, EntityKind, RoleTopology};
use helpers::{seed_resources, TestDb};
use sea_orm::EntityTrait;
use std::sync::{Arc, Mutex};

fn parent(alias: &str) -> Vec<String> {
    vec![alias.to_string()]
}

/// Resources: root -> docs -> page, root -> media
/// Roles:     root -> staff -> editor -> intern
async fn fixture(test_db: &TestDb) -> Canopy {
    let canopy = test_db.canopy(RoleTopology::Hierarchical).await;
    seed_resources(&canopy, &[("docs", "root"), ("page", "docs"), ("media", "root")]).await;
    canopy.add_action("view", None).await.unwrap();
    canopy.add_action("edit", None).await.unwrap();

    assert!(canopy
        .add_role("staff", &[], Some("Staff".into()))
        .await
        .unwrap());
    assert!(canopy.add_role("editor", &parent("staff"), None).await.unwrap());
    assert!(canopy.add_role("intern", &parent("editor"), None).await.unwrap());
    canopy
}

#[tokio::test]
async fn test_roles_inherit_ancestor_rules() {
    let test_db = TestDb::new().await;
    let canopy = fixture(&test_db).await;

    canopy.enforce(true, "edit", "staff", "docs").await.unwrap();

    assert!(canopy.allowed(&["intern"], "edit", "page").await.unwrap());
    assert!(canopy.allowed(&["staff"], "edit", "docs").await.unwrap());
    assert!(!canopy.allowed(&["staff"], "edit", "media").await.unwrap());
}

#[tokio::test]
async fn test_rules_do_not_flow_up_the_role_tree() {
    let test_db = TestDb::new().await;
    let canopy = fixture(&test_db).await;

    canopy.enforce(true, "view", "intern", "root").await.unwrap();

    assert!(canopy.allowed(&["intern"], "view", "page").await.unwrap());
    assert!(!canopy.allowed(&["editor"], "view", "page").await.unwrap());
}

#[tokio::test]
async fn test_descendant_role_overrides_on_more_specific_resource() {
    let test_db = TestDb::new().await;
    let canopy = fixture(&test_db).await;

    canopy.enforce(true, "edit", "staff", "docs").await.unwrap();
    canopy.enforce(false, "edit", "intern", "page").await.unwrap();

    assert!(!canopy.allowed(&["intern"], "edit", "page").await.unwrap());
    assert!(canopy.allowed(&["editor"], "edit", "page").await.unwrap());
}

#[tokio::test]
async fn test_resource_specificity_beats_role_distance() {
    let test_db = TestDb::new().await;
    let canopy = fixture(&test_db).await;

    // The closer role speaks about a general resource, the distant one about
    // the target itself. Only resource specificity is weighed.
    canopy.enforce(true, "view", "editor", "root").await.unwrap();
    canopy.enforce(false, "view", "staff", "page").await.unwrap();

    let decision = canopy.explain(&["editor"], "view", "page").await.unwrap();
    assert!(!decision.allowed);
    assert_eq!(decision.considered.len(), 2);
    assert_eq!(decision.deciding.unwrap().resource, "page");
}

#[tokio::test]
async fn test_deny_wins_between_ancestor_roles_at_same_resource() {
    let test_db = TestDb::new().await;
    let canopy = fixture(&test_db).await;

    canopy.enforce(true, "edit", "staff", "docs").await.unwrap();
    canopy.enforce(false, "edit", "editor", "docs").await.unwrap();
    canopy.enforce(false, "view", "staff", "docs").await.unwrap();
    canopy.enforce(true, "view", "editor", "docs").await.unwrap();

    for action in ["edit", "view"] {
        let decision = canopy.explain(&["intern"], action, "docs").await.unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.considered.len(), 2);
        assert!(!canopy.allowed(&["intern"], action, "page").await.unwrap());
    }
}

#[tokio::test]
async fn test_add_role_under_missing_parent() {
    let test_db = TestDb::new().await;
    let canopy = fixture(&test_db).await;

    let added = canopy
        .add_role("ghost-child", &parent("ghost"), None)
        .await
        .unwrap();
    assert!(!added);
    assert!(canopy
        .roles(&["ghost-child".to_string()])
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_role_tree_intervals() {
    let test_db = TestDb::new().await;
    let _canopy = fixture(&test_db).await;

    let roles = role::Entity::find().all(test_db.connection()).await.unwrap();
    let interval = |alias: &str| {
        let r = roles.iter().find(|r| r.alias == alias).unwrap();
        (r.lt.unwrap(), r.rt.unwrap())
    };
    assert_eq!(interval("root"), (1, 8));
    assert_eq!(interval("staff"), (2, 7));
    assert_eq!(interval("editor"), (3, 6));
    assert_eq!(interval("intern"), (4, 5));
}

#[tokio::test]
async fn test_remove_role_takes_subtree_and_notifies_once() {
    let test_db = TestDb::new().await;
    let mut canopy = fixture(&test_db).await;
    let log = Arc::new(Mutex::new(Vec::<String>::new()));
    let sink = Arc::clone(&log);
    canopy.on_role_deleted(Box::new(move |alias: &str| -> Result<(), HandlerError> {
        sink.lock().unwrap().push(alias.to_string());
        Ok(())
    }));

    canopy.enforce(true, "view", "intern", "docs").await.unwrap();
    canopy.remove_role("editor").await.unwrap();

    let remaining: Vec<_> = canopy
        .roles(&[])
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.alias)
        .collect();
    assert_eq!(remaining.len(), 2);
    assert!(remaining.contains(&"root".to_string()));
    assert!(remaining.contains(&"staff".to_string()));
    assert_eq!(*log.lock().unwrap(), vec!["editor"]);

    let rules = control::Entity::find()
        .all(test_db.connection())
        .await
        .unwrap();
    assert!(rules.is_empty());
}

#[tokio::test]
async fn test_root_role_is_protected() {
    let test_db = TestDb::new().await;
    let canopy = fixture(&test_db).await;

    let err = canopy.remove_role("root").await.unwrap_err();
    assert!(matches!(
        err,
        CanopyError::ProtectedNode {
            kind: EntityKind::Role
        }
    ));
}

#[tokio::test]
async fn test_several_roles_merge_their_lineages() {
    let test_db = TestDb::new().await;
    let canopy = fixture(&test_db).await;
    canopy.add_role("auditor", &[], None).await.unwrap();

    canopy.enforce(true, "view", "auditor", "media").await.unwrap();

    assert!(!canopy.allowed(&["intern"], "view", "media").await.unwrap());
    assert!(canopy
        .allowed(&["intern", "auditor"], "view", "media")
        .await
        .unwrap());
}

#[tokio::test]
async fn test_switching_topology_reshapes_roles() {
    let test_db = TestDb::new().await;

    let flat = test_db.canopy(RoleTopology::FlatWithTags).await;
    flat.add_role("plain", &[], None).await.unwrap();

    // A flat role table has no root, so the role tree starts over
    let tree = test_db.canopy(RoleTopology::Hierarchical).await;
    let roles: Vec<_> = tree
        .roles(&[])
        .await
        .unwrap()
        .into_iter()
        .map(|r| (r.alias, r.lt, r.rt))
        .collect();
    assert_eq!(roles, vec![("root".to_string(), Some(1), Some(2))]);
    tree.add_role("branch", &[], None).await.unwrap();

    // And back: tree-shaped rows are dropped
    let flat = test_db.canopy(RoleTopology::FlatWithTags).await;
    assert!(flat.roles(&[]).await.unwrap().is_empty());
    assert_eq!(flat.topology(), RoleTopology::FlatWithTags);
}

#[tokio::test]
async fn test_controls_list_role_rules_only() {
    let test_db = TestDb::new().await;
    let canopy = fixture(&test_db).await;
    canopy.enforce(true, "edit", "staff", "docs").await.unwrap();
    canopy.enforce(false, "edit", "intern", "page").await.unwrap();

    let entries = canopy.controls("page").await.unwrap();
    let listed: Vec<_> = entries
        .iter()
        .map(|e| (e.resource.as_str(), e.subject_label(), e.allowed))
        .collect();
    assert_eq!(listed, vec![("docs", "Staff", true), ("page", "intern", false)]);
}
