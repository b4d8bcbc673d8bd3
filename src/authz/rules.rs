//! Rule lookups shared by the role strategies.

use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use std::collections::HashMap;

use crate::authz::topology::{Candidate, ControlEntry, Subject};
use crate::entities::{action, control, role, tag, tcontrol};
use crate::errors::CanopyError;
use crate::tree::TreeNode;

/// A rule row reduced to what resolution needs.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RuleRow {
    pub subject_id: i32,
    pub action_id: i32,
    pub resource_id: i32,
    pub allowed: bool,
}

impl From<control::Model> for RuleRow {
    fn from(m: control::Model) -> Self {
        Self {
            subject_id: m.role_id,
            action_id: m.action_id,
            resource_id: m.resource_id,
            allowed: m.allowed,
        }
    }
}

impl From<tcontrol::Model> for RuleRow {
    fn from(m: tcontrol::Model) -> Self {
        Self {
            subject_id: m.tag_id,
            action_id: m.action_id,
            resource_id: m.resource_id,
            allowed: m.allowed,
        }
    }
}

fn resource_ids(path: &[TreeNode]) -> Vec<i32> {
    path.iter().map(|n| n.id).collect()
}

/// Role-keyed rules on `path`, optionally narrowed to one action and some roles.
pub(crate) async fn role_rules<C: ConnectionTrait>(
    db: &C,
    path: &[TreeNode],
    action_id: Option<i32>,
    role_ids: Option<&[i32]>,
) -> Result<Vec<RuleRow>, CanopyError> {
    let mut query =
        control::Entity::find().filter(control::Column::ResourceId.is_in(resource_ids(path)));
    if let Some(id) = action_id {
        query = query.filter(control::Column::ActionId.eq(id));
    }
    if let Some(ids) = role_ids {
        query = query.filter(control::Column::RoleId.is_in(ids.iter().copied()));
    }
    let rows = query.all(db).await?;
    Ok(rows.into_iter().map(RuleRow::from).collect())
}

/// Tag-keyed rules on `path`, optionally narrowed to one action and some tags.
pub(crate) async fn tag_rules<C: ConnectionTrait>(
    db: &C,
    path: &[TreeNode],
    action_id: Option<i32>,
    tag_ids: Option<&[i32]>,
) -> Result<Vec<RuleRow>, CanopyError> {
    let mut query =
        tcontrol::Entity::find().filter(tcontrol::Column::ResourceId.is_in(resource_ids(path)));
    if let Some(id) = action_id {
        query = query.filter(tcontrol::Column::ActionId.eq(id));
    }
    if let Some(ids) = tag_ids {
        query = query.filter(tcontrol::Column::TagId.is_in(ids.iter().copied()));
    }
    let rows = query.all(db).await?;
    Ok(rows.into_iter().map(RuleRow::from).collect())
}

/// Turn rule rows into candidates ordered from the most general resource to
/// the most specific. Rows on the same resource keep their fetched order.
pub(crate) fn candidates(
    rows: &[RuleRow],
    path: &[TreeNode],
    subject: impl Fn(i32) -> Option<Subject>,
) -> Vec<Candidate> {
    let by_id: HashMap<i32, &TreeNode> = path.iter().map(|n| (n.id, n)).collect();

    let mut out: Vec<Candidate> = rows
        .iter()
        .filter_map(|row| {
            let resource = by_id.get(&row.resource_id)?;
            Some(Candidate {
                specificity: resource.right,
                resource: resource.alias.clone(),
                subject: subject(row.subject_id)?,
                allowed: row.allowed,
            })
        })
        .collect();
    // At equal specificity a deny goes last so it overrides
    out.sort_by(|a, b| {
        b.specificity
            .cmp(&a.specificity)
            .then_with(|| b.allowed.cmp(&a.allowed))
    });
    out
}

async fn action_labels<C: ConnectionTrait>(
    db: &C,
    rows: &[RuleRow],
) -> Result<HashMap<i32, action::Model>, CanopyError> {
    let ids: Vec<i32> = rows.iter().map(|r| r.action_id).collect();
    let actions = action::Entity::find()
        .filter(action::Column::Id.is_in(ids))
        .all(db)
        .await?;
    Ok(actions.into_iter().map(|a| (a.id, a)).collect())
}

fn entries(
    rows: &[RuleRow],
    path: &[TreeNode],
    actions: &HashMap<i32, action::Model>,
    subject: impl Fn(i32) -> Option<(Subject, Option<String>)>,
) -> Vec<ControlEntry> {
    let resources: HashMap<i32, &TreeNode> = path.iter().map(|n| (n.id, n)).collect();

    rows.iter()
        .filter_map(|row| {
            let resource = resources.get(&row.resource_id)?;
            let action = actions.get(&row.action_id)?;
            let (subject, subject_description) = subject(row.subject_id)?;
            Some(ControlEntry {
                specificity: resource.right,
                resource: resource.alias.clone(),
                resource_description: resource.description.clone(),
                action: action.alias.clone(),
                action_description: action.description.clone(),
                subject,
                subject_description,
                allowed: row.allowed,
            })
        })
        .collect()
}

/// Every role-keyed rule on `path`, labelled.
pub(crate) async fn role_entries<C: ConnectionTrait>(
    db: &C,
    path: &[TreeNode],
) -> Result<Vec<ControlEntry>, CanopyError> {
    let rows = role_rules(db, path, None, None).await?;
    let actions = action_labels(db, &rows).await?;
    let ids: Vec<i32> = rows.iter().map(|r| r.subject_id).collect();
    let roles: HashMap<i32, role::Model> = role::Entity::find()
        .filter(role::Column::Id.is_in(ids))
        .all(db)
        .await?
        .into_iter()
        .map(|r| (r.id, r))
        .collect();

    Ok(entries(&rows, path, &actions, |id| {
        roles
            .get(&id)
            .map(|r| (Subject::Role(r.alias.clone()), r.description.clone()))
    }))
}

/// Every tag-keyed rule on `path`, labelled.
pub(crate) async fn tag_entries<C: ConnectionTrait>(
    db: &C,
    path: &[TreeNode],
) -> Result<Vec<ControlEntry>, CanopyError> {
    let rows = tag_rules(db, path, None, None).await?;
    let actions = action_labels(db, &rows).await?;
    let ids: Vec<i32> = rows.iter().map(|r| r.subject_id).collect();
    let tags: HashMap<i32, String> = tag::Entity::find()
        .filter(tag::Column::Id.is_in(ids))
        .all(db)
        .await?
        .into_iter()
        .map(|t| (t.id, t.name))
        .collect();

    Ok(entries(&rows, path, &actions, |id| {
        tags.get(&id).map(|name| (Subject::Tag(name.clone()), None))
    }))
}
