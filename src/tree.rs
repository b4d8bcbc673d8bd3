//! Nested-set hierarchy engine.
//!
//! Every tree row carries an `(lt, rt)` interval. A node's interval encloses
//! the intervals of all its descendants, so ancestor and descendant lookups
//! are single range comparisons. Structural mutations shift the intervals
//! to the right of the edit point with bulk updates inside one transaction.

use crate::errors::{CanopyError, EntityKind};
use crate::storage;
use sea_orm::sea_query::{Alias, Expr, Func, SimpleExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseTransaction, EntityTrait,
    FromQueryResult, IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select,
    TransactionTrait, Value,
};
use serde::{Deserialize, Serialize};

/// Alias reserved for the root node of every tree.
pub const ROOT_ALIAS: &str = "root";

/// A table laid out as a nested set.
///
/// Implemented by the resource entity and by the role entity (the latter is
/// only used as a tree under the hierarchical topology).
pub trait TreeTable: EntityTrait {
    /// Insertable row type for this table.
    type Node: ActiveModelTrait<Entity = Self> + Send;

    /// Used when reporting missing or protected nodes.
    const KIND: EntityKind;

    fn id_column() -> Self::Column;
    fn left_column() -> Self::Column;
    fn right_column() -> Self::Column;
    fn alias_column() -> Self::Column;
    fn description_column() -> Self::Column;

    fn new_node(left: i32, right: i32, alias: &str, description: Option<String>) -> Self::Node;
}

/// One row of a tree, independent of which table it came from.
#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult, Serialize, Deserialize)]
pub struct TreeNode {
    pub id: i32,
    pub left: i32,
    pub right: i32,
    pub alias: String,
    pub description: Option<String>,
}

impl TreeNode {
    /// True when `other` lies strictly inside this node's interval.
    pub fn encloses(&self, other: &TreeNode) -> bool {
        self.left < other.left && other.right < self.right
    }
}

/// A node together with its children, in left-to-right order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeBranch {
    #[serde(flatten)]
    pub node: TreeNode,
    pub children: Vec<TreeBranch>,
}

impl TreeBranch {
    fn leaf(node: TreeNode) -> Self {
        Self {
            node,
            children: Vec::new(),
        }
    }

    /// Depth-first, left-to-right walk over this branch.
    pub fn flatten(&self) -> Vec<&TreeNode> {
        let mut out = vec![&self.node];
        for child in &self.children {
            out.extend(child.flatten());
        }
        out
    }
}

/// Column a descendant filter applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeColumn {
    Id,
    Left,
    Right,
    Alias,
    Description,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Int(i64),
    Text(String),
}

impl From<FilterValue> for Value {
    fn from(value: FilterValue) -> Self {
        match value {
            FilterValue::Int(i) => Value::from(i),
            FilterValue::Text(s) => Value::from(s),
        }
    }
}

/// Extra comparison applied by [`paged_descendants`]. Filters are OR'd together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeFilter {
    pub column: NodeColumn,
    pub op: FilterOp,
    pub value: FilterValue,
}

impl NodeFilter {
    pub fn new(column: NodeColumn, op: FilterOp, value: FilterValue) -> Self {
        Self { column, op, value }
    }

    fn to_expr<T: TreeTable>(&self) -> SimpleExpr {
        let col = match self.column {
            NodeColumn::Id => T::id_column(),
            NodeColumn::Left => T::left_column(),
            NodeColumn::Right => T::right_column(),
            NodeColumn::Alias => T::alias_column(),
            NodeColumn::Description => T::description_column(),
        };
        let value = Value::from(self.value.clone());
        match self.op {
            FilterOp::Eq => col.eq(value),
            FilterOp::Ne => col.ne(value),
            FilterOp::Lt => col.lt(value),
            FilterOp::Lte => col.lte(value),
            FilterOp::Gt => col.gt(value),
            FilterOp::Gte => col.gte(value),
            FilterOp::Like => match &self.value {
                FilterValue::Text(pattern) => col.like(pattern.as_str()),
                FilterValue::Int(i) => col.like(i.to_string()),
            },
        }
    }
}

fn select_nodes<T: TreeTable>() -> Select<T> {
    T::find()
        .select_only()
        .column_as(T::id_column(), "id")
        .column_as(T::left_column(), "left")
        .column_as(T::right_column(), "right")
        .column_as(T::alias_column(), "alias")
        .column_as(T::description_column(), "description")
}

/// Look up a node by alias.
pub async fn find_node<T, C>(db: &C, alias: &str) -> Result<Option<TreeNode>, CanopyError>
where
    T: TreeTable,
    C: ConnectionTrait,
{
    let node = select_nodes::<T>()
        .filter(T::alias_column().eq(alias))
        .into_model::<TreeNode>()
        .one(db)
        .await?;
    Ok(node)
}

/// Look up a node by alias, failing with `NotFound` when it is absent.
pub async fn node<T, C>(db: &C, alias: &str) -> Result<TreeNode, CanopyError>
where
    T: TreeTable,
    C: ConnectionTrait,
{
    find_node::<T, C>(db, alias)
        .await?
        .ok_or_else(|| CanopyError::not_found(T::KIND, alias))
}

/// Make sure the root node exists. A table without a root is wiped, its
/// identity counter reset, and a fresh `(1, 2)` root inserted.
pub async fn ensure_root<T, C>(db: &C) -> Result<(), CanopyError>
where
    T: TreeTable,
    T::Model: IntoActiveModel<T::Node>,
    C: ConnectionTrait,
{
    if find_node::<T, C>(db, ROOT_ALIAS).await?.is_some() {
        return Ok(());
    }

    let table = T::default().table_name().to_string();
    tracing::info!(table = %table, "Root node missing, resetting tree");

    T::delete_many().exec(db).await?;
    storage::reset_identity(db, &table).await?;
    T::insert(T::new_node(1, 2, ROOT_ALIAS, Some(ROOT_ALIAS.to_string())))
        .exec_without_returning(db)
        .await?;

    Ok(())
}

/// Insert `alias` as the last child of `parent_alias`.
///
/// Returns `Ok(false)` when the parent does not exist. A duplicate alias
/// fails with a storage error and leaves the tree untouched.
pub async fn insert<T, C>(
    db: &C,
    alias: &str,
    parent_alias: &str,
    description: Option<String>,
) -> Result<bool, CanopyError>
where
    T: TreeTable,
    T::Model: IntoActiveModel<T::Node>,
    C: ConnectionTrait + TransactionTrait,
{
    let alias = alias.to_string();
    let parent_alias = parent_alias.to_string();
    db.transaction::<_, bool, CanopyError>(move |txn| {
        Box::pin(async move { insert_in::<T>(txn, &alias, &parent_alias, description).await })
    })
    .await
    .map_err(CanopyError::from)
}

async fn insert_in<T>(
    txn: &DatabaseTransaction,
    alias: &str,
    parent_alias: &str,
    description: Option<String>,
) -> Result<bool, CanopyError>
where
    T: TreeTable,
    T::Model: IntoActiveModel<T::Node>,
{
    let Some(parent) = find_node::<T, _>(txn, parent_alias).await? else {
        return Ok(false);
    };

    let new_left = parent.right;
    let new_right = new_left + 1;

    // Widen the parent, its ancestors, and everything to the right
    T::update_many()
        .col_expr(T::right_column(), Expr::col(T::right_column()).add(2))
        .filter(T::right_column().gte(parent.right))
        .exec(txn)
        .await?;
    T::update_many()
        .col_expr(T::left_column(), Expr::col(T::left_column()).add(2))
        .filter(T::left_column().gte(parent.right))
        .exec(txn)
        .await?;

    T::insert(T::new_node(new_left, new_right, alias, description))
        .exec_without_returning(txn)
        .await?;

    tracing::info!(
        table = T::default().table_name(),
        alias,
        parent = parent_alias,
        left = new_left,
        right = new_right,
        "Inserted tree node"
    );
    Ok(true)
}

/// Remove a node and its whole subtree, returning how many rows were deleted.
pub async fn remove<T, C>(db: &C, alias: &str) -> Result<u64, CanopyError>
where
    T: TreeTable,
    C: ConnectionTrait + TransactionTrait,
{
    if alias == ROOT_ALIAS {
        return Err(CanopyError::ProtectedNode { kind: T::KIND });
    }

    let alias = alias.to_string();
    db.transaction::<_, u64, CanopyError>(move |txn| {
        Box::pin(async move { remove_in::<T>(txn, &alias).await })
    })
    .await
    .map_err(CanopyError::from)
}

async fn remove_in<T: TreeTable>(txn: &DatabaseTransaction, alias: &str) -> Result<u64, CanopyError> {
    let node = node::<T, _>(txn, alias).await?;

    let deleted = T::delete_many()
        .filter(T::left_column().gte(node.left))
        .filter(T::right_column().lte(node.right))
        .exec(txn)
        .await?
        .rows_affected;

    let span = node.right - node.left + 1;
    T::update_many()
        .col_expr(T::left_column(), Expr::col(T::left_column()).sub(span))
        .filter(T::left_column().gt(node.right))
        .exec(txn)
        .await?;
    T::update_many()
        .col_expr(T::right_column(), Expr::col(T::right_column()).sub(span))
        .filter(T::right_column().gt(node.right))
        .exec(txn)
        .await?;

    tracing::info!(
        table = T::default().table_name(),
        alias,
        deleted,
        "Removed tree node"
    );
    Ok(deleted)
}

/// Replace a node's description.
pub async fn edit<T, C>(db: &C, alias: &str, description: &str) -> Result<(), CanopyError>
where
    T: TreeTable,
    C: ConnectionTrait,
{
    node::<T, C>(db, alias).await?;

    T::update_many()
        .col_expr(T::description_column(), Expr::value(description))
        .filter(T::alias_column().eq(alias))
        .exec(db)
        .await?;
    Ok(())
}

/// Nodes whose interval contains the target's, root first.
///
/// With `inclusive` the target itself closes the list.
pub async fn ancestor_path<T, C>(
    db: &C,
    alias: &str,
    inclusive: bool,
) -> Result<Vec<TreeNode>, CanopyError>
where
    T: TreeTable,
    C: ConnectionTrait,
{
    let target = node::<T, C>(db, alias).await?;

    let (left_cond, right_cond) = if inclusive {
        (
            T::left_column().lte(target.left),
            T::right_column().gte(target.right),
        )
    } else {
        (
            T::left_column().lt(target.left),
            T::right_column().gt(target.right),
        )
    };

    let path = select_nodes::<T>()
        .filter(left_cond)
        .filter(right_cond)
        .order_by_asc(T::left_column())
        .into_model::<TreeNode>()
        .all(db)
        .await?;
    Ok(path)
}

/// The subtree rooted at `alias` as nested branches.
///
/// A node whose alias starts with one of `exclude_prefixes` is dropped along
/// with everything beneath it. If the target itself is excluded the result
/// is empty.
pub async fn descendants<T, C>(
    db: &C,
    alias: &str,
    exclude_prefixes: &[String],
) -> Result<Vec<TreeBranch>, CanopyError>
where
    T: TreeTable,
    C: ConnectionTrait,
{
    let target = node::<T, C>(db, alias).await?;

    let rows = select_nodes::<T>()
        .filter(T::left_column().between(target.left, target.right))
        .order_by_asc(T::left_column())
        .into_model::<TreeNode>()
        .all(db)
        .await?;

    Ok(assemble(rows, exclude_prefixes))
}

/// Build nested branches from rows sorted by `left`, keeping a stack of
/// ancestors that are still open.
fn assemble(rows: Vec<TreeNode>, exclude_prefixes: &[String]) -> Vec<TreeBranch> {
    let mut roots = Vec::new();
    let mut open: Vec<TreeBranch> = Vec::new();
    let mut skip_until: Option<i32> = None;

    for row in rows {
        if let Some(limit) = skip_until {
            if row.left < limit {
                continue;
            }
            skip_until = None;
        }
        if exclude_prefixes
            .iter()
            .any(|prefix| has_prefix(&row.alias, prefix))
        {
            skip_until = Some(row.right);
            continue;
        }

        while open.last().is_some_and(|top| top.node.right < row.right) {
            close_top(&mut open, &mut roots);
        }
        open.push(TreeBranch::leaf(row));
    }

    while !open.is_empty() {
        close_top(&mut open, &mut roots);
    }
    roots
}

fn close_top(open: &mut Vec<TreeBranch>, roots: &mut Vec<TreeBranch>) {
    if let Some(done) = open.pop() {
        match open.last_mut() {
            Some(parent) => parent.children.push(done),
            None => roots.push(done),
        }
    }
}

/// Case-sensitive, literal prefix match shared by the tree listing and the
/// paged query.
fn has_prefix(alias: &str, prefix: &str) -> bool {
    alias.starts_with(prefix.trim())
}

/// SQL form of [`has_prefix`]. `LIKE` would fold case on SQLite and treat
/// `_` and `%` as wildcards, so the leading characters are compared instead.
fn prefix_expr<T: TreeTable>(prefix: &str) -> SimpleExpr {
    let prefix = prefix.trim();
    let len = prefix.chars().count() as i32;
    Expr::expr(
        Func::cust(Alias::new("SUBSTR"))
            .arg(Expr::col(T::alias_column()))
            .arg(1)
            .arg(len),
    )
    .eq(prefix)
}

/// Count and page through the descendants of `alias` (excluding the node itself).
///
/// A descendant matches when its alias starts with any of `include_prefixes`
/// and, if `filters` is non-empty, satisfies any one of them. Pages are
/// 1-based and ordered by id. An empty `include_prefixes` matches nothing.
pub async fn paged_descendants<T, C>(
    db: &C,
    alias: &str,
    include_prefixes: &[String],
    filters: &[NodeFilter],
    page_size: u64,
    page: u64,
) -> Result<(u64, Vec<String>), CanopyError>
where
    T: TreeTable,
    C: ConnectionTrait,
{
    let target = node::<T, C>(db, alias).await?;

    if include_prefixes.is_empty() {
        return Ok((0, Vec::new()));
    }

    let prefixes = include_prefixes
        .iter()
        .fold(Condition::any(), |cond, prefix| {
            cond.add(prefix_expr::<T>(prefix))
        });

    let mut cond = Condition::all()
        .add(T::left_column().gt(target.left))
        .add(T::left_column().lt(target.right))
        .add(prefixes);
    if !filters.is_empty() {
        cond = cond.add(
            filters
                .iter()
                .fold(Condition::any(), |any, f| any.add(f.to_expr::<T>())),
        );
    }

    let paginator = select_nodes::<T>()
        .filter(cond)
        .order_by_asc(T::id_column())
        .into_model::<TreeNode>()
        .paginate(db, page_size.max(1));

    let total = paginator.num_items().await?;
    if page_size == 0 {
        return Ok((total, Vec::new()));
    }

    let rows = paginator.fetch_page(page.max(1) - 1).await?;
    Ok((total, rows.into_iter().map(|n| n.alias).collect()))
}
