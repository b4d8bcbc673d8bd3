use crate::errors::EntityKind;
use crate::tree::TreeTable;
use sea_orm::entity::prelude::*;
use sea_orm::{NotSet, Set};
use serde::{Deserialize, Serialize};

/// A role. `lt`/`rt` are only populated when roles form a tree.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "role")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub lt: Option<i32>,
    pub rt: Option<i32>,
    #[sea_orm(unique)]
    pub alias: String,
    pub description: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TreeTable for Entity {
    type Node = ActiveModel;

    const KIND: EntityKind = EntityKind::Role;

    fn id_column() -> Column {
        Column::Id
    }

    fn left_column() -> Column {
        Column::Lt
    }

    fn right_column() -> Column {
        Column::Rt
    }

    fn alias_column() -> Column {
        Column::Alias
    }

    fn description_column() -> Column {
        Column::Description
    }

    fn new_node(left: i32, right: i32, alias: &str, description: Option<String>) -> ActiveModel {
        ActiveModel {
            id: NotSet,
            lt: Set(Some(left)),
            rt: Set(Some(right)),
            alias: Set(alias.to_string()),
            description: Set(description),
        }
    }
}
