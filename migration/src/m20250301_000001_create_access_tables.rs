use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Enable foreign keys for SQLite
        if manager.get_database_backend() == sea_orm::DatabaseBackend::Sqlite {
            manager
                .get_connection()
                .execute_unprepared("PRAGMA foreign_keys = ON")
                .await?;
        }

        // Resource tree (nested set)
        manager
            .create_table(
                Table::create()
                    .table(Resource::Table)
                    .if_not_exists()
                    .col(pk_auto(Resource::Id))
                    .col(integer(Resource::Lt))
                    .col(integer(Resource::Rt))
                    .col(string_uniq(Resource::Alias))
                    .col(string_null(Resource::Description))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_resource_lt_rt")
                    .table(Resource::Table)
                    .col(Resource::Lt)
                    .col(Resource::Rt)
                    .to_owned(),
            )
            .await?;

        // Roles: intervals are only populated under the hierarchical topology
        manager
            .create_table(
                Table::create()
                    .table(Role::Table)
                    .if_not_exists()
                    .col(pk_auto(Role::Id))
                    .col(integer_null(Role::Lt))
                    .col(integer_null(Role::Rt))
                    .col(string_uniq(Role::Alias))
                    .col(string_null(Role::Description))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_role_lt_rt")
                    .table(Role::Table)
                    .col(Role::Lt)
                    .col(Role::Rt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Action::Table)
                    .if_not_exists()
                    .col(pk_auto(Action::Id))
                    .col(string_uniq(Action::Alias))
                    .col(string_null(Action::Description))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Tag::Table)
                    .if_not_exists()
                    .col(pk_auto(Tag::Id))
                    .col(string_uniq(Tag::Name))
                    .to_owned(),
            )
            .await?;

        // Role-keyed rules
        manager
            .create_table(
                Table::create()
                    .table(Control::Table)
                    .if_not_exists()
                    .col(integer(Control::RoleId))
                    .col(integer(Control::ActionId))
                    .col(integer(Control::ResourceId))
                    .col(boolean(Control::Allowed))
                    .primary_key(
                        Index::create()
                            .col(Control::RoleId)
                            .col(Control::ActionId)
                            .col(Control::ResourceId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_control_role")
                            .from(Control::Table, Control::RoleId)
                            .to(Role::Table, Role::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_control_action")
                            .from(Control::Table, Control::ActionId)
                            .to(Action::Table, Action::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_control_resource")
                            .from(Control::Table, Control::ResourceId)
                            .to(Resource::Table, Resource::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_control_resource_action")
                    .table(Control::Table)
                    .col(Control::ResourceId)
                    .col(Control::ActionId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RoleTag::Table)
                    .if_not_exists()
                    .col(integer(RoleTag::RoleId))
                    .col(integer(RoleTag::TagId))
                    .primary_key(Index::create().col(RoleTag::RoleId).col(RoleTag::TagId))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_role_tag_role")
                            .from(RoleTag::Table, RoleTag::RoleId)
                            .to(Role::Table, Role::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_role_tag_tag")
                            .from(RoleTag::Table, RoleTag::TagId)
                            .to(Tag::Table, Tag::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Tag-keyed rules
        manager
            .create_table(
                Table::create()
                    .table(Tcontrol::Table)
                    .if_not_exists()
                    .col(integer(Tcontrol::TagId))
                    .col(integer(Tcontrol::ActionId))
                    .col(integer(Tcontrol::ResourceId))
                    .col(boolean(Tcontrol::Allowed))
                    .primary_key(
                        Index::create()
                            .col(Tcontrol::TagId)
                            .col(Tcontrol::ActionId)
                            .col(Tcontrol::ResourceId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tcontrol_tag")
                            .from(Tcontrol::Table, Tcontrol::TagId)
                            .to(Tag::Table, Tag::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tcontrol_action")
                            .from(Tcontrol::Table, Tcontrol::ActionId)
                            .to(Action::Table, Action::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tcontrol_resource")
                            .from(Tcontrol::Table, Tcontrol::ResourceId)
                            .to(Resource::Table, Resource::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Tcontrol::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RoleTag::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Control::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tag::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Action::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Role::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Resource::Table).if_exists().to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Resource {
    Table,
    Id,
    Lt,
    Rt,
    Alias,
    Description,
}

#[derive(DeriveIden)]
enum Role {
    Table,
    Id,
    Lt,
    Rt,
    Alias,
    Description,
}

#[derive(DeriveIden)]
enum Action {
    Table,
    Id,
    Alias,
    Description,
}

#[derive(DeriveIden)]
enum Tag {
    Table,
    Id,
    Name,
}

#[derive(DeriveIden)]
enum Control {
    Table,
    RoleId,
    ActionId,
    ResourceId,
    Allowed,
}

#[derive(DeriveIden)]
enum RoleTag {
    Table,
    RoleId,
    TagId,
}

#[derive(DeriveIden)]
enum Tcontrol {
    Table,
    TagId,
    ActionId,
    ResourceId,
    Allowed,
}
