use crate::entities::prelude::*;
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Schema;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Seeded roles: (name, description, daily analysis limit; 0 = unlimited).
const SEED_ROLES: &[(&str, &str, i32)] = &[
    ("free", "Free tier", 5),
    ("pro", "Pro subscription", 100),
    ("custom", "Bring-your-own API key", 0),
    ("admin", "Administrator", 0),
];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let schema = Schema::new(backend);

        manager
            .create_table(
                schema
                    .create_table_from_entity(Roles)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Users)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Analyses)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // Roles are referenced by name everywhere, so ids are never assumed.
        for (name, description, limit) in SEED_ROLES {
            let insert = sea_orm_migration::sea_query::Query::insert()
                .into_table(Roles)
                .columns([
                    crate::entities::roles::Column::Name,
                    crate::entities::roles::Column::Description,
                    crate::entities::roles::Column::MaxAnalysesPerDay,
                ])
                .values_panic([(*name).into(), (*description).into(), (*limit).into()])
                .to_owned();

            manager.exec_stmt(insert).await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Analyses).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Roles).to_owned())
            .await?;

        Ok(())
    }
}
