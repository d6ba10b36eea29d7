use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create the relay's schema
        manager
            .get_connection()
            .execute_unprepared("CREATE SCHEMA IF NOT EXISTS reflector;")
            .await?;

        manager
            .get_connection()
            .execute_unprepared("SET search_path TO reflector, public;")
            .await?;

        // The relay runs every query as the `reflector` role
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                DO $$ BEGIN
                    GRANT ALL ON SCHEMA reflector TO reflector;
                    ALTER DEFAULT PRIVILEGES IN SCHEMA reflector GRANT ALL ON TABLES TO reflector;
                    ALTER DEFAULT PRIVILEGES IN SCHEMA reflector GRANT ALL ON TYPES TO reflector;
                END $$;
            "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                DO $$ BEGIN
                    ALTER DEFAULT PRIVILEGES IN SCHEMA reflector REVOKE ALL ON TYPES FROM reflector;
                    ALTER DEFAULT PRIVILEGES IN SCHEMA reflector REVOKE ALL ON TABLES FROM reflector;
                    REVOKE ALL ON SCHEMA reflector FROM reflector;
                END $$;
            "#,
            )
            .await?;

        // CASCADE removes every object created by later migrations
        manager
            .get_connection()
            .execute_unprepared("DROP SCHEMA IF EXISTS reflector CASCADE;")
            .await?;

        Ok(())
    }
}
