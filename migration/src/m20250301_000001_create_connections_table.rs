use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE TYPE reflector.connection_class AS ENUM ('unassigned', 'agent', 'counterpart')",
            )
            .await?;

        // One row per live socket, keyed by the gateway-assigned id. Upserts on
        // `id` are the only writes, so there is never more than one row per socket.
        let create_table_sql = r#"
            CREATE TABLE IF NOT EXISTS reflector.connections (
                id VARCHAR(128) PRIMARY KEY,
                class reflector.connection_class NOT NULL DEFAULT 'unassigned',
                registered_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                expires_at TIMESTAMPTZ
            )
        "#;

        manager
            .get_connection()
            .execute_unprepared(create_table_sql)
            .await?;

        // Secondary index used to list every member of a class; (class, id) also
        // serves the id-ordered paging done by the registry.
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE INDEX IF NOT EXISTS idx_connections_class_id
                 ON reflector.connections(class, id)",
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                "CREATE INDEX IF NOT EXISTS idx_connections_expires_at
                 ON reflector.connections(expires_at)
                 WHERE expires_at IS NOT NULL",
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP TABLE IF EXISTS reflector.connections")
            .await?;

        manager
            .get_connection()
            .execute_unprepared("DROP TYPE IF EXISTS reflector.connection_class")
            .await?;

        Ok(())
    }
}
