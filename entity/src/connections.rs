use crate::connection_class::ConnectionClass;
use crate::ConnectionId;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One row per live socket. The `class` column carries a secondary index so the
/// relay can list every member of a class without scanning the table.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize, ToSchema)]
#[sea_orm(schema_name = "reflector", table_name = "connections")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    #[schema(value_type = String)]
    pub id: ConnectionId,
    pub class: ConnectionClass,
    #[schema(value_type = String, format = DateTime)]
    pub registered_at: DateTimeWithTimeZone,
    /// Advisory expiry; rows past this instant are removed by the eviction sweep.
    #[schema(value_type = Option<String>, format = DateTime)]
    pub expires_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
