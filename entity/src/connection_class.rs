use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The role a connection plays in the relay. A connection starts out `Unassigned`
/// and becomes an `Agent` or a `Counterpart` once it identifies itself.
#[derive(
    Debug,
    Clone,
    Copy,
    Eq,
    PartialEq,
    Hash,
    EnumIter,
    Deserialize,
    Serialize,
    DeriveActiveEnum,
    Default,
    ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "connection_class")]
pub enum ConnectionClass {
    #[sea_orm(string_value = "unassigned")]
    #[default]
    Unassigned,
    #[sea_orm(string_value = "agent")]
    Agent,
    #[sea_orm(string_value = "counterpart")]
    Counterpart,
}

impl ConnectionClass {
    /// Returns the class that messages from this class are relayed to.
    /// `Unassigned` maps to itself; such connections are never routed.
    pub fn opposite(self) -> Self {
        match self {
            Self::Agent => Self::Counterpart,
            Self::Counterpart => Self::Agent,
            Self::Unassigned => Self::Unassigned,
        }
    }

    /// Whether the connection has identified as an agent or a counterpart.
    pub fn is_assigned(self) -> bool {
        self != Self::Unassigned
    }
}

impl std::fmt::Display for ConnectionClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unassigned => write!(f, "unassigned"),
            Self::Agent => write!(f, "agent"),
            Self::Counterpart => write!(f, "counterpart"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::Iterable;

    #[test]
    fn opposite_swaps_assigned_classes() {
        assert_eq!(
            ConnectionClass::Agent.opposite(),
            ConnectionClass::Counterpart
        );
        assert_eq!(
            ConnectionClass::Counterpart.opposite(),
            ConnectionClass::Agent
        );
    }

    #[test]
    fn unassigned_is_not_routable() {
        assert_eq!(
            ConnectionClass::Unassigned.opposite(),
            ConnectionClass::Unassigned
        );
        assert!(!ConnectionClass::Unassigned.is_assigned());
        assert!(ConnectionClass::Agent.is_assigned());
    }

    #[test]
    fn display_matches_database_values() {
        for class in ConnectionClass::iter() {
            assert_eq!(class.to_string(), class.to_value());
        }
    }
}
