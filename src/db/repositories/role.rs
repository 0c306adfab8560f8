use anyhow::{Context, Result};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use crate::entities::roles;

/// Name of the role applied when registration supplies no personal API key.
pub const DEFAULT_ROLE: &str = "free";

/// Name of the role applied when a personal API key is supplied.
pub const BYO_KEY_ROLE: &str = "custom";

#[derive(Debug, Clone)]
pub struct Role {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    /// Zero means unlimited.
    pub max_analyses_per_day: i32,
}

impl From<roles::Model> for Role {
    fn from(model: roles::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            max_analyses_per_day: model.max_analyses_per_day,
        }
    }
}

pub struct RoleRepository {
    conn: DatabaseConnection,
}

impl RoleRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<Role>> {
        let role = roles::Entity::find()
            .filter(roles::Column::Name.eq(name))
            .one(&self.conn)
            .await
            .context("Failed to query role by name")?;

        Ok(role.map(Role::from))
    }

    pub async fn get_by_id(&self, id: i32) -> Result<Option<Role>> {
        let role = roles::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query role by ID")?;

        Ok(role.map(Role::from))
    }
}
