use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Stored lowercase; lookups normalize before querying.
    #[sea_orm(unique)]
    pub email: String,

    /// Argon2id password hash (PHC string)
    pub password_hash: String,

    pub full_name: Option<String>,

    /// Versioned ciphertext token, never the plaintext key.
    pub gemini_api_key_encrypted: Option<String>,

    /// None means the named default role applies.
    pub role_id: Option<i32>,

    pub is_active: bool,

    pub is_verified: bool,

    /// Analyses recorded since the last UTC day rollover.
    pub analyses_today: i32,

    pub total_analyses: i32,

    /// RFC3339 UTC timestamp of the most recent recorded analysis.
    pub last_analysis_date: Option<String>,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
