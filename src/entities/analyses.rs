use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "analyses")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// None for anonymous requests.
    pub user_id: Option<i32>,

    #[sea_orm(column_type = "Text")]
    pub code_original: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub code_improved: Option<String>,

    /// Full markdown analysis as returned by the model.
    #[sea_orm(column_type = "Text")]
    pub analysis_result: String,

    /// Best-effort extraction, 0..=100 when present.
    pub quality_score: Option<i32>,

    pub model_used: String,

    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
