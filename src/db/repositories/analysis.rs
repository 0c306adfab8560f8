use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QuerySelect, Set,
};

use crate::entities::analyses;

#[derive(Debug)]
pub struct NewAnalysis {
    pub user_id: Option<i32>,
    pub code_original: String,
    pub code_improved: Option<String>,
    pub analysis_result: String,
    pub quality_score: Option<i32>,
    pub model_used: String,
}

pub struct AnalysisRepository {
    conn: DatabaseConnection,
}

impl AnalysisRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn insert(&self, analysis: NewAnalysis) -> Result<analyses::Model> {
        let active = analyses::ActiveModel {
            user_id: Set(analysis.user_id),
            code_original: Set(analysis.code_original),
            code_improved: Set(analysis.code_improved),
            analysis_result: Set(analysis.analysis_result),
            quality_score: Set(analysis.quality_score),
            model_used: Set(analysis.model_used),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .context("Failed to insert analysis")
    }

    pub async fn count_for_user(&self, user_id: i32) -> Result<u64> {
        analyses::Entity::find()
            .filter(analyses::Column::UserId.eq(user_id))
            .count(&self.conn)
            .await
            .context("Failed to count analyses")
    }

    /// Mean quality score across a user's analyses that have one.
    pub async fn average_score_for_user(&self, user_id: i32) -> Result<Option<f64>> {
        let scores: Vec<Option<i32>> = analyses::Entity::find()
            .filter(analyses::Column::UserId.eq(user_id))
            .select_only()
            .column(analyses::Column::QualityScore)
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to load quality scores")?;

        let scored: Vec<i32> = scores.into_iter().flatten().collect();
        if scored.is_empty() {
            return Ok(None);
        }

        #[allow(clippy::cast_precision_loss)]
        let avg = f64::from(scored.iter().sum::<i32>()) / scored.len() as f64;
        Ok(Some(avg))
    }
}
