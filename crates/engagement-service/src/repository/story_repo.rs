//! 故事与故事设置仓储（PostgreSQL）

use async_trait::async_trait;
use sqlx::PgPool;

use super::StoryRepositoryTrait;
use crate::error::Result;
use crate::models::{StoryRow, StorySettings, StorySettingsUpdate, StorySummary};

const SETTINGS_COLUMNS: &str =
    "story_id, reward_points, display_rating, cached_rating::FLOAT8 AS cached_rating";

pub struct PgStoryRepository {
    pool: PgPool,
}

impl PgStoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StoryRepositoryTrait for PgStoryRepository {
    async fn get_story(&self, id: i64) -> Result<Option<StorySummary>> {
        let row = sqlx::query_as::<_, StoryRow>(
            r#"
            SELECT s.id, s.org_id, s.title, s.featured, s.summary,
                   s.video_id, s.audio_link, s.tags,
                   c.id AS category_id, c.name AS category_name, s.created_on
            FROM stories s
            LEFT JOIN categories c ON c.id = s.category_id
            WHERE s.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(StorySummary::from))
    }

    async fn get_or_create_settings(&self, story_id: i64) -> Result<StorySettings> {
        sqlx::query(
            "INSERT INTO story_settings (story_id) VALUES ($1) ON CONFLICT (story_id) DO NOTHING",
        )
        .bind(story_id)
        .execute(&self.pool)
        .await?;

        let settings = sqlx::query_as::<_, StorySettings>(&format!(
            "SELECT {SETTINGS_COLUMNS} FROM story_settings WHERE story_id = $1"
        ))
        .bind(story_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(settings)
    }

    async fn update_settings(
        &self,
        story_id: i64,
        update: &StorySettingsUpdate,
    ) -> Result<StorySettings> {
        let settings = sqlx::query_as::<_, StorySettings>(&format!(
            r#"
            INSERT INTO story_settings (story_id, reward_points, display_rating)
            VALUES ($1, COALESCE($2, 0::SMALLINT), COALESCE($3, TRUE))
            ON CONFLICT (story_id) DO UPDATE SET
                reward_points = COALESCE($2, story_settings.reward_points),
                display_rating = COALESCE($3, story_settings.display_rating)
            RETURNING {SETTINGS_COLUMNS}
            "#
        ))
        .bind(story_id)
        .bind(update.reward_points)
        .bind(update.display_rating)
        .fetch_one(&self.pool)
        .await?;

        Ok(settings)
    }

    async fn refresh_cached_rating(&self, story_id: i64) -> Result<f64> {
        let rating = sqlx::query_scalar::<_, f64>(
            r#"
            INSERT INTO story_settings (story_id, cached_rating)
            SELECT $1, COALESCE(ROUND(AVG(score)::NUMERIC, 2), 0)
            FROM story_ratings
            WHERE story_id = $1
            ON CONFLICT (story_id) DO UPDATE SET cached_rating = EXCLUDED.cached_rating
            RETURNING cached_rating::FLOAT8
            "#,
        )
        .bind(story_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(rating)
    }

    async fn count_reads_in_org(&self, user_id: i64, org_id: i64) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM story_reads r
            JOIN stories s ON s.id = r.story_id
            WHERE r.user_id = $1 AND s.org_id = $2
            "#,
        )
        .bind(user_id)
        .bind(org_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn count_reads_in_category(&self, user_id: i64, category_id: i64) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM story_reads r
            JOIN stories s ON s.id = r.story_id
            WHERE r.user_id = $1 AND s.category_id = $2
            "#,
        )
        .bind(user_id)
        .bind(category_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}
