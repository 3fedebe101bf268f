//! 徽章仓储（PostgreSQL）

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use super::{BadgeRepositoryTrait, PageRequest, UserBadgeFilter, map_write_error};
use crate::error::{ApiError, Result};
use crate::models::{BadgeType, BadgeTypeRow, NewBadgeType, UserBadge};

const BADGE_TYPE_COLUMNS: &str = "bt.id, bt.org_id, bt.title, bt.description, bt.image, \
                                  bt.is_visible, bt.item_type, bt.item_category, bt.item_count";

/// 用户徽章联表查询行
#[derive(FromRow)]
struct UserBadgeRow {
    user_badge_id: i64,
    user_id: i64,
    received_on: DateTime<Utc>,
    #[sqlx(flatten)]
    badge_type: BadgeTypeRow,
}

fn to_user_badge(row: UserBadgeRow) -> Result<UserBadge> {
    Ok(UserBadge {
        id: row.user_badge_id,
        user_id: row.user_id,
        badge_type: to_badge_type(row.badge_type)?,
        received_on: row.received_on,
    })
}

fn to_badge_type(row: BadgeTypeRow) -> Result<BadgeType> {
    BadgeType::try_from(row).map_err(ApiError::Internal)
}

pub struct PgBadgeRepository {
    pool: PgPool,
}

impl PgBadgeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn badge_type_write_error(err: sqlx::Error, badge_type: &NewBadgeType) -> ApiError {
        map_write_error(
            err,
            "org, title",
            &[
                ("org_id", "org", badge_type.org_id),
                (
                    "item_category",
                    "item_category",
                    badge_type.item_category.unwrap_or_default(),
                ),
            ],
        )
    }

    fn user_badge_select() -> String {
        format!(
            "SELECT ub.id AS user_badge_id, ub.user_id, ub.received_on, {BADGE_TYPE_COLUMNS} \
             FROM user_badges ub JOIN badge_types bt ON bt.id = ub.badge_type_id"
        )
    }
}

#[async_trait]
impl BadgeRepositoryTrait for PgBadgeRepository {
    async fn list_badge_types(
        &self,
        org: Option<i64>,
        page: Option<PageRequest>,
    ) -> Result<(Vec<BadgeType>, i64)> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM badge_types WHERE ($1::BIGINT IS NULL OR org_id = $1)",
        )
        .bind(org)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, BadgeTypeRow>(&format!(
            "SELECT {BADGE_TYPE_COLUMNS} FROM badge_types bt \
             WHERE ($1::BIGINT IS NULL OR bt.org_id = $1) \
             ORDER BY bt.id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(org)
        .bind(page.map(|p| p.page_size))
        .bind(page.map(|p| p.offset()).unwrap_or(0))
        .fetch_all(&self.pool)
        .await?;

        let items = rows.into_iter().map(to_badge_type).collect::<Result<_>>()?;
        Ok((items, total))
    }

    async fn get_badge_type(&self, id: i64) -> Result<Option<BadgeType>> {
        let row = sqlx::query_as::<_, BadgeTypeRow>(&format!(
            "SELECT {BADGE_TYPE_COLUMNS} FROM badge_types bt WHERE bt.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(to_badge_type).transpose()
    }

    async fn create_badge_type(&self, badge_type: &NewBadgeType) -> Result<BadgeType> {
        let row = sqlx::query_as::<_, BadgeTypeRow>(
            r#"
            INSERT INTO badge_types AS bt
                (org_id, title, description, image, is_visible, item_type, item_category, item_count)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING bt.id, bt.org_id, bt.title, bt.description, bt.image,
                      bt.is_visible, bt.item_type, bt.item_category, bt.item_count
            "#,
        )
        .bind(badge_type.org_id)
        .bind(&badge_type.title)
        .bind(&badge_type.description)
        .bind(&badge_type.image)
        .bind(badge_type.is_visible)
        .bind(badge_type.item_type.as_str())
        .bind(badge_type.item_category)
        .bind(badge_type.item_count)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Self::badge_type_write_error(e, badge_type))?;

        to_badge_type(row)
    }

    async fn update_badge_type(
        &self,
        id: i64,
        badge_type: &NewBadgeType,
    ) -> Result<Option<BadgeType>> {
        let row = sqlx::query_as::<_, BadgeTypeRow>(
            r#"
            UPDATE badge_types AS bt SET
                org_id = $2, title = $3, description = $4, image = $5,
                is_visible = $6, item_type = $7, item_category = $8, item_count = $9
            WHERE bt.id = $1
            RETURNING bt.id, bt.org_id, bt.title, bt.description, bt.image,
                      bt.is_visible, bt.item_type, bt.item_category, bt.item_count
            "#,
        )
        .bind(id)
        .bind(badge_type.org_id)
        .bind(&badge_type.title)
        .bind(&badge_type.description)
        .bind(&badge_type.image)
        .bind(badge_type.is_visible)
        .bind(badge_type.item_type.as_str())
        .bind(badge_type.item_category)
        .bind(badge_type.item_count)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Self::badge_type_write_error(e, badge_type))?;

        row.map(to_badge_type).transpose()
    }

    async fn delete_badge_type(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM badge_types WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_unearned_badge_types(
        &self,
        user_id: i64,
        org_id: i64,
    ) -> Result<Vec<BadgeType>> {
        let rows = sqlx::query_as::<_, BadgeTypeRow>(&format!(
            r#"
            SELECT {BADGE_TYPE_COLUMNS}
            FROM badge_types bt
            WHERE bt.org_id = $1
              AND bt.is_visible
              AND NOT EXISTS (
                  SELECT 1 FROM user_badges ub
                  WHERE ub.badge_type_id = bt.id AND ub.user_id = $2
              )
            ORDER BY bt.id
            "#
        ))
        .bind(org_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(to_badge_type).collect()
    }

    async fn award_badge(&self, user_id: i64, badge_type_id: i64) -> Result<Option<UserBadge>> {
        let row = sqlx::query_as::<_, UserBadgeRow>(&format!(
            r#"
            WITH ub AS (
                INSERT INTO user_badges (badge_type_id, user_id)
                VALUES ($1, $2)
                ON CONFLICT (badge_type_id, user_id) DO NOTHING
                RETURNING id, badge_type_id, user_id, received_on
            )
            SELECT ub.id AS user_badge_id, ub.user_id, ub.received_on, {BADGE_TYPE_COLUMNS}
            FROM ub JOIN badge_types bt ON bt.id = ub.badge_type_id
            "#
        ))
        .bind(badge_type_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(to_user_badge).transpose()
    }

    async fn list_user_badges(
        &self,
        filter: UserBadgeFilter,
        page: Option<PageRequest>,
    ) -> Result<(Vec<UserBadge>, i64)> {
        let condition = "($1::BIGINT IS NULL OR ub.user_id = $1) \
                         AND ($2::BIGINT IS NULL OR ub.badge_type_id = $2) \
                         AND ($3::BIGINT IS NULL OR bt.org_id = $3)";

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM user_badges ub \
             JOIN badge_types bt ON bt.id = ub.badge_type_id WHERE {condition}"
        ))
        .bind(filter.user)
        .bind(filter.badge_type)
        .bind(filter.org)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, UserBadgeRow>(&format!(
            "{} WHERE {condition} ORDER BY ub.received_on DESC, ub.id DESC LIMIT $4 OFFSET $5",
            Self::user_badge_select()
        ))
        .bind(filter.user)
        .bind(filter.badge_type)
        .bind(filter.org)
        .bind(page.map(|p| p.page_size))
        .bind(page.map(|p| p.offset()).unwrap_or(0))
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(to_user_badge)
            .collect::<Result<_>>()?;
        Ok((items, total))
    }

    async fn get_user_badge(&self, id: i64) -> Result<Option<UserBadge>> {
        let row = sqlx::query_as::<_, UserBadgeRow>(&format!(
            "{} WHERE ub.id = $1",
            Self::user_badge_select()
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(to_user_badge).transpose()
    }

    async fn create_user_badge(&self, user_id: i64, badge_type_id: i64) -> Result<UserBadge> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO user_badges (badge_type_id, user_id) VALUES ($1, $2) RETURNING id",
        )
        .bind(badge_type_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            map_write_error(
                e,
                "badge_type, user",
                &[("badge_type_id", "badge_type", badge_type_id), ("user_id", "user", user_id)],
            )
        })?;

        self.get_user_badge(id)
            .await?
            .ok_or_else(|| ApiError::Internal(format!("用户徽章写入后不可读: {id}")))
    }

    async fn delete_user_badge(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM user_badges WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
