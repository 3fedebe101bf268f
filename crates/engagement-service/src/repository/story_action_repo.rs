//! 互动记录仓储（PostgreSQL）
//!
//! 四张互动表结构一致，表名与数值列由实体类型决定，均为静态字符串

use std::marker::PhantomData;

use async_trait::async_trait;
use sqlx::postgres::PgArguments;
use sqlx::query::QueryAs;
use sqlx::{FromRow, PgPool, Postgres};

use super::{PageRequest, StoryActionRepositoryTrait, StoryUserFilter, map_write_error};
use crate::error::{ApiError, Result};
use crate::models::{StoryUserEntity, StoryUserRow};

#[derive(FromRow)]
struct UpsertRow {
    #[sqlx(flatten)]
    row: StoryUserRow,
    created: bool,
}

pub struct PgStoryActionRepository<E> {
    pool: PgPool,
    _entity: PhantomData<fn() -> E>,
}

impl<E: StoryUserEntity> PgStoryActionRepository<E> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _entity: PhantomData,
        }
    }

    fn table() -> &'static str {
        E::KIND.table()
    }

    fn columns() -> String {
        let value = match E::KIND.value_column() {
            Some(column) => format!("{column}::INT4"),
            None => "NULL::INT4".to_string(),
        };
        format!("id, story_id, user_id, {value} AS value, created_on")
    }

    fn insert_sql(on_conflict: &str) -> String {
        let (value_column, value_param) = match E::KIND.value_column() {
            Some(column) => (format!(", {column}"), ", COALESCE($3::INT4, 0)".to_string()),
            None => (String::new(), String::new()),
        };
        format!(
            "INSERT INTO {table} (story_id, user_id{value_column}) \
             VALUES ($1, $2{value_param}) {on_conflict} RETURNING {columns}",
            table = Self::table(),
            columns = Self::columns(),
        )
    }

    /// 无数值列的表不绑定第三个参数
    fn bind_insert<'q, O>(
        query: QueryAs<'q, Postgres, O, PgArguments>,
        story_id: i64,
        user_id: i64,
        value: Option<i32>,
    ) -> QueryAs<'q, Postgres, O, PgArguments> {
        let query = query.bind(story_id).bind(user_id);
        if E::KIND.value_column().is_some() {
            query.bind(value)
        } else {
            query
        }
    }

    fn write_error(err: sqlx::Error, story_id: i64, user_id: i64) -> ApiError {
        map_write_error(
            err,
            "story, user",
            &[("story_id", "story", story_id), ("user_id", "user", user_id)],
        )
    }
}

#[async_trait]
impl<E: StoryUserEntity> StoryActionRepositoryTrait<E> for PgStoryActionRepository<E> {
    async fn list(
        &self,
        filter: StoryUserFilter,
        page: Option<PageRequest>,
    ) -> Result<(Vec<E>, i64)> {
        let condition = "($1::BIGINT IS NULL OR user_id = $1) AND ($2::BIGINT IS NULL OR story_id = $2)";

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM {} WHERE {condition}",
            Self::table()
        ))
        .bind(filter.user)
        .bind(filter.story)
        .fetch_one(&self.pool)
        .await?;

        // LIMIT NULL 等价于不限制
        let rows = sqlx::query_as::<_, StoryUserRow>(&format!(
            "SELECT {} FROM {} WHERE {condition} \
             ORDER BY created_on DESC, id DESC LIMIT $3 OFFSET $4",
            Self::columns(),
            Self::table()
        ))
        .bind(filter.user)
        .bind(filter.story)
        .bind(page.map(|p| p.page_size))
        .bind(page.map(|p| p.offset()).unwrap_or(0))
        .fetch_all(&self.pool)
        .await?;

        Ok((rows.into_iter().map(E::from_row).collect(), total))
    }

    async fn get(&self, id: i64) -> Result<Option<E>> {
        let row = sqlx::query_as::<_, StoryUserRow>(&format!(
            "SELECT {} FROM {} WHERE id = $1",
            Self::columns(),
            Self::table()
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(E::from_row))
    }

    async fn find(&self, story_id: i64, user_id: i64) -> Result<Option<E>> {
        let row = sqlx::query_as::<_, StoryUserRow>(&format!(
            "SELECT {} FROM {} WHERE story_id = $1 AND user_id = $2",
            Self::columns(),
            Self::table()
        ))
        .bind(story_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(E::from_row))
    }

    async fn create(&self, story_id: i64, user_id: i64, value: Option<i32>) -> Result<E> {
        let sql = Self::insert_sql("");
        let query = sqlx::query_as::<_, StoryUserRow>(&sql);
        let row = Self::bind_insert(query, story_id, user_id, value)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Self::write_error(e, story_id, user_id))?;

        Ok(E::from_row(row))
    }

    async fn get_or_create(
        &self,
        story_id: i64,
        user_id: i64,
        value: Option<i32>,
    ) -> Result<(E, bool)> {
        let sql = Self::insert_sql("ON CONFLICT (story_id, user_id) DO NOTHING");
        let query = sqlx::query_as::<_, StoryUserRow>(&sql);
        let inserted = Self::bind_insert(query, story_id, user_id, value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Self::write_error(e, story_id, user_id))?;

        if let Some(row) = inserted {
            return Ok((E::from_row(row), true));
        }

        self.find(story_id, user_id)
            .await?
            .map(|existing| (existing, false))
            .ok_or_else(|| {
                ApiError::Internal(format!(
                    "{} 记录在冲突后消失: story={story_id}, user={user_id}",
                    E::KIND
                ))
            })
    }

    async fn upsert(&self, story_id: i64, user_id: i64, value: Option<i32>) -> Result<(E, bool)> {
        let Some(column) = E::KIND.value_column() else {
            return self.get_or_create(story_id, user_id, value).await;
        };

        let sql = Self::insert_sql(&format!(
            "ON CONFLICT (story_id, user_id) DO UPDATE SET {column} = EXCLUDED.{column}"
        ));
        let sql = format!("{sql}, (xmax = 0) AS created");
        let query = sqlx::query_as::<_, UpsertRow>(&sql);
        let upserted = Self::bind_insert(query, story_id, user_id, value)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Self::write_error(e, story_id, user_id))?;

        Ok((E::from_row(upserted.row), upserted.created))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", Self::table()))
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_for(&self, story_id: i64, user_id: i64) -> Result<u64> {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE story_id = $1 AND user_id = $2",
            Self::table()
        ))
        .bind(story_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
