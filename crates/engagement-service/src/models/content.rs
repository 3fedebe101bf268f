//! 内容平台实体的只读视图

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 分类引用（嵌套在故事摘要中）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRef {
    pub id: i64,
    pub name: String,
}

/// 故事摘要
///
/// 详细表示中嵌套返回，同时作为缓存值写入 Redis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorySummary {
    pub id: i64,
    pub org: i64,
    pub title: String,
    pub featured: bool,
    pub summary: String,
    pub video_id: Option<String>,
    pub audio_link: Option<String>,
    pub tags: Option<String>,
    pub category: Option<CategoryRef>,
    pub created_on: DateTime<Utc>,
}

impl StorySummary {
    pub fn category_id(&self) -> Option<i64> {
        self.category.as_ref().map(|c| c.id)
    }
}

/// 故事查询行（LEFT JOIN categories）
#[derive(Debug, Clone, FromRow)]
pub struct StoryRow {
    pub id: i64,
    pub org_id: i64,
    pub title: String,
    pub featured: bool,
    pub summary: String,
    pub video_id: Option<String>,
    pub audio_link: Option<String>,
    pub tags: Option<String>,
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
    pub created_on: DateTime<Utc>,
}

impl From<StoryRow> for StorySummary {
    fn from(row: StoryRow) -> Self {
        let category = match (row.category_id, row.category_name) {
            (Some(id), Some(name)) => Some(CategoryRef { id, name }),
            _ => None,
        };

        Self {
            id: row.id,
            org: row.org_id,
            title: row.title,
            featured: row.featured,
            summary: row.summary,
            video_id: row.video_id,
            audio_link: row.audio_link,
            tags: row.tags,
            category,
            created_on: row.created_on,
        }
    }
}

/// 故事设置，首次访问时按默认值创建
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct StorySettings {
    pub story_id: i64,
    pub reward_points: i16,
    pub display_rating: bool,
    /// 评分平均值，保留两位小数；无评分时为 0
    pub cached_rating: f64,
}

impl StorySettings {
    pub fn new(story_id: i64) -> Self {
        Self {
            story_id,
            reward_points: 0,
            display_rating: true,
            cached_rating: 0.0,
        }
    }
}

/// 故事设置的部分更新
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StorySettingsUpdate {
    pub reward_points: Option<i16>,
    pub display_rating: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(category: Option<(i64, &str)>) -> StoryRow {
        StoryRow {
            id: 7,
            org_id: 1,
            title: "Clean water".into(),
            featured: true,
            summary: "s".into(),
            video_id: None,
            audio_link: None,
            tags: Some("water".into()),
            category_id: category.map(|c| c.0),
            category_name: category.map(|c| c.1.to_string()),
            created_on: Utc::now(),
        }
    }

    #[test]
    fn test_story_row_with_category() {
        let summary = StorySummary::from(row(Some((3, "Health"))));
        assert_eq!(summary.org, 1);
        assert_eq!(summary.category_id(), Some(3));
        assert_eq!(summary.category.unwrap().name, "Health");
    }

    #[test]
    fn test_story_row_without_category() {
        let summary = StorySummary::from(row(None));
        assert!(summary.category.is_none());

        let json = serde_json::to_value(&summary).unwrap();
        assert!(json["category"].is_null());
        assert_eq!(json["org"], 1);
    }
}
