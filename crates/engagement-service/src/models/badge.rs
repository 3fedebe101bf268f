//! 成就徽章模型
//!
//! 徽章类型按组织配置阅读数量阈值；用户阅读故事后由评估器判定是否发放。

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 徽章计数口径
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeItemType {
    /// 组织内已读故事总数
    #[default]
    StoryRead,
    /// 指定分类内已读故事数
    CategoryRead,
}

impl BadgeItemType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StoryRead => "story_read",
            Self::CategoryRead => "category_read",
        }
    }
}

impl fmt::Display for BadgeItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BadgeItemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "story_read" => Ok(Self::StoryRead),
            "category_read" => Ok(Self::CategoryRead),
            other => Err(format!("未知的徽章计数类型: {other}")),
        }
    }
}

/// 徽章类型
#[derive(Debug, Clone, PartialEq)]
pub struct BadgeType {
    pub id: i64,
    pub org_id: i64,
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    pub is_visible: bool,
    pub item_type: BadgeItemType,
    pub item_category: Option<i64>,
    pub item_count: i32,
}

impl BadgeType {
    /// 按阅读进度判断是否已达成
    pub fn is_earned(&self, progress: &ReadProgress) -> bool {
        if self.org_id != progress.org_id {
            return false;
        }

        match self.item_type {
            BadgeItemType::StoryRead => progress.org_reads >= i64::from(self.item_count),
            BadgeItemType::CategoryRead => {
                self.item_category.is_some()
                    && self.item_category == progress.category_id
                    && progress.category_reads >= i64::from(self.item_count)
            }
        }
    }
}

/// 徽章类型查询行
#[derive(Debug, Clone, FromRow)]
pub struct BadgeTypeRow {
    pub id: i64,
    pub org_id: i64,
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    pub is_visible: bool,
    pub item_type: String,
    pub item_category: Option<i64>,
    pub item_count: i32,
}

impl TryFrom<BadgeTypeRow> for BadgeType {
    type Error = String;

    fn try_from(row: BadgeTypeRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            org_id: row.org_id,
            title: row.title,
            description: row.description,
            image: row.image,
            is_visible: row.is_visible,
            item_type: row.item_type.parse()?,
            item_category: row.item_category,
            item_count: row.item_count,
        })
    }
}

/// 新建或整体更新徽章类型
#[derive(Debug, Clone, PartialEq)]
pub struct NewBadgeType {
    pub org_id: i64,
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    pub is_visible: bool,
    pub item_type: BadgeItemType,
    pub item_category: Option<i64>,
    pub item_count: i32,
}

/// 用户已获得的徽章（附带徽章类型）
#[derive(Debug, Clone, PartialEq)]
pub struct UserBadge {
    pub id: i64,
    pub user_id: i64,
    pub badge_type: BadgeType,
    pub received_on: DateTime<Utc>,
}

/// 用户在某故事所属组织与分类下的阅读进度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadProgress {
    pub org_id: i64,
    pub category_id: Option<i64>,
    pub org_reads: i64,
    pub category_reads: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn badge(item_type: BadgeItemType, item_category: Option<i64>, item_count: i32) -> BadgeType {
        BadgeType {
            id: 1,
            org_id: 1,
            title: "Reader".into(),
            description: String::new(),
            image: None,
            is_visible: true,
            item_type,
            item_category,
            item_count,
        }
    }

    fn progress(org_reads: i64, category_reads: i64) -> ReadProgress {
        ReadProgress {
            org_id: 1,
            category_id: Some(5),
            org_reads,
            category_reads,
        }
    }

    #[test]
    fn test_story_read_threshold() {
        let b = badge(BadgeItemType::StoryRead, None, 3);
        assert!(!b.is_earned(&progress(2, 2)));
        assert!(b.is_earned(&progress(3, 0)));
        assert!(b.is_earned(&progress(4, 0)));
    }

    #[test]
    fn test_category_read_requires_matching_category() {
        let b = badge(BadgeItemType::CategoryRead, Some(5), 2);
        assert!(b.is_earned(&progress(10, 2)));
        assert!(!b.is_earned(&progress(10, 1)));

        let other = badge(BadgeItemType::CategoryRead, Some(9), 1);
        assert!(!other.is_earned(&progress(10, 10)));

        let missing = badge(BadgeItemType::CategoryRead, None, 1);
        assert!(!missing.is_earned(&progress(10, 10)));
    }

    #[test]
    fn test_other_org_never_earned() {
        let mut b = badge(BadgeItemType::StoryRead, None, 1);
        b.org_id = 2;
        assert!(!b.is_earned(&progress(100, 100)));
    }

    #[test]
    fn test_item_type_parse() {
        assert_eq!("story_read".parse::<BadgeItemType>(), Ok(BadgeItemType::StoryRead));
        assert_eq!(
            "category_read".parse::<BadgeItemType>(),
            Ok(BadgeItemType::CategoryRead)
        );
        assert!("poll_answer".parse::<BadgeItemType>().is_err());
    }
}
