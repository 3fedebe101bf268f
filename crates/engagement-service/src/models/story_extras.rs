//! 故事互动实体：收藏、评分、阅读、奖励
//!
//! 四类实体结构相同（同一用户对同一故事至多一条记录），仅评分与奖励各多一个数值列。
//! 通过 [`StoryUserEntity`] 让仓储与处理器按实体类型复用同一套实现。

use std::fmt;

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// 故事互动类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoryActionKind {
    Bookmark,
    Rating,
    Read,
    Reward,
}

impl StoryActionKind {
    pub fn table(self) -> &'static str {
        match self {
            Self::Bookmark => "story_bookmarks",
            Self::Rating => "story_ratings",
            Self::Read => "story_reads",
            Self::Reward => "story_rewards",
        }
    }

    /// 附加数值列（评分 score、奖励 points）
    pub fn value_column(self) -> Option<&'static str> {
        match self {
            Self::Rating => Some("score"),
            Self::Reward => Some("points"),
            Self::Bookmark | Self::Read => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bookmark => "bookmark",
            Self::Rating => "rating",
            Self::Read => "read",
            Self::Reward => "reward",
        }
    }
}

impl fmt::Display for StoryActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 四张互动表的统一查询行，`value` 为附加数值列（无则为 NULL）
#[derive(Debug, Clone, FromRow)]
pub struct StoryUserRow {
    pub id: i64,
    pub story_id: i64,
    pub user_id: i64,
    pub value: Option<i32>,
    pub created_on: DateTime<Utc>,
}

/// (story, user) 唯一的互动实体
pub trait StoryUserEntity: fmt::Debug + Clone + Send + Sync + 'static {
    const KIND: StoryActionKind;

    fn from_row(row: StoryUserRow) -> Self;

    fn id(&self) -> i64;
    fn story_id(&self) -> i64;
    fn user_id(&self) -> i64;
    fn created_on(&self) -> DateTime<Utc>;

    /// 评分
    fn score(&self) -> Option<i16> {
        None
    }

    /// 奖励积分
    fn points(&self) -> Option<i16> {
        None
    }

    /// 写入附加数值列的值
    fn value(&self) -> Option<i32> {
        self.score().or(self.points()).map(i32::from)
    }
}

/// 故事收藏
#[derive(Debug, Clone, PartialEq)]
pub struct StoryBookmark {
    pub id: i64,
    pub story_id: i64,
    pub user_id: i64,
    pub created_on: DateTime<Utc>,
}

impl StoryUserEntity for StoryBookmark {
    const KIND: StoryActionKind = StoryActionKind::Bookmark;

    fn from_row(row: StoryUserRow) -> Self {
        Self {
            id: row.id,
            story_id: row.story_id,
            user_id: row.user_id,
            created_on: row.created_on,
        }
    }

    fn id(&self) -> i64 {
        self.id
    }
    fn story_id(&self) -> i64 {
        self.story_id
    }
    fn user_id(&self) -> i64 {
        self.user_id
    }
    fn created_on(&self) -> DateTime<Utc> {
        self.created_on
    }
}

/// 故事评分（1 到 5）
#[derive(Debug, Clone, PartialEq)]
pub struct StoryRating {
    pub id: i64,
    pub story_id: i64,
    pub user_id: i64,
    pub score: i16,
    pub created_on: DateTime<Utc>,
}

impl StoryUserEntity for StoryRating {
    const KIND: StoryActionKind = StoryActionKind::Rating;

    fn from_row(row: StoryUserRow) -> Self {
        Self {
            id: row.id,
            story_id: row.story_id,
            user_id: row.user_id,
            score: row.value.unwrap_or(1) as i16,
            created_on: row.created_on,
        }
    }

    fn id(&self) -> i64 {
        self.id
    }
    fn story_id(&self) -> i64 {
        self.story_id
    }
    fn user_id(&self) -> i64 {
        self.user_id
    }
    fn created_on(&self) -> DateTime<Utc> {
        self.created_on
    }
    fn score(&self) -> Option<i16> {
        Some(self.score)
    }
}

/// 故事阅读记录
#[derive(Debug, Clone, PartialEq)]
pub struct StoryRead {
    pub id: i64,
    pub story_id: i64,
    pub user_id: i64,
    pub created_on: DateTime<Utc>,
}

impl StoryUserEntity for StoryRead {
    const KIND: StoryActionKind = StoryActionKind::Read;

    fn from_row(row: StoryUserRow) -> Self {
        Self {
            id: row.id,
            story_id: row.story_id,
            user_id: row.user_id,
            created_on: row.created_on,
        }
    }

    fn id(&self) -> i64 {
        self.id
    }
    fn story_id(&self) -> i64 {
        self.story_id
    }
    fn user_id(&self) -> i64 {
        self.user_id
    }
    fn created_on(&self) -> DateTime<Utc> {
        self.created_on
    }
}

/// 故事奖励积分
#[derive(Debug, Clone, PartialEq)]
pub struct StoryReward {
    pub id: i64,
    pub story_id: i64,
    pub user_id: i64,
    pub points: i16,
    pub created_on: DateTime<Utc>,
}

impl StoryUserEntity for StoryReward {
    const KIND: StoryActionKind = StoryActionKind::Reward;

    fn from_row(row: StoryUserRow) -> Self {
        Self {
            id: row.id,
            story_id: row.story_id,
            user_id: row.user_id,
            points: row.value.unwrap_or(0) as i16,
            created_on: row.created_on,
        }
    }

    fn id(&self) -> i64 {
        self.id
    }
    fn story_id(&self) -> i64 {
        self.story_id
    }
    fn user_id(&self) -> i64 {
        self.user_id
    }
    fn created_on(&self) -> DateTime<Utc> {
        self.created_on
    }
    fn points(&self) -> Option<i16> {
        Some(self.points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(value: Option<i32>) -> StoryUserRow {
        StoryUserRow {
            id: 1,
            story_id: 2,
            user_id: 3,
            value,
            created_on: Utc::now(),
        }
    }

    #[test]
    fn test_kind_tables_and_columns() {
        assert_eq!(StoryActionKind::Bookmark.table(), "story_bookmarks");
        assert_eq!(StoryActionKind::Rating.value_column(), Some("score"));
        assert_eq!(StoryActionKind::Reward.value_column(), Some("points"));
        assert_eq!(StoryActionKind::Read.value_column(), None);
    }

    #[test]
    fn test_value_follows_kind() {
        assert_eq!(StoryRating::from_row(row(Some(4))).value(), Some(4));
        assert_eq!(StoryReward::from_row(row(Some(10))).value(), Some(10));
        assert_eq!(StoryBookmark::from_row(row(None)).value(), None);
        assert_eq!(StoryRead::from_row(row(None)).score(), None);
    }
}
