//! 内存存储
//!
//! 使用 DashMap 实现全部仓储接口，适用于测试和本地开发。
//! 唯一约束通过键索引表的 entry API 保证原子性，外键检查与 PostgreSQL 实现返回相同的校验错误。

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::{
    BadgeRepositoryTrait, PageRequest, StoryActionRepositoryTrait, StoryRepositoryTrait,
    StoryUserFilter, UserBadgeFilter, UserRepositoryTrait, apply_page,
};
use crate::error::{ApiError, Result};
use crate::models::{
    BadgeType, CategoryRef, NewBadgeType, NewUser, StoryActionKind, StorySettings,
    StorySettingsUpdate, StorySummary, StoryUserEntity, StoryUserRow, User, UserBadge,
    UserProfile,
};

#[derive(Debug, Clone)]
struct UserBadgeRecord {
    user_id: i64,
    badge_type_id: i64,
    received_on: DateTime<Utc>,
}

/// 内存存储
#[derive(Debug, Default)]
pub struct MemoryStore {
    next_id: AtomicI64,
    orgs: DashMap<i64, String>,
    categories: DashMap<i64, (i64, CategoryRef)>,
    stories: DashMap<i64, StorySummary>,
    settings: DashMap<i64, StorySettings>,
    actions: DashMap<i64, (StoryActionKind, StoryUserRow)>,
    action_keys: DashMap<(StoryActionKind, i64, i64), i64>,
    users: DashMap<i64, User>,
    usernames: DashMap<String, i64>,
    profiles: DashMap<i64, UserProfile>,
    badge_types: DashMap<i64, BadgeType>,
    badge_titles: DashMap<(i64, String), i64>,
    user_badges: DashMap<i64, UserBadgeRecord>,
    user_badge_keys: DashMap<(i64, i64), i64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    // 内容平台数据由外部写入，这里提供填充入口

    pub fn add_org(&self, name: &str) -> i64 {
        let id = self.next_id();
        self.orgs.insert(id, name.to_string());
        id
    }

    pub fn add_category(&self, org_id: i64, name: &str) -> i64 {
        let id = self.next_id();
        let category = CategoryRef {
            id,
            name: name.to_string(),
        };
        self.categories.insert(id, (org_id, category));
        id
    }

    pub fn add_story(&self, org_id: i64, category_id: Option<i64>, title: &str) -> StorySummary {
        let id = self.next_id();
        let category = category_id
            .and_then(|cid| self.categories.get(&cid).map(|entry| entry.value().1.clone()));
        let story = StorySummary {
            id,
            org: org_id,
            title: title.to_string(),
            featured: false,
            summary: String::new(),
            video_id: None,
            audio_link: None,
            tags: None,
            category,
            created_on: Utc::now(),
        };
        self.stories.insert(id, story.clone());
        story
    }

    /// 直接写入用户（密码哈希由调用方生成）
    pub fn add_user(&self, username: &str, password_hash: &str, is_staff: bool) -> User {
        let id = self.next_id();
        let user = User {
            id,
            username: username.to_string(),
            email: username.to_string(),
            first_name: String::new(),
            last_name: String::new(),
            password_hash: password_hash.to_string(),
            is_staff,
            is_active: true,
            date_joined: Utc::now(),
        };
        self.usernames.insert(username.to_lowercase(), id);
        self.users.insert(id, user.clone());
        user
    }

    pub fn add_profile(&self, user_id: i64, contact_uuid: &str) {
        self.profiles.insert(
            user_id,
            UserProfile {
                user_id,
                contact_uuid: contact_uuid.to_string(),
                image: None,
                password_reset_code: String::new(),
                password_reset_expiry: None,
            },
        );
    }

    fn story_user_rows(&self, kind: StoryActionKind) -> Vec<StoryUserRow> {
        let mut rows: Vec<StoryUserRow> = self
            .actions
            .iter()
            .filter(|entry| entry.value().0 == kind)
            .map(|entry| entry.value().1.clone())
            .collect();
        rows.sort_by(|a, b| (b.created_on, b.id).cmp(&(a.created_on, a.id)));
        rows
    }

    fn check_story_user(&self, story_id: i64, user_id: i64) -> Result<()> {
        if !self.stories.contains_key(&story_id) {
            return Err(ApiError::invalid_pk("story", story_id));
        }
        if !self.users.contains_key(&user_id) {
            return Err(ApiError::invalid_pk("user", user_id));
        }
        Ok(())
    }

    fn insert_action(
        &self,
        kind: StoryActionKind,
        story_id: i64,
        user_id: i64,
        value: Option<i32>,
    ) -> StoryUserRow {
        let row = StoryUserRow {
            id: self.next_id(),
            story_id,
            user_id,
            value: kind.value_column().map(|_| value.unwrap_or(0)),
            created_on: Utc::now(),
        };
        self.actions.insert(row.id, (kind, row.clone()));
        row
    }

    fn action_row(&self, id: i64) -> Result<StoryUserRow> {
        self.actions
            .get(&id)
            .map(|entry| entry.value().1.clone())
            .ok_or_else(|| ApiError::Internal(format!("互动记录索引失效: {id}")))
    }

    fn check_badge_type(&self, badge_type: &NewBadgeType) -> Result<()> {
        if !self.orgs.contains_key(&badge_type.org_id) {
            return Err(ApiError::invalid_pk("org", badge_type.org_id));
        }
        if let Some(category) = badge_type.item_category {
            if !self.categories.contains_key(&category) {
                return Err(ApiError::invalid_pk("item_category", category));
            }
        }
        Ok(())
    }

    fn build_badge_type(id: i64, badge_type: &NewBadgeType) -> BadgeType {
        BadgeType {
            id,
            org_id: badge_type.org_id,
            title: badge_type.title.clone(),
            description: badge_type.description.clone(),
            image: badge_type.image.clone(),
            is_visible: badge_type.is_visible,
            item_type: badge_type.item_type,
            item_category: badge_type.item_category,
            item_count: badge_type.item_count,
        }
    }

    fn to_user_badge(&self, id: i64, record: &UserBadgeRecord) -> Option<UserBadge> {
        let badge_type = self.badge_types.get(&record.badge_type_id)?.value().clone();
        Some(UserBadge {
            id,
            user_id: record.user_id,
            badge_type,
            received_on: record.received_on,
        })
    }

    fn insert_user_badge(&self, user_id: i64, badge_type_id: i64) -> Result<Option<UserBadge>> {
        match self.user_badge_keys.entry((badge_type_id, user_id)) {
            Entry::Occupied(_) => Ok(None),
            Entry::Vacant(vacant) => {
                let id = self.next_id();
                let record = UserBadgeRecord {
                    user_id,
                    badge_type_id,
                    received_on: Utc::now(),
                };
                let badge = self.to_user_badge(id, &record).ok_or_else(|| {
                    ApiError::invalid_pk("badge_type", badge_type_id)
                })?;
                self.user_badges.insert(id, record);
                vacant.insert(id);
                Ok(Some(badge))
            }
        }
    }
}

#[async_trait]
impl StoryRepositoryTrait for MemoryStore {
    async fn get_story(&self, id: i64) -> Result<Option<StorySummary>> {
        Ok(self.stories.get(&id).map(|entry| entry.value().clone()))
    }

    async fn get_or_create_settings(&self, story_id: i64) -> Result<StorySettings> {
        Ok(self
            .settings
            .entry(story_id)
            .or_insert_with(|| StorySettings::new(story_id))
            .value()
            .clone())
    }

    async fn update_settings(
        &self,
        story_id: i64,
        update: &StorySettingsUpdate,
    ) -> Result<StorySettings> {
        let mut entry = self
            .settings
            .entry(story_id)
            .or_insert_with(|| StorySettings::new(story_id));
        if let Some(points) = update.reward_points {
            entry.reward_points = points;
        }
        if let Some(display) = update.display_rating {
            entry.display_rating = display;
        }
        Ok(entry.value().clone())
    }

    async fn refresh_cached_rating(&self, story_id: i64) -> Result<f64> {
        let scores: Vec<i32> = self
            .story_user_rows(StoryActionKind::Rating)
            .into_iter()
            .filter(|row| row.story_id == story_id)
            .filter_map(|row| row.value)
            .collect();

        let rating = if scores.is_empty() {
            0.0
        } else {
            let avg = scores.iter().sum::<i32>() as f64 / scores.len() as f64;
            (avg * 100.0).round() / 100.0
        };

        self.settings
            .entry(story_id)
            .or_insert_with(|| StorySettings::new(story_id))
            .cached_rating = rating;
        Ok(rating)
    }

    async fn count_reads_in_org(&self, user_id: i64, org_id: i64) -> Result<i64> {
        let count = self
            .story_user_rows(StoryActionKind::Read)
            .into_iter()
            .filter(|row| row.user_id == user_id)
            .filter(|row| {
                self.stories
                    .get(&row.story_id)
                    .is_some_and(|story| story.org == org_id)
            })
            .count();
        Ok(count as i64)
    }

    async fn count_reads_in_category(&self, user_id: i64, category_id: i64) -> Result<i64> {
        let count = self
            .story_user_rows(StoryActionKind::Read)
            .into_iter()
            .filter(|row| row.user_id == user_id)
            .filter(|row| {
                self.stories
                    .get(&row.story_id)
                    .is_some_and(|story| story.category_id() == Some(category_id))
            })
            .count();
        Ok(count as i64)
    }
}

#[async_trait]
impl<E: StoryUserEntity> StoryActionRepositoryTrait<E> for MemoryStore {
    async fn list(
        &self,
        filter: StoryUserFilter,
        page: Option<PageRequest>,
    ) -> Result<(Vec<E>, i64)> {
        let rows: Vec<StoryUserRow> = self
            .story_user_rows(E::KIND)
            .into_iter()
            .filter(|row| filter.user.is_none_or(|user| row.user_id == user))
            .filter(|row| filter.story.is_none_or(|story| row.story_id == story))
            .collect();
        let total = rows.len() as i64;

        let items = apply_page(rows, page).into_iter().map(E::from_row).collect();
        Ok((items, total))
    }

    async fn get(&self, id: i64) -> Result<Option<E>> {
        Ok(self
            .actions
            .get(&id)
            .filter(|entry| entry.value().0 == E::KIND)
            .map(|entry| E::from_row(entry.value().1.clone())))
    }

    async fn find(&self, story_id: i64, user_id: i64) -> Result<Option<E>> {
        let id = self
            .action_keys
            .get(&(E::KIND, story_id, user_id))
            .map(|entry| *entry.value());
        match id {
            Some(id) => Ok(Some(E::from_row(self.action_row(id)?))),
            None => Ok(None),
        }
    }

    async fn create(&self, story_id: i64, user_id: i64, value: Option<i32>) -> Result<E> {
        self.check_story_user(story_id, user_id)?;

        match self.action_keys.entry((E::KIND, story_id, user_id)) {
            Entry::Occupied(_) => Err(ApiError::unique_set("story, user")),
            Entry::Vacant(vacant) => {
                let row = self.insert_action(E::KIND, story_id, user_id, value);
                vacant.insert(row.id);
                Ok(E::from_row(row))
            }
        }
    }

    async fn get_or_create(
        &self,
        story_id: i64,
        user_id: i64,
        value: Option<i32>,
    ) -> Result<(E, bool)> {
        self.check_story_user(story_id, user_id)?;

        let existing = match self.action_keys.entry((E::KIND, story_id, user_id)) {
            Entry::Occupied(occupied) => *occupied.get(),
            Entry::Vacant(vacant) => {
                let row = self.insert_action(E::KIND, story_id, user_id, value);
                vacant.insert(row.id);
                return Ok((E::from_row(row), true));
            }
        };

        Ok((E::from_row(self.action_row(existing)?), false))
    }

    async fn upsert(&self, story_id: i64, user_id: i64, value: Option<i32>) -> Result<(E, bool)> {
        let (entity, created) =
            StoryActionRepositoryTrait::<E>::get_or_create(self, story_id, user_id, value).await?;
        if created || E::KIND.value_column().is_none() {
            return Ok((entity, created));
        }

        let mut entry = self
            .actions
            .get_mut(&entity.id())
            .ok_or_else(|| ApiError::Internal(format!("互动记录索引失效: {}", entity.id())))?;
        entry.1.value = Some(value.unwrap_or(0));
        Ok((E::from_row(entry.1.clone()), false))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let removed = self
            .actions
            .remove_if(&id, |_, (kind, _)| *kind == E::KIND);
        match removed {
            Some((_, (kind, row))) => {
                self.action_keys.remove(&(kind, row.story_id, row.user_id));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_for(&self, story_id: i64, user_id: i64) -> Result<u64> {
        match self.action_keys.remove(&(E::KIND, story_id, user_id)) {
            Some((_, id)) => {
                self.actions.remove(&id);
                Ok(1)
            }
            None => Ok(0),
        }
    }
}

#[async_trait]
impl UserRepositoryTrait for MemoryStore {
    async fn create_user(&self, new_user: &NewUser) -> Result<User> {
        match self.usernames.entry(new_user.username.to_lowercase()) {
            Entry::Occupied(_) => Err(ApiError::field("email", "Email address already used")),
            Entry::Vacant(vacant) => {
                let user = User {
                    id: self.next_id(),
                    username: new_user.username.clone(),
                    email: new_user.email.clone(),
                    first_name: new_user.first_name.clone(),
                    last_name: new_user.last_name.clone(),
                    password_hash: new_user.password_hash.clone(),
                    is_staff: false,
                    is_active: true,
                    date_joined: Utc::now(),
                };
                self.users.insert(user.id, user.clone());
                vacant.insert(user.id);
                Ok(user)
            }
        }
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>> {
        Ok(self.users.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let id = self
            .usernames
            .get(&username.to_lowercase())
            .map(|entry| *entry.value());
        Ok(id.and_then(|id| self.users.get(&id).map(|entry| entry.value().clone())))
    }

    async fn get_profile(&self, user_id: i64) -> Result<Option<UserProfile>> {
        Ok(self.profiles.get(&user_id).map(|entry| entry.value().clone()))
    }

    async fn set_password(&self, user_id: i64, password_hash: &str) -> Result<()> {
        let mut user = self
            .users
            .get_mut(&user_id)
            .ok_or(ApiError::UserNotFound(user_id))?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }
}

#[async_trait]
impl BadgeRepositoryTrait for MemoryStore {
    async fn list_badge_types(
        &self,
        org: Option<i64>,
        page: Option<PageRequest>,
    ) -> Result<(Vec<BadgeType>, i64)> {
        let mut items: Vec<BadgeType> = self
            .badge_types
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|bt| org.is_none_or(|org| bt.org_id == org))
            .collect();
        items.sort_by(|a, b| b.id.cmp(&a.id));
        let total = items.len() as i64;
        Ok((apply_page(items, page), total))
    }

    async fn get_badge_type(&self, id: i64) -> Result<Option<BadgeType>> {
        Ok(self.badge_types.get(&id).map(|entry| entry.value().clone()))
    }

    async fn create_badge_type(&self, badge_type: &NewBadgeType) -> Result<BadgeType> {
        self.check_badge_type(badge_type)?;

        match self
            .badge_titles
            .entry((badge_type.org_id, badge_type.title.clone()))
        {
            Entry::Occupied(_) => Err(ApiError::unique_set("org, title")),
            Entry::Vacant(vacant) => {
                let created = Self::build_badge_type(self.next_id(), badge_type);
                self.badge_types.insert(created.id, created.clone());
                vacant.insert(created.id);
                Ok(created)
            }
        }
    }

    async fn update_badge_type(
        &self,
        id: i64,
        badge_type: &NewBadgeType,
    ) -> Result<Option<BadgeType>> {
        let Some(current) = self.badge_types.get(&id).map(|entry| entry.value().clone()) else {
            return Ok(None);
        };
        self.check_badge_type(badge_type)?;

        let old_key = (current.org_id, current.title.clone());
        let new_key = (badge_type.org_id, badge_type.title.clone());
        if old_key != new_key {
            match self.badge_titles.entry(new_key) {
                Entry::Occupied(_) => return Err(ApiError::unique_set("org, title")),
                Entry::Vacant(vacant) => {
                    vacant.insert(id);
                }
            }
            self.badge_titles.remove(&old_key);
        }

        let updated = Self::build_badge_type(id, badge_type);
        self.badge_types.insert(id, updated.clone());
        Ok(Some(updated))
    }

    async fn delete_badge_type(&self, id: i64) -> Result<bool> {
        let Some((_, removed)) = self.badge_types.remove(&id) else {
            return Ok(false);
        };
        self.badge_titles.remove(&(removed.org_id, removed.title));
        self.user_badges.retain(|_, record| record.badge_type_id != id);
        self.user_badge_keys.retain(|(badge_type_id, _), _| *badge_type_id != id);
        Ok(true)
    }

    async fn list_unearned_badge_types(
        &self,
        user_id: i64,
        org_id: i64,
    ) -> Result<Vec<BadgeType>> {
        let mut items: Vec<BadgeType> = self
            .badge_types
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|bt| bt.org_id == org_id && bt.is_visible)
            .filter(|bt| !self.user_badge_keys.contains_key(&(bt.id, user_id)))
            .collect();
        items.sort_by_key(|bt| bt.id);
        Ok(items)
    }

    async fn award_badge(&self, user_id: i64, badge_type_id: i64) -> Result<Option<UserBadge>> {
        self.insert_user_badge(user_id, badge_type_id)
    }

    async fn list_user_badges(
        &self,
        filter: UserBadgeFilter,
        page: Option<PageRequest>,
    ) -> Result<(Vec<UserBadge>, i64)> {
        let mut items: Vec<UserBadge> = self
            .user_badges
            .iter()
            .filter_map(|entry| self.to_user_badge(*entry.key(), entry.value()))
            .filter(|ub| filter.user.is_none_or(|user| ub.user_id == user))
            .filter(|ub| filter.badge_type.is_none_or(|bt| ub.badge_type.id == bt))
            .filter(|ub| filter.org.is_none_or(|org| ub.badge_type.org_id == org))
            .collect();
        items.sort_by(|a, b| (b.received_on, b.id).cmp(&(a.received_on, a.id)));
        let total = items.len() as i64;
        Ok((apply_page(items, page), total))
    }

    async fn get_user_badge(&self, id: i64) -> Result<Option<UserBadge>> {
        let record = self.user_badges.get(&id).map(|entry| entry.value().clone());
        Ok(record.and_then(|record| self.to_user_badge(id, &record)))
    }

    async fn create_user_badge(&self, user_id: i64, badge_type_id: i64) -> Result<UserBadge> {
        if !self.badge_types.contains_key(&badge_type_id) {
            return Err(ApiError::invalid_pk("badge_type", badge_type_id));
        }
        if !self.users.contains_key(&user_id) {
            return Err(ApiError::invalid_pk("user", user_id));
        }

        self.insert_user_badge(user_id, badge_type_id)?
            .ok_or_else(|| ApiError::unique_set("badge_type, user"))
    }

    async fn delete_user_badge(&self, id: i64) -> Result<bool> {
        match self.user_badges.remove(&id) {
            Some((_, record)) => {
                self.user_badge_keys
                    .remove(&(record.badge_type_id, record.user_id));
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BadgeItemType, StoryBookmark, StoryRating, StoryRead};

    fn seeded() -> (MemoryStore, StorySummary, User) {
        let store = MemoryStore::new();
        let org = store.add_org("Nigeria");
        let story = store.add_story(org, None, "Clean water");
        let user = store.add_user("reader@ureport.in", "hash", false);
        (store, story, user)
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let (store, story, user) = seeded();

        let (first, created): (StoryBookmark, bool) =
            store.get_or_create(story.id, user.id, None).await.unwrap();
        assert!(created);

        let (second, created): (StoryBookmark, bool) =
            store.get_or_create(story.id, user.id, None).await.unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_create_rejects_duplicates_and_unknown_story() {
        let (store, story, user) = seeded();

        let _: StoryRead = store.create(story.id, user.id, None).await.unwrap();
        let dup: Result<StoryRead> = store.create(story.id, user.id, None).await;
        assert!(dup.unwrap_err().field_errors().unwrap().contains_key("non_field_errors"));

        let missing: Result<StoryRead> = store.create(9999, user.id, None).await;
        assert!(missing.unwrap_err().field_errors().unwrap().contains_key("story"));
    }

    #[tokio::test]
    async fn test_upsert_overwrites_score_and_refreshes_rating() {
        let (store, story, user) = seeded();
        let other = store.add_user("other@ureport.in", "hash", false);

        let (_, created): (StoryRating, bool) =
            store.upsert(story.id, user.id, Some(2)).await.unwrap();
        assert!(created);
        let (rating, created): (StoryRating, bool) =
            store.upsert(story.id, user.id, Some(5)).await.unwrap();
        assert!(!created);
        assert_eq!(rating.score, 5);

        let _: (StoryRating, bool) = store.upsert(story.id, other.id, Some(4)).await.unwrap();
        let avg = store.refresh_cached_rating(story.id).await.unwrap();
        assert_eq!(avg, 4.5);
        assert_eq!(store.get_or_create_settings(story.id).await.unwrap().cached_rating, 4.5);
    }

    #[tokio::test]
    async fn test_delete_for_frees_the_pair() {
        let (store, story, user) = seeded();

        let _: StoryBookmark = store.create(story.id, user.id, None).await.unwrap();
        let removed =
            StoryActionRepositoryTrait::<StoryBookmark>::delete_for(&store, story.id, user.id)
                .await
                .unwrap();
        assert_eq!(removed, 1);

        let again: StoryBookmark = store.create(story.id, user.id, None).await.unwrap();
        assert_eq!(again.story_id, story.id);
    }

    #[tokio::test]
    async fn test_badge_title_unique_per_org() {
        let (store, _, _) = seeded();
        let org = store.add_org("Kenya");
        let new = NewBadgeType {
            org_id: org,
            title: "Reader".into(),
            description: String::new(),
            image: None,
            is_visible: true,
            item_type: BadgeItemType::StoryRead,
            item_category: None,
            item_count: 1,
        };

        store.create_badge_type(&new).await.unwrap();
        let dup = store.create_badge_type(&new).await.unwrap_err();
        assert_eq!(
            dup.field_errors().unwrap()["non_field_errors"],
            vec!["The fields org, title must make a unique set."]
        );
    }
}
