//! 应用状态定义
//!
//! 包含 Axum 路由共享的服务实例与配置

use std::sync::Arc;

use ureport_shared::cache::Cache;
use ureport_shared::config::{ApiConfig, AuthConfig};
use ureport_shared::database::Database;

use crate::auth::{JwtConfig, JwtManager};
#[cfg(any(test, feature = "testing"))]
use crate::repository::MemoryStore;
use crate::repository::{
    BadgeRepositoryTrait, PgBadgeRepository, PgStoryRepository, PgUserRepository,
    StoryActionRepos, StoryRepositoryTrait, UserRepositoryTrait,
};
use crate::service::{BadgeAwarder, BadgeService, EngagementService, StoryService, UserService};

/// 服务依赖的全部仓储
#[derive(Clone)]
pub struct Repositories {
    pub stories: Arc<dyn StoryRepositoryTrait>,
    pub actions: StoryActionRepos,
    pub users: Arc<dyn UserRepositoryTrait>,
    pub badges: Arc<dyn BadgeRepositoryTrait>,
}

impl Repositories {
    pub fn postgres(database: &Database) -> Self {
        let pool = database.pool();
        Self {
            stories: Arc::new(PgStoryRepository::new(pool.clone())),
            actions: StoryActionRepos::postgres(pool),
            users: Arc::new(PgUserRepository::new(pool.clone())),
            badges: Arc::new(PgBadgeRepository::new(pool.clone())),
        }
    }

    #[cfg(any(test, feature = "testing"))]
    pub fn in_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            stories: store.clone(),
            actions: StoryActionRepos::from_shared(store.clone()),
            users: store.clone(),
            badges: store,
        }
    }
}

/// 就绪检查依赖
#[derive(Clone, Default)]
pub struct Readiness {
    pub database: Option<Database>,
    pub cache: Option<Arc<Cache>>,
}

/// Axum 应用共享状态
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<UserService>,
    pub stories: Arc<StoryService>,
    pub engagement: Arc<EngagementService>,
    pub badges: Arc<BadgeService>,
    pub jwt: Arc<JwtManager>,
    pub api: Arc<ApiConfig>,
    pub readiness: Readiness,
}

impl AppState {
    pub fn new(
        repos: Repositories,
        cache: Option<Arc<Cache>>,
        auth: &AuthConfig,
        api: ApiConfig,
    ) -> Self {
        let jwt = Arc::new(JwtManager::new(JwtConfig::from(auth)));
        let stories = Arc::new(StoryService::new(repos.stories.clone(), cache.clone()));
        let awarder = BadgeAwarder::new(repos.stories.clone(), repos.badges.clone());

        Self {
            users: Arc::new(UserService::new(
                repos.users.clone(),
                jwt.clone(),
                auth.password_hash_cost,
            )),
            engagement: Arc::new(EngagementService::new(
                stories.clone(),
                repos.actions,
                repos.users,
                awarder,
            )),
            stories,
            badges: Arc::new(BadgeService::new(repos.badges)),
            jwt,
            api: Arc::new(api),
            readiness: Readiness {
                database: None,
                cache,
            },
        }
    }

    pub fn with_database(mut self, database: Database) -> Self {
        self.readiness.database = Some(database);
        self
    }
}
