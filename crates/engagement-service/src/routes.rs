//! 路由配置模块
//!
//! 定义所有 REST API 端点的路由映射，业务接口挂载在 `/api/v1` 下

use axum::{
    Router,
    routing::{get, post},
};

use crate::{
    handlers::{self, story_action},
    models::{StoryBookmark, StoryRating, StoryRead, StoryReward},
    repository::StoryActionEntity,
    state::AppState,
};

/// 构建用户与认证路由
fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/", post(handlers::user::create_user))
        .route("/users/user/{user_id}/", get(handlers::user::get_user))
        .route(
            "/users/user/{user_id}/password/",
            post(handlers::user::change_password),
        )
        .route("/auth/login/", post(handlers::auth::login))
        .route("/auth/me/", get(handlers::auth::me))
}

/// 构建故事设置路由
fn story_settings_routes() -> Router<AppState> {
    Router::new().route(
        "/storysettings/story/{story_id}/",
        get(handlers::story_settings::get_story_settings)
            .patch(handlers::story_settings::update_story_settings),
    )
}

/// 某类互动资源的管理端集合路由
fn story_action_admin_routes<E: StoryActionEntity>(resource: &str) -> Router<AppState> {
    Router::new()
        .route(
            &format!("/{resource}/"),
            get(story_action::list::<E>).post(story_action::create::<E>),
        )
        .route(
            &format!("/{resource}/{{id}}/"),
            get(story_action::retrieve::<E>).delete(story_action::destroy::<E>),
        )
}

/// 构建故事互动路由
///
/// 收藏、评分、阅读、奖励各有一组管理端路由与一条用户维度路由
fn story_action_routes() -> Router<AppState> {
    Router::new()
        .merge(story_action_admin_routes::<StoryBookmark>("storybookmarks"))
        .merge(story_action_admin_routes::<StoryRating>("storyratings"))
        .merge(story_action_admin_routes::<StoryRead>("storyreads"))
        .merge(story_action_admin_routes::<StoryReward>("storyrewards"))
        .route(
            "/storybookmarks/user/{user_id}/",
            get(story_action::list_for_user::<StoryBookmark>)
                .post(story_action::create_user_bookmark)
                .delete(story_action::delete_user_bookmark),
        )
        .route(
            "/storyratings/user/{user_id}/",
            get(story_action::list_for_user::<StoryRating>)
                .post(story_action::create_user_rating),
        )
        .route(
            "/storyreads/user/{user_id}/",
            get(story_action::list_for_user::<StoryRead>).post(story_action::create_user_read),
        )
        .route(
            "/storyrewards/user/{user_id}/",
            get(story_action::list_for_user::<StoryReward>),
        )
}

/// 构建徽章路由
fn badge_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/badgetypes/",
            get(handlers::badge_type::list_badge_types)
                .post(handlers::badge_type::create_badge_type),
        )
        .route(
            "/badgetypes/{id}/",
            get(handlers::badge_type::get_badge_type)
                .put(handlers::badge_type::update_badge_type)
                .delete(handlers::badge_type::delete_badge_type),
        )
        .route(
            "/userbadges/",
            get(handlers::user_badge::list_user_badges)
                .post(handlers::user_badge::create_user_badge),
        )
        .route(
            "/userbadges/{id}/",
            get(handlers::user_badge::get_user_badge)
                .delete(handlers::user_badge::delete_user_badge),
        )
        .route(
            "/userbadges/user/{user_id}/",
            get(handlers::user_badge::list_badges_for_user),
        )
}

/// `/api/v1` 下的全部业务路由
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(user_routes())
        .merge(story_settings_routes())
        .merge(story_action_routes())
        .merge(badge_routes())
}

/// 构建完整路由，包含健康检查
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/api/v1", api_routes())
        .with_state(state)
}
