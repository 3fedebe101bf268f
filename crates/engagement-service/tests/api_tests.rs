//! REST API 集成测试
//!
//! 路由运行在内存存储之上，通过 `tower::ServiceExt::oneshot` 发起请求。

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use fake::{Fake, faker::internet::en::SafeEmail};
use serde_json::{Value, json};
use tower::ServiceExt;
use ureport_engagement::{
    AppState, Repositories, auth::hash_password, create_router, repository::MemoryStore,
};
use ureport_shared::config::{ApiConfig, AuthConfig};

const PASSWORD: &str = "Passw0rd!";

struct TestApp {
    router: Router,
    state: AppState,
    store: Arc<MemoryStore>,
}

impl TestApp {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let auth = AuthConfig {
            password_hash_cost: 4,
            ..Default::default()
        };
        let api = ApiConfig {
            default_page_size: 2,
            ..Default::default()
        };
        let state = AppState::new(Repositories::in_memory(store.clone()), None, &auth, api);

        Self {
            router: create_router(state.clone()),
            state,
            store,
        }
    }

    fn user(&self, username: &str, is_staff: bool) -> (i64, String) {
        let hash = hash_password(PASSWORD, 4).unwrap();
        let user = self.store.add_user(username, &hash, is_staff);
        let token = self
            .state
            .jwt
            .generate_token(user.id, &user.username, user.is_staff)
            .unwrap();
        (user.id, token)
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, _) = app.send(Method::GET, "/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_requires_token() {
    let app = TestApp::new();
    let (status, body) = app
        .send(Method::GET, "/api/v1/storybookmarks/user/1/", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "NOT_AUTHENTICATED");

    let (status, _) = app
        .send(
            Method::GET,
            "/api/v1/storybookmarks/user/1/",
            Some("not-a-token"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_user_cannot_touch_another_user() {
    let app = TestApp::new();
    let (_, token) = app.user("alice@ureport.in", false);
    let (bob, _) = app.user("bob@ureport.in", false);

    let (status, body) = app
        .send(
            Method::GET,
            &format!("/api/v1/storybookmarks/user/{bob}/"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "PERMISSION_DENIED");
}

#[tokio::test]
async fn test_bookmark_lifecycle() {
    let app = TestApp::new();
    let org = app.store.add_org("Nigeria");
    let story = app.store.add_story(org, None, "Clean water");
    let (user, token) = app.user("reader@ureport.in", false);
    let uri = format!("/api/v1/storybookmarks/user/{user}/");

    let (status, body) = app
        .send(Method::POST, &uri, Some(&token), Some(json!({ "story": story.id })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"], user);
    assert_eq!(body["story"]["id"], story.id);
    assert_eq!(body["story"]["title"], "Clean water");

    let (status, second) = app
        .send(Method::POST, &uri, Some(&token), Some(json!({ "story": story.id })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["id"], body["id"]);

    let (status, list) = app.send(Method::GET, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, removed) = app
        .send(Method::DELETE, &uri, Some(&token), Some(json!({ "story": story.id })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(removed["count"], 1);

    let (_, removed) = app
        .send(Method::DELETE, &uri, Some(&token), Some(json!({})))
        .await;
    assert_eq!(removed["count"], 0);
}

#[tokio::test]
async fn test_bookmark_unknown_story() {
    let app = TestApp::new();
    let (user, token) = app.user("reader@ureport.in", false);

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/v1/storybookmarks/user/{user}/"),
            Some(&token),
            Some(json!({ "story": 999 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["errors"]["story"][0],
        "Invalid pk \"999\" - object does not exist."
    );
}

#[tokio::test]
async fn test_rating_updates_cached_rating() {
    let app = TestApp::new();
    let org = app.store.add_org("Uganda");
    let story = app.store.add_story(org, None, "Schools");
    let (alice, alice_token) = app.user("alice@ureport.in", false);
    let (bob, bob_token) = app.user("bob@ureport.in", false);

    let (status, _) = app
        .send(
            Method::POST,
            &format!("/api/v1/storyratings/user/{alice}/"),
            Some(&alice_token),
            Some(json!({ "story": story.id, "score": 4 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/v1/storyratings/user/{bob}/"),
            Some(&bob_token),
            Some(json!({ "story": story.id, "score": 5 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["score"], 5);

    let (status, settings) = app
        .send(
            Method::GET,
            &format!("/api/v1/storysettings/story/{}/", story.id),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(settings["rating"], 4.5);
    assert_eq!(settings["display_rating"], true);

    // 再次评分覆盖原分数
    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/v1/storyratings/user/{bob}/"),
            Some(&bob_token),
            Some(json!({ "story": story.id, "score": 2 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["score"], 2);

    let (_, settings) = app
        .send(
            Method::GET,
            &format!("/api/v1/storysettings/story/{}/", story.id),
            None,
            None,
        )
        .await;
    assert_eq!(settings["rating"], 3.0);
}

#[tokio::test]
async fn test_rating_score_validation() {
    let app = TestApp::new();
    let org = app.store.add_org("Kenya");
    let story = app.store.add_story(org, None, "Health");
    let (user, token) = app.user("reader@ureport.in", false);
    let uri = format!("/api/v1/storyratings/user/{user}/");

    let cases = [
        (json!({ "story": story.id, "score": 0 }), "Ensure this value is greater than or equal to 1."),
        (json!({ "story": story.id, "score": 6 }), "Ensure this value is less than or equal to 5."),
        (json!({ "story": story.id }), "This field may not be null."),
    ];

    for (body, expected) in cases {
        let (status, response) = app.send(Method::POST, &uri, Some(&token), Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["errors"]["score"][0], expected);
    }
}

#[tokio::test]
async fn test_read_awards_badge_at_threshold() {
    let app = TestApp::new();
    let org = app.store.add_org("Zambia");
    let first = app.store.add_story(org, None, "First");
    let second = app.store.add_story(org, None, "Second");
    let (_, staff_token) = app.user("admin@ureport.in", true);
    let (user, token) = app.user("reader@ureport.in", false);

    let (status, badge_type) = app
        .send(
            Method::POST,
            "/api/v1/badgetypes/",
            Some(&staff_token),
            Some(json!({ "org": org, "title": "Bookworm", "item_count": 2 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(badge_type["item_type"], "story_read");

    let uri = format!("/api/v1/storyreads/user/{user}/");
    let (status, awarded) = app
        .send(Method::POST, &uri, Some(&token), Some(json!({ "story": first.id })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(awarded, json!([]));

    let (status, awarded) = app
        .send(Method::POST, &uri, Some(&token), Some(json!({ "story": second.id })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(awarded.as_array().unwrap().len(), 1);
    assert_eq!(awarded[0]["badge_type"]["title"], "Bookworm");

    // 重复阅读不再发放
    let (status, awarded) = app
        .send(Method::POST, &uri, Some(&token), Some(json!({ "story": second.id })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(awarded, json!([]));

    let (status, badges) = app
        .send(
            Method::GET,
            &format!("/api/v1/userbadges/user/{user}/?org={org}"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(badges.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_first_read_grants_reward_points() {
    let app = TestApp::new();
    let org = app.store.add_org("Liberia");
    let story = app.store.add_story(org, None, "Elections");
    let (_, staff_token) = app.user("admin@ureport.in", true);
    let (user, token) = app.user("reader@ureport.in", false);

    let (status, _) = app
        .send(
            Method::PATCH,
            &format!("/api/v1/storysettings/story/{}/", story.id),
            Some(&staff_token),
            Some(json!({ "reward_points": 15 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    app.send(
        Method::POST,
        &format!("/api/v1/storyreads/user/{user}/"),
        Some(&token),
        Some(json!({ "story": story.id })),
    )
    .await;

    let (status, rewards) = app
        .send(
            Method::GET,
            &format!("/api/v1/storyrewards/user/{user}/"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rewards[0]["points"], 15);
    assert_eq!(rewards[0]["story"]["id"], story.id);
}

#[tokio::test]
async fn test_settings_patch_requires_staff() {
    let app = TestApp::new();
    let org = app.store.add_org("Mali");
    let story = app.store.add_story(org, None, "Farming");
    let (_, token) = app.user("reader@ureport.in", false);

    let (status, _) = app
        .send(
            Method::PATCH,
            &format!("/api/v1/storysettings/story/{}/", story.id),
            Some(&token),
            Some(json!({ "display_rating": false })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(Method::GET, "/api/v1/storysettings/story/404/", None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_collection_duplicate_and_pagination() {
    let app = TestApp::new();
    let org = app.store.add_org("Ghana");
    let stories: Vec<_> = (0..3)
        .map(|i| app.store.add_story(org, None, &format!("Story {i}")))
        .collect();
    let (staff, staff_token) = app.user("admin@ureport.in", true);

    for story in &stories {
        let (status, body) = app
            .send(
                Method::POST,
                "/api/v1/storybookmarks/",
                Some(&staff_token),
                Some(json!({ "user": staff, "story": story.id })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["story"], story.id);
    }

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/storybookmarks/",
            Some(&staff_token),
            Some(json!({ "user": staff, "story": stories[0].id })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["errors"]["non_field_errors"][0],
        "The fields story, user must make a unique set."
    );

    let (status, page) = app
        .send(Method::GET, "/api/v1/storybookmarks/", Some(&staff_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["count"], 3);
    assert_eq!(page["results"].as_array().unwrap().len(), 2);
    assert_eq!(page["next"], "/api/v1/storybookmarks/?page=2");
    assert_eq!(page["previous"], Value::Null);

    let (status, _) = app
        .send(
            Method::GET,
            "/api/v1/storybookmarks/?page=5",
            Some(&staff_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, token) = app.user("reader@ureport.in", false);
    let (status, _) = app
        .send(Method::GET, "/api/v1/storybookmarks/", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_badge_type_rules() {
    let app = TestApp::new();
    let org = app.store.add_org("Malawi");
    let (_, staff_token) = app.user("admin@ureport.in", true);

    let payload = json!({ "org": org, "title": "Explorer" });
    let (status, _) = app
        .send(Method::POST, "/api/v1/badgetypes/", Some(&staff_token), Some(payload.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .send(Method::POST, "/api/v1/badgetypes/", Some(&staff_token), Some(payload))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["errors"]["non_field_errors"][0],
        "The fields org, title must make a unique set."
    );

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/badgetypes/",
            Some(&staff_token),
            Some(json!({ "org": org, "title": "Topic fan", "item_type": "category_read" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["item_category"].is_array());
}

#[tokio::test]
async fn test_register_login_and_change_password() {
    let app = TestApp::new();
    let email: String = SafeEmail().fake();

    let (status, created) = app
        .send(
            Method::POST,
            "/api/v1/users/",
            None,
            Some(json!({
                "full_name": "Ada Lovelace",
                "email": email,
                "password": PASSWORD,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let user_id = created["id"].as_i64().unwrap();
    let token = created["token"].as_str().unwrap().to_string();

    let (status, detail) = app
        .send(
            Method::GET,
            &format!("/api/v1/users/user/{user_id}/"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["first_name"], "Ada");
    assert_eq!(detail["last_name"], "Lovelace");

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/users/",
            None,
            Some(json!({
                "full_name": "Ada Again",
                "email": email.to_uppercase(),
                "password": PASSWORD,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"]["email"][0], "Email address already used");

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/v1/users/user/{user_id}/password/"),
            Some(&token),
            Some(json!({
                "current_password": PASSWORD,
                "new_password": "n3w-secret",
                "new_password2": "different",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["errors"]["non_field_errors"][0],
        "The new passwords do not match"
    );

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/v1/users/user/{user_id}/password/"),
            Some(&token),
            Some(json!({
                "current_password": PASSWORD,
                "new_password": "n3w-secret",
                "new_password2": "n3w-secret",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({}));

    let (status, login) = app
        .send(
            Method::POST,
            "/api/v1/auth/login/",
            None,
            Some(json!({ "username": email.to_uppercase(), "password": "n3w-secret" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(login["id"], user_id);

    let (status, me) = app
        .send(
            Method::GET,
            "/api/v1/auth/me/",
            login["token"].as_str(),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], user_id);
}

#[tokio::test]
async fn test_malformed_body_is_field_error() {
    let app = TestApp::new();
    let org = app.store.add_org("Sierra Leone");
    let story = app.store.add_story(org, None, "Roads");
    let (user, token) = app.user("reader@ureport.in", false);

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/v1/storyratings/user/{user}/"),
            Some(&token),
            Some(json!({ "story": story.id, "score": "abc" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["errors"]["score"].is_array());

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/v1/storybookmarks/user/{user}/"),
            Some(&token),
            Some(json!({ "story": "x" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["story"].is_array());
}

#[tokio::test]
async fn test_bookmark_delete_without_body() {
    let app = TestApp::new();
    let (user, token) = app.user("reader@ureport.in", false);

    let (status, body) = app
        .send(
            Method::DELETE,
            &format!("/api/v1/storybookmarks/user/{user}/"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "count": 0 }));
}

#[tokio::test]
async fn test_non_json_body_is_rejected() {
    let app = TestApp::new();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/auth/login/")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("username=a&password=b"))
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn test_huge_page_number_is_not_found() {
    let app = TestApp::new();
    let (_, staff_token) = app.user("admin@ureport.in", true);

    let (status, body) = app
        .send(
            Method::GET,
            &format!("/api/v1/storybookmarks/?page={}", i64::MAX),
            Some(&staff_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_register_rejects_overlong_email() {
    let app = TestApp::new();

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/users/",
            None,
            Some(json!({
                "full_name": "Long Mail",
                "email": format!("{}@ureport.in", "a".repeat(150)),
                "password": PASSWORD,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["errors"]["email"][0],
        "Ensure this field has no more than 150 characters."
    );
}

#[tokio::test]
async fn test_category_read_badge_counts_only_matching_reads() {
    let app = TestApp::new();
    let org = app.store.add_org("Nigeria");
    let other_org = app.store.add_org("Ghana");
    let sport = app.store.add_category(org, "Sport");
    let health = app.store.add_category(org, "Health");
    let other_sport = app.store.add_category(other_org, "Sport");

    let first_sport = app.store.add_story(org, Some(sport), "Football");
    let second_sport = app.store.add_story(org, Some(sport), "Athletics");
    let health_story = app.store.add_story(org, Some(health), "Clinics");
    let foreign_story = app.store.add_story(other_org, Some(other_sport), "Boxing");

    let (_, staff_token) = app.user("admin@ureport.in", true);
    let (user, token) = app.user("reader@ureport.in", false);

    for payload in [
        json!({
            "org": org,
            "title": "Sport fan",
            "item_type": "category_read",
            "item_category": sport,
            "item_count": 2,
        }),
        json!({ "org": org, "title": "Three stories", "item_count": 3 }),
    ] {
        let (status, _) = app
            .send(Method::POST, "/api/v1/badgetypes/", Some(&staff_token), Some(payload))
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let uri = format!("/api/v1/storyreads/user/{user}/");
    let read = |story_id: i64| {
        let app = &app;
        let uri = uri.clone();
        let token = token.clone();
        async move {
            let (status, awarded) = app
                .send(Method::POST, &uri, Some(&token), Some(json!({ "story": story_id })))
                .await;
            assert_eq!(status, StatusCode::CREATED);
            awarded
        }
    };

    // 其他分类与其他组织的阅读都不计入
    assert_eq!(read(health_story.id).await, json!([]));
    assert_eq!(read(foreign_story.id).await, json!([]));
    assert_eq!(read(first_sport.id).await, json!([]));

    let awarded = read(second_sport.id).await;
    let mut titles: Vec<&str> = awarded
        .as_array()
        .unwrap()
        .iter()
        .map(|badge| badge["badge_type"]["title"].as_str().unwrap())
        .collect();
    titles.sort_unstable();
    assert_eq!(titles, vec!["Sport fan", "Three stories"]);
}
