/// Integration tests for the user endpoints
///
/// Requires PostgreSQL (`DATABASE_URL`) and Redis (`REDIS_URL`).

mod common;

use axum::http::{Method, StatusCode};
use common::{unique_email, unique_username, TestContext};
use photoshare_shared::models::user::{Role, User};
use serde_json::json;

#[tokio::test]
#[ignore] // Requires PostgreSQL and Redis
async fn test_me() {
    let ctx = TestContext::new().await.unwrap();

    let (status, body) = ctx
        .json(Method::GET, "/api/users/me", Some(&ctx.user.access_token), None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], ctx.user.id().to_string());
    assert_eq!(body["email"], ctx.user.user.email);
    assert_eq!(body["role"], "user");
    assert!(body.get("password_hash").is_none());
    assert!(body.get("refresh_token").is_none());

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore] // Requires PostgreSQL and Redis
async fn test_edit_profile() {
    let ctx = TestContext::new().await.unwrap();
    let token = ctx.user.access_token.as_str();
    let new_name = unique_username();

    // Blank email keeps the current one
    let (status, body) = ctx
        .json(
            Method::PUT,
            "/api/users/edit",
            Some(token),
            Some(json!({ "username": new_name, "email": "" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["username"], new_name);
    assert_eq!(body["email"], ctx.user.user.email);

    // The cached copy was dropped, so /me sees the change
    let (_, body) = ctx.json(Method::GET, "/api/users/me", Some(token), None).await;
    assert_eq!(body["username"], new_name);

    let (status, _) = ctx
        .json(
            Method::PUT,
            "/api/users/edit",
            Some(token),
            Some(json!({ "username": "abc" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let other = ctx.create_user(Role::User).await.unwrap();
    let (status, _) = ctx
        .json(
            Method::PUT,
            "/api/users/edit",
            Some(token),
            Some(json!({ "email": other.user.email })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let fresh = unique_email();
    let (status, body) = ctx
        .json(
            Method::PUT,
            "/api/users/edit",
            Some(token),
            Some(json!({ "email": fresh })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], fresh);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore] // Requires PostgreSQL and Redis
async fn test_update_avatar() {
    let ctx = TestContext::new().await.unwrap();

    let (status, body) = ctx
        .multipart(
            Method::PATCH,
            "/api/users/avatar",
            &ctx.user.access_token,
            &[],
            Some(("file", &b"avatar bytes"[..])),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    let public_id = format!("photo_share/avatars/{}", ctx.user.id());
    let avatar = body["avatar"].as_str().unwrap();
    assert!(avatar.contains("w_250"));
    assert!(avatar.ends_with(&public_id));
    assert!(ctx.storage.contains(&public_id).await);

    let (status, _) = ctx
        .multipart(
            Method::PATCH,
            "/api/users/avatar",
            &ctx.user.access_token,
            &[],
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore] // Requires PostgreSQL and Redis
async fn test_public_profile() {
    let ctx = TestContext::new().await.unwrap();
    ctx.upload_image(&ctx.user, "first", "").await;
    ctx.upload_image(&ctx.user, "second", "").await;

    let uri = format!("/api/users/profile/{}", ctx.user.user.username);
    let (status, body) = ctx
        .json(Method::GET, &uri, Some(&ctx.user.access_token), None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], ctx.user.user.username);
    assert_eq!(body["images_count"], 2);
    assert!(body.get("email").is_none());

    let (status, _) = ctx
        .json(
            Method::GET,
            "/api/users/profile/nobody-here",
            Some(&ctx.user.access_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore] // Requires PostgreSQL and Redis
async fn test_ban_user() {
    let ctx = TestContext::new().await.unwrap();
    let admin = ctx.create_user(Role::Admin).await.unwrap();
    let target = ctx.user.id();

    let uri = format!("/api/users/ban/{}", target);

    let (status, _) = ctx
        .json(Method::PATCH, &uri, Some(&ctx.user.access_token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = ctx
        .json(Method::PATCH, &uri, Some(&admin.access_token), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["detail"], "User successfully banned");

    // The banned user's still-valid token is refused
    let (status, _) = ctx
        .json(Method::GET, "/api/users/me", Some(&ctx.user.access_token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let own = format!("/api/users/ban/{}", admin.id());
    let (status, _) = ctx
        .json(Method::PATCH, &own, Some(&admin.access_token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let missing = format!("/api/users/ban/{}", uuid::Uuid::new_v4());
    let (status, _) = ctx
        .json(Method::PATCH, &missing, Some(&admin.access_token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore] // Requires PostgreSQL and Redis
async fn test_change_role() {
    let ctx = TestContext::new().await.unwrap();
    let admin = ctx.create_user(Role::Admin).await.unwrap();

    let (status, body) = ctx
        .json(
            Method::PATCH,
            "/api/users/role",
            Some(&admin.access_token),
            Some(json!({ "email": ctx.user.user.email, "role": "moderator" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert!(body["message"].as_str().unwrap().contains("moderator"));

    let stored = User::find_by_id(&ctx.db, ctx.user.id()).await.unwrap().unwrap();
    assert_eq!(stored.role, Role::Moderator);

    // Moderators are not admins
    let (status, _) = ctx
        .json(
            Method::PATCH,
            "/api/users/role",
            Some(&ctx.user.access_token),
            Some(json!({ "email": admin.user.email, "role": "user" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = ctx
        .json(
            Method::PATCH,
            "/api/users/role",
            Some(&admin.access_token),
            Some(json!({ "email": admin.user.email, "role": "user" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = ctx
        .json(
            Method::PATCH,
            "/api/users/role",
            Some(&admin.access_token),
            Some(json!({ "email": unique_email(), "role": "user" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    ctx.cleanup().await.unwrap();
}
