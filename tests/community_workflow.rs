use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::cookie::{Cookie, Key};
use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use community_backend::helper::notification_helpers::{
    CommunityEvent, NotificationDispatcher, NotifyError, RecordingDispatcher, SqliteNotificationDispatcher,
};
use community_backend::models::db_operations::membership_db_operations;
use community_backend::setup::db_setup;
use community_backend::{build_pool, routes, AppState, DbPool};
use pretty_assertions::assert_eq;
use rusqlite::Connection;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

fn test_pool() -> (TempDir, DbPool) {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("community.db");
    let mut conn = Connection::open(&path).expect("database file");
    db_setup::setup_community_db(&mut conn).expect("schema setup");
    let pool = build_pool(&path).expect("pool");
    (dir, pool)
}

macro_rules! test_app {
    ($pool:expr, $dispatcher:expr) => {
        test::init_service(
            App::new()
                .wrap(
                    SessionMiddleware::builder(CookieSessionStore::default(), Key::from(&[7u8; 64][..]))
                        .cookie_secure(false)
                        .build(),
                )
                .app_data(web::Data::new($pool.clone()))
                .app_data(web::Data::new(AppState { dispatcher: $dispatcher }))
                .configure(routes::configure),
        )
        .await
    };
}

/// Registers a user and returns the session cookie and user id.
macro_rules! register {
    ($app:expr, $username:expr) => {{
        let req = test::TestRequest::post()
            .uri("/register/")
            .set_form(&[
                ("username", $username),
                ("email", format!("{}@example.com", $username).as_str()),
                ("password", "correct horse"),
            ])
            .to_request();
        let resp = test::call_service(&$app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let cookie: Cookie<'static> = resp
            .response()
            .cookies()
            .next()
            .expect("session cookie")
            .into_owned();
        let body: Value = test::read_body_json(resp).await;
        (cookie, body["user"]["id"].as_i64().expect("user id"))
    }};
}

macro_rules! post_form {
    ($app:expr, $cookie:expr, $uri:expr, $form:expr) => {{
        let req = test::TestRequest::post()
            .uri($uri)
            .cookie($cookie.clone())
            .set_form($form)
            .to_request();
        test::call_service(&$app, req).await
    }};
}

macro_rules! post_json {
    ($app:expr, $cookie:expr, $uri:expr, $body:expr) => {{
        let req = test::TestRequest::post()
            .uri($uri)
            .cookie($cookie.clone())
            .set_json($body)
            .to_request();
        test::call_service(&$app, req).await
    }};
}

macro_rules! get_json {
    ($app:expr, $cookie:expr, $uri:expr) => {{
        let req = test::TestRequest::get().uri($uri).cookie($cookie.clone()).to_request();
        let resp = test::call_service(&$app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        body
    }};
}

struct FailingDispatcher;

impl NotificationDispatcher for FailingDispatcher {
    fn dispatch(&self, _event: &CommunityEvent) -> Result<(), NotifyError> {
        Err(NotifyError::Database(rusqlite::Error::InvalidQuery))
    }
}

#[actix_web::test]
async fn private_community_request_is_notified_and_accepted() {
    let (_dir, pool) = test_pool();
    let app = test_app!(pool, Arc::new(SqliteNotificationDispatcher::new(pool.clone())));
    let (alice, _alice_id) = register!(app, "alice");
    let (bob, bob_id) = register!(app, "bob");

    let resp = post_form!(app, alice, "/community/create/", &[("name", "robotics"), ("is_private", "on")]);
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = post_form!(app, bob, "/community/name-robotics/", &[("action", "send_request")]);
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({ "request_status": true }));

    let notifications = get_json!(app, alice, "/notifications/");
    assert_eq!(notifications.as_array().map(Vec::len), Some(1));
    assert_eq!(notifications[0]["subject"]["content_type"], json!("community"));

    let user = bob_id.to_string();
    let resp = post_form!(
        app,
        alice,
        "/community/name-robotics/follow-requests/",
        &[("action", "accept"), ("user", user.as_str())]
    );
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({ "success": "ok" }));

    let page = get_json!(app, bob, "/community/name-robotics/");
    assert_eq!(page["is_following"], json!(true));
    assert_eq!(page["followers_count"], json!(1));

    let pending = get_json!(app, alice, "/community/name-robotics/follow-requests/");
    assert_eq!(pending["follow_requests"], json!([]));
}

#[actix_web::test]
async fn cancel_then_resend_notifies_again() {
    let (_dir, pool) = test_pool();
    let recorder = Arc::new(RecordingDispatcher::default());
    let app = test_app!(pool, recorder.clone());
    let (alice, _) = register!(app, "alice");
    let (bob, _) = register!(app, "bob");
    post_form!(app, alice, "/community/create/", &[("name", "robotics"), ("is_private", "on")]);

    post_form!(app, bob, "/community/name-robotics/", &[("action", "send_request")]);
    assert_eq!(recorder.events().len(), 1);

    let resp = post_form!(app, bob, "/community/name-robotics/", &[("action", "remove_request")]);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({ "success": true }));
    post_form!(app, bob, "/community/name-robotics/", &[("action", "send_request")]);

    // cancel deletes the row, so the second send is a fresh request
    assert_eq!(recorder.events().len(), 2);
}

#[actix_web::test]
async fn follow_toggle_restores_count() {
    let (_dir, pool) = test_pool();
    let app = test_app!(pool, Arc::new(RecordingDispatcher::default()));
    let (alice, _) = register!(app, "alice");
    let (bob, _) = register!(app, "bob");
    post_form!(app, alice, "/community/create/", &[("name", "devs")]);

    let resp = post_form!(app, bob, "/community/name-devs/", &[("action", "follow")]);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({ "followers_count": 1, "is_following": true }));

    let resp = post_form!(app, bob, "/community/name-devs/", &[("action", "unfollow")]);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({ "followers_count": 0, "is_following": false }));
}

#[actix_web::test]
async fn anonymous_actions_are_unauthorized() {
    let (_dir, pool) = test_pool();
    let app = test_app!(pool, Arc::new(RecordingDispatcher::default()));

    let req = test::TestRequest::post()
        .uri("/community/name-devs/")
        .set_form(&[("action", "follow")])
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], json!("error"));
}

#[actix_web::test]
async fn unknown_action_and_community_are_reported() {
    let (_dir, pool) = test_pool();
    let app = test_app!(pool, Arc::new(RecordingDispatcher::default()));
    let (alice, _) = register!(app, "alice");
    post_form!(app, alice, "/community/create/", &[("name", "devs")]);

    let resp = post_form!(app, alice, "/community/name-devs/", &[("action", "dance")]);
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = post_form!(app, alice, "/community/name-nowhere/", &[("action", "follow")]);
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = post_form!(app, alice, "/community/create/", &[("name", "devs")]);
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[actix_web::test]
async fn rebanning_overwrites_the_reason() {
    let (_dir, pool) = test_pool();
    let app = test_app!(pool, Arc::new(RecordingDispatcher::default()));
    let (alice, _) = register!(app, "alice");
    let (_bob, bob_id) = register!(app, "bob");
    post_form!(app, alice, "/community/create/", &[("name", "devs")]);

    for reason in ["spam", "spam2"] {
        let resp = post_json!(
            app,
            alice,
            "/community/name-devs/users-management/",
            json!({ "action": "put_ban", "follower_id": bob_id, "reason": reason, "instance": "devs" })
        );
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "status": "success" }));
    }

    let listing = get_json!(app, alice, "/community/name-devs/users-management/");
    let banned = listing["banned_users"].as_array().expect("banned users");
    assert_eq!(banned.len(), 1);
    assert_eq!(banned[0]["reason"], json!("spam2"));

    let resp = post_json!(
        app,
        alice,
        "/community/name-devs/users-management/",
        json!({ "action": "put_ban", "follower_id": bob_id, "instance": "devs" })
    );
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], json!("Missing follower_id, reason, or instance name"));
}

#[actix_web::test]
async fn unban_without_ban_is_an_error_status() {
    let (_dir, pool) = test_pool();
    let app = test_app!(pool, Arc::new(RecordingDispatcher::default()));
    let (alice, _) = register!(app, "alice");
    let (_bob, bob_id) = register!(app, "bob");
    post_form!(app, alice, "/community/create/", &[("name", "devs")]);

    let resp = post_json!(
        app,
        alice,
        "/community/name-devs/users-management/",
        json!({ "action": "remove_ban", "bannedUserId": bob_id })
    );

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], json!("error"));
}

#[actix_web::test]
async fn only_the_owner_grants_admin() {
    let (_dir, pool) = test_pool();
    let app = test_app!(pool, Arc::new(RecordingDispatcher::default()));
    let (alice, _) = register!(app, "alice");
    let (bob, bob_id) = register!(app, "bob");
    let (_carl, carl_id) = register!(app, "carl");
    post_form!(app, alice, "/community/create/", &[("name", "devs")]);

    let resp = post_json!(
        app,
        alice,
        "/community/name-devs/users-management/",
        json!({ "action": "grant_privileges", "follower_id": bob_id, "privilege": "Moderator", "instance": "devs" })
    );
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = post_json!(
        app,
        bob,
        "/community/name-devs/users-management/",
        json!({ "action": "grant_privileges", "follower_id": carl_id, "privilege": "Admin", "instance": "devs" })
    );
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let managers = get_json!(app, alice, "/community/name-devs/users-management/?managers_list");
    assert_eq!(managers["admins"], json!([]));
    assert_eq!(managers["moderators"].as_array().map(Vec::len), Some(1));

    let resp = post_json!(
        app,
        alice,
        "/community/name-devs/users-management/",
        json!({ "action": "grant_privileges", "follower_id": carl_id, "privilege": "Owner" })
    );
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn failed_notification_keeps_the_request() {
    let (_dir, pool) = test_pool();
    let app = test_app!(pool, Arc::new(FailingDispatcher));
    let (alice, _) = register!(app, "alice");
    let (bob, bob_id) = register!(app, "bob");
    post_form!(app, alice, "/community/create/", &[("name", "robotics"), ("is_private", "on")]);

    let resp = post_form!(app, bob, "/community/name-robotics/", &[("action", "send_request")]);
    assert_eq!(resp.status(), StatusCode::OK);

    let conn = pool.get().expect("connection");
    let community_id: i64 = conn
        .query_row("SELECT id FROM communities WHERE name = 'robotics'", [], |row| row.get(0))
        .expect("community");
    let pending = membership_db_operations::read_pending_follow_request(&conn, bob_id, community_id)
        .expect("query")
        .expect("pending request");
    assert!(pending.send_status);
}

#[actix_web::test]
async fn comments_attach_to_threads() {
    let (_dir, pool) = test_pool();
    let app = test_app!(pool, Arc::new(RecordingDispatcher::default()));
    let (jane, _) = register!(app, "jane");

    let resp = post_form!(app, jane, "/threads/", &[("title", "Motors"), ("context", "Which ones?")]);
    assert_eq!(resp.status(), StatusCode::CREATED);
    let thread: Value = test::read_body_json(resp).await;
    let thread_id = thread["id"].as_i64().expect("thread id");

    let resp = post_json!(
        app,
        jane,
        "/comments/",
        json!({ "target": { "kind": "thread", "id": thread_id }, "context": "Steppers" })
    );
    assert_eq!(resp.status(), StatusCode::CREATED);

    let comments = get_json!(app, jane, &format!("/threads/{}/comments/", thread_id));
    assert_eq!(comments[0]["title"], json!("Motors"));
}

#[actix_web::test]
async fn wrong_password_is_unauthorized() {
    let (_dir, pool) = test_pool();
    let app = test_app!(pool, Arc::new(RecordingDispatcher::default()));
    register!(app, "alice");

    let req = test::TestRequest::post()
        .uri("/login/")
        .set_form(&[("username", "alice"), ("password", "battery staple")])
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], json!("Invalid username or password."));
}

#[actix_web::test]
async fn user_follows_show_up_on_both_sides() {
    let (_dir, pool) = test_pool();
    let app = test_app!(pool, Arc::new(RecordingDispatcher::default()));
    let (alice, alice_id) = register!(app, "alice");
    let (bob, bob_id) = register!(app, "bob");

    let resp = post_form!(app, bob, "/user-page/alice/follow/", &[("action", "follow")]);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({ "followers_count": 1, "is_following": true }));

    let followers = get_json!(app, alice, "/user-page/alice/followers/");
    assert_eq!(followers["followers"], json!([{ "id": bob_id, "username": "bob" }]));
    let followings = get_json!(app, alice, "/user-page/bob/followings/");
    assert_eq!(followings["followings"], json!([{ "id": alice_id, "username": "alice" }]));

    let page = get_json!(app, bob, "/user-page/alice/");
    assert_eq!(page["followers_count"], json!(1));
    assert_eq!(page["is_following"], json!(true));
    assert!(page["user"].get("email").is_none());

    let resp = post_form!(app, alice, "/user-page/alice/follow/", &[("action", "follow")]);
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn direct_messages_reach_the_chat_list() {
    let (_dir, pool) = test_pool();
    let app = test_app!(pool, Arc::new(RecordingDispatcher::default()));
    let (alice, _) = register!(app, "alice");
    let (bob, bob_id) = register!(app, "bob");

    let resp = post_form!(app, bob, "/user-page/alice/chat/", &[("body", "hello <i>there</i>")]);
    assert_eq!(resp.status(), StatusCode::CREATED);

    let chats = get_json!(app, alice, "/user-chats/");
    assert_eq!(chats["chats"][0]["partner"]["id"], json!(bob_id));
    assert_eq!(chats["chats"][0]["unread_count"], json!(1));
    assert_eq!(chats["chats"][0]["last_message"], json!("hello &lt;i&gt;there&lt;/i&gt;"));

    let chat = get_json!(app, alice, "/user-page/bob/chat/");
    assert_eq!(chat["messages"].as_array().map(Vec::len), Some(1));
    let chats = get_json!(app, alice, "/user-chats/");
    assert_eq!(chats["chats"][0]["unread_count"], json!(0));

    let resp = post_form!(app, bob, "/user-page/bob/chat/", &[("body", "me")]);
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
