use std::path::PathBuf;

use agora::config::Config;
use agora::db;
use agora::db::models::Role;
use agora::routes;
use agora::state::{AppState, DbPool};
use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

struct TestApp {
    _tmp: TempDir,
    router: Router,
    pool: DbPool,
    uploads: PathBuf,
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Reply {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or_else(|e| {
            panic!(
                "body is not JSON ({e}): {}",
                String::from_utf8_lossy(&self.body)
            )
        })
    }

    fn set_cookie(&self) -> Option<&str> {
        self.headers
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
    }

    /// The `name=value` part of the session cookie, ready for a `Cookie` header.
    fn session(&self) -> String {
        self.set_cookie()
            .and_then(|c| c.split(';').next())
            .expect("response sets a cookie")
            .to_string()
    }
}

fn setup() -> TestApp {
    setup_with(|_| {})
}

fn setup_with(configure: impl FnOnce(&mut Config)) -> TestApp {
    let tmp = TempDir::new().unwrap();

    let mut config = Config::default();
    config.database.path = Some(tmp.path().join("test.db"));
    config.storage.path = Some(tmp.path().join("uploads"));
    config.auth.secret = Some("test-secret".into());
    config.auth.password_cost = 4;
    configure(&mut config);

    let pool = db::create_pool(&config.db_path(), &config.database)
        .expect("Failed to create test database");
    db::run_migrations(&pool).expect("Failed to run migrations");
    let uploads = config.uploads_path();
    std::fs::create_dir_all(&uploads).unwrap();

    let router = routes::app(AppState::new(pool.clone(), config));
    TestApp {
        _tmp: tmp,
        router,
        pool,
        uploads,
    }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> Reply {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec();
        Reply {
            status,
            headers,
            body,
        }
    }

    async fn get(&self, uri: &str, cookie: Option<&str>) -> Reply {
        let mut request = Request::builder().method("GET").uri(uri);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.send(request.body(Body::empty()).unwrap()).await
    }

    async fn delete(&self, uri: &str, cookie: Option<&str>) -> Reply {
        let mut request = Request::builder().method("DELETE").uri(uri);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.send(request.body(Body::empty()).unwrap()).await
    }

    async fn form(
        &self,
        method: &str,
        uri: &str,
        cookie: Option<&str>,
        pairs: &[(&str, &str)],
    ) -> Reply {
        let mut request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        let body = serde_urlencoded::to_string(pairs).unwrap();
        self.send(request.body(Body::from(body)).unwrap())
            .await
    }

    /// Register a member and return their id and session cookie.
    async fn register(&self, username: &str) -> (i64, String) {
        let reply = self
            .form(
                "POST",
                "/api/auth/register",
                None,
                &[("username", username), ("password", "password1")],
            )
            .await;
        assert_eq!(reply.status, StatusCode::OK, "register {username}");
        (reply.json()["id"].as_i64().unwrap(), reply.session())
    }

    async fn admin(&self, username: &str) -> (i64, String) {
        let id = db::users::create_user(&self.pool, username, "password1", Role::Admin, 4).unwrap();
        let reply = self
            .form(
                "POST",
                "/api/auth/login",
                None,
                &[("username", username), ("password", "password1")],
            )
            .await;
        assert_eq!(reply.status, StatusCode::OK);
        (id, reply.session())
    }

    async fn create_post(&self, cookie: &str, title: &str, tags: &str) -> i64 {
        let reply = self
            .form(
                "POST",
                "/api/posts",
                Some(cookie),
                &[("title", title), ("body", "body"), ("tags", tags)],
            )
            .await;
        assert_eq!(reply.status, StatusCode::OK);
        reply.json()["id"].as_i64().unwrap()
    }
}

#[tokio::test]
async fn test_register_login_post_and_fetch() {
    let app = setup();

    let reply = app
        .form(
            "POST",
            "/api/auth/register",
            None,
            &[("username", "alice123"), ("password", "password1")],
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    let alice = reply.json()["id"].as_i64().unwrap();
    let cookie = reply.set_cookie().unwrap();
    assert!(cookie.starts_with("jwt="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Secure"));
    assert!(cookie.contains("SameSite=Strict"));
    assert!(cookie.contains("Max-Age=604800"));

    let login = app
        .form(
            "POST",
            "/api/auth/login",
            None,
            &[("username", "alice123"), ("password", "password1")],
        )
        .await;
    assert_eq!(login.status, StatusCode::OK);
    assert_eq!(login.json(), json!({ "id": alice }));
    let session = login.session();

    let created = app
        .form(
            "POST",
            "/api/posts",
            Some(&session),
            &[
                ("title", "Hello"),
                ("body", "<script>x</script>world"),
                ("tags", "news"),
            ],
        )
        .await;
    assert_eq!(created.status, StatusCode::OK);
    let post_id = created.json()["id"].as_i64().unwrap();

    let fetched = app.get(&format!("/api/posts/{post_id}"), None).await;
    assert_eq!(fetched.status, StatusCode::OK);
    let post = fetched.json();
    assert_eq!(post["title"], "Hello");
    assert_eq!(post["body"], "world");
    assert_eq!(post["author"]["username"], "alice123");
    assert_eq!(post["author"]["id"], alice);
    assert_eq!(post["commentCount"], 0);
    assert_eq!(post["deleted"], false);

    let tags = post["tags"].as_array().unwrap();
    assert_eq!(tags.len(), 1);
    let tag = app
        .get(&format!("/api/tags/{}", tags[0].as_i64().unwrap()), None)
        .await;
    assert_eq!(tag.json()["name"], "news");
    assert_eq!(tag.json()["color"], "gray");
}

#[tokio::test]
async fn test_register_validation() {
    let app = setup();
    for (username, password) in [
        ("ab", "password1"),
        ("has space", "password1"),
        ("dash-ed", "password1"),
        ("valid_name", "short"),
    ] {
        let reply = app
            .form(
                "POST",
                "/api/auth/register",
                None,
                &[("username", username), ("password", password)],
            )
            .await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST, "{username}/{password}");
    }

    app.register("taken").await;
    let duplicate = app
        .form(
            "POST",
            "/api/auth/register",
            None,
            &[("username", "taken"), ("password", "password1")],
        )
        .await;
    assert_eq!(duplicate.status, StatusCode::BAD_REQUEST);

    let check = app.get("/api/auth/checkUsername?username=taken", None).await;
    assert_eq!(check.json(), json!({ "available": false }));
    let check = app.get("/api/auth/checkUsername?username=free", None).await;
    assert_eq!(check.json(), json!({ "available": true }));
}

#[tokio::test]
async fn test_login_failures_and_logout() {
    let app = setup();
    app.register("alice").await;

    let wrong = app
        .form(
            "POST",
            "/api/auth/login",
            None,
            &[("username", "alice"), ("password", "wrong-pass")],
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    let unknown = app
        .form(
            "POST",
            "/api/auth/login",
            None,
            &[("username", "nobody"), ("password", "password1")],
        )
        .await;
    assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);

    let logout = app.form("POST", "/api/auth/logout", None, &[]).await;
    assert_eq!(logout.status, StatusCode::NO_CONTENT);
    let cookie = logout.set_cookie().unwrap();
    assert!(cookie.starts_with("jwt=;"));
    assert!(cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn test_bad_tokens_are_anonymous() {
    let app = setup();
    assert_eq!(app.get("/api/me", None).await.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        app.get("/api/me", Some("jwt=not-a-token")).await.status,
        StatusCode::UNAUTHORIZED
    );

    // a creation endpoint with a forged cookie behaves as anonymous
    let reply = app
        .form(
            "POST",
            "/api/posts",
            Some("jwt=eyJhbGciOiJIUzI1NiJ9.e30.bogus"),
            &[("title", "t")],
        )
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_preferences() {
    let app = setup();
    let (alice, cookie) = app.register("alice").await;

    let me = app.get("/api/me", Some(&cookie)).await;
    assert_eq!(me.json(), json!({ "id": alice, "prefs": {} }));

    for (key, value) in [
        ("prefersDarkMode", "true"),
        ("prefersReducedMotion", "nope"),
        ("preferredSort", "popular"),
    ] {
        let reply = app
            .form("PATCH", &format!("/api/me/{key}"), Some(&cookie), &[("value", value)])
            .await;
        assert_eq!(reply.status, StatusCode::NO_CONTENT, "{key}");
    }

    let bad_sort = app
        .form("PATCH", "/api/me/preferredSort", Some(&cookie), &[("value", "random")])
        .await;
    assert_eq!(bad_sort.status, StatusCode::BAD_REQUEST);
    let bad_key = app
        .form("PATCH", "/api/me/fontSize", Some(&cookie), &[("value", "12")])
        .await;
    assert_eq!(bad_key.status, StatusCode::BAD_REQUEST);

    let me = app.get("/api/me", Some(&cookie)).await;
    assert_eq!(
        me.json()["prefs"],
        json!({
            "prefersDarkMode": true,
            "prefersReducedMotion": false,
            "preferredSort": "popular",
        })
    );
}

#[tokio::test]
async fn test_post_ownership() {
    let app = setup();
    let (_, alice) = app.register("alice").await;
    let (_, bob) = app.register("bob").await;
    let (_, root) = app.admin("root").await;
    let post = app.create_post(&alice, "mine", "").await;
    let uri = format!("/api/posts/{post}");

    let reply = app.form("PATCH", &uri, Some(&bob), &[("body", "hijack")]).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    let reply = app.form("PATCH", &uri, None, &[("body", "hijack")]).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.delete(&uri, Some(&bob)).await.status, StatusCode::UNAUTHORIZED);

    let reply = app
        .form("PATCH", &uri, Some(&alice), &[("body", "<b>edited</b><script>1</script>")])
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["body"], "<b>edited</b>");
    assert_eq!(reply.json()["title"], "mine");

    let reply = app.form("PATCH", &uri, Some(&root), &[("body", "moderated")]).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["body"], "moderated");

    let missing = app
        .form("PATCH", "/api/posts/999", Some(&alice), &[("body", "x")])
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(app.get("/api/posts/999", None).await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.get("/api/posts/abc", None).await.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_repeated_delete_is_rejected() {
    let app = setup();
    let (_, alice) = app.register("alice").await;
    let post = app.create_post(&alice, "short-lived", "").await;
    let uri = format!("/api/posts/{post}");

    let first = app.delete(&uri, Some(&alice)).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.json(), json!({ "id": post, "deleted": true }));

    let stamp = |pool: &DbPool| -> String {
        pool.get()
            .unwrap()
            .query_row(
                "SELECT deleted_at FROM posts WHERE id = ?1",
                rusqlite::params![post],
                |r| r.get(0),
            )
            .unwrap()
    };
    let before = stamp(&app.pool);

    let second = app.delete(&uri, Some(&alice)).await;
    assert_eq!(second.status, StatusCode::BAD_REQUEST);
    assert_eq!(stamp(&app.pool), before);

    let edit = app.form("PATCH", &uri, Some(&alice), &[("body", "x")]).await;
    assert_eq!(edit.status, StatusCode::BAD_REQUEST);

    assert_eq!(
        app.get(&uri, None).await.json(),
        json!({ "id": post, "deleted": true })
    );
    assert_eq!(app.get("/api/posts", None).await.json(), json!([]));
}

#[tokio::test]
async fn test_post_listing() {
    let app = setup();
    let (_, alice) = app.register("alice").await;
    let (_, bob) = app.register("bob").await;
    for i in 0..12 {
        app.create_post(&alice, &format!("alice {i}"), "").await;
    }
    let tagged = app.create_post(&bob, "bob on rust", "rust, meta").await;

    let first = app.get("/api/posts?page=1", None).await.json();
    let second = app.get("/api/posts?page=2", None).await.json();
    assert_eq!(first.as_array().unwrap().len(), 10);
    assert_eq!(second.as_array().unwrap().len(), 3);

    let by_bob = app.get("/api/posts?user=bob", None).await.json();
    assert_eq!(by_bob.as_array().unwrap().len(), 1);
    assert_eq!(by_bob[0]["id"], tagged);

    let found = app.get("/api/posts?query=RUST", None).await.json();
    assert_eq!(found[0]["id"], tagged);

    let tag_id = found[0]["tags"][0].as_i64().unwrap();
    let by_tag = app.get(&format!("/api/posts?tag={tag_id}"), None).await.json();
    assert_eq!(by_tag.as_array().unwrap().len(), 1);

    let unknown_sort = app.get("/api/posts?sort=whatever", None).await;
    assert_eq!(unknown_sort.status, StatusCode::OK);

    assert_eq!(app.get("/api/posts?page=0", None).await.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        app.get("/api/posts?page=9223372036854775807", None).await.status,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(app.get("/api/posts?tag=x", None).await.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_comments() {
    let app = setup();
    let (_, alice) = app.register("alice").await;
    let (_, bob) = app.register("bob").await;
    let post = app.create_post(&alice, "discuss", "").await;

    let missing_param = app
        .form("POST", "/api/comments", Some(&bob), &[("body", "hi")])
        .await;
    assert_eq!(missing_param.status, StatusCode::BAD_REQUEST);
    let empty = app
        .form("POST", &format!("/api/comments?post={post}"), Some(&bob), &[("body", "")])
        .await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);
    let no_post = app
        .form("POST", "/api/comments?post=999", Some(&bob), &[("body", "hi")])
        .await;
    assert_eq!(no_post.status, StatusCode::NOT_FOUND);
    let anonymous = app
        .form("POST", &format!("/api/comments?post={post}"), None, &[("body", "hi")])
        .await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let created = app
        .form(
            "POST",
            &format!("/api/comments?post={post}"),
            Some(&bob),
            &[("body", "nice <i>post</i>")],
        )
        .await;
    assert_eq!(created.status, StatusCode::OK);
    let comment = created.json();
    assert_eq!(comment["postId"], post);
    assert_eq!(comment["body"], "nice <i>post</i>");
    assert_eq!(comment["author"]["username"], "bob");
    let comment_id = comment["id"].as_i64().unwrap();

    let listed = app.get(&format!("/api/comments?post={post}"), None).await.json();
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(
        app.get(&format!("/api/posts/{post}"), None).await.json()["commentCount"],
        1
    );

    let uri = format!("/api/comments/{comment_id}");
    let hijack = app.form("PATCH", &uri, Some(&alice), &[("body", "x")]).await;
    assert_eq!(hijack.status, StatusCode::UNAUTHORIZED);

    let deleted = app.delete(&uri, Some(&bob)).await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(
        deleted.json(),
        json!({ "id": comment_id, "postId": post, "deleted": true })
    );
    assert_eq!(app.delete(&uri, Some(&bob)).await.status, StatusCode::BAD_REQUEST);

    app.delete(&format!("/api/posts/{post}"), Some(&alice)).await;
    let on_deleted = app
        .form(
            "POST",
            &format!("/api/comments?post={post}"),
            Some(&bob),
            &[("body", "late")],
        )
        .await;
    assert_eq!(on_deleted.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reactions() {
    let app = setup();
    let (alice_id, alice) = app.register("alice").await;
    let (_, bob) = app.register("bob").await;
    let post = app.create_post(&alice, "react", "").await;
    let uri = format!("/api/reactions/post/{post}");

    let anonymous = app.form("POST", &uri, None, &[("reaction", "Love")]).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    for reaction in ["Love", "Wow"] {
        let reply = app.form("POST", &uri, Some(&alice), &[("reaction", reaction)]).await;
        assert_eq!(reply.status, StatusCode::NO_CONTENT);
    }
    app.form("POST", &uri, Some(&bob), &[("reaction", "Wow")]).await;

    let counts = app.get(&uri, None).await.json();
    assert_eq!(counts.as_array().unwrap().len(), 1);
    assert_eq!(counts[0]["name"], "Wow");
    assert_eq!(counts[0]["count"], 2);

    let mine = app.get(&format!("{uri}/{alice_id}"), None).await;
    assert_eq!(mine.status, StatusCode::OK);
    assert_eq!(mine.json()["name"], "Wow");
    assert_eq!(mine.json()["count"], 1);

    let unknown = app.form("POST", &uri, Some(&alice), &[("reaction", "Upvote")]).await;
    assert_eq!(unknown.status, StatusCode::BAD_REQUEST);

    let cleared = app.form("POST", &uri, Some(&alice), &[("reaction", "")]).await;
    assert_eq!(cleared.status, StatusCode::NO_CONTENT);
    assert_eq!(
        app.get(&format!("{uri}/{alice_id}"), None).await.status,
        StatusCode::NOT_FOUND
    );

    assert_eq!(
        app.form("POST", "/api/reactions/post/999", Some(&alice), &[("reaction", "Love")])
            .await
            .status,
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        app.get(&format!("/api/reactions/user/{post}"), None).await.status,
        StatusCode::NOT_FOUND
    );

    let comment = app
        .form("POST", &format!("/api/comments?post={post}"), Some(&bob), &[("body", "c")])
        .await
        .json()["id"]
        .as_i64()
        .unwrap();
    let reply = app
        .form(
            "POST",
            &format!("/api/reactions/comment/{comment}"),
            Some(&alice),
            &[("reaction", "Upvote")],
        )
        .await;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);
    let counts = app.get(&format!("/api/reactions/comment/{comment}"), None).await.json();
    assert_eq!(counts[0]["name"], "Upvote");
}

#[tokio::test]
async fn test_tags() {
    let app = setup();
    let (_, alice) = app.register("alice").await;
    let (_, root) = app.admin("root").await;
    app.create_post(&alice, "one", "rust, web").await;
    app.create_post(&alice, "two", "rust").await;
    app.create_post(&alice, "three", "a, B1,  -x,toolongtoolongtoolongtoolongtoolong").await;

    let all = app.get("/api/tags", None).await.json();
    let names: Vec<&str> = all
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["rust", "web", "a"]);

    let filtered = app.get("/api/tags?query=we", None).await.json();
    assert_eq!(filtered.as_array().unwrap().len(), 1);

    let trending = app.get("/api/tags/trending", None).await.json();
    assert_eq!(trending[0]["name"], "rust");

    let rust_id = all[0]["id"].as_i64().unwrap();
    let uri = format!("/api/tags/{rust_id}");
    let by_member = app
        .form("PATCH", &uri, Some(&alice), &[("color", "red"), ("description", "d")])
        .await;
    assert_eq!(by_member.status, StatusCode::UNAUTHORIZED);

    let by_admin = app
        .form("PATCH", &uri, Some(&root), &[("color", "orange"), ("description", "Crabs")])
        .await;
    assert_eq!(by_admin.status, StatusCode::OK);
    assert_eq!(
        by_admin.json(),
        json!({ "id": rust_id, "name": "rust", "color": "orange", "description": "Crabs" })
    );

    assert_eq!(app.get("/api/tags/999", None).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_user_profile_and_deletion() {
    let app = setup();
    let (alice_id, alice) = app.register("alice").await;
    let (bob_id, bob) = app.register("bob").await;
    let (_, root) = app.admin("root").await;
    app.create_post(&alice, "p", "").await;

    let profile = app.get(&format!("/api/users/{alice_id}"), None).await.json();
    assert_eq!(profile["username"], "alice");
    assert_eq!(profile["role"], "member");
    assert_eq!(profile["postCount"], 1);
    assert_eq!(profile["commentCount"], 0);
    assert!(profile.get("password").is_none());

    let uri = format!("/api/users/{alice_id}");
    let by_bob = app.form("POST", &uri, Some(&bob), &[("bio", "pwned")]).await;
    assert_eq!(by_bob.status, StatusCode::UNAUTHORIZED);
    let short = app.form("POST", &uri, Some(&alice), &[("password", "short")]).await;
    assert_eq!(short.status, StatusCode::BAD_REQUEST);

    let updated = app
        .form("POST", &uri, Some(&alice), &[("bio", "hello"), ("password", "")])
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.json()["bio"], "hello");

    // an admin deleting someone else does not sign themselves out
    let by_admin = app.delete(&format!("/api/users/{bob_id}"), Some(&root)).await;
    assert_eq!(by_admin.status, StatusCode::OK);
    assert_eq!(by_admin.json(), json!({ "deleted": true }));
    assert!(by_admin.set_cookie().is_none());
    let bob_login = app
        .form(
            "POST",
            "/api/auth/login",
            None,
            &[("username", "bob"), ("password", "password1")],
        )
        .await;
    assert_eq!(bob_login.status, StatusCode::UNAUTHORIZED);

    let own = app.delete(&uri, Some(&alice)).await;
    assert_eq!(own.status, StatusCode::OK);
    assert!(own.set_cookie().unwrap().contains("Max-Age=0"));
    assert_eq!(app.delete(&uri, Some(&root)).await.status, StatusCode::BAD_REQUEST);

    // posts by a deleted user stay visible with a redacted author
    let posts = app.get("/api/posts", None).await.json();
    assert_eq!(posts[0]["author"], json!({ "deleted": true }));
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([10, 120, 200]));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

fn multipart_request(uri: &str, cookie: &str, field: &str, bytes: &[u8]) -> Request<Body> {
    let boundary = "agora-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; \
             filename=\"upload.bin\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .header(header::COOKIE, cookie)
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_avatar_upload_replace_and_delete() {
    let app = setup();
    let (alice_id, alice) = app.register("alice").await;
    let (_, bob) = app.register("bob").await;
    let uri = format!("/api/users/{alice_id}/avatar");

    let not_image = app
        .send(multipart_request(&uri, &alice, "file", b"definitely not an image"))
        .await;
    assert_eq!(not_image.status, StatusCode::BAD_REQUEST);
    let wrong_field = app
        .send(multipart_request(&uri, &alice, "photo", &png_bytes(8, 8)))
        .await;
    assert_eq!(wrong_field.status, StatusCode::BAD_REQUEST);
    let by_bob = app
        .send(multipart_request(&uri, &bob, "file", &png_bytes(8, 8)))
        .await;
    assert_eq!(by_bob.status, StatusCode::UNAUTHORIZED);

    let first = app
        .send(multipart_request(&uri, &alice, "file", &png_bytes(400, 300)))
        .await;
    assert_eq!(first.status, StatusCode::OK);
    let first_path = first.json()["avatar"].as_str().unwrap().to_string();
    assert!(first_path.starts_with("/uploads/"));
    assert!(first_path.ends_with(".png"));
    let first_file = app.uploads.join(first_path.trim_start_matches("/uploads/"));
    assert!(first_file.exists());

    let thumb = image::open(&first_file).unwrap();
    assert_eq!((thumb.width(), thumb.height()), (256, 256));

    let served = app.get(&first_path, None).await;
    assert_eq!(served.status, StatusCode::OK);
    assert_eq!(served.body, std::fs::read(&first_file).unwrap());

    let second = app
        .send(multipart_request(&uri, &alice, "file", &png_bytes(50, 80)))
        .await;
    assert_eq!(second.status, StatusCode::OK);
    let second_path = second.json()["avatar"].as_str().unwrap().to_string();
    assert_ne!(second_path, first_path);
    assert!(!first_file.exists());

    let removed = app.delete(&uri, Some(&alice)).await;
    assert_eq!(removed.status, StatusCode::OK);
    assert!(removed.json()["avatar"].is_null());
    assert!(!app
        .uploads
        .join(second_path.trim_start_matches("/uploads/"))
        .exists());

    assert_eq!(app.delete(&uri, Some(&alice)).await.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_avatar_upload_over_size_limit() {
    let app = setup_with(|config| config.storage.max_upload_bytes = 16 * 1024);
    let (alice_id, alice) = app.register("alice").await;
    let uri = format!("/api/users/{alice_id}/avatar");

    let mut oversized = png_bytes(8, 8);
    oversized.resize(64 * 1024, 0);
    let rejected = app
        .send(multipart_request(&uri, &alice, "file", &oversized))
        .await;
    assert_eq!(rejected.status, StatusCode::BAD_REQUEST);
    assert_eq!(std::fs::read_dir(&app.uploads).unwrap().count(), 0);
    let profile = app.get(&format!("/api/users/{alice_id}"), None).await.json();
    assert!(profile["avatar"].is_null());

    let accepted = app
        .send(multipart_request(&uri, &alice, "file", &png_bytes(8, 8)))
        .await;
    assert_eq!(accepted.status, StatusCode::OK);
    assert_eq!(std::fs::read_dir(&app.uploads).unwrap().count(), 1);
}
