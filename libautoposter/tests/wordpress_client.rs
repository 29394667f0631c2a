//! WordPress client against a local fake of the WordPress.com REST API

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use libautoposter::platforms::wordpress::{WordpressClient, WordpressCredentials};
use libautoposter::platforms::Platform;
use libautoposter::types::{MediaItem, PostDraft, RemoteId};
use secrecy::SecretString;
use serde_json::{json, Value};

#[derive(Default)]
struct Upstream {
    token_forms: Vec<HashMap<String, String>>,
    unauthorized: usize,
    created: Vec<Value>,
    alt_texts: Vec<(u64, Value)>,
    deletes: Vec<(u64, bool)>,
    post_queries: Vec<HashMap<String, String>>,
    trash: Vec<u64>,
    upload_response: Value,
}

type Shared = Arc<Mutex<Upstream>>;

fn authorized(headers: &HeaderMap, state: &Shared) -> bool {
    let ok = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == "Bearer tok-123")
        .unwrap_or(false);
    if !ok {
        state.lock().unwrap().unauthorized += 1;
    }
    ok
}

async fn token(State(state): State<Shared>, Form(form): Form<HashMap<String, String>>) -> (StatusCode, Json<Value>) {
    let password_ok = form.get("password").map(String::as_str) == Some("pw");
    state.lock().unwrap().token_forms.push(form);
    if password_ok {
        (StatusCode::OK, Json(json!({"access_token": "tok-123", "token_type": "bearer"})))
    } else {
        (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid_grant"})))
    }
}

async fn upload(State(state): State<Shared>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if !authorized(&headers, &state) {
        return (StatusCode::FORBIDDEN, Json(json!({"error": "unauthorized"})));
    }
    let body = state.lock().unwrap().upload_response.clone();
    (StatusCode::OK, Json(body))
}

async fn update_media(
    State(state): State<Shared>,
    Path((_site, id)): Path<(String, u64)>,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.lock().unwrap().alt_texts.push((id, body));
    Json(json!({"ID": id}))
}

async fn new_post(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if !authorized(&headers, &state) {
        return (StatusCode::FORBIDDEN, Json(json!({"error": "unauthorized"})));
    }
    state.lock().unwrap().created.push(body);
    (StatusCode::OK, Json(json!({"ID": 77, "URL": "https://blog.test/2024/hello"})))
}

async fn list_posts(
    State(state): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    let mut upstream = state.lock().unwrap();
    upstream.post_queries.push(query.clone());

    let page: usize = query.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    let number: usize = query.get("number").and_then(|n| n.parse().ok()).unwrap_or(20);
    if query.get("status").map(String::as_str) == Some("trash") {
        let posts: Vec<Value> = upstream
            .trash
            .iter()
            .skip((page - 1) * number)
            .take(number)
            .map(|id| json!({"ID": id, "title": "old"}))
            .collect();
        return Json(json!({"found": upstream.trash.len(), "posts": posts}));
    }

    Json(json!({
        "found": 2,
        "posts": [
            {"ID": 1, "title": "First", "date": "2024-01-01T10:00:00+00:00", "URL": "https://blog.test/first"},
            {"ID": 2, "title": "Second", "date": "2024-01-02T10:00:00+00:00"}
        ]
    }))
}

async fn delete_post(
    State(state): State<Shared>,
    Path((_site, id)): Path<(String, u64)>,
    Query(query): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    if id == 404 {
        return (StatusCode::NOT_FOUND, Json(json!({"error": "unknown_post"})));
    }
    let force = query.get("force").map(String::as_str) == Some("1");
    let mut upstream = state.lock().unwrap();
    upstream.deletes.push((id, force));
    if force {
        upstream.trash.retain(|trashed| *trashed != id);
    }
    (StatusCode::OK, Json(json!({"ID": id, "status": "trash"})))
}

async fn post_stats(Path((_site, id)): Path<(String, u64)>) -> Json<Value> {
    Json(json!({
        "post_id": id,
        "views": 12,
        "data": [["2024-01-01", 5], ["2024-01-02", "7"], "garbage"]
    }))
}

async fn search_terms() -> Json<Value> {
    Json(json!({"search_terms": [["rust async", 4], ["solo"], [42, "3"]]}))
}

async fn site_info(Query(query): Query<HashMap<String, String>>) -> Json<Value> {
    assert_eq!(query.get("fields").map(String::as_str), Some("icon,logo"));
    Json(json!({"icon": {"img": "https://blog.test/icon.png"}, "logo": {"url": "https://blog.test/logo.png", "id": 3}}))
}

async fn spawn_upstream(state: Shared) -> SocketAddr {
    let app = Router::new()
        .route("/oauth2/token", post(token))
        .route("/sites/{site}", get(site_info))
        .route("/sites/{site}/media/new", post(upload))
        .route("/sites/{site}/media/{id}", post(update_media))
        .route("/sites/{site}/posts", get(list_posts))
        .route("/sites/{site}/posts/new", post(new_post))
        .route("/sites/{site}/posts/{id}/delete", post(delete_post))
        .route("/sites/{site}/stats/post/{id}", get(post_stats))
        .route("/sites/{site}/stats/search-terms", get(search_terms))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn client(addr: SocketAddr, password: &str) -> WordpressClient {
    let credentials = WordpressCredentials {
        client_id: "1234".to_string(),
        client_secret: SecretString::from("app-secret".to_string()),
        username: "author".to_string(),
        password: SecretString::from(password.to_string()),
    };
    WordpressClient::new("blog.test".to_string(), credentials, Duration::from_secs(5))
        .unwrap()
        .with_endpoints(
            Some(&format!("http://{}/sites/{{site}}", addr)),
            Some(&format!("http://{}/oauth2/token", addr)),
        )
}

async fn setup() -> (WordpressClient, Shared) {
    let state: Shared = Arc::new(Mutex::new(Upstream {
        upload_response: json!({"media": [{"ID": 55, "URL": "https://blog.test/a.png"}]}),
        ..Default::default()
    }));
    let addr = spawn_upstream(Arc::clone(&state)).await;
    let mut client = client(addr, "pw");
    client.authenticate().await.unwrap();
    (client, state)
}

#[tokio::test]
async fn test_password_grant() {
    let (client, state) = setup().await;
    assert!(client.is_authenticated());

    let upstream = state.lock().unwrap();
    let form = &upstream.token_forms[0];
    assert_eq!(form["grant_type"], "password");
    assert_eq!(form["client_id"], "1234");
    assert_eq!(form["client_secret"], "app-secret");
    assert_eq!(form["username"], "author");
    assert_eq!(form["scope"], "global");
}

#[tokio::test]
async fn test_rejected_password_is_authentication_error() {
    let state: Shared = Arc::new(Mutex::new(Upstream::default()));
    let addr = spawn_upstream(state).await;
    let mut client = client(addr, "wrong");

    let err = client.authenticate().await.unwrap_err();
    assert_eq!(err.exit_code(), 2);
    assert!(!client.is_authenticated());
}

#[tokio::test]
async fn test_calls_before_authentication_fail_locally() {
    let state: Shared = Arc::new(Mutex::new(Upstream::default()));
    let addr = spawn_upstream(Arc::clone(&state)).await;
    let client = client(addr, "pw");

    let err = client.list_posts(1, 10, None).await.unwrap_err();
    assert!(err.to_string().contains("not authenticated"));
    assert!(state.lock().unwrap().post_queries.is_empty());
}

#[tokio::test]
async fn test_upload_then_create_post() {
    let (client, state) = setup().await;

    let uploaded = client
        .upload_media(&MediaItem::new(b"\x89PNG\r\n\x1a\nrest".to_vec(), "a.png"))
        .await
        .unwrap();
    assert_eq!(uploaded.id, RemoteId::Number(55));
    assert_eq!(uploaded.url.as_deref(), Some("https://blog.test/a.png"));

    client.update_media_alt_text(&uploaded.id, "A picture").await.unwrap();

    let draft = PostDraft {
        title: Some("Hello".to_string()),
        body: "<p>Hi</p>".to_string(),
        featured_media: Some(uploaded.id.clone()),
        categories: vec!["news".to_string(), "rust".to_string()],
        ..Default::default()
    };
    let created = client.create_post(&draft).await.unwrap();
    assert_eq!(created.id, RemoteId::Number(77));
    assert_eq!(created.link.as_deref(), Some("https://blog.test/2024/hello"));

    let upstream = state.lock().unwrap();
    assert_eq!(upstream.unauthorized, 0);
    assert_eq!(upstream.alt_texts, vec![(55, json!({"alt_text": "A picture"}))]);
    assert_eq!(
        upstream.created[0],
        json!({
            "title": "Hello",
            "content": "<p>Hi</p>",
            "status": "publish",
            "featured_image": 55,
            "categories": "news,rust"
        })
    );
}

#[tokio::test]
async fn test_upload_without_url_fails_closed() {
    let (client, state) = setup().await;
    state.lock().unwrap().upload_response = json!({"media": [{"ID": 56}]});

    let err = client
        .upload_media(&MediaItem::new(vec![1, 2, 3], "x.bin"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no URL field recognized"));
}

#[tokio::test]
async fn test_list_and_delete_posts() {
    let (client, state) = setup().await;

    let posts = client.list_posts(2, 50, None).await.unwrap();
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0].title, "First");
    assert_eq!(posts[0].url.as_deref(), Some("https://blog.test/first"));
    assert_eq!(posts[1].url, None);

    client.delete_post(1, false).await.unwrap();
    client.delete_post(2, true).await.unwrap();

    let err = client.delete_post(404, false).await.unwrap_err();
    assert!(err.to_string().contains("HTTP 404"));

    let upstream = state.lock().unwrap();
    assert_eq!(upstream.post_queries[0]["page"], "2");
    assert_eq!(upstream.post_queries[0]["number"], "50");
    assert_eq!(upstream.deletes, vec![(1, false), (2, true)]);
}

#[tokio::test]
async fn test_empty_trash_skips_failures() {
    let (client, state) = setup().await;
    state.lock().unwrap().trash = vec![5, 404, 6];

    let purged = client.empty_trash().await.unwrap();
    assert_eq!(purged, vec![5, 6]);

    let upstream = state.lock().unwrap();
    assert_eq!(upstream.deletes, vec![(5, true), (6, true)]);
    assert_eq!(upstream.post_queries[0]["status"], "trash");
    assert_eq!(upstream.post_queries[0]["number"], "100");
}

#[tokio::test]
async fn test_empty_trash_purges_past_first_page() {
    let (client, state) = setup().await;
    state.lock().unwrap().trash = (1000..1150).collect();

    let purged = client.empty_trash().await.unwrap();
    assert_eq!(purged.len(), 150);

    let upstream = state.lock().unwrap();
    assert!(upstream.trash.is_empty());
    let pages: Vec<&str> = upstream
        .post_queries
        .iter()
        .map(|q| q["page"].as_str())
        .collect();
    assert_eq!(pages, vec!["1", "2"]);
}

#[tokio::test]
async fn test_statistics_parsing() {
    let (client, _state) = setup().await;

    let views = client.post_views(9, 3).await.unwrap();
    assert_eq!(views.views, json!(12));
    assert_eq!(views.daily, vec![5, 7]);

    let terms = client.search_terms(7).await.unwrap();
    assert_eq!(terms.len(), 2);
    assert_eq!(terms[0].term, "rust async");
    assert_eq!(terms[0].views, 4);
    assert_eq!(terms[1].term, "42");
    assert_eq!(terms[1].views, 3);
}

#[tokio::test]
async fn test_protected_media_urls_from_site_info() {
    let (client, _state) = setup().await;

    let urls = client.protected_media_urls().await.unwrap();
    assert_eq!(urls.len(), 2);
    assert!(urls.contains("https://blog.test/icon.png"));
    assert!(urls.contains("https://blog.test/logo.png"));
}
