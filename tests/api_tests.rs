use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use gachadex::clients::CharacterProvider;
use gachadex::config::Config;
use gachadex::models::RawCharacter;
use gachadex::state::SharedState;
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;

struct FakeProvider(Vec<RawCharacter>);

#[async_trait::async_trait]
impl CharacterProvider for FakeProvider {
    fn name(&self) -> &'static str {
        "anilist"
    }

    async fn fetch_characters(&self) -> Vec<RawCharacter> {
        self.0.clone()
    }
}

fn character(name: &str, anime: &str, favorites: u64, popularity: u64) -> RawCharacter {
    let mut c = RawCharacter::new("anilist", name, anime, format!("https://img.example/{name}.png"));
    c.favorites = favorites;
    c.anime_popularity = popularity;
    c
}

fn roster() -> Vec<RawCharacter> {
    vec![
        character("Goku", "Dragon Ball Z", 9000, 2_500_000),
        character("Vegeta", "Dragon Ball Z", 4000, 2_500_000),
        character("Krillin", "Dragon Ball Z", 900, 2_500_000),
        character("Yamcha", "Dragon Ball", 100, 50_000),
        character("Gohan", "Dragon Ball Z", 200, 0),
    ]
}

async fn spawn_app(initialize: bool) -> Router {
    let mut config = Config::default();
    config.cache.scheduler_enabled = false;

    let shared = Arc::new(SharedState::with_providers(
        config,
        vec![Arc::new(FakeProvider(roster()))],
    ));
    if initialize {
        shared.cache.initialize().await;
    }

    let state = gachadex::api::create_app_state(shared, None);
    gachadex::api::router(state).await
}

async fn get(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_character_routes_unavailable_before_initialize() {
    let app = spawn_app(false).await;

    for uri in [
        "/api/characters/random",
        "/api/characters/batch?count=3",
        "/api/characters/search?name=goku",
        "/api/characters/stats",
        "/api/characters/refresh",
        "/api/characters/1",
    ] {
        let (status, body) = get(&app, uri).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "{uri}");
        assert_eq!(body["success"], false);
        assert!(body["error"].is_string());
    }

    let (status, body) = get(&app, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["loaded"], false);
}

#[tokio::test]
async fn test_health_after_initialize() {
    let app = spawn_app(true).await;

    let (status, body) = get(&app, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["loaded"], true);
    assert_eq!(body["data"]["generation"], 1);
}

#[tokio::test]
async fn test_random_character() {
    let app = spawn_app(true).await;

    let (status, body) = get(&app, "/api/characters/random?rarity=legendary").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["name"], "Goku");
    assert_eq!(body["data"]["rarity"], "legendary");

    let (status, body) = get(&app, "/api/characters/random").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["rarity"], "common");

    let (status, _) = get(&app, "/api/characters/random?rarity=mythic").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_random_character_with_empty_cache_is_not_found() {
    let shared = Arc::new(SharedState::with_providers(
        Config::default(),
        vec![Arc::new(FakeProvider(Vec::new()))],
    ));
    shared.cache.initialize().await;
    let app = gachadex::api::router(gachadex::api::create_app_state(shared, None)).await;

    let (status, body) = get(&app, "/api/characters/random?rarity=epic").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_batch_repeats_last_rarity_and_clamps_count() {
    let app = spawn_app(true).await;

    let (status, body) =
        get(&app, "/api/characters/batch?count=4&rarities=legendary,epic").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 4);
    let tiers: Vec<&str> = body["data"]["characters"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["rarity"].as_str().unwrap())
        .collect();
    assert_eq!(tiers, vec!["legendary", "epic", "epic", "epic"]);

    let (status, body) = get(&app, "/api/characters/batch?count=50").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 10);

    let (status, body) = get(&app, "/api/characters/batch").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 1);

    let (status, _) = get(&app, "/api/characters/batch?rarities=rare,shiny").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_search() {
    let app = spawn_app(true).await;

    let (status, body) = get(&app, "/api/characters/search?name=GOKU").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 1);
    assert_eq!(body["data"]["results"][0]["name"], "Goku");

    let (status, body) = get(&app, "/api/characters/search?name=dragon%20ball&limit=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 2);

    let (status, _) = get(&app, "/api/characters/search").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&app, "/api/characters/search?name=%20%20").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stats_and_refresh() {
    let app = spawn_app(true).await;

    let (status, body) = get(&app, "/api/characters/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 5);
    assert_eq!(body["data"]["legendary"], 1);
    assert_eq!(body["data"]["epic"], 1);
    assert_eq!(body["data"]["generation"], 1);
    assert!(body["data"]["last_refresh"].is_string());

    let (status, body) = get(&app, "/api/characters/refresh").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["generation"], 2);
    assert_eq!(body["data"]["total"], 5);
}

#[tokio::test]
async fn test_character_by_id() {
    let app = spawn_app(true).await;

    let (_, body) = get(&app, "/api/characters/search?name=vegeta").await;
    let id = body["data"]["results"][0]["id"].as_u64().unwrap();

    let (status, body) = get(&app, &format!("/api/characters/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Vegeta");
    assert_eq!(body["data"]["rarity"], "epic");

    let (_, body) = get(&app, "/api/characters/search?name=dragon&limit=50").await;
    let unused = body["data"]["results"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|c| c["id"].as_u64())
        .max()
        .unwrap()
        + 1;
    let (status, body) = get(&app, &format!("/api/characters/{unused}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    let (status, body) = get(&app, "/api/characters/not-a-number").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_security_headers_present() {
    let app = spawn_app(true).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
    assert!(response.headers().get("x-request-id").is_some());
}

#[tokio::test]
async fn test_each_request_gets_its_own_request_id() {
    let app = spawn_app(true).await;

    let mut ids = Vec::new();
    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/characters/1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let id = response.headers().get("x-request-id").unwrap();
        ids.push(id.to_str().unwrap().to_string());
    }

    assert_eq!(ids[0].len(), 36);
    assert_ne!(ids[0], ids[1]);
}
