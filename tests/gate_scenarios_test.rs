//! End-to-end scenarios for the gate router.
//!
//! Requests are driven through `tower::ServiceExt::oneshot` against a gate
//! backed by the portal shell on disk and a mock article service.

mod common;

use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, Response, StatusCode, header};
use common::{MockArticles, SHELL, TestEnv};
use seogate::gate::{
    Gate, MetadataResolver, Passthrough, RestArticleSource, StaticSite, TemplateLoader,
    TemplateSource, router,
};
use serde_json::json;
use std::time::Duration;
use tower::ServiceExt;

const GOOGLEBOT: &str =
    "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";
const FACEBOOK: &str = "facebookexternalhit/1.1 (+http://www.facebook.com/externalhit_uatext.php)";
const CHROME: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

fn gate(env: &TestEnv, endpoint: Option<&str>) -> Gate<Option<RestArticleSource>> {
    let source = endpoint.map(|endpoint| {
        RestArticleSource::new(
            endpoint,
            Some("anon-key".to_string()),
            RestArticleSource::DEFAULT_TABLE,
            Duration::from_secs(3),
        )
        .unwrap()
    });
    Gate::new(
        MetadataResolver::default(),
        TemplateLoader::new(
            TemplateSource::File(env.site_path().join("index.html")),
            reqwest::Client::new(),
        ),
        Passthrough::Static(StaticSite::new(env.site_path())),
        source,
    )
}

fn get(path: &str, user_agent: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(path)
        .header(header::USER_AGENT, user_agent)
        .body(Body::empty())
        .unwrap()
}

async fn body_string(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

// ==================== Home Page ====================

#[tokio::test]
async fn test_googlebot_home_gets_default_title_and_vary() {
    let env = TestEnv::new();
    let app = router(gate(&env, None));

    let response = app.oneshot(get("/", "Googlebot/2.1")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::VARY], "User-Agent");
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/html; charset=utf-8"
    );
    assert_eq!(
        response.headers()[header::LINK],
        "<https://brzi.info/>; rel=\"canonical\""
    );
    let body = body_string(response).await;
    assert!(body.contains("<title>Brzi.info - Najnovije vijesti</title>"));
    assert!(body.contains(r#"<meta property="og:type" content="website">"#));
}

// ==================== Human Passthrough ====================

#[tokio::test]
async fn test_browser_gets_passthrough_unchanged() {
    let env = TestEnv::new();
    let articles = MockArticles::start(Vec::new()).await;
    let app = router(gate(&env, Some(&articles.endpoint)));

    let response = app.oneshot(get("/vijesti", CHROME)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::VARY).is_none());
    assert!(response.headers().get("x-robots-tag").is_none());
    assert_eq!(body_string(response).await, SHELL);
    assert!(articles.requests().is_empty());
}

// ==================== Article Pages ====================

#[tokio::test]
async fn test_article_page_for_link_preview_bot() {
    let env = TestEnv::new();
    let articles = MockArticles::start(vec![json!({
        "id": 123,
        "title": "Pobjeda \"Dinama\"",
        "summary": "```json\n{\"summary\": \"Dinamo je slavio u derbiju.\"}\n```",
        "image_url": "/img/a.jpg",
        "keywords": ["nogomet"],
        "category_name": "Sport"
    })])
    .await;
    let app = router(gate(&env, Some(&articles.endpoint)));

    let response = app
        .oneshot(get("/sport/utakmica-123", FACEBOOK))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("<title>Pobjeda &quot;Dinama&quot;</title>"));
    assert!(body.contains(
        r#"<meta name="description" content="Dinamo je slavio u derbiju." />"#
    ));
    assert!(body.contains(r#"<meta property="og:image" content="https://brzi.info/img/a.jpg">"#));
    assert!(body.contains(r#"<meta property="og:type" content="article">"#));
    assert!(body.contains(r#"<meta name="keywords" content="nogomet, sport, vijesti">"#));
    assert!(body.contains(
        r#"<link rel="canonical" href="https://brzi.info/sport/utakmica-123" />"#
    ));
    assert_eq!(body.matches(r#"rel="canonical""#).count(), 1);

    assert_eq!(articles.requests(), vec!["id=eq.123", "apikey"]);
}

#[tokio::test]
async fn test_article_lookup_500_still_serves_bot() {
    let env = TestEnv::new();
    let articles = MockArticles::failing(StatusCode::INTERNAL_SERVER_ERROR).await;
    let app = router(gate(&env, Some(&articles.endpoint)));

    let response = app
        .oneshot(get("/sport/utakmica-123", GOOGLEBOT))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::VARY], "User-Agent");
    let body = body_string(response).await;
    assert!(body.contains("<title>Sport vijesti - Brzi.info</title>"));
    assert!(body.contains(r#"<meta property="og:type" content="website">"#));
}

#[tokio::test]
async fn test_article_not_found_uses_category_metadata() {
    let env = TestEnv::new();
    let articles = MockArticles::start(Vec::new()).await;
    let app = router(gate(&env, Some(&articles.endpoint)));

    let response = app
        .oneshot(get("/politika/izbori-77", "Twitterbot/1.0"))
        .await
        .unwrap();

    let body = body_string(response).await;
    assert!(body.contains("<title>Politika vijesti - Brzi.info</title>"));
    assert!(body.contains(
        r#"<link rel="canonical" href="https://brzi.info/politika/izbori-77" />"#
    ));
    assert_eq!(articles.requests(), vec!["id=eq.77", "apikey"]);
}

#[tokio::test]
async fn test_unreachable_data_source_still_serves_bot() {
    let env = TestEnv::new();
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let endpoint = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    let app = router(gate(&env, Some(&endpoint)));

    let response = app
        .oneshot(get("/sport/utakmica-123", GOOGLEBOT))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("<title>Sport vijesti - Brzi.info</title>"));
}

// ==================== Assets and Methods ====================

#[tokio::test]
async fn test_bot_fetching_asset_is_not_rendered() {
    let env = TestEnv::new();
    std::fs::create_dir(env.site_path().join("assets")).unwrap();
    std::fs::write(env.site_path().join("assets/index.js"), "export {}").unwrap();
    let app = router(gate(&env, None));

    let response = app
        .oneshot(get("/assets/index.js", GOOGLEBOT))
        .await
        .unwrap();

    assert!(response.headers().get("x-robots-tag").is_none());
    assert_eq!(body_string(response).await, "export {}");
}

#[tokio::test]
async fn test_bot_post_is_passed_through() {
    let env = TestEnv::new();
    let app = router(gate(&env, None));

    let request = Request::builder()
        .method(Method::POST)
        .uri("/")
        .header(header::USER_AGENT, GOOGLEBOT)
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert!(response.headers().get("x-robots-tag").is_none());
}

#[tokio::test]
async fn test_security_headers_on_every_response() {
    let env = TestEnv::new();

    for user_agent in [GOOGLEBOT, CHROME] {
        let app = router(gate(&env, None));
        let response = app.oneshot(get("/", user_agent)).await.unwrap();
        let headers = response.headers();
        assert_eq!(headers["x-content-type-options"], "nosniff");
        assert_eq!(headers["referrer-policy"], "strict-origin-when-cross-origin");
        assert_eq!(headers["strict-transport-security"], "max-age=63072000");
    }
}
