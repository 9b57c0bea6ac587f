//! Response dispatch: rendered HTML for bots, passthrough for everyone else.

use axum::body::Body;
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::{Response, StatusCode};
use std::future::Future;
use tracing::debug;

use crate::models::{AgentClass, PageMetadata, RenderedDocument};
use crate::{Error, Result};

/// Default bot `Cache-Control`: CDN cacheable with revalidation.
pub const DEFAULT_CACHE_CONTROL: &str = "public, max-age=300, stale-while-revalidate=600";

const X_ROBOTS_TAG: &str = "x-robots-tag";

/// Security headers attached to every response when enabled.
///
/// Applied as a router layer; values already set by the passthrough win.
pub const SECURITY_HEADERS: &[(&str, &str)] = &[
    ("x-dns-prefetch-control", "on"),
    ("strict-transport-security", "max-age=63072000"),
    ("x-frame-options", "SAMEORIGIN"),
    ("x-content-type-options", "nosniff"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
];

/// Header settings for the bot path.
#[derive(Debug, Clone)]
pub struct DispatchPolicy {
    cache_control: HeaderValue,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            cache_control: HeaderValue::from_static(DEFAULT_CACHE_CONTROL),
        }
    }
}

impl DispatchPolicy {
    /// Policy with a custom `Cache-Control` value.
    pub fn new(cache_control: &str) -> Result<Self> {
        let cache_control = HeaderValue::from_str(cache_control).map_err(|_| {
            Error::InvalidConfig(format!("invalid cache-control value: {:?}", cache_control))
        })?;
        Ok(Self { cache_control })
    }

    pub fn cache_control(&self) -> &str {
        self.cache_control.to_str().unwrap_or(DEFAULT_CACHE_CONTROL)
    }
}

/// Pick the response for a classified request.
///
/// Bots with a rendered document get [`bot_response`]. Humans, and bots whose
/// document could not be produced, get whatever `passthrough` returns,
/// untouched.
pub async fn dispatch<F, Fut>(
    class: AgentClass,
    document: Option<RenderedDocument>,
    policy: &DispatchPolicy,
    passthrough: F,
) -> Response<Body>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Response<Body>>,
{
    match (class, document) {
        (AgentClass::Bot, Some(document)) => bot_response(document, policy),
        (AgentClass::Bot, None) => {
            debug!("no rendered document for bot, passing through");
            passthrough().await
        }
        (AgentClass::Human, _) => passthrough().await,
    }
}

/// The 200 HTML response served to bots.
pub fn bot_response(document: RenderedDocument, policy: &DispatchPolicy) -> Response<Body> {
    let mut response = Response::new(Body::from(document.html));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    headers.insert(header::CACHE_CONTROL, policy.cache_control.clone());
    headers.insert(
        HeaderName::from_static(X_ROBOTS_TAG),
        HeaderValue::from_static("index, follow"),
    );
    headers.insert(header::VARY, HeaderValue::from_static("User-Agent"));

    match HeaderValue::from_str(&format!("<{}>; rel=\"canonical\"", document.canonical_url)) {
        Ok(link) => {
            headers.insert(header::LINK, link);
        }
        Err(_) => debug!(url = %document.canonical_url, "canonical URL is not a valid header value"),
    }

    response
}

/// Mirror metadata as informational `X-Meta-*` headers.
///
/// Values that cannot be carried in a header are skipped; existing headers
/// and the body are never touched otherwise.
pub fn attach_meta_headers(headers: &mut HeaderMap, meta: &PageMetadata) {
    let keywords = meta.keywords_joined();
    let fields: [(&'static str, &str); 6] = [
        ("x-meta-title", &meta.title),
        ("x-meta-description", &meta.description),
        ("x-meta-image", &meta.image),
        ("x-meta-type", meta.content_type.as_str()),
        ("x-meta-url", &meta.canonical_url),
        ("x-meta-keywords", &keywords),
    ];

    for (name, value) in fields {
        match HeaderValue::from_bytes(value.as_bytes()) {
            Ok(value) => {
                headers.insert(HeaderName::from_static(name), value);
            }
            Err(_) => debug!(header = name, "skipping metadata header with invalid value"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentType;
    use axum::body::to_bytes;

    fn document() -> RenderedDocument {
        RenderedDocument {
            html: "<html><head><title>Pobjeda</title></head></html>".to_string(),
            canonical_url: "https://brzi.info/sport/utakmica-123".to_string(),
        }
    }

    fn shell() -> Response<Body> {
        let mut response = Response::new(Body::from("<div id=\"root\"></div>"));
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));
        response
    }

    async fn body_string(response: Response<Body>) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    // ==================== Bot Path Tests ====================

    #[tokio::test]
    async fn test_bot_gets_rendered_document() {
        let response = dispatch(
            AgentClass::Bot,
            Some(document()),
            &DispatchPolicy::default(),
            || async { shell() },
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "text/html; charset=utf-8");
        assert_eq!(headers[header::CACHE_CONTROL], DEFAULT_CACHE_CONTROL);
        assert_eq!(headers[X_ROBOTS_TAG], "index, follow");
        assert_eq!(headers[header::VARY], "User-Agent");
        assert_eq!(
            headers[header::LINK],
            "<https://brzi.info/sport/utakmica-123>; rel=\"canonical\""
        );
        let body = body_string(response).await;
        assert!(body.contains("<title>Pobjeda</title>"));
        assert!(!body.contains("root"));
    }

    #[tokio::test]
    async fn test_bot_without_document_passes_through() {
        let response = dispatch(AgentClass::Bot, None, &DispatchPolicy::default(), || async {
            shell()
        })
        .await;
        assert!(response.headers().get(header::VARY).is_none());
        assert_eq!(body_string(response).await, "<div id=\"root\"></div>");
    }

    #[test]
    fn test_custom_cache_control() {
        let policy = DispatchPolicy::new("public, max-age=60").unwrap();
        let response = bot_response(document(), &policy);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "public, max-age=60");
    }

    #[test]
    fn test_invalid_cache_control_rejected() {
        let err = DispatchPolicy::new("bad\nvalue").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    // ==================== Human Path Tests ====================

    #[tokio::test]
    async fn test_human_passthrough_unchanged() {
        let response = dispatch(
            AgentClass::Human,
            Some(document()),
            &DispatchPolicy::default(),
            || async { shell() },
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");
        assert!(response.headers().get(X_ROBOTS_TAG).is_none());
        assert_eq!(body_string(response).await, "<div id=\"root\"></div>");
    }

    // ==================== Header Helper Tests ====================

    #[test]
    fn test_meta_headers_skip_invalid_values() {
        let meta = PageMetadata {
            title: "Naslov\nu dva reda".to_string(),
            description: "Opis".to_string(),
            image: "https://brzi.info/img/a.jpg".to_string(),
            content_type: ContentType::Article,
            canonical_url: "https://brzi.info/sport/a-1".to_string(),
            keywords: vec!["sport".to_string(), "vijesti".to_string()],
        };
        let mut headers = HeaderMap::new();
        attach_meta_headers(&mut headers, &meta);

        assert!(headers.get("x-meta-title").is_none());
        assert_eq!(headers["x-meta-description"], "Opis");
        assert_eq!(headers["x-meta-type"], "article");
        assert_eq!(headers["x-meta-keywords"], "sport, vijesti");
    }
}
