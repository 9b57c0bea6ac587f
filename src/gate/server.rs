//! HTTP front for the gate.
//!
//! Every request lands in one fallback handler:
//!
//! ```text
//! Request -> Classify -> Bot:   Resolve -> Inject -> Serve
//!                     -> Human: Passthrough
//! ```
//!
//! Non-GET/HEAD requests and static assets skip classification entirely.

use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::{Method, Request, Response};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use super::classifier::BotCatalog;
use super::dispatch::{DispatchPolicy, SECURITY_HEADERS, attach_meta_headers, dispatch};
use super::inject::TemplateInjector;
use super::passthrough::Passthrough;
use super::resolver::MetadataResolver;
use super::source::ArticleSource;
use super::template::TemplateLoader;
use crate::Result;
use crate::models::{AgentClass, RenderedDocument, RequestContext};

/// Path prefixes served straight from the passthrough.
const ASSET_PREFIXES: &[&str] = &["/assets", "/static", "/api"];

/// File extensions served straight from the passthrough.
const ASSET_EXTENSIONS: &[&str] = &[
    "js", "mjs", "css", "png", "jpg", "jpeg", "gif", "svg", "ico", "webp", "avif", "woff",
    "woff2", "ttf", "map", "txt", "xml", "json", "webmanifest",
];

/// Whether `path` names a static asset rather than a page.
pub fn is_asset_path(path: &str) -> bool {
    if path == "/favicon.ico" {
        return true;
    }
    let under_prefix = ASSET_PREFIXES.iter().any(|prefix| {
        path.strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    });
    if under_prefix {
        return true;
    }

    let last = path.rsplit('/').next().unwrap_or("");
    match last.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ASSET_EXTENSIONS
            .iter()
            .any(|known| ext.eq_ignore_ascii_case(known)),
        _ => false,
    }
}

/// Everything needed to answer a request.
pub struct Gate<S> {
    catalog: BotCatalog,
    resolver: MetadataResolver,
    injector: TemplateInjector,
    templates: TemplateLoader,
    policy: DispatchPolicy,
    passthrough: Passthrough,
    source: S,
    meta_headers: bool,
    security_headers: bool,
}

impl<S: ArticleSource> Gate<S> {
    pub fn new(
        resolver: MetadataResolver,
        templates: TemplateLoader,
        passthrough: Passthrough,
        source: S,
    ) -> Self {
        let site = resolver.site();
        let injector = TemplateInjector::new(site.site_name.clone(), site.locale.clone());
        Self {
            catalog: BotCatalog::default(),
            resolver,
            injector,
            templates,
            policy: DispatchPolicy::default(),
            passthrough,
            source,
            meta_headers: false,
            security_headers: true,
        }
    }

    pub fn with_catalog(mut self, catalog: BotCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_policy(mut self, policy: DispatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_meta_headers(mut self, enabled: bool) -> Self {
        self.meta_headers = enabled;
        self
    }

    pub fn with_security_headers(mut self, enabled: bool) -> Self {
        self.security_headers = enabled;
        self
    }

    /// Answer one request. Never fails.
    pub async fn handle(&self, request: Request<Body>) -> Response<Body> {
        let method = request.method();
        if (method != Method::GET && method != Method::HEAD) || is_asset_path(request.uri().path())
        {
            return self.passthrough.respond(request).await;
        }

        let ctx = RequestContext::from_request(request.uri(), request.headers());
        let class = self.catalog.classify(&ctx.user_agent);
        debug!(url = %ctx.url, class = %class, "classified request");

        match class {
            AgentClass::Bot => {
                let document = self.render(&ctx.path).await;
                dispatch(class, document, &self.policy, || {
                    self.passthrough.respond(request)
                })
                .await
            }
            AgentClass::Human if self.meta_headers => {
                let meta = self.resolver.resolve_static(&ctx.path);
                let mut response = self.passthrough.respond(request).await;
                attach_meta_headers(response.headers_mut(), &meta);
                response
            }
            AgentClass::Human => self.passthrough.respond(request).await,
        }
    }

    /// Resolve and inject metadata for `path`; `None` when the template is unavailable.
    pub async fn render(&self, path: &str) -> Option<RenderedDocument> {
        let template = match self.templates.load().await {
            Ok(template) => template,
            Err(e) => {
                warn!(
                    source = %self.templates.source().describe(),
                    error = %e,
                    "template unavailable, passing bot through"
                );
                return None;
            }
        };
        let meta = self.resolver.resolve(path, &self.source).await;
        Some(self.injector.inject(&template, &meta))
    }
}

async fn handle_request<S: ArticleSource + 'static>(
    State(gate): State<Arc<Gate<S>>>,
    request: Request<Body>,
) -> Response<Body> {
    gate.handle(request).await
}

/// Build the application router around `gate`.
pub fn router<S: ArticleSource + 'static>(gate: Gate<S>) -> Router {
    let security_headers = gate.security_headers;
    let mut app = Router::new()
        .fallback(handle_request::<S>)
        .with_state(Arc::new(gate));

    if security_headers {
        for (name, value) in SECURITY_HEADERS {
            app = app.layer(SetResponseHeaderLayer::if_not_present(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            ));
        }
    }

    app.layer(TraceLayer::new_for_http())
}

/// Serve `gate` on `addr` until Ctrl+C.
pub async fn start_server<S: ArticleSource + 'static>(gate: Gate<S>, addr: SocketAddr) -> Result<()> {
    let passthrough = gate.passthrough.describe();
    let app = router(gate);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, %passthrough, "seogate listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("seogate stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
