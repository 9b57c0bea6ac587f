//! The SEO rendering gate.
//!
//! Bots get server-rendered metadata injected into the portal's HTML shell;
//! humans get the portal untouched. Each stage lives in its own module:
//!
//! - [`classifier`] - user agent to [`AgentClass`](crate::models::AgentClass)
//! - [`resolver`] - request path to [`PageMetadata`](crate::models::PageMetadata)
//! - [`inject`] - metadata into the template
//! - [`dispatch`] - picking and decorating the response
//! - [`server`] - the axum front tying them together

pub mod classifier;
pub mod dispatch;
pub mod inject;
pub mod passthrough;
pub mod resolver;
pub mod server;
pub mod slug;
pub mod source;
pub mod template;

pub use classifier::{BotCatalog, classify};
pub use dispatch::{DispatchPolicy, attach_meta_headers, bot_response, dispatch};
pub use inject::{Strategy, TemplateInjector};
pub use passthrough::{Passthrough, StaticSite, UpstreamOrigin};
pub use resolver::{MetadataResolver, PathShape, SiteProfile};
pub use server::{Gate, router, start_server};
pub use source::{ArticleSource, MemoryArticleSource, RestArticleSource};
pub use template::{TemplateCache, TemplateLoader, TemplateSource};
