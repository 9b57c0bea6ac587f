//! Data models flowing through the gate.
//!
//! This module defines the core data structures:
//! - `RequestContext` - The per-request view the gate works from
//! - `AgentClass` - Bot or human, as decided by the classifier
//! - `PageMetadata` - The canonical SEO payload for a path
//! - `ArticleRecord` - An article row from the external data source
//! - `RenderedDocument` - The pre-rendered HTML served to bots

pub mod article;
pub mod metadata;

pub use article::{ArticleKey, ArticleRecord, LookupKey};
pub use metadata::{AgentClass, ContentType, PageMetadata, RenderedDocument, RequestContext};
