//! Metadata injection into the portal's HTML shell.
//!
//! Two strategies share one entry point, picked by inspecting the template:
//!
//! - **Placeholder**: the template carries tokens such as `__TITLE__`; every
//!   occurrence is substituted in one pass, then the structural pass fills in
//!   any managed element the template lacks. Inserted values have `__` broken
//!   up as `_&#95;`, so they never form a token.
//! - **Structural**: existing `<title>`, `<meta>` and canonical `<link>`
//!   elements inside `<head>` get their text/`content`/`href` rewritten in
//!   place. Managed elements that are missing are inserted together right
//!   after the opening `<head>` tag.
//!
//! Only attribute values and title text are touched, so injecting the same
//! metadata into the output again yields the same bytes. A post-pass keeps
//! only the first canonical link. Templates without a `<head>` element are
//! returned unmodified.

use regex::{Captures, Regex};
use std::sync::LazyLock;

use crate::models::{PageMetadata, RenderedDocument};

static HEAD_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<head(?:\s[^>]*)?>").expect("valid head regex"));
static HEAD_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</head\s*>").expect("valid head close regex"));
static BODY_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<body\b").expect("valid body regex"));
static TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)(<title\b[^>]*>).*?(</title\s*>)").expect("valid title regex")
});
static CANONICAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<link\b[^>]*?\srel\s*=\s*["']?canonical["']?[^>]*>"#)
        .expect("valid canonical regex")
});
static CONTENT_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(\s)content\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'>]+)"#)
        .expect("valid content regex")
});
static HREF_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(\s)href\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'>]+)"#).expect("valid href regex")
});

/// Which metadata value an element or token carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Description,
    Image,
    Url,
    Type,
    Keywords,
    SiteName,
    Locale,
    Literal(&'static str),
}

/// Placeholder tokens understood by the placeholder strategy.
const PLACEHOLDERS: &[(&str, Field)] = &[
    ("__TITLE__", Field::Title),
    ("__DESCRIPTION__", Field::Description),
    ("__IMAGE__", Field::Image),
    ("__URL__", Field::Url),
    ("__TYPE__", Field::Type),
    ("__KEYWORDS__", Field::Keywords),
    ("__SITE_NAME__", Field::SiteName),
    ("__LOCALE__", Field::Locale),
];

/// All placeholder tokens as one alternation, matched in a single pass.
static PLACEHOLDER_TOKENS: LazyLock<Regex> = LazyLock::new(|| {
    let alternation = PLACEHOLDERS
        .iter()
        .map(|(token, _)| regex::escape(token))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&alternation).expect("valid placeholder regex")
});

#[derive(Debug, Clone, Copy)]
enum Element {
    Title,
    Meta { attr: &'static str, key: &'static str },
    Canonical,
}

/// Managed head elements, in insertion order.
const MANAGED: &[(Element, Field)] = &[
    (Element::Title, Field::Title),
    (Element::Meta { attr: "name", key: "title" }, Field::Title),
    (Element::Meta { attr: "name", key: "description" }, Field::Description),
    (Element::Meta { attr: "name", key: "keywords" }, Field::Keywords),
    (Element::Meta { attr: "name", key: "robots" }, Field::Literal("index, follow")),
    (Element::Meta { attr: "property", key: "og:type" }, Field::Type),
    (Element::Meta { attr: "property", key: "og:url" }, Field::Url),
    (Element::Meta { attr: "property", key: "og:title" }, Field::Title),
    (Element::Meta { attr: "property", key: "og:description" }, Field::Description),
    (Element::Meta { attr: "property", key: "og:image" }, Field::Image),
    (Element::Meta { attr: "property", key: "og:image:width" }, Field::Literal("1200")),
    (Element::Meta { attr: "property", key: "og:image:height" }, Field::Literal("630")),
    (Element::Meta { attr: "property", key: "og:site_name" }, Field::SiteName),
    (Element::Meta { attr: "property", key: "og:locale" }, Field::Locale),
    (
        Element::Meta { attr: "name", key: "twitter:card" },
        Field::Literal("summary_large_image"),
    ),
    (Element::Meta { attr: "name", key: "twitter:url" }, Field::Url),
    (Element::Meta { attr: "name", key: "twitter:title" }, Field::Title),
    (Element::Meta { attr: "name", key: "twitter:description" }, Field::Description),
    (Element::Meta { attr: "name", key: "twitter:image" }, Field::Image),
    (Element::Canonical, Field::Url),
];

/// Compiled matchers for [`MANAGED`], index-aligned.
static MANAGED_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    MANAGED
        .iter()
        .map(|(element, _)| match element {
            Element::Title => TITLE.clone(),
            Element::Canonical => CANONICAL.clone(),
            Element::Meta { key, .. } => Regex::new(&format!(
                r#"(?i)<meta\b[^>]*?\s(?:name|property)\s*=\s*["']{}["'][^>]*>"#,
                regex::escape(key)
            ))
            .expect("valid meta regex"),
        })
        .collect()
});

/// Escape text for use in HTML text and double-quoted attributes.
pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            other => out.push(other),
        }
    }
    out
}

/// Injection strategy chosen for a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Placeholder,
    Structural,
}

impl Strategy {
    /// Capability check: placeholder strategy when any known token is present.
    pub fn for_template(template: &str) -> Self {
        if PLACEHOLDERS.iter().any(|(token, _)| template.contains(token)) {
            Strategy::Placeholder
        } else {
            Strategy::Structural
        }
    }
}

/// Escaped values ready for insertion.
struct Values {
    title: String,
    description: String,
    image: String,
    url: String,
    content_type: String,
    keywords: String,
    site_name: String,
    locale: String,
}

/// Escape `value` and break up `__` so inserted text never reads as a token.
fn insertable(value: &str) -> String {
    escape_html(value).replace("__", "_&#95;")
}

impl Values {
    fn new(meta: &PageMetadata, site_name: &str, locale: &str) -> Self {
        Self {
            title: insertable(&meta.title),
            description: insertable(&meta.description),
            image: insertable(&meta.image),
            url: insertable(&meta.canonical_url),
            content_type: insertable(meta.content_type.as_str()),
            keywords: insertable(&meta.keywords_joined()),
            site_name: insertable(site_name),
            locale: insertable(locale),
        }
    }

    fn get(&self, field: Field) -> &str {
        match field {
            Field::Title => &self.title,
            Field::Description => &self.description,
            Field::Image => &self.image,
            Field::Url => &self.url,
            Field::Type => &self.content_type,
            Field::Keywords => &self.keywords,
            Field::SiteName => &self.site_name,
            Field::Locale => &self.locale,
            Field::Literal(value) => value,
        }
    }
}

/// Injects [`PageMetadata`] into an HTML template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateInjector {
    site_name: String,
    locale: String,
}

impl Default for TemplateInjector {
    fn default() -> Self {
        Self::new("Brzi.info", "hr_HR")
    }
}

impl TemplateInjector {
    pub fn new(site_name: impl Into<String>, locale: impl Into<String>) -> Self {
        Self {
            site_name: site_name.into(),
            locale: locale.into(),
        }
    }

    /// Render `template` with `meta` injected.
    pub fn inject(&self, template: &str, meta: &PageMetadata) -> RenderedDocument {
        let values = Values::new(meta, &self.site_name, &self.locale);

        let html = if HEAD_OPEN.is_match(template) {
            let substituted = match Strategy::for_template(template) {
                Strategy::Placeholder => substitute_placeholders(template, &values),
                Strategy::Structural => template.to_string(),
            };
            let rewritten = rewrite_head(&substituted, &values).unwrap_or(substituted);
            dedupe_canonical(&rewritten)
        } else {
            template.to_string()
        };

        RenderedDocument {
            html,
            canonical_url: meta.canonical_url.clone(),
        }
    }
}

fn substitute_placeholders(template: &str, values: &Values) -> String {
    PLACEHOLDER_TOKENS
        .replace_all(template, |caps: &Captures| {
            PLACEHOLDERS
                .iter()
                .find(|(token, _)| *token == &caps[0])
                .map(|(_, field)| values.get(*field))
                .unwrap_or(&caps[0])
                .to_string()
        })
        .into_owned()
}

/// Rewrite managed elements inside `<head>`; `None` if there is no head.
///
/// Without `</head>` the head ends at `<body`, or at the end of the document.
fn rewrite_head(html: &str, values: &Values) -> Option<String> {
    let open = HEAD_OPEN.find(html)?;
    let head_start = open.end();
    let head_end = HEAD_CLOSE
        .find_at(html, head_start)
        .or_else(|| BODY_OPEN.find_at(html, head_start))
        .map(|m| m.start())
        .unwrap_or(html.len());

    let mut head = html[head_start..head_end].to_string();
    let mut missing = String::new();

    for ((element, field), pattern) in MANAGED.iter().zip(MANAGED_PATTERNS.iter()) {
        let value = values.get(*field);
        if pattern.is_match(&head) {
            head = pattern
                .replace_all(&head, |caps: &Captures| rewrite_element(*element, caps, value))
                .into_owned();
        } else {
            missing.push_str("\n    ");
            missing.push_str(&render_element(*element, value));
        }
    }

    Some(format!(
        "{}{}{}{}",
        &html[..head_start],
        missing,
        head,
        &html[head_end..]
    ))
}

fn render_element(element: Element, value: &str) -> String {
    match element {
        Element::Title => format!("<title>{}</title>", value),
        Element::Meta { attr, key } => format!(r#"<meta {}="{}" content="{}">"#, attr, key, value),
        Element::Canonical => format!(r#"<link rel="canonical" href="{}">"#, value),
    }
}

fn rewrite_element(element: Element, caps: &Captures, value: &str) -> String {
    match element {
        Element::Title => format!("{}{}{}", &caps[1], value, &caps[2]),
        Element::Meta { .. } => set_attr(&caps[0], &CONTENT_ATTR, "content", value),
        Element::Canonical => set_attr(&caps[0], &HREF_ATTR, "href", value),
    }
}

/// Set `name="value"` on a single tag, adding the attribute if absent.
fn set_attr(tag: &str, attr: &Regex, name: &str, value: &str) -> String {
    if attr.is_match(tag) {
        return attr
            .replace(tag, |caps: &Captures| {
                format!(r#"{}{}="{}""#, &caps[1], name, value)
            })
            .into_owned();
    }

    let body = tag.trim_end_matches('>');
    let (body, close) = match body.strip_suffix('/') {
        Some(body) => (body.trim_end(), "/>"),
        None => (body.trim_end(), ">"),
    };
    format!(r#"{} {}="{}"{}"#, body, name, value, close)
}

/// Keep the first canonical link, drop the rest.
fn dedupe_canonical(html: &str) -> String {
    let mut matches = CANONICAL.find_iter(html);
    if matches.next().is_none() {
        return html.to_string();
    }

    let mut out = String::with_capacity(html.len());
    let mut last = 0;
    for extra in matches {
        out.push_str(&html[last..extra.start()]);
        last = extra.end();
    }
    out.push_str(&html[last..]);
    out
}
