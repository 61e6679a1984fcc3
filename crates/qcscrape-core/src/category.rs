//! Category listing URLs and the compact `l1_l2_id1_id2` pattern token.
//!
//! The pattern names raw-capture directories and log lines. It can be derived
//! from a listing URL or built straight from category metadata; both paths
//! produce the same token because names are slugified before joining.

use std::sync::LazyLock;

use regex::Regex;

use crate::products::CategoryContext;

static CATEGORY_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/cn/([^/]+)/([^/]+)/cid/(\d+)/(\d+)").expect("valid regex")
});

/// Token used when a URL carries no usable path segments.
pub const FALLBACK_PATTERN: &str = "category";

/// Lowercases and trims `name`, replacing each space with a hyphen.
#[must_use]
pub fn slugify(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "-")
}

/// Builds the storefront listing URL for a category.
///
/// ```text
/// https://<host>/cn/<l1-slug>/<l2-slug>/cid/<l1_id>/<l2_id>
/// ```
#[must_use]
pub fn category_url(host: &str, ctx: &CategoryContext) -> String {
    format!(
        "https://{}/cn/{}/{}/cid/{}/{}",
        host.trim_end_matches('/'),
        slugify(&ctx.l1_category),
        slugify(&ctx.l2_category),
        ctx.l1_category_id.trim(),
        ctx.l2_category_id.trim(),
    )
}

/// Builds the category pattern token directly from category metadata.
#[must_use]
pub fn category_pattern(ctx: &CategoryContext) -> String {
    join_pattern(
        &slugify(&ctx.l1_category),
        &slugify(&ctx.l2_category),
        ctx.l1_category_id.trim(),
        ctx.l2_category_id.trim(),
    )
}

/// Extracts the category pattern token from a listing URL.
///
/// Falls back to the last two non-empty path segments joined by `_` when the
/// URL does not follow the `/cn/.../cid/...` layout, and to
/// [`FALLBACK_PATTERN`] when fewer than two segments exist.
#[must_use]
pub fn category_pattern_from_url(url: &str) -> String {
    if let Some(caps) = CATEGORY_URL_RE.captures(url) {
        return join_pattern(&caps[1], &caps[2], &caps[3], &caps[4]);
    }

    let parts: Vec<&str> = url.split('/').filter(|p| !p.is_empty()).collect();
    match parts.as_slice() {
        [.., a, b] => format!("{a}_{b}"),
        _ => FALLBACK_PATTERN.to_string(),
    }
}

/// Reverses [`category_pattern`] into a context whose names are the slugs.
///
/// Returns `None` unless the token ends in two numeric ids preceded by two
/// non-empty name segments.
#[must_use]
pub fn parse_category_pattern(token: &str) -> Option<CategoryContext> {
    let mut parts = token.rsplitn(3, '_');
    let l2_id = parts.next()?;
    let l1_id = parts.next()?;
    let names = parts.next()?;

    let is_id = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !is_id(l1_id) || !is_id(l2_id) {
        return None;
    }

    let (l1, l2) = names.split_once('_')?;
    if l1.is_empty() || l2.is_empty() {
        return None;
    }

    Some(CategoryContext {
        l1_category: l1.to_string(),
        l1_category_id: l1_id.to_string(),
        l2_category: l2.to_string(),
        l2_category_id: l2_id.to_string(),
    })
}

fn join_pattern(l1: &str, l2: &str, l1_id: &str, l2_id: &str) -> String {
    format!("{l1}_{l2}_{l1_id}_{l2_id}")
        .to_lowercase()
        .replace(' ', "_")
}
