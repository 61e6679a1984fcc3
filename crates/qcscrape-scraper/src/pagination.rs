//! Continuation tracking for the listing API's `pagination.next_url`.
//!
//! The listing API announces the following page with a relative URL whose
//! query string carries progress counters:
//!
//! ```text
//! /v1/layout/listing_widgets?offset=15&limit=15&page_index=1
//!     &total_entities_processed=15&total_pagination_items=120
//! ```
//!
//! A listing payload without `next_url` is the last page for that response,
//! but one of the two upstream shapes never carries pagination at all, so
//! absence only counts once the session has seen at least one `next_url`.
//! Bodies of neither listing shape (error or rate-limit replies) say nothing
//! about pagination and are ignored.

use serde_json::Value;

use crate::fingerprint;
use crate::payload::RawPayload;

/// Page size assumed when a `next_url` carries `page_index` but no `limit`.
pub const DEFAULT_PAGE_SIZE: u64 = 15;

/// What one batch of payloads told the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSignal {
    /// A `next_url` not seen before.
    NewPage,
    /// Only the previously recorded `next_url` was seen again.
    Repeated,
    /// Every payload in the batch lacked a `next_url`.
    LastPage,
    /// The progress counters show the walk is complete.
    Exhausted,
    /// Nothing to learn from (empty batch, or no listing payload in it).
    NoSignal,
}

#[derive(Debug, Clone)]
pub struct PaginationTracker {
    last_next_url: Option<String>,
    known_total: Option<u64>,
    seen_any_next_url: bool,
    last_batch_had_next: bool,
    exhausted: bool,
}

impl Default for PaginationTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PaginationTracker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_next_url: None,
            known_total: None,
            seen_any_next_url: false,
            last_batch_had_next: true,
            exhausted: false,
        }
    }

    /// Whether more pages may remain. Once the counters show the walk is
    /// complete this stays `false` for the rest of the session.
    #[must_use]
    pub fn has_more(&self) -> bool {
        if self.exhausted {
            return false;
        }
        !self.seen_any_next_url || self.last_batch_had_next
    }

    #[must_use]
    pub fn last_next_url(&self) -> Option<&str> {
        self.last_next_url.as_deref()
    }

    /// Total item count announced by the server, once discovered.
    #[must_use]
    pub fn known_total(&self) -> Option<u64> {
        self.known_total
    }

    /// Folds one poll's worth of payloads into the tracker.
    pub fn advance<'a, I>(&mut self, payloads: I) -> PageSignal
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut saw_payload = false;
        let mut batch_next_urls = Vec::new();
        for payload in payloads {
            if matches!(RawPayload::probe(payload), RawPayload::Unknown) {
                continue;
            }
            saw_payload = true;
            if let Some(url) = fingerprint::next_url(payload) {
                batch_next_urls.push(url);
            }
        }

        if !saw_payload {
            return if self.exhausted {
                PageSignal::Exhausted
            } else {
                PageSignal::NoSignal
            };
        }

        if batch_next_urls.is_empty() {
            self.last_batch_had_next = false;
            return if self.exhausted {
                PageSignal::Exhausted
            } else {
                PageSignal::LastPage
            };
        }

        self.seen_any_next_url = true;
        self.last_batch_had_next = true;

        let mut signal = PageSignal::Repeated;
        for url in batch_next_urls {
            if self.last_next_url.as_deref() == Some(url.as_str()) {
                continue;
            }
            signal = PageSignal::NewPage;
            let progress = PageProgress::from_next_url(&url);
            if let Some(total) = progress.total {
                self.known_total = Some(total);
            }
            if progress.is_complete() {
                self.exhausted = true;
            }
            self.last_next_url = Some(url);
        }

        if self.exhausted {
            PageSignal::Exhausted
        } else {
            signal
        }
    }
}

/// Progress counters parsed from a `next_url` query string.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct PageProgress {
    processed: Option<u64>,
    total: Option<u64>,
    page_index: Option<u64>,
    page_size: Option<u64>,
}

impl PageProgress {
    fn from_next_url(url: &str) -> Self {
        let num = |name: &str| extract_query_param(url, name).and_then(|v| v.parse::<u64>().ok());
        Self {
            processed: num("total_entities_processed"),
            total: num("total_pagination_items"),
            page_index: num("page_index"),
            page_size: num("limit"),
        }
    }

    fn is_complete(&self) -> bool {
        let Some(total) = self.total else {
            return false;
        };
        if let Some(processed) = self.processed {
            return processed >= total;
        }
        if let Some(page_index) = self.page_index {
            let page_size = self.page_size.filter(|&s| s > 0).unwrap_or(DEFAULT_PAGE_SIZE);
            return page_index.saturating_mul(page_size) >= total;
        }
        false
    }
}

/// Value of `name` in the query string of a relative `next_url`. Empty
/// values count as absent.
fn extract_query_param<'a>(url: &'a str, name: &str) -> Option<&'a str> {
    let (_, query) = url.split_once('?')?;
    let query = query.split_once('#').map_or(query, |(q, _)| q);
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}
