//! Source citations gathered by tool calls.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// A web page cited by the final answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    /// Page title (falls back to the domain when the backend has none).
    pub title: String,
    /// Canonical page URL. Unique within a result.
    pub url: String,
    /// Host name without a leading `www.`.
    pub domain: String,
    /// Favicon URL, when the backend reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
}

impl Source {
    /// Builds a source from a URL, deriving the domain.
    ///
    /// An empty title is replaced by the domain.
    #[must_use]
    pub fn new(title: impl Into<String>, url: impl Into<String>, favicon: Option<String>) -> Self {
        let url = url.into();
        let domain = domain_of(&url);
        let title = title.into();
        let title = if title.trim().is_empty() {
            domain.clone()
        } else {
            title
        };
        Self {
            title,
            url,
            domain,
            favicon,
        }
    }
}

/// Extracts the host of `url`, stripping `www.`. Returns the input
/// unchanged when it does not parse.
#[must_use]
pub fn domain_of(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .map_or_else(
            || url.to_string(),
            |host| host.strip_prefix("www.").unwrap_or(&host).to_string(),
        )
}

/// Removes duplicate sources by URL.
///
/// The first occurrence of each URL wins and the relative order of kept
/// entries is preserved.
#[must_use]
pub fn dedupe_sources(sources: Vec<Source>) -> Vec<Source> {
    let mut seen: HashSet<String> = HashSet::with_capacity(sources.len());
    sources
        .into_iter()
        .filter(|s| seen.insert(s.url.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn src(title: &str, url: &str) -> Source {
        Source::new(title, url, None)
    }

    #[test]
    fn test_domain_strips_www() {
        assert_eq!(domain_of("https://www.rust-lang.org/learn"), "rust-lang.org");
        assert_eq!(domain_of("https://docs.rs/tokio"), "docs.rs");
        assert_eq!(domain_of("not a url"), "not a url");
    }

    #[test]
    fn test_empty_title_falls_back_to_domain() {
        let s = src("  ", "https://example.com/a");
        assert_eq!(s.title, "example.com");
    }

    #[test]
    fn test_dedupe_first_wins() {
        let out = dedupe_sources(vec![
            src("First", "https://a.com"),
            src("B", "https://b.com"),
            src("Second", "https://a.com"),
        ]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].title, "First");
        assert_eq!(out[1].url, "https://b.com");
    }

    #[test]
    fn test_dedupe_empty() {
        assert!(dedupe_sources(Vec::new()).is_empty());
    }

    proptest! {
        #[test]
        fn prop_dedupe_unique_and_ordered(ids in proptest::collection::vec(0u8..8, 0..40)) {
            let input: Vec<Source> = ids
                .iter()
                .enumerate()
                .map(|(i, id)| src(&format!("t{i}"), &format!("https://site{id}.com/")))
                .collect();
            let out = dedupe_sources(input.clone());

            let urls: HashSet<&str> = out.iter().map(|s| s.url.as_str()).collect();
            prop_assert_eq!(urls.len(), out.len());

            // Every kept entry is the first occurrence of its URL, in input order.
            let mut cursor = 0;
            for kept in &out {
                let pos = input[cursor..]
                    .iter()
                    .position(|s| s == kept)
                    .map(|p| p + cursor);
                prop_assert!(pos.is_some());
                let pos = pos.unwrap_or_default();
                let first = input.iter().position(|s| s.url == kept.url);
                prop_assert_eq!(first, Some(pos));
                cursor = pos + 1;
            }

            let distinct: HashSet<&str> = input.iter().map(|s| s.url.as_str()).collect();
            prop_assert_eq!(distinct.len(), out.len());
        }
    }
}
