//! Grounding citation extraction.
//!
//! Turns the `groundingMetadata` returned by a search-grounded Gemini call
//! into clean `{title, url, snippet}` citations. Redirect wrappers are
//! resolved against the generated text or a list of known domains, and
//! anything that cannot be resolved to a real http(s) destination is dropped.

pub mod policy;

pub use policy::{GoogleGroundingPolicy, RedirectPolicy};

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use url::Url;

pub const UNKNOWN_SOURCE_TITLE: &str = "Unknown Source";

/// Shortest key accepted as a substring match between a title and a host.
const MIN_OVERLAP_CHARS: usize = 4;

/// A cleaned, displayable source reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default)]
    pub grounding_chunks: Vec<GroundingChunk>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub web_search_queries: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroundingChunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web: Option<WebReference>,
}

/// Raw web reference as sent by the provider. Field names vary between
/// API versions, so both spellings are accepted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"https?://[^\s<>()\[\]{}"'`]+"#).expect("url pattern is a valid regex")
    })
}

fn domain_suffix_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)[\s\-|–—:·]*\b[a-z0-9-]+(?:\.[a-z0-9-]+)*\.[a-z]{2,}\s*$")
            .expect("domain suffix pattern is a valid regex")
    })
}

/// A URL found in free text, kept verbatim alongside its host.
struct ScrapedUrl {
    raw: String,
    host: String,
}

fn scrape_urls(text: &str) -> Vec<ScrapedUrl> {
    url_pattern()
        .find_iter(text)
        .filter_map(|m| {
            let raw = m
                .as_str()
                .trim_end_matches(|c| matches!(c, '.' | ',' | ';' | ':' | '!' | '?'));
            let host = Url::parse(raw).ok()?.host_str()?.to_ascii_lowercase();
            Some(ScrapedUrl {
                raw: raw.to_string(),
                host,
            })
        })
        .collect()
}

/// Lowercase alphanumerics only, used for fuzzy host/title comparison.
fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Equal keys, or one containing the other when the shorter one is long
/// enough to mean something.
fn keys_overlap(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    short.chars().count() >= MIN_OVERLAP_CHARS && long.contains(short)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Clone)]
pub struct SourceExtractor {
    policy: Arc<dyn RedirectPolicy>,
}

impl Default for SourceExtractor {
    fn default() -> Self {
        Self::new(Arc::new(GoogleGroundingPolicy))
    }
}

impl SourceExtractor {
    pub fn new(policy: Arc<dyn RedirectPolicy>) -> Self {
        Self { policy }
    }

    /// Extract at most `max` citations, in chunk order. Never fails; chunks
    /// that cannot be turned into a valid citation are skipped.
    pub fn extract(
        &self,
        chunks: &[GroundingChunk],
        response_text: &str,
        max: usize,
    ) -> Vec<Citation> {
        let scraped = scrape_urls(response_text);
        let mut citations: Vec<Citation> = Vec::new();

        for chunk in chunks {
            if citations.len() >= max {
                break;
            }
            let Some(web) = chunk.web.as_ref() else {
                continue;
            };
            if let Some(citation) = self.citation_for(web, &scraped) {
                if citations.iter().any(|c| c.url == citation.url) {
                    continue;
                }
                citations.push(citation);
            }
        }

        let dropped = chunks.len().saturating_sub(citations.len());
        tracing::debug!(
            chunks = chunks.len(),
            emitted = citations.len(),
            dropped,
            "Extracted grounding citations"
        );
        citations
    }

    /// Convenience wrapper over [`extract`](Self::extract) for a full metadata block.
    pub fn extract_from_metadata(
        &self,
        metadata: Option<&GroundingMetadata>,
        response_text: &str,
        max: usize,
    ) -> Vec<Citation> {
        match metadata {
            Some(metadata) => self.extract(&metadata.grounding_chunks, response_text, max),
            None => Vec::new(),
        }
    }

    fn citation_for(&self, web: &WebReference, scraped: &[ScrapedUrl]) -> Option<Citation> {
        let raw_url = non_empty(web.uri.as_deref()).or_else(|| non_empty(web.url.as_deref()));
        let raw_title =
            non_empty(web.title.as_deref()).or_else(|| non_empty(web.site.as_deref()));

        if raw_url.is_none() && raw_title.is_none() {
            return None;
        }
        let title = raw_title.unwrap_or_default();

        // A missing url is treated like an opaque redirect: the title may still resolve it.
        let url = match raw_url {
            Some(url) if !self.policy.is_redirect(url) => url.to_string(),
            _ => match self.resolve_redirect(title, scraped) {
                Some(url) => url,
                None => {
                    tracing::debug!(title = %title, "Dropping citation with unresolved redirect");
                    return None;
                }
            },
        };

        let host = self.validated_host(&url)?;

        Some(Citation {
            title: self.clean_title(title, &host),
            url,
            snippet: web.snippet.as_deref().map(str::trim).unwrap_or_default().to_string(),
        })
    }

    fn resolve_redirect(&self, title: &str, scraped: &[ScrapedUrl]) -> Option<String> {
        let candidates: Vec<&ScrapedUrl> = scraped
            .iter()
            .filter(|u| !self.policy.is_provider_host(&u.host))
            .collect();

        let title_key = normalize(title);
        if !title_key.is_empty() {
            let by_title = candidates.iter().find(|u| {
                let host_key = normalize(u.host.trim_start_matches("www."));
                !host_key.is_empty() && keys_overlap(&host_key, &title_key)
            });
            if let Some(found) = by_title {
                return Some(found.raw.clone());
            }
        }

        if let Some(found) = candidates.iter().find(|u| u.host.contains('.')) {
            return Some(found.raw.clone());
        }

        let lowered = title.to_lowercase();
        self.policy
            .fallback_domains()
            .iter()
            .find(|domain| lowered.contains(*domain))
            .map(|domain| format!("https://{}", domain))
    }

    /// Returns the lowercased host when `url` is an absolute http(s) URL
    /// that does not point back at the search provider.
    fn validated_host(&self, url: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return None;
        }
        let host = parsed.host_str()?.to_ascii_lowercase();
        if host.is_empty() || self.policy.is_provider_host(&host) {
            return None;
        }
        Some(host)
    }

    fn clean_title(&self, title: &str, host: &str) -> String {
        let title = title.trim();
        let stripped = domain_suffix_pattern().replace(title, "");
        let base = match stripped.trim() {
            "" => title.split('.').next().unwrap_or_default().to_string(),
            rest => rest.to_string(),
        };

        let filtered: String = capitalize(&base)
            .chars()
            .filter(|c| c.is_alphanumeric() || c.is_whitespace() || matches!(*c, '-' | '\'' | 'ʼ'))
            .collect();
        let cleaned = filtered.split_whitespace().collect::<Vec<_>>().join(" ");

        if cleaned.is_empty() {
            return UNKNOWN_SOURCE_TITLE.to_string();
        }

        match self.policy.source_tag(host) {
            Some(tag) if !cleaned.starts_with(tag) => format!("{}: {}", tag, cleaned),
            _ => cleaned,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REDIRECT: &str =
        "https://vertexaisearch.cloud.google.com/grounding-api-redirect/AUZIYQFx9";

    fn chunk(uri: Option<&str>, title: Option<&str>) -> GroundingChunk {
        GroundingChunk {
            web: Some(WebReference {
                uri: uri.map(String::from),
                title: title.map(String::from),
                snippet: Some("x".to_string()),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn direct_url_passes_through() {
        let extractor = SourceExtractor::default();
        let chunks = vec![chunk(Some("https://good.example/a"), Some("Good Example"))];

        let citations = extractor.extract(&chunks, "anything at all", 5);

        assert_eq!(
            citations,
            vec![Citation {
                title: "Good Example".to_string(),
                url: "https://good.example/a".to_string(),
                snippet: "x".to_string(),
            }]
        );
    }

    #[test]
    fn redirect_resolves_to_text_url_matching_title() {
        let extractor = SourceExtractor::default();
        let chunks = vec![chunk(Some(REDIRECT), Some("unian.ua"))];
        let text = "Див. https://example.org/a та https://www.unian.ua/politics/123.html.";

        let citations = extractor.extract(&chunks, text, 3);

        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].url, "https://www.unian.ua/politics/123.html");
    }

    #[test]
    fn short_title_does_not_match_any_host() {
        let extractor = SourceExtractor::default();
        let chunks = vec![chunk(Some(REDIRECT), Some("UA"))];
        let text = "https://example.org/a та https://www.unian.ua/politics/123.html";

        let citations = extractor.extract(&chunks, text, 3);

        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].url, "https://example.org/a");
        assert!(keys_overlap("ua", "ua"));
        assert!(!keys_overlap("ua", "unianua"));
        assert!(keys_overlap("unian", "unianua"));
    }

    #[test]
    fn redirect_falls_back_to_first_non_provider_url() {
        let extractor = SourceExtractor::default();
        let chunks = vec![chunk(Some(REDIRECT), Some("Some article"))];
        let text = "https://www.google.com/search?q=x then https://lb.ua/news/1";

        let citations = extractor.extract(&chunks, text, 3);

        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].url, "https://lb.ua/news/1");
    }

    #[test]
    fn redirect_resolves_known_domain_from_title() {
        let extractor = SourceExtractor::default();
        let chunks = vec![chunk(Some(REDIRECT), Some("zakon.rada.gov.ua"))];

        let citations = extractor.extract(&chunks, "Відповідь без посилань", 3);

        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].url, "https://zakon.rada.gov.ua");
        assert_eq!(citations[0].title, "Законодавство: Zakon");
    }

    #[test]
    fn unresolvable_redirect_is_dropped() {
        let extractor = SourceExtractor::default();
        let chunks = vec![chunk(Some(REDIRECT), Some("Some blog"))];

        assert!(extractor.extract(&chunks, "no links here", 3).is_empty());
    }

    #[test]
    fn provider_hosts_never_emitted() {
        let extractor = SourceExtractor::default();
        let chunks = vec![
            chunk(Some("https://www.google.com/url?q=1"), Some("Google")),
            chunk(Some("https://vertexai.example/x"), Some("Vertex")),
        ];

        assert!(extractor.extract(&chunks, "", 5).is_empty());
    }

    #[test]
    fn invalid_and_empty_chunks_are_skipped() {
        let extractor = SourceExtractor::default();
        let chunks = vec![
            GroundingChunk { web: None },
            chunk(None, None),
            chunk(Some("   "), Some("  ")),
            chunk(Some("ftp://files.example/doc"), Some("Files")),
            chunk(Some("not a url"), Some("Broken")),
        ];

        assert!(extractor.extract(&chunks, "", 5).is_empty());
    }

    #[test]
    fn missing_title_defaults_to_unknown_source() {
        let extractor = SourceExtractor::default();
        let chunks = vec![chunk(Some("https://lb.ua/news/2"), None)];

        let citations = extractor.extract(&chunks, "", 3);

        assert_eq!(citations[0].title, UNKNOWN_SOURCE_TITLE);
    }

    #[test]
    fn title_is_cleaned_and_tagged() {
        let extractor = SourceExtractor::default();
        let chunks = vec![chunk(
            Some("https://zakon.rada.gov.ua/laws/show/435-15"),
            Some("цивільний кодекс України (ЦКУ)! - zakon.rada.gov.ua"),
        )];

        let citations = extractor.extract(&chunks, "", 3);

        assert_eq!(citations[0].title, "Законодавство: Цивільний кодекс України ЦКУ");
    }

    #[test]
    fn output_is_deduplicated_and_truncated() {
        let extractor = SourceExtractor::default();
        let chunks = vec![
            chunk(Some("https://a.example/1"), Some("A")),
            chunk(Some("https://a.example/1"), Some("A again")),
            chunk(Some("https://b.example/2"), Some("B")),
            chunk(Some("https://c.example/3"), Some("C")),
        ];

        let citations = extractor.extract(&chunks, "", 2);

        let urls: Vec<&str> = citations.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a.example/1", "https://b.example/2"]);
    }

    #[test]
    fn grounding_metadata_deserializes_from_provider_json() {
        let raw = serde_json::json!({
            "groundingChunks": [
                { "web": { "uri": "https://ccu.gov.ua/rishennya", "title": "ccu.gov.ua" } },
                { "retrievedContext": { "uri": "gs://bucket/doc" } }
            ],
            "webSearchQueries": ["рішення КСУ"]
        });
        let metadata: GroundingMetadata = serde_json::from_value(raw).unwrap();

        let citations = SourceExtractor::default().extract_from_metadata(Some(&metadata), "", 5);

        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].url, "https://ccu.gov.ua/rishennya");
        assert_eq!(citations[0].title, "Судова практика: Ccu");
    }
}
