//! Redirect heuristics for grounding citations.
//!
//! Search providers hide destinations behind their own redirect URLs. A
//! [`RedirectPolicy`] tells the extractor which URLs are such wrappers, which
//! hosts belong to the provider, and which well-known domains may be
//! substituted when nothing better is found.

/// Host fragments owned by the Gemini/Vertex grounding backend.
const GOOGLE_PROVIDER_HOSTS: &[&str] = &["google.com", "vertexai"];

const GOOGLE_REDIRECT_PATTERN: &str = "vertexaisearch.cloud.google.com/grounding-api-redirect/";

/// Authoritative domains for Ukrainian legal research, most specific first.
const UKRAINIAN_LEGAL_DOMAINS: &[&str] = &[
    "zakon.rada.gov.ua",
    "reyestr.court.gov.ua",
    "ccu.gov.ua",
    "kmu.gov.ua",
    "rada.gov.ua",
    "nbu.gov.ua",
    "tax.gov.ua",
    "minjust.gov.ua",
    "diia.gov.ua",
    "novaposhta.ua",
    "ukrposhta.ua",
    "wikipedia.org",
    "ukrinform.ua",
    "unian.ua",
    "interfax.ua",
];

/// Source-type tags keyed by host suffix. First match wins.
const OFFICIAL_TAGS: &[(&str, &str)] = &[
    ("rada.gov.ua", "Законодавство"),
    ("court.gov.ua", "Судова практика"),
    ("ccu.gov.ua", "Судова практика"),
    ("gov.ua", "Офіційне джерело"),
];

pub trait RedirectPolicy: Send + Sync {
    /// True when `url` is an opaque provider redirect rather than a destination.
    fn is_redirect(&self, url: &str) -> bool;

    /// True when `host` belongs to the search provider itself.
    fn is_provider_host(&self, host: &str) -> bool;

    /// Domains that may be substituted when a citation title names them.
    fn fallback_domains(&self) -> &[&'static str];

    /// Optional category label for a resolved host.
    fn source_tag(&self, host: &str) -> Option<&'static str>;
}

/// Policy for Gemini `googleSearch` grounding metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoogleGroundingPolicy;

impl RedirectPolicy for GoogleGroundingPolicy {
    fn is_redirect(&self, url: &str) -> bool {
        url.contains(GOOGLE_REDIRECT_PATTERN)
    }

    fn is_provider_host(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        GOOGLE_PROVIDER_HOSTS.iter().any(|p| host.contains(p))
    }

    fn fallback_domains(&self) -> &[&'static str] {
        UKRAINIAN_LEGAL_DOMAINS
    }

    fn source_tag(&self, host: &str) -> Option<&'static str> {
        let host = host.to_ascii_lowercase();
        OFFICIAL_TAGS
            .iter()
            .find(|(suffix, _)| host == *suffix || host.ends_with(&format!(".{}", suffix)))
            .map(|(_, tag)| *tag)
    }
}
