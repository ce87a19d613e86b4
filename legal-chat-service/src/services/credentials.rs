//! Provider credential lookup. Keys come from server configuration only.

#[derive(Debug, Clone, Default)]
pub struct CredentialResolver {
    google_api_key: Option<String>,
}

impl CredentialResolver {
    pub fn new(google_api_key: &str) -> Self {
        let key = google_api_key.trim();
        Self {
            google_api_key: (!key.is_empty()).then(|| key.to_string()),
        }
    }

    pub fn api_key_for(&self, provider: &str) -> Option<&str> {
        match provider {
            "google" | "gemini" => self.google_api_key.as_deref(),
            _ => None,
        }
    }

    /// User-supplied keys are not stored by this deployment.
    pub fn user_key(&self, _user_id: &str, _provider: &str) -> Option<String> {
        None
    }

    /// A user key, if one were stored, takes precedence over the server key.
    pub fn resolve(&self, user_id: &str, provider: &str) -> Option<String> {
        self.user_key(user_id, provider)
            .or_else(|| self.api_key_for(provider).map(String::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_server_key_for_google_only() {
        let resolver = CredentialResolver::new(" key-123 ");
        assert_eq!(resolver.resolve("u1", "google").as_deref(), Some("key-123"));
        assert_eq!(resolver.resolve("u1", "openai"), None);
    }

    #[test]
    fn blank_key_is_absent() {
        assert_eq!(CredentialResolver::new("  ").api_key_for("google"), None);
    }
}
