//! The `webSearch` tool and the grounded search shared with `/api/search`.

use crate::services::metrics;
use crate::services::providers::{ChatProvider, ProviderError, ToolDeclaration};
use crate::sources::{Citation, SourceExtractor};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use validator::Validate;

pub const WEB_SEARCH_TOOL: &str = "webSearch";
pub const DEFAULT_MAX_RESULTS: usize = 3;

const TOOL_DESCRIPTION: &str = "Search the web for current Ukrainian legislation, court \
decisions and official guidance. Use it before answering questions about the current \
state of a law, recent amendments or case law.";

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct WebSearchArgs {
    #[validate(length(min = 3))]
    pub query: String,

    #[serde(default = "default_max_results")]
    #[validate(range(min = 1, max = 5))]
    pub max_results: usize,
}

/// Tool result returned to the model. Failures carry an empty source list
/// and an error message instead of placeholder citations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebSearchOutput {
    pub sources: Vec<Citation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WebSearchOutput {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            sources: Vec::new(),
            error: Some(message.into()),
        }
    }
}

/// Answer text plus cleaned citations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchAnswer {
    pub answer: String,
    pub sources: Vec<Citation>,
}

pub fn search_prompt(query: &str) -> String {
    format!("Find and summarize: {}. Cite sources.", query)
}

#[derive(Clone)]
pub struct WebSearch {
    provider: Arc<dyn ChatProvider>,
    extractor: SourceExtractor,
    model: String,
}

impl WebSearch {
    pub fn new(provider: Arc<dyn ChatProvider>, extractor: SourceExtractor, model: &str) -> Self {
        Self {
            provider,
            extractor,
            model: model.to_string(),
        }
    }

    pub fn declaration() -> ToolDeclaration {
        ToolDeclaration {
            name: WEB_SEARCH_TOOL.to_string(),
            description: TOOL_DESCRIPTION.to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search query, at least 3 characters"
                    },
                    "maxResults": {
                        "type": "integer",
                        "description": "Number of sources to return (1-5, default 3)"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    /// Run one grounded search and clean its citations.
    pub async fn search(
        &self,
        api_key: &str,
        query: &str,
        max_sources: usize,
    ) -> Result<SearchAnswer, ProviderError> {
        let started = std::time::Instant::now();
        let result = self
            .provider
            .grounded_search(api_key, &self.model, &search_prompt(query))
            .await;
        metrics::record_provider_latency(
            self.provider.name(),
            &self.model,
            started.elapsed().as_secs_f64(),
        );

        let answer = result.inspect_err(|e| {
            metrics::record_provider_error(self.provider.name(), e.kind());
        })?;

        let chunk_count = answer
            .grounding
            .as_ref()
            .map(|g| g.grounding_chunks.len())
            .unwrap_or(0);
        let sources =
            self.extractor
                .extract_from_metadata(answer.grounding.as_ref(), &answer.text, max_sources);
        metrics::record_citations(sources.len(), chunk_count.saturating_sub(sources.len()));

        Ok(SearchAnswer {
            answer: answer.text,
            sources,
        })
    }

    /// Execute a `webSearch` tool call. Never fails; problems are reported
    /// in the output for the model to see.
    pub async fn execute(&self, api_key: Option<&str>, args: &Value) -> WebSearchOutput {
        let args: WebSearchArgs = match serde_json::from_value(args.clone()) {
            Ok(args) => args,
            Err(e) => return WebSearchOutput::failed(format!("Invalid arguments: {}", e)),
        };
        if let Err(e) = args.validate() {
            return WebSearchOutput::failed(format!("Invalid arguments: {}", e));
        }

        let Some(api_key) = api_key else {
            return WebSearchOutput::failed(
                "Search unavailable: configure GOOGLE_GENERATIVE_AI_API_KEY",
            );
        };

        match self.search(api_key, &args.query, args.max_results).await {
            Ok(answer) => WebSearchOutput {
                sources: answer.sources,
                error: None,
            },
            Err(e) => {
                tracing::error!(error = %e, query = %args.query, "webSearch tool failed");
                WebSearchOutput::failed("Search failed")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::mock::MockProvider;
    use crate::services::providers::GroundedAnswer;
    use crate::sources::{GroundingChunk, GroundingMetadata, WebReference};

    fn chunk(uri: &str, title: &str) -> GroundingChunk {
        GroundingChunk {
            web: Some(WebReference {
                uri: Some(uri.to_string()),
                title: Some(title.to_string()),
                ..WebReference::default()
            }),
        }
    }

    fn tool(provider: MockProvider) -> (WebSearch, Arc<MockProvider>) {
        let provider = Arc::new(provider);
        let search = WebSearch::new(provider.clone(), SourceExtractor::default(), "gemini-2.5-flash");
        (search, provider)
    }

    #[tokio::test]
    async fn returns_cleaned_sources_capped_at_max_results() {
        let (tool, provider) = tool(MockProvider::new().with_search_answer(GroundedAnswer {
            text: "Див. https://zakon.rada.gov.ua/laws/show/435-15".to_string(),
            grounding: Some(GroundingMetadata {
                grounding_chunks: vec![
                    chunk("https://a.example/1", "A"),
                    chunk("https://b.example/2", "B"),
                    chunk("https://c.example/3", "C"),
                ],
                web_search_queries: Vec::new(),
            }),
        }));

        let output = tool
            .execute(Some("key"), &json!({"query": "Цивільний кодекс", "maxResults": 2}))
            .await;

        assert_eq!(output.error, None);
        assert_eq!(output.sources.len(), 2);
        assert_eq!(
            provider.searches(),
            vec!["Find and summarize: Цивільний кодекс. Cite sources.".to_string()]
        );
    }

    #[tokio::test]
    async fn missing_key_reports_error_without_placeholder() {
        let (tool, provider) = tool(MockProvider::new());

        let output = tool.execute(None, &json!({"query": "податок"})).await;

        assert!(output.sources.is_empty());
        assert!(output.error.unwrap().contains("GOOGLE_GENERATIVE_AI_API_KEY"));
        assert!(provider.searches().is_empty());
    }

    #[tokio::test]
    async fn provider_failure_is_reported() {
        let (tool, _) = tool(MockProvider::new().with_search_failure("boom"));

        let output = tool.execute(Some("key"), &json!({"query": "податок"})).await;

        assert!(output.sources.is_empty());
        assert_eq!(output.error.as_deref(), Some("Search failed"));
    }

    #[tokio::test]
    async fn short_query_is_rejected() {
        let (tool, provider) = tool(MockProvider::new());

        let output = tool.execute(Some("key"), &json!({"query": "ab"})).await;

        assert!(output.error.unwrap().starts_with("Invalid arguments"));
        assert!(provider.searches().is_empty());
    }
}
