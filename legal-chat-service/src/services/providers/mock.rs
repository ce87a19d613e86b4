//! Scripted provider for tests and keyless local runs.

use super::{
    ChatProvider, ChatRequest, FinishReason, GroundedAnswer, ProviderError, ProviderStream,
    StreamChunk,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

type ScriptedStep = Vec<Result<StreamChunk, ProviderError>>;

/// Each `stream_chat` call pops the next scripted step. Once the script is
/// exhausted every step answers with a short fixed reply.
#[derive(Default)]
pub struct MockProvider {
    steps: Mutex<VecDeque<ScriptedStep>>,
    search: Mutex<Option<Result<GroundedAnswer, String>>>,
    requests: Mutex<Vec<ChatRequest>>,
    searches: Mutex<Vec<String>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_step(self, step: ScriptedStep) -> Self {
        if let Ok(mut steps) = self.steps.lock() {
            steps.push_back(step);
        }
        self
    }

    /// Step that streams `text` and stops.
    pub fn with_text_reply(self, text: &str) -> Self {
        self.with_step(vec![
            Ok(StreamChunk::Text(text.to_string())),
            Ok(complete(FinishReason::Stop)),
        ])
    }

    pub fn with_search_answer(self, answer: GroundedAnswer) -> Self {
        if let Ok(mut search) = self.search.lock() {
            *search = Some(Ok(answer));
        }
        self
    }

    pub fn with_search_failure(self, message: &str) -> Self {
        if let Ok(mut search) = self.search.lock() {
            *search = Some(Err(message.to_string()));
        }
        self
    }

    /// Requests received so far, in call order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Prompts received by `grounded_search`.
    pub fn searches(&self) -> Vec<String> {
        self.searches.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

pub fn complete(finish_reason: FinishReason) -> StreamChunk {
    StreamChunk::Complete {
        input_tokens: 12,
        output_tokens: 8,
        finish_reason,
    }
}

#[async_trait]
impl ChatProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn stream_chat(
        &self,
        api_key: &str,
        request: ChatRequest,
    ) -> Result<ProviderStream, ProviderError> {
        if api_key.is_empty() {
            return Err(ProviderError::NotConfigured(
                "Mock provider requires an API key".to_string(),
            ));
        }
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        let step = self
            .steps
            .lock()
            .ok()
            .and_then(|mut steps| steps.pop_front())
            .unwrap_or_else(|| {
                vec![
                    Ok(StreamChunk::Text("Mock response".to_string())),
                    Ok(complete(FinishReason::Stop)),
                ]
            });

        Ok(Box::pin(tokio_stream::iter(step)))
    }

    async fn grounded_search(
        &self,
        api_key: &str,
        _model: &str,
        prompt: &str,
    ) -> Result<GroundedAnswer, ProviderError> {
        if api_key.is_empty() {
            return Err(ProviderError::NotConfigured(
                "Mock provider requires an API key".to_string(),
            ));
        }
        if let Ok(mut searches) = self.searches.lock() {
            searches.push(prompt.to_string());
        }

        let scripted = self.search.lock().ok().and_then(|s| s.clone());
        match scripted {
            Some(Ok(answer)) => Ok(answer),
            Some(Err(message)) => Err(ProviderError::ApiError(message)),
            None => Ok(GroundedAnswer {
                text: format!("Mock answer for: {}", prompt),
                grounding: None,
            }),
        }
    }
}
