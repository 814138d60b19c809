//! Answer generation seam: completion-model trait, HTTP client, grounding
//! prompt construction, and source extraction.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::warn;

use crate::stores::ChunkMetadata;
use crate::types::{RagError, Source};

/// Fixed user-facing reply when the model call fails. Generation failure
/// must never surface as a bare transport error with no content.
pub const GENERATION_APOLOGY: &str =
    "I'm sorry, I encountered an error while generating an answer. Please try again.";

/// A generative model exposed as prompt-in, text-out.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, RagError>;
}

/// HTTP client for a `generateContent`-style REST endpoint.
#[derive(Clone)]
pub struct HttpCompletionClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl HttpCompletionClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl CompletionModel for HttpCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String, RagError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({
                "contents": [{ "parts": [{ "text": prompt }] }],
            }))
            .send()
            .await
            .map_err(|err| RagError::Generation(err.to_string()))?
            .error_for_status()
            .map_err(|err| RagError::Generation(err.to_string()))?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|err| RagError::Generation(err.to_string()))?;
        body.pointer("/candidates/0/content/parts/0/text")
            .and_then(|text| text.as_str())
            .map(str::to_string)
            .ok_or_else(|| RagError::Generation("response carried no candidate text".to_string()))
    }
}

/// Outcome of one generation attempt. `error` is populated when the model
/// call failed and `answer` holds the apology fallback instead.
#[derive(Clone, Debug)]
pub struct GeneratedAnswer {
    pub answer: String,
    pub sources: Vec<Source>,
    pub error: Option<String>,
}

impl GeneratedAnswer {
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Builds the grounding prompt, drives the model, and degrades failures to
/// the fixed apology answer.
#[derive(Clone)]
pub struct AnswerGenerator {
    model: Arc<dyn CompletionModel>,
}

impl AnswerGenerator {
    pub fn new(model: Arc<dyn CompletionModel>) -> Self {
        Self { model }
    }

    pub async fn generate(
        &self,
        question: &str,
        context: &str,
        metadatas: &[ChunkMetadata],
    ) -> GeneratedAnswer {
        let prompt = grounding_prompt(question, context);
        match self.model.complete(&prompt).await {
            Ok(answer) => GeneratedAnswer {
                answer,
                sources: extract_sources(metadatas),
                error: None,
            },
            Err(err) => {
                warn!(error = %err, "answer generation failed");
                GeneratedAnswer {
                    answer: GENERATION_APOLOGY.to_string(),
                    sources: Vec::new(),
                    error: Some(err.to_string()),
                }
            }
        }
    }
}

/// The instruction block pins the model to the supplied context: answer
/// only from it, admit absence instead of fabricating, stay concise.
fn grounding_prompt(question: &str, context: &str) -> String {
    format!(
        "You are a helpful AI assistant that answers questions based on the \
         provided news articles and context.\n\n\
         Instructions:\n\
         1. Use ONLY the information provided in the context below\n\
         2. If the context doesn't contain relevant information, say so clearly\n\
         3. Cite sources when possible using the source information provided\n\
         4. Be concise but informative\n\
         5. If asked about recent events, mention that the information is based \
         on the available news articles\n\n\
         Context from news articles:\n{context}\n\n\
         Question: {question}\n\n\
         Answer:"
    )
}

/// Extracts citations from retrieval metadata, deduplicating by url while
/// preserving first-seen order.
pub fn extract_sources(metadatas: &[ChunkMetadata]) -> Vec<Source> {
    let mut seen = std::collections::HashSet::new();
    let mut sources = Vec::new();
    for metadata in metadatas {
        if metadata.url.is_empty() || !seen.insert(metadata.url.clone()) {
            continue;
        }
        sources.push(Source {
            title: metadata.title.clone(),
            url: metadata.url.clone(),
            source: metadata.source.clone(),
            date: metadata.date.clone(),
        });
    }
    sources
}
