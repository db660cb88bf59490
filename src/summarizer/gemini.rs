use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{GeneratedSummary, Summarizer, SummarizerError, SummaryOptions};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
}

pub struct GeminiSummarizer {
    config: GeminiConfig,
    client: Client,
}

impl GeminiSummarizer {
    pub fn new(config: GeminiConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    fn api_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            GEMINI_API_BASE, self.config.model, self.config.api_key
        )
    }

    fn build_prompt(content: &str, options: &SummaryOptions) -> String {
        let mut prompt = String::from(
            "Summarize the following meeting or conversation transcript for school staff. \
             Keep names and decisions accurate.",
        );
        if let Some(max_words) = options.max_words {
            prompt.push_str(&format!(" Limit the summary to roughly {max_words} words."));
        }
        if let Some(focus) = &options.focus {
            prompt.push_str(&format!(" Emphasize {focus}."));
        }
        prompt.push_str("\n\nTranscript:\n");
        prompt.push_str(content);
        prompt
    }
}

#[async_trait]
impl Summarizer for GeminiSummarizer {
    async fn generate(
        &self,
        content: &str,
        options: &SummaryOptions,
    ) -> Result<GeneratedSummary, SummarizerError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![ContentPart {
                    text: Self::build_prompt(content, options),
                }],
            }],
        };

        let response = self
            .client
            .post(self.api_url())
            .json(&request)
            .send()
            .await
            .map_err(|err| SummarizerError::Network(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SummarizerError::Api(format!("{status}: {body}")));
        }

        let payload: GenerateContentResponse = response
            .json()
            .await
            .map_err(|err| SummarizerError::Api(format!("malformed response: {err}")))?;

        let text = payload
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .map(|part| part.text)
            .filter(|text| !text.trim().is_empty())
            .ok_or(SummarizerError::Empty)?;

        Ok(GeneratedSummary {
            text,
            model: self.config.model.clone(),
        })
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<ContentPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ContentPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ContentPart>,
}
