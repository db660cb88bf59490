use async_trait::async_trait;

use super::{GeneratedSummary, Summarizer, SummarizerError, SummaryOptions};

const DEFAULT_MAX_WORDS: usize = 60;

/// Deterministic summarizer used in tests and unconfigured environments:
/// truncates the transcript to the word budget.
#[derive(Debug, Default)]
pub struct MockSummarizer;

impl MockSummarizer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Summarizer for MockSummarizer {
    async fn generate(
        &self,
        content: &str,
        options: &SummaryOptions,
    ) -> Result<GeneratedSummary, SummarizerError> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(SummarizerError::Empty);
        }

        let max_words = options.max_words.map(|w| w as usize).unwrap_or(DEFAULT_MAX_WORDS);
        let words: Vec<&str> = trimmed.split_whitespace().collect();

        let mut text = if words.len() <= max_words {
            words.join(" ")
        } else {
            format!("{} ...", words[..max_words].join(" "))
        };

        if let Some(focus) = &options.focus {
            text = format!("[{focus}] {text}");
        }

        Ok(GeneratedSummary {
            text,
            model: "mock".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn truncates_to_word_budget() {
        let summarizer = MockSummarizer::new();
        let options = SummaryOptions {
            max_words: Some(3),
            focus: None,
        };

        let result = summarizer.generate("one two three four five", &options).await.unwrap();
        assert_eq!(result.text, "one two three ...");
        assert_eq!(result.model, "mock");
    }

    #[tokio::test]
    async fn empty_content_is_an_error() {
        let summarizer = MockSummarizer::new();
        let result = summarizer.generate("   ", &SummaryOptions::default()).await;
        assert!(matches!(result, Err(SummarizerError::Empty)));
    }

    #[tokio::test]
    async fn focus_is_prefixed() {
        let summarizer = MockSummarizer::new();
        let options = SummaryOptions {
            max_words: None,
            focus: Some("action items".to_string()),
        };

        let result = summarizer.generate("budget approved", &options).await.unwrap();
        assert_eq!(result.text, "[action items] budget approved");
    }
}
