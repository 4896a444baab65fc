/// Adaptive compression of logical groups.
///
/// Model-based summarization with strategy selection by content keywords,
/// backed by a deterministic truncation fallback so the pipeline always
/// produces a usable summary.
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::grouper::LogicalGroup;
use crate::llm::{ChatMessage, LanguageModel};

/// Groups under this many words are stored as-is; compressing very short
/// text degrades quality relative to its size.
const MIN_COMPRESSIBLE_WORDS: usize = 40;
/// Bounds on the target summary length, in words.
const MIN_TARGET_WORDS: usize = 10;
const MAX_TARGET_WORDS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionStrategy {
    /// 8:1, for procedural content where detail matters.
    Detailed,
    /// 10:1, the default.
    Balanced,
    /// 15:1, reserved; never auto-selected.
    Aggressive,
    /// Input was too short to compress.
    NoCompression,
    /// Model call failed; summary is a truncation.
    Fallback,
}

impl CompressionStrategy {
    #[must_use]
    pub fn ratio(self) -> f64 {
        match self {
            CompressionStrategy::Detailed => 8.0,
            CompressionStrategy::Aggressive => 15.0,
            _ => 10.0,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CompressionStrategy::Detailed => "detailed",
            CompressionStrategy::Balanced => "balanced",
            CompressionStrategy::Aggressive => "aggressive",
            CompressionStrategy::NoCompression => "no_compression",
            CompressionStrategy::Fallback => "fallback",
        }
    }
}

/// A logical group with its compressed summary. Immutable once produced.
#[derive(Debug, Clone)]
pub struct CompressedGroup {
    pub group: LogicalGroup,
    pub summary: String,
    pub compression_ratio: f64,
    pub strategy_used: CompressionStrategy,
    pub processing_time: f64,
}

pub struct AdaptiveCompressor {
    llm: Arc<dyn LanguageModel>,
}

impl AdaptiveCompressor {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    /// Choose a strategy from content keywords.
    #[must_use]
    pub fn choose_strategy(text: &str) -> CompressionStrategy {
        let lower = text.to_lowercase();
        if ["steps", "procedure", "method", "process"]
            .iter()
            .any(|kw| lower.contains(kw))
        {
            CompressionStrategy::Detailed
        } else {
            // "list"/"including"/"such as" and everything else share the default
            CompressionStrategy::Balanced
        }
    }

    /// Target summary length for a given input size and strategy.
    #[must_use]
    pub fn target_length(input_words: usize, strategy: CompressionStrategy) -> usize {
        let target = (input_words as f64 / strategy.ratio()) as usize;
        target.clamp(MIN_TARGET_WORDS, MAX_TARGET_WORDS)
    }

    /// Compress one logical group.
    ///
    /// Each call is its own failure boundary: a model error produces a
    /// `Fallback` summary rather than an `Err`.
    pub async fn compress(&self, group: LogicalGroup) -> CompressedGroup {
        let started = Instant::now();

        if group.word_count < MIN_COMPRESSIBLE_WORDS {
            let summary = group.combined_text.clone();
            return CompressedGroup {
                group,
                summary,
                compression_ratio: 1.0,
                strategy_used: CompressionStrategy::NoCompression,
                processing_time: started.elapsed().as_secs_f64(),
            };
        }

        let strategy = Self::choose_strategy(&group.combined_text);
        let target = Self::target_length(group.word_count, strategy);

        let prompt = format!(
            "Compress this text to exactly {target} words while preserving key information \
and searchable content.\n\n\
Requirements:\n\
- Target: {target} words ({}:1 compression from {} words)\n\
- Keep proper names, character names, and important details\n\
- Preserve the main topic and key events\n\
- Make it useful for search and retrieval\n\n\
Original text:\n{}\n\n\
Compressed summary ({target} words):",
            strategy.ratio() as usize,
            group.word_count,
            group.combined_text
        );

        let messages = [
            ChatMessage::system(format!(
                "You are an expert at creating {target}-word summaries that preserve \
essential information for search."
            )),
            ChatMessage::user(prompt),
        ];

        match self.llm.complete(&messages, 0.1, target * 3).await {
            Ok(response) => {
                let summary = response.trim().to_string();
                let summary_words = summary.split_whitespace().count();
                let compression_ratio = if summary_words > 0 {
                    group.word_count as f64 / summary_words as f64
                } else {
                    1.0
                };
                CompressedGroup {
                    group,
                    summary,
                    compression_ratio,
                    strategy_used: strategy,
                    processing_time: started.elapsed().as_secs_f64(),
                }
            }
            Err(e) => {
                warn!("Compression failed for {}: {e}", group.group_id);
                let summary = truncate_words(&group.combined_text, target);
                let compression_ratio = group.word_count as f64 / target as f64;
                CompressedGroup {
                    group,
                    summary,
                    compression_ratio,
                    strategy_used: CompressionStrategy::Fallback,
                    processing_time: started.elapsed().as_secs_f64(),
                }
            }
        }
    }
}

/// First `target` words with a trailing ellipsis.
pub(crate) fn truncate_words(text: &str, target: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().take(target).collect();
    format!("{}...", words.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockLlm;
    use crate::llm::{ChatMessage, LlmError};

    fn group_of(text: &str) -> LogicalGroup {
        let word_count = text.split_whitespace().count();
        LogicalGroup {
            group_id: "group_0".to_string(),
            sentences: vec![text.to_string()],
            combined_text: text.to_string(),
            topic_indicators: vec![],
            word_count,
            coherence_score: 1.0,
        }
    }

    struct FailingLlm;

    #[async_trait::async_trait]
    impl crate::llm::LanguageModel for FailingLlm {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, LlmError> {
            Err(LlmError::EmbeddingFailed("offline".to_string()))
        }

        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _temperature: f32,
            _max_tokens: usize,
        ) -> Result<String, LlmError> {
            Err(LlmError::CompletionFailed("offline".to_string()))
        }

        fn dimensions(&self) -> usize {
            1536
        }
    }

    #[test]
    fn test_strategy_selection() {
        assert_eq!(
            AdaptiveCompressor::choose_strategy("Follow these steps to install."),
            CompressionStrategy::Detailed
        );
        assert_eq!(
            AdaptiveCompressor::choose_strategy("A list including several items such as these."),
            CompressionStrategy::Balanced
        );
        assert_eq!(
            AdaptiveCompressor::choose_strategy("Plain narrative text."),
            CompressionStrategy::Balanced
        );
    }

    #[test]
    fn test_target_length_clamped() {
        assert_eq!(
            AdaptiveCompressor::target_length(50, CompressionStrategy::Balanced),
            10
        );
        assert_eq!(
            AdaptiveCompressor::target_length(200, CompressionStrategy::Balanced),
            20
        );
        assert_eq!(
            AdaptiveCompressor::target_length(2000, CompressionStrategy::Balanced),
            50
        );
        assert_eq!(
            AdaptiveCompressor::target_length(200, CompressionStrategy::Detailed),
            25
        );
    }

    #[tokio::test]
    async fn test_short_group_bypasses_compression() {
        let compressor = AdaptiveCompressor::new(Arc::new(MockLlm::default()));
        let group = group_of("only a handful of words here");
        let compressed = compressor.compress(group.clone()).await;

        assert_eq!(compressed.strategy_used, CompressionStrategy::NoCompression);
        assert_eq!(compressed.summary, group.combined_text);
        assert_eq!(compressed.compression_ratio, 1.0);
    }

    #[tokio::test]
    async fn test_forty_five_word_echo_keeps_balanced_strategy() {
        // 45 words is over the bypass threshold; a model echoing its input
        // yields a ratio of ~1.0 but the strategy stays "balanced".
        let text = (0..45).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let llm = MockLlm::default().with_reply(text.clone());
        let compressor = AdaptiveCompressor::new(Arc::new(llm));

        let compressed = compressor.compress(group_of(&text)).await;
        assert_eq!(compressed.strategy_used, CompressionStrategy::Balanced);
        assert!((compressed.compression_ratio - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_compression_ratio_matches_word_counts() {
        let text = (0..100).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let reply = (0..10).map(|i| format!("s{i}")).collect::<Vec<_>>().join(" ");
        let llm = MockLlm::default().with_reply(reply);
        let compressor = AdaptiveCompressor::new(Arc::new(llm));

        let compressed = compressor.compress(group_of(&text)).await;
        assert!((compressed.compression_ratio - 10.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_truncation() {
        let text = (0..100).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let compressor = AdaptiveCompressor::new(Arc::new(FailingLlm));

        let compressed = compressor.compress(group_of(&text)).await;
        assert_eq!(compressed.strategy_used, CompressionStrategy::Fallback);
        assert!(compressed.summary.ends_with("..."));
        // Target for 100 balanced words is 10
        assert_eq!(compressed.summary.split_whitespace().count(), 10);
        assert!((compressed.compression_ratio - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_aggressive_is_never_auto_selected() {
        for text in [
            "steps and procedure",
            "a list including items",
            "generic prose",
        ] {
            assert_ne!(
                AdaptiveCompressor::choose_strategy(text),
                CompressionStrategy::Aggressive
            );
        }
    }
}
