/// Groups sentences into logical idea units.
///
/// Grouping is greedy: a new group opens on a discourse-marker topic
/// shift, on low lexical overlap with the previous sentence, or when the
/// running group would exceed the word cap.
use std::collections::HashSet;

use crate::ingest::splitter::split_sentences;

/// Lexical-overlap threshold below which a sentence starts a new group.
const SIMILARITY_THRESHOLD: f64 = 0.3;
/// Maximum words a single group may accumulate.
const MAX_GROUP_WORDS: usize = 150;
/// Sentences at or under this many characters are discarded as noise.
const MIN_SENTENCE_CHARS: usize = 10;

/// Discourse markers that indicate topic shifts, by category.
const TOPIC_SHIFT_MARKERS: [(&str, &[&str]); 6] = [
    (
        "contrast",
        &["however", "but", "although", "nevertheless", "on the other hand"],
    ),
    (
        "sequence",
        &["first", "second", "next", "then", "finally", "meanwhile"],
    ),
    (
        "causation",
        &["because", "therefore", "as a result", "consequently", "thus"],
    ),
    (
        "addition",
        &["furthermore", "moreover", "additionally", "also", "besides"],
    ),
    (
        "time",
        &["suddenly", "immediately", "later", "soon", "eventually"],
    ),
    (
        "dialogue",
        &["said", "asked", "replied", "exclaimed", "whispered", "shouted"],
    ),
];

/// A group of sentences that express one coherent idea.
///
/// Never mutated after creation; consumed once by the compressor.
#[derive(Debug, Clone)]
pub struct LogicalGroup {
    pub group_id: String,
    pub sentences: Vec<String>,
    pub combined_text: String,
    pub topic_indicators: Vec<String>,
    pub word_count: usize,
    pub coherence_score: f32,
}

#[derive(Default)]
pub struct SentenceGrouper;

impl SentenceGrouper {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Split text into sentences and merge them into logical groups.
    ///
    /// Total coverage of retained sentences, no overlap; empty when the
    /// input has no sentences above the noise threshold.
    #[must_use]
    pub fn group_text(&self, text: &str) -> Vec<LogicalGroup> {
        let sentences: Vec<String> = split_sentences(text)
            .into_iter()
            .filter(|s| s.chars().count() > MIN_SENTENCE_CHARS)
            .collect();
        self.group_sentences(sentences)
    }

    fn group_sentences(&self, sentences: Vec<String>) -> Vec<LogicalGroup> {
        let mut iter = sentences.into_iter();
        let Some(first) = iter.next() else {
            return Vec::new();
        };

        let mut groups = Vec::new();
        let mut current: Vec<String> = vec![first];
        // Marker that opened the current group, kept as its topic indicator
        let mut current_marker: Option<&'static str> = None;
        let mut group_index = 0usize;

        for sentence in iter {
            let shift_marker = detect_topic_shift(&sentence);
            let low_overlap = current
                .last()
                .is_some_and(|last| sentence_similarity(last, &sentence) < SIMILARITY_THRESHOLD);
            let over_cap =
                word_count(&current) + sentence.split_whitespace().count() > MAX_GROUP_WORDS;

            if shift_marker.is_some() || low_overlap || over_cap {
                groups.push(make_group(
                    std::mem::replace(&mut current, vec![sentence]),
                    group_index,
                    current_marker,
                ));
                current_marker = shift_marker;
                group_index += 1;
            } else {
                current.push(sentence);
            }
        }

        groups.push(make_group(current, group_index, current_marker));
        groups
    }
}

/// Marker that opens (or appears whole-word inside) the sentence, if any.
fn detect_topic_shift(sentence: &str) -> Option<&'static str> {
    let lower = sentence.to_lowercase();
    for (_, markers) in TOPIC_SHIFT_MARKERS {
        for marker in markers {
            if lower.starts_with(marker) || lower.contains(&format!(" {marker} ")) {
                return Some(marker);
            }
        }
    }
    None
}

/// Jaccard similarity over lowercased word sets.
fn sentence_similarity(a: &str, b: &str) -> f64 {
    let words_a: HashSet<String> = a.to_lowercase().split_whitespace().map(String::from).collect();
    let words_b: HashSet<String> = b.to_lowercase().split_whitespace().map(String::from).collect();

    let overlap = words_a.intersection(&words_b).count();
    let total = words_a.union(&words_b).count();
    if total == 0 {
        0.0
    } else {
        overlap as f64 / total as f64
    }
}

fn word_count(sentences: &[String]) -> usize {
    sentences
        .iter()
        .map(|s| s.split_whitespace().count())
        .sum()
}

fn make_group(
    sentences: Vec<String>,
    group_index: usize,
    break_marker: Option<&'static str>,
) -> LogicalGroup {
    let combined_text = sentences.join(" ");
    let word_count = combined_text.split_whitespace().count();

    // Coarse by design: singletons are trivially coherent
    let coherence_score = if sentences.len() == 1 { 1.0 } else { 0.7 };

    LogicalGroup {
        group_id: format!("group_{group_index}"),
        sentences,
        combined_text,
        topic_indicators: break_marker.map(String::from).into_iter().collect(),
        word_count,
        coherence_score,
    }
}
