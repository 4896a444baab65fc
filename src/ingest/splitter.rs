/// Sentence- and paragraph-aware text splitting.
///
/// Chunks respect sentence boundaries where possible; oversized paragraphs
/// are rebuilt sentence-by-sentence with a character-bounded overlap window
/// carried into the next chunk.
use regex::Regex;

/// Common abbreviations that shouldn't end sentences.
const ABBREVIATIONS: [&str; 21] = [
    "Dr.", "Mr.", "Mrs.", "Ms.", "Prof.", "vs.", "etc.", "i.e.", "e.g.", "cf.", "al.", "Inc.",
    "Ltd.", "Corp.", "St.", "Ave.", "Blvd.", "Dept.", "Fig.", "Vol.", "No.",
];

/// Whether the trailing whitespace-delimited token of `s` is a known
/// abbreviation.
fn ends_with_abbreviation(s: &str) -> bool {
    let trimmed = s.trim_end();
    ABBREVIATIONS.iter().any(|abbr| {
        trimmed.ends_with(abbr) && {
            let prefix = &trimmed[..trimmed.len() - abbr.len()];
            prefix.is_empty() || prefix.ends_with(char::is_whitespace)
        }
    })
}

fn split_at_terminators(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut sentences = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            let at_end = i + 1 >= chars.len();
            let next_is_space = chars.get(i + 1).is_some_and(|n| n.is_whitespace());
            if (at_end || next_is_space) && !ends_with_abbreviation(&current) {
                let trimmed = current.trim();
                if !trimmed.is_empty() {
                    sentences.push(trimmed.to_string());
                }
                current.clear();
            }
        }
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
    sentences
}

/// Join a sentence ending in an abbreviation with a following sentence
/// that starts lower-case. Catches splits the terminator scan missed,
/// e.g. sentences arriving pre-split from an upstream tokenizer.
fn merge_abbreviation_breaks(sentences: Vec<String>) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();
    for sentence in sentences {
        if let Some(last) = merged.last_mut() {
            if ends_with_abbreviation(last)
                && sentence.chars().next().is_some_and(char::is_lowercase)
            {
                last.push(' ');
                last.push_str(&sentence);
                continue;
            }
        }
        merged.push(sentence);
    }
    merged
}

/// Split text into sentences with abbreviation-aware boundaries.
#[must_use]
pub fn split_sentences(text: &str) -> Vec<String> {
    merge_abbreviation_breaks(split_at_terminators(text))
}

/// Split text into cleaned paragraphs on blank-line separators.
///
/// Internal whitespace is normalized and fragments of 20 characters or
/// fewer are dropped as non-substantive.
#[must_use]
pub fn split_paragraphs(text: &str) -> Vec<String> {
    let separator = Regex::new(r"\n\s*\n").expect("valid paragraph regex");
    separator
        .split(text.trim())
        .filter_map(|para| {
            let normalized = para.split_whitespace().collect::<Vec<_>>().join(" ");
            (normalized.len() > 20).then_some(normalized)
        })
        .collect()
}

/// Splits text into chunks that respect sentence and paragraph boundaries.
pub struct LogicalTextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl LogicalTextSplitter {
    #[must_use]
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    /// Split text into logical chunks of at most `chunk_size` characters
    /// (single sentences longer than that are kept whole).
    #[must_use]
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let mut all_chunks = Vec::new();
        for paragraph in split_paragraphs(text) {
            all_chunks.extend(self.chunk_paragraph(&paragraph));
        }
        all_chunks
    }

    fn chunk_paragraph(&self, paragraph: &str) -> Vec<String> {
        if paragraph.chars().count() <= self.chunk_size {
            return vec![paragraph.to_string()];
        }

        let sentences = split_sentences(paragraph);
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_sentences: Vec<String> = Vec::new();

        for sentence in sentences {
            let sentence_len = sentence.chars().count();
            let potential_len = if current.is_empty() {
                sentence_len
            } else {
                current.chars().count() + 1 + sentence_len
            };

            if potential_len > self.chunk_size && !current.is_empty() {
                chunks.push(current.clone());

                // Carry a trailing overlap window into the next chunk
                let overlap = self.overlap_window(&current_sentences);
                current = if overlap.is_empty() {
                    sentence.clone()
                } else {
                    format!("{overlap} {sentence}")
                };
                current_sentences = vec![sentence];
            } else {
                if current.is_empty() {
                    current = sentence.clone();
                } else {
                    current.push(' ');
                    current.push_str(&sentence);
                }
                current_sentences.push(sentence);
            }
        }

        if !current.is_empty() {
            chunks.push(current);
        }

        chunks
    }

    /// Collect trailing sentences whose combined length fits the overlap
    /// budget, most recent last.
    fn overlap_window(&self, sentences: &[String]) -> String {
        if self.chunk_overlap == 0 {
            return String::new();
        }

        let mut window: Vec<&str> = Vec::new();
        let mut used = 0usize;
        for prev in sentences.iter().rev() {
            let len = prev.chars().count();
            if used + len <= self.chunk_overlap {
                window.push(prev.as_str());
                used += len;
            } else {
                break;
            }
        }
        window.reverse();
        window.join(" ")
    }
}
