/// Chunk metadata extraction: positions, sections, key terms, content type.
///
/// All classifiers are ordered first-match-wins heuristic lists so the
/// policy stays inspectable and testable on its own.
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::store::Metadata;

// ── Content type ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    NumberedList,
    BulletList,
    TableContent,
    FigureReference,
    SummaryContent,
    Procedural,
    FaqContent,
    GeneralText,
}

impl ContentType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::NumberedList => "numbered_list",
            ContentType::BulletList => "bullet_list",
            ContentType::TableContent => "table_content",
            ContentType::FigureReference => "figure_reference",
            ContentType::SummaryContent => "summary_content",
            ContentType::Procedural => "procedural",
            ContentType::FaqContent => "faq_content",
            ContentType::GeneralText => "general_text",
        }
    }
}

// ── Chunk metadata ───────────────────────────────────────────────────

/// Metadata annotated onto every retrieval chunk.
///
/// Invariants: `start_char < end_char <= source.len()`,
/// `chunk_index < total_chunks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub filename: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub chunk_size: usize,
    pub chunk_summary: String,
    pub page_number: Option<u32>,
    pub section_title: Option<String>,
    pub start_char: usize,
    pub end_char: usize,
    pub paragraph_number: usize,
    pub content_type: ContentType,
    pub key_terms: Vec<String>,
    pub chunk_hash: String,
}

impl ChunkMetadata {
    /// Stable record id; the hash component makes re-ingestion idempotent.
    #[must_use]
    pub fn record_id(&self) -> String {
        format!("{}_{}_{}", self.filename, self.chunk_index, self.chunk_hash)
    }

    /// Human-readable location tag used in prompts and source listings.
    #[must_use]
    pub fn location_reference(&self) -> String {
        let page = self
            .page_number
            .map_or_else(|| "N/A".to_string(), |p| p.to_string());
        let section = self.section_title.as_deref().unwrap_or("Unknown");
        format!(
            "Page {page}, Section: {section}, Paragraph {}",
            self.paragraph_number
        )
    }

    /// Flatten into the storage metadata map.
    #[must_use]
    pub fn to_metadata_map(&self) -> Metadata {
        let mut map = Metadata::new();
        map.insert("filename".to_string(), json!(self.filename));
        map.insert("chunk_index".to_string(), json!(self.chunk_index));
        map.insert("total_chunks".to_string(), json!(self.total_chunks));
        map.insert("chunk_size".to_string(), json!(self.chunk_size));
        map.insert("chunk_summary".to_string(), json!(self.chunk_summary));
        map.insert("page_number".to_string(), json!(self.page_number));
        map.insert(
            "section_title".to_string(),
            json!(self.section_title.as_deref().unwrap_or("Unknown Section")),
        );
        map.insert("start_char".to_string(), json!(self.start_char));
        map.insert("end_char".to_string(), json!(self.end_char));
        map.insert("paragraph_number".to_string(), json!(self.paragraph_number));
        map.insert("content_type".to_string(), json!(self.content_type.as_str()));
        map.insert("key_terms".to_string(), json!(self.key_terms.join(", ")));
        map.insert("chunk_hash".to_string(), json!(self.chunk_hash));
        map.insert(
            "location_reference".to_string(),
            json!(self.location_reference()),
        );
        map
    }
}

// ── Extractor ────────────────────────────────────────────────────────

enum ContentCheck {
    /// Regex over the raw chunk text.
    Raw(Regex),
    /// Regex over the lowercased chunk text.
    Lower(Regex),
    /// More than this many question marks in the chunk.
    QuestionMarksOver(usize),
}

struct ContentRule {
    check: ContentCheck,
    label: ContentType,
}

impl ContentRule {
    fn matches(&self, text: &str, lower: &str) -> bool {
        match &self.check {
            ContentCheck::Raw(re) => re.is_match(text),
            ContentCheck::Lower(re) => re.is_match(lower),
            ContentCheck::QuestionMarksOver(n) => text.matches('?').count() > *n,
        }
    }
}

pub struct MetadataExtractor {
    page_patterns: Vec<Regex>,
    section_patterns: Vec<Regex>,
    content_rules: Vec<ContentRule>,
}

impl Default for MetadataExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataExtractor {
    pub fn new() -> Self {
        let raw = |src: &str, label| ContentRule {
            check: ContentCheck::Raw(Regex::new(src).expect("valid content pattern")),
            label,
        };
        let lower = |src: &str, label| ContentRule {
            check: ContentCheck::Lower(Regex::new(src).expect("valid content pattern")),
            label,
        };

        Self {
            page_patterns: vec![
                Regex::new(r"(?i)Page\s+(\d+)").expect("valid page pattern"),
                Regex::new(r"\[Page\s+(\d+)\]").expect("valid page pattern"),
                // Standalone numbers on their own line
                Regex::new(r"(?m)^\s*(\d+)\s*$").expect("valid page pattern"),
            ],
            section_patterns: vec![
                // Markdown headers
                Regex::new(r"^#{1,6}\s+(.+)$").expect("valid section pattern"),
                // ALL CAPS headers
                Regex::new(r"^([A-Z][A-Z\s]{2,})$").expect("valid section pattern"),
                // Numbered sections
                Regex::new(r"^\d+\.\s+(.+)$").expect("valid section pattern"),
                // Chapter headers
                Regex::new(r"(?i)^Chapter\s+\d+:?\s*(.*)$").expect("valid section pattern"),
                // Bold headers
                Regex::new(r"^\*\*(.+)\*\*$").expect("valid section pattern"),
            ],
            // First match wins, so order is part of the policy
            content_rules: vec![
                raw(r"\d+\.\s+.*\d+\.\s+.*\d+\.\s+", ContentType::NumberedList),
                raw(r"[•\-\*]\s+.*[•\-\*]\s+", ContentType::BulletList),
                lower(r"(table|column|row)", ContentType::TableContent),
                lower(r"(figure|chart|graph|image)", ContentType::FigureReference),
                lower(
                    r"(introduction|overview|summary|conclusion)",
                    ContentType::SummaryContent,
                ),
                lower(r"(step|procedure|method|process)", ContentType::Procedural),
                ContentRule {
                    check: ContentCheck::QuestionMarksOver(2),
                    label: ContentType::FaqContent,
                },
            ],
        }
    }

    /// Extract page numbers and their byte positions in the text.
    #[must_use]
    pub fn extract_page_positions(&self, text: &str) -> Vec<(usize, u32)> {
        let mut positions = Vec::new();
        for pattern in &self.page_patterns {
            for caps in pattern.captures_iter(text) {
                if let (Some(m), Some(num)) = (caps.get(0), caps.get(1)) {
                    if let Ok(page) = num.as_str().parse::<u32>() {
                        positions.push((m.start(), page));
                    }
                }
            }
        }
        positions
    }

    /// Extract section titles and their byte positions, scanning line by
    /// line with the first matching header pattern winning.
    #[must_use]
    pub fn extract_section_positions(&self, text: &str) -> Vec<(usize, String)> {
        let mut positions = Vec::new();
        let mut char_position = 0usize;

        for line in text.split('\n') {
            let stripped = line.trim();
            for pattern in &self.section_patterns {
                if let Some(caps) = pattern.captures(stripped) {
                    let title = caps
                        .get(1)
                        .map(|m| m.as_str().trim().to_string())
                        .unwrap_or_default();
                    // Filter out very short "titles"
                    if title.len() > 3 {
                        positions.push((char_position, title));
                    }
                    break;
                }
            }
            char_position += line.len() + 1;
        }

        positions
    }

    /// Closest entry at or before `position`, if any.
    #[must_use]
    pub fn nearest_preceding<T: Clone>(entries: &[(usize, T)], position: usize) -> Option<T> {
        entries
            .iter()
            .filter(|(pos, _)| *pos <= position)
            .max_by_key(|(pos, _)| *pos)
            .map(|(_, v)| v.clone())
    }

    /// Number of blank-line paragraph breaks before `position`, 1-based.
    #[must_use]
    pub fn paragraph_number(text: &str, position: usize) -> usize {
        let idx = floor_char_boundary(text, position.min(text.len()));
        text[..idx].matches("\n\n").count() + 1
    }

    /// Short extractive blurb: the first meaningful sentence, extended by
    /// a second when too short, capped at `max_length` characters.
    #[must_use]
    pub fn chunk_summary(&self, text: &str, max_length: usize) -> String {
        let clean: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
        let sentences: Vec<&str> = clean
            .split('.')
            .map(str::trim)
            .filter(|s| s.chars().count() > 10)
            .collect();

        let mut summary = match sentences.first() {
            Some(first) => {
                let mut s = (*first).to_string();
                if s.chars().count() < 50 {
                    if let Some(second) = sentences.get(1) {
                        s.push_str(". ");
                        s.push_str(second);
                    }
                }
                s
            }
            None => clean.chars().take(max_length).collect(),
        };

        if summary.chars().count() > max_length {
            summary = summary.chars().take(max_length.saturating_sub(3)).collect();
            summary.push_str("...");
        }
        summary
    }

    /// Up to `max_terms` key terms: capitalized tokens and long words,
    /// ranked by how often they occur in the chunk.
    #[must_use]
    pub fn key_terms(&self, text: &str, max_terms: usize) -> Vec<String> {
        let cleaned: String = text
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c.is_whitespace() {
                    c
                } else {
                    ' '
                }
            })
            .collect();

        let mut candidates: Vec<String> = Vec::new();
        for word in cleaned.split_whitespace() {
            let first_upper = word.chars().next().is_some_and(char::is_uppercase);
            if first_upper && word.chars().count() > 2 {
                candidates.push(word.to_string());
            }
            if word.chars().count() > 6 {
                candidates.push(word.to_lowercase());
            }
        }

        candidates.sort();
        candidates.dedup();

        let lower = text.to_lowercase();
        // Stable sort over the alphabetical order keeps equal counts deterministic
        candidates.sort_by_key(|term| {
            std::cmp::Reverse(lower.matches(term.to_lowercase().as_str()).count())
        });
        candidates.truncate(max_terms);
        candidates
    }

    /// Classify the chunk's content via the ordered rule list.
    #[must_use]
    pub fn content_type(&self, text: &str) -> ContentType {
        let lower = text.to_lowercase();
        self.content_rules
            .iter()
            .find(|rule| rule.matches(text, &lower))
            .map_or(ContentType::GeneralText, |rule| rule.label)
    }
}

/// 12-character content fingerprint for deduplication and idempotent
/// re-ingestion.
#[must_use]
pub fn chunk_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex[..12].to_string()
}

pub(crate) fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}
