/// Prompt composition for the answer strategies.
///
/// Each way of combining retrieved context is a variant of
/// [`ContextBlocks`], dispatched through a single compose function, so
/// the policy set stays closed and type-checked.
use crate::llm::ChatMessage;

const BASIC_SYSTEM: &str = "You are a helpful assistant that answers questions based on \
provided context. If the context doesn't contain enough information to answer the \
question, say so clearly. Always be accurate and cite the information from the context.";

const ENHANCED_SYSTEM: &str = "Use both detailed chunks and logical summaries to provide \
comprehensive answers. Summaries give broader context, chunks provide specific details.";

const PARAGRAPH_SYSTEM: &str = "Use both detailed information and wider paragraph context \
to provide comprehensive answers. Paragraph summaries give broader context and themes, \
detailed information provides specific facts.";

const LOCATION_SYSTEM: &str = "You are a helpful assistant that answers questions based on \
provided context. Each source includes location information in brackets. When referencing \
information, mention the specific location (page, section) when available. If the context \
doesn't contain enough information to answer the question, say so clearly. Always be \
accurate and cite the information from the context.";

const HISTORY_NOTE: &str = " Earlier conversation turns are included before the context; \
use them to resolve references back to previous questions and answers.";

/// Retrieved context arranged for one of the closed set of strategies.
#[derive(Debug, Clone)]
pub enum ContextBlocks {
    Basic {
        chunks: Vec<String>,
    },
    Enhanced {
        chunks: Vec<String>,
        summaries: Vec<String>,
    },
    Paragraph {
        chunks: Vec<String>,
        paragraphs: Vec<String>,
    },
    /// Chunks pre-annotated with `[Source: ...]` location tags.
    Location {
        annotated_chunks: Vec<String>,
    },
}

/// Build the role-tagged message list for a strategy, question, and
/// optional conversation history.
#[must_use]
pub fn compose(blocks: &ContextBlocks, question: &str, history: &str) -> Vec<ChatMessage> {
    let (system, context, closing) = match blocks {
        ContextBlocks::Basic { chunks } => {
            (BASIC_SYSTEM, chunks.join("\n\n"), "Answer:".to_string())
        }
        ContextBlocks::Enhanced { chunks, summaries } => {
            let summary_block = summaries
                .iter()
                .map(|s| format!("Summary: {s}"))
                .collect::<Vec<_>>()
                .join("\n\n");
            (
                ENHANCED_SYSTEM,
                format!(
                    "Detailed Chunks:\n{}\n\nLogical Summaries:\n{summary_block}",
                    chunks.join("\n\n")
                ),
                "Answer:".to_string(),
            )
        }
        ContextBlocks::Paragraph { chunks, paragraphs } => {
            let paragraph_block = paragraphs
                .iter()
                .map(|p| format!("Paragraph Context: {p}"))
                .collect::<Vec<_>>()
                .join("\n\n");
            (
                PARAGRAPH_SYSTEM,
                format!(
                    "Detailed Information:\n{}\n\nWider Context (Paragraph Summaries):\n{paragraph_block}",
                    chunks.join("\n\n")
                ),
                "Answer using both the detailed information and broader paragraph context:"
                    .to_string(),
            )
        }
        ContextBlocks::Location { annotated_chunks } => (
            LOCATION_SYSTEM,
            annotated_chunks.join("\n---\n"),
            "Answer the question and reference specific locations when mentioning information:"
                .to_string(),
        ),
    };

    let system_content = if history.is_empty() {
        system.to_string()
    } else {
        format!("{system}{HISTORY_NOTE}")
    };

    let mut user_content = String::new();
    if !history.is_empty() {
        user_content.push_str(&format!("Previous conversation:\n{history}\n\n"));
    }
    user_content.push_str(&format!("Context:\n{context}\n\nQuestion: {question}\n\n{closing}"));

    vec![
        ChatMessage::system(system_content),
        ChatMessage::user(user_content),
    ]
}
