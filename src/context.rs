//! Assembly of retrieved chunks and recent conversation into prompt context.

use crate::stores::ChunkMetadata;
use crate::types::ConversationTurn;

/// At most this many of the most recent turns are included.
pub const HISTORY_WINDOW: usize = 5;

/// Formats retrieved documents and a bounded history tail into one context
/// string. Deterministic given its inputs; no side effects.
pub fn assemble(
    documents: &[String],
    metadatas: &[ChunkMetadata],
    history: &[ConversationTurn],
) -> String {
    let mut context = String::new();

    for (i, (document, metadata)) in documents.iter().zip(metadatas).enumerate() {
        context.push_str(&format!("\n--- Source {} ---\n", i + 1));
        context.push_str(&format!("Title: {}\n", metadata.title));
        context.push_str(&format!("Source: {}\n", metadata.source));
        context.push_str(&format!("Date: {}\n", metadata.date));
        context.push_str(&format!("Content: {}\n", document));
    }

    if !history.is_empty() {
        context.push_str("\nPrevious conversation:\n");
        let start = history.len().saturating_sub(HISTORY_WINDOW);
        for turn in &history[start..] {
            context.push_str(&format!("{}: {}\n", turn.role, turn.content));
        }
    }

    context
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(title: &str) -> ChunkMetadata {
        ChunkMetadata {
            title: title.to_string(),
            source: "https://feed.example/rss".into(),
            url: "https://example.com/a".into(),
            date: "2026-01-01".into(),
            description: String::new(),
            chunk_index: 0,
            total_chunks: 1,
            article_id: "a-1".into(),
        }
    }

    #[test]
    fn numbers_sources_in_result_order() {
        let documents = vec!["first chunk".to_string(), "second chunk".to_string()];
        let metadatas = vec![metadata("First"), metadata("Second")];
        let context = assemble(&documents, &metadatas, &[]);

        let first = context.find("--- Source 1 ---").unwrap();
        let second = context.find("--- Source 2 ---").unwrap();
        assert!(first < second);
        assert!(context.contains("Title: First"));
        assert!(context.contains("Content: second chunk"));
        assert!(!context.contains("Previous conversation"));
    }

    #[test]
    fn history_tail_is_bounded_to_most_recent_turns() {
        let history: Vec<ConversationTurn> = (0..8)
            .map(|i| ConversationTurn::user(format!("question {i}")))
            .collect();
        let context = assemble(&[], &[], &history);

        assert!(!context.contains("question 2"));
        for i in 3..8 {
            assert!(context.contains(&format!("user: question {i}")));
        }
    }

    #[test]
    fn deterministic_for_equal_inputs() {
        let documents = vec!["chunk".to_string()];
        let metadatas = vec![metadata("T")];
        let history = vec![ConversationTurn::user("q")];
        assert_eq!(
            assemble(&documents, &metadatas, &history),
            assemble(&documents, &metadatas, &history)
        );
    }
}
