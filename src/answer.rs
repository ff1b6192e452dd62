//! Retrieval-augmented answering.
//!
//! One query runs: embed the question, retrieve the nearest indexed
//! messages, assemble a grounded prompt with the conversation history,
//! and invoke the language model. Only a fully successful exchange is
//! appended to the conversation log.

use crate::embedding::Embedder;
use crate::error::AnswerError;
use crate::history::ConversationLog;
use crate::index::EmbeddingIndex;
use crate::llm::{ChatMessage, LanguageModel};

/// Fixed system instruction for the language model.
pub const SYSTEM_PROMPT: &str = "You analyze personal emails.";

/// Assemble the grounded prompt: retrieved message texts in retrieval
/// order, the serialized conversation history, then the current question.
pub fn build_prompt(documents: &[String], history: &ConversationLog, question: &str) -> String {
    format!(
        "You are an intelligent assistant answering questions based on personal emails.\n\
         Relevant emails:\n\n{}\n\nChat History:\n{}\n\nNow answer the current user question:\n{}",
        documents.join("\n\n"),
        history.render(),
        question
    )
}

/// Answer one question against the index.
///
/// The question is embedded with the same embedder as ingestion; the two
/// sides must share one embedding space for retrieval to mean anything.
/// On success the (question, answer) pair is appended to `log`; on any
/// failure `log` is left untouched.
pub async fn answer_question(
    index: &EmbeddingIndex,
    embedder: &dyn Embedder,
    llm: &dyn LanguageModel,
    log: &mut ConversationLog,
    question: &str,
    top_k: usize,
) -> Result<String, AnswerError> {
    let query_vec = embedder
        .embed(question)
        .await
        .map_err(|e| AnswerError::Embed(e.to_string()))?;

    let hits = index
        .search(&query_vec, top_k)
        .await
        .map_err(|e| AnswerError::Retrieve(e.to_string()))?;

    let documents: Vec<String> = hits.into_iter().map(|h| h.text).collect();
    let prompt = build_prompt(&documents, log, question);

    let messages = [ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)];

    let answer = llm
        .chat(&messages)
        .await
        .map_err(|e| AnswerError::Model(e.to_string()))?;

    log.append(question, answer.clone());
    Ok(answer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_contains_documents_in_order() {
        let docs = vec!["first doc".to_string(), "second doc".to_string()];
        let prompt = build_prompt(&docs, &ConversationLog::new(), "q");
        let a = prompt.find("first doc").unwrap();
        let b = prompt.find("second doc").unwrap();
        assert!(a < b);
    }

    #[test]
    fn prompt_contains_history_lines() {
        let mut log = ConversationLog::new();
        log.append("Q1", "A1");
        let prompt = build_prompt(&[], &log, "Q2");
        assert!(prompt.contains("Q: Q1\nA: A1"));
        assert!(prompt.ends_with("Q2"));
    }

    #[test]
    fn prompt_sections_ordered() {
        let docs = vec!["the doc".to_string()];
        let mut log = ConversationLog::new();
        log.append("old q", "old a");
        let prompt = build_prompt(&docs, &log, "new q");
        let doc_pos = prompt.find("the doc").unwrap();
        let hist_pos = prompt.find("Chat History:").unwrap();
        let q_pos = prompt.find("new q").unwrap();
        assert!(doc_pos < hist_pos && hist_pos < q_pos);
    }
}
