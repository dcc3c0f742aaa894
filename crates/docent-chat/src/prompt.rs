//! Prompt rendering for both chains.
//!
//! Rendering is a pure function of its inputs: the same settings, history,
//! and question always produce byte-identical prompts.

use docent_core::types::{ChatTurn, PromptMessage};
use docent_vector::index::RetrievedChunk;

/// Render the conversational prompt: domain-parameterized system
/// instruction, the full session history, then the new question.
pub fn conversational_prompt(
    domain: &str,
    history: &[ChatTurn],
    question: &str,
) -> Vec<PromptMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(PromptMessage::system(format!(
        "You are an expert in {}. Answer as clearly and concisely as possible.",
        domain
    )));
    for turn in history {
        messages.push(PromptMessage {
            role: turn.role,
            content: turn.text.clone(),
        });
    }
    messages.push(PromptMessage::user(question));
    messages
}

/// Render the retrieval prompt: context-bearing system instruction and the
/// raw question. Conversation history is deliberately absent; retrieval
/// answers are stateless across turns.
pub fn retrieval_prompt(context: &str, question: &str) -> Vec<PromptMessage> {
    vec![
        PromptMessage::system(format!(
            "You are a helpful assistant. Use the following context to answer \
             the question. If the answer is not in the context, say so.\n\n\
             Context: {}",
            context
        )),
        PromptMessage::user(question),
    ]
}

/// Join retrieved chunk texts in similarity-rank order, separated by a
/// blank line.
pub fn format_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}
