//! Prompt templates for the two answer modes.

use crate::provider::Message;

const DOCUMENTATION_SYSTEM_PROMPT: &str = "You are a helpful documentation assistant.";

/// Build the single generation prompt asking for an example with explanation.
#[must_use]
pub fn code_snippet_prompt(context: &str, question: &str) -> String {
    format!(
        "You are a helpful coding assistant. Based on the following documentation context:\n\
         \n\
         {context}\n\
         \n\
         Answer the question: {question}\n\
         \n\
         Provide a clear code example if applicable. Include explanations if needed."
    )
}

/// System + user messages for a plain documentation answer.
#[must_use]
pub fn documentation_messages(context: &str, question: &str) -> Vec<Message> {
    vec![
        Message::system(DOCUMENTATION_SYSTEM_PROMPT),
        Message::user(format!("Context:\n{context}\n\nQuestion: {question}")),
    ]
}
