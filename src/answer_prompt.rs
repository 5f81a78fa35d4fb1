//! Prompt used to summarize SQL results into an answer

use crate::llm::PromptMessage;
use crate::warehouse::QueryResult;

pub const ANSWER_SYSTEM_PROMPT: &str =
    "You are a helpful assistant that uses SQL output to answer questions.";

/// Build the system and user messages for a summary of `result`.
pub fn build_answer_messages(query: &str, result: &QueryResult) -> Vec<PromptMessage> {
    let user = format!(
        "The user asked: {query}\n\n\
         The SQL results are:\n{table}\n\n\
         Please answer the question concisely, without extra details.",
        table = result.to_markdown()
    );
    vec![PromptMessage::system(ANSWER_SYSTEM_PROMPT), PromptMessage::user(user)]
}
