use serde_json::Value;

use crate::types::{ChatMessage, MessageRole};

/// Render a chat transcript into a single few-shot prompt string using
/// `<|im_start|>`/`<|im_end|>` markers. Assistant tool calls become
/// `Use tool <name>, input: k:v, ...` lines so the transcript stays readable
/// for models prompted with plain text.
pub fn render_few_shot(messages: &[ChatMessage]) -> String {
    let mut out = String::new();

    for message in messages {
        if !message.tool_calls.is_empty() {
            out.push_str("<|im_start|>assistant");
            if let Some(text) = message.text() {
                if !text.is_empty() {
                    out.push_str(text);
                    out.push('\n');
                }
            }
            for call in &message.tool_calls {
                out.push_str(&format!(
                    "Use tool {}, input: {}",
                    call.function.name,
                    render_arguments(&call.function.arguments)
                ));
                out.push('\n');
            }
            out.push_str("\n<|im_end|>");
        } else {
            let role = match message.role {
                MessageRole::User => "user",
                MessageRole::Tool => "tool",
                _ => "assistant",
            };
            out.push_str(&format!(
                "<|im_start|>{role}\n{}\n<|im_end|>",
                message.text().unwrap_or_default()
            ));
        }

        out.push('\n');
    }

    out
}

/// Drop system messages, mirroring how few-shot transcripts are assembled
/// before rendering.
pub fn strip_system(messages: &[ChatMessage]) -> Vec<ChatMessage> {
    messages
        .iter()
        .filter(|message| message.role != MessageRole::System)
        .cloned()
        .collect()
}

fn render_arguments(arguments: &Value) -> String {
    match arguments {
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| format!("{key}:{}", render_scalar(value)))
            .collect::<Vec<_>>()
            .join(", "),
        other => render_scalar(other),
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
