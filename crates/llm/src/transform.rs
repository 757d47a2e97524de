//! Request transformer: inbound dialect payloads become the common-form
//! upstream request.
//!
//! The normalization pipeline is ordered: system coercion first, then
//! dynamic variable expansion, then model-name mapping. Tool declarations
//! carry over structurally.

use config::{UpstreamConfig, UserProfile};
use jiff::{Zoned, tz::TimeZone};

use crate::{
    messages::{anthropic, openai},
    upstream::{ChatRequest, ChatTurn, TurnRole},
};

const SYSTEM_PREFIX: &str = "[SYSTEM] ";
const SYSTEM_SUFFIX: &str = "\n\n[USER PROMPT FOLLOWS]\n";

/// Normalize an OpenAI chat completion request.
pub(crate) fn from_openai(request: openai::ChatCompletionRequest, config: &UpstreamConfig) -> ChatRequest {
    let mut system_parts = Vec::new();
    let mut turns = Vec::new();

    for message in &request.messages {
        let text = message.content.as_ref().map(|c| c.to_text()).unwrap_or_default();

        match message.role {
            openai::ChatRole::System => system_parts.push(text),
            openai::ChatRole::User => turns.push(ChatTurn {
                role: TurnRole::User,
                content: text,
            }),
            openai::ChatRole::Assistant => turns.push(ChatTurn {
                role: TurnRole::Assistant,
                content: text,
            }),
            // Tool results re-enter the conversation as user turns; the
            // upstream has no dedicated tool role.
            openai::ChatRole::Tool => turns.push(ChatTurn {
                role: TurnRole::User,
                content: text,
            }),
        }
    }

    coerce_system(&mut turns, system_parts);
    expand_placeholders(&mut turns, &config.user);

    ChatRequest {
        model: map_model(&request.model, config),
        messages: turns,
        stream: true,
        temperature: request.temperature,
        top_p: request.top_p,
        max_tokens: request.max_tokens,
        tools: request.tools,
    }
}

/// Normalize an Anthropic messages request.
pub(crate) fn from_anthropic(request: anthropic::MessagesRequest, config: &UpstreamConfig) -> ChatRequest {
    let mut system_parts = Vec::new();
    let mut turns = Vec::new();

    if let Some(system) = &request.system {
        system_parts.push(system.to_text());
    }

    for message in &request.messages {
        let role = match message.role {
            anthropic::Role::User => TurnRole::User,
            anthropic::Role::Assistant => TurnRole::Assistant,
        };

        turns.push(ChatTurn {
            role,
            content: flatten_content(&message.content),
        });
    }

    coerce_system(&mut turns, system_parts);
    expand_placeholders(&mut turns, &config.user);

    ChatRequest {
        model: map_anthropic_model(&request.model, config),
        messages: turns,
        stream: true,
        temperature: request.temperature,
        top_p: request.top_p,
        max_tokens: Some(request.max_tokens),
        tools: request.tools.map(|tools| tools.into_iter().map(tool_to_openai).collect()),
    }
}

/// Translate an Anthropic tool declaration to the OpenAI function format
/// the upstream understands. The JSON Schema object carries over untouched.
fn tool_to_openai(tool: anthropic::AnthropicTool) -> openai::Tool {
    openai::Tool {
        r#type: openai::ToolType::Function,
        function: openai::FunctionDefinition {
            name: tool.name,
            description: tool.description,
            parameters: Some(tool.input_schema),
        },
    }
}

fn flatten_content(content: &anthropic::MessageContent) -> String {
    match content {
        anthropic::MessageContent::Text(text) => text.clone(),
        anthropic::MessageContent::Blocks(blocks) => blocks
            .iter()
            .filter_map(|block| match block {
                anthropic::ContentBlock::Text { text } => Some(text.clone()),
                anthropic::ContentBlock::ToolResult { content, .. } => {
                    content.as_ref().map(tool_result_text)
                }
                // Prior assistant reasoning and tool invocations add no
                // forwardable prompt text.
                _ => None,
            })
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn tool_result_text(content: &serde_json::Value) -> String {
    match content {
        serde_json::Value::String(text) => text.clone(),
        serde_json::Value::Array(parts) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(serde_json::Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

/// Fold system messages into the first user turn.
///
/// The concatenated system text becomes a prefix of the first user message:
/// `[SYSTEM] <text>\n\n[USER PROMPT FOLLOWS]\n<first user message>`. With
/// no user turn present, the coerced text becomes one on its own.
fn coerce_system(turns: &mut Vec<ChatTurn>, system_parts: Vec<String>) {
    if system_parts.is_empty() {
        return;
    }

    let prefix = format!("{SYSTEM_PREFIX}{}{SYSTEM_SUFFIX}", system_parts.join("\n\n"));

    match turns.iter_mut().find(|turn| turn.role == TurnRole::User) {
        Some(turn) => turn.content.insert_str(0, &prefix),
        None => turns.insert(
            0,
            ChatTurn {
                role: TurnRole::User,
                content: prefix,
            },
        ),
    }
}

/// Expand `{{DATE}}`-style dynamic variables in every turn.
fn expand_placeholders(turns: &mut [ChatTurn], user: &UserProfile) {
    let timezone = user
        .timezone
        .as_deref()
        .and_then(|name| TimeZone::get(name).ok())
        .unwrap_or(TimeZone::UTC);

    let now = Zoned::now().with_time_zone(timezone);

    for turn in turns {
        if turn.content.contains("{{") {
            turn.content = expand_in(&turn.content, &now, user);
        }
    }
}

fn expand_in(content: &str, now: &Zoned, user: &UserProfile) -> String {
    let mut out = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start..];

        let Some(end) = after.find("}}") else {
            out.push_str(after);
            return out;
        };

        let key = &after[2..end];

        match expansion(key, now, user) {
            Some(value) => out.push_str(&value),
            // Unknown placeholders stay literal.
            None => out.push_str(&after[..end + 2]),
        }

        rest = &after[end + 2..];
    }

    out.push_str(rest);
    out
}

fn expansion(key: &str, now: &Zoned, user: &UserProfile) -> Option<String> {
    match key {
        "DATE" => Some(now.strftime("%Y-%m-%d").to_string()),
        "TIME" => Some(now.strftime("%H:%M:%S").to_string()),
        "DAY" => Some(now.strftime("%A").to_string()),
        "TZ" => Some(
            user.timezone
                .clone()
                .unwrap_or_else(|| "UTC".to_string()),
        ),
        "USER_NAME" => Some(user.name.clone().unwrap_or_default()),
        "USER_LOCATION" => Some(user.location.clone().unwrap_or_default()),
        "USER_LANG" => Some(user.language.clone().unwrap_or_default()),
        _ => None,
    }
}

/// Map a dialect model name to the upstream model.
///
/// Every `claude-*` name collapses to the configured default; other names
/// pass through so OpenAI callers can pick upstream models directly.
fn map_model(model: &str, config: &UpstreamConfig) -> String {
    if model.starts_with("claude-") {
        return config.default_model.clone();
    }

    model.to_string()
}

/// Model mapping for the Anthropic endpoint: unknown names also collapse
/// to the default, with a log line.
fn map_anthropic_model(model: &str, config: &UpstreamConfig) -> String {
    if !model.starts_with("claude-") && model != config.default_model {
        log::info!("mapping unknown Anthropic model '{model}' to '{}'", config.default_model);
    }

    config.default_model.clone()
}
