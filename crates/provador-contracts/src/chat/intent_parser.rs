use std::collections::BTreeMap;

use serde_json::Value;

use super::command_registry::{
    CommandSpec, COMPARE_COMMAND, DEFAULT_COMPARE_SPLIT, NO_ARG_COMMANDS, RAW_ARG_COMMANDS,
    SINGLE_PATH_COMMANDS,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub action: String,
    pub raw: String,
    pub question: Option<String>,
    pub command_args: BTreeMap<String, Value>,
}

impl Intent {
    fn new(action: &str, raw: &str) -> Self {
        Self {
            action: action.to_string(),
            raw: raw.to_string(),
            question: None,
            command_args: BTreeMap::new(),
        }
    }

    pub fn arg_str(&self, key: &str) -> Option<&str> {
        self.command_args
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn arg_f64(&self, key: &str) -> Option<f64> {
        self.command_args.get(key).and_then(Value::as_f64)
    }
}

fn find_action(command: &str, specs: &[CommandSpec]) -> Option<&'static str> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}

fn parse_path_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect(),
        Err(_) => arg
            .split_whitespace()
            .map(str::to_string)
            .filter(|value| !value.is_empty())
            .collect(),
    }
}

fn parse_single_path_arg(arg: &str) -> String {
    parse_path_args(arg).join(" ")
}

/// `/compare [split] <out>`: a leading number is the split, the rest the path.
fn parse_compare_args(arg: &str) -> (f64, String) {
    let mut parts = parse_path_args(arg);
    let split = parts
        .first()
        .and_then(|head| head.parse::<f64>().ok())
        .filter(|value| value.is_finite());
    if split.is_some() {
        parts.remove(0);
    }
    (split.unwrap_or(DEFAULT_COMPARE_SPLIT), parts.join(" "))
}

pub fn parse_intent(text: &str) -> Intent {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return Intent::new("noop", text);
    }

    if let Some(slash_tail) = raw_trimmed.strip_prefix('/') {
        let command_len = slash_tail
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
            .count();
        if command_len > 0 {
            let command = slash_tail[..command_len].to_ascii_lowercase();
            let arg = slash_tail[command_len..].trim();

            if let Some(action) = find_action(&command, RAW_ARG_COMMANDS) {
                let mut intent = Intent::new(action, text);
                if action == "ask" {
                    intent.question = Some(arg.to_string()).filter(|value| !value.is_empty());
                } else {
                    intent
                        .command_args
                        .insert("pose".to_string(), Value::String(arg.to_string()));
                }
                return intent;
            }

            if let Some(action) = find_action(&command, SINGLE_PATH_COMMANDS) {
                let mut intent = Intent::new(action, text);
                intent.command_args.insert(
                    "path".to_string(),
                    Value::String(parse_single_path_arg(arg)),
                );
                return intent;
            }

            if let Some(action) = find_action(&command, NO_ARG_COMMANDS) {
                return Intent::new(action, text);
            }

            if command == COMPARE_COMMAND.command {
                let (split, path) = parse_compare_args(arg);
                let mut intent = Intent::new(COMPARE_COMMAND.action, text);
                intent
                    .command_args
                    .insert("split".to_string(), Value::from(split));
                intent
                    .command_args
                    .insert("path".to_string(), Value::String(path));
                return intent;
            }

            let mut intent = Intent::new("unknown", text);
            intent
                .command_args
                .insert("command".to_string(), Value::String(command));
            intent
                .command_args
                .insert("arg".to_string(), Value::String(arg.to_string()));
            return intent;
        }
    }

    let mut intent = Intent::new("ask", text);
    intent.question = Some(raw_trimmed.to_string());
    intent
}
