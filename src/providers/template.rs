// `{{token}}` placeholder substitution
//
// Works on the JSON tree rather than on serialized text, so a user input
// containing quotes or braces can never change the shape of the request.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

use super::types::TemplateMode;
use crate::errors::{DispatchError, Result};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([^{}]*?)\s*\}\}").expect("placeholder pattern is valid"));

/// Values available to a template
#[derive(Debug, Clone, Copy)]
pub struct Substitutions<'a> {
    pub model: &'a str,
    pub user_input: &'a str,
    pub api_key: &'a str,
}

impl<'a> Substitutions<'a> {
    pub fn new(model: &'a str, user_input: &'a str, api_key: &'a str) -> Self {
        Self {
            model,
            user_input,
            api_key,
        }
    }

    fn get(&self, token: &str) -> Option<&'a str> {
        match token {
            "model" => Some(self.model),
            "userInput" => Some(self.user_input),
            "apiKey" => Some(self.api_key),
            _ => None,
        }
    }
}

/// Replace every placeholder in `text`
pub fn render_str(text: &str, subs: &Substitutions<'_>, mode: TemplateMode) -> Result<String> {
    let mut missing: Option<String> = None;

    let rendered = PLACEHOLDER.replace_all(text, |caps: &Captures<'_>| {
        let token = &caps[1];
        match subs.get(token) {
            Some(value) => value.to_string(),
            None => {
                if mode == TemplateMode::Lenient {
                    tracing::warn!(token = %token, "Unresolved template placeholder, using empty value");
                } else if missing.is_none() {
                    missing = Some(token.to_string());
                }
                String::new()
            }
        }
    });

    match missing {
        Some(token) => Err(DispatchError::TemplateInvalid { token }),
        None => Ok(rendered.into_owned()),
    }
}

/// Replace placeholders in every string of a JSON value. Object keys are
/// left as they are.
pub fn render_value(value: &Value, subs: &Substitutions<'_>, mode: TemplateMode) -> Result<Value> {
    Ok(match value {
        Value::String(s) => Value::String(render_str(s, subs, mode)?),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| render_value(item, subs, mode))
                .collect::<Result<Vec<_>>>()?,
        ),
        Value::Object(map) => {
            let mut rendered = serde_json::Map::with_capacity(map.len());
            for (key, item) in map {
                rendered.insert(key.clone(), render_value(item, subs, mode)?);
            }
            Value::Object(rendered)
        }
        other => other.clone(),
    })
}
