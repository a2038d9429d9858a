//! Turns the provider's free-text reply into a [`MacroEstimate`].
//!
//! Parsing runs in two stages: a strict JSON parse of the first balanced
//! `{...}` span, then a regex rescue over that same span for replies that are
//! almost-JSON. Anything that survives is coerced into the result shape.
//! Nothing here returns an error; an unreadable reply becomes a fallback
//! estimate carrying an `error` string.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::dto::{Calories, MacroEstimate, Mode, NO_FOOD_MESSAGE};
use crate::provider::ProviderError;

/// Why an estimate had to be replaced by placeholder data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    RateLimited,
    Authentication,
    EndpointUnavailable,
    Unparseable,
    Unavailable,
}

impl FallbackReason {
    pub fn message(self) -> &'static str {
        match self {
            FallbackReason::RateLimited => "Rate limit exceeded. Please try again in a few moments.",
            FallbackReason::Authentication => {
                "API authentication error. Please check your API key."
            }
            FallbackReason::EndpointUnavailable => {
                "API endpoint error. The service is not available."
            }
            FallbackReason::Unparseable => "Could not read nutrition data from the AI response.",
            FallbackReason::Unavailable => "Failed to get precise estimates from AI service",
        }
    }
}

impl From<&ProviderError> for FallbackReason {
    fn from(err: &ProviderError) -> Self {
        match err.status() {
            Some(429) => FallbackReason::RateLimited,
            Some(401) | Some(403) => FallbackReason::Authentication,
            Some(404) => FallbackReason::EndpointUnavailable,
            _ => FallbackReason::Unavailable,
        }
    }
}

/// Placeholder estimate served when no real answer is available.
pub fn fallback(mode: Mode, reason: FallbackReason) -> MacroEstimate {
    MacroEstimate {
        calories: Some(Calories::number(350)),
        protein: Some("25g".into()),
        carbs: Some("30g".into()),
        fat: Some("10g".into()),
        ingredients: match mode {
            Mode::Detailed => Some(vec!["Could not identify ingredients".into()]),
            Mode::Basic => None,
        },
        error: Some(reason.message().to_string()),
        ..MacroEstimate::empty(mode)
    }
}

pub fn normalize(raw: &str, mode: Mode) -> MacroEstimate {
    let Some(span) = first_json_object(raw) else {
        warn!(%mode, "provider reply contains no JSON object");
        debug!(raw, "unparseable provider reply");
        return fallback(mode, FallbackReason::Unparseable);
    };

    let fields = match serde_json::from_str::<Value>(span) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => match rescue_fields(span, mode) {
            Some(map) => {
                warn!(%mode, "provider reply was not valid JSON; rescued fields by pattern");
                map
            }
            None => {
                warn!(%mode, "provider reply could not be parsed or rescued");
                debug!(raw, "unparseable provider reply");
                return fallback(mode, FallbackReason::Unparseable);
            }
        },
    };

    coerce(fields, mode)
}

/// Returns the first top-level balanced `{...}` span, skipping braces inside
/// JSON string literals.
pub fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

lazy_static! {
    static ref CALORIES_RE: Regex =
        Regex::new(r#""calories"\s*:\s*"?\s*(\d+(?:\.\d+)?)"#).unwrap();
    static ref PROTEIN_RE: Regex = Regex::new(r#""protein"\s*:\s*"([^"]*)""#).unwrap();
    static ref CARBS_RE: Regex = Regex::new(r#""carbs"\s*:\s*"([^"]*)""#).unwrap();
    static ref FAT_RE: Regex = Regex::new(r#""fat"\s*:\s*"([^"]*)""#).unwrap();
    static ref INGREDIENTS_RE: Regex =
        Regex::new(r#"(?s)"ingredients"\s*:\s*\[(.*?)\]"#).unwrap();
    static ref FIRST_NUMBER_RE: Regex = Regex::new(r"\d+(?:\.\d+)?").unwrap();
}

/// Pattern-based recovery for replies that look like JSON but do not parse.
/// Returns `None` when not a single field could be recovered.
pub fn rescue_fields(text: &str, mode: Mode) -> Option<Map<String, Value>> {
    let mut map = Map::new();

    if let Some(c) = CALORIES_RE.captures(text) {
        map.insert("calories".into(), Value::String(c[1].to_string()));
    }
    for (key, re) in [("protein", &*PROTEIN_RE), ("carbs", &*CARBS_RE), ("fat", &*FAT_RE)] {
        if let Some(c) = re.captures(text) {
            map.insert(key.into(), Value::String(c[1].to_string()));
        }
    }
    if mode == Mode::Detailed {
        if let Some(c) = INGREDIENTS_RE.captures(text) {
            let items = split_list(&c[1]).into_iter().map(Value::String).collect();
            map.insert("ingredients".into(), Value::Array(items));
        }
    }

    (!map.is_empty()).then_some(map)
}

fn coerce(mut fields: Map<String, Value>, mode: Mode) -> MacroEstimate {
    let mut estimate = MacroEstimate {
        mode,
        calories: fields.remove("calories").and_then(coerce_calories),
        protein: fields.remove("protein").and_then(coerce_amount),
        carbs: fields.remove("carbs").and_then(coerce_amount),
        fat: fields.remove("fat").and_then(coerce_amount),
        ingredients: match mode {
            Mode::Detailed => fields.remove("ingredients").and_then(coerce_ingredients),
            Mode::Basic => None,
        },
        message: fields.remove("message").and_then(coerce_text),
        error: None,
    };

    if estimate.calories.is_none() {
        estimate.protein = None;
        estimate.carbs = None;
        estimate.fat = None;
        estimate.ingredients = None;
        estimate
            .message
            .get_or_insert_with(|| NO_FOOD_MESSAGE.to_string());
    }
    estimate
}

fn coerce_calories(value: Value) -> Option<Calories> {
    match value {
        Value::Number(n) => Some(Calories::Number(n)),
        Value::String(s) => {
            let s = s.trim();
            if s.parse::<f64>().is_ok() {
                Some(Calories::text(s))
            } else {
                FIRST_NUMBER_RE.find(s).map(|m| Calories::text(m.as_str()))
            }
        }
        _ => None,
    }
}

fn coerce_amount(value: Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(format!("{n}g")),
        _ => None,
    }
}

fn coerce_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn coerce_ingredients(value: Value) -> Option<Vec<String>> {
    match value {
        Value::Array(items) => Some(list_of_strings(items)),
        Value::String(s) => Some(match serde_json::from_str::<Vec<Value>>(&s) {
            Ok(items) => list_of_strings(items),
            Err(_) => split_list(&s),
        }),
        _ => None,
    }
}

fn list_of_strings(items: Vec<Value>) -> Vec<String> {
    items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .collect()
}

/// Splits a comma separated list, dropping quotes and empty items.
fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|item| item.trim().trim_matches(|c| c == '"' || c == '\'').trim())
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
