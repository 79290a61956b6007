//! Config translation between the editor's config shape and the backend's.
//!
//! Both directions are total: absent or malformed values fall back to the
//! kind's default, nothing is ever rejected. `Input` and `Output` configs are
//! UI-only state (`query`, `output_text`) and translate to an empty backend
//! map.

use serde_json::{Number, Value};

use crate::node::{ConfigMap, NodeKind};

/// Display name <-> backend model identifier.
const MODEL_NAMES: [(&str, &str); 3] = [
    ("GPT 4o Mini", "gpt-4o-mini"),
    ("GPT-4", "gpt-4"),
    ("GPT-3.5", "gpt-3.5-turbo"),
];

const UI_DEFAULT_MODEL: &str = "GPT 4o Mini";
const BACKEND_DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Shown in the editor when a hydrated LLM node carries no temperature.
pub const UI_DEFAULT_TEMPERATURE: f64 = 0.75;
/// Sent to the backend when the editor holds no usable temperature.
pub const BACKEND_DEFAULT_TEMPERATURE: f64 = 0.7;

const DEFAULT_MAX_TOKENS: i64 = 1000;
const DEFAULT_N_RESULTS: i64 = 5;
const DEFAULT_PROVIDER: &str = "openai";
const DEFAULT_COLLECTION: &str = "documents";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-large";

/// Backend model identifier for a display name; unmapped names pass through.
pub fn model_to_backend(ui_model: &str) -> &str {
    MODEL_NAMES
        .iter()
        .find(|(ui, _)| *ui == ui_model)
        .map_or(ui_model, |(_, backend)| *backend)
}

/// Display name for a backend model identifier; unmapped ids pass through.
pub fn model_to_ui(backend_model: &str) -> &str {
    MODEL_NAMES
        .iter()
        .find(|(_, backend)| *backend == backend_model)
        .map_or(backend_model, |(ui, _)| *ui)
}

/// Backend config -> editor config. Every template key is present in the result.
pub fn to_ui_config(kind: NodeKind, backend: &ConfigMap) -> ConfigMap {
    let mut ui = ConfigMap::new();
    match kind {
        NodeKind::Input => {
            ui.insert("query".into(), text_or(backend, "query", "").into());
        }
        NodeKind::KnowledgeBase => {
            ui.insert("file_name".into(), text_or(backend, "file_name", "").into());
            ui.insert(
                "embedding_model".into(),
                text_or(backend, "embedding_model", DEFAULT_EMBEDDING_MODEL).into(),
            );
            ui.insert("api_key".into(), text_or(backend, "api_key", "").into());
            ui.insert(
                "embedding_provider".into(),
                text_or(backend, "embedding_provider", DEFAULT_PROVIDER).into(),
            );
            ui.insert(
                "collection_name".into(),
                text_or(backend, "collection_name", DEFAULT_COLLECTION).into(),
            );
            ui.insert(
                "n_results".into(),
                number_or(backend, "n_results", DEFAULT_N_RESULTS.into()),
            );
        }
        NodeKind::LLMEngine => {
            let model = text(backend, "model").map_or(UI_DEFAULT_MODEL, model_to_ui);
            let prompt = text(backend, "system_prompt")
                .or_else(|| text(backend, "prompt"))
                .unwrap_or("");
            // Unset temperature stays null so each direction applies its own default.
            let temperature = backend
                .get("temperature")
                .and_then(coerce_number)
                .map_or(Value::Null, Value::Number);
            ui.insert("model".into(), model.into());
            ui.insert("api_key".into(), text_or(backend, "api_key", "").into());
            ui.insert("prompt".into(), prompt.into());
            ui.insert("temperature".into(), temperature);
            ui.insert(
                "web_search".into(),
                truthy(backend.get("use_web_search")).into(),
            );
            ui.insert(
                "serp_api_key".into(),
                text_or(backend, "serp_api_key", "").into(),
            );
            ui.insert(
                "max_tokens".into(),
                number_or(backend, "max_tokens", DEFAULT_MAX_TOKENS.into()),
            );
            ui.insert(
                "provider".into(),
                text_or(backend, "provider", DEFAULT_PROVIDER).into(),
            );
        }
        NodeKind::Output => {
            ui.insert(
                "output_text".into(),
                text_or(backend, "output_text", "").into(),
            );
        }
    }
    ui
}

/// Editor config -> backend config. Emits a fixed key set per kind and never
/// passes through other keys.
pub fn to_backend_config(kind: NodeKind, ui: &ConfigMap) -> ConfigMap {
    let mut backend = ConfigMap::new();
    match kind {
        NodeKind::Input | NodeKind::Output => {}
        NodeKind::KnowledgeBase => {
            backend.insert(
                "embedding_provider".into(),
                text_or(ui, "embedding_provider", DEFAULT_PROVIDER).into(),
            );
            backend.insert(
                "collection_name".into(),
                text_or(ui, "collection_name", DEFAULT_COLLECTION).into(),
            );
            backend.insert(
                "n_results".into(),
                number_or(ui, "n_results", DEFAULT_N_RESULTS.into()),
            );
        }
        NodeKind::LLMEngine => {
            let model = text(ui, "model").map_or(BACKEND_DEFAULT_MODEL, model_to_backend);
            backend.insert(
                "provider".into(),
                text_or(ui, "provider", DEFAULT_PROVIDER).into(),
            );
            backend.insert("model".into(), model.into());
            backend.insert("system_prompt".into(), text_or(ui, "prompt", "").into());
            backend.insert("use_web_search".into(), truthy(ui.get("web_search")).into());
            backend.insert(
                "temperature".into(),
                number_or(ui, "temperature", float(BACKEND_DEFAULT_TEMPERATURE)),
            );
            backend.insert(
                "max_tokens".into(),
                number_or(ui, "max_tokens", DEFAULT_MAX_TOKENS.into()),
            );
        }
    }
    backend
}

/// Temperature the editor displays for an LLM node config.
pub fn ui_temperature(ui: &ConfigMap) -> f64 {
    ui.get("temperature")
        .and_then(coerce_number)
        .and_then(|n| n.as_f64())
        .unwrap_or(UI_DEFAULT_TEMPERATURE)
}

fn text<'a>(map: &'a ConfigMap, key: &str) -> Option<&'a str> {
    map.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn text_or<'a>(map: &'a ConfigMap, key: &str, default: &'a str) -> &'a str {
    text(map, key).unwrap_or(default)
}

fn number_or(map: &ConfigMap, key: &str, default: Number) -> Value {
    Value::Number(map.get(key).and_then(coerce_number).unwrap_or(default))
}

fn float(value: f64) -> Number {
    Number::from_f64(value).unwrap_or_else(|| Number::from(0))
}

/// Numbers pass through untouched, numeric strings are parsed, everything else is `None`.
fn coerce_number(value: &Value) -> Option<Number> {
    match value {
        Value::Number(n) => Some(n.clone()),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .map(Number::from)
                .or_else(|| s.parse::<f64>().ok().and_then(Number::from_f64))
        }
        _ => None,
    }
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}
