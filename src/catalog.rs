//! # Resource Catalog Module
//!
//! Loads menu definitions, message templates and media assets from the data
//! directory. Built once at startup and immutable afterwards; every other
//! component looks content up here by logical key.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use tracing::{debug, info, warn};

/// One entry of a raw menu definition, in authored order.
#[derive(Debug, Clone, PartialEq)]
pub enum RawEntry {
    /// `"callback": "label"` — a single button occupying its own row
    Button(String),
    /// `"row_key": { "callback": "label", ... }` — one multi-button row
    Row(Vec<(String, String)>),
}

/// An ordered menu definition: `(callback-or-url, entry)` pairs.
pub type RawMenu = Vec<(String, RawEntry)>;

/// Immutable view over everything loaded from the data directory.
#[derive(Debug, Clone, Default)]
pub struct ResourceCatalog {
    /// Menu definitions in file order (order drives back-target resolution)
    pub keyboards: Vec<(String, RawMenu)>,
    /// Message templates by key; templates use positional `{}` slots
    pub messages: HashMap<String, String>,
    /// Button keys whose presses are counted in the period tables
    pub stats: Vec<String>,
    /// Image assets by file stem
    pub images: HashMap<String, PathBuf>,
}

impl ResourceCatalog {
    /// Load every JSON document under `<data>/json/` plus the image assets
    /// under `<data>/images/` (the latter directory may be absent).
    pub fn load(data_dir: &Path) -> Result<Self> {
        let documents = load_documents(&data_dir.join("json"))?;

        let keyboards = documents
            .get("keyboards")
            .map(parse_keyboards)
            .transpose()?
            .unwrap_or_default();

        let messages = documents
            .get("messages")
            .map(parse_messages)
            .transpose()?
            .unwrap_or_default();

        let stats = documents
            .get("stats")
            .map(parse_stats)
            .transpose()?
            .unwrap_or_default();

        let images = load_images(&data_dir.join("images"))?;

        info!(
            menus = keyboards.len(),
            messages = messages.len(),
            tracked_buttons = stats.len(),
            images = images.len(),
            "resource catalog loaded"
        );

        Ok(Self {
            keyboards,
            messages,
            stats,
            images,
        })
    }

    /// Template text for a message key.
    pub fn message(&self, key: &str) -> Option<&str> {
        self.messages.get(key).map(String::as_str)
    }

    /// Template text for a message key, as a hard requirement.
    pub fn require_message(&self, key: &str) -> Result<String> {
        self.message(key)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("missing message template '{key}'"))
    }
}

/// Fill positional `{}` slots of a template with the given arguments.
/// Slots beyond the argument list render as empty.
pub fn fill(template: &str, args: &[&str]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut args = args.iter();
    while let Some(pos) = rest.find("{}") {
        out.push_str(&rest[..pos]);
        if let Some(arg) = args.next() {
            out.push_str(arg);
        }
        rest = &rest[pos + 2..];
    }
    out.push_str(rest);
    out
}

fn load_documents(json_dir: &Path) -> Result<HashMap<String, Value>> {
    let mut documents = HashMap::new();

    let entries = fs::read_dir(json_dir)
        .with_context(|| format!("failed to read data directory {}", json_dir.display()))?;

    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let value: Value = serde_json::from_str(&raw)
            .with_context(|| format!("invalid JSON in {}", path.display()))?;

        // A document with a single top-level key unwraps to its inner value.
        let value = match &value {
            Value::Object(map) if map.len() == 1 => {
                map.values().next().cloned().unwrap_or(Value::Null)
            }
            _ => value,
        };

        debug!(document = %stem, "loaded data document");
        documents.insert(stem.to_string(), value);
    }

    Ok(documents)
}

fn parse_keyboards(value: &Value) -> Result<Vec<(String, RawMenu)>> {
    let Value::Object(map) = value else {
        return Err(anyhow!("keyboards document must be an object"));
    };

    let mut keyboards = Vec::with_capacity(map.len());
    for (key, menu) in map {
        let Value::Object(entries) = menu else {
            return Err(anyhow!("menu '{key}' must be an object"));
        };

        let mut parsed: RawMenu = Vec::with_capacity(entries.len());
        for (callback, label) in entries {
            match label {
                Value::String(text) => {
                    parsed.push((callback.clone(), RawEntry::Button(text.clone())))
                }
                Value::Object(row) => {
                    let mut buttons = Vec::with_capacity(row.len());
                    for (nested_callback, nested_label) in row {
                        let Value::String(text) = nested_label else {
                            return Err(anyhow!(
                                "nested row '{callback}' in menu '{key}' must map to strings"
                            ));
                        };
                        buttons.push((nested_callback.clone(), text.clone()));
                    }
                    parsed.push((callback.clone(), RawEntry::Row(buttons)));
                }
                _ => {
                    return Err(anyhow!(
                        "entry '{callback}' in menu '{key}' must be a label or a row object"
                    ))
                }
            }
        }
        keyboards.push((key.clone(), parsed));
    }

    Ok(keyboards)
}

fn parse_messages(value: &Value) -> Result<HashMap<String, String>> {
    let Value::Object(map) = value else {
        return Err(anyhow!("messages document must be an object"));
    };

    let mut messages = HashMap::with_capacity(map.len());
    for (key, text) in map {
        let Value::String(text) = text else {
            return Err(anyhow!("message '{key}' must be a string"));
        };
        messages.insert(key.clone(), text.clone());
    }
    Ok(messages)
}

fn parse_stats(value: &Value) -> Result<Vec<String>> {
    serde_json::from_value(value.clone()).context("stats document must be a list of button keys")
}

fn load_images(img_dir: &Path) -> Result<HashMap<String, PathBuf>> {
    let mut images = HashMap::new();

    let entries = match fs::read_dir(img_dir) {
        Ok(entries) => entries,
        Err(_) => {
            warn!(dir = %img_dir.display(), "no image directory, media payloads disabled");
            return Ok(images);
        }
    };

    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            images.insert(stem.to_string(), path.clone());
        }
    }

    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_replaces_positional_slots() {
        assert_eq!(fill("a {} c {}", &["b", "d"]), "a b c d");
    }

    #[test]
    fn test_fill_with_missing_args() {
        assert_eq!(fill("x: {} y: {}", &["1"]), "x: 1 y: ");
    }

    #[test]
    fn test_fill_without_slots() {
        assert_eq!(fill("plain", &["unused"]), "plain");
    }

    #[test]
    fn test_single_key_document_unwraps() {
        let value: Value =
            serde_json::from_str(r#"{"keyboards": {"start": {"about": "About"}}}"#).unwrap();
        let Value::Object(map) = &value else {
            panic!("expected object")
        };
        assert_eq!(map.len(), 1);

        let inner = map.values().next().unwrap();
        let parsed = parse_keyboards(inner).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].0, "start");
        assert_eq!(
            parsed[0].1,
            vec![("about".to_string(), RawEntry::Button("About".to_string()))]
        );
    }

    #[test]
    fn test_nested_row_parses_in_order() {
        let value: Value =
            serde_json::from_str(r#"{"menu": {"row_a": {"one": "1", "two": "2"}, "b": "B"}}"#)
                .unwrap();
        let parsed = parse_keyboards(&value).unwrap();
        let (_, menu) = &parsed[0];
        assert_eq!(
            menu[0].1,
            RawEntry::Row(vec![
                ("one".to_string(), "1".to_string()),
                ("two".to_string(), "2".to_string()),
            ])
        );
        assert_eq!(menu[1].1, RawEntry::Button("B".to_string()));
    }
}
