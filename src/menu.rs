//! # Menu Builder Module
//!
//! Turns the raw menu definitions from the catalog into rendered inline
//! keyboards and message payloads. Back buttons are synthesized by a reverse
//! lookup over the navigation graph, computed once at build time.

use std::collections::HashMap;

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use tracing::debug;

use crate::catalog::{RawEntry, RawMenu, ResourceCatalog};
use crate::transport::MediaRef;

pub const BACK_LABEL: &str = "Back ⬅️";

/// Key of the payload sent in response to `/start`.
pub const START_PAYLOAD_KEY: &str = "cmd_start";

/// What a routed selection renders: plain text, or a photo with a caption.
/// Exactly one of the two, by construction.
#[derive(Debug, Clone)]
pub enum PayloadBody {
    Text(String),
    Media { media: MediaRef, caption: String },
}

/// A renderable payload registered for a menu key.
#[derive(Debug, Clone)]
pub struct MessagePayload {
    pub body: PayloadBody,
    pub keyboard: Option<InlineKeyboardMarkup>,
}

/// Rendered keyboards plus the lookup tables derived from them.
#[derive(Debug, Clone, Default)]
pub struct MenuIndex {
    keyboards: HashMap<String, InlineKeyboardMarkup>,
    /// `callback → label` over every authored button, nested rows included
    stat_names: HashMap<String, String>,
    /// `menu key → parent key` for keys that received a back button
    parents: HashMap<String, String>,
}

impl MenuIndex {
    /// Build every keyboard from the catalog's raw definitions.
    pub fn build(catalog: &ResourceCatalog, back_exclusions: &[String]) -> Self {
        let mut keyboards = HashMap::with_capacity(catalog.keyboards.len());
        let mut parents = HashMap::new();

        for (key, menu) in &catalog.keyboards {
            let back = if excluded(key, back_exclusions) || has_explicit_back(menu) {
                None
            } else {
                find_parent(&catalog.keyboards, key)
            };
            if let Some(parent) = &back {
                debug!(menu = %key, parent = %parent, "synthesized back button");
                parents.insert(key.clone(), parent.clone());
            }
            keyboards.insert(key.clone(), render_keyboard(menu, back.as_deref()));
        }

        // The stats keyboard keeps only the first column of each authored
        // row, collapsed into a single row; the other columns exist for the
        // stat-name lookup alone.
        if let Some(stat_kb) = keyboards.get("stat") {
            let first_column: Vec<InlineKeyboardButton> = stat_kb
                .inline_keyboard
                .iter()
                .filter_map(|row| row.first().cloned())
                .collect();
            keyboards.insert(
                "stat".to_string(),
                InlineKeyboardMarkup::new(vec![first_column]),
            );
        }

        let mut stat_names = HashMap::new();
        for (_, menu) in &catalog.keyboards {
            for (callback, entry) in menu {
                match entry {
                    RawEntry::Button(label) => {
                        stat_names.insert(callback.clone(), label.clone());
                    }
                    RawEntry::Row(buttons) => {
                        for (nested, label) in buttons {
                            stat_names.insert(nested.clone(), label.clone());
                        }
                    }
                }
            }
        }

        Self {
            keyboards,
            stat_names,
            parents,
        }
    }

    pub fn keyboard(&self, key: &str) -> Option<InlineKeyboardMarkup> {
        self.keyboards.get(key).cloned()
    }

    /// Human-readable label for a tracked button key.
    pub fn stat_name(&self, key: &str) -> Option<&str> {
        self.stat_names.get(key).map(String::as_str)
    }

    pub fn stat_names(&self) -> &HashMap<String, String> {
        &self.stat_names
    }

    /// The parent a synthesized back button points at, if any.
    pub fn parent_of(&self, key: &str) -> Option<&str> {
        self.parents.get(key).map(String::as_str)
    }
}

/// Build the payload table: one entry per message key, plus the composite
/// `cmd_start` payload (start photo + start text + start keyboard).
pub fn build_payloads(
    catalog: &ResourceCatalog,
    menus: &MenuIndex,
) -> HashMap<String, MessagePayload> {
    let mut payloads = HashMap::with_capacity(catalog.messages.len() + 1);

    for (key, text) in &catalog.messages {
        let keyboard = menus
            .keyboard(key)
            .or_else(|| back_only_keyboard(catalog, key));

        let body = match catalog.images.get(key) {
            Some(path) => PayloadBody::Media {
                media: MediaRef::Path(path.clone()),
                caption: text.clone(),
            },
            None => PayloadBody::Text(text.clone()),
        };

        payloads.insert(key.clone(), MessagePayload { body, keyboard });
    }

    if let Some(text) = catalog.messages.get("start") {
        let body = match catalog.images.get("start") {
            Some(path) => PayloadBody::Media {
                media: MediaRef::Path(path.clone()),
                caption: text.clone(),
            },
            None => PayloadBody::Text(text.clone()),
        };
        payloads.insert(
            START_PAYLOAD_KEY.to_string(),
            MessagePayload {
                body,
                keyboard: menus.keyboard("start"),
            },
        );
    }

    payloads
}

fn excluded(key: &str, exclusions: &[String]) -> bool {
    exclusions.iter().any(|suffix| key.ends_with(suffix))
}

fn has_explicit_back(menu: &RawMenu) -> bool {
    menu.iter().any(|(callback, _)| callback == "back")
}

/// Depth-first search over all menus' button targets for `needle`; first
/// match in file order wins.
fn find_parent(keyboards: &[(String, RawMenu)], needle: &str) -> Option<String> {
    for (key, menu) in keyboards {
        for (callback, entry) in menu {
            match entry {
                RawEntry::Button(_) if callback == needle => return Some(key.clone()),
                RawEntry::Row(buttons) => {
                    if buttons.iter().any(|(nested, _)| nested == needle) {
                        return Some(key.clone());
                    }
                }
                RawEntry::Button(_) => {}
            }
        }
    }
    None
}

fn make_button(callback: &str, label: &str) -> InlineKeyboardButton {
    if callback.starts_with("http://") || callback.starts_with("https://") {
        match callback.parse() {
            Ok(url) => return InlineKeyboardButton::url(label.to_string(), url),
            Err(_) => debug!(target = %callback, "unparseable URL, falling back to callback"),
        }
    }
    InlineKeyboardButton::callback(label.to_string(), callback.to_string())
}

fn render_keyboard(menu: &RawMenu, back: Option<&str>) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = Vec::with_capacity(menu.len() + 1);

    for (callback, entry) in menu {
        match entry {
            RawEntry::Button(label) => rows.push(vec![make_button(callback, label)]),
            RawEntry::Row(buttons) => rows.push(
                buttons
                    .iter()
                    .map(|(nested, label)| make_button(nested, label))
                    .collect(),
            ),
        }
    }

    if let Some(parent) = back {
        rows.push(vec![InlineKeyboardButton::callback(
            BACK_LABEL.to_string(),
            parent.to_string(),
        )]);
    }

    InlineKeyboardMarkup::new(rows)
}

/// Keyboard holding only a back button towards the key's parent, used for
/// message keys without an authored keyboard. Empty when no parent exists.
fn back_only_keyboard(catalog: &ResourceCatalog, key: &str) -> Option<InlineKeyboardMarkup> {
    let parent = find_parent(&catalog.keyboards, key)?;
    Some(InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback(BACK_LABEL.to_string(), parent),
    ]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog_with(keyboards: Vec<(&str, Vec<(&str, RawEntry)>)>) -> ResourceCatalog {
        ResourceCatalog {
            keyboards: keyboards
                .into_iter()
                .map(|(key, menu)| {
                    (
                        key.to_string(),
                        menu.into_iter()
                            .map(|(callback, entry)| (callback.to_string(), entry))
                            .collect(),
                    )
                })
                .collect(),
            ..Default::default()
        }
    }

    fn button(label: &str) -> RawEntry {
        RawEntry::Button(label.to_string())
    }

    #[test]
    fn test_back_button_targets_first_parent() {
        let catalog = catalog_with(vec![
            ("start", vec![("about", button("About"))]),
            ("about", vec![("contacts", button("Contacts"))]),
        ]);
        let menus = MenuIndex::build(&catalog, &["start".to_string()]);

        assert_eq!(menus.parent_of("about"), Some("start"));
        assert_eq!(menus.parent_of("start"), None);

        let about = menus.keyboard("about").unwrap();
        let last_row = about.inline_keyboard.last().unwrap();
        assert_eq!(last_row[0].text, BACK_LABEL);
    }

    #[test]
    fn test_excluded_suffix_gets_no_back_button() {
        let catalog = catalog_with(vec![
            ("start", vec![("confirm_broadcast", button("Send"))]),
            ("confirm_broadcast", vec![("x", button("X"))]),
        ]);
        let menus = MenuIndex::build(&catalog, &["broadcast".to_string()]);
        assert_eq!(menus.parent_of("confirm_broadcast"), None);
    }

    #[test]
    fn test_explicit_back_entry_suppresses_synthesis() {
        let catalog = catalog_with(vec![
            ("start", vec![("about", button("About"))]),
            ("about", vec![("back", button("Home"))]),
        ]);
        let menus = MenuIndex::build(&catalog, &[]);
        assert_eq!(menus.parent_of("about"), None);
        // The authored row is the only one.
        assert_eq!(menus.keyboard("about").unwrap().inline_keyboard.len(), 1);
    }

    #[test]
    fn test_nested_row_renders_side_by_side() {
        let catalog = catalog_with(vec![(
            "services",
            vec![(
                "row_services",
                RawEntry::Row(vec![
                    ("design".to_string(), "Design".to_string()),
                    ("audit".to_string(), "Audit".to_string()),
                ]),
            )],
        )]);
        let menus = MenuIndex::build(&catalog, &["services".to_string()]);
        let kb = menus.keyboard("services").unwrap();
        assert_eq!(kb.inline_keyboard[0].len(), 2);
    }

    #[test]
    fn test_stat_keyboard_keeps_first_column_in_one_row() {
        let catalog = catalog_with(vec![(
            "stat",
            vec![
                (
                    "row_nav",
                    RawEntry::Row(vec![
                        ("stat_backward".to_string(), "⬅️".to_string()),
                        ("ignored".to_string(), "x".to_string()),
                    ]),
                ),
                ("stat_forward", button("➡️")),
            ],
        )]);
        let menus = MenuIndex::build(&catalog, &["stat".to_string()]);
        let kb = menus.keyboard("stat").unwrap();
        assert_eq!(kb.inline_keyboard.len(), 1);
        assert_eq!(kb.inline_keyboard[0].len(), 2);
        // The second column still resolves through the name lookup.
        assert_eq!(menus.stat_name("ignored"), Some("x"));
    }
}
