//! Integration tests for catalog loading, keyboard generation and payload
//! construction over a real data directory.

use std::fs;

use anyhow::Result;
use teloxide::types::InlineKeyboardButtonKind;
use tempfile::TempDir;

use menucast::catalog::ResourceCatalog;
use menucast::menu::{build_payloads, MenuIndex, PayloadBody, BACK_LABEL, START_PAYLOAD_KEY};

const KEYBOARDS: &str = r#"{
  "keyboards": {
    "start": {
      "about": "About us",
      "services": "Services",
      "https://example.com": "Website"
    },
    "services": {
      "row_services": { "service_design": "Design", "service_audit": "Audit" },
      "contacts": "Contacts"
    },
    "stat": {
      "stat_backward": "Back arrow",
      "stat_forward": "Forward arrow"
    },
    "broadcast": { "start": "To the start" },
    "cancel_broadcast": { "cancel_broadcast": "Cancel" }
  }
}"#;

const MESSAGES: &str = r#"{
  "messages": {
    "start": "Welcome",
    "about": "About text",
    "services": "Services text",
    "contacts": "Contacts text"
  }
}"#;

const STATS: &str = r#"{ "stats": ["about", "services", "contacts"] }"#;

fn exclusions() -> Vec<String> {
    ["start", "broadcast", "stat"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn write_data_dir() -> Result<TempDir> {
    let dir = TempDir::new()?;
    let json = dir.path().join("json");
    fs::create_dir_all(&json)?;
    fs::write(json.join("keyboards.json"), KEYBOARDS)?;
    fs::write(json.join("messages.json"), MESSAGES)?;
    fs::write(json.join("stats.json"), STATS)?;
    Ok(dir)
}

fn callback_of(button: &teloxide::types::InlineKeyboardButton) -> Option<&str> {
    match &button.kind {
        InlineKeyboardButtonKind::CallbackData(data) => Some(data.as_str()),
        _ => None,
    }
}

#[test]
fn test_catalog_loads_all_documents() -> Result<()> {
    let dir = write_data_dir()?;
    let catalog = ResourceCatalog::load(dir.path())?;

    assert_eq!(catalog.keyboards.len(), 5);
    assert_eq!(catalog.message("about"), Some("About text"));
    assert_eq!(catalog.stats, vec!["about", "services", "contacts"]);
    assert!(catalog.images.is_empty());

    Ok(())
}

#[test]
fn test_child_back_button_round_trips_to_parent() -> Result<()> {
    let dir = write_data_dir()?;
    let catalog = ResourceCatalog::load(dir.path())?;
    let menus = MenuIndex::build(&catalog, &exclusions());

    // services is reachable from start, so its keyboard gets a back button
    // and pressing it navigates to the parent key.
    assert_eq!(menus.parent_of("services"), Some("start"));

    let services = menus.keyboard("services").unwrap();
    let back_row = services.inline_keyboard.last().unwrap();
    assert_eq!(back_row[0].text, BACK_LABEL);
    assert_eq!(callback_of(&back_row[0]), Some("start"));

    Ok(())
}

#[test]
fn test_excluded_keys_have_no_back_button() -> Result<()> {
    let dir = write_data_dir()?;
    let catalog = ResourceCatalog::load(dir.path())?;
    let menus = MenuIndex::build(&catalog, &exclusions());

    // "start" is excluded by suffix; "broadcast" and "cancel_broadcast" both
    // end with an excluded suffix even though they are button targets.
    for key in ["start", "broadcast", "cancel_broadcast", "stat"] {
        assert_eq!(menus.parent_of(key), None, "{key} should have no parent");
    }

    let start = menus.keyboard("start").unwrap();
    assert!(start
        .inline_keyboard
        .iter()
        .all(|row| row[0].text != BACK_LABEL));

    Ok(())
}

#[test]
fn test_url_entry_renders_url_button() -> Result<()> {
    let dir = write_data_dir()?;
    let catalog = ResourceCatalog::load(dir.path())?;
    let menus = MenuIndex::build(&catalog, &exclusions());

    let start = menus.keyboard("start").unwrap();
    let url_button = &start.inline_keyboard[2][0];
    assert!(matches!(
        url_button.kind,
        InlineKeyboardButtonKind::Url(_)
    ));

    Ok(())
}

#[test]
fn test_nested_row_renders_one_row() -> Result<()> {
    let dir = write_data_dir()?;
    let catalog = ResourceCatalog::load(dir.path())?;
    let menus = MenuIndex::build(&catalog, &exclusions());

    let services = menus.keyboard("services").unwrap();
    assert_eq!(services.inline_keyboard[0].len(), 2);
    assert_eq!(callback_of(&services.inline_keyboard[0][0]), Some("service_design"));
    assert_eq!(callback_of(&services.inline_keyboard[0][1]), Some("service_audit"));

    Ok(())
}

#[test]
fn test_stat_keyboard_collapses_to_first_columns() -> Result<()> {
    let dir = write_data_dir()?;
    let catalog = ResourceCatalog::load(dir.path())?;
    let menus = MenuIndex::build(&catalog, &exclusions());

    let stat = menus.keyboard("stat").unwrap();
    assert_eq!(stat.inline_keyboard.len(), 1);
    assert_eq!(stat.inline_keyboard[0].len(), 2);
    assert_eq!(callback_of(&stat.inline_keyboard[0][0]), Some("stat_backward"));
    assert_eq!(callback_of(&stat.inline_keyboard[0][1]), Some("stat_forward"));

    Ok(())
}

#[test]
fn test_stat_name_lookup_covers_nested_buttons() -> Result<()> {
    let dir = write_data_dir()?;
    let catalog = ResourceCatalog::load(dir.path())?;
    let menus = MenuIndex::build(&catalog, &exclusions());

    assert_eq!(menus.stat_name("about"), Some("About us"));
    assert_eq!(menus.stat_name("service_audit"), Some("Audit"));
    assert_eq!(menus.stat_name("missing"), None);

    Ok(())
}

#[test]
fn test_payloads_carry_menu_keyboards() -> Result<()> {
    let dir = write_data_dir()?;
    let catalog = ResourceCatalog::load(dir.path())?;
    let menus = MenuIndex::build(&catalog, &exclusions());
    let payloads = build_payloads(&catalog, &menus);

    let services = payloads.get("services").unwrap();
    assert!(matches!(&services.body, PayloadBody::Text(text) if text == "Services text"));
    assert!(services.keyboard.is_some());

    // The start payload doubles as the /start response.
    let start = payloads.get(START_PAYLOAD_KEY).unwrap();
    assert!(matches!(&start.body, PayloadBody::Text(text) if text == "Welcome"));

    Ok(())
}

#[test]
fn test_message_without_keyboard_gets_back_only_keyboard() -> Result<()> {
    let dir = write_data_dir()?;
    let catalog = ResourceCatalog::load(dir.path())?;
    let menus = MenuIndex::build(&catalog, &exclusions());
    let payloads = build_payloads(&catalog, &menus);

    // "contacts" has no authored keyboard but is a button inside "services",
    // so its payload falls back to a lone back button.
    let contacts = payloads.get("contacts").unwrap();
    let keyboard = contacts.keyboard.as_ref().unwrap();
    assert_eq!(keyboard.inline_keyboard.len(), 1);
    assert_eq!(keyboard.inline_keyboard[0][0].text, BACK_LABEL);
    assert_eq!(callback_of(&keyboard.inline_keyboard[0][0]), Some("services"));

    Ok(())
}
