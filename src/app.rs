//! # Application Context Module
//!
//! Builds every component once at startup and holds them together; the
//! dispatcher hands the context to each handler by reference. Admin-only
//! components (broadcast, statistics) exist only when an administrator chat
//! is configured.

use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;

use crate::bot::broadcast::{BroadcastKeyboards, BroadcastTexts, Broadcaster};
use crate::bot::navigation::Navigator;
use crate::catalog::ResourceCatalog;
use crate::config::Settings;
use crate::db::ActivityStore;
use crate::menu::{build_payloads, MenuIndex};
use crate::session::SessionStore;
use crate::stats::{StatTemplates, StatsReporter};
use crate::transport::Transport;

pub struct App {
    pub settings: Settings,
    pub catalog: ResourceCatalog,
    pub menus: MenuIndex,
    pub store: ActivityStore,
    pub sessions: SessionStore,
    pub transport: Arc<dyn Transport>,
    pub navigator: Arc<Navigator>,
    pub broadcaster: Option<Broadcaster>,
    pub stats: Option<StatsReporter>,
}

impl App {
    pub fn build(settings: Settings, transport: Arc<dyn Transport>) -> Result<Self> {
        let catalog = ResourceCatalog::load(&settings.data_dir)
            .context("failed to load the resource catalog")?;
        let menus = MenuIndex::build(&catalog, &settings.back_exclusions);
        let payloads = build_payloads(&catalog, &menus);

        let store = ActivityStore::open(
            &settings.database_path,
            catalog.stats.clone(),
            settings.utc_offset,
        )
        .context("failed to open the activity store")?;

        let sessions = SessionStore::new();
        let navigator = Arc::new(Navigator::new(
            Arc::clone(&transport),
            payloads,
            settings.default_answer.clone(),
        ));

        let (broadcaster, stats) = if settings.admin_chat_id.is_some() {
            let texts = BroadcastTexts {
                prompt: catalog.require_message("broadcast")?,
                preview: catalog.require_message("broadcast_text")?,
                result: catalog.require_message("broadcast_result")?,
                report: catalog.require_message("broadcast_end")?,
            };
            let keyboards = BroadcastKeyboards {
                cancel: menus.keyboard("cancel_broadcast"),
                edit: menus.keyboard("edit_broadcast"),
                confirm: menus.keyboard("confirm_broadcast"),
                receive: menus.keyboard("broadcast"),
            };
            let broadcaster = Broadcaster::new(
                Arc::clone(&transport),
                Arc::clone(&navigator),
                store.clone(),
                sessions.clone(),
                texts,
                keyboards,
                settings.broadcast_concurrency,
            );

            let templates = StatTemplates {
                summary: catalog.require_message("all_stat")?,
                period: catalog.require_message("stat")?,
            };
            let stats = StatsReporter::new(
                store.clone(),
                templates,
                menus.stat_names().clone(),
                menus.keyboard("stat"),
            );

            (Some(broadcaster), Some(stats))
        } else {
            info!("No admin chat configured, broadcast and statistics disabled");
            (None, None)
        };

        Ok(Self {
            settings,
            catalog,
            menus,
            store,
            sessions,
            transport,
            navigator,
            broadcaster,
            stats,
        })
    }
}
