//! # Stats Engine Module
//!
//! Aggregates the per-period counter tables into a paginated report. Page 0
//! is a grand summary over the current live counters; every further page
//! covers one calendar period, newest first, showing user-count *deltas*
//! against the chronologically previous period.

use std::collections::HashMap;

use anyhow::Result;
use teloxide::types::InlineKeyboardMarkup;
use tracing::debug;

use crate::catalog::fill;
use crate::db::ActivityStore;

/// Report templates, both with five positional slots:
/// new users, active delta, inactive delta, total presses, button lines.
#[derive(Debug, Clone)]
pub struct StatTemplates {
    pub summary: String,
    pub period: String,
}

/// Scroll direction requested by a pagination button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scroll {
    Forward,
    Backward,
}

/// Where a scroll request lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrollOutcome {
    /// Edit the surface to this page index
    Page(usize),
    /// Already at the edge; surface a transient notice
    NoMoreEntries,
    /// The shown text matches no cached page (stale surface)
    NotInCache,
}

/// Stateless report builder over the activity store.
pub struct StatsReporter {
    store: ActivityStore,
    templates: StatTemplates,
    stat_names: HashMap<String, String>,
    keyboard: Option<InlineKeyboardMarkup>,
}

struct PeriodReport {
    users_delta: i64,
    active_delta: i64,
    inactive_delta: i64,
    presses: i64,
    lines: String,
    /// Raw synthetic-row snapshot, the baseline for the next period's deltas
    snapshot: HashMap<String, i64>,
}

impl StatsReporter {
    pub fn new(
        store: ActivityStore,
        templates: StatTemplates,
        stat_names: HashMap<String, String>,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Self {
        Self {
            store,
            templates,
            stat_names,
            keyboard,
        }
    }

    /// Keyboard attached to every stats page.
    pub fn keyboard(&self) -> Option<InlineKeyboardMarkup> {
        self.keyboard.clone()
    }

    /// Build the full page sequence: grand summary first, then one page per
    /// period, newest first. Refreshes the current period's synthetic rows
    /// as a side effect (the snapshots are point-in-time by design).
    pub async fn compute_pages(&self) -> Result<Vec<String>> {
        let counts = self.store.count_by_activity().await?;
        debug!(
            active = counts.active,
            inactive = counts.inactive,
            "refreshed activity counters for stats"
        );

        let current = self.store.current_period();
        let summary = self.period_report(&current, &HashMap::new()).await?;
        let mut pages = vec![fill(
            &self.templates.summary,
            &[
                &summary.users_delta.to_string(),
                &summary.active_delta.to_string(),
                &summary.inactive_delta.to_string(),
                &summary.presses.to_string(),
                &summary.lines,
            ],
        )];

        let mut period_pages = Vec::new();
        let mut baseline = HashMap::new();
        for period in self.store.list_periods().await? {
            let report = self.period_report(&period, &baseline).await?;
            let body = fill(
                &self.templates.period,
                &[
                    &report.users_delta.to_string(),
                    &report.active_delta.to_string(),
                    &report.inactive_delta.to_string(),
                    &report.presses.to_string(),
                    &report.lines,
                ],
            );
            period_pages.push(format!("<b>{}</b>\n\n{}", period_title(&period), body));
            baseline = report.snapshot;
        }

        pages.extend(period_pages.into_iter().rev());
        Ok(pages)
    }

    async fn period_report(
        &self,
        period: &str,
        baseline: &HashMap<String, i64>,
    ) -> Result<PeriodReport> {
        let rows = self.store.read_period(period).await?;

        let mut lines = Vec::new();
        let mut presses = 0;
        let mut snapshot = HashMap::new();
        let mut deltas = Vec::with_capacity(2);

        for (button, count) in rows {
            if button.ends_with("users") {
                let delta = count - baseline.get(&button).copied().unwrap_or(0);
                snapshot.insert(button, count);
                deltas.push(delta);
            } else {
                let label = self
                    .stat_names
                    .get(&button)
                    .map(String::as_str)
                    .unwrap_or(&button);
                lines.push(format!("— «{label}»: {count}"));
                presses += count;
            }
        }

        Ok(PeriodReport {
            users_delta: deltas.iter().sum(),
            active_delta: deltas.first().copied().unwrap_or(0),
            inactive_delta: deltas.get(1).copied().unwrap_or(0),
            presses,
            lines: lines.join("\n"),
            snapshot,
        })
    }
}

/// Locate the surface's current page by exact text match (tags stripped,
/// since the transport hands plain text back) and step in the requested
/// direction.
pub fn resolve_scroll(pages: &[String], current_text: &str, direction: Scroll) -> ScrollOutcome {
    let Some(position) = pages.iter().position(|p| strip_html(p) == current_text) else {
        return ScrollOutcome::NotInCache;
    };

    let target = match direction {
        Scroll::Forward => position.checked_add(1).filter(|&i| i < pages.len()),
        Scroll::Backward => position.checked_sub(1),
    };

    match target {
        Some(index) => ScrollOutcome::Page(index),
        None => ScrollOutcome::NoMoreEntries,
    }
}

/// `"2025-08"` → `"August, 2025"`; unparseable keys render verbatim.
pub fn period_title(period: &str) -> String {
    let mut parts = period.splitn(2, '-');
    let parsed = match (parts.next(), parts.next()) {
        (Some(year), Some(month)) => match (year.parse::<i32>(), month.parse::<u32>()) {
            (Ok(year), Ok(month)) => chrono::NaiveDate::from_ymd_opt(year, month, 1),
            _ => None,
        },
        _ => None,
    };
    match parsed {
        Some(date) => date.format("%B, %Y").to_string(),
        None => period.to_string(),
    }
}

/// Drop HTML tags and unescape entities, mirroring what the transport
/// reports as the plain text of a rendered message.
pub fn strip_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for ch in text.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if in_tag => {}
            _ => out.push(ch),
        }
    }
    out.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}
