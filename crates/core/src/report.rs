//! Summaries of a filtering session as JSON or plain text.

use std::fmt::Write;

use serde::Serialize;

use crate::Result;
use crate::config::FilterSettings;
use crate::coordinator::{Action, Decision};
use crate::counters::CounterSnapshot;
use crate::session::SessionReport;

/// Complete JSON output structure.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterReport<'a> {
    /// Page title, if the document has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Settings in effect when the session ended.
    pub settings: &'a FilterSettings,
    pub counters: CounterSnapshot,
    /// Number of scans the session ran.
    pub scans: usize,
    /// Every evaluated item, in evaluation order.
    pub items: Vec<&'a Decision>,
}

impl<'a> FilterReport<'a> {
    pub fn from_session(session: &'a SessionReport) -> Self {
        Self {
            title: session.document.title(),
            settings: &session.settings,
            counters: session.counters,
            scans: session.scan_count,
            items: session.decisions().collect(),
        }
    }

    pub fn hidden(&self) -> impl Iterator<Item = &&'a Decision> {
        self.items.iter().filter(|d| d.action == Action::Hidden)
    }

    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let json = if pretty { serde_json::to_string_pretty(self)? } else { serde_json::to_string(self)? };
        Ok(json)
    }

    /// Human-readable summary, one line per evaluated item.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let settings = self.settings;
        let languages: Vec<&str> = settings.selected_languages.iter().map(|l| l.as_str()).collect();

        if let Some(title) = &self.title {
            let _ = writeln!(out, "{}", title);
        }
        let _ = writeln!(
            out,
            "Filter: {} ({}), languages: {}",
            if settings.is_active() { "on" } else { "off" },
            if settings.strict_mode { "strict" } else { "lenient" },
            if languages.is_empty() { "-".to_string() } else { languages.join(", ") },
        );
        let _ = writeln!(out, "Videos hidden: {}", self.counters.videos_hidden);
        let _ = writeln!(out, "Channels hidden: {}", self.counters.channels_hidden);
        let _ = writeln!(out, "Scans: {}", self.scans);

        if !self.items.is_empty() {
            out.push('\n');
        }
        for item in &self.items {
            let label = match item.action {
                Action::Hidden => "hidden",
                Action::Kept => "kept",
                Action::NoTitle => "no title",
            };
            let title = item.title.as_deref().unwrap_or("");
            let _ = writeln!(out, "{:<8}  {:<24}  {}", label, item.identifier.to_string(), title);
        }
        out
    }
}
