//! Incremental scanning of a feed document.
//!
//! The [`ScanCoordinator`] ties the pieces together. A scan enumerates the
//! candidate links of every enabled item kind, resolves each to its card and
//! identifier, skips identifiers it has already evaluated, and hides the
//! cards whose title the classifier rejects. Hide decisions are final for
//! the page view: an identifier is evaluated at most once until the page
//! changes or the filter is re-armed by a settings change.
//!
//! Triggers (mutations, scrolls, ticks) go through a [`Debouncer`]; settings
//! changes are queued and committed at the start of the next scan, so a scan
//! always runs against one consistent settings snapshot.
//!
//! # Example
//!
//! ```rust
//! use langfilter_core::ScanConfig;
//! use langfilter_core::config::FilterSettings;
//! use langfilter_core::coordinator::ScanCoordinator;
//! use langfilter_core::parse::FeedDocument;
//!
//! let html = r#"<div id="contents">
//!     <ytd-rich-item-renderer>
//!         <a id="video-title-link" href="/watch?v=abc123">Лучшие гаджеты 2024</a>
//!     </ytd-rich-item-renderer>
//! </div>"#;
//!
//! let mut doc = FeedDocument::parse(html).unwrap();
//! let mut coordinator = ScanCoordinator::new(&ScanConfig::default(), FilterSettings::default()).unwrap();
//! let outcome = coordinator.scan_now(&mut doc);
//!
//! assert_eq!(outcome.hidden, 1);
//! assert_eq!(coordinator.counters().videos_hidden, 1);
//! ```

use serde::Serialize;
use tokio::time::{Duration, Instant};

use crate::Result;
use crate::classify::{Classifier, Verdict};
use crate::config::{ConfigChange, FilterSettings, ScanConfig};
use crate::counters::{CounterSnapshot, FilterCounters};
use crate::extract::{Extractor, ItemIdentifier, ItemKind};
use crate::ledger::DedupLedger;
use crate::parse::FeedDocument;
use crate::schedule::Debouncer;
use crate::visibility::VisibilityActuator;

/// Per-page filtering state.
#[derive(Debug, Clone, Default)]
pub struct ScanContext {
    pub settings: FilterSettings,
    pub ledger: DedupLedger,
    pub counters: FilterCounters,
}

impl ScanContext {
    pub fn new(settings: FilterSettings) -> Self {
        Self { settings, ledger: DedupLedger::new(), counters: FilterCounters::new() }
    }
}

/// How a scan ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    /// Candidates were evaluated.
    Completed,
    /// Filtering is off; an unhide pass ran instead.
    Inactive,
    /// Another scan held the slot; a follow-up is pending.
    Skipped,
}

/// What happened to one newly evaluated item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Hidden,
    Kept,
    /// No usable title was found; the item stays visible.
    NoTitle,
}

/// Record of one evaluated item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub identifier: ItemIdentifier,
    pub title: Option<String>,
    pub verdict: Option<Verdict>,
    pub action: Action,
}

/// Summary of one scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanOutcome {
    pub status: ScanStatus,
    /// Candidate links enumerated.
    pub candidates: usize,
    /// Candidates whose identifier was already evaluated.
    pub already_seen: usize,
    /// Candidates without a container or identifier.
    pub unlocated: usize,
    /// Containers hidden by this scan.
    pub hidden: usize,
    /// Containers shown again by this scan (settings changes, unhide pass).
    pub restored: usize,
    pub decisions: Vec<Decision>,
}

impl ScanOutcome {
    fn new(status: ScanStatus) -> Self {
        Self { status, candidates: 0, already_seen: 0, unlocated: 0, hidden: 0, restored: 0, decisions: Vec::new() }
    }

    /// Items evaluated for the first time in this scan.
    pub fn evaluated(&self) -> usize {
        self.decisions.len()
    }
}

/// Drives discovery, classification and hiding for one page session.
pub struct ScanCoordinator {
    context: ScanContext,
    queued: Vec<ConfigChange>,
    extractor: Extractor,
    classifier: Classifier,
    actuator: VisibilityActuator,
    scheduler: Debouncer,
}

impl ScanCoordinator {
    /// Creates a coordinator with the built-in classifier.
    ///
    /// # Errors
    ///
    /// Returns [`crate::FilterError::InvalidSelector`] if the kind tables in
    /// `config` do not compile.
    pub fn new(config: &ScanConfig, settings: FilterSettings) -> Result<Self> {
        Ok(Self {
            context: ScanContext::new(settings),
            queued: Vec::new(),
            extractor: Extractor::new(config)?,
            classifier: Classifier::new(config.classifier.clone()),
            actuator: VisibilityActuator::new(),
            scheduler: Debouncer::new(config.debounce),
        })
    }

    /// Replaces the classifier.
    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Settings the last scan ran with. Queued changes are not reflected.
    pub fn settings(&self) -> &FilterSettings {
        &self.context.settings
    }

    pub fn context(&self) -> &ScanContext {
        &self.context
    }

    pub fn counters(&self) -> CounterSnapshot {
        self.context.counters.snapshot()
    }

    pub fn reset_counters(&mut self) {
        self.context.counters.reset();
    }

    /// Containers currently hidden.
    pub fn hidden_count(&self) -> usize {
        self.actuator.hidden_count()
    }

    /// Queues a settings change for the next scan and requests one.
    pub fn apply_change(&mut self, change: ConfigChange, now: Instant) {
        tracing::debug!(key = change.key(), "settings change queued");
        self.queued.push(change);
        self.scheduler.trigger(now);
    }

    pub fn has_queued_changes(&self) -> bool {
        !self.queued.is_empty()
    }

    /// The observed tree changed.
    pub fn on_mutation(&mut self, now: Instant) -> bool {
        self.scheduler.trigger(now)
    }

    /// The viewport scrolled.
    pub fn on_scroll(&mut self, now: Instant) -> bool {
        self.scheduler.trigger(now)
    }

    /// Periodic backstop for missed notifications.
    pub fn on_tick(&mut self, now: Instant) -> bool {
        self.scheduler.trigger(now)
    }

    /// Arms the first scan of a page after `delay`.
    pub fn schedule_initial(&mut self, now: Instant, delay: Duration) {
        self.scheduler.schedule_in(now, delay);
    }

    /// When the next debounced scan is due.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.deadline()
    }

    /// Runs the debounced scan if its deadline has passed.
    pub fn run_due(&mut self, doc: &mut FeedDocument, now: Instant) -> Option<ScanOutcome> {
        if !self.scheduler.try_begin(now) {
            return None;
        }
        let outcome = self.scan(doc);
        self.scheduler.finish(now);
        Some(outcome)
    }

    /// Scans immediately, bypassing the debounce window.
    pub fn scan_now(&mut self, doc: &mut FeedDocument) -> ScanOutcome {
        if !self.scheduler.begin_now() {
            return ScanOutcome::new(ScanStatus::Skipped);
        }
        let outcome = self.scan(doc);
        self.scheduler.finish(Instant::now());
        outcome
    }

    /// A new document replaced the old one. Counters survive; everything
    /// tied to the old tree is dropped.
    pub fn navigate(&mut self) {
        self.context.ledger.clear();
        self.actuator.forget();
        self.scheduler.cancel();
    }

    fn kind_enabled(&self, kind: ItemKind) -> bool {
        match kind {
            ItemKind::Video => self.context.settings.hide_videos,
            ItemKind::Channel => self.context.settings.hide_channels,
        }
    }

    /// Commits queued changes. Returns how many containers were shown again.
    fn commit_changes(&mut self, doc: &mut FeedDocument) -> usize {
        let mut restored = 0;

        for change in std::mem::take(&mut self.queued) {
            let key = change.key();
            let invalidates = change.invalidates_decisions();
            let toggled_kind = match &change {
                ConfigChange::HideVideos(_) => Some(ItemKind::Video),
                ConfigChange::HideChannels(_) => Some(ItemKind::Channel),
                _ => None,
            };

            if !self.context.settings.apply(change) {
                continue;
            }
            tracing::debug!(key, "settings change committed");

            if invalidates {
                restored += self.actuator.restore_all(doc);
                self.context.ledger.clear();
            } else if let Some(kind) = toggled_kind {
                restored += self.actuator.restore_kind(doc, kind);
                self.context.ledger.forget_kind(kind);
            }
        }

        restored
    }

    fn scan(&mut self, doc: &mut FeedDocument) -> ScanOutcome {
        let removed = self.actuator.prune(doc);
        if removed > 0 {
            tracing::trace!(removed, "dropped containers no longer in the document");
        }
        let restored = self.commit_changes(doc);

        // Unknown codes are ignored; a selection of nothing but unknown codes
        // filters nothing, like an empty one.
        let targets = self.classifier.supported(&self.context.settings.selected_languages);
        if targets.len() < self.context.settings.selected_languages.len() {
            tracing::debug!(
                selected = self.context.settings.selected_languages.len(),
                known = targets.len(),
                "ignoring languages without a recognizer"
            );
        }

        if !self.context.settings.is_active() || targets.is_empty() {
            let mut outcome = ScanOutcome::new(ScanStatus::Inactive);
            outcome.restored = restored + self.actuator.restore_all(doc);
            self.context.ledger.clear();
            return outcome;
        }

        let mut outcome = ScanOutcome::new(ScanStatus::Completed);
        outcome.restored = restored;
        let strict = self.context.settings.strict_mode;

        for kind in self.extractor.kinds() {
            if !self.kind_enabled(kind) {
                continue;
            }

            for link in self.extractor.candidates(doc, kind) {
                outcome.candidates += 1;

                let Some(item) = self.extractor.locate(doc, kind, link) else {
                    outcome.unlocated += 1;
                    continue;
                };
                if !self.context.ledger.mark_seen(item.identifier.clone()) {
                    outcome.already_seen += 1;
                    continue;
                }

                let Some(title) = self.extractor.title(doc, kind, item.container) else {
                    tracing::trace!(item = %item.identifier, "no usable title");
                    outcome.decisions.push(Decision {
                        identifier: item.identifier,
                        title: None,
                        verdict: None,
                        action: Action::NoTitle,
                    });
                    continue;
                };

                let verdict = self.classifier.classify(&title, &targets, strict);
                let action = if verdict == Verdict::NoMatch && self.actuator.hide(doc, item.container, kind) {
                    self.context.counters.record_hidden(&item.identifier);
                    outcome.hidden += 1;
                    Action::Hidden
                } else {
                    Action::Kept
                };

                tracing::trace!(item = %item.identifier, %title, ?verdict, ?action, "item evaluated");
                outcome.decisions.push(Decision { identifier: item.identifier, title: Some(title), verdict: Some(verdict), action });
            }
        }

        tracing::debug!(
            candidates = outcome.candidates,
            evaluated = outcome.evaluated(),
            hidden = outcome.hidden,
            restored = outcome.restored,
            "scan finished"
        );
        outcome
    }
}
