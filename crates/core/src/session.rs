//! The filtering event loop for one tab.
//!
//! A [`Session`] owns the document and the [`ScanCoordinator`] and reacts to
//! [`HostEvent`]s sent through a [`SessionHandle`]. Everything runs on one
//! task: mutations, scans and settings commits never interleave, so no locks
//! are needed. The loop multiplexes three sources with `tokio::select!`:
//! incoming events, the debounce deadline and the periodic tick.
//!
//! The document is not `Send`, so drive the session on the current task
//! alongside whatever feeds it events:
//!
//! ```rust
//! use langfilter_core::ScanConfig;
//! use langfilter_core::config::FilterSettings;
//! use langfilter_core::parse::FeedDocument;
//! use langfilter_core::session::Session;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> langfilter_core::Result<()> {
//! let doc = FeedDocument::parse(r#"<div id="contents"></div>"#)?;
//! let (session, handle) = Session::with_settings(doc, ScanConfig::default(), FilterSettings::default())?;
//!
//! let feed = async move {
//!     handle
//!         .append("#contents", r#"<ytd-video-renderer><a id="video-title" href="/watch?v=x1">Лучшие гаджеты 2024</a></ytd-video-renderer>"#)
//!         .await?;
//!     handle.scan_now().await
//! };
//!
//! let (report, fed) = tokio::join!(session.run(), feed);
//! fed?;
//! assert_eq!(report.counters.videos_hidden, 1);
//! # Ok(())
//! # }
//! ```

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::classify::Classifier;
use crate::config::{ConfigChange, ConfigStore, FilterSettings, ScanConfig};
use crate::coordinator::{Decision, ScanCoordinator, ScanOutcome};
use crate::counters::CounterSnapshot;
use crate::parse::FeedDocument;
use crate::{FilterError, Result};

const EVENT_CAPACITY: usize = 64;

/// Notifications from the host page.
#[derive(Debug)]
pub enum HostEvent {
    /// A fragment was rendered under the first element matching `parent`.
    Append { parent: String, html: String },
    /// Elements matching `selector` were removed.
    Remove { selector: String },
    Scroll,
    Tick,
    ConfigChanged(ConfigChange),
    /// The tab moved to a new page.
    Navigate { html: String },
    ResetCounters,
    /// Scan right away instead of waiting for the debounce window.
    ScanNow,
    /// Render the current document with hidden state applied.
    Render(oneshot::Sender<Result<String>>),
}

/// Everything a finished session leaves behind.
#[derive(Debug)]
pub struct SessionReport {
    pub document: FeedDocument,
    pub settings: FilterSettings,
    pub counters: CounterSnapshot,
    /// Every scan the session ran, eventful or not.
    pub scan_count: usize,
    /// Scans that evaluated, hid or restored something.
    pub scans: Vec<ScanOutcome>,
}

impl SessionReport {
    /// Every item decision, in the order the scans made them.
    pub fn decisions(&self) -> impl Iterator<Item = &Decision> {
        self.scans.iter().flat_map(|scan| scan.decisions.iter())
    }
}

/// Sending side of a session.
///
/// Dropping every handle ends the session once the pending events are
/// processed.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    events: mpsc::Sender<HostEvent>,
    counters: watch::Receiver<CounterSnapshot>,
}

impl SessionHandle {
    pub async fn send(&self, event: HostEvent) -> Result<()> {
        self.events.send(event).await.map_err(|_| FilterError::SessionClosed)
    }

    pub async fn append(&self, parent: &str, html: &str) -> Result<()> {
        self.send(HostEvent::Append { parent: parent.to_string(), html: html.to_string() }).await
    }

    pub async fn remove(&self, selector: &str) -> Result<()> {
        self.send(HostEvent::Remove { selector: selector.to_string() }).await
    }

    pub async fn scroll(&self) -> Result<()> {
        self.send(HostEvent::Scroll).await
    }

    pub async fn change(&self, change: ConfigChange) -> Result<()> {
        self.send(HostEvent::ConfigChanged(change)).await
    }

    pub async fn navigate(&self, html: &str) -> Result<()> {
        self.send(HostEvent::Navigate { html: html.to_string() }).await
    }

    pub async fn reset_counters(&self) -> Result<()> {
        self.send(HostEvent::ResetCounters).await
    }

    pub async fn scan_now(&self) -> Result<()> {
        self.send(HostEvent::ScanNow).await
    }

    /// Renders the document as the session currently sees it.
    pub async fn render(&self) -> Result<String> {
        let (tx, rx) = oneshot::channel();
        self.send(HostEvent::Render(tx)).await?;
        rx.await.map_err(|_| FilterError::SessionClosed)?
    }

    /// Latest published counters.
    pub fn counters(&self) -> CounterSnapshot {
        *self.counters.borrow()
    }

    /// A receiver that is notified after every scan.
    pub fn subscribe(&self) -> watch::Receiver<CounterSnapshot> {
        self.counters.clone()
    }
}

/// Event loop state for one page session.
pub struct Session {
    document: FeedDocument,
    coordinator: ScanCoordinator,
    config: ScanConfig,
    events: mpsc::Receiver<HostEvent>,
    counters: watch::Sender<CounterSnapshot>,
    scan_count: usize,
    scans: Vec<ScanOutcome>,
}

impl Session {
    /// Creates a session with settings from `store`.
    ///
    /// If the store cannot be read the session runs with filtering disabled;
    /// no defaults are guessed.
    pub fn new(document: FeedDocument, config: ScanConfig, store: &dyn ConfigStore) -> Result<(Self, SessionHandle)> {
        let settings = match store.load() {
            Ok(settings) => settings,
            Err(error) => {
                tracing::warn!(%error, "settings unavailable, filtering disabled for this session");
                FilterSettings::unavailable()
            }
        };
        Self::with_settings(document, config, settings)
    }

    /// Creates a session with explicit settings.
    pub fn with_settings(
        document: FeedDocument, config: ScanConfig, settings: FilterSettings,
    ) -> Result<(Self, SessionHandle)> {
        let coordinator = ScanCoordinator::new(&config, settings)?;
        let (events_tx, events_rx) = mpsc::channel(EVENT_CAPACITY);
        let (counters_tx, counters_rx) = watch::channel(coordinator.counters());

        let session = Self {
            document,
            coordinator,
            config,
            events: events_rx,
            counters: counters_tx,
            scan_count: 0,
            scans: Vec::new(),
        };
        let handle = SessionHandle { events: events_tx, counters: counters_rx };
        Ok((session, handle))
    }

    /// Replaces the classifier.
    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.coordinator = self.coordinator.with_classifier(classifier);
        self
    }

    /// Runs until every handle is dropped.
    ///
    /// The first scan runs after the configured initial delay. A scan that
    /// is still armed when the last handle goes away runs before returning.
    pub async fn run(mut self) -> SessionReport {
        let start = Instant::now();
        self.coordinator.schedule_initial(start, self.config.initial_delay);

        let mut ticker = self.config.tick_interval.map(|period| {
            let mut interval = tokio::time::interval_at(start + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        loop {
            let deadline = self.coordinator.next_deadline();

            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => self.handle(event),
                    None => break,
                },
                _ = sleep_until(deadline), if deadline.is_some() => self.run_due(),
                _ = next_tick(&mut ticker), if ticker.is_some() => {
                    self.coordinator.on_tick(Instant::now());
                }
            }
        }

        if self.coordinator.next_deadline().is_some() {
            self.scan_now();
        }
        tracing::debug!(scans = self.scan_count, eventful = self.scans.len(), "session closed");

        let settings = self.coordinator.settings().clone();
        let counters = self.coordinator.counters();
        SessionReport { document: self.document, settings, counters, scan_count: self.scan_count, scans: self.scans }
    }

    fn handle(&mut self, event: HostEvent) {
        let now = Instant::now();

        match event {
            HostEvent::Append { parent, html } => match self.document.append_html(&parent, &html) {
                Ok(0) => tracing::debug!(%parent, "appended fragment was empty"),
                Ok(_) => {
                    self.coordinator.on_mutation(now);
                }
                Err(error) => tracing::warn!(%error, "failed to append fragment"),
            },
            HostEvent::Remove { selector } => match self.document.remove(&selector) {
                Ok(0) => {}
                Ok(_) => {
                    self.coordinator.on_mutation(now);
                }
                Err(error) => tracing::warn!(%error, "failed to remove elements"),
            },
            HostEvent::Scroll => {
                self.coordinator.on_scroll(now);
            }
            HostEvent::Tick => {
                self.coordinator.on_tick(now);
            }
            HostEvent::ConfigChanged(change) => self.coordinator.apply_change(change, now),
            HostEvent::Navigate { html } => match FeedDocument::parse(&html) {
                Ok(document) => {
                    self.document = document;
                    self.coordinator.navigate();
                    self.coordinator.schedule_initial(now, self.config.initial_delay);
                }
                Err(error) => tracing::warn!(%error, "failed to load new page"),
            },
            HostEvent::ResetCounters => {
                self.coordinator.reset_counters();
                self.publish();
            }
            HostEvent::ScanNow => self.scan_now(),
            HostEvent::Render(reply) => {
                let _ = reply.send(self.document.render());
            }
        }
    }

    fn run_due(&mut self) {
        if let Some(outcome) = self.coordinator.run_due(&mut self.document, Instant::now()) {
            self.record(outcome);
        }
    }

    fn scan_now(&mut self) {
        let outcome = self.coordinator.scan_now(&mut self.document);
        self.record(outcome);
    }

    /// Keeps the outcome only if the scan changed something; idle rescans
    /// from the periodic tick are counted and dropped.
    fn record(&mut self, outcome: ScanOutcome) {
        self.scan_count += 1;
        if outcome.evaluated() > 0 || outcome.hidden > 0 || outcome.restored > 0 {
            self.scans.push(outcome);
        }
        self.publish();
    }

    fn publish(&self) {
        self.counters.send_replace(self.coordinator.counters());
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryStore;
    use crate::coordinator::ScanStatus;
    use std::time::Duration;
    use tokio::time::sleep;

    const PAGE: &str = r#"
        <html><body><div id="contents">
            <ytd-rich-item-renderer id="en">
                <h3><a id="video-title-link" href="/watch?v=abc123">Top 10 Gadgets of 2024!</a></h3>
            </ytd-rich-item-renderer>
            <ytd-rich-item-renderer id="ru">
                <h3><a id="video-title-link" href="/watch?v=def456">Лучшие гаджеты 2024</a></h3>
            </ytd-rich-item-renderer>
        </div></body></html>
    "#;

    fn card(id: &str, title: &str) -> String {
        format!(r#"<ytd-rich-item-renderer><h3><a href="/watch?v={}">{}</a></h3></ytd-rich-item-renderer>"#, id, title)
    }

    fn quiet_config() -> ScanConfig {
        ScanConfig::builder().tick_interval(None).build()
    }

    fn session(config: ScanConfig) -> (Session, SessionHandle) {
        Session::with_settings(FeedDocument::parse(PAGE).unwrap(), config, FilterSettings::default()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_scan_waits_for_delay() {
        let (session, handle) = session(quiet_config());

        let driver = async move {
            sleep(Duration::from_millis(999)).await;
            assert_eq!(handle.counters().total(), 0);
            sleep(Duration::from_millis(2)).await;
            assert_eq!(handle.counters().videos_hidden, 1);
        };

        let (report, ()) = tokio::join!(session.run(), driver);
        assert_eq!(report.scans.len(), 1);
        assert_eq!(report.document.hidden_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_append_burst_is_one_scan() {
        let (session, handle) = session(quiet_config());

        let driver = async move {
            sleep(Duration::from_millis(1100)).await;
            for (i, title) in ["Лучшие гаджеты 2025", "Новые гаджеты 2025", "Hello from the burst"].iter().enumerate() {
                handle.append("#contents", &card(&format!("b{}", i), title)).await.unwrap();
                sleep(Duration::from_millis(10)).await;
            }
            sleep(Duration::from_millis(200)).await;
            assert_eq!(handle.counters().videos_hidden, 3);
        };

        let (report, ()) = tokio::join!(session.run(), driver);
        assert_eq!(report.scans.len(), 2);
        assert_eq!(report.scans[1].evaluated(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreadable_settings_run_disabled() {
        let doc = FeedDocument::parse(PAGE).unwrap();
        let (session, handle) = Session::new(doc, quiet_config(), &MemoryStore::empty()).unwrap();

        let driver = async move {
            sleep(Duration::from_millis(1500)).await;
            drop(handle);
        };

        let (report, ()) = tokio::join!(session.run(), driver);
        assert!(!report.settings.enabled);
        assert!(report.settings.selected_languages.is_empty());
        assert_eq!(report.scan_count, 1);
        assert!(report.scans.is_empty());
        assert_eq!(report.document.hidden_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enabling_after_load_failure_stays_inactive() {
        let doc = FeedDocument::parse(PAGE).unwrap();
        let (session, handle) = Session::new(doc, quiet_config(), &MemoryStore::empty()).unwrap();

        let driver = async move {
            sleep(Duration::from_millis(1100)).await;
            handle.change(ConfigChange::Enabled(true)).await.unwrap();
            handle.scan_now().await.unwrap();
            handle.render().await.unwrap()
        };

        let (report, html) = tokio::join!(session.run(), driver);
        assert!(report.settings.enabled);
        assert!(!report.settings.is_active());
        assert_eq!(report.counters.total(), 0);
        assert!(!html.contains("data-langfilter"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_append_schedules_nothing() {
        let (session, handle) = session(quiet_config());

        let driver = async move {
            sleep(Duration::from_millis(1100)).await;
            handle.append("#contents", "").await.unwrap();
            sleep(Duration::from_millis(500)).await;
        };

        let (report, ()) = tokio::join!(session.run(), driver);
        assert_eq!(report.scan_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_ticks_are_not_kept() {
        let config = ScanConfig::builder().tick_interval(Some(Duration::from_millis(100))).build();
        let (session, handle) = session(config);

        let driver = async move {
            sleep(Duration::from_secs(60)).await;
            drop(handle);
        };

        let (report, ()) = tokio::join!(session.run(), driver);
        assert!(report.scan_count > 100);
        assert_eq!(report.scans.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_config_change_applies_on_next_scan() {
        let (session, handle) = session(quiet_config());

        let driver = async move {
            sleep(Duration::from_millis(1100)).await;
            assert_eq!(handle.counters().videos_hidden, 1);
            handle.change(ConfigChange::Enabled(false)).await.unwrap();
            sleep(Duration::from_millis(200)).await;
        };

        let (report, ()) = tokio::join!(session.run(), driver);
        assert!(!report.settings.enabled);
        assert_eq!(report.scans.last().unwrap().status, ScanStatus::Inactive);
        assert_eq!(report.document.hidden_count(), 0);
        assert_eq!(report.counters.videos_hidden, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_render_reflects_hidden_state() {
        let (session, handle) = session(quiet_config());

        let driver = async move {
            handle.scan_now().await.unwrap();
            handle.render().await.unwrap()
        };

        let (_, html) = tokio::join!(session.run(), driver);
        assert!(html.contains(r#"data-langfilter="hidden""#));
        assert!(html.contains("Top 10 Gadgets of 2024!"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigate_starts_fresh_page() {
        let (session, handle) = session(quiet_config());

        let driver = async move {
            handle.scan_now().await.unwrap();
            handle.navigate(PAGE).await.unwrap();
            sleep(Duration::from_millis(1100)).await;
        };

        let (report, ()) = tokio::join!(session.run(), driver);
        assert_eq!(report.scans.len(), 2);
        assert_eq!(report.scans[1].hidden, 1);
        assert_eq!(report.document.hidden_count(), 1);
        assert_eq!(report.counters.videos_hidden, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_rescans_periodically() {
        let config = ScanConfig::builder().tick_interval(Some(Duration::from_millis(500))).build();
        let (session, handle) = session(config);

        let driver = async move {
            sleep(Duration::from_millis(2050)).await;
            drop(handle);
        };

        let (report, ()) = tokio::join!(session.run(), driver);
        assert!(report.scan_count >= 2);
        assert_eq!(report.scans.len(), 1);
        assert_eq!(report.decisions().count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_counters() {
        let (session, handle) = session(quiet_config());

        let driver = async move {
            handle.scan_now().await.unwrap();
            handle.reset_counters().await.unwrap();
            handle.render().await.unwrap();
            handle.counters()
        };

        let (_, counters) = tokio::join!(session.run(), driver);
        assert_eq!(counters, CounterSnapshot::default());
    }

    #[tokio::test]
    async fn test_closed_session_rejects_events() {
        let (session, handle) = session(quiet_config());
        drop(session);
        assert!(matches!(handle.scroll().await, Err(FilterError::SessionClosed)));
    }
}
