//! Language filtering for video listing feeds.
//!
//! The crate watches a listing page as it grows (infinite scroll, search
//! results, recommendations), works out the language of each item's title
//! and hides the items that are not in one of the selected languages.
//!
//! # Example
//!
//! ```rust
//! use langfilter_core::{FeedDocument, FilterSettings, ScanConfig, ScanCoordinator};
//!
//! let html = r#"<html><body><div id="contents">
//!     <ytd-video-renderer><a id="video-title" href="/watch?v=abc123">Top 10 Gadgets of 2024!</a></ytd-video-renderer>
//!     <ytd-video-renderer><a id="video-title" href="/watch?v=def456">Лучшие гаджеты 2024</a></ytd-video-renderer>
//! </div></body></html>"#;
//!
//! let mut doc = FeedDocument::parse(html).unwrap();
//! let mut coordinator = ScanCoordinator::new(&ScanConfig::default(), FilterSettings::default()).unwrap();
//! coordinator.scan_now(&mut doc);
//!
//! assert_eq!(coordinator.counters().videos_hidden, 1);
//! assert!(doc.render().unwrap().contains(r#"data-langfilter="hidden""#));
//! ```

pub mod classify;
pub mod config;
pub mod coordinator;
pub mod counters;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod ledger;
pub mod parse;
pub mod report;
pub mod schedule;
pub mod session;
pub mod visibility;

pub use classify::{Classifier, ClassifierConfig, Recognizer, RecognizerRegistry, Verdict};
pub use config::{
    ConfigChange, ConfigStore, FilterSettings, JsonFileStore, LanguageCode, MemoryStore, ScanConfig,
    ScanConfigBuilder, parse_language_list,
};
pub use coordinator::{Action, Decision, ScanCoordinator, ScanOutcome, ScanStatus};
pub use counters::{CounterSnapshot, FilterCounters};
pub use error::{FilterError, Result};
pub use extract::{Extractor, ItemIdentifier, ItemKind, KindSpec};
pub use fetch::{FetchConfig, PageSource, fetch_file, fetch_stdin, fetch_url};
pub use ledger::DedupLedger;
pub use parse::{Element, FeedDocument};
pub use report::FilterReport;
pub use schedule::Debouncer;
pub use session::{HostEvent, Session, SessionHandle, SessionReport};
pub use visibility::VisibilityActuator;
