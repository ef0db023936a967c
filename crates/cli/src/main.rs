mod echo;

use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use langfilter_core::{
    ConfigChange, ConfigStore, FeedDocument, FetchConfig, FilterError, FilterReport, FilterSettings, JsonFileStore,
    PageSource, ScanConfig, Session, parse_language_list,
};
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

use crate::echo::{
    format_size, print_banner, print_decisions, print_detail, print_info, print_step, print_success, print_warning,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const TOTAL_STEPS: usize = 4;

/// Output format for the filtered page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Html,
    Json,
    Text,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "html" => Ok(Self::Html),
            "json" => Ok(Self::Json),
            "text" | "txt" => Ok(Self::Text),
            _ => Err(format!("Invalid format: {}. Valid options: html, json, text", s)),
        }
    }
}

/// Hide video listing items whose titles are not in the selected languages
#[derive(Parser, Debug)]
#[command(name = "langfilter")]
#[command(author = "langfilter contributors")]
#[command(version)]
#[command(about = "Hide feed items that are not in your languages", long_about = None)]
struct Args {
    /// URL to fetch, local HTML file, or "-" for stdin
    #[arg(value_name = "INPUT")]
    input: String,

    /// Comma-separated language codes to keep (e.g. "en,es")
    #[arg(short, long = "lang", value_name = "CODES")]
    languages: Option<String>,

    /// Tolerate a few foreign letters and use statistical detection
    #[arg(long)]
    lenient: bool,

    /// Run with filtering switched off (nothing is hidden)
    #[arg(long)]
    disabled: bool,

    /// Leave video cards alone
    #[arg(long)]
    no_videos: bool,

    /// Leave channel cards alone
    #[arg(long)]
    no_channels: bool,

    /// HTML fragment appended to the feed after the first scan, as if scrolled in (repeatable)
    #[arg(long, value_name = "FILE")]
    append: Vec<PathBuf>,

    /// Settings file (JSON with enabled, strictMode, selectedLanguages, hideVideos, hideChannels)
    /// [default: <config dir>/langfilter/settings.json]
    #[arg(long, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Output file (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Output format (html, json, text)
    #[arg(short, long, default_value = "html", value_name = "FORMAT")]
    format: OutputFormat,

    /// HTTP timeout in seconds
    #[arg(long, default_value = "30", value_name = "SECS")]
    timeout: u64,

    /// Custom User-Agent for HTTP requests
    #[arg(long, value_name = "UA")]
    user_agent: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// The `--settings` file, or the one in the user's config directory.
    fn settings_store(&self) -> langfilter_core::Result<JsonFileStore> {
        match &self.settings {
            Some(path) => Ok(JsonFileStore::at(path)),
            None => JsonFileStore::default_location(),
        }
    }

    /// Stored settings with command-line overrides applied.
    ///
    /// Unreadable settings switch filtering off rather than falling back to
    /// defaults. A settings file that does not exist yet is a first run.
    fn filter_settings(&self) -> FilterSettings {
        let mut settings = match self.settings_store().and_then(|store| store.load()) {
            Ok(settings) => settings,
            Err(error) => {
                print_warning(&format!("{}; filtering disabled", error));
                FilterSettings::unavailable()
            }
        };

        let mut overrides = Vec::new();
        if let Some(list) = &self.languages {
            overrides.push(ConfigChange::SelectedLanguages(parse_language_list(list)));
        }
        if self.lenient {
            overrides.push(ConfigChange::StrictMode(false));
        }
        if self.disabled {
            overrides.push(ConfigChange::Enabled(false));
        }
        if self.no_videos {
            overrides.push(ConfigChange::HideVideos(false));
        }
        if self.no_channels {
            overrides.push(ConfigChange::HideChannels(false));
        }
        for change in overrides {
            settings.apply(change);
        }
        settings
    }

    fn fetch_config(&self) -> FetchConfig {
        let defaults = FetchConfig::default();
        FetchConfig {
            timeout: self.timeout,
            user_agent: self.user_agent.clone().unwrap_or(defaults.user_agent),
            accept_language: defaults.accept_language,
        }
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "langfilter_core=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    if args.verbose {
        print_banner();
        print_info("Debug logging enabled");
        eprintln!();
    }

    let source = PageSource::from_arg(&args.input);
    if args.verbose {
        let message = match &source {
            PageSource::Stdin => "Reading from stdin".to_string(),
            PageSource::Url(url) => format!("Fetching from {}", url.bright_white().underline()),
            PageSource::File(path) => format!("Reading from file {}", path.display().bright_white()),
        };
        print_step(1, TOTAL_STEPS, &message);
    }

    let html = source
        .load(&args.fetch_config())
        .await
        .with_context(|| format!("Failed to read input: {}", args.input))?;
    let batches = args
        .append
        .iter()
        .map(|path| fs::read_to_string(path).with_context(|| format!("Failed to read fragment: {}", path.display())))
        .collect::<anyhow::Result<Vec<_>>>()?;

    if args.verbose {
        print_detail("Size", &format_size(html.len()));
        if !batches.is_empty() {
            print_detail("Appended batches", &batches.len().to_string());
        }
        eprintln!();
        print_step(2, TOTAL_STEPS, "Parsing HTML document");
    }

    let doc = FeedDocument::parse(&html).context("Failed to parse HTML")?;
    let feed_root = if doc.select("#contents")?.is_empty() { "body" } else { "#contents" };
    let settings = args.filter_settings();

    if args.verbose {
        if let Ok(store) = args.settings_store() {
            print_detail("Settings", &store.path().display().to_string());
        }
        if let Some(title) = doc.title() {
            print_detail("Title", &title);
        }
        let languages: Vec<&str> = settings.selected_languages.iter().map(|l| l.as_str()).collect();
        print_detail("Languages", &languages.join(", "));
        print_detail("Mode", if settings.strict_mode { "strict" } else { "lenient" });
        eprintln!();
        print_step(3, TOTAL_STEPS, "Filtering feed");
    }

    let config = ScanConfig::builder().initial_delay(Duration::ZERO).tick_interval(None).build();
    let settle = config.debounce * 2;
    let (session, handle) =
        Session::with_settings(doc, config, settings).context("Failed to start filtering session")?;

    let replay = async move {
        for batch in &batches {
            handle.append(feed_root, batch).await?;
            tokio::time::sleep(settle).await;
        }
        Ok::<_, FilterError>(())
    };

    let (report, replayed) = tokio::join!(session.run(), replay);
    replayed.context("Failed to replay appended fragments")?;

    let summary = FilterReport::from_session(&report);
    if args.verbose {
        print_detail("Scans", &summary.scans.to_string());
        print_decisions(&summary);
        print_step(4, TOTAL_STEPS, "Writing output");
        print_detail("Format", &format!("{:?}", args.format));
        eprintln!();
    }

    let output = match args.format {
        OutputFormat::Html => report.document.render().context("Failed to render filtered page")?,
        OutputFormat::Json => summary.to_json(true).context("Failed to serialize report")?,
        OutputFormat::Text => summary.to_text(),
    };

    match args.output {
        Some(path) => {
            fs::write(&path, output).with_context(|| format!("Failed to write to file: {}", path.display()))?;
            print_success(&format!("Output written to {}", path.display().bright_white()));
        }
        None => {
            print!("{}", output);
        }
    }

    Ok(())
}
