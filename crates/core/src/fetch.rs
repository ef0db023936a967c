//! Loading listing pages from URLs, files, and stdin.
//!
//! The filter works on a saved or freshly downloaded listing page. A
//! [`PageSource`] names where the page comes from; [`PageSource::load`]
//! returns its HTML.

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

#[cfg(feature = "fetch")]
use std::time::Duration;

#[cfg(feature = "fetch")]
use reqwest::Client;
use url::Url;

use crate::{FilterError, Result};

/// HTTP client configuration for downloading listing pages.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Request timeout in seconds.
    pub timeout: u64,
    /// Custom User-Agent string.
    pub user_agent: String,
    /// Value of the `Accept-Language` header. Listing pages are localized by
    /// it, which changes which titles come back.
    pub accept_language: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: 30,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0 langfilter/1.0"
                .to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
        }
    }
}

/// Where a listing page is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageSource {
    Url(String),
    File(PathBuf),
    Stdin,
}

impl PageSource {
    /// Interprets a command-line argument: `-` is stdin, anything with an
    /// `http`/`https` scheme is a URL, the rest are file paths.
    pub fn from_arg(arg: &str) -> Self {
        if arg == "-" {
            return Self::Stdin;
        }
        match Url::parse(arg) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Self::Url(arg.to_string()),
            _ => Self::File(PathBuf::from(arg)),
        }
    }

    /// Reads the page.
    pub async fn load(&self, config: &FetchConfig) -> Result<String> {
        match self {
            Self::Url(url) => fetch_url(url, config).await,
            Self::File(path) => fetch_file(path),
            Self::Stdin => fetch_stdin(),
        }
    }
}

/// Downloads a page over HTTP(S), following redirects.
#[cfg(feature = "fetch")]
pub async fn fetch_url(url: &str, config: &FetchConfig) -> Result<String> {
    let parsed = Url::parse(url).map_err(|e| FilterError::InvalidUrl(e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(FilterError::InvalidUrl(format!("Unsupported scheme: {}", parsed.scheme())));
    }

    let client = Client::builder()
        .timeout(Duration::from_secs(config.timeout))
        .build()
        .map_err(FilterError::HttpError)?;

    let response = client
        .get(parsed)
        .header("User-Agent", &config.user_agent)
        .header("Accept", "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
        .header("Accept-Language", &config.accept_language)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() { FilterError::Timeout { timeout: config.timeout } } else { FilterError::HttpError(e) }
        })?
        .error_for_status()?;

    Ok(response.text().await?)
}

/// Without the `fetch` feature URLs cannot be loaded.
#[cfg(not(feature = "fetch"))]
pub async fn fetch_url(url: &str, _config: &FetchConfig) -> Result<String> {
    Err(FilterError::InvalidUrl(format!("{} (built without the fetch feature)", url)))
}

/// Reads a page from a local file.
pub fn fetch_file<P: Into<PathBuf>>(path: P) -> Result<String> {
    let path = path.into();
    if !path.exists() {
        return Err(FilterError::FileNotFound(path));
    }
    Ok(fs::read_to_string(&path)?)
}

/// Reads a page from standard input until EOF.
pub fn fetch_stdin() -> Result<String> {
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.timeout, 30);
        assert!(config.user_agent.contains("langfilter"));
        assert!(config.accept_language.starts_with("en"));
    }

    #[rstest]
    #[case("-", PageSource::Stdin)]
    #[case("https://www.youtube.com/results?search_query=x", PageSource::Url("https://www.youtube.com/results?search_query=x".into()))]
    #[case("http://localhost:8080/feed", PageSource::Url("http://localhost:8080/feed".into()))]
    #[case("tests/fixtures/feed.html", PageSource::File("tests/fixtures/feed.html".into()))]
    #[case("C:/pages/feed.html", PageSource::File("C:/pages/feed.html".into()))]
    fn test_page_source_from_arg(#[case] arg: &str, #[case] expected: PageSource) {
        assert_eq!(PageSource::from_arg(arg), expected);
    }

    #[tokio::test]
    async fn test_fetch_url_rejects_non_http() {
        let result = fetch_url("ftp://example.com/feed", &FetchConfig::default()).await;
        assert!(matches!(result, Err(FilterError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_fetch_url_invalid() {
        let result = fetch_url("not-a-url", &FetchConfig::default()).await;
        assert!(matches!(result, Err(FilterError::InvalidUrl(_))));
    }

    #[test]
    fn test_fetch_file_not_found() {
        let result = fetch_file("/nonexistent/path/feed.html");
        assert!(matches!(result, Err(FilterError::FileNotFound(_))));
    }

    #[tokio::test]
    async fn test_load_file_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "<html><body>feed</body></html>").unwrap();

        let source = PageSource::File(file.path().to_path_buf());
        let html = source.load(&FetchConfig::default()).await.unwrap();
        assert!(html.contains("feed"));
    }
}
