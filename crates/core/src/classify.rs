//! Heuristic language classification of item titles.
//!
//! The [`Classifier`] answers one question: is this title written in one of
//! the target languages? It does so with character-set and script tests
//! rather than a statistical model. Each language code maps to a
//! [`Recognizer`] in a [`RecognizerRegistry`]; new languages are added by
//! registering another recognizer.
//!
//! Strict mode is exact: the text may only contain characters the language
//! allows and no letters from other scripts. Lenient mode tolerates a small
//! share of foreign letters and falls back to `whatlang` trigram detection.
//!
//! # Example
//!
//! ```rust
//! use langfilter_core::classify::{Classifier, Verdict};
//! use langfilter_core::config::LanguageCode;
//!
//! let classifier = Classifier::default();
//! let targets = [LanguageCode::base()];
//!
//! assert_eq!(classifier.classify("Top 10 Gadgets of 2024!", &targets, true), Verdict::Match);
//! assert_eq!(classifier.classify("Лучшие гаджеты 2024", &targets, true), Verdict::NoMatch);
//! ```

use std::collections::{HashMap, HashSet};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use whatlang::Lang;

use crate::config::LanguageCode;
use crate::{FilterError, Result};

/// Characters the base language may consist of.
static BASE_ALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^[a-zA-Z0-9\s.,!?'"()\-:;&@#$%|\[\]{}/\\*+=_~`]+$"#).expect("valid regex"));

/// Characters that point at a language other than the base one.
static FOREIGN_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[çğıöşü]|[àáâãäåæ]|[èéêë]|[ìíîï]|ñ|[òóôõö]|[ùúûü]|ý|[а-я]|[α-ω]|[一-龯]|[가-힣]")
        .expect("valid regex")
});

const ASCII_PUNCTUATION: &str = ".,!?'\"()-:;&@#$%|[]{}/\\*+=_~`";

/// Classifier thresholds.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Texts shorter than this (in characters) are not judged (default: 3).
    pub min_text_len: usize,
    /// Share of foreign letters lenient Latin recognizers tolerate (default: 0.1).
    pub lenient_foreign_ratio: f64,
    /// Share of own-script letters lenient script recognizers need (default: 0.3).
    pub lenient_min_script_share: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self { min_text_len: 3, lenient_foreign_ratio: 0.1, lenient_min_script_share: 0.3 }
    }
}

/// Outcome of classifying one text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// The text is in one of the target languages.
    Match,
    /// The text is in none of the target languages.
    NoMatch,
    /// A recognizer failed and nothing else matched. Never hides.
    Undetermined,
}

impl Verdict {
    /// Boolean view of the verdict. `Undetermined` counts as a match so
    /// that callers acting on `!matches()` fail toward visibility.
    pub fn matches(self) -> bool {
        !matches!(self, Verdict::NoMatch)
    }
}

/// Decides whether a text belongs to one language.
///
/// Report failures by returning `Err`. A panic is contained and treated the
/// same way, but the process panic hook still runs and prints to stderr for
/// every title the recognizer sees.
pub trait Recognizer: Send + Sync {
    fn recognize(&self, text: &str, strict: bool) -> Result<bool>;
}

/// Receives classifier failures.
pub trait ClassifierObserver: Send + Sync {
    fn recognizer_failed(&self, language: &LanguageCode, error: &FilterError);
}

/// Observer that logs failures through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ClassifierObserver for TracingObserver {
    fn recognizer_failed(&self, language: &LanguageCode, error: &FilterError) {
        tracing::warn!(%language, %error, "language recognizer failed, leaving item visible");
    }
}

/// Writing systems the script recognizers distinguish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Script {
    Latin,
    Cyrillic,
    Greek,
    Hiragana,
    Katakana,
    Han,
    Hangul,
    Arabic,
    Devanagari,
    Thai,
}

impl Script {
    /// Script of a character, or `None` for digits, punctuation, symbols
    /// and whitespace.
    pub fn of(c: char) -> Option<Script> {
        let script = match c as u32 {
            0x0041..=0x005A | 0x0061..=0x007A => Script::Latin,
            0x00C0..=0x024F if c.is_alphabetic() => Script::Latin,
            0x1E00..=0x1EFF => Script::Latin,
            0x0370..=0x03FF | 0x1F00..=0x1FFF if c.is_alphabetic() => Script::Greek,
            0x0400..=0x052F => Script::Cyrillic,
            0x0600..=0x06FF | 0x0750..=0x077F | 0xFB50..=0xFDFF | 0xFE70..=0xFEFF if c.is_alphabetic() => {
                Script::Arabic
            }
            0x0900..=0x097F => Script::Devanagari,
            0x0E00..=0x0E7F => Script::Thai,
            0x1100..=0x11FF | 0x3130..=0x318F | 0xAC00..=0xD7AF => Script::Hangul,
            0x3040..=0x309F => Script::Hiragana,
            0x30A0..=0x30FF | 0x31F0..=0x31FF | 0xFF66..=0xFF9F => Script::Katakana,
            0x3400..=0x4DBF | 0x4E00..=0x9FFF | 0xF900..=0xFAFF => Script::Han,
            _ => return None,
        };
        Some(script)
    }
}

fn is_ascii_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || c.is_whitespace() || ASCII_PUNCTUATION.contains(c)
}

/// Recognizer for the base language (English).
///
/// Strict: the whole text is drawn from ASCII letters, digits and common
/// punctuation, and contains no foreign marker character. Lenient: foreign
/// letters may make up at most `foreign_ratio` of all letters.
#[derive(Debug, Clone)]
pub struct BaseLatinRecognizer {
    foreign_ratio: f64,
}

impl BaseLatinRecognizer {
    pub fn new(foreign_ratio: f64) -> Self {
        Self { foreign_ratio }
    }
}

impl Recognizer for BaseLatinRecognizer {
    fn recognize(&self, text: &str, strict: bool) -> Result<bool> {
        let exact = BASE_ALLOWED.is_match(text) && !FOREIGN_MARKERS.is_match(text);
        if exact || strict {
            return Ok(exact);
        }

        let (ascii, foreign) = text.chars().filter(|c| c.is_alphabetic()).fold((0usize, 0usize), |(a, f), c| {
            if c.is_ascii_alphabetic() { (a + 1, f) } else { (a, f + 1) }
        });
        Ok(ascii > 0 && within_ratio(foreign, ascii + foreign, self.foreign_ratio))
    }
}

fn within_ratio(part: usize, total: usize, ratio: f64) -> bool {
    total > 0 && (part as f64 / total as f64) <= ratio
}

/// Explicit word list recognizer.
///
/// Strict mode needs `strict_hits` distinct list words in the text, lenient
/// mode one.
#[derive(Debug, Clone)]
pub struct WordListRecognizer {
    words: HashSet<String>,
    strict_hits: usize,
}

impl WordListRecognizer {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self { words: words.into_iter().map(|w| w.as_ref().to_lowercase()).collect(), strict_hits: 2 }
    }

    /// Sets how many list words strict mode requires.
    pub fn with_strict_hits(mut self, hits: usize) -> Self {
        self.strict_hits = hits.max(1);
        self
    }

    /// Number of distinct list words occurring in `text`.
    pub fn hits(&self, text: &str) -> usize {
        let lowered = text.to_lowercase();
        lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty() && self.words.contains(*token))
            .collect::<HashSet<_>>()
            .len()
    }
}

impl Recognizer for WordListRecognizer {
    fn recognize(&self, text: &str, strict: bool) -> Result<bool> {
        let needed = if strict { self.strict_hits } else { 1 };
        Ok(self.hits(text) >= needed)
    }
}

/// Recognizer for Latin-script languages with their own diacritics.
///
/// Strict: every character is ASCII-allowed or one of the language's own
/// letters, and the text shows evidence of the language (one of its letters
/// or a stopword). Lenient: letters outside ASCII and the language's own set
/// stay within the foreign ratio.
#[derive(Debug, Clone)]
pub struct LatinRecognizer {
    letters: HashSet<char>,
    stopwords: WordListRecognizer,
    foreign_ratio: f64,
}

impl LatinRecognizer {
    pub fn new(letters: &str, stopwords: WordListRecognizer, foreign_ratio: f64) -> Self {
        Self { letters: letters.chars().collect(), stopwords, foreign_ratio }
    }

    fn is_own_letter(&self, c: char) -> bool {
        self.letters.contains(&c) || c.to_lowercase().all(|l| self.letters.contains(&l))
    }
}

impl Recognizer for LatinRecognizer {
    fn recognize(&self, text: &str, strict: bool) -> Result<bool> {
        if strict {
            let all_allowed = text.chars().all(|c| is_ascii_allowed(c) || self.is_own_letter(c));
            let evidence = text.chars().any(|c| self.is_own_letter(c)) || self.stopwords.hits(text) > 0;
            return Ok(all_allowed && evidence);
        }

        let mut letters = 0usize;
        let mut foreign = 0usize;
        for c in text.chars().filter(|c| c.is_alphabetic()) {
            letters += 1;
            if !c.is_ascii_alphabetic() && !self.is_own_letter(c) {
                foreign += 1;
            }
        }
        Ok(within_ratio(foreign, letters, self.foreign_ratio))
    }
}

/// Recognizer for languages written in a non-Latin script.
///
/// Strict: at least one letter from the `required` scripts and no letters
/// from any script other than the language's own and ASCII Latin. Lenient:
/// own-script letters make up at least `min_share` of all letters.
#[derive(Debug, Clone)]
pub struct ScriptRecognizer {
    own: Vec<Script>,
    required: Vec<Script>,
    min_share: f64,
}

impl ScriptRecognizer {
    pub fn new(own: &[Script], min_share: f64) -> Self {
        Self { own: own.to_vec(), required: own.to_vec(), min_share }
    }

    /// Narrows which scripts count as evidence in strict mode.
    pub fn requiring(mut self, required: &[Script]) -> Self {
        self.required = required.to_vec();
        self
    }
}

impl Recognizer for ScriptRecognizer {
    fn recognize(&self, text: &str, strict: bool) -> Result<bool> {
        let mut own = 0usize;
        let mut required = 0usize;
        let mut latin = 0usize;
        let mut other = 0usize;

        for script in text.chars().filter_map(Script::of) {
            if self.own.contains(&script) {
                own += 1;
                if self.required.contains(&script) {
                    required += 1;
                }
            } else if script == Script::Latin {
                latin += 1;
            } else {
                other += 1;
            }
        }

        if strict {
            return Ok(required > 0 && other == 0);
        }

        let total = own + latin + other;
        Ok(total > 0 && (own as f64 / total as f64) >= self.min_share)
    }
}

/// Mapping from language code to recognizer.
#[derive(Default)]
pub struct RecognizerRegistry {
    recognizers: HashMap<LanguageCode, Box<dyn Recognizer>>,
}

impl RecognizerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self { recognizers: HashMap::new() }
    }

    /// Registry with the built-in recognizers.
    pub fn with_defaults(config: &ClassifierConfig) -> Self {
        let mut registry = Self::new();
        let ratio = config.lenient_foreign_ratio;
        let share = config.lenient_min_script_share;

        registry.register(LanguageCode::base(), BaseLatinRecognizer::new(ratio));

        for (code, letters, words) in LATIN_LANGUAGES {
            registry.register(*code, LatinRecognizer::new(letters, WordListRecognizer::new(words.iter()), ratio));
        }

        registry.register("ru", ScriptRecognizer::new(&[Script::Cyrillic], share));
        registry.register("uk", ScriptRecognizer::new(&[Script::Cyrillic], share));
        registry.register("el", ScriptRecognizer::new(&[Script::Greek], share));
        registry.register(
            "ja",
            ScriptRecognizer::new(&[Script::Hiragana, Script::Katakana, Script::Han], share)
                .requiring(&[Script::Hiragana, Script::Katakana]),
        );
        registry.register("zh", ScriptRecognizer::new(&[Script::Han], share));
        registry.register(
            "ko",
            ScriptRecognizer::new(&[Script::Hangul, Script::Han], share).requiring(&[Script::Hangul]),
        );
        registry.register("ar", ScriptRecognizer::new(&[Script::Arabic], share));
        registry.register("hi", ScriptRecognizer::new(&[Script::Devanagari], share));
        registry.register("th", ScriptRecognizer::new(&[Script::Thai], share));

        registry
    }

    /// Registers (or replaces) the recognizer for a language.
    pub fn register<C, R>(&mut self, code: C, recognizer: R)
    where
        C: Into<LanguageCode>,
        R: Recognizer + 'static,
    {
        self.recognizers.insert(code.into(), Box::new(recognizer));
    }

    pub fn get(&self, code: &LanguageCode) -> Option<&dyn Recognizer> {
        self.recognizers.get(code).map(|r| r.as_ref())
    }

    pub fn contains(&self, code: &LanguageCode) -> bool {
        self.recognizers.contains_key(code)
    }

    /// Registered language codes, sorted.
    pub fn languages(&self) -> Vec<LanguageCode> {
        let mut codes: Vec<LanguageCode> = self.recognizers.keys().cloned().collect();
        codes.sort();
        codes
    }
}

/// Own letters and stopwords for the built-in Latin-script languages.
const LATIN_LANGUAGES: &[(&str, &str, &[&str])] = &[
    (
        "es",
        "áéíóúñü¿¡",
        &["el", "los", "las", "del", "que", "por", "para", "con", "una", "pero", "como", "muy", "cómo", "qué"],
    ),
    (
        "fr",
        "àâæçéèêëîïôœùûüÿ",
        &["le", "les", "des", "du", "et", "une", "pour", "avec", "est", "pas", "qui", "dans", "sur", "aux"],
    ),
    (
        "de",
        "äöüß",
        &["der", "das", "und", "ist", "nicht", "ein", "eine", "mit", "für", "auf", "dem", "zu", "von", "sich"],
    ),
    (
        "it",
        "àèéìíîòóùú",
        &["il", "gli", "di", "che", "per", "con", "non", "sono", "della", "nel", "alla", "una", "questo"],
    ),
    (
        "pt",
        "áâãàçéêíóôõú",
        &["os", "do", "da", "que", "um", "uma", "para", "com", "não", "em", "na", "por", "mais", "como"],
    ),
    ("tr", "çğıöşüâîİ", &["ve", "bir", "bu", "için", "ile", "çok", "gibi", "daha", "ama", "nasıl", "neden"]),
    ("nl", "éëïóöüĳ", &["het", "een", "en", "van", "niet", "dat", "op", "te", "met", "voor", "zijn", "ook"]),
];

/// Classifies texts against a target language set.
pub struct Classifier {
    registry: RecognizerRegistry,
    config: ClassifierConfig,
    observer: Box<dyn ClassifierObserver>,
}

impl Classifier {
    /// Classifier with the built-in recognizers and a tracing observer.
    pub fn new(config: ClassifierConfig) -> Self {
        let registry = RecognizerRegistry::with_defaults(&config);
        Self { registry, config, observer: Box::new(TracingObserver) }
    }

    /// Classifier over a custom registry.
    pub fn with_registry(config: ClassifierConfig, registry: RecognizerRegistry) -> Self {
        Self { registry, config, observer: Box::new(TracingObserver) }
    }

    /// Replaces the failure observer.
    pub fn with_observer<O: ClassifierObserver + 'static>(mut self, observer: O) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn registry(&self) -> &RecognizerRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut RecognizerRegistry {
        &mut self.registry
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// The codes in `targets` that have a registered recognizer, in order.
    pub fn supported(&self, targets: &[LanguageCode]) -> Vec<LanguageCode> {
        targets.iter().filter(|code| self.registry.contains(code)).cloned().collect()
    }

    /// Classifies `text` against `targets`.
    ///
    /// Unknown codes are ignored. Empty target sets yield `NoMatch`; a set
    /// made only of unknown codes yields `Undetermined`. Texts shorter than
    /// the minimum yield `NoMatch`, except when the base language is the
    /// only target, where they pass through as `Match`.
    pub fn classify(&self, text: &str, targets: &[LanguageCode], strict: bool) -> Verdict {
        if targets.is_empty() {
            return Verdict::NoMatch;
        }
        let known = self.supported(targets);
        if known.is_empty() {
            tracing::trace!("no recognizer for any target language");
            return Verdict::Undetermined;
        }
        let targets = known.as_slice();

        let text = text.trim();
        if text.chars().count() < self.config.min_text_len {
            return if targets.iter().all(LanguageCode::is_base) { Verdict::Match } else { Verdict::NoMatch };
        }

        let mut failed = false;
        for code in targets {
            let Some(recognizer) = self.registry.get(code) else {
                continue;
            };

            match guarded(code, || recognizer.recognize(text, strict)) {
                Ok(true) => return Verdict::Match,
                Ok(false) => {}
                Err(error) => {
                    self.observer.recognizer_failed(code, &error);
                    failed = true;
                }
            }
        }

        if !strict && statistical_match(text, targets) {
            return Verdict::Match;
        }

        if failed { Verdict::Undetermined } else { Verdict::NoMatch }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}

/// Runs a recognizer, turning panics into errors.
fn guarded<F>(code: &LanguageCode, f: F) -> Result<bool>
where
    F: FnOnce() -> Result<bool>,
{
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "recognizer panicked".to_string());
        Err(FilterError::RecognizerError { language: code.to_string(), reason })
    })
}

/// Trigram fallback used in lenient mode.
fn statistical_match(text: &str, targets: &[LanguageCode]) -> bool {
    let Some(info) = whatlang::detect(text) else {
        return false;
    };
    if !info.is_reliable() {
        return false;
    }
    lang_to_code(info.lang()).is_some_and(|code| targets.iter().any(|t| t.as_str() == code))
}

/// Convert whatlang Lang to the ISO 639-1 codes the registry uses.
fn lang_to_code(lang: Lang) -> Option<&'static str> {
    let code = match lang {
        Lang::Eng => "en",
        Lang::Spa => "es",
        Lang::Fra => "fr",
        Lang::Deu => "de",
        Lang::Ita => "it",
        Lang::Por => "pt",
        Lang::Tur => "tr",
        Lang::Nld => "nl",
        Lang::Rus => "ru",
        Lang::Ukr => "uk",
        Lang::Ell => "el",
        Lang::Jpn => "ja",
        Lang::Cmn => "zh",
        Lang::Kor => "ko",
        Lang::Ara => "ar",
        Lang::Hin => "hi",
        Lang::Tha => "th",
        _ => return None,
    };
    Some(code)
}
