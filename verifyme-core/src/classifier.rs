//! Email content classifier
//!
//! Decides whether a message carries a verification artifact and which one:
//! 1. One-time codes, through an ordered rule list (first match wins)
//! 2. Confirmation links, ranked by keyword score when no code was found
//!
//! Classification is pure: no I/O, no logging, no state between calls.

use regex::Regex;
use scraper::{Html, Selector};
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use crate::{
    clean_content, config::clean_keywords, decode_amp, non_empty, normalize_whitespace,
    truncate_body, Candidate, ClassifierConfig, ConfigError, EmailMessage, VerificationArtifact,
    MAX_OTP_DIGITS, MIN_OTP_DIGITS, PREFERRED_OTP_DIGITS,
};

static URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)https?://[^\s<>"']+"#).unwrap()
});

static ANCHOR_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

static DEFAULT_CLASSIFIER: LazyLock<Classifier> =
    LazyLock::new(|| Classifier::new(ClassifierConfig::default()).unwrap());

/// Classify with the default keyword lists
pub fn classify(html: Option<&str>, text: Option<&str>) -> Option<VerificationArtifact> {
    DEFAULT_CLASSIFIER.classify(html, text)
}

/// A code found by one of the rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpMatch {
    /// Name of the rule that fired
    pub rule: &'static str,
    /// The digits
    pub value: String,
}

/// How a classification came about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Explanation {
    /// The code that fired, if any
    pub code: Option<OtpMatch>,
    /// Every surviving link candidate, best first
    pub candidates: Vec<Candidate>,
}

impl Explanation {
    /// The artifact `classify` returns for the same input
    pub fn artifact(&self) -> Option<VerificationArtifact> {
        if let Some(code) = &self.code {
            return Some(VerificationArtifact::otp(&code.value));
        }
        self.candidates
            .first()
            .map(|best| VerificationArtifact::link(&best.url))
    }
}

/// One entry of the ordered code rule list
#[derive(Debug, Clone)]
struct OtpRule {
    name: &'static str,
    /// Digits are captured in the `code` group
    pattern: Regex,
}

impl OtpRule {
    fn new(name: &'static str, pattern: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            name,
            pattern: Regex::new(pattern)?,
        })
    }

    fn find(&self, content: &str) -> Option<OtpMatch> {
        self.pattern
            .captures(content)
            .and_then(|caps| caps.name("code"))
            .map(|m| OtpMatch {
                rule: self.name,
                value: m.as_str().to_string(),
            })
    }
}

/// Build the code rules in priority order
fn build_otp_rules(otp_keywords: &[String]) -> Result<Vec<OtpRule>, ConfigError> {
    let mut rules = vec![OtpRule::new(
        "six-digit",
        &format!(r"\b(?P<code>[0-9]{{{}}})\b", PREFERRED_OTP_DIGITS),
    )?];

    // An empty alternation would match everywhere
    if !otp_keywords.is_empty() {
        let alternation = otp_keywords
            .iter()
            .map(|k| regex::escape(k))
            .collect::<Vec<_>>()
            .join("|");
        rules.push(OtpRule::new(
            "keyword-adjacent",
            &format!(
                r"\b(?:{})[:\s]+(?P<code>[0-9]{{{},{}}})\b",
                alternation, MIN_OTP_DIGITS, MAX_OTP_DIGITS
            ),
        )?);
    }

    rules.push(OtpRule::new(
        "standalone",
        &format!(r"\b(?P<code>[0-9]{{{},{}}})\b", MIN_OTP_DIGITS, MAX_OTP_DIGITS),
    )?);

    Ok(rules)
}

/// Heuristic classifier for verification emails
#[derive(Debug, Clone)]
pub struct Classifier {
    config: ClassifierConfig,
    otp_rules: Vec<OtpRule>,
}

impl Classifier {
    /// Compile a classifier from keyword lists and weights
    pub fn new(config: ClassifierConfig) -> Result<Self, ConfigError> {
        let config = ClassifierConfig {
            otp_keywords: clean_keywords(&config.otp_keywords),
            verify_keywords: clean_keywords(&config.verify_keywords),
            ignore_keywords: clean_keywords(&config.ignore_keywords),
            ..config
        };
        let otp_rules = build_otp_rules(&config.otp_keywords)?;

        Ok(Self { config, otp_rules })
    }

    /// The effective (cleaned) configuration
    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Names of the code rules, in the order they are tried
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.otp_rules.iter().map(|r| r.name).collect()
    }

    /// Produce zero or one artifact for a pair of bodies
    pub fn classify(&self, html: Option<&str>, text: Option<&str>) -> Option<VerificationArtifact> {
        let (html, text) = self.prepare(html, text)?;
        let content = clean_content(html, text);

        if let Some(code) = self.find_code(&content) {
            return Some(VerificationArtifact::Otp { value: code.value });
        }

        self.rank_prepared(html, text, &content)
            .into_iter()
            .next()
            .map(|best| VerificationArtifact::Link { value: best.url })
    }

    /// Classify a provider message, using the first part of multi-part bodies
    pub fn classify_message(&self, message: &EmailMessage) -> Option<VerificationArtifact> {
        self.classify(message.html_body(), message.text_body())
    }

    /// Run the code rules over already-cleaned content
    pub fn find_code(&self, content: &str) -> Option<OtpMatch> {
        self.otp_rules.iter().find_map(|rule| rule.find(content))
    }

    /// All surviving link candidates, best first
    ///
    /// Runs the link stage on its own, whether or not a code is present.
    pub fn rank_links(&self, html: Option<&str>, text: Option<&str>) -> Vec<Candidate> {
        match self.prepare(html, text) {
            Some((html, text)) => {
                let content = clean_content(html, text);
                self.rank_prepared(html, text, &content)
            }
            None => Vec::new(),
        }
    }

    /// Both stages over the same prepared bodies `classify` sees
    pub fn explain(&self, html: Option<&str>, text: Option<&str>) -> Explanation {
        match self.prepare(html, text) {
            Some((html, text)) => {
                let content = clean_content(html, text);
                Explanation {
                    code: self.find_code(&content),
                    candidates: self.rank_prepared(html, text, &content),
                }
            }
            None => Explanation {
                code: None,
                candidates: Vec::new(),
            },
        }
    }

    /// Drop empty bodies and apply the size limit; `None` when nothing is left
    fn prepare<'a>(
        &self,
        html: Option<&'a str>,
        text: Option<&'a str>,
    ) -> Option<(Option<&'a str>, Option<&'a str>)> {
        let limit = self.config.max_body_bytes;
        let html = non_empty(html).map(|h| truncate_body(h, limit));
        let text = non_empty(text).map(|t| truncate_body(t, limit));

        if html.is_none() && text.is_none() {
            return None;
        }
        Some((html, text))
    }

    fn rank_prepared(&self, html: Option<&str>, text: Option<&str>, content: &str) -> Vec<Candidate> {
        let search_space = format!("{} {}", html.unwrap_or(""), text.unwrap_or(""));

        let mut seen: HashSet<String> = HashSet::new();
        let mut urls = Vec::new();
        for m in URL_REGEX.find_iter(&search_space) {
            let url = decode_amp(m.as_str());
            if seen.insert(url.clone()) {
                urls.push(url);
            }
        }

        if urls.is_empty() {
            return Vec::new();
        }

        let anchors = html.map(collect_anchor_texts).unwrap_or_default();
        // Keywords inside URLs are scored per URL, not as content intent
        let prose = URL_REGEX.replace_all(content, " ");
        let content_signal = contains_any(&prose, &self.config.verify_keywords);

        let mut candidates = Vec::new();
        for url in urls {
            let url_lower = url.to_lowercase();
            if contains_any(&url_lower, &self.config.ignore_keywords) {
                continue;
            }

            let anchor_texts = anchors.get(&url).map(Vec::as_slice).unwrap_or_default();
            if anchor_texts
                .iter()
                .any(|t| contains_any(t, &self.config.ignore_keywords))
            {
                continue;
            }

            let url_score =
                keyword_hits(&url_lower, &self.config.verify_keywords).saturating_mul(self.config.url_weight);
            let anchor_score = anchor_texts
                .iter()
                .map(|t| keyword_hits(t, &self.config.verify_keywords).saturating_mul(self.config.anchor_weight))
                .max()
                .unwrap_or(0);
            let score = url_score.saturating_add(anchor_score);

            if score == 0 && !content_signal {
                continue;
            }

            candidates.push(Candidate { url, score });
        }

        // Stable: equal score and length keep first-seen order
        candidates.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.url.len().cmp(&b.url.len()))
        });

        candidates
    }
}

/// Map each absolute href to the lowercase texts of the anchors pointing at it
fn collect_anchor_texts(html: &str) -> HashMap<String, Vec<String>> {
    let document = Html::parse_document(html);
    let mut anchors: HashMap<String, Vec<String>> = HashMap::new();

    for element in document.select(&ANCHOR_SELECTOR) {
        let href = match element.value().attr("href") {
            Some(h) => h.trim(),
            None => continue,
        };

        let lower = href.to_lowercase();
        if !lower.starts_with("http://") && !lower.starts_with("https://") {
            continue;
        }

        let text = normalize_whitespace(&element.text().collect::<Vec<_>>().join(" ")).to_lowercase();
        anchors.entry(href.to_string()).or_default().push(text);
    }

    anchors
}

fn contains_any(haystack: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|k| haystack.contains(k.as_str()))
}

/// Number of distinct keywords present in `haystack`
fn keyword_hits(haystack: &str, keywords: &[String]) -> u32 {
    keywords
        .iter()
        .filter(|k| haystack.contains(k.as_str()))
        .count()
        .try_into()
        .unwrap_or(u32::MAX)
}
