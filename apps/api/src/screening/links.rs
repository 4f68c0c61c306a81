//! Profile-link detection in free text.
//!
//! Candidates are gathered by several pattern layers (full URLs, bare domains,
//! username mentions, email-like handles, contact/project sections), then
//! normalized, validated and deduplicated per username.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use url::Url;

/// A code-hosting platform the detector knows how to recognise.
#[derive(Debug)]
pub struct Platform {
    pub name: &'static str,
    pub domain: &'static str,
    /// How the platform is written in prose ("GitHub: jdoe").
    pub label: &'static str,
    /// Short form accepted only as "git: jdoe".
    pub short_label: &'static str,
    /// First path segments that are site pages, not user profiles.
    pub reserved_paths: &'static [&'static str],
    /// Words that look like usernames after a label but never are.
    pub label_blocklist: &'static [&'static str],
    pub min_username_len: usize,
}

pub const GITHUB: Platform = Platform {
    name: "github",
    domain: "github.com",
    label: "github",
    short_label: "git",
    reserved_paths: &[
        "about",
        "account",
        "admin",
        "api",
        "apps",
        "assets",
        "blog",
        "business",
        "contact",
        "dashboard",
        "developer",
        "docs",
        "enterprise",
        "explore",
        "features",
        "gist",
        "help",
        "home",
        "join",
        "login",
        "logout",
        "marketplace",
        "new",
        "notifications",
        "organizations",
        "pricing",
        "privacy",
        "search",
        "security",
        "settings",
        "site",
        "support",
        "team",
        "terms",
        "topics",
        "trending",
        "users",
        "www",
    ],
    label_blocklist: &[
        "hub", "com", "www", "http", "https", "profile", "account", "github", "git",
    ],
    min_username_len: 3,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectedLink {
    pub url: String,
    pub platform: &'static str,
    pub username: String,
}

pub struct LinkDetector {
    platform: &'static Platform,
    url_patterns: Vec<Regex>,
    username_patterns: Vec<Regex>,
    email_pattern: Regex,
    section_patterns: Vec<Regex>,
}

static GITHUB_DETECTOR: OnceLock<LinkDetector> = OnceLock::new();

const USER: &str = "[a-z0-9._-]";

fn compile(pattern: String) -> Regex {
    // Patterns are assembled from escaped platform constants.
    Regex::new(&format!("(?i){pattern}")).expect("link pattern must compile")
}

impl LinkDetector {
    pub fn new(platform: &'static Platform) -> Self {
        let domain = regex::escape(platform.domain);
        let label = regex::escape(platform.label);
        let short = regex::escape(platform.short_label);

        let url_patterns = vec![
            compile(format!(r"\bhttps?://(?:www\.)?{domain}/{USER}+(?:/[a-z0-9._/-]*)?")),
            compile(format!(r"\b(?:www\.)?{domain}/{USER}+(?:/[a-z0-9._/-]*)?")),
        ];

        let username_patterns = vec![
            compile(format!(r"\b{label}\s*:\s*({USER}+)")),
            compile(format!(r"@({USER}+)\s*\(?\s*(?:on\s+)?{label}\s*\)?")),
            compile(format!(r"\b{label}\s+@({USER}+)")),
            compile(format!(r"\b{label}\s+(?:profile|account|handle)\s*:\s*({USER}+)")),
            compile(format!(r"(?:^|\s)({USER}{{3,}})\s+on\s+{label}(?:\s|$)")),
            compile(format!(r"\b{label}\s+(?:username|id|handle)\s*:\s*({USER}+)")),
            compile(format!(r"(?:^|\s){short}\s*:\s*({USER}{{3,}})(?:\s|$)")),
        ];

        let email_pattern = compile(format!(r"({USER}+)@{domain}\b"));

        let section_patterns = vec![
            compile(format!(r"[•·▪▫-]\s*{label}\s*[:\-]?\s*({USER}+)")),
            compile(format!(
                r"(?:source\s+code|code|repository|repo)\s*:\s*(?:https?://)?(?:www\.)?{domain}/({USER}+)"
            )),
        ];

        Self {
            platform,
            url_patterns,
            username_patterns,
            email_pattern,
            section_patterns,
        }
    }

    /// Shared detector for GitHub profile links.
    pub fn github() -> &'static LinkDetector {
        GITHUB_DETECTOR.get_or_init(|| LinkDetector::new(&GITHUB))
    }

    /// Finds every valid profile link in `text`, one per username, in first-seen order.
    /// When a user appears both bare and with a deeper path, the bare profile wins.
    pub fn detect(&self, text: &str) -> Vec<DetectedLink> {
        let flat: String = text
            .chars()
            .map(|c| if matches!(c, '\n' | '\r' | '\t') { ' ' } else { c })
            .collect();

        let mut links: Vec<DetectedLink> = Vec::new();
        let mut by_username: HashMap<String, usize> = HashMap::new();

        for candidate in self.candidates(&flat) {
            let Some(url) = self.canonicalize(&candidate) else {
                continue;
            };
            let Some(username) = self.username_of(&url) else {
                continue;
            };
            let link = DetectedLink {
                url,
                platform: self.platform.name,
                username,
            };
            let key = link.username.to_ascii_lowercase();
            match by_username.get(&key) {
                Some(&i) => {
                    if self.is_bare_profile(&link.url) && !self.is_bare_profile(&links[i].url) {
                        links[i] = link;
                    }
                }
                None => {
                    by_username.insert(key, links.len());
                    links.push(link);
                }
            }
        }
        links
    }

    fn candidates(&self, text: &str) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();

        for pattern in &self.url_patterns {
            found.extend(pattern.find_iter(text).map(|m| m.as_str().to_string()));
        }

        let mut usernames: Vec<&str> = Vec::new();
        for pattern in self
            .username_patterns
            .iter()
            .chain(std::iter::once(&self.email_pattern))
            .chain(&self.section_patterns)
        {
            usernames.extend(
                pattern
                    .captures_iter(text)
                    .filter_map(|caps| caps.get(1))
                    .map(|m| m.as_str()),
            );
        }

        found.extend(
            usernames
                .into_iter()
                .filter(|name| self.is_plausible_username(name))
                .map(|name| format!("https://{}/{}", self.platform.domain, name)),
        );
        found
    }

    fn is_plausible_username(&self, name: &str) -> bool {
        name.len() >= self.platform.min_username_len
            && !self
                .platform
                .label_blocklist
                .iter()
                .any(|blocked| blocked.eq_ignore_ascii_case(name))
    }

    /// Normalizes a link to `https://<domain>/<path>`: forces https, drops `www.`,
    /// trailing slashes and trailing punctuation. `None` when it is not on this platform.
    pub fn normalize(&self, candidate: &str) -> Option<String> {
        let trimmed = candidate
            .trim()
            .trim_end_matches(|c: char| matches!(c, '/' | '.' | ',' | ';' | ':' | ')' | '('));

        let rest = strip_prefix_ignore_case(trimmed, "https://")
            .or_else(|| strip_prefix_ignore_case(trimmed, "http://"))
            .unwrap_or(trimmed);
        let rest = strip_prefix_ignore_case(rest, "www.").unwrap_or(rest);
        let path = strip_prefix_ignore_case(rest, self.platform.domain)?.strip_prefix('/')?;
        let path = path.trim_matches('/');
        if path.is_empty() {
            return None;
        }
        Some(format!("https://{}/{}", self.platform.domain, path))
    }

    /// Rules for a profile URL: https, exact platform host, a first path segment made
    /// of letters, digits and single inner hyphens, and not a reserved site page.
    pub fn is_valid_profile_url(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        if parsed.scheme() != "https" || parsed.host_str() != Some(self.platform.domain) {
            return false;
        }
        let Some(username) = parsed.path_segments().and_then(|mut segments| segments.next())
        else {
            return false;
        };
        is_valid_username(username)
            && !self
                .platform
                .reserved_paths
                .contains(&username.to_lowercase().as_str())
    }

    /// Normalize then validate.
    pub fn canonicalize(&self, candidate: &str) -> Option<String> {
        self.normalize(candidate)
            .filter(|url| self.is_valid_profile_url(url))
    }

    fn profile_path<'a>(&self, url: &'a str) -> Option<&'a str> {
        url.strip_prefix("https://")?
            .strip_prefix(self.platform.domain)?
            .strip_prefix('/')
    }

    fn username_of(&self, url: &str) -> Option<String> {
        self.profile_path(url)
            .and_then(|path| path.split('/').next())
            .map(str::to_string)
    }

    fn is_bare_profile(&self, url: &str) -> bool {
        self.profile_path(url)
            .map(|path| !path.contains('/'))
            .unwrap_or(false)
    }
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        text.get(prefix.len()..)
    } else {
        None
    }
}

fn is_valid_username(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('-')
        && !name.ends_with('-')
        && !name.contains("--")
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}
