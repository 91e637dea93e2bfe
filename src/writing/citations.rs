//! Author-year citation recognition shared by the section writer, the
//! citation auditor and chapter assembly.
//!
//! Recognized tokens:
//! - parenthetical groups: `(Smith, 2022)`, `(Smith et al., 2022)`,
//!   `(Nguyen & Tran, 2019)`, `(Nguyen and Tran, 2019)` and `;`-separated
//!   lists of those, e.g. `(Smith, 2022; Nguyen, 2019)`
//! - narrative references: `Nguyen (2019)`, `Nguyen and Tran (2019)`
//! - either form wrapped in a Markdown link: `[(Smith, 2022)](url)`

use crate::error::ApiError;
use crate::evidence::{surname_of, EvidenceItem};
use regex::{Match, Regex};

/// `Surname`, `Surname et al.`, `Surname & Other` or `Surname and Other`
const AUTHORS: &str = r"\p{Lu}[\p{L}'\-]+(?:\s+et\s+al\.?|\s+(?:&|and)\s+\p{Lu}[\p{L}'\-]+)?";
const LINK: &str = r"(?:\]\([^)\s]*\))?";

/// One entry of a token. Group 1 is the lead surname, group 2 the year.
const WORK: &str =
    r"^\[?(\p{Lu}[\p{L}'\-]+)(?:\s+et\s+al\.?|\s+(?:&|and)\s+\p{Lu}[\p{L}'\-]+)?,?\s+\(?(\d{4})";

fn token_pattern() -> String {
    let entry = format!(r"{authors},?\s+\d{{4}}[a-z]?", authors = AUTHORS);
    format!(
        r"\[?\({entry}(?:;\s*{entry})*\){link}|\[?\b{authors}\s+\(\d{{4}}[a-z]?\){link}",
        entry = entry,
        authors = AUTHORS,
        link = LINK,
    )
}

/// One cited work inside a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitedWork {
    /// The entry as written, e.g. `Nguyen & Tran, 2019`
    pub text: String,
    pub surname: String,
    pub year: String,
}

#[derive(Debug, Clone)]
pub struct CitationToken<'t> {
    /// Full matched text, link wrapper included
    pub text: &'t str,
    pub linked: bool,
    pub narrative: bool,
    pub works: Vec<CitedWork>,
}

#[derive(Debug, Clone)]
pub struct CitationScanner {
    token: Regex,
    work: Regex,
}

impl CitationScanner {
    pub fn new() -> Result<Self, ApiError> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| ApiError::ConfigError(format!("Invalid citation pattern: {}", e)))
        };
        Ok(Self {
            token: compile(&token_pattern())?,
            work: compile(WORK)?,
        })
    }

    /// Every citation token in `text`, in order.
    pub fn tokens<'t>(&self, text: &'t str) -> Vec<CitationToken<'t>> {
        self.token.find_iter(text).map(|m| self.parse(m)).collect()
    }

    /// Rebuild `text`, passing each token to `replace`. `Some` substitutes
    /// the returned text; `None` drops the token and the spacing around it.
    /// Text outside tokens is copied unchanged.
    pub fn rewrite<F>(&self, text: &str, mut replace: F) -> String
    where
        F: FnMut(&CitationToken<'_>) -> Option<String>,
    {
        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;
        for m in self.token.find_iter(text) {
            out.push_str(&text[cursor..m.start()]);
            cursor = m.end();
            if let Some(replacement) = replace(&self.parse(m)) {
                out.push_str(&replacement);
                continue;
            }

            let kept = out.trim_end_matches(' ').len();
            let had_gap = kept < out.len();
            out.truncate(kept);
            let rest = &text[cursor..];
            if out.is_empty() || out.ends_with('\n') {
                cursor += rest.len() - rest.trim_start_matches(' ').len();
            } else if had_gap && rest.starts_with(|c: char| c.is_alphanumeric() || c == '(' || c == '[') {
                out.push(' ');
            }
        }
        out.push_str(&text[cursor..]);
        out
    }

    fn parse<'t>(&self, m: Match<'t>) -> CitationToken<'t> {
        let text = m.as_str();
        let unwrapped = text.strip_prefix('[').unwrap_or(text);
        let (core, linked) = match unwrapped.find("](") {
            Some(end) => (&unwrapped[..end], true),
            None => (unwrapped, false),
        };
        let narrative = !core.starts_with('(');
        let entries: Vec<&str> = if narrative {
            vec![core]
        } else {
            core.trim_start_matches('(')
                .trim_end_matches(')')
                .split(';')
                .map(str::trim)
                .collect()
        };
        let works = entries
            .into_iter()
            .filter_map(|entry| {
                self.work.captures(entry).map(|caps| CitedWork {
                    text: entry.to_string(),
                    surname: caps[1].to_string(),
                    year: caps[2].to_string(),
                })
            })
            .collect();
        CitationToken {
            text,
            linked,
            narrative,
            works,
        }
    }
}

/// Item whose author list contains `surname` and whose year is `year`.
pub fn find_cited<'a>(evidence: &'a [EvidenceItem], surname: &str, year: &str) -> Option<&'a EvidenceItem> {
    let year: i32 = year.parse().ok()?;
    let surname = surname.to_lowercase();
    evidence.iter().find(|item| {
        item.year == year
            && item
                .authors
                .iter()
                .filter_map(|a| surname_of(a))
                .any(|s| s.to_lowercase() == surname)
    })
}
