//! Publication catalog - validated records keyed by mnemonic code
//!
//! Catalog files are loaded in configured order. Keys must be unique across
//! every file; the first invalid record anywhere aborts the whole load.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use toml::Table;

use crate::config::Configuration;
use crate::constraints::{Limits, ValueType};
use crate::error::ErrorKind;
use crate::validation::{RecordContext, RecordValidator};

#[derive(Debug, Error)]
pub enum PubError {
    #[error("publication db file not found '{file}'")]
    NotFound { file: String },

    #[error("failed to read publication db file '{file}': {source}")]
    Read {
        file: String,
        #[source]
        source: io::Error,
    },

    #[error("unreadable TOML in publication db file '{file}': {source}")]
    Unreadable {
        file: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("duplicate key '{key}' in file '{file}'")]
    DuplicateKey { key: String, file: String },

    #[error("publication '{key}' must be a table in file '{file}'")]
    NotATable { key: String, file: String },

    #[error("bad pub field keys in '{key}' (missing {missing:?}, extra {extra:?}) in '{file}'")]
    BadFields {
        key: String,
        missing: Vec<String>,
        extra: Vec<String>,
        file: String,
    },

    #[error("{field} of '{key}' must be {expected} in file '{file}'")]
    BadType {
        key: String,
        field: String,
        expected: ValueType,
        file: String,
    },

    #[error("empty title for '{key}' in file '{file}'")]
    EmptyTitle { key: String, file: String },

    #[error("bad color ('{key}', '{color}') in file '{file}'")]
    BadColor {
        key: String,
        color: String,
        file: String,
    },

    #[error("{field} outside limits {limits}: ('{key}', {value}) in file '{file}'")]
    BadDimension {
        key: String,
        field: String,
        value: i64,
        limits: Limits,
        file: String,
    },
}

impl PubError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PubError::NotFound { .. } => ErrorKind::NotFound,
            PubError::Read { .. } | PubError::Unreadable { .. } => ErrorKind::Unreadable,
            PubError::DuplicateKey { .. } => ErrorKind::DuplicateKey,
            PubError::BadFields { .. } => ErrorKind::BadSchema,
            PubError::NotATable { .. } | PubError::BadType { .. } => ErrorKind::BadType,
            PubError::EmptyTitle { .. }
            | PubError::BadColor { .. }
            | PubError::BadDimension { .. } => ErrorKind::BadValue,
        }
    }

    /// The catalog file the error is attributed to.
    pub fn file(&self) -> &str {
        match self {
            PubError::NotFound { file }
            | PubError::Read { file, .. }
            | PubError::Unreadable { file, .. }
            | PubError::DuplicateKey { file, .. }
            | PubError::NotATable { file, .. }
            | PubError::BadFields { file, .. }
            | PubError::BadType { file, .. }
            | PubError::EmptyTitle { file, .. }
            | PubError::BadColor { file, .. }
            | PubError::BadDimension { file, .. } => file,
        }
    }
}

/// Bookbinding data of one publication. Dimensions are millimeters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Publication {
    pub title: String,
    pub block_height: i64,
    pub block_width: i64,
    pub cover_height: i64,
    pub cover_width: i64,
    pub color: String,
}

/// Result of asking whether a key may be used for a new publication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum KeyAvailability {
    Available,
    Taken { title: String },
}

/// The in-memory publication database, read-only once loaded.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PublicationDirectory {
    publications: BTreeMap<String, Publication>,
}

impl PublicationDirectory {
    /// Load every catalog file named by the configuration.
    pub fn load(config: &Configuration) -> Result<Self, PubError> {
        load_publications(config.pub_db_filenames(), config)
    }

    pub fn get(&self, key: &str) -> Option<&Publication> {
        self.publications.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.publications.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.publications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.publications.is_empty()
    }

    /// Entries sorted by key.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Publication)> {
        self.publications.iter().map(|(k, p)| (k.as_str(), p))
    }

    /// Entries whose key matches a glob pattern, case-insensitively.
    pub fn search_keys(&self, pattern: &str) -> Vec<(&str, &Publication)> {
        let pattern = to_chars(pattern);
        self.iter().filter(|(key, _)| glob_match(&pattern, &to_chars(key))).collect()
    }

    /// Entries whose title matches a glob pattern, case-insensitively.
    pub fn search_titles(&self, pattern: &str) -> Vec<(&str, &Publication)> {
        let pattern = to_chars(pattern);
        self.iter()
            .filter(|(_, p)| glob_match(&pattern, &to_chars(&p.title)))
            .collect()
    }

    pub fn check_key(&self, key: &str) -> KeyAvailability {
        match self.get(key) {
            Some(p) => KeyAvailability::Taken {
                title: p.title.clone(),
            },
            None => KeyAvailability::Available,
        }
    }
}

/// Load and validate catalog files in order into one directory.
pub fn load_publications(
    filenames: &[PathBuf],
    config: &Configuration,
) -> Result<PublicationDirectory, PubError> {
    let validator = RecordValidator::new();
    let mut publications = BTreeMap::new();

    for path in filenames {
        let file = path.display().to_string();
        let document = read_catalog(path, &file)?;

        for (key, value) in &document {
            if publications.contains_key(key) {
                return Err(PubError::DuplicateKey {
                    key: key.clone(),
                    file,
                });
            }
            let ctx = RecordContext { key, file: &file };
            let publication = validator.validate(ctx, value, config)?;
            publications.insert(key.clone(), publication);
        }
    }

    Ok(PublicationDirectory { publications })
}

fn read_catalog(path: &Path, file: &str) -> Result<Table, PubError> {
    let text = fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            PubError::NotFound {
                file: file.to_string(),
            }
        } else {
            PubError::Read {
                file: file.to_string(),
                source,
            }
        }
    })?;

    toml::from_str::<Table>(&text).map_err(|source| match repeated_record_key(&text) {
        Some(key) => PubError::DuplicateKey {
            key,
            file: file.to_string(),
        },
        None => PubError::Unreadable {
            file: file.to_string(),
            source,
        },
    })
}

/// First record key that raw TOML text defines twice.
///
/// TOML rejects such a file outright; this recovers which key was repeated.
/// A record is defined by a `[key]` header or, before the first header, by a
/// root assignment `key = ...` or `key.field = ...`.
fn repeated_record_key(text: &str) -> Option<String> {
    let mut headers = HashSet::new();
    let mut assigned = HashSet::new();
    let mut at_root = true;

    for line in text.lines() {
        let line = line.trim();
        if line.starts_with("[[") {
            at_root = false;
            continue;
        }
        if let Some(header) = line.strip_prefix('[') {
            at_root = false;
            let Some((segments, rest)) = parse_key(header) else {
                continue;
            };
            if !rest.trim_start().starts_with(']') {
                continue;
            }
            if let [key] = segments.as_slice() {
                if assigned.contains(key) || !headers.insert(key.clone()) {
                    return Some(key.clone());
                }
            }
        } else if at_root {
            let Some((segments, rest)) = parse_key(line) else {
                continue;
            };
            if !rest.trim_start().starts_with('=') {
                continue;
            }
            let Some(key) = segments.first() else {
                continue;
            };
            let first = assigned.insert(key.clone());
            if segments.len() == 1 && !first {
                return Some(key.clone());
            }
        }
    }
    None
}

/// Split a leading TOML key into its dotted segments, unquoting each.
/// Returns the segments and the text after the key.
fn parse_key(text: &str) -> Option<(Vec<String>, &str)> {
    let mut segments = vec![];
    let mut rest = text.trim_start();
    loop {
        let (segment, after) = parse_key_segment(rest)?;
        segments.push(segment);
        let after = after.trim_start();
        match after.strip_prefix('.') {
            Some(next) => rest = next.trim_start(),
            None => return Some((segments, after)),
        }
    }
}

fn parse_key_segment(text: &str) -> Option<(String, &str)> {
    if let Some(quoted) = text.strip_prefix('\'') {
        let end = quoted.find('\'')?;
        return Some((quoted[..end].to_string(), &quoted[end + 1..]));
    }
    if let Some(quoted) = text.strip_prefix('"') {
        let mut segment = String::new();
        let mut chars = quoted.char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '"' => return Some((segment, &quoted[i + 1..])),
                '\\' => segment.push(chars.next()?.1),
                _ => segment.push(c),
            }
        }
        return None;
    }
    let end = text
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(text.len());
    (end > 0).then(|| (text[..end].to_string(), &text[end..]))
}

fn to_chars(s: &str) -> Vec<char> {
    s.to_uppercase().chars().collect()
}

/// Shell-style wildcard match: `*`, `?`, `[abc]`, `[a-z]`, `[!abc]`.
fn glob_match(pattern: &[char], text: &[char]) -> bool {
    match pattern.first() {
        None => text.is_empty(),
        Some('*') => {
            let rest = &pattern[1..];
            if rest.is_empty() {
                return true;
            }
            (0..=text.len()).any(|i| glob_match(rest, &text[i..]))
        }
        Some('?') => !text.is_empty() && glob_match(&pattern[1..], &text[1..]),
        Some('[') => {
            let Some(&c) = text.first() else {
                return false;
            };
            match match_class(&pattern[1..], c) {
                Some((true, used)) => glob_match(&pattern[1 + used..], &text[1..]),
                Some((false, _)) => false,
                // Unterminated class: the bracket is literal.
                None => c == '[' && glob_match(&pattern[1..], &text[1..]),
            }
        }
        Some(p) => text.first() == Some(p) && glob_match(&pattern[1..], &text[1..]),
    }
}

/// Match `c` against a bracket class whose body starts at `class`.
/// Returns the outcome and the pattern length consumed, including `]`.
fn match_class(class: &[char], c: char) -> Option<(bool, usize)> {
    let negated = class.first() == Some(&'!');
    let mut i = usize::from(negated);
    let body_start = i;
    let mut matched = false;

    while i < class.len() {
        let lo = class[i];
        if lo == ']' && i > body_start {
            return Some((matched != negated, i + 1));
        }
        if i + 2 < class.len() && class[i + 1] == '-' && class[i + 2] != ']' {
            matched |= lo <= c && c <= class[i + 2];
            i += 3;
        } else {
            matched |= lo == c;
            i += 1;
        }
    }
    None
}
