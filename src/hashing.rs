//! Build records - SHA-256 fingerprints of a booklet build
//!
//! Derivation is a pure function of the catalog, the layout and the booklet
//! definition. A build record fingerprints each of them so two builds can be
//! compared without diffing markup.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt::Write;

use crate::publication::PublicationDirectory;
use crate::ticket::DerivedBooklet;
use crate::ENGINE_VERSION;

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    Sha256::digest(data)
        .iter()
        .fold(String::with_capacity(64), |mut out, b| {
            let _ = write!(out, "{b:02x}");
            out
        })
}

/// Every derived type serializes with a fixed field order and the catalog is
/// a `BTreeMap`, so plain JSON is already canonical.
fn json_digest<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    Ok(sha256_hex(&serde_json::to_vec(value)?))
}

/// Digest of the derived booklet structure: layout, pages and cut sizes.
pub fn booklet_digest(booklet: &DerivedBooklet) -> Result<String, serde_json::Error> {
    json_digest(booklet)
}

/// Digest of every validated publication, in key order.
pub fn catalog_digest(directory: &PublicationDirectory) -> Result<String, serde_json::Error> {
    json_digest(directory)
}

/// Digest of rendered markup.
pub fn markup_digest(markup: &str) -> String {
    sha256_hex(markup.as_bytes())
}

/// Summary of one written booklet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildRecord {
    pub filename: String,
    pub pages: usize,
    pub tickets: usize,
    pub publications: usize,
    pub catalog_digest: String,
    pub booklet_digest: String,
    pub markup_digest: String,
    pub engine_version: &'static str,
    pub generated_at: DateTime<Utc>,
}

impl BuildRecord {
    pub fn new(
        directory: &PublicationDirectory,
        booklet: &DerivedBooklet,
        markup: &str,
        generated_at: DateTime<Utc>,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            filename: booklet.filename.clone(),
            pages: booklet.pages.len(),
            tickets: booklet.ticket_count(),
            publications: directory.len(),
            catalog_digest: catalog_digest(directory)?,
            booklet_digest: booklet_digest(booklet)?,
            markup_digest: markup_digest(markup),
            engine_version: ENGINE_VERSION,
            generated_at,
        })
    }

    /// Whether two builds produced the same output from the same inputs,
    /// ignoring when they ran.
    pub fn same_output(&self, other: &BuildRecord) -> bool {
        self.catalog_digest == other.catalog_digest
            && self.booklet_digest == other.booklet_digest
            && self.markup_digest == other.markup_digest
    }
}
