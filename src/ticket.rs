//! Tickets and booklets - derived bookbinding dimensions
//!
//! A ticket definition names a publication and the volumes to bind with it.
//! Deriving a ticket resolves the publication and computes the cut sizes of
//! every component from the cover size and the volume thickness.

use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;
use toml::{Table, Value};

use crate::config::{Configuration, TicketLayout};
use crate::constraints::{check_type, extra_keys, missing_keys, ValueType};
use crate::error::ErrorKind;
use crate::publication::{Publication, PublicationDirectory};

/// Paper is cut this much taller than the cover.
pub const PAPER_HEIGHT_ALLOWANCE: i64 = 30;
/// Paper width is thickness + this + both cover widths.
pub const PAPER_WIDTH_ALLOWANCE: i64 = 50;
pub const BUCKRAM_HEIGHT_ALLOWANCE: i64 = 40;
pub const BUCKRAM_WIDTH_ALLOWANCE: i64 = 100;

const TICKET: &str = "ticket";
const BOOKLET: &str = "booklet";
const PUB_KEY: &str = "pub-key";
const VOLUMES: &str = "volumes";
const FILENAME: &str = "filename";
const PAGES: &str = "pages";
const TOPLEVEL: &str = "toplevel";

#[derive(Debug, Error)]
pub enum TicketError {
    #[error("booklet file not found '{file}'")]
    NotFound { file: String },

    #[error("failed to read booklet file '{file}': {source}")]
    Read {
        file: String,
        #[source]
        source: io::Error,
    },

    #[error("unreadable TOML in booklet file '{file}': {source}")]
    Unreadable {
        file: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("missing {table} keys {keys:?} in file '{file}'")]
    MissingKeys {
        table: String,
        keys: Vec<String>,
        file: String,
    },

    #[error("extra {table} keys {keys:?} in file '{file}'")]
    ExtraKeys {
        table: String,
        keys: Vec<String>,
        file: String,
    },

    #[error("{table} key '{key}' must be {expected} in file '{file}'")]
    BadType {
        table: String,
        key: String,
        expected: ValueType,
        file: String,
    },

    #[error("volume {index} of ticket '{ticket}' must be [label, thickness] in file '{file}'")]
    BadVolume {
        ticket: String,
        index: usize,
        file: String,
    },

    #[error("volume '{label}' of '{ticket}' has non-positive thickness {thickness} in '{file}'")]
    BadThickness {
        ticket: String,
        label: String,
        thickness: i64,
        file: String,
    },

    #[error("page {page} names undefined ticket '{ticket}' in file '{file}'")]
    UnknownTicket {
        ticket: String,
        page: usize,
        file: String,
    },

    #[error("cut sizes of volume '{label}' of '{key}' are too large")]
    SizeOverflow { key: String, label: String },

    #[error("unknown publication key '{0}'")]
    UnknownPublicationKey(String),
}

impl TicketError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TicketError::NotFound { .. } => ErrorKind::NotFound,
            TicketError::Read { .. } | TicketError::Unreadable { .. } => ErrorKind::Unreadable,
            TicketError::MissingKeys { .. } | TicketError::ExtraKeys { .. } => ErrorKind::BadSchema,
            TicketError::BadType { .. } | TicketError::BadVolume { .. } => ErrorKind::BadType,
            TicketError::BadThickness { .. } | TicketError::SizeOverflow { .. } => {
                ErrorKind::BadValue
            }
            TicketError::UnknownTicket { .. } => ErrorKind::UnknownTicket,
            TicketError::UnknownPublicationKey(_) => ErrorKind::UnknownPublicationKey,
        }
    }
}

/// One labeled grouping of issues, characterized by its spine thickness (mm).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Volume {
    pub label: String,
    pub thickness: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketDefinition {
    #[serde(rename = "pub-key")]
    pub publication_key: String,
    pub volumes: Vec<Volume>,
}

/// Pages of tickets in print order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookletDefinition {
    pub filename: String,
    pub pages: Vec<Vec<TicketDefinition>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dimensions {
    pub height: i64,
    pub width: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DerivedVolume {
    pub label: String,
    pub thickness: i64,
    pub cardboard: Dimensions,
    pub paper: Dimensions,
    pub buckram: Dimensions,
    pub backcard: Dimensions,
}

impl DerivedVolume {
    /// Cut sizes for one volume, or `None` if a size does not fit in `i64`.
    pub fn derive(volume: &Volume, publication: &Publication) -> Option<Self> {
        let ch = publication.cover_height;
        let cw = publication.cover_width;
        let t = volume.thickness;
        Some(Self {
            label: volume.label.clone(),
            thickness: t,
            cardboard: Dimensions { height: ch, width: cw },
            paper: Dimensions {
                height: ch.checked_add(PAPER_HEIGHT_ALLOWANCE)?,
                width: cw
                    .checked_mul(2)?
                    .checked_add(t)?
                    .checked_add(PAPER_WIDTH_ALLOWANCE)?,
            },
            buckram: Dimensions {
                height: ch.checked_add(BUCKRAM_HEIGHT_ALLOWANCE)?,
                width: t.checked_add(BUCKRAM_WIDTH_ALLOWANCE)?,
            },
            backcard: Dimensions { height: ch, width: t },
        })
    }
}

/// The layout values a single ticket table needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct TicketStyle {
    pub label_width: i64,
    pub volume_separation: i64,
    pub vertical_stretch: f64,
    pub title_width: i64,
    pub title_styling: String,
    pub ticket_spacing: i64,
    pub cardboard_label: String,
    pub paper_label: String,
    pub buckram_label: String,
    pub backcard_label: String,
}

impl From<&TicketLayout> for TicketStyle {
    fn from(layout: &TicketLayout) -> Self {
        Self {
            label_width: layout.label_width,
            volume_separation: layout.volume_separation,
            vertical_stretch: layout.vertical_stretch,
            title_width: layout.title_width,
            title_styling: layout.title_styling.clone(),
            ticket_spacing: layout.ticket_spacing,
            cardboard_label: layout.cardboard_label.clone(),
            paper_label: layout.paper_label.clone(),
            buckram_label: layout.buckram_label.clone(),
            backcard_label: layout.backcard_label.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedTicket {
    #[serde(rename = "pub-key")]
    pub publication_key: String,
    pub title: String,
    pub color: String,
    pub volumes: Vec<DerivedVolume>,
    pub style: TicketStyle,
}

/// Page-wide layout of a booklet document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PageLayout {
    pub left_margin: i64,
    pub right_margin: i64,
    pub upper_margin: i64,
    pub lower_margin: i64,
    pub font_size: i64,
    pub vertical_stretch: f64,
    pub ticket_spacing: i64,
}

impl From<&TicketLayout> for PageLayout {
    fn from(layout: &TicketLayout) -> Self {
        Self {
            left_margin: layout.left_margin,
            right_margin: layout.right_margin,
            upper_margin: layout.upper_margin,
            lower_margin: layout.lower_margin,
            font_size: layout.font_size,
            vertical_stretch: layout.vertical_stretch,
            ticket_spacing: layout.ticket_spacing,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedBooklet {
    pub filename: String,
    pub layout: PageLayout,
    pub pages: Vec<Vec<DerivedTicket>>,
}

impl DerivedBooklet {
    pub fn ticket_count(&self) -> usize {
        self.pages.iter().map(Vec::len).sum()
    }
}

/// Resolve the publication and compute every volume, in the given order.
pub fn derive_ticket(
    directory: &PublicationDirectory,
    config: &Configuration,
    definition: &TicketDefinition,
) -> Result<DerivedTicket, TicketError> {
    let publication = directory
        .get(&definition.publication_key)
        .ok_or_else(|| TicketError::UnknownPublicationKey(definition.publication_key.clone()))?;

    Ok(DerivedTicket {
        publication_key: definition.publication_key.clone(),
        title: publication.title.clone(),
        color: publication.color.clone(),
        volumes: definition
            .volumes
            .iter()
            .map(|v| {
                DerivedVolume::derive(v, publication).ok_or_else(|| TicketError::SizeOverflow {
                    key: definition.publication_key.clone(),
                    label: v.label.clone(),
                })
            })
            .collect::<Result<_, _>>()?,
        style: TicketStyle::from(config.ticket_layout()),
    })
}

/// Derive every ticket on every page; pages and tickets map one to one.
pub fn derive_booklet(
    directory: &PublicationDirectory,
    config: &Configuration,
    definition: &BookletDefinition,
) -> Result<DerivedBooklet, TicketError> {
    let pages = definition
        .pages
        .iter()
        .map(|page| {
            page.iter()
                .map(|ticket| derive_ticket(directory, config, ticket))
                .collect::<Result<Vec<_>, _>>()
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DerivedBooklet {
        filename: definition.filename.clone(),
        layout: PageLayout::from(config.ticket_layout()),
        pages,
    })
}

impl BookletDefinition {
    /// Read and validate a booklet file.
    pub fn load(path: &Path) -> Result<Self, TicketError> {
        let file = path.display().to_string();
        let text = fs::read_to_string(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                TicketError::NotFound { file: file.clone() }
            } else {
                TicketError::Read {
                    file: file.clone(),
                    source,
                }
            }
        })?;
        Self::parse(&text, &file)
    }

    /// Parse a booklet document: a `[ticket]` table of definitions and a
    /// `[booklet]` table listing ticket ids page by page.
    pub fn parse(text: &str, file: &str) -> Result<Self, TicketError> {
        let document: Table = toml::from_str(text).map_err(|source| TicketError::Unreadable {
            file: file.to_string(),
            source,
        })?;
        let reader = Reader { file };

        reader.exact_keys(&document, &[TICKET, BOOKLET], TOPLEVEL)?;
        let tickets = reader.table(&document, TICKET, TOPLEVEL)?;
        let booklet = reader.table(&document, BOOKLET, TOPLEVEL)?;

        let mut definitions = HashMap::with_capacity(tickets.len());
        for (id, value) in tickets {
            definitions.insert(id.as_str(), reader.ticket(id, value)?);
        }

        reader.exact_keys(booklet, &[FILENAME, PAGES], BOOKLET)?;
        reader.expect(booklet, FILENAME, ValueType::String, BOOKLET)?;
        let filename = booklet
            .get(FILENAME)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let page_values = booklet
            .get(PAGES)
            .and_then(Value::as_array)
            .ok_or_else(|| reader.bad_type(BOOKLET, PAGES, ValueType::Array))?;

        let mut pages = Vec::with_capacity(page_values.len());
        for (index, page) in page_values.iter().enumerate() {
            if !check_type(page, ValueType::StringArray) {
                let key = format!("{}[{}]", PAGES, index);
                return Err(reader.bad_type(BOOKLET, &key, ValueType::StringArray));
            }
            let ids = page.as_array().map(Vec::as_slice).unwrap_or_default();
            let mut tickets = Vec::with_capacity(ids.len());
            for id in ids.iter().filter_map(Value::as_str) {
                let definition = definitions.get(id).ok_or_else(|| TicketError::UnknownTicket {
                    ticket: id.to_string(),
                    page: index + 1,
                    file: file.to_string(),
                })?;
                tickets.push(definition.clone());
            }
            pages.push(tickets);
        }

        Ok(Self { filename, pages })
    }
}

/// Schema checks for one booklet document, attributing errors to its file.
struct Reader<'a> {
    file: &'a str,
}

impl Reader<'_> {
    fn exact_keys(&self, table: &Table, required: &[&str], name: &str) -> Result<(), TicketError> {
        let missing = missing_keys(required, table.keys());
        if !missing.is_empty() {
            return Err(TicketError::MissingKeys {
                table: name.to_string(),
                keys: missing,
                file: self.file.to_string(),
            });
        }
        let extra = extra_keys(required, table.keys());
        if !extra.is_empty() {
            return Err(TicketError::ExtraKeys {
                table: name.to_string(),
                keys: extra,
                file: self.file.to_string(),
            });
        }
        Ok(())
    }

    fn table<'t>(&self, table: &'t Table, key: &str, name: &str) -> Result<&'t Table, TicketError> {
        table
            .get(key)
            .and_then(Value::as_table)
            .ok_or_else(|| self.bad_type(name, key, ValueType::Table))
    }

    fn expect(
        &self,
        table: &Table,
        key: &str,
        ty: ValueType,
        name: &str,
    ) -> Result<(), TicketError> {
        match table.get(key) {
            Some(v) if check_type(v, ty) => Ok(()),
            _ => Err(self.bad_type(name, key, ty)),
        }
    }

    fn bad_type(&self, table: &str, key: &str, expected: ValueType) -> TicketError {
        TicketError::BadType {
            table: table.to_string(),
            key: key.to_string(),
            expected,
            file: self.file.to_string(),
        }
    }

    fn ticket(&self, id: &str, value: &Value) -> Result<TicketDefinition, TicketError> {
        let name = format!("{}.{}", TICKET, id);
        let fields = value
            .as_table()
            .ok_or_else(|| self.bad_type(TICKET, id, ValueType::Table))?;
        self.exact_keys(fields, &[PUB_KEY, VOLUMES], &name)?;
        self.expect(fields, PUB_KEY, ValueType::String, &name)?;

        let publication_key = fields
            .get(PUB_KEY)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let entries = fields
            .get(VOLUMES)
            .and_then(Value::as_array)
            .ok_or_else(|| self.bad_type(&name, VOLUMES, ValueType::Array))?;

        let mut volumes = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            let bad_volume = || TicketError::BadVolume {
                ticket: id.to_string(),
                index,
                file: self.file.to_string(),
            };
            let (label, thickness) = match entry.as_array().map(Vec::as_slice) {
                Some([Value::String(label), Value::Integer(thickness)]) => (label, *thickness),
                _ => return Err(bad_volume()),
            };
            if thickness <= 0 {
                return Err(TicketError::BadThickness {
                    ticket: id.to_string(),
                    label: label.clone(),
                    thickness,
                    file: self.file.to_string(),
                });
            }
            volumes.push(Volume {
                label: label.clone(),
                thickness,
            });
        }

        Ok(TicketDefinition {
            publication_key,
            volumes,
        })
    }
}
