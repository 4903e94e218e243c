//! Error taxonomy shared by every validation stage.
//!
//! Each stage has its own error enum carrying the offending value and file.
//! `ErrorKind` is the coarse classification those enums report through `kind()`.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::config::ConfigError;
use crate::publication::PubError;
use crate::ticket::TicketError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A required file is absent.
    NotFound,
    /// A file exists but cannot be read or parsed as TOML.
    Unreadable,
    /// Missing or unexpected keys in a table.
    BadSchema,
    /// A value of the wrong primitive type.
    BadType,
    /// A value of the right type outside its domain constraints.
    BadValue,
    /// A publication key defined more than once across catalog files.
    DuplicateKey,
    /// A ticket names a publication absent from the directory.
    UnknownPublicationKey,
    /// A booklet page names a ticket that is not defined.
    UnknownTicket,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Unreadable => "unreadable",
            ErrorKind::BadSchema => "bad_schema",
            ErrorKind::BadType => "bad_type",
            ErrorKind::BadValue => "bad_value",
            ErrorKind::DuplicateKey => "duplicate_key",
            ErrorKind::UnknownPublicationKey => "unknown_publication_key",
            ErrorKind::UnknownTicket => "unknown_ticket",
        };
        f.write_str(name)
    }
}

/// Top-level error for callers driving the whole pipeline.
#[derive(Debug, Error)]
pub enum BookyError {
    #[error("ConfigError... {0}")]
    Config(#[from] ConfigError),

    #[error("PubError... {0}")]
    Publication(#[from] PubError),

    #[error("TicketError... {0}")]
    Ticket(#[from] TicketError),

    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BookyError {
    /// Classification of validation failures; output failures have none.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            BookyError::Config(e) => Some(e.kind()),
            BookyError::Publication(e) => Some(e.kind()),
            BookyError::Ticket(e) => Some(e.kind()),
            BookyError::Write { .. } | BookyError::Serialization(_) => None,
        }
    }
}
