//! Booky Core - Bookbinding Ticket Engine
//!
//! # Pipeline
//! 1. Configuration is validated once and passed explicitly
//! 2. Catalog files are validated against it into a read-only directory
//! 3. Tickets are derived from the directory, never from raw records
//! 4. Derived booklets render to LaTeX markup
//!
//! Every stage is fail-fast: the first violation is returned as a typed
//! error and no partially valid value escapes.

pub mod constraints;
pub mod config;
pub mod validation;
pub mod publication;
pub mod ticket;
pub mod print;
pub mod hashing;
pub mod error;

pub use constraints::{check_ordered_pair, ConstraintError, Limits, ValueType};
pub use config::{
    ConfigError, Configuration, PubValidation, TicketLayout, CONFIG_FILENAME, FIELD_KEYS,
};
pub use validation::{PublicationRule, RecordContext, RecordValidator};
pub use publication::{
    load_publications, KeyAvailability, PubError, Publication, PublicationDirectory,
};
pub use ticket::{
    derive_booklet, derive_ticket, BookletDefinition, DerivedBooklet, DerivedTicket, DerivedVolume,
    Dimensions, TicketDefinition, TicketError, Volume,
};
pub use print::render_booklet;
pub use hashing::{booklet_digest, catalog_digest, markup_digest, BuildRecord};
pub use error::{BookyError, ErrorKind};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
