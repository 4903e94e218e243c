//! Configuration Validator - the fixed schema of configure.toml
//!
//! Validation runs in stages and stops at the first failing one:
//! structural checks (key sets, value types) come before semantic checks
//! (files exist, colors, limits), so the first error reported is always the
//! most fundamental one.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use toml::{Table, Value};

use crate::constraints::{
    check_fixed_length, check_membership, check_ordered_pair, check_type, duplicates, extra_keys,
    missing_keys, ConstraintError, Limits, ValueType,
};
use crate::error::ErrorKind;

pub const CONFIG_FILENAME: &str = "configure.toml";

/// Fields every publication record must carry, no more and no less.
pub const FIELD_KEYS: [&str; 6] = [
    "title",
    "block-height",
    "block-width",
    "cover-height",
    "cover-width",
    "color",
];

pub const COLOR_LENGTH: usize = 3;

const PUB_DB_FILENAMES: &str = "pub-db-filenames";
const PUB_DB_FILENAME: &str = "pub-db-filename";
const VALIDATION: &str = "validation";
const PUB_VALIDATION: &str = "pub-validation";
const TICKET_LAYOUT: &str = "ticket-layout";
const PUB_FIELDS: &str = "pub-fields";
const TOPLEVEL: &str = "toplevel";

const COLORS: &str = "colors";
const BLOCK_LIMITS: &str = "block-limits";
const COVER_LIMITS: &str = "cover-limits";
const VALIDATION_KEYS: [&str; 3] = [COLORS, BLOCK_LIMITS, COVER_LIMITS];

const LAYOUT_KEYS: [(&str, ValueType); 15] = [
    ("left-margin", ValueType::Integer),
    ("right-margin", ValueType::Integer),
    ("upper-margin", ValueType::Integer),
    ("lower-margin", ValueType::Integer),
    ("font-size", ValueType::Integer),
    ("vertical-stretch", ValueType::Number),
    ("title-width", ValueType::Integer),
    ("title-styling", ValueType::String),
    ("label-width", ValueType::Integer),
    ("volume-separation", ValueType::Integer),
    ("ticket-spacing", ValueType::Integer),
    ("cardboard-label", ValueType::String),
    ("paper-label", ValueType::String),
    ("buckram-label", ValueType::String),
    ("backcard-label", ValueType::String),
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: String },

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("unreadable TOML in config file {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("missing {table} keys {keys:?} in file {path}")]
    MissingKeys {
        table: String,
        keys: Vec<String>,
        path: String,
    },

    #[error("extra {table} keys {keys:?} in file {path}")]
    ExtraKeys {
        table: String,
        keys: Vec<String>,
        path: String,
    },

    #[error("{table} key '{key}' must be {expected} in file {path}")]
    BadType {
        table: String,
        key: String,
        expected: ValueType,
        path: String,
    },

    #[error("ticket layout in file {path} could not be read: {source}")]
    BadLayout {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("pub-fields in file {path} must be exactly {expected:?}, given: {found:?}")]
    BadFieldKeys {
        found: Vec<String>,
        expected: Vec<String>,
        path: String,
    },

    #[error("no publication db files named in file {path}")]
    NoPublicationFiles { path: String },

    #[error("pub db file doesn't exist: '{file}' named in file {path}")]
    MissingPublicationFile { file: String, path: String },

    #[error("bad color values {colors:?} in file {path}: colors must be exactly 3 characters")]
    BadColors { colors: Vec<String>, path: String },

    #[error("bad limits in file {path}: {source}")]
    BadLimits {
        path: String,
        #[source]
        source: ConstraintError,
    },

    #[error("colors must be unique: duplicates {colors:?} in file {path}")]
    DuplicateColors { colors: Vec<String>, path: String },

    #[error("vertical-stretch must be a positive finite number, given {value} in file {path}")]
    BadStretch { value: f64, path: String },
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConfigError::NotFound { .. } | ConfigError::MissingPublicationFile { .. } => {
                ErrorKind::NotFound
            }
            ConfigError::Read { .. } | ConfigError::Unreadable { .. } => ErrorKind::Unreadable,
            ConfigError::MissingKeys { .. } | ConfigError::ExtraKeys { .. } => ErrorKind::BadSchema,
            ConfigError::BadType { .. } | ConfigError::BadLayout { .. } => ErrorKind::BadType,
            ConfigError::BadFieldKeys { .. }
            | ConfigError::NoPublicationFiles { .. }
            | ConfigError::BadColors { .. }
            | ConfigError::BadLimits { .. }
            | ConfigError::DuplicateColors { .. }
            | ConfigError::BadStretch { .. } => ErrorKind::BadValue,
        }
    }
}

/// Constraints on publication bookbinding data.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PubValidation {
    colors: Vec<String>,
    block_limits: Limits,
    cover_limits: Limits,
}

impl PubValidation {
    pub fn colors(&self) -> &[String] {
        &self.colors
    }

    pub fn block_limits(&self) -> Limits {
        self.block_limits
    }

    pub fn cover_limits(&self) -> Limits {
        self.cover_limits
    }

    pub fn good_color(&self, color: &str) -> bool {
        check_membership(color, &self.colors)
    }

    pub fn good_block(&self, dimension: i64) -> bool {
        self.block_limits.contains(dimension)
    }

    pub fn good_cover(&self, dimension: i64) -> bool {
        self.cover_limits.contains(dimension)
    }
}

/// Typographic parameters for ticket and booklet markup.
/// Margins, widths and spacings are millimeters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct TicketLayout {
    pub left_margin: i64,
    pub right_margin: i64,
    pub upper_margin: i64,
    pub lower_margin: i64,
    pub font_size: i64,
    pub vertical_stretch: f64,
    pub title_width: i64,
    pub title_styling: String,
    pub label_width: i64,
    pub volume_separation: i64,
    pub ticket_spacing: i64,
    pub cardboard_label: String,
    pub paper_label: String,
    pub buckram_label: String,
    pub backcard_label: String,
}

/// A validated configuration snapshot.
///
/// Fields are private: the only way to obtain one is through `load` or
/// `parse`, so holding a `Configuration` means holding a valid one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Configuration {
    config_filename: PathBuf,
    pub_db_filenames: Vec<PathBuf>,
    pub_fields: Vec<String>,
    validation: PubValidation,
    ticket_layout: TicketLayout,
}

impl Configuration {
    /// Read and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                ConfigError::NotFound {
                    path: display_path(path),
                }
            } else {
                ConfigError::Read {
                    path: display_path(path),
                    source,
                }
            }
        })?;
        Self::parse(&text, path)
    }

    /// Validate configuration text as if it had been read from `config_path`.
    ///
    /// Relative publication file names resolve against the directory of
    /// `config_path`.
    pub fn parse(text: &str, config_path: &Path) -> Result<Self, ConfigError> {
        let path = display_path(config_path);
        let document: Table =
            toml::from_str(text).map_err(|source| ConfigError::Unreadable {
                path: path.clone(),
                source,
            })?;

        // Structure: key sets, then value types.
        let names = check_toplevel(&document, &path)?;

        let validation = sub_table(&document, names.validation, &path)?;
        check_exact_keys(validation, &VALIDATION_KEYS, names.validation, &path)?;

        let layout = sub_table(&document, TICKET_LAYOUT, &path)?;
        let layout_names: Vec<&str> = LAYOUT_KEYS.iter().map(|(key, _)| *key).collect();
        check_exact_keys(layout, &layout_names, TICKET_LAYOUT, &path)?;
        for (key, ty) in LAYOUT_KEYS {
            expect_type(layout, key, ty, TICKET_LAYOUT, &path)?;
        }

        let filenames = if names.filenames == PUB_DB_FILENAME {
            expect_type(&document, PUB_DB_FILENAME, ValueType::String, TOPLEVEL, &path)?;
            string_list(&document, PUB_DB_FILENAME)
        } else {
            expect_type(&document, PUB_DB_FILENAMES, ValueType::StringArray, TOPLEVEL, &path)?;
            string_list(&document, PUB_DB_FILENAMES)
        };
        expect_type(validation, COLORS, ValueType::StringArray, names.validation, &path)?;
        expect_type(validation, BLOCK_LIMITS, ValueType::IntegerArray, names.validation, &path)?;
        expect_type(validation, COVER_LIMITS, ValueType::IntegerArray, names.validation, &path)?;

        let pub_fields = match document.get(PUB_FIELDS) {
            Some(_) => {
                expect_type(&document, PUB_FIELDS, ValueType::StringArray, TOPLEVEL, &path)?;
                let found = string_list(&document, PUB_FIELDS);
                let missing = missing_keys(&FIELD_KEYS, &found);
                let extra = extra_keys(&FIELD_KEYS, &found);
                if !missing.is_empty() || !extra.is_empty() || found.len() != FIELD_KEYS.len() {
                    return Err(ConfigError::BadFieldKeys {
                        found,
                        expected: FIELD_KEYS.iter().map(|k| k.to_string()).collect(),
                        path,
                    });
                }
                found
            }
            None => FIELD_KEYS.iter().map(|k| k.to_string()).collect(),
        };

        // Cross-file: publication files exist. Contents are read later.
        if filenames.is_empty() {
            return Err(ConfigError::NoPublicationFiles { path });
        }
        let base_dir = config_path.parent().unwrap_or_else(|| Path::new(""));
        let mut pub_db_filenames = Vec::with_capacity(filenames.len());
        for filename in &filenames {
            let resolved = base_dir.join(filename);
            if !resolved.is_file() {
                return Err(ConfigError::MissingPublicationFile {
                    file: filename.clone(),
                    path,
                });
            }
            pub_db_filenames.push(resolved);
        }

        // Semantics: colors, limits, uniqueness.
        let colors = string_list(validation, COLORS);
        let bad_colors: Vec<String> = colors
            .iter()
            .filter(|c| !check_fixed_length(c, COLOR_LENGTH))
            .cloned()
            .collect();
        if !bad_colors.is_empty() {
            return Err(ConfigError::BadColors {
                colors: bad_colors,
                path,
            });
        }

        let block_limits = check_ordered_pair(&integer_list(validation, BLOCK_LIMITS), BLOCK_LIMITS)
            .map_err(|source| ConfigError::BadLimits {
                path: path.clone(),
                source,
            })?;
        let cover_limits = check_ordered_pair(&integer_list(validation, COVER_LIMITS), COVER_LIMITS)
            .map_err(|source| ConfigError::BadLimits {
                path: path.clone(),
                source,
            })?;

        let repeated = duplicates(&colors);
        if !repeated.is_empty() {
            return Err(ConfigError::DuplicateColors {
                colors: repeated,
                path,
            });
        }

        let ticket_layout: TicketLayout = Value::Table(layout.clone())
            .try_into()
            .map_err(|source| ConfigError::BadLayout {
                path: path.clone(),
                source,
            })?;
        let stretch = ticket_layout.vertical_stretch;
        if !(stretch.is_finite() && stretch > 0.0) {
            return Err(ConfigError::BadStretch {
                value: stretch,
                path,
            });
        }

        Ok(Self {
            config_filename: config_path.to_path_buf(),
            pub_db_filenames,
            pub_fields,
            validation: PubValidation {
                colors,
                block_limits,
                cover_limits,
            },
            ticket_layout,
        })
    }

    pub fn config_filename(&self) -> &Path {
        &self.config_filename
    }

    /// Publication catalog files, resolved, in configured order.
    pub fn pub_db_filenames(&self) -> &[PathBuf] {
        &self.pub_db_filenames
    }

    pub fn field_keys(&self) -> &[String] {
        &self.pub_fields
    }

    pub fn validation(&self) -> &PubValidation {
        &self.validation
    }

    pub fn ticket_layout(&self) -> &TicketLayout {
        &self.ticket_layout
    }
}

/// Which spelling of each aliased top-level key the document uses.
struct ToplevelNames {
    filenames: &'static str,
    validation: &'static str,
}

/// Modern spelling first, legacy spelling second.
const ALIASED_KEYS: [(&str, &str); 2] = [
    (PUB_DB_FILENAMES, PUB_DB_FILENAME),
    (VALIDATION, PUB_VALIDATION),
];

const TOPLEVEL_KEYS: [&str; 6] = [
    PUB_DB_FILENAMES,
    PUB_DB_FILENAME,
    VALIDATION,
    PUB_VALIDATION,
    TICKET_LAYOUT,
    PUB_FIELDS,
];

fn check_toplevel(document: &Table, path: &str) -> Result<ToplevelNames, ConfigError> {
    let mut missing = vec![];
    let mut extra = extra_keys(&TOPLEVEL_KEYS, document.keys());
    let mut chosen = [PUB_DB_FILENAMES, VALIDATION];

    for (slot, (modern, legacy)) in ALIASED_KEYS.iter().enumerate() {
        match (document.contains_key(*modern), document.contains_key(*legacy)) {
            (false, false) => missing.push(modern.to_string()),
            (true, true) => extra.push(legacy.to_string()),
            (false, true) => chosen[slot] = *legacy,
            (true, false) => {}
        }
    }
    if !document.contains_key(TICKET_LAYOUT) {
        missing.push(TICKET_LAYOUT.to_string());
    }

    if !missing.is_empty() {
        return Err(ConfigError::MissingKeys {
            table: TOPLEVEL.to_string(),
            keys: missing,
            path: path.to_string(),
        });
    }
    if !extra.is_empty() {
        return Err(ConfigError::ExtraKeys {
            table: TOPLEVEL.to_string(),
            keys: extra,
            path: path.to_string(),
        });
    }

    Ok(ToplevelNames {
        filenames: chosen[0],
        validation: chosen[1],
    })
}

fn sub_table<'a>(document: &'a Table, key: &str, path: &str) -> Result<&'a Table, ConfigError> {
    document
        .get(key)
        .and_then(Value::as_table)
        .ok_or_else(|| ConfigError::BadType {
            table: TOPLEVEL.to_string(),
            key: key.to_string(),
            expected: ValueType::Table,
            path: path.to_string(),
        })
}

fn check_exact_keys(
    table: &Table,
    required: &[&str],
    name: &str,
    path: &str,
) -> Result<(), ConfigError> {
    let missing = missing_keys(required, table.keys());
    if !missing.is_empty() {
        return Err(ConfigError::MissingKeys {
            table: name.to_string(),
            keys: missing,
            path: path.to_string(),
        });
    }
    let extra = extra_keys(required, table.keys());
    if !extra.is_empty() {
        return Err(ConfigError::ExtraKeys {
            table: name.to_string(),
            keys: extra,
            path: path.to_string(),
        });
    }
    Ok(())
}

fn expect_type(
    table: &Table,
    key: &str,
    expected: ValueType,
    name: &str,
    path: &str,
) -> Result<(), ConfigError> {
    match table.get(key) {
        Some(value) if check_type(value, expected) => Ok(()),
        _ => Err(ConfigError::BadType {
            table: name.to_string(),
            key: key.to_string(),
            expected,
            path: path.to_string(),
        }),
    }
}

/// Strings under `key`; a bare string counts as a list of one.
/// Callers check the type first.
fn string_list(table: &Table, key: &str) -> Vec<String> {
    match table.get(key) {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => vec![],
    }
}

fn integer_list(table: &Table, key: &str) -> Vec<i64> {
    table
        .get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_integer).collect())
        .unwrap_or_default()
}

fn display_path(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAYOUT: &str = r#"
[ticket-layout]
left-margin = 20
right-margin = 20
upper-margin = 15
lower-margin = 15
font-size = 12
vertical-stretch = 2
title-width = 60
title-styling = "\\bfseries"
label-width = 25
volume-separation = 2
ticket-spacing = 10
cardboard-label = "Cardboard"
paper-label = "Paper"
buckram-label = "Buckram"
backcard-label = "Backcard"
"#;

    fn fixture(head: &str) -> (tempfile::TempDir, PathBuf, String) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("pubs.toml"), "").unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        let text = format!("{head}\n{LAYOUT}");
        (dir, path, text)
    }

    #[test]
    fn test_legacy_key_spellings_accepted() {
        let (_dir, path, text) = fixture(
            r#"pub-db-filename = "pubs.toml"
[pub-validation]
colors = ["RED"]
block-limits = [100, 200]
cover-limits = [100, 300]"#,
        );
        let config = Configuration::parse(&text, &path).unwrap();
        assert_eq!(config.pub_db_filenames().len(), 1);
        assert_eq!(config.field_keys().len(), FIELD_KEYS.len());
    }

    #[test]
    fn test_both_spellings_rejected() {
        let (_dir, path, text) = fixture(
            r#"pub-db-filename = "pubs.toml"
pub-db-filenames = ["pubs.toml"]
[validation]
colors = ["RED"]
block-limits = [100, 200]
cover-limits = [100, 300]"#,
        );
        let err = Configuration::parse(&text, &path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadSchema);
        assert!(matches!(
            err,
            ConfigError::ExtraKeys { ref keys, .. } if keys == &["pub-db-filename"]
        ));
    }

    #[test]
    fn test_integer_vertical_stretch_is_a_number() {
        let (_dir, path, text) = fixture(
            r#"pub-db-filenames = ["pubs.toml"]
[validation]
colors = ["RED"]
block-limits = [100, 200]
cover-limits = [100, 300]"#,
        );
        let config = Configuration::parse(&text, &path).unwrap();
        assert_eq!(config.ticket_layout().vertical_stretch, 2.0);

        for bad in ["nan", "inf", "-inf", "0.0", "-1.5"] {
            let text = text.replace("vertical-stretch = 2", &format!("vertical-stretch = {bad}"));
            let err = Configuration::parse(&text, &path).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::BadValue, "stretch {bad}");
            assert!(matches!(err, ConfigError::BadStretch { .. }));
        }
        assert_eq!(config.ticket_layout().title_styling, "\\bfseries");
    }

    #[test]
    fn test_pub_fields_must_match() {
        let (_dir, path, text) = fixture(
            r#"pub-db-filenames = ["pubs.toml"]
pub-fields = ["title", "color"]
[validation]
colors = ["RED"]
block-limits = [100, 200]
cover-limits = [100, 300]"#,
        );
        let err = Configuration::parse(&text, &path).unwrap_err();
        assert!(matches!(err, ConfigError::BadFieldKeys { .. }));
        assert_eq!(err.kind(), ErrorKind::BadValue);
    }

    #[test]
    fn test_empty_file_list_rejected() {
        let (_dir, path, text) = fixture(
            r#"pub-db-filenames = []
[validation]
colors = ["RED"]
block-limits = [100, 200]
cover-limits = [100, 300]"#,
        );
        let err = Configuration::parse(&text, &path).unwrap_err();
        assert!(matches!(err, ConfigError::NoPublicationFiles { .. }));
    }

    #[test]
    fn test_validation_must_be_table() {
        let (_dir, path, text) = fixture(
            r#"pub-db-filenames = ["pubs.toml"]
validation = "strict""#,
        );
        let err = Configuration::parse(&text, &path).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::BadType { ref key, expected: ValueType::Table, .. } if key == "validation"
        ));
    }

    #[test]
    fn test_missing_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Configuration::load(&dir.path().join(CONFIG_FILENAME)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
