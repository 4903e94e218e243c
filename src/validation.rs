//! Publication record validation - rule/orchestrator separation
//!
//! Rules inspect one catalog record against the configuration in force.
//! The validator runs them in a fixed order; `validate` stops at the first
//! failure, `violations` reports every rule's findings for diagnostics.

use toml::{Table, Value};

use crate::config::{Configuration, PubValidation};
use crate::constraints::{extra_keys, missing_keys, ValueType};
use crate::publication::{PubError, Publication};

/// Where a record came from, for error attribution.
#[derive(Debug, Clone, Copy)]
pub struct RecordContext<'a> {
    pub key: &'a str,
    pub file: &'a str,
}

/// Validation rule trait - produces errors for one typed record
pub trait PublicationRule {
    fn name(&self) -> &'static str;
    fn check(
        &self,
        record: &Publication,
        ctx: RecordContext<'_>,
        validation: &PubValidation,
    ) -> Vec<PubError>;
}

// --- Concrete Rules ---

pub struct TitleRule;

impl PublicationRule for TitleRule {
    fn name(&self) -> &'static str { "title" }

    fn check(
        &self,
        record: &Publication,
        ctx: RecordContext<'_>,
        _: &PubValidation,
    ) -> Vec<PubError> {
        if record.title.trim().is_empty() {
            vec![PubError::EmptyTitle {
                key: ctx.key.to_string(),
                file: ctx.file.to_string(),
            }]
        } else {
            vec![]
        }
    }
}

pub struct ColorRule;

impl PublicationRule for ColorRule {
    fn name(&self) -> &'static str { "color" }

    fn check(
        &self,
        record: &Publication,
        ctx: RecordContext<'_>,
        validation: &PubValidation,
    ) -> Vec<PubError> {
        if validation.good_color(&record.color) {
            return vec![];
        }
        vec![PubError::BadColor {
            key: ctx.key.to_string(),
            color: record.color.clone(),
            file: ctx.file.to_string(),
        }]
    }
}

pub struct BlockDimensionRule;

impl PublicationRule for BlockDimensionRule {
    fn name(&self) -> &'static str { "block_limits" }

    fn check(
        &self,
        record: &Publication,
        ctx: RecordContext<'_>,
        validation: &PubValidation,
    ) -> Vec<PubError> {
        let limits = validation.block_limits();
        [("block-height", record.block_height), ("block-width", record.block_width)]
            .into_iter()
            .filter(|(_, value)| !limits.contains(*value))
            .map(|(field, value)| PubError::BadDimension {
                key: ctx.key.to_string(),
                field: field.to_string(),
                value,
                limits,
                file: ctx.file.to_string(),
            })
            .collect()
    }
}

pub struct CoverDimensionRule;

impl PublicationRule for CoverDimensionRule {
    fn name(&self) -> &'static str { "cover_limits" }

    fn check(
        &self,
        record: &Publication,
        ctx: RecordContext<'_>,
        validation: &PubValidation,
    ) -> Vec<PubError> {
        let limits = validation.cover_limits();
        [("cover-height", record.cover_height), ("cover-width", record.cover_width)]
            .into_iter()
            .filter(|(_, value)| !limits.contains(*value))
            .map(|(field, value)| PubError::BadDimension {
                key: ctx.key.to_string(),
                field: field.to_string(),
                value,
                limits,
                file: ctx.file.to_string(),
            })
            .collect()
    }
}

/// Validator orchestrates rules in order: title, color, block, cover.
pub struct RecordValidator {
    rules: Vec<Box<dyn PublicationRule>>,
}

impl RecordValidator {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(TitleRule),
                Box::new(ColorRule),
                Box::new(BlockDimensionRule),
                Box::new(CoverDimensionRule),
            ],
        }
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Validate one record; the first violation wins.
    pub fn validate(
        &self,
        ctx: RecordContext<'_>,
        value: &Value,
        config: &Configuration,
    ) -> Result<Publication, PubError> {
        let record = shape(ctx, value, config)?;
        for rule in &self.rules {
            if let Some(err) = rule.check(&record, ctx, config.validation()).into_iter().next() {
                return Err(err);
            }
        }
        Ok(record)
    }

    /// Every violation of one record. A shape failure stops the value rules
    /// from running, since they need a typed record.
    pub fn violations(
        &self,
        ctx: RecordContext<'_>,
        value: &Value,
        config: &Configuration,
    ) -> Vec<PubError> {
        match shape(ctx, value, config) {
            Ok(record) => self
                .rules
                .iter()
                .flat_map(|rule| rule.check(&record, ctx, config.validation()))
                .collect(),
            Err(err) => vec![err],
        }
    }
}

impl Default for RecordValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Exact field set, then field types, then the typed record.
fn shape(
    ctx: RecordContext<'_>,
    value: &Value,
    config: &Configuration,
) -> Result<Publication, PubError> {
    let fields = value.as_table().ok_or_else(|| PubError::NotATable {
        key: ctx.key.to_string(),
        file: ctx.file.to_string(),
    })?;

    let required: Vec<&str> = config.field_keys().iter().map(String::as_str).collect();
    let missing = missing_keys(&required, fields.keys());
    let extra = extra_keys(&required, fields.keys());
    if !missing.is_empty() || !extra.is_empty() {
        return Err(PubError::BadFields {
            key: ctx.key.to_string(),
            missing,
            extra,
            file: ctx.file.to_string(),
        });
    }

    Ok(Publication {
        title: string_field(ctx, fields, "title")?,
        block_height: integer_field(ctx, fields, "block-height")?,
        block_width: integer_field(ctx, fields, "block-width")?,
        cover_height: integer_field(ctx, fields, "cover-height")?,
        cover_width: integer_field(ctx, fields, "cover-width")?,
        color: string_field(ctx, fields, "color")?,
    })
}

fn string_field(ctx: RecordContext<'_>, fields: &Table, name: &str) -> Result<String, PubError> {
    fields
        .get(name)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| bad_type(ctx, name, ValueType::String))
}

fn integer_field(ctx: RecordContext<'_>, fields: &Table, name: &str) -> Result<i64, PubError> {
    fields
        .get(name)
        .and_then(Value::as_integer)
        .ok_or_else(|| bad_type(ctx, name, ValueType::Integer))
}

fn bad_type(ctx: RecordContext<'_>, field: &str, expected: ValueType) -> PubError {
    PubError::BadType {
        key: ctx.key.to_string(),
        field: field.to_string(),
        expected,
        file: ctx.file.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::fs;

    fn config(dir: &tempfile::TempDir) -> Configuration {
        fs::write(dir.path().join("pubs.toml"), "").unwrap();
        let text = r#"
pub-db-filenames = ["pubs.toml"]

[validation]
colors = ["RED", "BLU"]
block-limits = [100, 200]
cover-limits = [100, 300]

[ticket-layout]
left-margin = 20
right-margin = 20
upper-margin = 15
lower-margin = 15
font-size = 12
vertical-stretch = 1.5
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
        Configuration::parse(text, &dir.path().join("configure.toml")).unwrap()
    }

    fn record(text: &str) -> Value {
        Value::Table(toml::from_str::<Table>(text).unwrap())
    }

    const CTX: RecordContext<'static> = RecordContext { key: "A1", file: "pubs.toml" };

    #[test]
    fn test_rule_order() {
        let validator = RecordValidator::new();
        assert_eq!(validator.rule_names(), vec!["title", "color", "block_limits", "cover_limits"]);
    }

    #[test]
    fn test_first_violation_wins() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        let value = record(
            r#"title = "Annals"
block-height = 50
block-width = 150
cover-height = 230
cover-width = 120
color = "XYZ""#,
        );
        let err = RecordValidator::new().validate(CTX, &value, &config).unwrap_err();
        assert!(matches!(err, PubError::BadColor { .. }));
    }

    #[test]
    fn test_violations_collects_every_rule() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        let value = record(
            r#"title = ""
block-height = 50
block-width = 250
cover-height = 230
cover-width = 400
color = "XYZ""#,
        );
        let all = RecordValidator::new().violations(CTX, &value, &config);
        let kinds: Vec<ErrorKind> = all.iter().map(PubError::kind).collect();
        assert_eq!(all.len(), 5);
        assert!(kinds.iter().all(|k| *k == ErrorKind::BadValue));
    }

    #[test]
    fn test_wrong_field_type() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        let value = record(
            r#"title = "Annals"
block-height = "150"
block-width = 150
cover-height = 230
cover-width = 120
color = "RED""#,
        );
        let err = RecordValidator::new().validate(CTX, &value, &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadType);
        assert!(err.to_string().contains("block-height"));
    }

    #[test]
    fn test_record_must_be_table() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        let err = RecordValidator::new()
            .validate(CTX, &Value::String("Annals".into()), &config)
            .unwrap_err();
        assert!(matches!(err, PubError::NotATable { .. }));
    }
}
