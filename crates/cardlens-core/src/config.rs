//! Export configuration that downstream crates can serialize/deserialize.
//!
//! The schema assumptions of a run (where the database sits inside the
//! package, which SQL runs against each side, which column is the key) are
//! named constants with documented contracts. They can be overridden from the
//! environment, from a YAML profile, or from the command line, in that order.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Location of the card database inside the package archive.
pub const DEFAULT_PACKAGE_ENTRY: &str = "res/raw/data.db";

/// Package query. Contract: column 0 is the integer card id, column 1 the
/// card's text name; one row per card definition.
pub const DEFAULT_CARD_NAMES_SQL: &str =
    "SELECT cards._id, names.name FROM cards JOIN names ON cards.name = names._id";

/// Scan query. Contract: every scanned row, natural storage order, including
/// the key column.
pub const DEFAULT_SCANNED_CARDS_SQL: &str = "SELECT * FROM cards";

/// Column of the scan rows that references a card id.
pub const DEFAULT_KEY_COLUMN: &str = "card";

/// Column added to every joined row.
pub const DEFAULT_NAME_COLUMN: &str = "name";

/// File name used when no output path is given.
pub const DEFAULT_OUTPUT_FILE: &str = "cards.csv";

/// Same, for JSON lines output.
pub const DEFAULT_JSONL_OUTPUT_FILE: &str = "cards.jsonl";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Jsonl,
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "jsonl" | "ndjson" => Ok(OutputFormat::Jsonl),
            other => Err(Error::Config(format!(
                "unknown output format '{other}' (expected csv or jsonl)"
            ))),
        }
    }
}

impl OutputFormat {
    /// Output file used when the caller names none.
    pub fn default_output_file(self) -> &'static str {
        match self {
            OutputFormat::Csv => DEFAULT_OUTPUT_FILE,
            OutputFormat::Jsonl => DEFAULT_JSONL_OUTPUT_FILE,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Csv => f.write_str("csv"),
            OutputFormat::Jsonl => f.write_str("jsonl"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Archive entry holding the package database.
    pub package_entry: String,

    /// SQL run against the package database (see [`DEFAULT_CARD_NAMES_SQL`]).
    pub card_names_sql: String,

    /// SQL run against the scan export (see [`DEFAULT_SCANNED_CARDS_SQL`]).
    pub scanned_cards_sql: String,

    /// Scan column joined against card ids.
    pub key_column: String,

    /// Output column carrying the resolved name.
    pub name_column: String,

    pub output_format: OutputFormat,

    /// Fail the run when a scanned id has no name instead of leaving it empty.
    pub require_names: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            package_entry: DEFAULT_PACKAGE_ENTRY.to_string(),
            card_names_sql: DEFAULT_CARD_NAMES_SQL.to_string(),
            scanned_cards_sql: DEFAULT_SCANNED_CARDS_SQL.to_string(),
            key_column: DEFAULT_KEY_COLUMN.to_string(),
            name_column: DEFAULT_NAME_COLUMN.to_string(),
            output_format: OutputFormat::Csv,
            require_names: false,
        }
    }
}

/// Optional overrides read from a YAML profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileDoc {
    pub package_entry: Option<String>,
    pub card_names_sql: Option<String>,
    pub scanned_cards_sql: Option<String>,
    pub key_column: Option<String>,
    pub name_column: Option<String>,
    pub output_format: Option<OutputFormat>,
    pub require_names: Option<bool>,
}

/// Parse a YAML profile document.
pub fn parse_profile(yaml: &str) -> Result<ProfileDoc> {
    let doc: ProfileDoc = serde_yaml::from_str(yaml)?;
    Ok(doc)
}

impl ExportConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `CARDLENS_PACKAGE_ENTRY`: archive entry of the package database
    /// - `CARDLENS_CARD_NAMES_SQL`: package query
    /// - `CARDLENS_SCANNED_CARDS_SQL`: scan query
    /// - `CARDLENS_KEY_COLUMN`: scan key column
    /// - `CARDLENS_NAME_COLUMN`: output name column
    /// - `CARDLENS_OUTPUT_FORMAT`: `csv` or `jsonl`
    /// - `CARDLENS_REQUIRE_NAMES`: `true`/`1` to fail on unmatched ids
    ///
    /// An unparseable output format is a config error, as it is on the
    /// command line.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// `from_env` over an arbitrary variable lookup.
    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(s) = var("CARDLENS_PACKAGE_ENTRY") {
            cfg.package_entry = s;
        }

        if let Some(s) = var("CARDLENS_CARD_NAMES_SQL") {
            cfg.card_names_sql = s;
        }

        if let Some(s) = var("CARDLENS_SCANNED_CARDS_SQL") {
            cfg.scanned_cards_sql = s;
        }

        if let Some(s) = var("CARDLENS_KEY_COLUMN") {
            cfg.key_column = s;
        }

        if let Some(s) = var("CARDLENS_NAME_COLUMN") {
            cfg.name_column = s;
        }

        if let Some(s) = var("CARDLENS_OUTPUT_FORMAT") {
            cfg.output_format = s
                .parse::<OutputFormat>()
                .map_err(|e| Error::Config(format!("CARDLENS_OUTPUT_FORMAT: {e}")))?;
        }

        if let Some(s) = var("CARDLENS_REQUIRE_NAMES") {
            cfg.require_names = matches!(s.trim(), "1" | "true" | "yes");
        }

        Ok(cfg)
    }

    /// Overlay the fields a profile sets.
    pub fn apply_profile(&mut self, doc: &ProfileDoc) {
        if let Some(entry) = &doc.package_entry {
            self.package_entry = entry.clone();
        }
        if let Some(sql) = &doc.card_names_sql {
            self.card_names_sql = sql.clone();
        }
        if let Some(sql) = &doc.scanned_cards_sql {
            self.scanned_cards_sql = sql.clone();
        }
        if let Some(col) = &doc.key_column {
            self.key_column = col.clone();
        }
        if let Some(col) = &doc.name_column {
            self.name_column = col.clone();
        }
        if let Some(format) = doc.output_format {
            self.output_format = format;
        }
        if let Some(require) = doc.require_names {
            self.require_names = require;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let required = [
            ("package_entry", &self.package_entry),
            ("card_names_sql", &self.card_names_sql),
            ("scanned_cards_sql", &self.scanned_cards_sql),
            ("key_column", &self.key_column),
            ("name_column", &self.name_column),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{field} must not be empty")));
            }
        }
        if self.key_column == self.name_column {
            return Err(Error::Config(format!(
                "name_column must differ from key_column ('{}')",
                self.key_column
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_named_constants() {
        let cfg = ExportConfig::default();
        assert_eq!(cfg.package_entry, "res/raw/data.db");
        assert_eq!(cfg.scanned_cards_sql, "SELECT * FROM cards");
        assert_eq!(cfg.key_column, "card");
        assert_eq!(cfg.name_column, "name");
        assert_eq!(cfg.output_format, OutputFormat::Csv);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn profile_overrides_only_given_fields() {
        let doc = parse_profile(
            r#"
package_entry: "assets/cards.db"
output_format: jsonl
require_names: true
"#,
        )
        .unwrap();
        let mut cfg = ExportConfig::default();
        cfg.apply_profile(&doc);
        assert_eq!(cfg.package_entry, "assets/cards.db");
        assert_eq!(cfg.output_format, OutputFormat::Jsonl);
        assert!(cfg.require_names);
        assert_eq!(cfg.card_names_sql, DEFAULT_CARD_NAMES_SQL);
    }

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: std::collections::HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn env_overrides_defaults() {
        let cfg = ExportConfig::from_vars(vars(&[
            ("CARDLENS_PACKAGE_ENTRY", "assets/cards.db"),
            ("CARDLENS_OUTPUT_FORMAT", "ndjson"),
            ("CARDLENS_REQUIRE_NAMES", "1"),
        ]))
        .unwrap();
        assert_eq!(cfg.package_entry, "assets/cards.db");
        assert_eq!(cfg.output_format, OutputFormat::Jsonl);
        assert!(cfg.require_names);
        assert_eq!(cfg.key_column, DEFAULT_KEY_COLUMN);
    }

    #[test]
    fn unknown_env_output_format_is_an_error() {
        let err = ExportConfig::from_vars(vars(&[("CARDLENS_OUTPUT_FORMAT", "xlsx")])).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("CARDLENS_OUTPUT_FORMAT")));
    }

    #[test]
    fn default_output_file_follows_format() {
        assert_eq!(OutputFormat::Csv.default_output_file(), "cards.csv");
        assert_eq!(OutputFormat::Jsonl.default_output_file(), "cards.jsonl");
    }

    #[test]
    fn profile_rejects_unknown_keys() {
        assert!(parse_profile("spill_dir: /tmp\n").is_err());
    }

    #[test]
    fn output_format_parsing() {
        assert_eq!("CSV".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert_eq!("ndjson".parse::<OutputFormat>().unwrap(), OutputFormat::Jsonl);
        assert!("parquet".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn empty_key_column_is_invalid() {
        let cfg = ExportConfig {
            key_column: "  ".into(),
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn name_column_cannot_shadow_key() {
        let cfg = ExportConfig {
            name_column: "card".into(),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
