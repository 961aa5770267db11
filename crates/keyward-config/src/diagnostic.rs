// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Config error diagnostics.
//!
//! Figment errors become miette diagnostics carrying the offending key's
//! location in its TOML file and a "did you mean" hint for misspelled keys.

// The miette derive assigns fields it never reads back.
#![allow(unused_assignments)]

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Jaro-Winkler score a valid key must beat to be offered as a fix.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// Everything that can be wrong with a keyward configuration.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("`{key}` is not a keyward setting")]
    #[diagnostic(
        code(keyward::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        /// Closest valid key, when one is similar enough.
        suggestion: Option<String>,
        /// Comma-separated keys accepted in the same table.
        valid_keys: String,
        #[label("unrecognized here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("`{key}` has the wrong type: {detail}")]
    #[diagnostic(code(keyward::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        key: String,
        detail: String,
        expected: String,
    },

    #[error("`{key}` is required")]
    #[diagnostic(
        code(keyward::config::missing_key),
        help("add `{key} = <value>` to your keyward.toml or set the matching KEYWARD_* variable")
    )]
    MissingKey {
        /// Dotted path, e.g. `cipher.service_secret`.
        key: String,
    },

    #[error("invalid configuration: {message}")]
    #[diagnostic(code(keyward::config::validation))]
    Validation { message: String },

    #[error("could not load configuration: {0}")]
    #[diagnostic(code(keyward::config::other))]
    Other(String),
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    suggestion.map_or_else(
        || format!("valid keys: {valid_keys}"),
        |s| format!("did you mean `{s}`? Valid keys: {valid_keys}"),
    )
}

/// Translate every error inside a `figment::Error` into a [`ConfigError`].
///
/// `toml_sources` are `(path, content)` pairs used to attach source spans to
/// unknown keys.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| convert(&error, toml_sources))
        .collect()
}

fn convert(error: &figment::error::Error, toml_sources: &[(String, String)]) -> ConfigError {
    use figment::error::Kind;

    let section: Vec<String> = error.path.clone();
    match &error.kind {
        Kind::UnknownField(field, expected) => {
            let (span, src) = locate(error, &section, field, toml_sources);
            ConfigError::UnknownKey {
                key: field.clone(),
                suggestion: suggest_key(field, expected),
                valid_keys: expected.join(", "),
                span,
                src,
            }
        }
        Kind::MissingField(field) => ConfigError::MissingKey {
            key: dotted(&section, Some(&**field)),
        },
        Kind::InvalidType(actual, expected) => ConfigError::InvalidType {
            key: dotted(&section, None),
            detail: format!("found {actual}, expected {expected}"),
            expected: expected.clone(),
        },
        _ => ConfigError::Other(error.to_string()),
    }
}

fn dotted(section: &[String], leaf: Option<&str>) -> String {
    section
        .iter()
        .map(String::as_str)
        .chain(leaf)
        .collect::<Vec<_>>()
        .join(".")
}

/// Resolve the file an error came from and the offset of `field` inside it.
fn locate(
    error: &figment::error::Error,
    section: &[String],
    field: &str,
    toml_sources: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let file = error
        .metadata
        .as_ref()
        .and_then(|m| m.source.as_ref())
        .and_then(|source| match source {
            figment::Source::File(path) => Some(path.display().to_string()),
            _ => None,
        });

    // Inline sources carry no file path; fall back to the only source given.
    let source = match (file, toml_sources) {
        (Some(wanted), _) => toml_sources.iter().find(|(name, _)| *name == wanted),
        (None, [only]) => Some(only),
        (None, _) => None,
    };

    source
        .and_then(|(name, content)| {
            let offset = find_key_offset(content, section, field)?;
            Some((
                Some(SourceSpan::new(offset.into(), field.len())),
                Some(NamedSource::new(name, content.clone())),
            ))
        })
        .unwrap_or((None, None))
}

/// Byte offset of `field` as a key inside the TOML table named by `path`.
///
/// An empty `path` searches from the top of the document. Only the first
/// path segment is matched against a `[table]` header.
pub fn find_key_offset(content: &str, path: &[String], field: &str) -> Option<usize> {
    let table_start = match path.first() {
        Some(table) => {
            let header = format!("[{table}]");
            content.find(&header)? + header.len()
        }
        None => 0,
    };

    let mut line_start = table_start;
    for line in content[table_start..].split_inclusive('\n') {
        let indent = line.len() - line.trim_start().len();
        let is_key = line[indent..]
            .strip_prefix(field)
            .and_then(|rest| rest.chars().next())
            .is_some_and(|c| c == '=' || c == ' ' || c == '\t');
        if is_key {
            return Some(line_start + indent);
        }
        line_start += line.len();
    }
    None
}

/// Closest valid key by Jaro-Winkler similarity, if any clears the threshold.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Print each error to stderr with miette's graphical report handler.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = miette::GraphicalReportHandler::new();
    for error in errors {
        let mut rendered = String::new();
        match handler.render_report(&mut rendered, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{rendered}"),
            Err(_) => eprintln!("Error: {error}"),
        }
    }
}
