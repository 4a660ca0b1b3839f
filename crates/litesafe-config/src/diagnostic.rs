// SPDX-FileCopyrightText: 2026 Litesafe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Figment errors rendered as miette diagnostics.
//!
//! Each diagnostic says where the offending value came from: a TOML file
//! (labelled with a span when the file can be read back), inline TOML, or a
//! `LITESAFE_*` environment variable. Unknown keys and sections carry a
//! Jaro-Winkler "did you mean?" suggestion.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use std::fmt;

use figment::error::Kind;
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::loader::env_var_for;

/// Minimum Jaro-Winkler similarity score to suggest a correction.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// Source name used for TOML passed as a string.
pub const INLINE_SOURCE: &str = "<inline>";

/// Where a configuration value was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    File(String),
    Inline,
    Env(String),
    Unknown,
}

impl fmt::Display for ConfigOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigOrigin::File(path) => write!(f, "file `{path}`"),
            ConfigOrigin::Inline => f.write_str("inline configuration"),
            ConfigOrigin::Env(var) => write!(f, "environment variable `{var}`"),
            ConfigOrigin::Unknown => f.write_str("configuration"),
        }
    }
}

/// A configuration error with rich diagnostic information.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A top-level table that litesafe does not read.
    #[error("unknown configuration section `{section}` in {origin}")]
    #[diagnostic(
        code(litesafe::config::unknown_section),
        help("{}", format_suggestion_help(suggestion.as_deref(), "sections", valid_sections))
    )]
    UnknownSection {
        section: String,
        suggestion: Option<String>,
        valid_sections: String,
        origin: ConfigOrigin,
        #[label("this section is not recognized")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// An unknown key inside a known section.
    #[error("unknown configuration key `{key}` in [{section}] ({origin})")]
    #[diagnostic(
        code(litesafe::config::unknown_key),
        help("{}", format_suggestion_help(suggestion.as_deref(), "keys", valid_keys))
    )]
    UnknownKey {
        section: String,
        key: String,
        suggestion: Option<String>,
        valid_keys: String,
        origin: ConfigOrigin,
        #[label("this key is not recognized")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value of the wrong type, or an unrecognized enum value.
    #[error("invalid value for `{key}` in {origin}: {detail}")]
    #[diagnostic(code(litesafe::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        /// Dotted path, e.g. `retry.max_attempts`.
        key: String,
        detail: String,
        expected: String,
        origin: ConfigOrigin,
        #[label("wrong type here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("validation error: {message}")]
    #[diagnostic(code(litesafe::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(litesafe::config::other))]
    Other(String),
}

fn format_suggestion_help(suggestion: Option<&str>, noun: &str, valid: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid {noun}: {valid}"),
        None => format!("valid {noun}: {valid}"),
    }
}

/// Convert a `figment::Error` (which may hold several) into diagnostics.
///
/// `toml_sources` pairs a source name with its content. File sources are
/// named by path, inline TOML by [`INLINE_SOURCE`].
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| convert(&error, toml_sources))
        .collect()
}

fn convert(error: &figment::Error, toml_sources: &[(String, String)]) -> ConfigError {
    let path: Vec<&str> = error.path.iter().map(String::as_str).collect();

    match &error.kind {
        Kind::UnknownField(field, expected) if path.is_empty() => {
            let origin = origin_of(error, &[field.as_str()]);
            let (span, src) = resolve(&origin, toml_sources, |content| {
                find_section_offset(content, field).map(|offset| (offset, field.len() + 2))
            });
            ConfigError::UnknownSection {
                section: field.clone(),
                suggestion: suggest_key(field, expected),
                valid_sections: expected.join(", "),
                origin,
                span,
                src,
            }
        }
        Kind::UnknownField(field, expected) => {
            let mut full = path.clone();
            full.push(field.as_str());
            let origin = origin_of(error, &full);
            let (span, src) = resolve(&origin, toml_sources, |content| {
                find_key_offset(content, &path, field).map(|offset| (offset, field.len()))
            });
            ConfigError::UnknownKey {
                section: path.join("."),
                key: field.clone(),
                suggestion: suggest_key(field, expected),
                valid_keys: expected.join(", "),
                origin,
                span,
                src,
            }
        }
        Kind::InvalidType(actual, expected) | Kind::InvalidValue(actual, expected) => {
            invalid_value(error, &path, format!("found {actual}"), expected.clone(), toml_sources)
        }
        Kind::UnknownVariant(actual, expected) => invalid_value(
            error,
            &path,
            format!("unknown value `{actual}`"),
            format!("one of {}", expected.join(", ")),
            toml_sources,
        ),
        _ => ConfigError::Other(error.to_string()),
    }
}

fn invalid_value(
    error: &figment::Error,
    path: &[&str],
    detail: String,
    expected: String,
    toml_sources: &[(String, String)],
) -> ConfigError {
    let origin = origin_of(error, path);
    let (span, src) = match path.split_last() {
        Some((key, section)) => resolve(&origin, toml_sources, |content| {
            find_key_offset(content, section, key).map(|offset| (offset, key.len()))
        }),
        None => (None, None),
    };
    ConfigError::InvalidType {
        key: path.join("."),
        detail,
        expected,
        origin,
        span,
        src,
    }
}

/// Work out which provider produced `error`. `key_path` names the value, and
/// is used to reconstruct the environment variable for env-sourced values.
fn origin_of(error: &figment::Error, key_path: &[&str]) -> ConfigOrigin {
    let Some(metadata) = error.metadata.as_ref() else {
        return ConfigOrigin::Unknown;
    };
    match &metadata.source {
        Some(figment::Source::File(path)) => ConfigOrigin::File(path.display().to_string()),
        _ if metadata.name.contains("environment") => ConfigOrigin::Env(env_var_for(key_path)),
        _ if metadata.name.contains("TOML") => ConfigOrigin::Inline,
        _ => ConfigOrigin::Unknown,
    }
}

/// Attach a labelled span when the origin's text is available and `locate`
/// finds `(offset, len)` in it.
fn resolve(
    origin: &ConfigOrigin,
    toml_sources: &[(String, String)],
    locate: impl Fn(&str) -> Option<(usize, usize)>,
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let name = match origin {
        ConfigOrigin::File(path) => path.as_str(),
        ConfigOrigin::Inline => INLINE_SOURCE,
        ConfigOrigin::Env(_) | ConfigOrigin::Unknown => return (None, None),
    };
    toml_sources
        .iter()
        .find(|(source, _)| source == name)
        .and_then(|(source, content)| {
            let (offset, len) = locate(content)?;
            Some((
                Some(SourceSpan::new(offset.into(), len)),
                Some(NamedSource::new(source, content.clone())),
            ))
        })
        .unwrap_or((None, None))
}

/// Lines of `content` with the byte offset each starts at.
fn lines_with_offsets(content: &str) -> impl Iterator<Item = (usize, &str)> {
    content.split_inclusive('\n').scan(0, |offset, line| {
        let start = *offset;
        *offset += line.len();
        Some((start, line.trim_end_matches(['\n', '\r'])))
    })
}

/// The table name of a `[header]` line, if `line` is one.
fn header_name(line: &str) -> Option<&str> {
    let inner = line.trim().strip_prefix('[')?;
    if inner.starts_with('[') {
        return None;
    }
    let (name, _) = inner.split_once(']')?;
    Some(name.trim())
}

/// Byte offset of the `[section]` header, tolerating `[ section ]`.
pub fn find_section_offset(content: &str, section: &str) -> Option<usize> {
    lines_with_offsets(content).find_map(|(start, line)| {
        (header_name(line) == Some(section)).then(|| start + (line.len() - line.trim_start().len()))
    })
}

/// Byte offset of `field` within the table named by `path`.
///
/// With an empty `path` only the lines before the first header are searched.
/// The search stops at the next header, so a key of the same name in a later
/// section is never matched.
pub fn find_key_offset(content: &str, path: &[&str], field: &str) -> Option<usize> {
    let table = path.join(".");
    let mut in_table = table.is_empty();

    for (start, line) in lines_with_offsets(content) {
        if let Some(name) = header_name(line) {
            in_table = name == table;
            continue;
        }
        if !in_table {
            continue;
        }
        let trimmed = line.trim_start();
        if let Some(after) = trimmed.strip_prefix(field)
            && after.trim_start().starts_with('=')
        {
            return Some(start + (line.len() - trimmed.len()));
        }
    }
    None
}

/// Suggest a similar key name using Jaro-Winkler string similarity.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Render a list of `ConfigError`s to stderr using miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    use miette::GraphicalReportHandler;

    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        let diagnostic: &dyn Diagnostic = error;
        if handler.render_report(&mut buf, diagnostic).is_ok() {
            eprint!("{buf}");
        } else {
            eprintln!("Error: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "[database]\nallow_create = true\n\n[ retry ]\nmax_atempts = 3\n\n[lock]\nmax_atempts = 9\n";

    #[test]
    fn suggest_max_attempts_for_typo() {
        let valid = &["max_attempts", "base_delay_ms", "max_delay_ms", "multiplier"];
        assert_eq!(
            suggest_key("max_atempts", valid),
            Some("max_attempts".to_string())
        );
        assert_eq!(suggest_key("zzzzzz", valid), None);
    }

    #[test]
    fn suggest_section_for_typo() {
        let sections = &["database", "retry", "lock", "profiling", "log"];
        assert_eq!(suggest_key("databse", sections), Some("database".to_string()));
    }

    #[test]
    fn section_headers_are_located() {
        let o = find_section_offset(SAMPLE, "retry").unwrap();
        assert_eq!(&SAMPLE[o..o + 9], "[ retry ]");
        assert_eq!(find_section_offset(SAMPLE, "database"), Some(0));
        assert_eq!(find_section_offset(SAMPLE, "profiling"), None);
    }

    #[test]
    fn key_lookup_stays_inside_its_section() {
        let o = find_key_offset(SAMPLE, &["retry"], "max_atempts").unwrap();
        assert_eq!(&SAMPLE[o..o + 11], "max_atempts");
        assert!(o < find_section_offset(SAMPLE, "lock").unwrap());

        let o = find_key_offset(SAMPLE, &["lock"], "max_atempts").unwrap();
        assert!(o > find_section_offset(SAMPLE, "lock").unwrap());

        assert!(find_key_offset(SAMPLE, &["database"], "max_atempts").is_none());
    }

    #[test]
    fn crlf_offsets_are_exact() {
        let content = "[lock]\r\ndefault_timout_ms = 1\r\n";
        let o = find_key_offset(content, &["lock"], "default_timout_ms").unwrap();
        assert_eq!(&content[o..o + 17], "default_timout_ms");
    }

    #[test]
    fn array_tables_are_not_sections() {
        assert_eq!(header_name("[[retry]]"), None);
        assert_eq!(header_name("  [log]  # comment"), Some("log"));
    }

    #[test]
    fn origins_describe_themselves() {
        assert_eq!(
            ConfigOrigin::Env("LITESAFE_RETRY_MAX_ATTEMPTS".into()).to_string(),
            "environment variable `LITESAFE_RETRY_MAX_ATTEMPTS`"
        );
        assert_eq!(
            ConfigOrigin::File("/etc/litesafe/litesafe.toml".into()).to_string(),
            "file `/etc/litesafe/litesafe.toml`"
        );
    }
}
