// SPDX-FileCopyrightText: 2026 Litesafe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection string parsing.
//!
//! A connection string is a `;`-separated list of `key=value` pairs:
//!
//! ```text
//! Data Source=/var/lib/app/app.db;Mode=ReadWrite;Cache=Shared;Foreign Keys=True
//! ```
//!
//! Keys are case-insensitive and spaces inside them are ignored, so
//! `Data Source`, `DataSource` and `datasource` are the same key. Values may
//! be wrapped in double or single quotes; a doubled quote inside a quoted
//! value stands for one literal quote.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use litesafe_core::{CacheMode, LitesafeError, OpenMode};
use rusqlite::OpenFlags;
use thiserror::Error;

/// Why a connection string could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionStringError {
    #[error("expected `key=value`, found `{0}`")]
    MissingEquals(String),

    #[error("empty keyword before `=`")]
    EmptyKey,

    #[error("unknown keyword `{0}`")]
    UnknownKeyword(String),

    #[error("unterminated quoted value for `{0}`")]
    UnterminatedQuote(String),

    #[error("unexpected text after quoted value for `{0}`")]
    TrailingCharacters(String),

    #[error("invalid value `{value}` for `{key}`")]
    InvalidValue { key: String, value: String },

    #[error("`{0}` is not supported: store encryption is unsupported by the bundled engine")]
    EncryptionUnsupported(String),
}

impl From<ConnectionStringError> for LitesafeError {
    fn from(err: ConnectionStringError) -> Self {
        LitesafeError::Config(format!("malformed connection string: {err}"))
    }
}

/// A parsed connection string plus the provider it targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    /// Store file path. Empty when the connection string is not configured.
    pub path: String,
    pub mode: OpenMode,
    pub provider_name: String,
    pub cache: CacheMode,
    pub foreign_keys: Option<bool>,
    /// Engine busy wait requested by the string itself (`Default Timeout`).
    pub default_timeout: Option<Duration>,
    /// Accepted for compatibility. Each store handle owns one connection.
    pub pooling: Option<bool>,
    /// Applied as `PRAGMA recursive_triggers` on open.
    pub recursive_triggers: Option<bool>,
}

impl ConnectionDescriptor {
    /// A descriptor with defaults for everything but the path.
    pub fn new(path: impl Into<String>, provider_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: OpenMode::default(),
            provider_name: provider_name.into(),
            cache: CacheMode::default(),
            foreign_keys: None,
            default_timeout: None,
            pooling: None,
            recursive_triggers: None,
        }
    }

    pub fn with_mode(mut self, mode: OpenMode) -> Self {
        self.mode = mode;
        self
    }

    /// Parse `conn_str` for `provider_name`.
    ///
    /// An empty or whitespace-only string yields an unconfigured descriptor.
    /// A missing `Mode` means [`OpenMode::ReadWriteCreate`].
    pub fn parse(conn_str: &str, provider_name: &str) -> Result<Self, ConnectionStringError> {
        let mut descriptor = Self::new("", provider_name);

        for (raw_key, value) in split_pairs(conn_str)? {
            let key: String = raw_key
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_ascii_lowercase();
            let invalid = || ConnectionStringError::InvalidValue {
                key: raw_key.clone(),
                value: value.clone(),
            };

            match key.as_str() {
                "datasource" | "filename" | "path" => descriptor.path = value.clone(),
                "mode" => descriptor.mode = OpenMode::from_str(&value).map_err(|_| invalid())?,
                "cache" => descriptor.cache = CacheMode::from_str(&value).map_err(|_| invalid())?,
                "foreignkeys" => descriptor.foreign_keys = Some(parse_bool(&value).ok_or_else(invalid)?),
                "defaulttimeout" | "commandtimeout" => {
                    let secs: u64 = value.trim().parse().map_err(|_| invalid())?;
                    descriptor.default_timeout = Some(Duration::from_secs(secs));
                }
                "pooling" => descriptor.pooling = Some(parse_bool(&value).ok_or_else(invalid)?),
                "recursivetriggers" => {
                    descriptor.recursive_triggers = Some(parse_bool(&value).ok_or_else(invalid)?)
                }
                "password" => return Err(ConnectionStringError::EncryptionUnsupported(raw_key)),
                _ => return Err(ConnectionStringError::UnknownKeyword(raw_key)),
            }
        }

        Ok(descriptor)
    }

    /// Whether both a path and a provider are present.
    pub fn is_configured(&self) -> bool {
        !self.path.trim().is_empty() && !self.provider_name.trim().is_empty()
    }

    /// Engine open flags for this descriptor.
    pub fn open_flags(&self) -> OpenFlags {
        let mut flags = OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        flags |= match self.mode {
            OpenMode::ReadOnly => OpenFlags::SQLITE_OPEN_READ_ONLY,
            OpenMode::ReadWrite => OpenFlags::SQLITE_OPEN_READ_WRITE,
            OpenMode::ReadWriteCreate => {
                OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
            }
        };
        match self.cache {
            CacheMode::Default => {}
            CacheMode::Private => flags |= OpenFlags::SQLITE_OPEN_PRIVATE_CACHE,
            CacheMode::Shared => flags |= OpenFlags::SQLITE_OPEN_SHARED_CACHE,
        }
        flags
    }
}

/// Renders the canonical connection string. Parsing the output yields an
/// equal descriptor.
impl fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Data Source={};Mode={}", quote(&self.path), self.mode)?;
        if self.cache != CacheMode::Default {
            write!(f, ";Cache={}", self.cache)?;
        }
        if let Some(on) = self.foreign_keys {
            write!(f, ";Foreign Keys={}", if on { "True" } else { "False" })?;
        }
        if let Some(timeout) = self.default_timeout {
            write!(f, ";Default Timeout={}", timeout.as_secs())?;
        }
        if let Some(on) = self.pooling {
            write!(f, ";Pooling={}", if on { "True" } else { "False" })?;
        }
        if let Some(on) = self.recursive_triggers {
            write!(f, ";Recursive Triggers={}", if on { "True" } else { "False" })?;
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn quote(value: &str) -> String {
    let needs_quotes = value.contains([';', '=', '"', '\''])
        || value.trim() != value
        || value.is_empty();
    if needs_quotes {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Split into `(key, value)` pairs with quotes resolved. Keys keep their
/// original spelling for error messages.
fn split_pairs(input: &str) -> Result<Vec<(String, String)>, ConnectionStringError> {
    let mut pairs = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace() || *c == ';').is_some() {}
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        let mut found_equals = false;
        while let Some(c) = chars.next() {
            match c {
                '=' => {
                    found_equals = true;
                    break;
                }
                ';' => break,
                _ => key.push(c),
            }
        }
        let key = key.trim().to_string();
        if !found_equals {
            return Err(ConnectionStringError::MissingEquals(key));
        }
        if key.is_empty() {
            return Err(ConnectionStringError::EmptyKey);
        }

        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let value = match chars.peek().copied() {
            Some(quote @ ('"' | '\'')) => {
                chars.next();
                let mut value = String::new();
                let mut closed = false;
                while let Some(c) = chars.next() {
                    if c == quote {
                        if chars.next_if_eq(&quote).is_some() {
                            value.push(quote);
                        } else {
                            closed = true;
                            break;
                        }
                    } else {
                        value.push(c);
                    }
                }
                if !closed {
                    return Err(ConnectionStringError::UnterminatedQuote(key));
                }
                while chars.next_if(|c| c.is_whitespace()).is_some() {}
                match chars.next() {
                    None | Some(';') => {}
                    Some(_) => return Err(ConnectionStringError::TrailingCharacters(key)),
                }
                value
            }
            _ => {
                let mut value = String::new();
                for c in chars.by_ref() {
                    if c == ';' {
                        break;
                    }
                    value.push(c);
                }
                value.trim().to_string()
            }
        };

        pairs.push((key, value));
    }

    Ok(pairs)
}
