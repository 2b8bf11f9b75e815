//! Source classification and local path resolution
//!
//! Local paths are normalised in a fixed order:
//! `file://` URL decode, then `~` expansion, then environment variable
//! substitution, then resolution against the current directory.

use crate::{ClientError, Result};
use std::path::{Path, PathBuf};
use url::Url;

/// URI schemes the service fetches itself
pub const REMOTE_SCHEMES: &[&str] = &["http", "https", "s3", "gs", "ftp"];

/// Where the media for a job comes from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    /// Already reachable by the service
    Remote(String),
    /// File on this machine that must be uploaded first
    Local(PathBuf),
}

impl Source {
    /// Classify a caller-supplied source string
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ClientError::Config("source must not be empty".to_string()));
        }

        if let Ok(url) = Url::parse(input) {
            if REMOTE_SCHEMES.contains(&url.scheme()) {
                return Ok(Self::Remote(input.to_string()));
            }
        }

        resolve_local_path(input).map(Self::Local)
    }

    /// Whether the source needs uploading
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

/// Resolve a local path string to an absolute path
pub fn resolve_local_path(input: &str) -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    resolve_with(
        input,
        dirs::home_dir().as_deref(),
        |name| std::env::var(name).ok(),
        &cwd,
    )
}

fn resolve_with<F>(input: &str, home: Option<&Path>, lookup: F, cwd: &Path) -> Result<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    let decoded = decode_file_url(input)?;
    let expanded = expand_tilde(&decoded, home)?;
    let substituted = expand_env_vars(&expanded, lookup)?;

    let path = PathBuf::from(substituted);
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(cwd.join(path))
    }
}

fn decode_file_url(input: &str) -> Result<String> {
    if !input.starts_with("file://") {
        return Ok(input.to_string());
    }

    let url = Url::parse(input)
        .map_err(|e| ClientError::Config(format!("invalid file URL {}: {}", input, e)))?;
    let path = url
        .to_file_path()
        .map_err(|_| ClientError::Config(format!("file URL {} does not name a local path", input)))?;
    Ok(path.to_string_lossy().into_owned())
}

fn expand_tilde(input: &str, home: Option<&Path>) -> Result<String> {
    let rest = if input == "~" {
        ""
    } else if let Some(rest) = input.strip_prefix("~/").or_else(|| input.strip_prefix("~\\")) {
        rest
    } else {
        return Ok(input.to_string());
    };

    let home = home.ok_or_else(|| {
        ClientError::Config(format!("cannot expand {}: home directory unknown", input))
    })?;
    Ok(home.join(rest).to_string_lossy().into_owned())
}

/// Substitute `$NAME` and `${NAME}`
///
/// A `$` not followed by a variable name is kept literally. Unset
/// variables are an error rather than silently becoming empty.
fn expand_env_vars<F>(input: &str, lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(input.len());
    let mut chars = input.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }

        let next = chars.peek().map(|&(_, ch)| ch);
        let (name, braced) = match next {
            Some('{') => {
                chars.next();
                let start = i + 2;
                let mut end = None;
                for (j, ch) in chars.by_ref() {
                    if ch == '}' {
                        end = Some(j);
                        break;
                    }
                }
                let end = end.ok_or_else(|| {
                    ClientError::Config(format!("unterminated ${{ in path {}", input))
                })?;
                (&input[start..end], true)
            }
            Some(ch) if ch.is_ascii_alphabetic() || ch == '_' => {
                let start = i + 1;
                let mut end = input.len();
                while let Some(&(j, ch)) = chars.peek() {
                    if ch.is_ascii_alphanumeric() || ch == '_' {
                        chars.next();
                    } else {
                        end = j;
                        break;
                    }
                }
                (&input[start..end], false)
            }
            _ => {
                out.push('$');
                continue;
            }
        };

        if braced && name.is_empty() {
            return Err(ClientError::Config(format!("empty variable name in path {}", input)));
        }
        let value = lookup(name).ok_or_else(|| {
            ClientError::Config(format!("environment variable {} is not set", name))
        })?;
        out.push_str(&value);
    }

    Ok(out)
}
