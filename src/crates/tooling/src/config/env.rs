//! Typed reads of `PREFIX_*` override variables

use crate::{Result, ToolingError};
use std::env::{self, VarError};
use std::fmt::Display;
use std::str::FromStr;

fn invalid(key: &str, detail: impl Display) -> ToolingError {
    ToolingError::General(format!("{}: {}", key, detail))
}

/// Trimmed value of `key`, with unset and blank both mapping to `None`
///
/// Non-UTF-8 content is an error rather than silently ignored.
pub fn get_env(key: &str) -> Result<Option<String>> {
    match env::var(key) {
        Ok(raw) => {
            let value = raw.trim();
            Ok((!value.is_empty()).then(|| value.to_string()))
        }
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(_)) => Err(invalid(key, "not valid UTF-8")),
    }
}

/// [`get_env`] followed by [`FromStr`]
///
/// ```rust,ignore
/// let every: Option<usize> = get_env_parse("LABELER_CHECKPOINT_EVERY")?;
/// ```
pub fn get_env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    get_env(key)?
        .map(|value| {
            value
                .parse::<T>()
                .map_err(|e| invalid(key, format!("cannot parse {:?}: {}", value, e)))
        })
        .transpose()
}

/// Flag variable; accepts true/false, 1/0, yes/no and on/off in any case
pub fn get_env_bool(key: &str) -> Result<Option<bool>> {
    let Some(value) = get_env(key)? else {
        return Ok(None);
    };
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(Some(true)),
        "false" | "0" | "no" | "off" => Ok(Some(false)),
        _ => Err(invalid(key, format!("expected a flag, got {:?}", value))),
    }
}

/// `prefix` followed by the upper-cased setting name
///
/// ```rust
/// use tooling::config::build_env_key;
///
/// assert_eq!(build_env_key("LABELER_", "retry_delay_ms"), "LABELER_RETRY_DELAY_MS");
/// ```
pub fn build_env_key(prefix: &str, name: &str) -> String {
    let mut key = String::with_capacity(prefix.len() + name.len());
    key.push_str(prefix);
    key.push_str(&name.to_ascii_uppercase());
    key
}
