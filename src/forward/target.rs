//! Target URL resolution.
//!
//! # Responsibilities
//! - Split the raw query string into an ordered multi-map
//! - Pick the first value of the configured parameter
//! - Percent-decode it (form rules, UTF-8) and check it is an absolute http(s) URL
//!
//! # Design Decisions
//! - Values are stored raw and decoded exactly once, here
//! - Malformed escapes are rejected instead of passed through
//! - Pure: no I/O, no shared state

use std::borrow::Cow;
use std::fmt;

use percent_encoding::percent_decode;
use url::Url;

use crate::forward::error::ForwardError;

/// Ordered multi-valued request parameters taken from a query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterMap {
    /// (decoded name, raw value) in query order.
    pairs: Vec<(String, String)>,
}

impl ParameterMap {
    /// Build the map from a raw query string (without the leading `?`).
    pub fn from_query(query: &str) -> Self {
        let pairs = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
                (decode_lossy(name).into_owned(), value.to_string())
            })
            .collect();
        Self { pairs }
    }

    /// Raw values recorded for `name`, in query order.
    pub fn values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs
            .iter()
            .filter(move |(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// A resolved destination for one forwarding operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetUrl(Url);

impl TargetUrl {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }
}

impl fmt::Display for TargetUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Resolve the destination URL from the request parameters.
pub fn resolve_target(params: &ParameterMap, parameter_key: &str) -> Result<TargetUrl, ForwardError> {
    let raw = params
        .values(parameter_key)
        .next()
        .ok_or_else(|| ForwardError::MissingTarget {
            parameter: parameter_key.to_string(),
        })?;

    let decoded = decode_component(raw).map_err(|reason| ForwardError::TargetDecode {
        parameter: parameter_key.to_string(),
        reason,
    })?;

    let url = Url::parse(&decoded).map_err(|e| ForwardError::InvalidTarget {
        target: decoded.clone(),
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ForwardError::InvalidTarget {
            reason: format!("unsupported scheme '{}'", url.scheme()),
            target: decoded,
        });
    }
    Ok(TargetUrl(url))
}

/// Strictly decode a form-encoded component: `+` is a space, `%XX` a byte,
/// and the result must be UTF-8.
pub fn decode_component(raw: &str) -> Result<String, String> {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let escape = bytes.get(i + 1..i + 3);
            match escape {
                Some([hi, lo]) if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() => i += 3,
                _ => return Err(format!("incomplete or malformed escape at byte {}", i)),
            }
        } else {
            i += 1;
        }
    }

    let plus_as_space = raw.replace('+', " ");
    percent_decode(plus_as_space.as_bytes())
        .decode_utf8()
        .map(Cow::into_owned)
        .map_err(|e| e.to_string())
}

fn decode_lossy(raw: &str) -> Cow<'_, str> {
    if raw.contains(['%', '+']) {
        let plus_as_space = raw.replace('+', " ");
        Cow::Owned(percent_decode(plus_as_space.as_bytes()).decode_utf8_lossy().into_owned())
    } else {
        Cow::Borrowed(raw)
    }
}
