//! Query signatures.
//!
//! A signature groups executions of the same query shape. Placeholders such
//! as `$1`, `$42` or `?` collapse to a single `?` and whitespace runs collapse
//! to one space before hashing, so the identifier is a pure function of the
//! query text and survives process restarts.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

static POSITIONAL_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\d+").expect("static regex is valid"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static regex is valid"));

/// Hex characters kept from the digest.
const SIGNATURE_LEN: usize = 16;

/// Rewrites parameter placeholders to `?` and collapses whitespace.
///
/// Normalizing an already normalized query returns it unchanged.
///
/// ```
/// use pulse_core::normalize_query;
///
/// assert_eq!(normalize_query("SELECT *  FROM t WHERE id = $12"), "SELECT * FROM t WHERE id = ?");
/// ```
pub fn normalize_query(raw: &str) -> String {
    let params = POSITIONAL_PARAM.replace_all(raw, "?");
    WHITESPACE.replace_all(params.trim(), " ").into_owned()
}

/// Fixed-width identifier of a normalized query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuerySignature(String);

impl QuerySignature {
    /// Normalizes `raw` and hashes it.
    pub fn of(raw: &str) -> Self {
        Self::of_normalized(&normalize_query(raw))
    }

    /// Hashes text that has already gone through [`normalize_query`].
    pub fn of_normalized(normalized: &str) -> Self {
        let digest = Sha256::digest(normalized.as_bytes());
        let mut hex = hex::encode(digest);
        hex.truncate(SIGNATURE_LEN);
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuerySignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
