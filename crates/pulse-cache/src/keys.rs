//! Key namespacing.

/// Builds every key this client writes, under a single tenant prefix.
///
/// Data keys, tag sets and locks live in disjoint sub-spaces so a cache key
/// can never be mistaken for a tag index or a lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    /// Creates a key space with the given prefix.
    ///
    /// # Examples
    ///
    /// ```
    /// use pulse_cache::KeySpace;
    ///
    /// let keys = KeySpace::new("finance:");
    /// assert_eq!(keys.data("user:42"), "finance:user:42");
    /// assert_eq!(keys.tag("users"), "finance:tag:users");
    /// assert_eq!(keys.lock("nightly-report"), "finance:lock:nightly-report");
    /// ```
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn data(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    pub fn tag(&self, tag: &str) -> String {
        format!("{}tag:{}", self.prefix, tag)
    }

    pub fn lock(&self, name: &str) -> String {
        format!("{}lock:{}", self.prefix, name)
    }

    /// Removes the prefix from a namespaced key, if present.
    pub fn strip<'a>(&self, full_key: &'a str) -> Option<&'a str> {
        full_key.strip_prefix(self.prefix.as_str())
    }
}

impl Default for KeySpace {
    fn default() -> Self {
        Self::new("finance:")
    }
}
