use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// An opaque short identifier for a stored URL.
///
/// Short ids are produced by the caller (see `pinhole-generator`) before a
/// record is handed to a store; stores never mint them.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShortId(String);

impl ShortId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates the full short link based on the provided base URL.
    pub fn to_url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for ShortId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ShortId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ShortId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}
