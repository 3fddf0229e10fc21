//! Party identities and roles.

use std::{borrow::Borrow, fmt};

use serde::{Deserialize, Serialize};

/// Stable identity of a party for the duration of a session.
///
/// Identities are human-readable names ("Alice", "r3", ...). They double as
/// host names in the networked simulation, so they are kept as plain strings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartyId(String);

impl PartyId {
    /// Create an identity from a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PartyId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for PartyId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Borrow<str> for PartyId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Role a party plays in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Distributes the entangled state; its outcome is the shared secret.
    Dealer,
    /// Holds one share; must cooperate with every other recipient.
    Recipient,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dealer => f.write_str("dealer"),
            Self::Recipient => f.write_str("recipient"),
        }
    }
}
