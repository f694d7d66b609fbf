//! Provider identity tag.
//!
//! Every external identity provider supported by the subsystem is represented
//! by a [`ProviderKind`] variant. Code above the adapter layer must never
//! branch on the variant directly; it only selects an adapter by kind and
//! calls through the adapter interface.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The supported external OAuth2 / calendar providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Google-style provider: offline-access refresh tokens, sync tokens.
    Google,
    /// Microsoft-style provider: PKCE, signed client assertions, delta links.
    Microsoft,
}

impl ProviderKind {
    /// All provider kinds, in a stable order.
    pub const ALL: [ProviderKind; 2] = [ProviderKind::Google, ProviderKind::Microsoft];

    /// Returns the canonical lowercase name used in URLs and storage keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Microsoft => "microsoft",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(Self::Google),
            "microsoft" => Ok(Self::Microsoft),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

/// Error returned when parsing an unrecognized provider name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown provider: {0}")]
pub struct UnknownProvider(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_str() {
        for kind in ProviderKind::ALL {
            assert_eq!(kind.as_str().parse::<ProviderKind>().unwrap(), kind);
        }
    }

    #[test]
    fn rejects_unknown_name() {
        let err = "caldav".parse::<ProviderKind>().unwrap_err();
        assert_eq!(err, UnknownProvider("caldav".to_string()));
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&ProviderKind::Microsoft).unwrap();
        assert_eq!(json, "\"microsoft\"");
    }
}
