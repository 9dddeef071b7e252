//! The verdict taxonomy shared by the canon, the engine and the API.

use serde::{Deserialize, Serialize};

/// Classification of a claim.
///
/// Canon records (previously adjudicated claims) only ever carry `True`,
/// `False` or `Misleading`; `Unverified` exists for engine output where the
/// evidence does not support a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    True,
    False,
    Misleading,
    Unverified,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::True => "true",
            Verdict::False => "false",
            Verdict::Misleading => "misleading",
            Verdict::Unverified => "unverified",
        }
    }

    /// Case-insensitive parse; anything unrecognized maps to `Unverified`.
    /// Model replies go through this, so unknown labels degrade safely.
    pub fn coerce(s: &str) -> Verdict {
        match s.trim().to_lowercase().as_str() {
            "true" => Verdict::True,
            "false" => Verdict::False,
            "misleading" => Verdict::Misleading,
            _ => Verdict::Unverified,
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Verdict {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Verdict::coerce(s))
    }
}
