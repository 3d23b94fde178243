use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the three chat streams the relay can forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Global,
    Trade,
    Cartel,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Global, Channel::Trade, Channel::Cartel];

    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Global => "global",
            Channel::Trade => "trade",
            Channel::Cartel => "cartel",
        }
    }

    /// Name of the field holding this channel's messages in a chat API response.
    pub fn response_field(self) -> String {
        format!("{}Chat", self.as_str())
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "global" => Ok(Channel::Global),
            "trade" => Ok(Channel::Trade),
            "cartel" => Ok(Channel::Cartel),
            other => Err(anyhow::anyhow!(
                "unknown channel '{other}' (expected global, trade or cartel)"
            )),
        }
    }
}
