use std::fmt;

use serde::{Deserialize, Serialize};

/// Supported bookmarking backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    Linkding,
    Readeck,
}

impl Destination {
    pub const ALL: [Destination; 2] = [Destination::Linkding, Destination::Readeck];

    /// Callback payload used by the destination picker.
    pub fn callback_data(self) -> &'static str {
        match self {
            Destination::Linkding => "linkding",
            Destination::Readeck => "readeck",
        }
    }

    pub fn from_callback_data(data: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.callback_data() == data)
    }

    /// Button label shown in the picker.
    pub fn button_label(self) -> &'static str {
        match self {
            Destination::Linkding => "📌 Linkding",
            Destination::Readeck => "📖 Readeck",
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Linkding => write!(f, "Linkding"),
            Destination::Readeck => write!(f, "Readeck"),
        }
    }
}

/// A completed capture, ready to submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookmarkRequest {
    pub url: String,
    pub tags: Vec<String>,
    pub destination: Destination,
}
