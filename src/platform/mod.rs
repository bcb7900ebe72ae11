//! Static catalog of supported meeting sources.

use serde::{Deserialize, Serialize};

/// A meeting source the daemon knows how to detect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Teams,
    Zoom,
    Slack,
    FaceTime,
    Chime,
    Browser,
}

impl Platform {
    pub const ALL: [Platform; 6] = [
        Platform::Teams,
        Platform::Zoom,
        Platform::Slack,
        Platform::FaceTime,
        Platform::Chime,
        Platform::Browser,
    ];

    /// Platforms backed by a native desktop application.
    pub fn native() -> impl Iterator<Item = Platform> {
        Self::ALL.into_iter().filter(|p| *p != Platform::Browser)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Teams => "teams",
            Self::Zoom => "zoom",
            Self::Slack => "slack",
            Self::FaceTime => "facetime",
            Self::Chime => "chime",
            Self::Browser => "browser",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Teams => "Microsoft Teams",
            Self::Zoom => "Zoom",
            Self::Slack => "Slack",
            Self::FaceTime => "FaceTime",
            Self::Chime => "Amazon Chime",
            Self::Browser => "Browser",
        }
    }

    /// Identifier the recorder automation uses to pick its recording target.
    pub fn automation_target(&self) -> &'static str {
        match self {
            Self::Teams => "Record Teams",
            Self::Zoom => "Record Zoom",
            Self::Slack => "Record Slack",
            Self::FaceTime => "Record FaceTime",
            Self::Chime => "Record Chime",
            Self::Browser => "Record Comet",
        }
    }

    /// Process names that indicate the platform's app is running.
    ///
    /// The browser has none: it is observed through the extension bridge only.
    pub fn process_names(&self) -> &'static [&'static str] {
        match self {
            Self::Teams => &["MSTeams", "Microsoft Teams", "teams-for-linux"],
            Self::Zoom => &["zoom.us", "zoom", "CptHost"],
            Self::Slack => &["Slack", "slack"],
            Self::FaceTime => &["FaceTime"],
            Self::Chime => &["Amazon Chime"],
            Self::Browser => &[],
        }
    }

    pub fn from_process_name(name: &str) -> Option<Platform> {
        Self::ALL
            .into_iter()
            .find(|p| p.process_names().contains(&name))
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
