//! Declarative detection heuristics for one platform.
//!
//! Window titles and process names change between app releases, so the rules
//! live in configuration (`[detectors.<platform>]`) with built-in defaults in
//! [`crate::detect::platforms`].

use crate::detect::sensors::PowerAssertion;
use crate::detect::window::WindowInfo;
use serde::{Deserialize, Serialize};

/// How a detector combines its sub-signals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombineMode {
    /// Every sub-signal reports its own transitions.
    #[default]
    Independent,
    /// One combined signal, active only while every configured sub-signal is.
    AllOf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformProfile {
    pub enabled: bool,
    pub mode: CombineMode,
    /// Substring of the virtual audio device the app creates.
    pub audio_device: Option<String>,
    pub assertion: Option<AssertionRule>,
    pub window: Option<WindowRule>,
    pub udp: Option<UdpRule>,
}

impl Default for PlatformProfile {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: CombineMode::Independent,
            audio_device: None,
            assertion: None,
            window: None,
            udp: None,
        }
    }
}

impl PlatformProfile {
    /// True when the profile needs the periodic assertion/socket poll.
    pub fn needs_polling(&self) -> bool {
        self.assertion.is_some() || self.udp.is_some()
    }
}

/// Matches a power assertion.
///
/// `kind` and `name` must match exactly when set. When `process` or
/// `name_contains` is set, at least one of them has to match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssertionRule {
    pub kind: Option<String>,
    pub name: Option<String>,
    pub process: Option<String>,
    pub name_contains: Option<String>,
}

impl AssertionRule {
    pub fn matches(&self, assertion: &PowerAssertion) -> bool {
        if let Some(kind) = &self.kind {
            if &assertion.kind != kind {
                return false;
            }
        }
        if let Some(name) = &self.name {
            if &assertion.name != name {
                return false;
            }
        }

        if self.process.is_none() && self.name_contains.is_none() {
            return true;
        }
        let by_process = self
            .process
            .as_ref()
            .is_some_and(|p| &assertion.process_name == p);
        let by_name = self
            .name_contains
            .as_ref()
            .is_some_and(|n| assertion.name.contains(n.as_str()));
        by_process || by_name
    }

    pub fn any_match(&self, assertions: &[PowerAssertion]) -> bool {
        assertions.iter().any(|a| self.matches(a))
    }
}

/// Matches an on-screen window by owner and title.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowRule {
    pub owner: String,
    pub title_equals: Option<String>,
    pub title_suffix: Option<String>,
    /// Any one of these substrings must appear in the title.
    pub title_contains: Vec<String>,
    pub exclude_prefixes: Vec<String>,
    pub case_insensitive: bool,
    pub layer_zero_only: bool,
}

impl WindowRule {
    fn has_title_constraint(&self) -> bool {
        self.title_equals.is_some() || self.title_suffix.is_some() || !self.title_contains.is_empty()
    }

    pub fn matches(&self, window: &WindowInfo) -> bool {
        if window.owner_name != self.owner {
            return false;
        }
        if self.layer_zero_only && window.layer != 0 {
            return false;
        }
        if !self.has_title_constraint() {
            return true;
        }
        if window.title.is_empty() {
            return false;
        }

        let fold = |s: &str| {
            if self.case_insensitive {
                s.to_lowercase()
            } else {
                s.to_string()
            }
        };
        let title = fold(&window.title);

        if let Some(equals) = &self.title_equals {
            if title != fold(equals) {
                return false;
            }
        }
        if let Some(suffix) = &self.title_suffix {
            if !title.ends_with(&fold(suffix)) {
                return false;
            }
        }
        if !self.title_contains.is_empty()
            && !self.title_contains.iter().any(|c| title.contains(&fold(c)))
        {
            return false;
        }
        !self
            .exclude_prefixes
            .iter()
            .any(|prefix| title.starts_with(&fold(prefix)))
    }

    pub fn any_match(&self, windows: &[WindowInfo]) -> bool {
        windows.iter().any(|w| self.matches(w))
    }
}

/// Active while the process holds more than `threshold` UDP sockets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UdpRule {
    pub process: String,
    pub threshold: usize,
}

impl UdpRule {
    pub fn is_active(&self, count: usize) -> bool {
        count > self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assertion(kind: &str, name: &str, process: &str) -> PowerAssertion {
        PowerAssertion {
            kind: kind.to_string(),
            name: name.to_string(),
            process_name: process.to_string(),
            pid: 1,
        }
    }

    #[test]
    fn test_assertion_rule_by_name() {
        let rule = AssertionRule {
            name: Some("Microsoft Teams Call in progress".to_string()),
            ..Default::default()
        };
        assert!(rule.matches(&assertion(
            "PreventUserIdleDisplaySleep",
            "Microsoft Teams Call in progress",
            "MSTeams"
        )));
        assert!(!rule.matches(&assertion("PreventUserIdleDisplaySleep", "Other", "MSTeams")));
    }

    #[test]
    fn test_assertion_rule_process_or_name() {
        let rule = AssertionRule {
            kind: Some("PreventUserIdleSystemSleep".to_string()),
            process: Some("FaceTime".to_string()),
            name_contains: Some("FaceTime".to_string()),
            ..Default::default()
        };
        assert!(rule.matches(&assertion("PreventUserIdleSystemSleep", "call", "FaceTime")));
        assert!(rule.matches(&assertion(
            "PreventUserIdleSystemSleep",
            "com.apple.FaceTime.call",
            "avconferenced"
        )));
        assert!(!rule.matches(&assertion("PreventUserIdleSystemSleep", "audio", "coreaudiod")));
        assert!(!rule.matches(&assertion("PreventUserIdleDisplaySleep", "call", "FaceTime")));
    }

    #[test]
    fn test_window_rule_suffix_and_exclusions() {
        let rule = WindowRule {
            owner: "Microsoft Teams".to_string(),
            title_suffix: Some("| Microsoft Teams".to_string()),
            exclude_prefixes: vec!["Chat |".to_string()],
            ..Default::default()
        };
        assert!(rule.matches(&WindowInfo::new(
            "Microsoft Teams",
            "Weekly sync | Microsoft Teams"
        )));
        assert!(!rule.matches(&WindowInfo::new(
            "Microsoft Teams",
            "Chat | General | Microsoft Teams"
        )));
        assert!(!rule.matches(&WindowInfo::new("Microsoft Teams", "")));
        assert!(!rule.matches(&WindowInfo::new("Safari", "Weekly sync | Microsoft Teams")));
    }

    #[test]
    fn test_window_rule_case_insensitive_contains() {
        let rule = WindowRule {
            owner: "Slack".to_string(),
            title_contains: vec!["huddle".to_string()],
            case_insensitive: true,
            ..Default::default()
        };
        assert!(rule.matches(&WindowInfo::new("Slack", "Huddle with Sam")));
        assert!(!rule.matches(&WindowInfo::new("Slack", "general - Acme")));
    }

    #[test]
    fn test_window_rule_owner_only() {
        let rule = WindowRule {
            owner: "FaceTime".to_string(),
            layer_zero_only: true,
            ..Default::default()
        };
        assert!(rule.matches(&WindowInfo::new("FaceTime", "")));
        let mut floating = WindowInfo::new("FaceTime", "");
        floating.layer = 3;
        assert!(!rule.matches(&floating));
    }

    #[test]
    fn test_udp_rule_threshold_is_exclusive() {
        let rule = UdpRule {
            process: "zoom.us".to_string(),
            threshold: 2,
        };
        assert!(!rule.is_active(2));
        assert!(rule.is_active(3));
    }
}
