//! Timestamped meeting evidence produced by detectors.

use crate::platform::Platform;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Which observer produced a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    AudioDevice,
    PowerAssertion,
    WindowList,
    NetworkUdp,
    BrowserBridge,
}

impl SignalSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AudioDevice => "audio_device",
            Self::PowerAssertion => "power_assertion",
            Self::WindowList => "window_list",
            Self::NetworkUdp => "network_udp",
            Self::BrowserBridge => "browser_bridge",
        }
    }
}

/// One assertion that a platform's meeting is active or inactive.
///
/// Signals are consumed once by the coordinator and never stored.
#[derive(Debug, Clone, Serialize)]
pub struct Signal {
    pub platform: Platform,
    pub is_active: bool,
    pub confidence: Confidence,
    pub source: SignalSource,
    pub timestamp: DateTime<Utc>,
}

impl Signal {
    pub fn new(
        platform: Platform,
        is_active: bool,
        confidence: Confidence,
        source: SignalSource,
    ) -> Self {
        Self {
            platform,
            is_active,
            confidence,
            source,
            timestamp: Utc::now(),
        }
    }

    pub fn active(platform: Platform, source: SignalSource) -> Self {
        Self::new(platform, true, Confidence::High, source)
    }

    pub fn inactive(platform: Platform, source: SignalSource) -> Self {
        Self::new(platform, false, Confidence::High, source)
    }

    /// Activity-log line, e.g. `window_list: Zoom active`.
    pub fn describe(&self) -> String {
        format!(
            "{}: {} {}",
            self.source.as_str(),
            self.platform.display_name(),
            if self.is_active { "active" } else { "inactive" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe() {
        let signal = Signal::active(Platform::Zoom, SignalSource::WindowList);
        assert_eq!(signal.describe(), "window_list: Zoom active");

        let signal = Signal::inactive(Platform::Teams, SignalSource::NetworkUdp);
        assert_eq!(signal.describe(), "network_udp: Microsoft Teams inactive");
    }

    #[test]
    fn test_source_serialization() {
        let json = serde_json::to_string(&SignalSource::BrowserBridge).unwrap();
        assert_eq!(json, "\"browser_bridge\"");
    }

    #[test]
    fn test_as_str_matches_wire_name() {
        for source in [
            SignalSource::AudioDevice,
            SignalSource::PowerAssertion,
            SignalSource::WindowList,
            SignalSource::NetworkUdp,
            SignalSource::BrowserBridge,
        ] {
            let json = serde_json::to_value(source).unwrap();
            assert_eq!(json, source.as_str());
        }
    }
}
