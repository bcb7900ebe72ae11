use crate::detect::profile::{AssertionRule, CombineMode, PlatformProfile, WindowRule};

/// A call holds a sleep assertion while a FaceTime window is on screen.
pub fn profile() -> PlatformProfile {
    PlatformProfile {
        mode: CombineMode::AllOf,
        assertion: Some(AssertionRule {
            kind: Some("PreventUserIdleSystemSleep".to_string()),
            process: Some("FaceTime".to_string()),
            name_contains: Some("FaceTime".to_string()),
            ..Default::default()
        }),
        window: Some(WindowRule {
            owner: "FaceTime".to_string(),
            layer_zero_only: true,
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combines_assertion_and_window() {
        let profile = profile();
        assert_eq!(profile.mode, CombineMode::AllOf);
        assert!(profile.assertion.is_some());
        assert!(profile.window.is_some());
        assert!(profile.udp.is_none());
    }
}
