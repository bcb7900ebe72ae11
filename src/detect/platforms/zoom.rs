use crate::detect::profile::{PlatformProfile, UdpRule, WindowRule};

pub fn profile() -> PlatformProfile {
    PlatformProfile {
        window: Some(WindowRule {
            owner: "zoom.us".to_string(),
            title_contains: vec!["Zoom Meeting".to_string(), "Zoom Webinar".to_string()],
            ..Default::default()
        }),
        udp: Some(UdpRule {
            process: "zoom.us".to_string(),
            threshold: 2,
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::window::WindowInfo;

    #[test]
    fn test_meeting_and_webinar_windows() {
        let rule = profile().window.unwrap();
        assert!(rule.matches(&WindowInfo::new("zoom.us", "Zoom Meeting")));
        assert!(rule.matches(&WindowInfo::new("zoom.us", "Zoom Webinar")));
        assert!(!rule.matches(&WindowInfo::new("zoom.us", "Zoom Workplace")));
        assert!(!rule.matches(&WindowInfo::new("zoom.us", "")));
    }
}
