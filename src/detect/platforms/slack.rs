use crate::detect::profile::{PlatformProfile, WindowRule};

pub fn profile() -> PlatformProfile {
    PlatformProfile {
        window: Some(WindowRule {
            owner: "Slack".to_string(),
            title_contains: vec!["huddle".to_string()],
            case_insensitive: true,
            ..Default::default()
        }),
        ..Default::default()
    }
}
