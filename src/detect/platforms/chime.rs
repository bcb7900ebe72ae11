use crate::detect::profile::{PlatformProfile, WindowRule};

pub fn profile() -> PlatformProfile {
    PlatformProfile {
        window: Some(WindowRule {
            owner: "Amazon Chime".to_string(),
            title_equals: Some("Amazon Chime: Meeting Controls".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}
