use crate::detect::profile::{AssertionRule, PlatformProfile, UdpRule, WindowRule};

/// Teams tabs that share the "| Microsoft Teams" suffix but are not calls.
const NON_MEETING_PREFIXES: &[&str] = &[
    "Chat |",
    "Calendar |",
    "Activity |",
    "Teams |",
    "Assignments |",
    "Files |",
    "Apps |",
    "Calls |",
    "Settings |",
    "People |",
    "OneDrive |",
    "Planner |",
    "Shifts |",
    "Approvals |",
];

pub fn profile() -> PlatformProfile {
    PlatformProfile {
        audio_device: Some("Microsoft Teams Audio".to_string()),
        assertion: Some(AssertionRule {
            name: Some("Microsoft Teams Call in progress".to_string()),
            ..Default::default()
        }),
        window: Some(WindowRule {
            owner: "Microsoft Teams".to_string(),
            title_suffix: Some("| Microsoft Teams".to_string()),
            exclude_prefixes: NON_MEETING_PREFIXES.iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        }),
        udp: Some(UdpRule {
            process: "MSTeams".to_string(),
            threshold: 3,
        }),
        ..Default::default()
    }
}
