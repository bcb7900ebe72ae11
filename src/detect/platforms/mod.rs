//! Built-in heuristics for each native meeting app.

pub mod chime;
pub mod facetime;
pub mod slack;
pub mod teams;
pub mod zoom;

use crate::detect::profile::PlatformProfile;
use crate::platform::Platform;

/// Default profile for a native platform; `None` for the browser.
pub fn default_profile(platform: Platform) -> Option<PlatformProfile> {
    match platform {
        Platform::Teams => Some(teams::profile()),
        Platform::Zoom => Some(zoom::profile()),
        Platform::Slack => Some(slack::profile()),
        Platform::FaceTime => Some(facetime::profile()),
        Platform::Chime => Some(chime::profile()),
        Platform::Browser => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_native_platform_has_a_profile() {
        for platform in Platform::native() {
            let profile = default_profile(platform).unwrap();
            assert!(profile.enabled, "{platform} should be enabled by default");
            assert!(profile.window.is_some(), "{platform} needs a window rule");
        }
        assert!(default_profile(Platform::Browser).is_none());
    }
}
