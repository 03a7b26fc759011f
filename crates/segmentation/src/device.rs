//! Device, OS and browser detection from the user-agent string.

use std::sync::LazyLock;

use hooklab_core::types::{DeviceCategory, DeviceInfo, Viewport};
use regex::Regex;

/// Viewport width from which an Android device is treated as a tablet.
pub const TABLET_MIN_WIDTH: u32 = 768;

static MOBILE_UA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)android|iphone|ipad|ipod|blackberry|windows phone").expect("valid regex")
});

static OS_SIGNATURES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)iphone|ipad|ipod", "iOS"),
        (r"(?i)android", "Android"),
        (r"(?i)windows", "Windows"),
        (r"(?i)mac os x|macintosh", "macOS"),
        (r"(?i)linux|x11", "Linux"),
    ]
    .into_iter()
    .map(|(pattern, name)| (Regex::new(pattern).expect("valid regex"), name))
    .collect()
});

// Order matters: Edge and Chrome both advertise "Safari".
static BROWSER_SIGNATURES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)edg(e|a|ios)?/", "Edge"),
        (r"(?i)firefox|fxios", "Firefox"),
        (r"(?i)chrome|crios|chromium", "Chrome"),
        (r"(?i)safari", "Safari"),
    ]
    .into_iter()
    .map(|(pattern, name)| (Regex::new(pattern).expect("valid regex"), name))
    .collect()
});

pub fn is_mobile_user_agent(user_agent: &str) -> bool {
    MOBILE_UA.is_match(user_agent)
}

pub fn classify_device(user_agent: &str, viewport: Viewport) -> DeviceInfo {
    let category = if !is_mobile_user_agent(user_agent) {
        DeviceCategory::Desktop
    } else if is_tablet(user_agent, viewport) {
        DeviceCategory::Tablet
    } else {
        DeviceCategory::Mobile
    };

    DeviceInfo {
        category,
        os: first_match(&OS_SIGNATURES, user_agent).to_string(),
        browser: first_match(&BROWSER_SIGNATURES, user_agent).to_string(),
    }
}

fn is_tablet(user_agent: &str, viewport: Viewport) -> bool {
    let ua = user_agent.to_ascii_lowercase();
    ua.contains("ipad") || (ua.contains("android") && viewport.width >= TABLET_MIN_WIDTH)
}

fn first_match(signatures: &[(Regex, &'static str)], user_agent: &str) -> &'static str {
    signatures
        .iter()
        .find(|(re, _)| re.is_match(user_agent))
        .map(|(_, name)| *name)
        .unwrap_or("Unknown")
}
