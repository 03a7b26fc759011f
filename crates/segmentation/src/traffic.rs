//! Traffic-source classification from the referrer URL.

use hooklab_core::types::{TrafficCategory, TrafficSource};
use url::Url;

const SEARCH_ENGINES: &[(&str, &str)] = &[
    ("google.", "google"),
    ("bing.", "bing"),
    ("yahoo.", "yahoo"),
    ("duckduckgo.", "duckduckgo"),
    ("baidu.", "baidu"),
    ("yandex.", "yandex"),
    ("ecosia.", "ecosia"),
];

const SOCIAL_PLATFORMS: &[(&str, &str)] = &[
    ("facebook.", "meta"),
    ("instagram.", "meta"),
    ("tiktok.", "tiktok"),
    ("youtube.", "youtube"),
    ("youtu.be", "youtube"),
    ("twitter.", "twitter"),
    ("x.com", "twitter"),
    ("t.co", "twitter"),
    ("linkedin.", "linkedin"),
    ("lnkd.in", "linkedin"),
];

const REFERRAL_CONFIDENCE: f64 = 0.7;

/// Classify where a visitor came from. Rules are tried in order and the
/// first match wins: search, social, paid, email campaign, referral.
pub fn classify_traffic_source(referrer: &str) -> TrafficSource {
    let referrer = referrer.trim();
    if referrer.is_empty() {
        return source(TrafficCategory::Direct, "direct", 1.0);
    }

    let Some(url) = parse_referrer(referrer) else {
        return source(TrafficCategory::Referral, referrer, REFERRAL_CONFIDENCE);
    };
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();

    if let Some(engine) = lookup(&host, SEARCH_ENGINES) {
        return source(TrafficCategory::Organic, engine, 0.9);
    }
    if let Some(platform) = lookup(&host, SOCIAL_PLATFORMS) {
        return source(TrafficCategory::Social, platform, 0.9);
    }

    let param = |name: &str| {
        url.query_pairs()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.into_owned())
    };

    if param("gclid").is_some() {
        return source(TrafficCategory::Paid, "google_ads", 0.95);
    }
    if param("fbclid").is_some() {
        return source(TrafficCategory::Paid, "meta_ads", 0.95);
    }
    if let Some(utm_source) = param("utm_source") {
        return source(TrafficCategory::Paid, &utm_source, 0.85);
    }
    // Tagged email links carry utm_source and land in paid above.
    if param("utm_medium").is_some_and(|m| m.eq_ignore_ascii_case("email")) {
        return source(TrafficCategory::Email, "newsletter", 0.9);
    }

    let subcategory = if host.is_empty() { referrer } else { host.as_str() };
    source(TrafficCategory::Referral, subcategory, REFERRAL_CONFIDENCE)
}

fn source(category: TrafficCategory, subcategory: &str, confidence: f64) -> TrafficSource {
    TrafficSource {
        category,
        subcategory: subcategory.to_string(),
        confidence,
    }
}

fn parse_referrer(referrer: &str) -> Option<Url> {
    Url::parse(referrer)
        .ok()
        .filter(|u| u.host_str().is_some())
        .or_else(|| Url::parse(&format!("https://{referrer}")).ok())
}

/// Patterns ending in `.` match anywhere in the host; others are domains
/// that must match the host or one of its parents.
fn lookup<'a>(host: &str, table: &[(&str, &'a str)]) -> Option<&'a str> {
    table
        .iter()
        .find(|(pattern, _)| {
            if pattern.ends_with('.') {
                host.contains(pattern)
            } else {
                host == *pattern || host.ends_with(&format!(".{pattern}"))
            }
        })
        .map(|(_, name)| *name)
}
