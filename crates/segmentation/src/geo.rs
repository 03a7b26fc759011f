//! Coarse region estimate from timezone and locale.

use hooklab_core::types::GeoInfo;

const SOUTH_AMERICAN_ZONES: &[&str] = &[
    "America/Argentina/",
    "America/Asuncion",
    "America/Bogota",
    "America/Buenos_Aires",
    "America/Caracas",
    "America/Guayaquil",
    "America/La_Paz",
    "America/Lima",
    "America/Montevideo",
    "America/Santiago",
    "America/Sao_Paulo",
];

pub fn classify_geo(timezone: Option<&str>, locale: Option<&str>) -> GeoInfo {
    let timezone = timezone.filter(|tz| !tz.is_empty()).unwrap_or("UTC");
    let estimated_region = region_from_timezone(timezone)
        .or_else(|| locale.and_then(region_from_locale))
        .unwrap_or("unknown");

    GeoInfo {
        timezone: timezone.to_string(),
        estimated_region: estimated_region.to_string(),
    }
}

fn region_from_timezone(timezone: &str) -> Option<&'static str> {
    if SOUTH_AMERICAN_ZONES.iter().any(|z| timezone.starts_with(z)) {
        return Some("south_america");
    }
    let area = timezone.split('/').next()?;
    match area {
        "America" | "US" | "Canada" => Some("north_america"),
        "Europe" => Some("europe"),
        "Asia" => Some("asia"),
        "Africa" => Some("africa"),
        "Australia" | "Pacific" => Some("oceania"),
        _ => None,
    }
}

/// Region from the country subtag of a BCP 47 locale (`en-US`, `pt_BR`).
fn region_from_locale(locale: &str) -> Option<&'static str> {
    let country = locale
        .split(['-', '_'])
        .skip(1)
        .find(|part| part.len() == 2)?
        .to_ascii_uppercase();
    match country.as_str() {
        "US" | "CA" | "MX" => Some("north_america"),
        "BR" | "AR" | "CO" | "CL" | "PE" | "VE" | "UY" => Some("south_america"),
        "GB" | "IE" | "DE" | "FR" | "ES" | "IT" | "NL" | "BE" | "SE" | "NO" | "DK" | "FI"
        | "PL" | "PT" | "AT" | "CH" => Some("europe"),
        "IN" | "JP" | "CN" | "KR" | "SG" | "ID" | "PH" | "VN" | "TH" => Some("asia"),
        "AU" | "NZ" => Some("oceania"),
        "ZA" | "NG" | "KE" | "EG" | "MA" => Some("africa"),
        _ => None,
    }
}
