//! Creator-persona heuristics.

use hooklab_core::types::{CreatorPersona, PersonaType, Viewport, VisitorContext};

use crate::device::{classify_device, is_mobile_user_agent};

const MOBILE_CREATOR_CONFIDENCE: f64 = 0.8;
const YOUTUBE_CREATOR_CONFIDENCE: f64 = 0.7;
const PROFESSIONAL_CREATOR_CONFIDENCE: f64 = 0.6;
const GENERAL_USER_CONFIDENCE: f64 = 0.5;

/// Guess the visitor's creator archetype. Branches are checked in priority
/// order and the first match wins.
pub fn classify_persona(context: &VisitorContext) -> CreatorPersona {
    let referrer = context.referrer.to_ascii_lowercase();
    let screen = effective_screen(context);
    let referrer_platform = ["tiktok", "instagram", "youtube", "linkedin"]
        .into_iter()
        .find(|p| referrer.contains(p));

    let (persona_type, confidence) = if is_mobile_user_agent(&context.user_agent)
        && (referrer.contains("tiktok") || referrer.contains("instagram"))
    {
        (PersonaType::MobileContentCreator, MOBILE_CREATOR_CONFIDENCE)
    } else if referrer.contains("youtube") || screen.width >= 1920 {
        (PersonaType::YoutubeCreator, YOUTUBE_CREATOR_CONFIDENCE)
    } else if referrer.contains("linkedin") || (screen.width >= 2560 && screen.height >= 1440) {
        (PersonaType::ProfessionalCreator, PROFESSIONAL_CREATOR_CONFIDENCE)
    } else {
        (PersonaType::GeneralUser, GENERAL_USER_CONFIDENCE)
    };

    let platform = match referrer_platform {
        Some(p) => p.to_string(),
        None => classify_device(&context.user_agent, context.viewport)
            .category
            .as_str()
            .to_string(),
    };

    CreatorPersona {
        persona_type,
        platform,
        confidence,
    }
}

/// Screen dimensions, falling back to the viewport when the screen size
/// was not captured.
fn effective_screen(context: &VisitorContext) -> Viewport {
    if context.screen.width > 0 {
        context.screen
    } else {
        context.viewport
    }
}
