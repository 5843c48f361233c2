//! Rule-based personality heuristics: identity consistency, tone detection,
//! grounding refusal.
//!
//! All rules are first-match substring containment over lower-cased input.
//! Trigger lists live in ordered tables so priority is explicit instead of
//! implicit in source ordering. No tokenization or negation handling; a
//! phrase containing a trigger substring fires regardless of context, which
//! is an accepted fragility.

use serde::Serialize;

use crate::chat::UserProfile;
use crate::prompts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Empathetic,
    PlayfulRoast,
    Neutral,
}

const IDENTITY_PROBES: &[&str] = &["what is your name", "who are you", "are you a bot"];

const PERCEPTION_PROBES: &[&str] = &[
    "did you see me",
    "where were you",
    "can you see me",
    "did you meet me",
    "what do i look like",
    "show me my picture",
    "what color is my hair",
    "track me",
    "can you hear me",
];

/// Ordered tone rules; the first row with a matching trigger wins.
/// Empathetic MUST stay ahead of roast.
const TONE_RULES: &[(&[&str], Tone)] = &[
    (
        &["i'm feeling down", "i feel sad", "i'm depressed", "i'm upset"],
        Tone::Empathetic,
    ),
    (&["roast", "let's roast", "insult"], Tone::PlayfulRoast),
];

/// Canned reply for identity probes, naming the configured persona.
/// `None` means not handled.
pub fn maintain_identity(text: &str, profile: &UserProfile) -> Option<String> {
    let lowered = text.to_lowercase();
    IDENTITY_PROBES
        .iter()
        .any(|p| lowered.contains(p))
        .then(|| prompts::identity_reply(&profile.bot_name))
}

/// Refusal for questions implying real-world perception. `None` means not
/// handled.
pub fn grounded_response(text: &str) -> Option<&'static str> {
    let lowered = text.to_lowercase();
    PERCEPTION_PROBES
        .iter()
        .any(|p| lowered.contains(p))
        .then_some(prompts::REFUSAL_REPLY)
}

/// Total classification into a tone; defaults to neutral.
pub fn adapt_tone(text: &str) -> Tone {
    let lowered = text.to_lowercase();
    for (triggers, tone) in TONE_RULES {
        if triggers.iter().any(|t| lowered.contains(t)) {
            return *tone;
        }
    }
    Tone::Neutral
}

/// Append the fixed suffix for the tone; identity for neutral.
pub fn natural_response(text: &str, tone: Tone) -> String {
    match tone {
        Tone::Empathetic => format!("{text} 💗 I'm listening, tell me more if you want."),
        Tone::PlayfulRoast => format!("{text} 😏 (roast mode, keep it friendly!)"),
        Tone::Neutral => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> UserProfile {
        UserProfile::new("local_user", "Zeta")
    }

    #[test]
    fn identity_probe_names_bot_exactly_once() {
        let reply = maintain_identity("What is your name?", &profile()).expect("handled");
        assert_eq!(reply.matches("Zeta").count(), 1);
    }

    #[test]
    fn identity_probe_case_insensitive() {
        assert!(maintain_identity("ARE YOU A BOT", &profile()).is_some());
        assert!(maintain_identity("tell me a joke", &profile()).is_none());
    }

    #[test]
    fn grounding_refusal_fires_on_perception_probes() {
        assert_eq!(
            grounded_response("did you see me yesterday"),
            Some(prompts::REFUSAL_REPLY)
        );
        assert_eq!(grounded_response("what do I look like?"), Some(prompts::REFUSAL_REPLY));
        assert_eq!(grounded_response("what does a cat look like"), None);
    }

    #[test]
    fn tone_is_total() {
        assert_eq!(adapt_tone("i feel sad today"), Tone::Empathetic);
        assert_eq!(adapt_tone("roast my code"), Tone::PlayfulRoast);
        assert_eq!(adapt_tone("what's the weather"), Tone::Neutral);
    }

    #[test]
    fn empathetic_beats_roast_on_conflict() {
        // both trigger sets present, priority order must hold
        assert_eq!(adapt_tone("i feel sad, roast me anyway"), Tone::Empathetic);
    }

    #[test]
    fn natural_response_suffixes() {
        assert_eq!(natural_response("ok", Tone::Neutral), "ok");
        assert!(natural_response("ok", Tone::Empathetic).starts_with("ok 💗"));
        assert!(natural_response("ok", Tone::PlayfulRoast).contains("roast mode"));
    }
}
