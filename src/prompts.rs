//! Fixed reply strings and prompt templates.
//!
//! Every canned reply and prompt the bot can produce lives here so the
//! wording can be audited and tuned in one place. The rest of the codebase
//! imports from `crate::prompts`.

/// System preamble for the one LLM call per turn. The recalled-facts block is
/// omitted entirely when there is nothing to recall.
pub fn system_preamble(bot_name: &str, known_facts: &str) -> String {
    if known_facts.is_empty() {
        format!("You are {bot_name}, a friendly assistant. Keep personality consistent.")
    } else {
        format!(
            "You are {bot_name}, a friendly assistant. Keep personality consistent. \
             Known user facts:\n{known_facts}"
        )
    }
}

pub fn identity_reply(bot_name: &str) -> String {
    format!("My name is {bot_name}. I'm here to help and chat with you.")
}

/// Refusal for questions that imply real-world perception.
pub const REFUSAL_REPLY: &str = "I don't have real-world perception like sight or hearing, \
so I can't see or recall real events. But I remember everything you tell me here 💬";

/// Substituted for the LLM reply when the backend call fails.
pub const APOLOGY_REPLY: &str =
    "Sorry, my brain froze for a second there. Give me a moment and ask again 🙏";

/// Final answer when neither the fact store nor memory has anything.
pub const UNKNOWN_REPLY: &str = "I don't know yet.";

pub fn name_reply(name: &str) -> String {
    format!("Your name is {name} 😊")
}

pub fn city_reply(city: &str) -> String {
    format!("You live in {city} 🏙️")
}

pub fn remembered_reply(chunk: &str) -> String {
    format!("Here's what I remember: \"{chunk}\"")
}

/// Inputs that normalize to one of these tokens get a canned greeting
/// instead of an LLM round trip.
pub const GREETING_TOKENS: &[&str] = &["hi", "hello", "hey", "hola"];

pub const GREETING_REPLIES: &[&str] = &[
    "Hey there! 👋",
    "Hi! How's your day going?",
    "Hello hello! 😄",
    "Hey! Good to see you.",
];
