//! Neuro-inclusive prompt enrichment.
//!
//! The enriched instruction is a `SYSTEM:` preamble describing the reader,
//! followed by `USER: ` and the base instruction verbatim. With no feature
//! selected the base instruction is returned unchanged.

use chakwrite_common::{NeuroFeature, UserConfig};

const DYSLEXIA: &str = "\
SYSTEM: You are an assistant for a user with dyslexia. Make the text clear and easy to read.
- Use simple, common vocabulary.
- Keep sentences short and direct.
- Break complex ideas into small, digestible parts.
- Avoid jargon and nested sentence structures.";

const ADHD: &str = "\
SYSTEM: You are an assistant for a user with ADHD. Make the text engaging and easy to scan.
- Structure information with headings, bullet points and numbered lists.
- Keep paragraphs very short (1-3 sentences).
- Highlight key phrases in bold.
- Open with a clear summary or conclusion.";

const AUTISM: &str = "\
SYSTEM: You are an assistant for a user on the autism spectrum. Be clear, direct and unambiguous.
- Use literal and concrete language.
- Avoid idioms, metaphors, sarcasm and figurative speech.
- State the main point explicitly.
- Keep the response logical and structured.";

pub fn preamble(feature: NeuroFeature) -> Option<&'static str> {
    match feature {
        NeuroFeature::Off => None,
        NeuroFeature::Dyslexia => Some(DYSLEXIA),
        NeuroFeature::Adhd => Some(ADHD),
        NeuroFeature::Autism => Some(AUTISM),
    }
}

pub fn enrich(feature: NeuroFeature, base: &str) -> String {
    match preamble(feature) {
        Some(system) => format!("{system}\nUSER: {base}"),
        None => base.to_string(),
    }
}

/// Context lines prepended to an instruction: the page-supplied extra context
/// first, then the last selection remembered in the config.
pub fn selection_context(config: &UserConfig, extra: Option<&str>) -> String {
    let mut out = String::new();
    if let Some(extra) = extra.filter(|e| !e.is_empty()) {
        out.push_str(extra);
        out.push('\n');
    }
    if let Some(selected) = config.last_selected_text() {
        out.push_str("Context: ");
        out.push_str(selected);
        out.push_str("\n\n");
    }
    out
}
