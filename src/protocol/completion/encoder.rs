use crate::protocol::canonical::CanonicalRequest;
use crate::protocol::mapping::ModelMap;

use super::CompletionRequest;

/// Default sampling budget for long-context backend models.
pub const LONG_CONTEXT_MAX_TOKENS: u64 = 100_000;
/// Default sampling budget for every other backend model.
pub const DEFAULT_MAX_TOKENS: u64 = 9016;

const LONG_CONTEXT_SUFFIX: &str = "-100k";
const ASSISTANT_CUE: &str = "\n\nAssistant: ";

/// Render the whole conversation as a two-party transcript ending in an
/// assistant cue.
#[must_use]
pub fn render_transcript(canonical: &CanonicalRequest) -> String {
    let capacity = canonical
        .messages
        .iter()
        .map(|m| m.content.len() + 13)
        .sum::<usize>()
        + ASSISTANT_CUE.len();
    let mut prompt = String::with_capacity(capacity);
    for message in &canonical.messages {
        prompt.push_str("\n\n");
        prompt.push_str(message.role.party_name());
        prompt.push_str(": ");
        prompt.push_str(&message.content);
    }
    prompt.push_str(ASSISTANT_CUE);
    prompt
}

#[must_use]
pub fn default_max_tokens(backend_model: &str) -> u64 {
    if backend_model.ends_with(LONG_CONTEXT_SUFFIX) {
        LONG_CONTEXT_MAX_TOKENS
    } else {
        DEFAULT_MAX_TOKENS
    }
}

/// Encode a canonical request for the single-shot completion API.
///
/// Every sampling parameter present on the request is forwarded, except a
/// zero `max_tokens`, which falls back to the default budget.
#[must_use]
pub fn encode_completion_request(
    canonical: &CanonicalRequest,
    models: &ModelMap,
) -> CompletionRequest {
    let model = models.resolve(&canonical.model).to_string();
    // Zero counts as unset.
    let max_tokens_to_sample = canonical
        .max_tokens
        .filter(|&max_tokens| max_tokens > 0)
        .unwrap_or_else(|| default_max_tokens(&model));
    CompletionRequest {
        prompt: render_transcript(canonical),
        max_tokens_to_sample,
        stop_sequences: canonical.stop.clone(),
        temperature: canonical.temperature,
        model,
    }
}
