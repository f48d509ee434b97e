pub mod encoder;

use serde::{Deserialize, Serialize};

/// Message submitted to the push API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushRequest {
    pub bot: String,
    pub prompt: String,
    pub with_chat_break: bool,
}

/// One fragment pushed back by the push API. A missing `text_new` ends the
/// reply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushFragment {
    #[serde(default)]
    pub text_new: Option<String>,
}
