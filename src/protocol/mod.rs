pub mod bridge;
pub mod canonical;
pub mod completion;
pub mod mapping;
pub mod openai_chat;
pub mod push;

use crate::config::BackendConfig;

use self::bridge::BridgeRequest;
use self::canonical::{BackendKind, CanonicalRequest};
use self::completion::CompletionRequest;
use self::mapping::ModelMap;
use self::push::PushRequest;

/// Backend-specific projection of a canonical request.
#[derive(Debug, Clone)]
pub enum ProviderRequest {
    Completion(CompletionRequest),
    Bridge(BridgeRequest),
    Push(PushRequest),
}

impl ProviderRequest {
    #[must_use]
    pub fn kind(&self) -> BackendKind {
        match self {
            ProviderRequest::Completion(_) => BackendKind::Completion,
            ProviderRequest::Bridge(_) => BackendKind::CumulativeSse,
            ProviderRequest::Push(_) => BackendKind::Push,
        }
    }
}

/// Project a canonical request into the shape the configured backend speaks.
#[must_use]
pub fn project(
    canonical: &CanonicalRequest,
    backend: &BackendConfig,
    models: &ModelMap,
) -> ProviderRequest {
    match backend {
        BackendConfig::Completion { .. } => ProviderRequest::Completion(
            completion::encoder::encode_completion_request(canonical, models),
        ),
        BackendConfig::CumulativeSse { .. } => {
            ProviderRequest::Bridge(bridge::encoder::encode_bridge_request(canonical, models))
        }
        BackendConfig::Push { bot, .. } => {
            ProviderRequest::Push(push::encoder::encode_push_request(canonical, bot))
        }
    }
}
