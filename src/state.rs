mod request_id;

use std::sync::Arc;

use crate::backend::BackendSource;
use crate::config::AppConfig;
use crate::engine::{Orchestrator, SessionIdentity};
use crate::protocol::mapping::ModelMap;
use crate::util::unix_now_secs;

use request_id::RequestIdGenerator;

/// Shared application state accessible to all handlers.
///
/// Built once at start-up and never mutated afterwards.
pub struct AppState {
    pub config: AppConfig,
    pub orchestrator: Orchestrator,
    request_ids: RequestIdGenerator,
}

/// Ids assigned to one inbound request.
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: uuid::Uuid,
    pub session: SessionIdentity,
}

impl AppState {
    #[must_use]
    pub fn new(config: AppConfig, backend: Arc<dyn BackendSource>) -> Self {
        let models = ModelMap::new(&config.models);
        let orchestrator = Orchestrator::new(backend, config.backend.clone(), models);
        Self {
            config,
            orchestrator,
            request_ids: RequestIdGenerator::new(),
        }
    }

    /// Allocate the request UUID, response id and creation time for one
    /// inbound request.
    pub fn next_request_ids(&self) -> RequestIds {
        let seq = self.request_ids.next_seq();
        RequestIds {
            request_id: self.request_ids.request_uuid(seq),
            session: SessionIdentity {
                id: Arc::from(self.request_ids.completion_id(seq)),
                created_at: unix_now_secs(),
            },
        }
    }

    #[must_use]
    pub fn models(&self) -> &ModelMap {
        self.orchestrator.models()
    }
}
