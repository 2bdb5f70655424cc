use std::sync::Arc;

use portico_guard::OutOfContextGuard;
use portico_llm::ChatClient;
use portico_persist::PersistClient;

use crate::config::Config;

/// Shared application state passed to all handlers.
///
/// All resources are wrapped in Arc for efficient sharing across async
/// tasks; nothing here is mutable module-level state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub persist: Arc<PersistClient>,
    pub guard: Arc<OutOfContextGuard>,
    pub chat: Arc<dyn ChatClient>,
}

impl AppState {
    pub fn new(
        config: Config,
        persist: Arc<PersistClient>,
        guard: Arc<OutOfContextGuard>,
        chat: Arc<dyn ChatClient>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            persist,
            guard,
            chat,
        }
    }
}
