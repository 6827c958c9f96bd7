use sai::{Component, ComponentLifecycle, Injected};

use crate::{config::Config, live::ComponentRegistry};

/// Owns the process-wide [`ComponentRegistry`]. HTTP handlers mount views
/// into it, connections and the sweeper read from it.
#[derive(Component)]
#[lifecycle]
pub struct Registry {
    #[injected]
    config: Injected<Config>,

    components: ComponentRegistry,
}

#[async_trait::async_trait]
impl ComponentLifecycle for Registry {
    async fn start(&mut self) {
        self.components = ComponentRegistry::new(self.config.max_pool_size());
    }

    async fn stop(&mut self) {
        log::info!("shutdown_registry;mounted={}", self.components.size());
    }
}

impl Registry {
    pub fn components(&self) -> ComponentRegistry {
        self.components.clone()
    }
}
