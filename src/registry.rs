pub use root_registry::RootRegistry;

mod root_registry {
    use sai::{component_registry, Component};

    use crate::{config::Config, container};

    component_registry!(
        RootRegistry,
        [
            Config,
            container::Registry,
            container::Sweeper,
            container::WebSocket
        ]
    );
}
