use std::{collections::HashMap, sync::Arc};

use crate::live::{Channel, Socket};

pub type ChannelFactory = Arc<dyn Fn(Arc<Socket>) -> Box<dyn Channel> + Send + Sync>;

/// Maps upgrade request paths to the channel serving them.
#[derive(Clone, Default)]
pub struct Router {
    routes: HashMap<String, ChannelFactory>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route<F, C>(mut self, path: &str, factory: F) -> Self
    where
        F: Fn(Arc<Socket>) -> C + Send + Sync + 'static,
        C: Channel + 'static,
    {
        self.routes.insert(
            normalize(path).to_string(),
            Arc::new(move |socket: Arc<Socket>| Box::new(factory(socket)) as Box<dyn Channel>),
        );
        self
    }

    /// Ignores the query string and a trailing slash.
    pub fn resolve(&self, path: &str) -> Option<ChannelFactory> {
        let path = path.split('?').next().unwrap_or(path);

        self.routes.get(normalize(path)).cloned()
    }
}

fn normalize(path: &str) -> &str {
    match path.trim_end_matches('/') {
        "" => "/",
        path => path,
    }
}
