use std::{env, fmt::Debug, net::SocketAddr, str::FromStr, time::Duration};

use sai::{Component, ComponentLifecycle};

use crate::live::{DEFAULT_MAX_POOL_SIZE, DEFAULT_OUTBOX_CAPACITY};

fn env<T>(key: &str, default: T) -> T
where
    T: FromStr,
    <T as FromStr>::Err: Debug,
{
    match env::var(key) {
        Ok(var) => var
            .parse()
            .unwrap_or_else(|err| panic!("Please set {key} to valid value: {err:?}")),
        Err(_) => default,
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub addr: SocketAddr,
    pub live_path: String,
    pub sweep_interval: Duration,
    pub sweep_threshold: Duration,
    pub max_pool_size: usize,
    pub outbox_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 3030)),
            live_path: "/live".to_string(),
            sweep_interval: Duration::from_secs(10),
            sweep_threshold: Duration::from_secs(60),
            max_pool_size: DEFAULT_MAX_POOL_SIZE,
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            addr: env("LIVE_ADDR", default.addr),
            live_path: env("LIVE_PATH", default.live_path),
            sweep_interval: Duration::from_secs(env(
                "SWEEP_INTERVAL",
                default.sweep_interval.as_secs(),
            )),
            sweep_threshold: Duration::from_secs(env(
                "SWEEP_THRESHOLD",
                default.sweep_threshold.as_secs(),
            )),
            max_pool_size: env("MAX_POOL_SIZE", default.max_pool_size),
            outbox_capacity: env("OUTBOX_CAPACITY", default.outbox_capacity),
        }
    }
}

#[derive(Component)]
#[lifecycle]
pub struct Config {
    settings: Settings,
}

#[async_trait::async_trait]
impl ComponentLifecycle for Config {
    async fn start(&mut self) {
        dotenv::dotenv().ok();

        self.settings = Settings::from_env();

        log::info!("config;{:?}", self.settings);
    }
}

impl Config {
    pub fn addr(&self) -> SocketAddr {
        self.settings.addr
    }

    pub fn live_path(&self) -> &str {
        &self.settings.live_path
    }

    pub fn sweep_interval(&self) -> Duration {
        self.settings.sweep_interval
    }

    pub fn sweep_threshold(&self) -> Duration {
        self.settings.sweep_threshold
    }

    pub fn max_pool_size(&self) -> usize {
        self.settings.max_pool_size
    }

    pub fn outbox_capacity(&self) -> usize {
        self.settings.outbox_capacity
    }
}
