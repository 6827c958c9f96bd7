use log::LevelFilter;
use log4rs_date_appender as log4rs;
use sai::System;
use spark::RootRegistry;
use tokio::signal::{self, unix::SignalKind};

#[derive(Debug)]
struct Date;

impl log4rs::CurrentDate for Date {}

#[tokio::main]
async fn main() {
    log4rs::init_config(log4rs::config::<Date>(
        "log/{year}-{month}-{day}.log",
        LevelFilter::Debug,
    ));

    let mut system = System::<RootRegistry>::new();

    system.start().await;

    let mut sigterm = signal::unix::signal(SignalKind::terminate()).expect("listen for sigterm");

    tokio::select! {
        _ = sigterm.recv() => {},
        _ = async { signal::ctrl_c().await.expect("failed to listen for ctrl_c event") } => {}
    };

    system.stop().await;

    log::info!("gracefully shutdown the app");
}
