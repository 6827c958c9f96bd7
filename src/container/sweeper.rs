use std::time::Duration;

use sai::{Component, ComponentLifecycle, Injected};
use tokio::{
    sync::{mpsc, oneshot},
    time::sleep,
};

use crate::{config::Config, container, live::ComponentRegistry};

/// # Sweeper
///
/// Periodically unmounts views that nobody is connected to anymore, which
/// catches connections that died without a close.
#[derive(Component)]
#[lifecycle]
pub struct Sweeper {
    #[injected]
    config: Injected<Config>,

    #[injected]
    registry: Injected<container::Registry>,

    tx: Option<mpsc::Sender<()>>,
    rx: Option<oneshot::Receiver<()>>,
}

#[async_trait::async_trait]
impl ComponentLifecycle for Sweeper {
    async fn start(&mut self) {
        let (stop_sender, rx) = oneshot::channel();
        let (tx, stop_receiver) = mpsc::channel(1);

        self.tx.replace(tx);
        self.rx.replace(rx);

        let components = self.registry.components();
        let interval = self.config.sweep_interval();
        let threshold = self.config.sweep_threshold();

        tokio::spawn(async move {
            sweep_every(components, interval, threshold, stop_receiver).await;

            log::debug!("shutdown_sweeper");

            let _ = stop_sender.send(());
        });
    }

    async fn stop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(()).await;
        }

        if let Some(rx) = self.rx.take() {
            let _ = rx.await;
        }
    }
}

async fn sweep_every(
    components: ComponentRegistry,
    interval: Duration,
    threshold: Duration,
    mut stop_receiver: mpsc::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = stop_receiver.recv() => {
                break;
            }
            _ = sleep(interval) => {}
        };

        let removed = components.sweep(threshold);

        if removed > 0 {
            log::info!("sweep;removed={removed};mounted={}", components.size());
        }
    }
}
