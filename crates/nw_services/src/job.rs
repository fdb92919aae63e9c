use nw_core::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::trending::TrendingSelector;

pub struct JobHandle {
    cancel_tx: broadcast::Sender<()>,
    join: JoinHandle<()>,
}

impl JobHandle {
    pub async fn stop(self) -> Result<()> {
        let _ = self.cancel_tx.send(());
        self.join
            .await
            .map_err(|e| Error::External(anyhow::Error::new(e).context("trending job task failed")))
    }
}

/// Run the trending selection every `interval`, starting immediately.
pub fn spawn_trending_job(selector: Arc<TrendingSelector>, interval: Duration) -> JobHandle {
    let (cancel_tx, mut cancel_rx) = broadcast::channel(1);

    let join = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel_rx.recv() => {
                    info!("trending job shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    match selector.select_trending().await {
                        Ok(trending) => {
                            info!(
                                keyword = %trending.keyword,
                                searches = trending.searches,
                                count = trending.articles.len(),
                                "🔄 background trending refresh done"
                            );
                        }
                        Err(Error::NoTrendingKeyword) => info!("no trending keywords found yet"),
                        Err(err) => warn!(error = %err, "background trending refresh failed"),
                    }
                }
            }
        }
    });

    JobHandle { cancel_tx, join }
}
