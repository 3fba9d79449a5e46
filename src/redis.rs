use std::sync::Arc;

use ::redis::Client;
use backoff::ExponentialBackoff;
use backoff::backoff::Backoff;
use deadpool::managed::QueueMode;
use deadpool_redis::{Config as DeadpoolConfig, Pool, PoolConfig, Runtime, Timeouts};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{GatewayError, Result};

/// Redis connection manager
#[derive(Clone)]
pub struct RedisManager {
    pool: Arc<Pool>,
    url: String,
}

impl RedisManager {
    /// Create a new Redis manager with configuration
    pub async fn new_with_config(config: &crate::config::Config) -> Result<Self> {
        let redis_url = config.get_redis_url();

        tracing::info!(
            "Connecting to Redis at {}:{} (db: {})",
            config.redis.host,
            config.redis.port,
            config.redis.database
        );

        let mut cfg = DeadpoolConfig::from_url(&redis_url);
        cfg.pool = Some(PoolConfig {
            max_size: config.redis.pool.max_size,
            timeouts: Timeouts {
                wait: Some(config.get_pool_timeout()),
                create: Some(config.get_pool_create_timeout()),
                recycle: Some(config.get_pool_recycle_timeout()),
            },
            queue_mode: QueueMode::Fifo,
        });

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| GatewayError::PoolCreation(e.to_string()))?;

        // Test the connection
        let mut conn = pool.get().await?;
        let _: String = ::redis::cmd("PING").query_async(&mut conn).await?;
        tracing::info!("Redis connection established");

        Ok(Self {
            pool: Arc::new(pool),
            url: redis_url,
        })
    }

    /// Get a connection from the pool
    pub async fn get_connection(&self) -> Result<deadpool_redis::Connection> {
        Ok(self.pool.get().await?)
    }

    /// Subscribe to a change feed channel.
    ///
    /// Spawns a background listener that forwards every published message as
    /// an opaque invalidation signal; the payload is never consumed. The
    /// listener reconnects with exponential backoff if the connection drops,
    /// and stops when either the guard or the receiver is dropped.
    pub fn change_feed(&self, channel: &str) -> Result<(mpsc::Receiver<()>, FeedGuard)> {
        let client = Client::open(self.url.as_str())?;
        let channel = channel.to_string();
        let (tx, rx) = mpsc::channel(16);
        let handle = tokio::spawn(feed_loop(client, channel, tx));
        Ok((rx, FeedGuard { handle }))
    }
}

/// Scoped handle for a change-feed subscription. Dropping it tears the
/// listener down, so a remounted consumer never leaks the old one.
pub struct FeedGuard {
    handle: JoinHandle<()>,
}

impl Drop for FeedGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn feed_loop(client: Client, channel: String, tx: mpsc::Sender<()>) {
    let mut delay = ExponentialBackoff {
        max_elapsed_time: None,
        ..ExponentialBackoff::default()
    };
    loop {
        match client.get_async_pubsub().await {
            Ok(mut pubsub) => match pubsub.subscribe(&channel).await {
                Ok(()) => {
                    tracing::info!("Subscribed to change feed on '{channel}'");
                    delay.reset();
                    let mut messages = pubsub.on_message();
                    while messages.next().await.is_some() {
                        if tx.send(()).await.is_err() {
                            // Consumer gone; unsubscribe by dropping.
                            return;
                        }
                    }
                    tracing::warn!("Change feed connection closed, reconnecting");
                }
                Err(e) => {
                    tracing::warn!("Change feed subscribe failed: {e}");
                }
            },
            Err(e) => {
                tracing::warn!("Change feed connection failed: {e}");
            }
        }
        let Some(wait) = delay.next_backoff() else {
            return;
        };
        tokio::time::sleep(wait).await;
    }
}
