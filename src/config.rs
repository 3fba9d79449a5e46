use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::GatewayError;

/// Main configuration structure for the access gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub redis: RedisConfig,
    pub maintenance: MaintenanceConfig,
    pub chat_router: ChatRouterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub name: String,
    pub version: String,
    pub bind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub database: u8,
    pub pool: PoolConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    pub max_size: usize,
    pub timeout_seconds: u64,
    pub create_timeout_seconds: u64,
    pub recycle_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    /// Sorted-set key holding maintenance records, scored by creation time.
    pub record_key: String,
    /// Pub/sub channel carrying change notifications for that table.
    pub feed_channel: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRouterConfig {
    pub url: String,
}

impl Config {
    /// Load configuration from file with environment variable overrides.
    /// Always returns a usable config; parse problems fall back to defaults.
    pub fn load() -> Self {
        if dotenvy::dotenv().is_err() {
            tracing::debug!("No .env file found, continuing with process env only");
        }

        let config_path =
            env::var("GATEWAY_CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());

        let mut config = if Path::new(&config_path).exists() {
            match fs::read_to_string(&config_path) {
                Ok(contents) => match serde_yaml::from_str::<Config>(&contents) {
                    Ok(config) => {
                        tracing::info!("Loaded configuration from {}", config_path);
                        config
                    }
                    Err(e) => {
                        tracing::error!(
                            "Failed to parse config file {}: {} - using defaults",
                            config_path,
                            e
                        );
                        Self::default()
                    }
                },
                Err(e) => {
                    tracing::error!(
                        "Failed to read config file {}: {} - using defaults",
                        config_path,
                        e
                    );
                    Self::default()
                }
            }
        } else {
            tracing::warn!("Config file not found at {} - using defaults", config_path);
            Self::default()
        };

        config.apply_env_overrides();

        if let Err(e) = config.validate() {
            tracing::warn!("Config validation warnings: {} - continuing anyway", e);
        }

        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(name) = env::var("GATEWAY_SERVER_NAME") {
            self.server.name = name;
        }
        if let Ok(bind) = env::var("GATEWAY_HTTP_BIND") {
            self.server.bind = bind;
        }

        if let Ok(host) = env::var("REDIS_HOST") {
            self.redis.host = host;
        }
        if let Ok(port) = env::var("REDIS_PORT") {
            if let Ok(port_num) = port.parse() {
                self.redis.port = port_num;
            }
        }
        if let Ok(db) = env::var("REDIS_DB") {
            if let Ok(db_num) = db.parse() {
                self.redis.database = db_num;
            }
        }
        if let Ok(pool_size) = env::var("GATEWAY_REDIS_POOL_SIZE") {
            if let Ok(size) = pool_size.parse() {
                self.redis.pool.max_size = size;
            }
        }

        if let Ok(channel) = env::var("GATEWAY_MAINTENANCE_CHANNEL") {
            self.maintenance.feed_channel = channel;
        }
        if let Ok(url) = env::var("GATEWAY_CHAT_ROUTER_URL") {
            self.chat_router.url = url;
        }
    }

    fn validate(&self) -> crate::error::Result<()> {
        if self.redis.port == 0 {
            return Err(GatewayError::Config("Redis port cannot be 0".to_string()));
        }
        if self.redis.pool.max_size == 0 {
            return Err(GatewayError::Config(
                "Redis pool max_size cannot be 0".to_string(),
            ));
        }
        if self.maintenance.feed_channel.is_empty() {
            return Err(GatewayError::Config(
                "Maintenance feed channel cannot be empty".to_string(),
            ));
        }
        if self.chat_router.url.is_empty() {
            return Err(GatewayError::Config(
                "Chat router URL cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Get Redis URL with password from environment
    pub fn get_redis_url(&self) -> String {
        let password = env::var("REDIS_PASSWORD").unwrap_or_else(|_| {
            tracing::warn!("REDIS_PASSWORD not set, assuming no password for local development.");
            "".to_string()
        });

        if password.is_empty() {
            format!(
                "redis://{}:{}/{}",
                self.redis.host, self.redis.port, self.redis.database
            )
        } else {
            format!(
                "redis://:{}@{}:{}/{}",
                password, self.redis.host, self.redis.port, self.redis.database
            )
        }
    }

    pub fn get_pool_timeout(&self) -> Duration {
        Duration::from_secs(self.redis.pool.timeout_seconds)
    }

    pub fn get_pool_create_timeout(&self) -> Duration {
        Duration::from_secs(self.redis.pool.create_timeout_seconds)
    }

    pub fn get_pool_recycle_timeout(&self) -> Duration {
        Duration::from_secs(self.redis.pool.recycle_timeout_seconds)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                name: "access-gateway".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                bind: "127.0.0.1:8790".to_string(),
            },
            redis: RedisConfig {
                host: "localhost".to_string(),
                port: 6379,
                database: 0,
                pool: PoolConfig {
                    max_size: 16,
                    timeout_seconds: 5,
                    create_timeout_seconds: 5,
                    recycle_timeout_seconds: 5,
                },
            },
            maintenance: MaintenanceConfig {
                record_key: "maintenance:records".to_string(),
                feed_channel: "maintenance:events".to_string(),
            },
            chat_router: ChatRouterConfig {
                url: "http://localhost:8788/functions/ai-chat-router".to_string(),
            },
        }
    }
}
