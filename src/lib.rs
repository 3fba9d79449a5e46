pub mod capability;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod maintenance;
pub mod models;
pub mod notify;
pub mod plan;
pub mod quota;
pub mod redis;
pub mod repository;
pub mod repository_traits;
pub mod service;

pub use crate::error::{GatewayError, Result};
pub use crate::service::{AccessDecision, AccessService};
