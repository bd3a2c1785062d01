use thiserror::Error;

use crate::policy::{Operation, Role};

#[derive(Debug, Error)]
pub enum DepotError {
    #[error("not initialized: run 'depot init'")]
    NotInitialized,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("insufficient stock for item {id}: {available} available, {requested} requested")]
    InsufficientStock {
        id: u64,
        available: u64,
        requested: u64,
    },

    #[error("role '{role}' may not {operation}")]
    Forbidden { operation: Operation, role: Role },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: u64 },

    #[error("record store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("notification delivery failed: {0}")]
    Delivery(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl DepotError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Wrap a backend failure. Every store error surfaces under one variant.
    pub fn store(err: impl std::fmt::Display) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DepotError>;
