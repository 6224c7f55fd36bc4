//! Kumo Cloud provider error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KumoError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Engine error: {0}")]
    Engine(#[from] soraflow_engine::EngineError),
}

pub type Result<T> = std::result::Result<T, KumoError>;
