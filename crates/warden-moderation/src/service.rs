//! Moderation service lifecycle
//!
//! `ModerationService` owns the engine's start/stop sequence: subscribe to
//! the bus, rebuild the registry from storage, and on stop unsubscribe and
//! abort background work. Persisted rows outlive the service.

use crate::engine::ModerationEngine;
use crate::loader::RestoreSummary;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::fmt;
use tracing::{error, info};

/// Health status of a runtime service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceHealth {
    /// Service is operating normally
    Healthy,
    /// Service is not operational
    Unhealthy {
        /// Reason for unhealthy state
        reason: String,
    },
    /// Service has not been started
    NotStarted,
    /// Service is starting up
    Starting,
    /// Service has been stopped
    Stopped,
}

impl ServiceHealth {
    /// Returns true if the service is healthy
    pub fn is_healthy(&self) -> bool {
        matches!(self, ServiceHealth::Healthy)
    }
}

impl fmt::Display for ServiceHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceHealth::Healthy => write!(f, "healthy"),
            ServiceHealth::Unhealthy { reason } => write!(f, "unhealthy: {reason}"),
            ServiceHealth::NotStarted => write!(f, "not started"),
            ServiceHealth::Starting => write!(f, "starting"),
            ServiceHealth::Stopped => write!(f, "stopped"),
        }
    }
}

/// Error from a service lifecycle operation
#[derive(Debug, thiserror::Error)]
#[error("[{service}] {message}")]
pub struct ServiceError {
    /// Name of the service that failed
    pub service: &'static str,
    /// Human-readable error message
    pub message: String,
    /// Underlying cause
    #[source]
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ServiceError {
    /// Create a startup failure error
    pub fn startup_failed(service: &'static str, message: impl Into<String>) -> Self {
        Self {
            service,
            message: message.into(),
            cause: None,
        }
    }

    /// Add a cause to this error
    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

/// Lifecycle of a long-running component
#[async_trait]
pub trait RuntimeService: Send + Sync {
    /// Stable service name for logs
    fn name(&self) -> &'static str;

    /// Start the service
    async fn start(&self) -> Result<(), ServiceError>;

    /// Stop the service
    async fn stop(&self) -> Result<(), ServiceError>;

    /// Current health
    fn health(&self) -> ServiceHealth;
}

/// Runs a `ModerationEngine` as a service
pub struct ModerationService {
    engine: ModerationEngine,
    health: RwLock<ServiceHealth>,
    last_restore: RwLock<Option<RestoreSummary>>,
}

impl ModerationService {
    const NAME: &'static str = "moderation";

    /// Wrap `engine`
    pub fn new(engine: ModerationEngine) -> Self {
        Self {
            engine,
            health: RwLock::new(ServiceHealth::NotStarted),
            last_restore: RwLock::new(None),
        }
    }

    /// The wrapped engine
    pub fn engine(&self) -> &ModerationEngine {
        &self.engine
    }

    /// Summary of the restore performed by the last `start`
    pub fn last_restore(&self) -> Option<RestoreSummary> {
        *self.last_restore.read()
    }
}

#[async_trait]
impl RuntimeService for ModerationService {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn start(&self) -> Result<(), ServiceError> {
        *self.health.write() = ServiceHealth::Starting;
        // Subscribe first so that unpunish events published while restoring
        // are handled.
        self.engine.attach();
        match self.engine.restore().await {
            Ok(summary) => {
                *self.last_restore.write() = Some(summary);
                *self.health.write() = ServiceHealth::Healthy;
                info!(
                    service = Self::NAME,
                    tracked = self.engine.registry().len(),
                    "Service started"
                );
                Ok(())
            }
            Err(e) => {
                self.engine.detach();
                error!(service = Self::NAME, error = %e, "Restore failed");
                *self.health.write() = ServiceHealth::Unhealthy {
                    reason: e.to_string(),
                };
                Err(ServiceError::startup_failed(Self::NAME, "failed to restore punishments")
                    .with_cause(e))
            }
        }
    }

    async fn stop(&self) -> Result<(), ServiceError> {
        self.engine.shutdown();
        *self.health.write() = ServiceHealth::Stopped;
        info!(service = Self::NAME, "Service stopped");
        Ok(())
    }

    fn health(&self) -> ServiceHealth {
        self.health.read().clone()
    }
}
