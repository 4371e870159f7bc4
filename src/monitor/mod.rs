//! Periodic fleet checks, door events, alerting, maintenance and retention.
//!
//! Everything that reads-then-writes fridge, alert or door state goes through
//! [`MonitorContext::lock`], so background jobs and API writes never
//! interleave.

pub mod alerts;
pub mod check;
pub mod door;
pub mod door_timers;
pub mod fleet;
pub mod maintenance;
pub mod retention;
pub mod settings;

use std::sync::Arc;

use sqlx::SqlitePool;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};

use crate::hardware::{Hardware, HardwareError};

pub use door_timers::DoorTimers;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("fridge {0} not found")]
    FridgeNotFound(i64),

    #[error("alert {0} not found")]
    AlertNotFound(i64),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("database error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("hardware error: {0}")]
    Hardware(#[from] HardwareError),
}

/// Shared state of the monitoring subsystem.
///
/// Cheap to clone; every clone shares the pool, the driver and the lock.
#[derive(Clone)]
pub struct MonitorContext {
    pool: SqlitePool,
    hardware: Arc<dyn Hardware>,
    door_timers: Arc<Mutex<DoorTimers>>,
}

impl MonitorContext {
    pub fn new(pool: SqlitePool, hardware: Arc<dyn Hardware>) -> Self {
        Self {
            pool,
            hardware,
            door_timers: Arc::new(Mutex::new(DoorTimers::new())),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn hardware(&self) -> &Arc<dyn Hardware> {
        &self.hardware
    }

    /// Acquire the process-wide monitor lock. No timeout.
    pub async fn lock(&self) -> MutexGuard<'_, DoorTimers> {
        self.door_timers.lock().await
    }
}
