use tracing::{debug, warn};
use uuid::Uuid;

use crate::browser::driver::Driver;
use crate::utils::error::{DriverError, ScoutError};

/// Exclusive owner of one live automation handle.
///
/// Release is idempotent and also runs on drop, so a session is closed on
/// every exit path.
pub struct Session {
    id: Uuid,
    driver: Option<Box<dyn Driver>>,
}

impl Session {
    pub fn new(driver: Box<dyn Driver>) -> Self {
        let id = Uuid::new_v4();
        debug!(session = %id, "Session acquired");
        Self {
            id,
            driver: Some(driver),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_open(&self) -> bool {
        self.driver.is_some()
    }

    pub fn driver(&self) -> Result<&dyn Driver, DriverError> {
        match &self.driver {
            Some(driver) => Ok(driver.as_ref()),
            None => Err(DriverError::Closed),
        }
    }

    pub fn driver_mut(&mut self) -> Result<&mut dyn Driver, DriverError> {
        match &mut self.driver {
            Some(driver) => Ok(driver.as_mut()),
            None => Err(DriverError::Closed),
        }
    }

    pub fn release(&mut self) {
        if let Some(mut driver) = self.driver.take() {
            if let Err(e) = driver.close() {
                warn!(session = %self.id, error = %e, "Error while closing session");
            }
            debug!(session = %self.id, "Session released");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Source of fresh sessions; one per run, or one per drill-down worker item.
pub trait SessionFactory: Send + Sync {
    fn acquire(&self) -> Result<Session, ScoutError>;
}
