use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Injectable time source.
///
/// Sweeps and retention math are functions of "now" plus store contents;
/// injecting the clock keeps them deterministic under test.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub type SharedClock = Arc<dyn Clock>;

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub fn system_clock() -> SharedClock {
    Arc::new(SystemClock)
}
