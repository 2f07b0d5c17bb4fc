mod authenticator;
mod session_store;
mod token;

use crate::session_store::Clock;

use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeDelta, TimeZone, Utc};

/// Hand-cranked clock shared between a component and its test.
#[derive(Clone)]
pub(crate) struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub(crate) fn new() -> Self {
        let start = Utc
            .with_ymd_and_hms(2025, 1, 1, 12, 0, 0)
            .single()
            .expect("valid start time");
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock")
    }

    pub(crate) fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock().expect("clock lock");
        *now += by;
    }

    pub(crate) fn as_clock(&self) -> Clock {
        let now = Arc::clone(&self.now);
        Arc::new(move || *now.lock().expect("clock lock"))
    }
}
