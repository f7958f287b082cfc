//! Condition-based waiting.
//!
//! Every suspension in the pipeline goes through [`Waiter::wait`], which polls
//! the driver until a [`WaitSpec`] holds or its timeout elapses. A miss is
//! returned as a [`TimeoutSignal`] value so each call site picks its own
//! fallback.

use std::thread;
use std::time::{Duration, Instant};
use tokio_retry::strategy::FixedInterval;
use tracing::{debug, trace};

use crate::browser::{Driver, Locator, NodeHandle};
use crate::pipeline::deadline::Deadline;
use crate::pipeline::settings::WaitSettings;
use crate::utils::error::DriverError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    /// At least one element matches; yields the first.
    Present,
    /// A matching element is visible and enabled; yields the first such one.
    Clickable,
    /// At least one element matches; yields all of them in document order.
    AllPresent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitSpec {
    pub locator: Locator,
    pub predicate: Predicate,
    pub timeout: Duration,
    pub scope: Option<NodeHandle>,
}

impl WaitSpec {
    pub fn new(locator: &Locator, predicate: Predicate, timeout: Duration) -> Self {
        Self {
            locator: locator.clone(),
            predicate,
            timeout,
            scope: None,
        }
    }

    pub fn present(locator: &Locator, timeout: Duration) -> Self {
        Self::new(locator, Predicate::Present, timeout)
    }

    pub fn clickable(locator: &Locator, timeout: Duration) -> Self {
        Self::new(locator, Predicate::Clickable, timeout)
    }

    pub fn all_present(locator: &Locator, timeout: Duration) -> Self {
        Self::new(locator, Predicate::AllPresent, timeout)
    }

    /// Restrict matching to descendants of `scope`.
    pub fn within(mut self, scope: NodeHandle) -> Self {
        self.scope = Some(scope);
        self
    }
}

/// The condition did not hold within the budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutSignal {
    pub locator: Locator,
    pub predicate: Predicate,
    pub waited: Duration,
    pub attempts: u32,
    /// Last driver error seen while polling, if any.
    pub last_error: Option<DriverError>,
}

impl std::fmt::Display for TimeoutSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?} '{}' not satisfied after {}ms ({} attempt(s))",
            self.predicate,
            self.locator,
            self.waited.as_millis(),
            self.attempts
        )?;
        if let Some(error) = &self.last_error {
            write!(f, ", last error: {}", error)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    Found(Vec<NodeHandle>),
    TimedOut(TimeoutSignal),
}

impl WaitOutcome {
    pub fn first(&self) -> Option<NodeHandle> {
        match self {
            WaitOutcome::Found(handles) => handles.first().copied(),
            WaitOutcome::TimedOut(_) => None,
        }
    }

    pub fn into_result(self) -> Result<Vec<NodeHandle>, TimeoutSignal> {
        match self {
            WaitOutcome::Found(handles) => Ok(handles),
            WaitOutcome::TimedOut(signal) => Err(signal),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Waiter {
    poll_interval: Duration,
    attempts: u32,
    retry_pause: Duration,
    deadline: Deadline,
}

impl Waiter {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval: poll_interval.max(Duration::from_millis(1)),
            attempts: 1,
            retry_pause: Duration::ZERO,
            deadline: Deadline::none(),
        }
    }

    pub fn from_settings(settings: &WaitSettings) -> Self {
        Self::new(settings.poll_interval).with_retry(settings.attempts, settings.retry_pause)
    }

    /// Repeat the full timeout window up to `attempts` times, pausing
    /// `pause` between windows.
    pub fn with_retry(mut self, attempts: u32, pause: Duration) -> Self {
        self.attempts = attempts.max(1);
        self.retry_pause = pause;
        self
    }

    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn deadline(&self) -> Deadline {
        self.deadline
    }

    /// Upper bound on how long [`Waiter::wait`] can take for `timeout`,
    /// excluding driver call latency.
    pub fn max_wait(&self, timeout: Duration) -> Duration {
        let windows = timeout.saturating_mul(self.attempts);
        let pauses = self.retry_pause.saturating_mul(self.attempts - 1);
        self.deadline.clamp(windows.saturating_add(pauses))
    }

    pub fn wait(&self, driver: &dyn Driver, spec: &WaitSpec) -> WaitOutcome {
        let started = Instant::now();
        let mut last_error = None;
        let mut attempts = 0;

        let pauses = std::iter::once(Duration::ZERO)
            .chain(FixedInterval::new(self.retry_pause))
            .take(self.attempts as usize);

        for pause in pauses {
            if attempts > 0 {
                if self.deadline.hard_expired() {
                    break;
                }
                thread::sleep(self.deadline.clamp(pause));
                debug!(locator = %spec.locator, attempt = attempts + 1, "Retrying wait");
            }
            attempts += 1;

            if let Some(handles) = self.poll_window(driver, spec, &mut last_error) {
                trace!(
                    locator = %spec.locator,
                    found = handles.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Wait satisfied"
                );
                return WaitOutcome::Found(handles);
            }
        }

        let signal = TimeoutSignal {
            locator: spec.locator.clone(),
            predicate: spec.predicate,
            waited: started.elapsed(),
            attempts,
            last_error,
        };
        debug!(signal = %signal, "Wait timed out");
        WaitOutcome::TimedOut(signal)
    }

    fn poll_window(
        &self,
        driver: &dyn Driver,
        spec: &WaitSpec,
        last_error: &mut Option<DriverError>,
    ) -> Option<Vec<NodeHandle>> {
        let window_end = Instant::now() + self.deadline.clamp(spec.timeout);

        loop {
            match probe(driver, spec) {
                Ok(Some(handles)) => return Some(handles),
                Ok(None) => {}
                Err(e) => {
                    trace!(locator = %spec.locator, error = %e, "Probe failed");
                    *last_error = Some(e);
                }
            }

            let now = Instant::now();
            if now >= window_end {
                return None;
            }
            thread::sleep(self.poll_interval.min(window_end - now));
        }
    }
}

fn probe(driver: &dyn Driver, spec: &WaitSpec) -> Result<Option<Vec<NodeHandle>>, DriverError> {
    let handles = driver.find_all(spec.scope.as_ref(), &spec.locator)?;
    if handles.is_empty() {
        return Ok(None);
    }

    match spec.predicate {
        Predicate::Present => Ok(Some(vec![handles[0]])),
        Predicate::AllPresent => Ok(Some(handles)),
        Predicate::Clickable => {
            for handle in handles {
                if driver.is_clickable(&handle)? {
                    return Ok(Some(vec![handle]));
                }
            }
            Ok(None)
        }
    }
}
