use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Counts in-flight persist operations. Any number of operations may register
/// concurrently; commit and rollback block until every registration has been released.
/// Registrations are released by dropping the returned guard, so a panicking persister
/// can never wedge the counter.
pub struct InflightCounter {
    count: Mutex<usize>,
    zero: Condvar,
}

/// Releases its registration when dropped
pub struct InflightGuard<'a> {
    counter: &'a InflightCounter,
}

impl InflightCounter {
    pub fn new() -> Self {
        Self {
            count: Mutex::new(0),
            zero: Condvar::new(),
        }
    }

    /// Registers an arrival
    pub fn register(&self) -> InflightGuard<'_> {
        *self.count.lock().unwrap() += 1;
        InflightGuard { counter: self }
    }

    /// Blocks until the count reaches zero
    pub fn await_zero(&self) {
        let guard = self.count.lock().unwrap();
        let _guard = self.zero.wait_while(guard, |count| *count > 0).unwrap();
    }

    /// Blocks until the count reaches zero or the timeout elapses. Returns false if the
    /// wait timed out with operations still registered.
    pub fn await_zero_bounded(&self, timeout: Duration) -> bool {
        let guard = self.count.lock().unwrap();
        let (guard, result) = self
            .zero
            .wait_timeout_while(guard, timeout, |count| *count > 0)
            .unwrap();
        !result.timed_out() && *guard == 0
    }
}

impl Default for InflightCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        let mut count = self.counter.count.lock().unwrap();
        *count -= 1;
        if *count == 0 {
            self.counter.zero.notify_all();
        }
    }
}
