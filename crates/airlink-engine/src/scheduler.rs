use std::time::Duration;

/// Yields the processor between poll ticks.
///
/// The engine never spins a wall-clock wait itself; every inter-poll pause
/// goes through the scheduler, so tests can substitute an instant one and
/// count ticks instead of sleeping.
pub trait Scheduler {
    fn sleep(&mut self, d: Duration);
}

/// Scheduler backed by [`std::thread::sleep`].
#[derive(Debug, Default, Clone, Copy)]
pub struct StdScheduler;

impl Scheduler for StdScheduler {
    fn sleep(&mut self, d: Duration) {
        std::thread::sleep(d);
    }
}
