use std::time::Duration;

use tokio::time::{self, Instant, Interval, MissedTickBehavior};

/// Poll timer for the active session.
///
/// `tick` never resolves while disarmed or suspended, so it can sit in a
/// `select!` unconditionally.
#[derive(Debug, Default)]
pub(crate) struct Schedule {
    interval: Option<Interval>,
    suspended: bool,
}

impl Schedule {
    /// Start ticking every `period`, first tick one period from now.
    pub fn arm(&mut self, period: Duration) {
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn suspend(&mut self) {
        self.suspended = true;
    }

    /// Unpause; the next tick is a full period away.
    pub fn resume(&mut self) {
        self.suspended = false;
        if let Some(interval) = &mut self.interval {
            interval.reset();
        }
    }

    pub async fn tick(&mut self) {
        match &mut self.interval {
            Some(interval) if !self.suspended => {
                interval.tick().await;
            }
            _ => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_is_one_period_away() {
        let mut schedule = Schedule::default();
        schedule.arm(Duration::from_secs(2));
        let start = Instant::now();

        schedule.tick().await;
        assert_eq!(start.elapsed(), Duration::from_secs(2));
        schedule.tick().await;
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarmed_and_suspended_never_tick() {
        let mut schedule = Schedule::default();
        let idle = time::timeout(Duration::from_secs(30), schedule.tick()).await;
        assert!(idle.is_err());

        schedule.arm(Duration::from_secs(1));
        schedule.suspend();
        let paused = time::timeout(Duration::from_secs(30), schedule.tick()).await;
        assert!(paused.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_resets_the_period() {
        let mut schedule = Schedule::default();
        schedule.arm(Duration::from_secs(5));
        schedule.suspend();
        time::sleep(Duration::from_secs(12)).await;

        let resumed_at = Instant::now();
        schedule.resume();
        schedule.tick().await;
        assert_eq!(resumed_at.elapsed(), Duration::from_secs(5));
    }
}
