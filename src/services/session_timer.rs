//! Attempt countdown. One tick per real second while the attempt is active; reaching zero
//! yields [`Tick::Expired`] exactly once, after which the timer stays idle.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Running(u64),
    Expired,
    Idle,
}

#[derive(Debug, Clone)]
pub struct SessionTimer {
    remaining: u64,
    fired: bool,
}

impl SessionTimer {
    pub fn from_seconds(seconds: u64) -> Self {
        Self { remaining: seconds, fired: false }
    }

    pub fn from_duration_minutes(minutes: u32) -> Self {
        Self::from_seconds(u64::from(minutes) * 60)
    }

    pub fn remaining_seconds(&self) -> u64 {
        self.remaining
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    /// Advances one second. Inactive ticks (loading, submitting) leave the clock untouched.
    pub fn tick(&mut self, active: bool) -> Tick {
        if self.fired || !active {
            return Tick::Idle;
        }

        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.fired = true;
            Tick::Expired
        } else {
            Tick::Running(self.remaining)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_from_minutes() {
        assert_eq!(SessionTimer::from_duration_minutes(3).remaining_seconds(), 180);
    }

    #[test]
    fn expires_exactly_once() {
        let mut timer = SessionTimer::from_seconds(2);
        assert_eq!(timer.tick(true), Tick::Running(1));
        assert_eq!(timer.tick(true), Tick::Expired);
        assert!(timer.has_fired());
        assert_eq!(timer.tick(true), Tick::Idle);
        assert_eq!(timer.tick(true), Tick::Idle);
        assert_eq!(timer.remaining_seconds(), 0);
    }

    #[test]
    fn inactive_ticks_do_not_count_down() {
        let mut timer = SessionTimer::from_seconds(5);
        assert_eq!(timer.tick(false), Tick::Idle);
        assert_eq!(timer.tick(false), Tick::Idle);
        assert_eq!(timer.remaining_seconds(), 5);
        assert_eq!(timer.tick(true), Tick::Running(4));
    }

    #[test]
    fn zero_duration_expires_on_first_active_tick() {
        let mut timer = SessionTimer::from_seconds(0);
        assert_eq!(timer.tick(false), Tick::Idle);
        assert_eq!(timer.tick(true), Tick::Expired);
    }
}
