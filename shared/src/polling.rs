//! Background refresh cadence.
//!
//! Both machines here are pure: they take an input and return the commands
//! the controller must carry out. Timers are owned by the controller and
//! tracked in [`TimerSlots`], so a late resolution of a cleared timer can be
//! recognised and dropped.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::trace;

use crate::capabilities::TimerId;
use crate::{DEFAULT_ACTIVITY_DEBOUNCE, DEFAULT_POLLING_INTERVAL};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum PollingState {
    #[default]
    Stopped,
    Active,
    Paused,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollCommand {
    CancelIdleTimer,
    ArmIdleTimer(Duration),
    StartPolling(Duration),
    StopPolling,
    Refetch,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollingMachine {
    state: PollingState,
    interval: Duration,
}

impl Default for PollingMachine {
    fn default() -> Self {
        Self::new(DEFAULT_POLLING_INTERVAL)
    }
}

impl PollingMachine {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            state: PollingState::Stopped,
            interval,
        }
    }

    #[must_use]
    pub fn state(&self) -> PollingState {
        self.state
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// User activity. Resumes a paused page with an eager refetch and
    /// always restarts the idle countdown.
    pub fn pulse(&mut self) -> Vec<PollCommand> {
        let mut commands = vec![PollCommand::CancelIdleTimer];
        match self.state {
            PollingState::Stopped => {
                commands.push(PollCommand::StartPolling(self.interval));
            }
            PollingState::Paused => {
                commands.push(PollCommand::Refetch);
                commands.push(PollCommand::StartPolling(self.interval));
            }
            PollingState::Active => {}
        }
        self.state = PollingState::Active;
        commands.push(PollCommand::ArmIdleTimer(self.interval));
        trace!(state = ?self.state, ?commands, "polling pulse");
        commands
    }

    /// No activity for a full interval.
    pub fn idle_timeout(&mut self) -> Vec<PollCommand> {
        match self.state {
            PollingState::Active => {
                self.state = PollingState::Paused;
                vec![PollCommand::StopPolling]
            }
            PollingState::Stopped | PollingState::Paused => Vec::new(),
        }
    }

    pub fn teardown(&mut self) -> Vec<PollCommand> {
        self.state = PollingState::Stopped;
        vec![PollCommand::CancelIdleTimer, PollCommand::StopPolling]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DebouncePulse {
    /// Start the debounce timer.
    Arm(Duration),
    /// A timer is already running; this pulse folds into it.
    Coalesced,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DebounceElapsed {
    /// More pulses arrived during the window; wait another window.
    Rearm(Duration),
    /// The window closed quietly; forward one pulse.
    Flush,
    Ignore,
}

/// Trailing-edge debounce of activity pulses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActivityDebouncer {
    window: Duration,
    armed: bool,
    dirty: bool,
}

impl Default for ActivityDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_ACTIVITY_DEBOUNCE)
    }
}

impl ActivityDebouncer {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            armed: false,
            dirty: false,
        }
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn pulse(&mut self) -> DebouncePulse {
        if self.armed {
            self.dirty = true;
            DebouncePulse::Coalesced
        } else {
            self.armed = true;
            self.dirty = false;
            DebouncePulse::Arm(self.window)
        }
    }

    pub fn elapsed(&mut self) -> DebounceElapsed {
        if !self.armed {
            return DebounceElapsed::Ignore;
        }
        if self.dirty {
            self.dirty = false;
            DebounceElapsed::Rearm(self.window)
        } else {
            self.armed = false;
            DebounceElapsed::Flush
        }
    }

    pub fn reset(&mut self) {
        self.armed = false;
        self.dirty = false;
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimerKind {
    Debounce,
    Idle,
    Poll,
}

/// At most one live timer per kind. Ids are allocated monotonically.
#[derive(Clone, Debug, Default)]
pub struct TimerSlots {
    next_id: u64,
    live: BTreeMap<TimerId, TimerKind>,
}

impl TimerSlots {
    /// Allocates a fresh id for `kind`, returning the id it replaces so the
    /// caller can clear it with the shell.
    pub fn allocate(&mut self, kind: TimerKind) -> (TimerId, Option<TimerId>) {
        let replaced = self.take(kind);
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.live.insert(id, kind);
        (id, replaced)
    }

    pub fn take(&mut self, kind: TimerKind) -> Option<TimerId> {
        let id = self.id_of(kind)?;
        self.live.remove(&id);
        Some(id)
    }

    /// Consumes the slot of an elapsed timer. Unknown ids are stale.
    pub fn resolve(&mut self, id: TimerId) -> Option<TimerKind> {
        self.live.remove(&id)
    }

    pub fn drain(&mut self) -> Vec<TimerId> {
        std::mem::take(&mut self.live).into_keys().collect()
    }

    #[must_use]
    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.id_of(kind).is_some()
    }

    #[must_use]
    pub fn id_of(&self, kind: TimerKind) -> Option<TimerId> {
        self.live
            .iter()
            .find_map(|(id, k)| (*k == kind).then_some(*id))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_millis(1_000);

    /// Minimal virtual clock: fires the idle timer when its deadline passes.
    struct Scheduler {
        now: u64,
        idle_deadline: Option<u64>,
        polling: PollingMachine,
        refetches: usize,
        polling_running: bool,
    }

    impl Scheduler {
        fn new() -> Self {
            Self {
                now: 0,
                idle_deadline: None,
                polling: PollingMachine::new(INTERVAL),
                refetches: 0,
                polling_running: false,
            }
        }

        fn apply(&mut self, commands: Vec<PollCommand>) {
            for command in commands {
                match command {
                    PollCommand::CancelIdleTimer => self.idle_deadline = None,
                    PollCommand::ArmIdleTimer(after) => {
                        self.idle_deadline = Some(self.now + after.as_millis() as u64);
                    }
                    PollCommand::StartPolling(_) => self.polling_running = true,
                    PollCommand::StopPolling => self.polling_running = false,
                    PollCommand::Refetch => self.refetches += 1,
                }
            }
        }

        fn advance_to(&mut self, t: u64) {
            self.now = t;
            if self.idle_deadline.is_some_and(|d| d <= t) {
                self.idle_deadline = None;
                let commands = self.polling.idle_timeout();
                self.apply(commands);
            }
        }

        fn pulse(&mut self) {
            let commands = self.polling.pulse();
            self.apply(commands);
        }
    }

    #[test]
    fn first_pulse_starts_polling_without_refetch() {
        let mut machine = PollingMachine::new(INTERVAL);
        assert_eq!(
            machine.pulse(),
            vec![
                PollCommand::CancelIdleTimer,
                PollCommand::StartPolling(INTERVAL),
                PollCommand::ArmIdleTimer(INTERVAL),
            ]
        );
        assert_eq!(machine.state(), PollingState::Active);
    }

    #[test]
    fn pulse_while_active_only_restarts_idle_timer() {
        let mut machine = PollingMachine::new(INTERVAL);
        machine.pulse();
        assert_eq!(
            machine.pulse(),
            vec![PollCommand::CancelIdleTimer, PollCommand::ArmIdleTimer(INTERVAL)]
        );
    }

    #[test]
    fn idle_then_activity_refetches_exactly_once() {
        let mut s = Scheduler::new();
        s.pulse();
        s.advance_to(1_000);
        assert_eq!(s.polling.state(), PollingState::Paused);
        assert!(!s.polling_running);

        s.advance_to(1_001);
        s.pulse();
        assert_eq!(s.refetches, 1);
        assert!(s.polling_running);
        assert_eq!(s.polling.state(), PollingState::Active);

        s.pulse();
        assert_eq!(s.refetches, 1);
    }

    #[test]
    fn steady_activity_never_pauses() {
        let mut s = Scheduler::new();
        for t in (0..10_000).step_by(500) {
            s.advance_to(t);
            s.pulse();
        }
        assert_eq!(s.polling.state(), PollingState::Active);
        assert_eq!(s.refetches, 0);
    }

    #[test]
    fn idle_timeout_is_ignored_unless_active() {
        let mut machine = PollingMachine::new(INTERVAL);
        assert!(machine.idle_timeout().is_empty());
        machine.pulse();
        assert_eq!(machine.idle_timeout(), vec![PollCommand::StopPolling]);
        assert!(machine.idle_timeout().is_empty());
    }

    #[test]
    fn teardown_stops_everything() {
        let mut machine = PollingMachine::new(INTERVAL);
        machine.pulse();
        assert_eq!(
            machine.teardown(),
            vec![PollCommand::CancelIdleTimer, PollCommand::StopPolling]
        );
        assert_eq!(machine.state(), PollingState::Stopped);
    }

    #[test]
    fn debouncer_coalesces_bursts() {
        let window = Duration::from_millis(100);
        let mut debouncer = ActivityDebouncer::new(window);

        assert_eq!(debouncer.pulse(), DebouncePulse::Arm(window));
        assert_eq!(debouncer.pulse(), DebouncePulse::Coalesced);
        assert_eq!(debouncer.pulse(), DebouncePulse::Coalesced);

        assert_eq!(debouncer.elapsed(), DebounceElapsed::Rearm(window));
        assert_eq!(debouncer.elapsed(), DebounceElapsed::Flush);
        assert_eq!(debouncer.elapsed(), DebounceElapsed::Ignore);

        assert_eq!(debouncer.pulse(), DebouncePulse::Arm(window));
    }

    #[test]
    fn timer_slots_replace_and_drop_stale_ids() {
        let mut slots = TimerSlots::default();
        let (first, replaced) = slots.allocate(TimerKind::Idle);
        assert_eq!(replaced, None);

        let (second, replaced) = slots.allocate(TimerKind::Idle);
        assert_eq!(replaced, Some(first));
        assert_ne!(first, second);

        assert_eq!(slots.resolve(first), None);
        assert_eq!(slots.resolve(second), Some(TimerKind::Idle));
        assert!(!slots.is_armed(TimerKind::Idle));
    }

    #[test]
    fn drain_returns_every_live_timer() {
        let mut slots = TimerSlots::default();
        slots.allocate(TimerKind::Debounce);
        slots.allocate(TimerKind::Poll);
        assert_eq!(slots.drain().len(), 2);
        assert!(slots.is_empty());
    }
}
