//! Connection lifecycle state machine.
//!
//! Pure bookkeeping: every transition handler updates the state and retry
//! counter and returns the [`Effect`]s the async driver must carry out. No
//! I/O or timers live here.
//!
//! ```text
//! Disconnected --connect--> Connecting --connected--> Connected
//! Connected    --closed/error--> Reconnecting --retry elapsed--> Connecting
//! Connecting   --error--> Reconnecting
//! Reconnecting --budget exhausted--> Disconnected
//! ```

use super::status::ConnectionState;

/// Side effect requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Drop the current socket (if any) and dial a new one.
    OpenSocket,
    /// Drop the current socket without dialing.
    CloseSocket,
    /// Start the periodic keep-alive request.
    StartProbe,
    /// Stop the keep-alive request.
    StopProbe,
    /// Arm the single retry timer.
    ScheduleRetry,
    /// Disarm the retry timer.
    CancelRetry,
}

/// State machine driving connect, retry and give-up decisions.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: ConnectionState,
    retry_count: u32,
    max_retries: u32,
    retry_scheduled: bool,
}

impl Lifecycle {
    pub fn new(max_retries: u32) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            retry_count: 0,
            max_retries,
            retry_scheduled: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn retry_scheduled(&self) -> bool {
        self.retry_scheduled
    }

    /// Explicit connect request from the application.
    ///
    /// Starts a fresh retry budget and supersedes any scheduled retry.
    pub fn connect(&mut self) -> Vec<Effect> {
        self.retry_count = 0;
        let mut effects = self.cancel_retry();
        effects.extend(self.enter_connecting());
        effects
    }

    /// The socket finished connecting.
    pub fn on_connected(&mut self) -> Vec<Effect> {
        self.state = ConnectionState::Connected;
        self.retry_count = 0;

        let mut effects = vec![Effect::StartProbe];
        effects.extend(self.cancel_retry());
        effects
    }

    /// The socket closed or failed, while connecting or connected.
    pub fn on_disconnected(&mut self) -> Vec<Effect> {
        let mut effects = vec![Effect::StopProbe];

        if self.retry_scheduled {
            self.state = ConnectionState::Reconnecting;
        } else if self.retry_count < self.max_retries {
            self.retry_count += 1;
            self.retry_scheduled = true;
            self.state = ConnectionState::Reconnecting;
            effects.push(Effect::ScheduleRetry);
        } else {
            self.state = ConnectionState::Disconnected;
        }

        effects
    }

    /// The retry timer fired.
    pub fn on_retry_elapsed(&mut self) -> Vec<Effect> {
        if !self.retry_scheduled {
            return Vec::new();
        }
        self.retry_scheduled = false;
        self.enter_connecting()
    }

    /// Tear everything down.
    pub fn shutdown(&mut self) -> Vec<Effect> {
        self.state = ConnectionState::Disconnected;
        let mut effects = vec![Effect::StopProbe, Effect::CloseSocket];
        effects.extend(self.cancel_retry());
        effects
    }

    fn enter_connecting(&mut self) -> Vec<Effect> {
        self.state = ConnectionState::Connecting;
        vec![Effect::StopProbe, Effect::OpenSocket]
    }

    fn cancel_retry(&mut self) -> Vec<Effect> {
        if self.retry_scheduled {
            self.retry_scheduled = false;
            vec![Effect::CancelRetry]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_enters_connecting() {
        let mut lifecycle = Lifecycle::new(3);

        let effects = lifecycle.connect();

        assert_eq!(lifecycle.state(), ConnectionState::Connecting);
        assert!(effects.contains(&Effect::OpenSocket));
    }

    #[test]
    fn test_connected_resets_retries_and_starts_probe() {
        let mut lifecycle = Lifecycle::new(3);
        lifecycle.connect();
        lifecycle.on_disconnected();
        lifecycle.on_retry_elapsed();
        assert_eq!(lifecycle.retry_count(), 1);

        let effects = lifecycle.on_connected();

        assert_eq!(lifecycle.state(), ConnectionState::Connected);
        assert_eq!(lifecycle.retry_count(), 0);
        assert_eq!(effects, vec![Effect::StartProbe]);
    }

    #[test]
    fn test_close_schedules_single_retry() {
        let mut lifecycle = Lifecycle::new(3);
        lifecycle.connect();
        lifecycle.on_connected();

        let effects = lifecycle.on_disconnected();

        assert_eq!(lifecycle.state(), ConnectionState::Reconnecting);
        assert_eq!(effects, vec![Effect::StopProbe, Effect::ScheduleRetry]);
        assert!(lifecycle.retry_scheduled());

        // Error and close for the same socket: only one retry
        let effects = lifecycle.on_disconnected();
        assert_eq!(effects, vec![Effect::StopProbe]);
        assert_eq!(lifecycle.retry_count(), 1);
        assert_eq!(lifecycle.state(), ConnectionState::Reconnecting);
    }

    #[test]
    fn test_retry_elapsed_reconnects() {
        let mut lifecycle = Lifecycle::new(3);
        lifecycle.connect();
        lifecycle.on_disconnected();

        let effects = lifecycle.on_retry_elapsed();

        assert_eq!(lifecycle.state(), ConnectionState::Connecting);
        assert!(effects.contains(&Effect::OpenSocket));
        assert!(!lifecycle.retry_scheduled());
    }

    #[test]
    fn test_stale_retry_elapsed_is_ignored() {
        let mut lifecycle = Lifecycle::new(3);
        lifecycle.connect();
        lifecycle.on_connected();

        assert!(lifecycle.on_retry_elapsed().is_empty());
        assert_eq!(lifecycle.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_budget_exhausted_after_max_failures() {
        let mut lifecycle = Lifecycle::new(3);
        lifecycle.connect();

        let mut scheduled = 0;
        loop {
            let effects = lifecycle.on_disconnected();
            if !effects.contains(&Effect::ScheduleRetry) {
                break;
            }
            scheduled += 1;
            lifecycle.on_retry_elapsed();
        }

        assert_eq!(scheduled, 3);
        assert_eq!(lifecycle.state(), ConnectionState::Disconnected);
        assert!(!lifecycle.retry_scheduled());

        // Further failures schedule nothing
        assert_eq!(lifecycle.on_disconnected(), vec![Effect::StopProbe]);
        assert_eq!(lifecycle.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_zero_retries_gives_up_immediately() {
        let mut lifecycle = Lifecycle::new(0);
        lifecycle.connect();

        assert_eq!(lifecycle.on_disconnected(), vec![Effect::StopProbe]);
        assert_eq!(lifecycle.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_explicit_connect_restores_budget() {
        let mut lifecycle = Lifecycle::new(1);
        lifecycle.connect();
        lifecycle.on_disconnected();
        lifecycle.on_retry_elapsed();
        lifecycle.on_disconnected();
        assert_eq!(lifecycle.state(), ConnectionState::Disconnected);

        lifecycle.connect();
        let effects = lifecycle.on_disconnected();

        assert!(effects.contains(&Effect::ScheduleRetry));
    }

    #[test]
    fn test_explicit_connect_cancels_scheduled_retry() {
        let mut lifecycle = Lifecycle::new(3);
        lifecycle.connect();
        lifecycle.on_disconnected();
        assert!(lifecycle.retry_scheduled());

        let effects = lifecycle.connect();

        assert_eq!(
            effects,
            vec![Effect::CancelRetry, Effect::StopProbe, Effect::OpenSocket]
        );
        assert!(!lifecycle.retry_scheduled());
    }

    #[test]
    fn test_shutdown() {
        let mut lifecycle = Lifecycle::new(3);
        lifecycle.connect();
        lifecycle.on_connected();

        let effects = lifecycle.shutdown();

        assert_eq!(lifecycle.state(), ConnectionState::Disconnected);
        assert!(effects.contains(&Effect::CloseSocket));
        assert!(effects.contains(&Effect::StopProbe));
    }
}
