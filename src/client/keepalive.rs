// ABOUTME: SMPP keep-alive and bind-timeout supervision for a single session
// ABOUTME: Yields timer events to the session loop: send an enquire_link, or give up on the bind

use std::future::pending;
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at, sleep_until};
use tracing::{debug, warn};

/// Timer event for the session loop to act on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepAliveEvent {
    /// The bind did not complete in time; the connection should be closed
    BindTimeout,
    /// Time to send an enquire_link
    EnquireLink,
}

/// Status information about keep-alive state
///
/// Provides visibility into the current health and statistics of the
/// keep-alive mechanism.
#[derive(Debug, Clone, PartialEq)]
pub struct KeepAliveStatus {
    /// Whether enquire_links are being scheduled
    pub running: bool,

    /// Whether a bind deadline is pending
    pub bind_timeout_armed: bool,

    /// enquire_links sent without a response since the last one answered
    pub outstanding: u32,

    /// Total enquire_link PDUs sent
    pub total_pings: u32,

    /// Total enquire_link_resp PDUs received
    pub total_pongs: u32,
}

/// Bind deadline plus periodic enquire_link schedule for one session.
///
/// The session arms the bind timeout when the transport connects, cancels it
/// and starts the keep-alive once bound, and stops everything on
/// disconnect. [`next_event`](Self::next_event) is cancel safe, so the
/// session can poll it from `tokio::select!` next to socket reads.
#[derive(Debug)]
pub struct KeepAliveSupervisor {
    bind_timeout: Duration,
    interval: Duration,
    bind_deadline: Option<Instant>,
    ticker: Option<Interval>,
    outstanding: u32,
    total_pings: u32,
    total_pongs: u32,
}

impl KeepAliveSupervisor {
    pub fn new(bind_timeout: Duration, interval: Duration) -> Self {
        Self {
            bind_timeout,
            interval,
            bind_deadline: None,
            ticker: None,
            outstanding: 0,
            total_pings: 0,
            total_pongs: 0,
        }
    }

    /// Start the bind countdown from now.
    pub fn arm_bind_timeout(&mut self) {
        self.bind_deadline = Some(Instant::now() + self.bind_timeout);
    }

    pub fn cancel_bind_timeout(&mut self) {
        self.bind_deadline = None;
    }

    /// Schedule enquire_links every interval, the first one interval from now.
    pub fn start_keepalive(&mut self) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);
        self.outstanding = 0;
        debug!("Keep-alive started, interval {:?}", self.interval);
    }

    /// Cancel both timers.
    pub fn stop(&mut self) {
        self.bind_deadline = None;
        if self.ticker.take().is_some() {
            debug!("Keep-alive stopped");
        }
    }

    /// Record an enquire_link going out.
    pub fn on_enquire_link_sent(&mut self) {
        if self.outstanding > 0 {
            warn!(
                "Sending enquire_link while {} earlier one(s) are unanswered",
                self.outstanding
            );
        }
        self.outstanding += 1;
        self.total_pings += 1;
    }

    pub fn on_enquire_link_resp(&mut self) {
        self.outstanding = 0;
        self.total_pongs += 1;
    }

    pub fn status(&self) -> KeepAliveStatus {
        KeepAliveStatus {
            running: self.ticker.is_some(),
            bind_timeout_armed: self.bind_deadline.is_some(),
            outstanding: self.outstanding,
            total_pings: self.total_pings,
            total_pongs: self.total_pongs,
        }
    }

    /// Wait for the next timer event. Never resolves while nothing is armed.
    pub async fn next_event(&mut self) -> KeepAliveEvent {
        let event = {
            let deadline = self.bind_deadline;
            let ticker = self.ticker.as_mut();
            tokio::select! {
                _ = wait_until(deadline) => KeepAliveEvent::BindTimeout,
                _ = wait_tick(ticker) => KeepAliveEvent::EnquireLink,
            }
        };

        if event == KeepAliveEvent::BindTimeout {
            self.bind_deadline = None;
        }
        event
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => pending().await,
    }
}

async fn wait_tick(ticker: Option<&mut Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    fn supervisor() -> KeepAliveSupervisor {
        KeepAliveSupervisor::new(Duration::from_secs(10), Duration::from_secs(55))
    }

    #[tokio::test(start_paused = true)]
    async fn bind_timeout_fires_once() {
        let mut keepalive = supervisor();
        keepalive.arm_bind_timeout();
        let start = Instant::now();

        assert_eq!(keepalive.next_event().await, KeepAliveEvent::BindTimeout);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
        assert!(!keepalive.status().bind_timeout_armed);

        // nothing armed any more
        assert!(
            timeout(Duration::from_secs(3600), keepalive.next_event())
                .await
                .is_err()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_bind_timeout_never_fires() {
        let mut keepalive = supervisor();
        keepalive.arm_bind_timeout();
        keepalive.cancel_bind_timeout();
        assert!(
            timeout(Duration::from_secs(60), keepalive.next_event())
                .await
                .is_err()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn enquire_links_follow_the_interval() {
        let mut keepalive = supervisor();
        keepalive.start_keepalive();
        let start = Instant::now();

        for n in 1..=3u32 {
            assert_eq!(keepalive.next_event().await, KeepAliveEvent::EnquireLink);
            assert_eq!(start.elapsed(), Duration::from_secs(55) * n);
            keepalive.on_enquire_link_sent();
        }

        let status = keepalive.status();
        assert!(status.running);
        assert_eq!(status.outstanding, 3);
        assert_eq!(status.total_pings, 3);

        keepalive.on_enquire_link_resp();
        assert_eq!(keepalive.status().outstanding, 0);
        assert_eq!(keepalive.status().total_pongs, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_silences_everything() {
        let mut keepalive = supervisor();
        keepalive.arm_bind_timeout();
        keepalive.start_keepalive();
        keepalive.stop();

        assert!(!keepalive.status().running);
        assert!(
            timeout(Duration::from_secs(600), keepalive.next_event())
                .await
                .is_err()
        );
    }
}
