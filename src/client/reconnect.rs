// ABOUTME: Exponential-backoff reconnection around any connect-then-serve transport
// ABOUTME: Resets the backoff after each successful connect and can be stopped at any point

use crate::client::error::SmppResult;
use rand_distr::{Distribution, Normal};
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Backoff state: the delay before the next attempt and how many retries
/// have been scheduled since the last successful connect.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    initial_delay: Duration,
    factor: f64,
    max_delay: Duration,
    max_retries: Option<u32>,
    jitter: f64,
    delay: Duration,
    retries: u32,
}

impl ReconnectPolicy {
    /// Policy growing by `e` up to `max(45s, initial_delay)`, with a small
    /// jitter and no retry limit.
    pub fn new(initial_delay: Duration) -> Self {
        ReconnectPolicy {
            initial_delay,
            factor: std::f64::consts::E,
            max_delay: initial_delay.max(Duration::from_secs(45)),
            max_retries: None,
            jitter: 0.119_626_564_72,
            delay: initial_delay,
            retries: 0,
        }
    }

    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = factor;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_max_retries(mut self, max_retries: Option<u32>) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Standard deviation of the jitter as a fraction of the delay; 0 turns
    /// jitter off.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Delay before the next attempt, or `None` once the retry budget is
    /// spent. Each call counts as one retry and grows the delay.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.max_retries.is_some_and(|max| self.retries >= max) {
            return None;
        }
        self.retries += 1;

        let delay = self.delay;
        self.delay = Duration::try_from_secs_f64(delay.as_secs_f64() * self.factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay);
        Some(self.jittered(delay))
    }

    /// Back to the initial delay, with the full retry budget.
    pub fn reset(&mut self) {
        self.delay = self.initial_delay;
        self.retries = 0;
    }

    fn jittered(&self, delay: Duration) -> Duration {
        let mean = delay.as_secs_f64();
        if self.jitter <= 0.0 || mean == 0.0 {
            return delay;
        }
        match Normal::new(mean, mean * self.jitter) {
            Ok(normal) => {
                let sample = normal.sample(&mut rand::thread_rng()).max(0.0);
                Duration::try_from_secs_f64(sample).unwrap_or(delay)
            }
            Err(_) => delay,
        }
    }
}

/// Resolves once the owning [`ReconnectingService`] is stopped or dropped.
#[derive(Debug, Clone)]
pub struct ShutdownSignal(watch::Receiver<bool>);

impl ShutdownSignal {
    pub fn is_stopped(&self) -> bool {
        *self.0.borrow()
    }

    pub async fn recv(mut self) {
        // a dropped sender also means stop
        let _ = self.0.wait_for(|stopped| *stopped).await;
    }
}

/// Something the supervisor can (re)connect.
///
/// `connect` establishes the transport; `run` serves it until it ends.
/// Splitting the two lets the supervisor reset its backoff as soon as a
/// connection exists. `run` must wind its session down and return once
/// `shutdown` resolves; [`ReconnectingService::stop`] waits for it.
pub trait Connector: Send + Sync + 'static {
    type Session: Send;

    fn connect(&self) -> impl Future<Output = io::Result<Self::Session>> + Send;

    fn run(
        &self,
        session: Self::Session,
        shutdown: ShutdownSignal,
    ) -> impl Future<Output = SmppResult<()>> + Send;
}

/// Keeps a [`Connector`] connected until stopped or out of retries.
///
/// ```rust,no_run
/// # use smpp_esme::client::{EsmeConfig, EsmeConnector, ReconnectingService};
/// # use std::sync::Arc;
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = EsmeConfig::load_from_file("esme.toml")?;
/// let (events, _rx) = tokio::sync::mpsc::unbounded_channel();
/// let connector = EsmeConnector::from_config(&config, Arc::new(events)).await?;
///
/// let mut service = ReconnectingService::new(connector, config.reconnect_policy());
/// service.start();
/// // ...
/// service.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct ReconnectingService<C: Connector> {
    connector: Arc<C>,
    policy: ReconnectPolicy,
    shutdown: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl<C: Connector> ReconnectingService<C> {
    pub fn new(connector: C, policy: ReconnectPolicy) -> Self {
        ReconnectingService {
            connector: Arc::new(connector),
            policy,
            shutdown: None,
            task: None,
        }
    }

    /// Spawn the connect loop. The first attempt is made immediately.
    pub fn start(&mut self) {
        if self.task.is_some() {
            return;
        }
        let (shutdown, signal) = watch::channel(false);
        self.shutdown = Some(shutdown);
        self.task = Some(tokio::spawn(supervise(
            self.connector.clone(),
            self.policy.clone(),
            signal,
        )));
    }

    /// Whether the connect loop is still going.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Cancel a pending retry or an in-flight attempt, or ask the live
    /// session to close, and wait for the loop to exit. A live session has
    /// finished its teardown by the time this returns.
    pub async fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(true);
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Reconnect loop ended abnormally: {}", e);
            }
        }
    }
}

async fn supervise<C: Connector>(
    connector: Arc<C>,
    mut policy: ReconnectPolicy,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let attempt = tokio::select! {
            _ = shutdown.changed() => return,
            attempt = connector.connect() => attempt,
        };

        match attempt {
            Ok(session) => {
                policy.reset();
                info!("Connected");
                let outcome = connector
                    .run(session, ShutdownSignal(shutdown.clone()))
                    .await;
                match outcome {
                    Ok(()) => info!("Connection closed"),
                    Err(e) => warn!("Connection lost: {}", e),
                }
                if *shutdown.borrow() {
                    info!("Stopped");
                    return;
                }
            }
            Err(e) => warn!("Connection attempt failed: {}", e),
        }

        let Some(delay) = policy.next_delay() else {
            error!("Giving up after {} retries", policy.retries());
            return;
        };
        info!("Reconnecting in {:.2?}", delay);

        tokio::select! {
            _ = shutdown.changed() => return,
            _ = sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    fn policy(initial: u64, factor: f64, max: u64) -> ReconnectPolicy {
        ReconnectPolicy::new(Duration::from_secs(initial))
            .with_factor(factor)
            .with_max_delay(Duration::from_secs(max))
            .with_jitter(0.0)
    }

    #[test]
    fn delays_grow_to_the_cap() {
        let mut policy = policy(1, 2.0, 10);
        let delays: Vec<u64> = (0..7)
            .map(|_| policy.next_delay().unwrap().as_secs())
            .collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 10, 10, 10]);
    }

    #[test]
    fn reset_restores_the_initial_delay() {
        let mut policy = policy(1, 2.0, 10);
        policy.next_delay();
        policy.next_delay();
        policy.next_delay();
        policy.reset();
        assert_eq!(policy.retries(), 0);
        assert_eq!(policy.next_delay(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn retry_budget_runs_out() {
        let mut policy = policy(1, 2.0, 10).with_max_retries(Some(2));
        assert!(policy.next_delay().is_some());
        assert!(policy.next_delay().is_some());
        assert!(policy.next_delay().is_none());
    }

    #[test]
    fn jitter_spreads_delays_around_the_mean() {
        let mut policy = ReconnectPolicy::new(Duration::from_secs(5)).with_jitter(0.5);
        let samples: Vec<f64> = (0..500)
            .map(|_| {
                policy.reset();
                policy.next_delay().unwrap().as_secs_f64()
            })
            .collect();

        assert!(samples.iter().all(|d| d.is_finite() && *d >= 0.0));
        let distinct = samples.iter().filter(|d| (**d - 5.0).abs() > 1e-9).count();
        assert!(distinct > 400, "jitter left {} of 500 delays unchanged", 500 - distinct);
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        assert!((4.0..6.0).contains(&mean), "mean delay {mean}");
    }

    #[test]
    fn wide_jitter_is_clamped_at_zero() {
        let mut policy = ReconnectPolicy::new(Duration::from_secs(5)).with_jitter(10.0);
        let mut zeros = 0;
        for _ in 0..200 {
            policy.reset();
            let delay = policy.next_delay().expect("no retry limit");
            assert!(delay.as_secs_f64().is_finite());
            if delay.is_zero() {
                zeros += 1;
            }
        }
        // roughly half the samples fall below zero before clamping
        assert!(zeros > 0);
        // the stored delay never carries jitter
        policy.reset();
        policy.next_delay();
        assert_eq!(policy.delay, Duration::from_secs_f64(5.0 * std::f64::consts::E));
    }

    /// Fails every attempt, noting when it was made.
    struct Unreachable {
        attempts: Mutex<Vec<Instant>>,
    }

    impl Connector for Unreachable {
        type Session = ();

        async fn connect(&self) -> io::Result<()> {
            self.attempts
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(Instant::now());
            Err(io::Error::from(io::ErrorKind::ConnectionRefused))
        }

        async fn run(&self, _session: (), _shutdown: ShutdownSignal) -> SmppResult<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failed_attempts_back_off() {
        let connector = Arc::new(Unreachable {
            attempts: Mutex::new(Vec::new()),
        });
        let start = Instant::now();
        let (_shutdown, signal) = watch::channel(false);

        supervise(
            connector.clone(),
            policy(1, 2.0, 10).with_max_retries(Some(6)),
            signal,
        )
        .await;

        let offsets: Vec<u64> = connector
            .attempts
            .lock()
            .unwrap()
            .iter()
            .map(|at| (*at - start).as_secs())
            .collect();
        // delays 1, 2, 4, 8, 10, 10
        assert_eq!(offsets, vec![0, 1, 3, 7, 15, 25, 35]);
    }

    /// Connects instantly; each session lasts `session_len` unless stopped.
    struct Flaky {
        connects: AtomicUsize,
        session_len: Duration,
        wound_down: AtomicUsize,
    }

    impl Flaky {
        fn new(session_len: Duration) -> Self {
            Flaky {
                connects: AtomicUsize::new(0),
                session_len,
                wound_down: AtomicUsize::new(0),
            }
        }
    }

    impl Connector for Flaky {
        type Session = ();

        async fn connect(&self) -> io::Result<()> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn run(&self, _session: (), shutdown: ShutdownSignal) -> SmppResult<()> {
            tokio::select! {
                _ = sleep(self.session_len) => {}
                _ = shutdown.recv() => {
                    // cleanup that takes a while must still finish
                    sleep(Duration::from_secs(1)).await;
                    self.wound_down.fetch_add(1, Ordering::SeqCst);
                }
            }
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn successful_connect_resets_the_backoff() {
        let connector = Arc::new(Flaky::new(Duration::from_secs(100)));
        let (_shutdown, signal) = watch::channel(false);

        // Every retry follows a successful connect, so the budget of one
        // retry is never exhausted and each wait is the initial delay.
        let run = supervise(
            connector.clone(),
            policy(1, 2.0, 10).with_max_retries(Some(1)),
            signal,
        );
        let _ = tokio::time::timeout(Duration::from_secs(350), run).await;

        // connects at 0, 101, 202, 303
        assert_eq!(connector.connects.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_interrupts_a_live_session() {
        let connector = Flaky::new(Duration::from_secs(3600));
        let mut service = ReconnectingService::new(connector, policy(1, 2.0, 10));
        service.start();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(service.is_running());
        assert_eq!(service.connector.wound_down.load(Ordering::SeqCst), 0);

        service.stop().await;
        assert!(!service.is_running());
        assert_eq!(service.connector.connects.load(Ordering::SeqCst), 1);
        // the session saw the stop and finished winding down first
        assert_eq!(service.connector.wound_down.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_service_signals_shutdown() {
        let (stop, signal) = watch::channel(false);
        let signal = ShutdownSignal(signal);
        assert!(!signal.is_stopped());

        drop(stop);
        tokio::time::timeout(Duration::from_secs(1), signal.recv())
            .await
            .unwrap();
    }
}
