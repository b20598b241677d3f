//! Auction notifier.
//!
//! A background task keeps today's auctions in bidding order and sends one
//! notification per auction shortly before it starts. Ingestion nudges it
//! through a [`ChangeSignal`] so that new or edited records are picked up
//! without waiting for the idle poll.

use crate::error::{Error, Result};
use crate::query::QueryEngine;
use crate::signal::ChangeSignal;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use torgi_engine::{Notified, PurchaseRecord, QueryIntent, SchedulerState, Timing};

/// Error returned by a [`Notifier`].
pub type NotifyError = Box<dyn std::error::Error + Send + Sync>;

/// Where the notifier gets its records from.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Today's auctions, ordered by bidding time.
    async fn todays(&self) -> Result<Vec<PurchaseRecord>>;
}

/// Delivers a notification about one record.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        destination: i64,
        record: &PurchaseRecord,
    ) -> std::result::Result<(), NotifyError>;
}

/// Current UTC time.
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> NaiveDateTime;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> NaiveDateTime {
        chrono::Utc::now().naive_utc()
    }
}

#[async_trait]
impl RecordSource for QueryEngine {
    async fn todays(&self) -> Result<Vec<PurchaseRecord>> {
        self.query(0, &[QueryIntent::TodayAuction]).await
    }
}

#[async_trait]
impl<T: RecordSource + ?Sized> RecordSource for Arc<T> {
    async fn todays(&self) -> Result<Vec<PurchaseRecord>> {
        (**self).todays().await
    }
}

#[async_trait]
impl<T: Notifier + ?Sized> Notifier for Arc<T> {
    async fn send(
        &self,
        destination: i64,
        record: &PurchaseRecord,
    ) -> std::result::Result<(), NotifyError> {
        (**self).send(destination, record).await
    }
}

/// Notifier that only writes a log line.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(
        &self,
        destination: i64,
        record: &PurchaseRecord,
    ) -> std::result::Result<(), NotifyError> {
        tracing::info!(
            destination,
            registry_number = %record.registry_number,
            short = record.short_number(),
            bidding = ?record.bidding,
            "auction starting soon: {}",
            record.purchase_subject
        );
        Ok(())
    }
}

/// The notifier loop, not yet running.
pub struct Scheduler<S, N, C = SystemClock> {
    source: S,
    notifier: N,
    clock: C,
    destination: i64,
    timing: Timing,
}

impl<S, N> Scheduler<S, N, SystemClock>
where
    S: RecordSource + 'static,
    N: Notifier + 'static,
{
    pub fn new(source: S, notifier: N, destination: i64, timing: Timing) -> Self {
        Self {
            source,
            notifier,
            clock: SystemClock,
            destination,
            timing,
        }
    }
}

impl<S, N, C> Scheduler<S, N, C>
where
    S: RecordSource + 'static,
    N: Notifier + 'static,
    C: Clock + 'static,
{
    /// Replace the clock "now" is read from.
    pub fn with_clock<C2: Clock + 'static>(self, clock: C2) -> Scheduler<S, N, C2> {
        Scheduler {
            source: self.source,
            notifier: self.notifier,
            clock,
            destination: self.destination,
            timing: self.timing,
        }
    }

    /// Start the loop on a background task.
    pub fn spawn(self, reload_grace: Duration) -> SchedulerHandle {
        let (changes, reload) = ChangeSignal::channel(reload_grace);
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(self.run(reload, stop_rx));

        SchedulerHandle {
            changes,
            stop: Some(stop_tx),
            task,
        }
    }

    /// Run until stopped.
    ///
    /// A failed reload ends the loop with [`Error::SchedulerFatal`]; a failed
    /// send is logged and the record still counts as notified. Records sent
    /// earlier the same day are left out of every reload.
    pub async fn run(
        self,
        mut reload: mpsc::Receiver<()>,
        mut stop: oneshot::Receiver<()>,
    ) -> Result<()> {
        tracing::debug!(destination = self.destination, "starting auction notifier");

        let mut notified = Notified::default();
        notified.roll_over(self.local_now().date());
        let mut state = self.load(&notified).await?;
        let mut reload_open = true;
        let mut stop_open = true;

        loop {
            let now = self.local_now();
            notified.roll_over(now.date());
            let next = state.recompute(now, &self.timing);
            self.log_next(&state);

            tokio::select! {
                biased;

                signal = &mut stop, if stop_open => {
                    if signal.is_ok() {
                        tracing::info!("auction notifier stopped");
                        return Ok(());
                    }
                    // handle dropped without stopping: keep running
                    stop_open = false;
                }
                signal = reload.recv(), if reload_open => {
                    match signal {
                        Some(()) => {
                            tracing::debug!("reloading today's auctions");
                            state = self.load(&notified).await?;
                        }
                        None => reload_open = false,
                    }
                }
                _ = tokio::time::sleep(next.wait) => {
                    if let Some(record) = state.take_due() {
                        self.notify(&record).await;
                        notified.insert(record.registry_number);
                    }
                }
            }
        }
    }

    async fn load(&self, notified: &Notified) -> Result<SchedulerState> {
        match self.source.todays().await {
            Ok(records) => {
                tracing::debug!(
                    records = records.len(),
                    already_notified = notified.len(),
                    "today's auctions loaded"
                );
                Ok(SchedulerState::reload(records, notified))
            }
            Err(e) => {
                tracing::error!("failed to load today's auctions: {}", e);
                Err(Error::SchedulerFatal(Box::new(e)))
            }
        }
    }

    async fn notify(&self, record: &PurchaseRecord) {
        if let Err(e) = self.notifier.send(self.destination, record).await {
            tracing::warn!(
                registry_number = %record.registry_number,
                "failed to send auction notification: {}",
                e
            );
        }
    }

    fn local_now(&self) -> NaiveDateTime {
        self.timing.local(self.clock.now_utc())
    }

    fn log_next(&self, state: &SchedulerState) {
        let Some(next) = state.next() else {
            return;
        };
        match next.index.and_then(|i| state.records().get(i)) {
            Some(record) => tracing::info!(
                registry_number = %record.registry_number,
                bidding = ?record.bidding,
                wait = ?next.wait,
                "nearest auction"
            ),
            None => tracing::info!(wait = ?next.wait, "no upcoming auctions"),
        }
    }
}

/// Control handle of a running notifier.
pub struct SchedulerHandle {
    changes: ChangeSignal,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl SchedulerHandle {
    /// Signal to hand to ingestion.
    pub fn changes(&self) -> ChangeSignal {
        self.changes.clone()
    }

    /// Whether the loop has exited, cleanly or not.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the loop and wait for it to exit.
    ///
    /// Returns the fatal error if the loop had already died.
    pub async fn stop(mut self) -> Result<()> {
        if let Some(stop) = self.stop.take() {
            // the loop may already be gone
            let _ = stop.send(());
        }
        self.task.await?
    }
}
