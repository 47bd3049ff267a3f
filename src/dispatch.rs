//! Fan-out of one notification to many recipients.
//!
//! Each send runs as its own tokio task, bounded by a semaphore. Results are
//! folded into the [`DispatchReport`] by the single joining loop, so a failed
//! or panicking send only ever bumps `failed`.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::SendError;
use crate::model::{DispatchReport, Recipient};
use crate::notify::{Notification, NotificationSink};

pub const DEFAULT_MAX_IN_FLIGHT: usize = 8;

#[derive(Clone)]
pub struct BatchDispatcher {
    sink: Arc<dyn NotificationSink>,
    max_in_flight: usize,
}

impl BatchDispatcher {
    pub fn new(sink: Arc<dyn NotificationSink>, max_in_flight: usize) -> Self {
        Self {
            sink,
            max_in_flight: max_in_flight.max(1),
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Send `notification` to every recipient and count the outcomes.
    pub async fn dispatch(
        &self,
        recipients: Vec<Recipient>,
        notification: Notification,
    ) -> DispatchReport {
        self.dispatch_until(recipients, notification, std::future::pending::<()>())
            .await
    }

    /// Like [`dispatch`](Self::dispatch), but stops when `cancel` resolves.
    ///
    /// On cancellation every unfinished send is aborted. The returned report
    /// covers exactly the sends that completed; aborted ones are not counted.
    pub async fn dispatch_until<C>(
        &self,
        recipients: Vec<Recipient>,
        notification: Notification,
        cancel: C,
    ) -> DispatchReport
    where
        C: Future<Output = ()>,
    {
        let run_id = Uuid::new_v4();
        let span = info_span!("dispatch", %run_id, kind = notification.kind());
        self.run(recipients, notification, cancel)
            .instrument(span)
            .await
    }

    async fn run<C>(
        &self,
        recipients: Vec<Recipient>,
        notification: Notification,
        cancel: C,
    ) -> DispatchReport
    where
        C: Future<Output = ()>,
    {
        let mut report = DispatchReport::default();
        if recipients.is_empty() {
            info!("no recipients; nothing to send");
            return report;
        }

        let requested = recipients.len();
        let permits = Arc::new(Semaphore::new(self.max_in_flight));
        let notification = Arc::new(notification);
        let mut tasks: JoinSet<(String, Result<(), SendError>)> = JoinSet::new();

        for recipient in recipients {
            let sink = Arc::clone(&self.sink);
            let permits = Arc::clone(&permits);
            let notification = Arc::clone(&notification);
            tasks.spawn(
                async move {
                    let result = match permits.acquire_owned().await {
                        Ok(_permit) => sink.send(&recipient, &notification).await,
                        Err(_) => Err(SendError::Aborted("dispatcher closed".into())),
                    };
                    (recipient.email, result)
                }
                .in_current_span(),
            );
        }

        tokio::pin!(cancel);
        let mut cancelled = false;
        loop {
            tokio::select! {
                biased;
                _ = &mut cancel, if !cancelled => {
                    cancelled = true;
                    warn!(pending = tasks.len(), "dispatch cancelled; aborting unfinished sends");
                    tasks.abort_all();
                }
                joined = tasks.join_next() => match joined {
                    Some(outcome) => tally(&mut report, outcome),
                    None => break,
                },
            }
        }

        info!(
            requested,
            total = report.total_recipients,
            succeeded = report.succeeded,
            failed = report.failed,
            cancelled,
            "dispatch finished"
        );
        report
    }
}

/// The single accumulation point for send outcomes.
fn tally(report: &mut DispatchReport, outcome: Result<(String, Result<(), SendError>), JoinError>) {
    match outcome {
        Ok((_, Ok(()))) => report.record_success(),
        Ok((email, Err(err))) => {
            warn!(recipient = %email, error = %err, "send failed");
            report.record_failure();
        }
        // Aborted by cancellation: never completed, so not part of the report.
        Err(err) if err.is_cancelled() => {}
        Err(err) => {
            warn!(error = %err, "send task panicked");
            report.record_failure();
        }
    }
}
