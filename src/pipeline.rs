//! Pipeline coordinator.
//!
//! Builds one query per attendee, pushes them through a shared queue to a
//! pool of price-graph workers and streams each origin's outcome to a
//! [`Reporter`] as it arrives.

use std::{sync::Arc, time::Instant};

use futures::future::join_all;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    classifier::ClassSelector,
    config::{FailurePolicy, ServiceConfig},
    error::FareError,
    model::{Attendee, ClassificationRules, QueryTemplate},
    pricing::{PricingService, ServiceGuard},
    report::{Reporter, RunReport},
    worker::{run_worker, OriginOutcome, SharedQueue, WorkerContext},
};

pub struct Pipeline<S> {
    ctx: Arc<WorkerContext<ServiceGuard<Arc<S>>>>,
    config: ServiceConfig,
    cancel: CancellationToken,
}

impl<S: PricingService> Pipeline<S> {
    pub fn new(service: Arc<S>, rules: ClassificationRules, config: ServiceConfig) -> Self {
        let cancel = CancellationToken::new();
        let guarded = Arc::new(ServiceGuard::new(
            service,
            config.request_timeout(),
            cancel.clone(),
        ));
        let selector = ClassSelector::new(guarded.clone(), rules, config.probe_policy)
            .with_currency(config.currency.clone())
            .with_language(config.language.clone());

        let ctx = Arc::new(WorkerContext {
            service: guarded,
            selector,
            fetch_limit: Arc::new(Semaphore::new(config.fetch_limit())),
        });

        Self {
            ctx,
            config,
            cancel,
        }
    }

    // Cancelling this token stops every in-flight service call of the run
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Prices every attendee's trip to the template's destination.
    ///
    /// With [`FailurePolicy::FailFast`] (the default) the first failure
    /// cancels the run and is returned as the error. With
    /// [`FailurePolicy::Isolate`] a failed origin is reported and the run
    /// continues; the returned report lists every outcome.
    pub async fn run<R: Reporter>(
        &self,
        attendees: &[Attendee],
        template: &QueryTemplate,
        reporter: &mut R,
    ) -> Result<RunReport, FareError> {
        let started = Instant::now();
        let worker_count = self.config.worker_count(attendees.len());
        info!(
            attendees = attendees.len(),
            workers = worker_count,
            destination = %template.destination,
            "Starting fare search"
        );

        // Capacity one is the closest tokio gets to an unbuffered channel
        let (query_tx, query_rx) = mpsc::channel(1);
        let queue: SharedQueue = Arc::new(Mutex::new(query_rx));
        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel::<OriginOutcome>();

        let workers: Vec<_> = (0..worker_count)
            .map(|id| {
                tokio::spawn(run_worker(
                    id,
                    Arc::clone(&self.ctx),
                    Arc::clone(&queue),
                    outcome_tx.clone(),
                ))
            })
            .collect();
        drop(outcome_tx);

        let queries: Vec<_> = attendees
            .iter()
            .map(|attendee| template.query_for(attendee))
            .collect();
        let producer = tokio::spawn(async move {
            for query in queries {
                debug!(origin = %query.origin(), "Queueing query");
                if query_tx.send(query).await.is_err() {
                    break;
                }
            }
            // query_tx drops here, closing the queue
        });

        let mut report = RunReport::default();
        while let Some(outcome) = outcome_rx.recv().await {
            reporter.origin_finished(&outcome);

            if self.config.failure_policy == FailurePolicy::FailFast {
                if let Err(err) = &outcome.result {
                    error!(origin = %outcome.origin, error = %err, "Aborting run");
                    self.cancel.cancel();
                    producer.abort();
                    for worker in &workers {
                        worker.abort();
                    }
                    return Err(err.clone());
                }
            }
            report.outcomes.push(outcome);
        }

        if let Err(err) = producer.await {
            warn!(error = %err, "Query producer did not finish");
        }
        for joined in join_all(workers).await {
            joined?;
        }

        report.elapsed = started.elapsed();
        info!(
            origins = report.outcomes.len(),
            failed = report.failure_count(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Fare search finished"
        );
        reporter.run_finished(&report);
        Ok(report)
    }
}
