// Price-graph worker: drains the shared query queue, one origin at a time

use std::{collections::BTreeSet, sync::Arc};

use tokio::{
    sync::{mpsc, Mutex, Semaphore},
    task::JoinSet,
};
use tracing::{debug, info, instrument, warn};

use crate::{
    classifier::ClassSelector,
    error::FareError,
    fetcher::{fetch_best, DatePairBest},
    model::{BestOffer, DatePair, FlightQuery},
    pricing::PricingService,
    reducer::best_offer,
};

// Multi-consumer view of the query channel
pub type SharedQueue = Arc<Mutex<mpsc::Receiver<FlightQuery>>>;

/// Result of pricing one origin.
#[derive(Debug, Clone, PartialEq)]
pub struct OriginOutcome {
    pub origin: String,
    pub destination: String,
    // Ok(None) when no date pair produced a priced offer
    pub result: Result<Option<BestOffer>, FareError>,
}

impl OriginOutcome {
    pub fn is_failure(&self) -> bool {
        self.result.is_err()
    }
}

pub struct WorkerContext<S> {
    pub service: Arc<S>,
    pub selector: ClassSelector<S>,
    // Caps concurrent date-pair fetches across every worker of a run
    pub fetch_limit: Arc<Semaphore>,
}

pub async fn run_worker<S: PricingService>(
    id: usize,
    ctx: Arc<WorkerContext<S>>,
    queue: SharedQueue,
    outcomes: mpsc::UnboundedSender<OriginOutcome>,
) {
    debug!(worker = id, "Worker started");
    loop {
        let next = queue.lock().await.recv().await;
        let Some(query) = next else {
            break;
        };

        let outcome = price_origin(ctx.as_ref(), query).await;
        if outcomes.send(outcome).is_err() {
            warn!(worker = id, "Outcome receiver dropped, stopping worker");
            break;
        }
    }
    debug!(worker = id, "Worker finished");
}

pub async fn price_origin<S: PricingService>(
    ctx: &WorkerContext<S>,
    query: FlightQuery,
) -> OriginOutcome {
    let origin = query.origin().to_string();
    let destination = query.destination().to_string();
    let result = price_query(ctx, query).await;

    if let Err(err) = &result {
        if !err.is_cancelled() {
            warn!(%origin, %destination, error = %err, "Pricing failed");
        }
    }

    OriginOutcome {
        origin,
        destination,
        result,
    }
}

#[instrument(skip_all, fields(origin = %query.origin(), destination = %query.destination()))]
async fn price_query<S: PricingService>(
    ctx: &WorkerContext<S>,
    query: FlightQuery,
) -> Result<Option<BestOffer>, FareError> {
    let class = ctx
        .selector
        .select(query.origin(), query.destination())
        .await?;
    let query = query.with_cabin_class(class)?;

    let graph = ctx.service.price_graph(&query).await?;
    // The graph may repeat a date pair; each pair is fetched once
    let pairs: BTreeSet<DatePair> = graph.iter().map(|offer| offer.date_pair()).collect();
    info!(%class, candidates = pairs.len(), "Price graph received");

    let query = Arc::new(query);
    let mut fetches = JoinSet::new();
    for dates in pairs {
        let service = Arc::clone(&ctx.service);
        let query = Arc::clone(&query);
        let limit = Arc::clone(&ctx.fetch_limit);

        fetches.spawn(fetch_with_permit(service, query, dates, limit));
    }

    let mut date_pair_bests = Vec::new();
    while let Some(joined) = fetches.join_next().await {
        // An early return drops the JoinSet, which aborts the remaining fetches
        let pair_best = joined??;
        if let Some(offer) = pair_best.offer {
            date_pair_bests.push(offer);
        }
    }

    Ok(best_offer(&date_pair_bests).map(|offer| BestOffer {
        origin: query.origin().to_string(),
        destination: query.destination().to_string(),
        cabin_class: class,
        dates: offer.date_pair(),
        price: offer.price,
    }))
}

async fn fetch_with_permit<S: PricingService>(
    service: Arc<S>,
    query: Arc<FlightQuery>,
    dates: DatePair,
    limit: Arc<Semaphore>,
) -> Result<DatePairBest, FareError> {
    let _permit = limit
        .acquire_owned()
        .await
        .map_err(|_| FareError::Cancelled)?;
    fetch_best(service.as_ref(), &query, dates).await
}
