// Pricing service collaborator: the remote fare API and the guards around it

use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::{
    config::ServiceConfig,
    error::FareError,
    model::{FlightQuery, Offer, OfferArgs},
};

// Remote flight-pricing service. Implementations are shared by every task of a run.
#[async_trait]
pub trait PricingService: Send + Sync + 'static {
    // Offers used only to estimate the shortest flight time on a route
    async fn probe_offers(&self, args: &OfferArgs) -> Result<Vec<Offer>, FareError>;

    // Summary offers over the query's whole date window, one per candidate date pair
    async fn price_graph(&self, query: &FlightQuery) -> Result<Vec<Offer>, FareError>;

    // Concrete offers for exact outbound and return dates
    async fn offers(&self, args: &OfferArgs) -> Result<Vec<Offer>, FareError>;
}

#[async_trait]
impl<S: PricingService + ?Sized> PricingService for Arc<S> {
    async fn probe_offers(&self, args: &OfferArgs) -> Result<Vec<Offer>, FareError> {
        (**self).probe_offers(args).await
    }

    async fn price_graph(&self, query: &FlightQuery) -> Result<Vec<Offer>, FareError> {
        (**self).price_graph(query).await
    }

    async fn offers(&self, args: &OfferArgs) -> Result<Vec<Offer>, FareError> {
        (**self).offers(args).await
    }
}

#[derive(Debug, Deserialize)]
struct OffersResponse {
    offers: Vec<Offer>,
}

/// JSON-over-HTTP client for the fare API.
///
/// One `reqwest::Client` (and its connection pool) is shared by every
/// concurrent call.
#[derive(Debug, Clone)]
pub struct HttpPricingClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpPricingClient {
    pub fn new(config: &ServiceConfig) -> Result<Self, FareError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    async fn post<B: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Vec<Offer>, FareError> {
        let url = format!("{}{}", self.base_url, path);
        trace!(%url, "POST");

        let mut request = self.http.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(FareError::ApiResponse {
                status_code: status.as_u16(),
                message,
            });
        }

        let body: OffersResponse = response.json().await?;
        debug!(%url, offers = body.offers.len(), "Service response");
        Ok(body.offers)
    }
}

#[async_trait]
impl PricingService for HttpPricingClient {
    async fn probe_offers(&self, args: &OfferArgs) -> Result<Vec<Offer>, FareError> {
        self.post("/v1/offers", args).await
    }

    async fn price_graph(&self, query: &FlightQuery) -> Result<Vec<Offer>, FareError> {
        self.post("/v1/price-graph", query).await
    }

    async fn offers(&self, args: &OfferArgs) -> Result<Vec<Offer>, FareError> {
        self.post("/v1/offers", args).await
    }
}

/// Bounds every call of the wrapped service by a deadline and a run-wide
/// cancellation token.
pub struct ServiceGuard<S> {
    inner: S,
    timeout: Duration,
    cancel: CancellationToken,
}

impl<S: PricingService> ServiceGuard<S> {
    pub fn new(inner: S, timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            inner,
            timeout,
            cancel,
        }
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    async fn guarded<T, F>(&self, call: F) -> Result<T, FareError>
    where
        F: Future<Output = Result<T, FareError>> + Send,
    {
        if self.cancel.is_cancelled() {
            return Err(FareError::Cancelled);
        }

        tokio::select! {
            biased;

            _ = self.cancel.cancelled() => Err(FareError::Cancelled),

            result = tokio::time::timeout(self.timeout, call) => match result {
                Ok(inner) => inner,
                Err(_) => Err(FareError::Timeout(self.timeout.as_millis() as u64)),
            },
        }
    }
}

#[async_trait]
impl<S: PricingService> PricingService for ServiceGuard<S> {
    async fn probe_offers(&self, args: &OfferArgs) -> Result<Vec<Offer>, FareError> {
        self.guarded(self.inner.probe_offers(args)).await
    }

    async fn price_graph(&self, query: &FlightQuery) -> Result<Vec<Offer>, FareError> {
        self.guarded(self.inner.price_graph(query)).await
    }

    async fn offers(&self, args: &OfferArgs) -> Result<Vec<Offer>, FareError> {
        self.guarded(self.inner.offers(args)).await
    }
}

// In-memory pricing service for tests and demos
pub mod mock_service {
    use super::*;
    use crate::model::DatePair;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum CallKind {
        Probe,
        PriceGraph,
        Offers,
    }

    type Route = (String, String);

    #[derive(Default)]
    pub struct MockPricingService {
        probe_responses: Mutex<HashMap<Route, Vec<Offer>>>,
        graph_responses: Mutex<HashMap<Route, Vec<Offer>>>,
        offer_responses: Mutex<HashMap<(String, String, DatePair), Vec<Offer>>>,
        failing_origins: Mutex<HashMap<(String, CallKind), FareError>>,
        fail_next: Mutex<HashMap<CallKind, usize>>,
        probe_log: Mutex<Vec<OfferArgs>>,
        graph_log: Mutex<Vec<FlightQuery>>,
        delay_ms: AtomicUsize,
        jitter: std::sync::atomic::AtomicBool,
        probe_calls: AtomicUsize,
        graph_calls: AtomicUsize,
        offer_calls: AtomicUsize,
        in_flight: AtomicUsize,
        peak_in_flight: AtomicUsize,
    }

    struct InFlight<'a> {
        service: &'a MockPricingService,
    }

    impl<'a> InFlight<'a> {
        fn enter(service: &'a MockPricingService) -> Self {
            let now = service.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            service.peak_in_flight.fetch_max(now, Ordering::SeqCst);
            Self { service }
        }
    }

    impl Drop for InFlight<'_> {
        fn drop(&mut self) {
            self.service.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn route(origin: &str, destination: &str) -> Route {
        (origin.to_string(), destination.to_string())
    }

    impl MockPricingService {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn add_probe_response(&self, origin: &str, destination: &str, offers: Vec<Offer>) {
            self.probe_responses
                .lock()
                .insert(route(origin, destination), offers);
        }

        pub fn add_graph_response(&self, origin: &str, destination: &str, offers: Vec<Offer>) {
            self.graph_responses
                .lock()
                .insert(route(origin, destination), offers);
        }

        pub fn add_offer_response(
            &self,
            origin: &str,
            destination: &str,
            dates: DatePair,
            offers: Vec<Offer>,
        ) {
            self.offer_responses
                .lock()
                .insert((origin.to_string(), destination.to_string(), dates), offers);
        }

        // Every call of `kind` for `origin` fails with `error`
        pub fn fail_origin(&self, origin: &str, kind: CallKind, error: FareError) {
            self.failing_origins
                .lock()
                .insert((origin.to_string(), kind), error);
        }

        pub fn fail_next_requests(&self, kind: CallKind, count: usize) {
            self.fail_next.lock().insert(kind, count);
        }

        pub fn set_delay(&self, delay_ms: usize) {
            self.delay_ms.store(delay_ms, Ordering::SeqCst);
        }

        pub fn set_jitter(&self, enabled: bool) {
            self.jitter.store(enabled, Ordering::SeqCst);
        }

        pub fn calls(&self, kind: CallKind) -> usize {
            match kind {
                CallKind::Probe => self.probe_calls.load(Ordering::SeqCst),
                CallKind::PriceGraph => self.graph_calls.load(Ordering::SeqCst),
                CallKind::Offers => self.offer_calls.load(Ordering::SeqCst),
            }
        }

        pub fn peak_in_flight(&self) -> usize {
            self.peak_in_flight.load(Ordering::SeqCst)
        }

        pub fn probe_log(&self) -> Vec<OfferArgs> {
            self.probe_log.lock().clone()
        }

        pub fn graph_log(&self) -> Vec<FlightQuery> {
            self.graph_log.lock().clone()
        }

        async fn simulate(&self, kind: CallKind, origin: &str) -> Result<(), FareError> {
            let counter = match kind {
                CallKind::Probe => &self.probe_calls,
                CallKind::PriceGraph => &self.graph_calls,
                CallKind::Offers => &self.offer_calls,
            };
            counter.fetch_add(1, Ordering::SeqCst);

            let delay = self.delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                // Add jitter for realism
                let jitter = if self.jitter.load(Ordering::SeqCst) {
                    rand::random::<usize>() % delay
                } else {
                    0
                };
                tokio::time::sleep(Duration::from_millis((delay + jitter) as u64)).await;
            }

            {
                let mut fail_next = self.fail_next.lock();
                if let Some(remaining) = fail_next.get_mut(&kind) {
                    if *remaining > 0 {
                        *remaining -= 1;
                        return Err(FareError::ApiResponse {
                            status_code: 500,
                            message: "Internal Server Error".to_string(),
                        });
                    }
                }
            }

            if let Some(err) = self
                .failing_origins
                .lock()
                .get(&(origin.to_string(), kind))
            {
                return Err(err.clone());
            }

            Ok(())
        }
    }

    #[async_trait]
    impl PricingService for MockPricingService {
        async fn probe_offers(&self, args: &OfferArgs) -> Result<Vec<Offer>, FareError> {
            let _guard = InFlight::enter(self);
            self.probe_log.lock().push(args.clone());
            self.simulate(CallKind::Probe, &args.origin).await?;

            Ok(self
                .probe_responses
                .lock()
                .get(&route(&args.origin, &args.destination))
                .cloned()
                .unwrap_or_default())
        }

        async fn price_graph(&self, query: &FlightQuery) -> Result<Vec<Offer>, FareError> {
            let _guard = InFlight::enter(self);
            self.graph_log.lock().push(query.clone());
            self.simulate(CallKind::PriceGraph, query.origin()).await?;

            Ok(self
                .graph_responses
                .lock()
                .get(&route(query.origin(), query.destination()))
                .cloned()
                .unwrap_or_default())
        }

        async fn offers(&self, args: &OfferArgs) -> Result<Vec<Offer>, FareError> {
            let _guard = InFlight::enter(self);
            self.simulate(CallKind::Offers, &args.origin).await?;

            let dates = DatePair {
                outbound: args.outbound,
                inbound: args.inbound,
            };
            Ok(self
                .offer_responses
                .lock()
                .get(&(args.origin.clone(), args.destination.clone(), dates))
                .cloned()
                .unwrap_or_default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock_service::{CallKind, MockPricingService};
    use super::*;
    use crate::model::{Attendee, CabinClass, Currency, DatePair, Price, QueryTemplate};
    use chrono::NaiveDate;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn args() -> OfferArgs {
        QueryTemplate::new("IST", date("2025-02-02"), date("2025-02-07"), 6)
            .unwrap()
            .query_for(&Attendee {
                city: "NYC".to_string(),
                travelers: 1,
            })
            .with_cabin_class(CabinClass::Economy)
            .unwrap()
            .for_dates(DatePair {
                outbound: date("2025-02-02"),
                inbound: date("2025-02-08"),
            })
            .unwrap()
    }

    #[tokio::test]
    async fn test_mock_returns_canned_offers() {
        let service = MockPricingService::new();
        let offer = Offer {
            price: Price::new(640.0, Currency::default()),
            duration: Duration::from_secs(10 * 3600),
            outbound: date("2025-02-02"),
            inbound: date("2025-02-08"),
        };
        service.add_offer_response("NYC", "IST", offer.date_pair(), vec![offer.clone()]);

        let offers = service.offers(&args()).await.unwrap();
        assert_eq!(offers, vec![offer]);
        assert_eq!(service.calls(CallKind::Offers), 1);
        assert_eq!(service.calls(CallKind::Probe), 0);
    }

    #[tokio::test]
    async fn test_mock_fail_next_requests() {
        let service = MockPricingService::new();
        service.fail_next_requests(CallKind::Offers, 1);

        assert!(matches!(
            service.offers(&args()).await,
            Err(FareError::ApiResponse {
                status_code: 500,
                ..
            })
        ));
        assert!(service.offers(&args()).await.is_ok());
    }

    #[tokio::test]
    async fn test_guard_times_out_slow_calls() {
        let service = MockPricingService::new();
        service.set_delay(500);
        let guard = ServiceGuard::new(
            service,
            Duration::from_millis(20),
            CancellationToken::new(),
        );

        assert_eq!(
            guard.offers(&args()).await.unwrap_err(),
            FareError::Timeout(20)
        );
    }

    #[tokio::test]
    async fn test_guard_observes_cancellation() {
        let service = Arc::new(MockPricingService::new());
        service.set_delay(5_000);
        let token = CancellationToken::new();
        let guard = Arc::new(ServiceGuard::new(
            service.clone(),
            Duration::from_secs(60),
            token.clone(),
        ));

        let call = {
            let guard = guard.clone();
            tokio::spawn(async move { guard.probe_offers(&args()).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();

        let result = call.await.unwrap();
        assert_eq!(result.unwrap_err(), FareError::Cancelled);

        // calls issued after cancellation never reach the service
        assert_eq!(
            guard.offers(&args()).await.unwrap_err(),
            FareError::Cancelled
        );
        assert_eq!(service.calls(CallKind::Offers), 0);
    }

    #[test]
    fn test_http_client_trims_base_url() {
        let config = ServiceConfig {
            base_url: "https://fares.example.com/".to_string(),
            ..Default::default()
        };
        let client = HttpPricingClient::new(&config).unwrap();
        assert_eq!(client.base_url, "https://fares.example.com");
    }
}
