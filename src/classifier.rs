// Class selection: estimate the flight length on a route and map it to a cabin class

use std::{sync::Arc, time::Duration};

use chrono::{Days, Local, Months, NaiveDate};
use tracing::{debug, instrument, warn};

use crate::{
    config::ProbePolicy,
    error::FareError,
    model::{
        CabinClass, ClassificationRules, Currency, DatePair, Offer, OfferArgs, StopPolicy,
        Travelers, TripType,
    },
    pricing::PricingService,
};

// The probe looks one month ahead with a fixed one-week stay
const PROBE_LEAD_MONTHS: u32 = 1;
const PROBE_STAY_DAYS: u64 = 7;

pub fn classify(duration: Duration, rules: &ClassificationRules) -> CabinClass {
    if duration >= rules.business_min() {
        CabinClass::Business
    } else if duration >= rules.premium_min() {
        CabinClass::PremiumEconomy
    } else {
        CabinClass::Economy
    }
}

// Shortest nonzero flight time among the offers
pub fn shortest_duration(offers: &[Offer]) -> Option<Duration> {
    offers
        .iter()
        .map(|offer| offer.duration)
        .filter(|duration| !duration.is_zero())
        .min()
}

pub fn probe_dates(today: NaiveDate) -> Option<DatePair> {
    let outbound = today.checked_add_months(Months::new(PROBE_LEAD_MONTHS))?;
    let inbound = outbound.checked_add_days(Days::new(PROBE_STAY_DAYS))?;
    Some(DatePair { outbound, inbound })
}

pub struct ClassSelector<S> {
    service: Arc<S>,
    rules: ClassificationRules,
    policy: ProbePolicy,
    currency: Currency,
    language: String,
}

impl<S: PricingService> ClassSelector<S> {
    pub fn new(service: Arc<S>, rules: ClassificationRules, policy: ProbePolicy) -> Self {
        Self {
            service,
            rules,
            policy,
            currency: Currency::default(),
            language: "en".to_string(),
        }
    }

    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub async fn select(&self, origin: &str, destination: &str) -> Result<CabinClass, FareError> {
        self.select_on(origin, destination, Local::now().date_naive())
            .await
    }

    /// Probes the route as of `today` and picks the class for its shortest flight.
    ///
    /// The probe is independent of the caller's trip: one adult, economy,
    /// up to two stops, round trip, leaving a month from `today` for a week.
    #[instrument(skip(self))]
    pub async fn select_on(
        &self,
        origin: &str,
        destination: &str,
        today: NaiveDate,
    ) -> Result<CabinClass, FareError> {
        let dates = probe_dates(today).ok_or_else(|| {
            FareError::InvalidQuery(format!("no probe dates can follow {today}"))
        })?;

        let args = OfferArgs {
            origin: origin.to_string(),
            destination: destination.to_string(),
            outbound: dates.outbound,
            inbound: dates.inbound,
            travelers: Travelers::default(),
            cabin_class: CabinClass::Economy,
            currency: self.currency.clone(),
            stops: StopPolicy::TwoStops,
            trip_type: TripType::RoundTrip,
            language: self.language.clone(),
        };

        let offers = self.service.probe_offers(&args).await?;

        let class = match shortest_duration(&offers) {
            Some(duration) => {
                let class = classify(duration, &self.rules);
                debug!(
                    shortest_mins = duration.as_secs() / 60,
                    %class,
                    "Classified route"
                );
                class
            }
            None => match self.policy {
                ProbePolicy::EconomyFallback => {
                    warn!(
                        probed = offers.len(),
                        "Probe returned no flight duration, falling back to economy"
                    );
                    CabinClass::Economy
                }
                ProbePolicy::Strict => {
                    return Err(FareError::UndefinedDuration {
                        origin: origin.to_string(),
                        destination: destination.to_string(),
                    })
                }
            },
        };

        Ok(class)
    }
}
