// Data model shared by every stage of the fare pipeline

use std::{fmt, time::Duration};

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::FareError;

// One traveling party, loaded once from configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Attendee {
    pub city: String,
    pub travelers: u32,
}

// Duration thresholds (in whole hours) used to pick a cabin class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClassificationRules {
    #[serde(rename = "business_min_hrs")]
    pub business_min_hours: u32,
    #[serde(rename = "premium_min_hrs")]
    pub premium_min_hours: u32,
}

impl Default for ClassificationRules {
    fn default() -> Self {
        Self {
            business_min_hours: 10,
            premium_min_hours: 6,
        }
    }
}

impl ClassificationRules {
    pub fn business_min(&self) -> Duration {
        Duration::from_secs(u64::from(self.business_min_hours) * 3600)
    }

    pub fn premium_min(&self) -> Duration {
        Duration::from_secs(u64::from(self.premium_min_hours) * 3600)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CabinClass {
    Economy,
    PremiumEconomy,
    Business,
    First,
}

impl fmt::Display for CabinClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CabinClass::Economy => "economy",
            CabinClass::PremiumEconomy => "premium economy",
            CabinClass::Business => "business",
            CabinClass::First => "first",
        };
        f.write_str(name)
    }
}

// Maximum number of layovers accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopPolicy {
    Nonstop,
    OneStop,
    #[default]
    TwoStops,
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TripType {
    #[default]
    RoundTrip,
    OneWay,
}

// ISO 4217 currency code
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Currency(String);

impl<'de> Deserialize<'de> for Currency {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Currency::new)
    }
}

impl Currency {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().to_ascii_uppercase())
    }

    pub fn code(&self) -> &str {
        &self.0
    }
}

impl Default for Currency {
    fn default() -> Self {
        Self::new("USD")
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Travelers {
    pub adults: u32,
}

impl Default for Travelers {
    fn default() -> Self {
        Self { adults: 1 }
    }
}

/// A price-graph query for one origin.
///
/// Everything except the cabin class is fixed at construction. The class is
/// filled in once, after the duration probe, through [`FlightQuery::with_cabin_class`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlightQuery {
    origin: String,
    destination: String,
    range_start: NaiveDate,
    range_end: NaiveDate,
    trip_length: u32,
    travelers: Travelers,
    cabin_class: Option<CabinClass>,
    currency: Currency,
    stops: StopPolicy,
    trip_type: TripType,
    language: String,
}

impl FlightQuery {
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn range_start(&self) -> NaiveDate {
        self.range_start
    }

    pub fn range_end(&self) -> NaiveDate {
        self.range_end
    }

    pub fn trip_length(&self) -> u32 {
        self.trip_length
    }

    pub fn travelers(&self) -> Travelers {
        self.travelers
    }

    pub fn cabin_class(&self) -> Option<CabinClass> {
        self.cabin_class
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn stops(&self) -> StopPolicy {
        self.stops
    }

    pub fn trip_type(&self) -> TripType {
        self.trip_type
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    // Sets the cabin class; a class that was already resolved is never overwritten
    pub fn with_cabin_class(mut self, class: CabinClass) -> Result<Self, FareError> {
        if let Some(existing) = self.cabin_class {
            return Err(FareError::InvalidQuery(format!(
                "cabin class for {} already resolved to {existing}",
                self.origin
            )));
        }
        self.cabin_class = Some(class);
        Ok(self)
    }

    pub fn resolved_class(&self) -> Result<CabinClass, FareError> {
        self.cabin_class.ok_or_else(|| FareError::UnresolvedClass {
            origin: self.origin.clone(),
            destination: self.destination.clone(),
        })
    }

    // Arguments for a concrete-offers lookup on exact dates
    pub fn for_dates(&self, pair: DatePair) -> Result<OfferArgs, FareError> {
        Ok(OfferArgs {
            origin: self.origin.clone(),
            destination: self.destination.clone(),
            outbound: pair.outbound,
            inbound: pair.inbound,
            travelers: self.travelers,
            cabin_class: self.resolved_class()?,
            currency: self.currency.clone(),
            stops: self.stops,
            trip_type: self.trip_type,
            language: self.language.clone(),
        })
    }
}

/// Fields shared by every origin of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryTemplate {
    pub destination: String,
    pub range_start: NaiveDate,
    pub range_end: NaiveDate,
    pub trip_length: u32,
    pub currency: Currency,
    pub stops: StopPolicy,
    pub trip_type: TripType,
    pub language: String,
}

impl QueryTemplate {
    pub fn new(
        destination: impl Into<String>,
        range_start: NaiveDate,
        range_end: NaiveDate,
        trip_length: u32,
    ) -> Result<Self, FareError> {
        let destination = destination.into();
        if destination.trim().is_empty() {
            return Err(FareError::InvalidQuery("destination is empty".to_string()));
        }
        if range_end < range_start {
            return Err(FareError::InvalidQuery(format!(
                "date range ends ({range_end}) before it starts ({range_start})"
            )));
        }
        if trip_length == 0 {
            return Err(FareError::InvalidQuery(
                "trip length must be at least one night".to_string(),
            ));
        }

        Ok(Self {
            destination,
            range_start,
            range_end,
            trip_length,
            currency: Currency::default(),
            stops: StopPolicy::TwoStops,
            trip_type: TripType::RoundTrip,
            language: "en".to_string(),
        })
    }

    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn query_for(&self, attendee: &Attendee) -> FlightQuery {
        FlightQuery {
            origin: attendee.city.clone(),
            destination: self.destination.clone(),
            range_start: self.range_start,
            range_end: self.range_end,
            trip_length: self.trip_length,
            travelers: Travelers {
                adults: attendee.travelers,
            },
            cabin_class: None,
            currency: self.currency.clone(),
            stops: self.stops,
            trip_type: self.trip_type,
            language: self.language.clone(),
        }
    }
}

// Exact-date lookup sent to the concrete-offers operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OfferArgs {
    pub origin: String,
    pub destination: String,
    pub outbound: NaiveDate,
    pub inbound: NaiveDate,
    pub travelers: Travelers,
    pub cabin_class: CabinClass,
    pub currency: Currency,
    pub stops: StopPolicy,
    pub trip_type: TripType,
    pub language: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub struct DatePair {
    pub outbound: NaiveDate,
    pub inbound: NaiveDate,
}

impl fmt::Display for DatePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.outbound, self.inbound)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Price {
    pub amount: f64,
    pub currency: Currency,
}

impl Price {
    pub fn new(amount: f64, currency: Currency) -> Self {
        Self { amount, currency }
    }

    // Zero, negative and non-finite amounts mean the service had no price
    pub fn is_defined(&self) -> bool {
        self.amount.is_finite() && self.amount > 0.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} {}", self.amount, self.currency)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Offer {
    pub price: Price,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    pub outbound: NaiveDate,
    pub inbound: NaiveDate,
}

impl Offer {
    pub fn date_pair(&self) -> DatePair {
        DatePair {
            outbound: self.outbound,
            inbound: self.inbound,
        }
    }
}

/// Terminal result for one origin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestOffer {
    pub origin: String,
    pub destination: String,
    pub cabin_class: CabinClass,
    pub dates: DatePair,
    pub price: Price,
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn template() -> QueryTemplate {
        QueryTemplate::new("IST", date("2025-02-02"), date("2025-02-07"), 6).unwrap()
    }

    #[test]
    fn test_query_for_copies_template_and_attendee() {
        let attendee = Attendee {
            city: "LAX".to_string(),
            travelers: 2,
        };
        let query = template().query_for(&attendee);

        assert_eq!(query.origin(), "LAX");
        assert_eq!(query.destination(), "IST");
        assert_eq!(query.travelers().adults, 2);
        assert_eq!(query.trip_length(), 6);
        assert_eq!(query.currency().code(), "USD");
        assert_eq!(query.stops(), StopPolicy::TwoStops);
        assert_eq!(query.trip_type(), TripType::RoundTrip);
        assert_eq!(query.cabin_class(), None);
    }

    #[test]
    fn test_cabin_class_is_set_once() {
        let attendee = Attendee {
            city: "NYC".to_string(),
            travelers: 1,
        };
        let query = template().query_for(&attendee);
        assert!(matches!(
            query.resolved_class(),
            Err(FareError::UnresolvedClass { .. })
        ));

        let query = query.with_cabin_class(CabinClass::Business).unwrap();
        assert_eq!(query.resolved_class().unwrap(), CabinClass::Business);
        assert!(query.with_cabin_class(CabinClass::Economy).is_err());
    }

    #[test]
    fn test_for_dates_requires_resolved_class() {
        let attendee = Attendee {
            city: "NYC".to_string(),
            travelers: 1,
        };
        let pair = DatePair {
            outbound: date("2025-02-03"),
            inbound: date("2025-02-09"),
        };
        let query = template().query_for(&attendee);
        assert!(query.for_dates(pair).is_err());

        let args = query
            .with_cabin_class(CabinClass::PremiumEconomy)
            .unwrap()
            .for_dates(pair)
            .unwrap();
        assert_eq!(args.outbound, pair.outbound);
        assert_eq!(args.inbound, pair.inbound);
        assert_eq!(args.cabin_class, CabinClass::PremiumEconomy);
    }

    #[test]
    fn test_template_rejects_inverted_range() {
        assert!(QueryTemplate::new("IST", date("2025-02-07"), date("2025-02-02"), 6).is_err());
        assert!(QueryTemplate::new("IST", date("2025-02-02"), date("2025-02-07"), 0).is_err());
        assert!(QueryTemplate::new("  ", date("2025-02-02"), date("2025-02-07"), 3).is_err());
    }

    #[test]
    fn test_price_defined() {
        assert!(Price::new(120.5, Currency::default()).is_defined());
        assert!(!Price::new(0.0, Currency::default()).is_defined());
        assert!(!Price::new(f64::NAN, Currency::default()).is_defined());
        assert_eq!(Price::new(99.0, Currency::new("usd")).to_string(), "99.00 USD");
    }

    #[test]
    fn test_currency_code_is_uppercased_when_parsed() {
        let price: Price = serde_json::from_str(r#"{ "amount": 10.0, "currency": "try" }"#).unwrap();
        assert_eq!(price.currency, Currency::new("TRY"));
        assert_eq!(price.to_string(), "10.00 TRY");
    }

    #[test]
    fn test_offer_deserializes_duration_in_seconds() {
        let json = r#"{
            "price": { "amount": 412.0, "currency": "USD" },
            "duration": 39600,
            "outbound": "2025-02-02",
            "inbound": "2025-02-08"
        }"#;
        let offer: Offer = serde_json::from_str(json).unwrap();
        assert_eq!(offer.duration, Duration::from_secs(11 * 3600));
        assert_eq!(offer.date_pair().inbound, date("2025-02-08"));
    }
}
