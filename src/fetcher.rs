// Date-pair fetching: concrete offers for one outbound/return pair

use tracing::{debug, instrument};

use crate::{
    error::FareError,
    model::{DatePair, FlightQuery, Offer},
    pricing::PricingService,
    reducer::best_offer,
};

#[derive(Debug, Clone, PartialEq)]
pub struct DatePairBest {
    pub dates: DatePair,
    // None when no returned offer carried a price
    pub offer: Option<Offer>,
}

#[instrument(skip_all, fields(origin = %query.origin(), destination = %query.destination(), dates = %dates))]
pub async fn fetch_best<S>(
    service: &S,
    query: &FlightQuery,
    dates: DatePair,
) -> Result<DatePairBest, FareError>
where
    S: PricingService + ?Sized,
{
    let args = query.for_dates(dates)?;
    let offers = service.offers(&args).await?;
    let offer = best_offer(&offers);

    match &offer {
        Some(best) => debug!(offers = offers.len(), price = %best.price, "Best offer for date pair"),
        None => debug!(offers = offers.len(), "No priced offer for date pair"),
    }

    Ok(DatePairBest { dates, offer })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Attendee, CabinClass, Currency, Price, QueryTemplate};
    use crate::pricing::mock_service::{CallKind, MockPricingService};
    use chrono::NaiveDate;
    use std::time::Duration;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn query() -> FlightQuery {
        QueryTemplate::new("IST", date("2025-02-02"), date("2025-02-07"), 6)
            .unwrap()
            .query_for(&Attendee {
                city: "NYC".to_string(),
                travelers: 1,
            })
            .with_cabin_class(CabinClass::Business)
            .unwrap()
    }

    fn offer(amount: f64, dates: DatePair) -> Offer {
        Offer {
            price: Price::new(amount, Currency::default()),
            duration: Duration::from_secs(11 * 3600),
            outbound: dates.outbound,
            inbound: dates.inbound,
        }
    }

    #[tokio::test]
    async fn test_fetch_best_reduces_offers() {
        let dates = DatePair {
            outbound: date("2025-02-03"),
            inbound: date("2025-02-09"),
        };
        let service = MockPricingService::new();
        service.add_offer_response(
            "NYC",
            "IST",
            dates,
            vec![offer(2400.0, dates), offer(1980.0, dates), offer(0.0, dates)],
        );

        let best = fetch_best(&service, &query(), dates).await.unwrap();
        assert_eq!(best.dates, dates);
        assert_eq!(best.offer.unwrap().price.amount, 1980.0);
    }

    #[tokio::test]
    async fn test_fetch_best_without_offers() {
        let dates = DatePair {
            outbound: date("2025-02-04"),
            inbound: date("2025-02-10"),
        };
        let service = MockPricingService::new();

        let best = fetch_best(&service, &query(), dates).await.unwrap();
        assert_eq!(best.offer, None);
    }

    #[tokio::test]
    async fn test_fetch_best_propagates_service_error() {
        let dates = DatePair {
            outbound: date("2025-02-04"),
            inbound: date("2025-02-10"),
        };
        let service = MockPricingService::new();
        service.fail_next_requests(CallKind::Offers, 1);

        tokio_test::assert_err!(fetch_best(&service, &query(), dates).await);
    }
}
