// Offer reduction: pick the cheapest priced offer

use std::cmp::Ordering;

use crate::model::Offer;

/// Returns the cheapest offer with a defined price.
///
/// Offers without a price are skipped, so `None` means the service had
/// nothing usable. Ties on price fall back to the dates and then the flight
/// time, which makes the result independent of input order.
pub fn best_offer<'a, I>(offers: I) -> Option<Offer>
where
    I: IntoIterator<Item = &'a Offer>,
{
    offers
        .into_iter()
        .filter(|offer| offer.price.is_defined())
        .min_by(|a, b| compare_offers(a, b))
        .cloned()
}

fn compare_offers(a: &Offer, b: &Offer) -> Ordering {
    a.price
        .amount
        .total_cmp(&b.price.amount)
        .then_with(|| a.outbound.cmp(&b.outbound))
        .then_with(|| a.inbound.cmp(&b.inbound))
        .then_with(|| a.duration.cmp(&b.duration))
        .then_with(|| a.price.currency.code().cmp(b.price.currency.code()))
}
