// Cheapest round-trip fares from many origins to one shared destination

pub mod classifier;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod pricing;
pub mod reducer;
pub mod report;
pub mod worker;

// Re-export key types for convenience
pub use classifier::{classify, ClassSelector};
pub use config::{Config, FailurePolicy, ProbePolicy, ServiceConfig};
pub use error::{ConfigError, FareError};
pub use model::{
    Attendee, BestOffer, CabinClass, ClassificationRules, DatePair, FlightQuery, Offer, Price,
    QueryTemplate,
};
pub use pipeline::Pipeline;
pub use pricing::{HttpPricingClient, PricingService, ServiceGuard};
pub use reducer::best_offer;
pub use report::{LineReporter, Reporter, RunReport};
