// Line-oriented reporting of per-origin outcomes

use std::{io::Write, time::Duration};

use tracing::warn;

use crate::worker::OriginOutcome;

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub outcomes: Vec<OriginOutcome>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn failures(&self) -> impl Iterator<Item = &OriginOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.is_failure())
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    pub fn is_success(&self) -> bool {
        self.failure_count() == 0
    }
}

pub fn format_outcome(outcome: &OriginOutcome) -> String {
    match &outcome.result {
        Ok(Some(best)) => format!(
            "Best offer for {} to {} is {}",
            best.origin, best.destination, best.price
        ),
        Ok(None) => format!(
            "No offer found for {} to {}",
            outcome.origin, outcome.destination
        ),
        Err(err) => format!(
            "Failed to price {} to {}: {}",
            outcome.origin, outcome.destination, err
        ),
    }
}

pub fn format_elapsed(elapsed: Duration) -> String {
    format!("Finished in {elapsed:.3?}")
}

// Receives outcomes as soon as each origin finishes
pub trait Reporter: Send {
    fn origin_finished(&mut self, outcome: &OriginOutcome);

    fn run_finished(&mut self, report: &RunReport);
}

pub struct LineReporter<W> {
    out: W,
}

impl<W: Write + Send> LineReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_line(&mut self, line: &str) {
        if let Err(err) = writeln!(self.out, "{line}").and_then(|_| self.out.flush()) {
            warn!(error = %err, "Failed to write result line");
        }
    }
}

impl<W: Write + Send> Reporter for LineReporter<W> {
    fn origin_finished(&mut self, outcome: &OriginOutcome) {
        self.write_line(&format_outcome(outcome));
    }

    fn run_finished(&mut self, report: &RunReport) {
        self.write_line(&format_elapsed(report.elapsed));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FareError;
    use crate::model::{BestOffer, CabinClass, Currency, DatePair, Price};
    use chrono::NaiveDate;

    fn best(origin: &str, amount: f64) -> OriginOutcome {
        let outbound = NaiveDate::from_ymd_opt(2025, 2, 2).unwrap();
        OriginOutcome {
            origin: origin.to_string(),
            destination: "IST".to_string(),
            result: Ok(Some(BestOffer {
                origin: origin.to_string(),
                destination: "IST".to_string(),
                cabin_class: CabinClass::Business,
                dates: DatePair {
                    outbound,
                    inbound: outbound + chrono::Days::new(6),
                },
                price: Price::new(amount, Currency::default()),
            })),
        }
    }

    #[test]
    fn test_format_lines() {
        assert_eq!(
            format_outcome(&best("NYC", 1234.5)),
            "Best offer for NYC to IST is 1234.50 USD"
        );

        let none = OriginOutcome {
            origin: "LAX".to_string(),
            destination: "IST".to_string(),
            result: Ok(None),
        };
        assert_eq!(format_outcome(&none), "No offer found for LAX to IST");

        let failed = OriginOutcome {
            origin: "SEA".to_string(),
            destination: "IST".to_string(),
            result: Err(FareError::Timeout(500)),
        };
        assert_eq!(
            format_outcome(&failed),
            "Failed to price SEA to IST: Request timeout after 500ms"
        );
    }

    #[test]
    fn test_line_reporter_writes_each_outcome() {
        let mut reporter = LineReporter::new(Vec::new());
        let report = RunReport {
            outcomes: vec![best("NYC", 900.0), best("LAX", 850.0)],
            elapsed: Duration::from_millis(1500),
        };
        for outcome in &report.outcomes {
            reporter.origin_finished(outcome);
        }
        reporter.run_finished(&report);

        let text = String::from_utf8(reporter.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Best offer for NYC to IST is 900.00 USD");
        assert_eq!(lines[2], "Finished in 1.500s");
        assert!(report.is_success());
    }
}
