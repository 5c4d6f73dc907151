//! Quality and coverage metrics over a set of endpoints.

use serde::Serialize;

use apiscout_shared::{Confidence, Endpoint};

/// Endpoint counts per confidence level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfidenceDistribution {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

/// Counts and ratios describing how complete an extraction is.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoverageReport {
    pub total_endpoints: usize,
    pub with_parameters: usize,
    pub with_request_body: usize,
    pub with_responses: usize,
    pub with_examples: usize,
    pub confidence_distribution: ConfidenceDistribution,
    /// Weighted mean: high=1.0, medium=0.6, low=0.3.
    pub average_confidence: f64,
}

fn confidence_weight(confidence: Confidence) -> f64 {
    match confidence {
        Confidence::High => 1.0,
        Confidence::Medium => 0.6,
        Confidence::Low => 0.3,
    }
}

impl CoverageReport {
    pub fn analyze(endpoints: &[Endpoint]) -> Self {
        if endpoints.is_empty() {
            return Self::default();
        }

        let mut report = Self {
            total_endpoints: endpoints.len(),
            ..Self::default()
        };
        let mut weight_sum = 0.0;

        for endpoint in endpoints {
            if !endpoint.parameters.is_empty() {
                report.with_parameters += 1;
            }
            if endpoint.request_body.is_some() {
                report.with_request_body += 1;
            }
            if !endpoint.responses.is_empty() {
                report.with_responses += 1;
            }
            if endpoint.has_examples() {
                report.with_examples += 1;
            }
            match endpoint.confidence {
                Confidence::High => report.confidence_distribution.high += 1,
                Confidence::Medium => report.confidence_distribution.medium += 1,
                Confidence::Low => report.confidence_distribution.low += 1,
            }
            weight_sum += confidence_weight(endpoint.confidence);
        }

        report.average_confidence = weight_sum / endpoints.len() as f64;
        report
    }

    fn rate(&self, count: usize) -> f64 {
        if self.total_endpoints == 0 {
            0.0
        } else {
            count as f64 / self.total_endpoints as f64
        }
    }

    /// Percentage of endpoints with parameters.
    pub fn parameter_coverage(&self) -> f64 {
        self.rate(self.with_parameters) * 100.0
    }

    pub fn response_coverage(&self) -> f64 {
        self.rate(self.with_responses) * 100.0
    }

    pub fn body_coverage(&self) -> f64 {
        self.rate(self.with_request_body) * 100.0
    }

    pub fn example_coverage(&self) -> f64 {
        self.rate(self.with_examples) * 100.0
    }

    /// Weighted score in `[0, 100]`.
    pub fn quality_score(&self) -> f64 {
        if self.total_endpoints == 0 {
            return 0.0;
        }
        (0.25 * self.rate(self.with_parameters)
            + 0.20 * self.rate(self.with_request_body)
            + 0.30 * self.rate(self.with_responses)
            + 0.15 * self.rate(self.with_examples)
            + 0.10 * self.average_confidence)
            * 100.0
    }
}
