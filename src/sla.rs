//! Service level agreements and compliance checking.

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::reputation::AgentReputation;

/// Contractual performance guarantees, fixed at registration per agent
/// version.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSla {
    /// Maximum acceptable response time in milliseconds.
    pub response_time_ms: u64,
    /// Guaranteed availability as a fraction, e.g. `0.999`.
    pub availability: f64,
    /// Guaranteed accuracy as a fraction, e.g. `0.99`.
    pub accuracy: f64,
    /// Guaranteed throughput in jobs per hour.
    pub throughput: u32,
    /// Penalties owed on breach.
    #[serde(default)]
    pub penalties: Vec<SlaPenalty>,
    /// Optional stake backing the guarantees.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub staked_amount: Option<Money>,
}

/// A single penalty clause.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlaPenalty {
    /// Which guarantee the clause covers, e.g. `"availability"`.
    pub condition: String,
    /// Amount forfeited on breach.
    pub amount: Money,
}

/// One detected breach of a guarantee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum SlaViolation {
    ResponseTime { observed_ms: u64, limit_ms: u64 },
    Availability { observed_percent: f64, required_percent: f64 },
    Accuracy { failure_rate: f64, allowed_failure_rate: f64 },
}

/// Result of a compliance check.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlaComplianceReport {
    pub compliant: bool,
    pub violations: Vec<SlaViolation>,
}

/// Check the observed behavior of an agent against its guarantees.
///
/// Pure function over current state; mutates nothing. Flags a response-time
/// breach for this observation, an availability breach when tracked uptime is
/// below the guaranteed floor, and an accuracy breach when the historical
/// failure rate exceeds what the accuracy guarantee permits.
#[must_use]
pub fn check_sla_compliance(
    sla: &AgentSla,
    reputation: &AgentReputation,
    observed_response_time_ms: u64,
) -> SlaComplianceReport {
    let mut violations = Vec::new();

    if observed_response_time_ms > sla.response_time_ms {
        violations.push(SlaViolation::ResponseTime {
            observed_ms: observed_response_time_ms,
            limit_ms: sla.response_time_ms,
        });
    }

    let required_percent = sla.availability * 100.0;
    if reputation.uptime_percent < required_percent {
        violations.push(SlaViolation::Availability {
            observed_percent: reputation.uptime_percent,
            required_percent,
        });
    }

    if reputation.total_jobs > 0 {
        let failure_rate = reputation.failed_jobs as f64 / reputation.total_jobs as f64;
        let allowed = 1.0 - sla.accuracy;
        if failure_rate > allowed {
            violations.push(SlaViolation::Accuracy {
                failure_rate,
                allowed_failure_rate: allowed,
            });
        }
    }

    SlaComplianceReport {
        compliant: violations.is_empty(),
        violations,
    }
}
