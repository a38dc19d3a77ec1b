//! Agent reputation scoring.
//!
//! The score is a 0-1000 running measure of reliability and speed. It is
//! fully recomputed from the accumulated counters on every completed job,
//! never incremented, so replaying the same job history always lands on the
//! same score.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sla::AgentSla;

/// Upper bound of the reputation scale.
pub const MAX_SCORE: u32 = 1000;

/// Score a freshly registered agent starts at: the scale midpoint, a neutral
/// prior before any job history exists.
pub const INITIAL_SCORE: u32 = 500;

/// Running reputation state for one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentReputation {
    /// Composite score in `[0, 1000]`.
    pub score: u32,
    pub total_jobs: u64,
    pub successful_jobs: u64,
    pub failed_jobs: u64,
    /// Exact running mean over all completed jobs, in milliseconds. No decay.
    pub average_response_time: f64,
    /// Tracked uptime percentage in `[0, 100]`.
    pub uptime_percent: f64,
    pub last_updated: DateTime<Utc>,
}

impl AgentReputation {
    /// Fresh reputation record with zeroed counters.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            score: INITIAL_SCORE,
            total_jobs: 0,
            successful_jobs: 0,
            failed_jobs: 0,
            average_response_time: 0.0,
            uptime_percent: 100.0,
            last_updated: now,
        }
    }

    /// Fold one completed job into the record and recompute the score.
    ///
    /// The score blends three signals: success rate (up to 700 points), a
    /// speed bonus for running under the guaranteed response time (up to 200),
    /// and uptime (up to 100), clamped to the scale and floored.
    pub fn record_outcome(
        &mut self,
        success: bool,
        response_time_ms: u64,
        sla: &AgentSla,
        now: DateTime<Utc>,
    ) {
        self.total_jobs += 1;
        if success {
            self.successful_jobs += 1;
        } else {
            self.failed_jobs += 1;
        }

        let n = self.total_jobs as f64;
        self.average_response_time =
            (self.average_response_time * (n - 1.0) + response_time_ms as f64) / n;

        let success_rate = self.successful_jobs as f64 / n;
        let speed_bonus = if sla.response_time_ms == 0 {
            0.0
        } else {
            (1.0 - self.average_response_time / sla.response_time_ms as f64).max(0.0)
        };

        let raw = success_rate * 700.0 + speed_bonus * 200.0 + (self.uptime_percent / 100.0) * 100.0;
        self.score = raw.clamp(0.0, f64::from(MAX_SCORE)).floor() as u32;
        self.last_updated = now;
    }

    /// Fraction of jobs that succeeded, or zero before the first job.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total_jobs == 0 {
            0.0
        } else {
            self.successful_jobs as f64 / self.total_jobs as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sla() -> AgentSla {
        AgentSla {
            response_time_ms: 5_000,
            availability: 0.999,
            accuracy: 0.99,
            throughput: 100,
            penalties: Vec::new(),
            staked_amount: None,
        }
    }

    #[test]
    fn test_success_increments_exactly_one_counter() {
        let mut rep = AgentReputation::new(Utc::now());
        rep.record_outcome(true, 1_000, &sla(), Utc::now());

        assert_eq!(rep.total_jobs, 1);
        assert_eq!(rep.successful_jobs, 1);
        assert_eq!(rep.failed_jobs, 0);
    }

    #[test]
    fn test_running_mean_is_exact() {
        let mut rep = AgentReputation::new(Utc::now());
        rep.record_outcome(true, 1_000, &sla(), Utc::now());
        rep.record_outcome(true, 3_000, &sla(), Utc::now());

        assert!((rep.average_response_time - 2_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_all_successes_fast_agent_scores_high() {
        let mut rep = AgentReputation::new(Utc::now());
        for _ in 0..10 {
            rep.record_outcome(true, 500, &sla(), Utc::now());
        }

        // 700 + 200 * (1 - 0.1) + 100 = 980.
        assert_eq!(rep.score, 980);
    }

    #[test]
    fn test_score_non_decreasing_under_fixed_trend() {
        let mut rep = AgentReputation::new(Utc::now());
        rep.record_outcome(false, 2_000, &sla(), Utc::now());

        let mut previous = rep.score;
        for _ in 0..50 {
            rep.record_outcome(true, 2_000, &sla(), Utc::now());
            assert!(rep.score >= previous, "score regressed under steady successes");
            previous = rep.score;
        }
    }

    #[test]
    fn test_slow_agent_gets_no_speed_bonus() {
        let mut rep = AgentReputation::new(Utc::now());
        rep.record_outcome(true, 50_000, &sla(), Utc::now());

        // 700 + 0 + 100.
        assert_eq!(rep.score, 800);
    }

    #[test]
    fn test_score_never_exceeds_scale() {
        let mut rep = AgentReputation::new(Utc::now());
        rep.uptime_percent = 100.0;
        for _ in 0..100 {
            rep.record_outcome(true, 0, &sla(), Utc::now());
        }
        assert!(rep.score <= MAX_SCORE);
    }

    #[test]
    fn test_replaying_history_reproduces_score() {
        let outcomes = [(true, 900), (false, 4_000), (true, 1_100), (true, 700)];

        let mut a = AgentReputation::new(Utc::now());
        let mut b = AgentReputation::new(Utc::now());
        for (success, ms) in outcomes {
            a.record_outcome(success, ms, &sla(), Utc::now());
            b.record_outcome(success, ms, &sla(), Utc::now());
        }

        assert_eq!(a.score, b.score);
        assert_eq!(a.average_response_time, b.average_response_time);
    }
}
