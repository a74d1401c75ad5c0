use std::time::Duration;

use chrono::{DateTime, Utc};

use super::handle::JobId;

/// Point-in-time copy of a job, safe to hand to any thread.
#[derive(Debug, Clone, PartialEq)]
pub struct JobState {
    pub id: JobId,
    pub title: String,
    pub hint: String,
    /// Fraction done, always within `0.0..=1.0`.
    pub progress: f64,
    pub completed: bool,
    /// Empty while the job has not reported an error.
    pub error_message: String,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

impl JobState {
    /// Linear estimate from elapsed time and progress. Zero until some
    /// progress has been reported, and once the job is complete.
    pub fn remaining(&self) -> Duration {
        if self.completed || self.progress <= 0.0 || self.progress >= 1.0 {
            return Duration::ZERO;
        }
        self.elapsed.mul_f64((1.0 - self.progress) / self.progress)
    }

    pub fn percent(&self) -> u8 {
        (self.progress * 100.0).round() as u8
    }

    pub fn has_error(&self) -> bool {
        !self.error_message.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(progress: f64, elapsed_secs: u64) -> JobState {
        JobState {
            id: JobId(1),
            title: "Installing".into(),
            hint: String::new(),
            progress,
            completed: false,
            error_message: String::new(),
            started_at: Utc::now(),
            elapsed: Duration::from_secs(elapsed_secs),
        }
    }

    #[test]
    fn test_remaining_linear_estimate() {
        assert_eq!(state(0.25, 10).remaining(), Duration::from_secs(30));
        assert_eq!(state(0.5, 10).remaining(), Duration::from_secs(10));
    }

    #[test]
    fn test_remaining_zero_without_progress() {
        assert_eq!(state(0.0, 10).remaining(), Duration::ZERO);

        let mut done = state(0.5, 10);
        done.completed = true;
        assert_eq!(done.remaining(), Duration::ZERO);
    }

    #[test]
    fn test_percent_rounds() {
        assert_eq!(state(0.333, 0).percent(), 33);
        assert_eq!(state(0.995, 0).percent(), 100);
    }
}
