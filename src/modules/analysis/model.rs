use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Finished,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Failed)
    }

    /// queued -> running -> finished | failed. A queued job may also fail
    /// directly when it could not be handed to the broker.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Running)
                | (JobStatus::Queued, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Finished)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Finished => "finished",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Registry entry for one submitted job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: Uuid,
    pub content_id: Uuid,
    pub status: JobStatus,
    pub message: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl JobRecord {
    pub fn queued(job_id: Uuid, content_id: Uuid) -> Self {
        Self {
            job_id,
            content_id,
            status: JobStatus::Queued,
            message: None,
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn advance(&self, status: JobStatus, message: Option<String>) -> Self {
        Self {
            job_id: self.job_id,
            content_id: self.content_id,
            status,
            message,
            updated_at: OffsetDateTime::now_utc(),
        }
    }
}

/// Aggregate written once per content item, after a successful run.
///
/// `frames_analyzed` counts frames in which a pose was detected, not every
/// decoded frame, and `average_angle` is the mean over exactly those frames.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AnalysisSummary {
    pub average_angle: f64,
    pub frames_analyzed: u64,
}

impl AnalysisSummary {
    pub fn from_samples(samples: &[f64]) -> Self {
        let average_angle = if samples.is_empty() {
            0.0
        } else {
            samples.iter().sum::<f64>() / samples.len() as f64
        };
        Self {
            average_angle,
            frames_analyzed: samples.len() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_never_move() {
        for next in [
            JobStatus::Queued,
            JobStatus::Running,
            JobStatus::Finished,
            JobStatus::Failed,
        ] {
            assert!(!JobStatus::Finished.can_transition_to(next));
            assert!(!JobStatus::Failed.can_transition_to(next));
        }
    }

    #[test]
    fn lifecycle_moves_forward_only() {
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Running));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Finished));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Running.can_transition_to(JobStatus::Queued));
        assert!(!JobStatus::Queued.can_transition_to(JobStatus::Finished));
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&JobStatus::Running).unwrap(), "\"running\"");
        assert_eq!(JobStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn empty_samples_average_to_zero() {
        let summary = AnalysisSummary::from_samples(&[]);
        assert_eq!(summary.average_angle, 0.0);
        assert_eq!(summary.frames_analyzed, 0);
    }

    #[test]
    fn average_is_mean_of_samples() {
        let summary = AnalysisSummary::from_samples(&[10.0, -4.0, 3.0]);
        assert!((summary.average_angle - 3.0).abs() < 1e-12);
        assert_eq!(summary.frames_analyzed, 3);
    }

    #[test]
    fn record_survives_json_round_trip() {
        let record = JobRecord::queued(Uuid::new_v4(), Uuid::new_v4());
        let json = serde_json::to_string(&record).unwrap();
        let back: JobRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.status, JobStatus::Queued);
        assert_eq!(back.content_id, record.content_id);
    }
}
