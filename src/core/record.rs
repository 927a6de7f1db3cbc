//! Experiment lifecycle records.
//!
//! A record mirrors one experiment in the registry. Live-only fields (`pid`,
//! `hostname`, `gpu`) are modeled as `Option` and are present exactly while
//! the status is `Running`; `ended` is present exactly when it is not. The
//! constructors and finalizers below are the only intended mutation paths,
//! so the presence invariant holds at the type level rather than by
//! convention.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of an experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentStatus {
    Running,
    Completed,
    Error,
    Interrupted,
}

impl ExperimentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Interrupted => "interrupted",
        }
    }
}

/// Durable record for one experiment, keyed by name in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentRecord {
    pub status: ExperimentStatus,
    pub started: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu: Option<String>,
}

impl ExperimentRecord {
    /// Record for a job that has just been spawned.
    pub fn running(pid: u32, hostname: String, gpu: Option<String>) -> Self {
        Self {
            status: ExperimentStatus::Running,
            started: Utc::now(),
            ended: None,
            pid: Some(pid),
            hostname: Some(hostname),
            gpu,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == ExperimentStatus::Running
    }

    /// Close out the record with an explicit terminal status.
    pub fn finish(&mut self, status: ExperimentStatus, at: DateTime<Utc>) {
        self.status = status;
        self.seal(at);
    }

    /// Clear live-only fields and stamp `ended` exactly once.
    ///
    /// A status still at `Running` is downgraded to `Interrupted`: by the
    /// time a record is sealed the process is no longer supervised, so
    /// `running` would be a lie. Idempotent.
    pub fn seal(&mut self, at: DateTime<Utc>) {
        self.pid = None;
        self.hostname = None;
        self.gpu = None;
        if self.ended.is_none() {
            self.ended = Some(at);
        }
        if self.status == ExperimentStatus::Running {
            self.status = ExperimentStatus::Interrupted;
        }
    }

    /// Exact string equality against one serialized field, for `list --filter`.
    pub fn field_matches(&self, field: &str, value: &str) -> bool {
        let Ok(serde_json::Value::Object(map)) = serde_json::to_value(self) else {
            return false;
        };
        match map.get(field) {
            Some(serde_json::Value::String(s)) => s == value,
            Some(other) => other.to_string() == value,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_record_has_live_fields() {
        let rec = ExperimentRecord::running(42, "host".to_string(), Some("0,1".to_string()));
        assert!(rec.is_running());
        assert_eq!(rec.pid, Some(42));
        assert_eq!(rec.hostname.as_deref(), Some("host"));
        assert_eq!(rec.gpu.as_deref(), Some("0,1"));
        assert!(rec.ended.is_none());
    }

    #[test]
    fn finish_clears_live_fields_and_stamps_ended() {
        let mut rec = ExperimentRecord::running(42, "host".to_string(), None);
        let at = Utc::now();
        rec.finish(ExperimentStatus::Completed, at);
        assert_eq!(rec.status, ExperimentStatus::Completed);
        assert_eq!(rec.ended, Some(at));
        assert!(rec.pid.is_none());
        assert!(rec.hostname.is_none());
        assert!(rec.gpu.is_none());
    }

    #[test]
    fn seal_downgrades_stale_running_to_interrupted() {
        let mut rec = ExperimentRecord::running(42, "host".to_string(), None);
        rec.seal(Utc::now());
        assert_eq!(rec.status, ExperimentStatus::Interrupted);
        assert!(rec.pid.is_none());
        assert!(rec.ended.is_some());
    }

    #[test]
    fn seal_is_idempotent() {
        let mut rec = ExperimentRecord::running(42, "host".to_string(), None);
        let first = Utc::now();
        rec.finish(ExperimentStatus::Error, first);
        let before = rec.clone();
        rec.seal(Utc::now());
        assert_eq!(rec, before);
    }

    #[test]
    fn absent_optional_fields_are_absent_in_json() {
        let mut rec = ExperimentRecord::running(42, "host".to_string(), None);
        rec.finish(ExperimentStatus::Completed, Utc::now());
        let json = serde_json::to_string(&rec).expect("serialize");
        assert!(!json.contains("pid"));
        assert!(!json.contains("gpu"));
        assert!(!json.contains("hostname"));
        assert!(json.contains("ended"));
    }

    #[test]
    fn field_matches_uses_exact_string_equality() {
        let rec = ExperimentRecord::running(42, "host".to_string(), Some("3".to_string()));
        assert!(rec.field_matches("status", "running"));
        assert!(!rec.field_matches("status", "run"));
        assert!(rec.field_matches("gpu", "3"));
        assert!(rec.field_matches("pid", "42"));
        assert!(!rec.field_matches("nonexistent", "x"));
    }
}
