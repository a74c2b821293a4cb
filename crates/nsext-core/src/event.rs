//! Lifecycle events flowing through the event bus.

use serde::{Deserialize, Serialize};

use crate::config::job_types;
use crate::types::ExtensionRequest;

/// Events the extension lifecycle reacts to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LifecycleEvent {
    /// The application finished starting
    ApplicationStarted,

    /// A job finished running
    JobFinished {
        job_type: String,
        request: ExtensionRequest,
        /// Number of errors recorded by the job
        errors: usize,
    },
}

impl LifecycleEvent {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::ApplicationStarted => "ApplicationStarted",
            Self::JobFinished { .. } => "JobFinished",
        }
    }

    /// The request of a finished uninstall job.
    pub fn uninstall_request(&self) -> Option<&ExtensionRequest> {
        match self {
            Self::JobFinished { job_type, request, .. } if job_type == job_types::UNINSTALL => {
                Some(request)
            }
            _ => None,
        }
    }

    pub fn is_lifecycle_trigger(&self) -> bool {
        matches!(self, Self::ApplicationStarted) || self.uninstall_request().is_some()
    }
}

/// Metadata attached to every published event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    pub event_id: String,
    /// Component that published the event
    pub source: String,
    pub timestamp: i64,
}

impl EventMetadata {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            source: source.into(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uninstall_request() {
        let request = ExtensionRequest::default().with_namespace("wiki:a");
        let event = LifecycleEvent::JobFinished {
            job_type: job_types::UNINSTALL.to_string(),
            request: request.clone(),
            errors: 0,
        };
        assert_eq!(event.uninstall_request(), Some(&request));
        assert!(event.is_lifecycle_trigger());

        let event = LifecycleEvent::JobFinished {
            job_type: job_types::INSTALL.to_string(),
            request,
            errors: 0,
        };
        assert!(event.uninstall_request().is_none());
        assert!(!event.is_lifecycle_trigger());
        assert!(LifecycleEvent::ApplicationStarted.is_lifecycle_trigger());
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_value(LifecycleEvent::ApplicationStarted).unwrap();
        assert_eq!(json["type"], "ApplicationStarted");
    }
}
