// libs/consultation-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use shared_models::timestamps;

use crate::error::ConsultationError;

// ==============================================================================
// CORE CONSULTATION MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsultationRecord {
    #[serde(alias = "_id")]
    pub id: String,
    pub patient_id: String,
    #[serde(default)]
    pub doctor_id: Option<String>,
    #[serde(default)]
    pub doctor_name: Option<String>,
    #[serde(default)]
    pub patient_name: Option<String>,
    pub consultation_type: ConsultationType,
    #[serde(default)]
    pub priority: Priority,
    pub status: ConsultationStatus,
    #[serde(deserialize_with = "timestamps::deserialize")]
    pub scheduled_at: DateTime<Utc>,
    pub chief_complaint: String,
    #[serde(default)]
    pub symptoms: Vec<Symptom>,
    #[serde(deserialize_with = "timestamps::deserialize")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "timestamps::deserialize")]
    pub updated_at: DateTime<Utc>,
}

impl ConsultationRecord {
    pub fn has_doctor(&self) -> bool {
        self.doctor_id.as_deref().is_some_and(|id| !id.is_empty())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Symptom {
    pub name: String,
    pub severity: u8,
    pub duration: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationStatus {
    Pending,
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl ConsultationStatus {
    pub const ALL: [ConsultationStatus; 5] = [
        ConsultationStatus::Pending,
        ConsultationStatus::Scheduled,
        ConsultationStatus::InProgress,
        ConsultationStatus::Completed,
        ConsultationStatus::Cancelled,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, ConsultationStatus::Completed | ConsultationStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultationStatus::Pending => "pending",
            ConsultationStatus::Scheduled => "scheduled",
            ConsultationStatus::InProgress => "in_progress",
            ConsultationStatus::Completed => "completed",
            ConsultationStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ConsultationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationType {
    Initial,
    #[serde(alias = "followup", alias = "follow-up")]
    FollowUp,
    Urgent,
    Routine,
    Emergency,
    SecondOpinion,
    #[serde(alias = "specialist_consultation")]
    Specialist,
}

impl ConsultationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultationType::Initial => "initial",
            ConsultationType::FollowUp => "follow_up",
            ConsultationType::Urgent => "urgent",
            ConsultationType::Routine => "routine",
            ConsultationType::Emergency => "emergency",
            ConsultationType::SecondOpinion => "second_opinion",
            ConsultationType::Specialist => "specialist",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConsultationType::Initial => "Initial consultation",
            ConsultationType::FollowUp => "Follow-up",
            ConsultationType::Urgent => "Urgent",
            ConsultationType::Routine => "Routine check-up",
            ConsultationType::Emergency => "Emergency",
            ConsultationType::SecondOpinion => "Second opinion",
            ConsultationType::Specialist => "Specialist",
        }
    }
}

impl fmt::Display for ConsultationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
            Priority::Urgent => write!(f, "urgent"),
        }
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookConsultationRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_id: Option<String>,
    pub consultation_type: ConsultationType,
    #[serde(default)]
    pub priority: Priority,
    pub scheduled_at: DateTime<Utc>,
    pub chief_complaint: String,
    #[serde(default)]
    pub symptoms: Vec<Symptom>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ConsultationStatus>,
}

impl BookConsultationRequest {
    /// Local checks run before anything is sent.
    pub fn validate(&self) -> Result<(), ConsultationError> {
        if self.chief_complaint.trim().is_empty() {
            return Err(ConsultationError::Validation("Chief complaint is required".to_string()));
        }

        for symptom in &self.symptoms {
            if symptom.name.trim().is_empty() {
                return Err(ConsultationError::Validation("Symptom name is required".to_string()));
            }
            if !(1..=10).contains(&symptom.severity) {
                return Err(ConsultationError::Validation(format!(
                    "Symptom '{}' severity must be between 1 and 10, got {}",
                    symptom.name, symptom.severity
                )));
            }
        }

        Ok(())
    }
}

/// Body of `PUT /api/consultations/{id}`. Accepting also claims the record,
/// so `doctor_id` rides along with `scheduled`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: ConsultationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_id: Option<String>,
}

// ==============================================================================
// VIEW MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    ScheduledAt,
    CreatedAt,
    UpdatedAt,
    Priority,
    Status,
    ConsultationType,
    ChiefComplaint,
    DoctorName,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Parameters for the searchable consultation table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableQuery {
    pub text: Option<String>,
    pub status: Option<ConsultationStatus>,
    pub priority: Option<Priority>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub sort_field: SortField,
    pub sort_direction: SortDirection,
    pub page: usize,
    pub page_size: usize,
}

impl Default for TableQuery {
    fn default() -> Self {
        Self {
            text: None,
            status: None,
            priority: None,
            from: None,
            to: None,
            sort_field: SortField::default(),
            sort_direction: SortDirection::default(),
            page: 1,
            page_size: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HistoryView {
    pub recent: Vec<ConsultationRecord>,
    pub older: Vec<ConsultationRecord>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatusSummary {
    pub total: usize,
    pub pending: usize,
    pub scheduled: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub completion_rate: f64,
    pub cancellation_rate: f64,
}
