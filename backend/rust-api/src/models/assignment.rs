use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{bson_datetime_as_chrono, bson_datetime_as_chrono_option};

/// Задание ("assignments")
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    #[serde(rename = "_id")]
    pub id: String,
    pub class_id: String,
    pub title: String,
    pub due_date: NaiveDate,
    /// Topic node whose learning material feeds the interventions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_node_id: Option<String>,
    /// Alternate (prerequisite) question set
    #[serde(default)]
    pub remedial_question_ids: Vec<String>,
    #[serde(rename = "createdAt", with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
}

/// Связь задания с вопросом ("assignment_questions")
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentQuestion {
    #[serde(rename = "_id")]
    pub id: String,
    pub assignment_id: String,
    pub question_id: String,
    pub position: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStatus {
    #[default]
    Pending,
    Completed,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Pending => "pending",
            AssignmentStatus::Completed => "completed",
        }
    }
}

/// Статус задания у конкретного ученика ("student_assignments")
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentAssignment {
    #[serde(rename = "_id")]
    pub id: String,
    pub assignment_id: String,
    pub class_id: String,
    pub student_id: String,
    pub status: AssignmentStatus,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateAssignmentRequest {
    #[validate(length(
        min = 1,
        max = 200,
        message = "Title must be between 1 and 200 characters"
    ))]
    pub title: String,

    pub due_date: NaiveDate,

    #[validate(length(min = 1, message = "Select at least one question"))]
    pub question_ids: Vec<String>,

    #[serde(default)]
    pub remedial_question_ids: Vec<String>,

    pub topic_node_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AssignmentResponse {
    pub id: String,
    pub class_id: String,
    pub title: String,
    pub due_date: NaiveDate,
    pub question_ids: Vec<String>,
    pub remedial_question_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic_node_id: Option<String>,
}

/// Задание в списке ученика
#[derive(Debug, Serialize)]
pub struct StudentAssignmentView {
    pub id: String,
    pub title: String,
    pub due_date: NaiveDate,
    pub status: AssignmentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct StudentAssignmentsResponse {
    pub pending: Vec<StudentAssignmentView>,
    pub completed: Vec<StudentAssignmentView>,
}
