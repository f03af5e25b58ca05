use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::question::{DifficultyTier, Question, QuestionPrompt};

/// Self-reported confidence level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    #[default]
    Medium,
    High,
}

impl Confidence {
    /// Numeric level reported to analytics (0, 1, 2)
    pub fn level(self) -> u8 {
        match self {
            Confidence::Low => 0,
            Confidence::Medium => 1,
            Confidence::High => 2,
        }
    }
}

/// Remedial media types in their fixed presentation order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InterventionKind {
    Document,
    Video,
    Animation,
}

impl InterventionKind {
    pub const SEQUENCE: [InterventionKind; 3] = [
        InterventionKind::Document,
        InterventionKind::Video,
        InterventionKind::Animation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            InterventionKind::Document => "document",
            InterventionKind::Video => "video",
            InterventionKind::Animation => "animation",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InterventionItem {
    pub kind: InterventionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Named ordered pool of questions
#[derive(Debug, Clone, Default)]
pub struct QuestionSet {
    pub name: String,
    pub questions: Vec<Question>,
}

impl QuestionSet {
    pub fn new(name: impl Into<String>, questions: Vec<Question>) -> Self {
        Self {
            name: name.into(),
            questions,
        }
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActiveSet {
    Default,
    Alternate,
}

/// Everything a flow run needs, loaded once when the assessment is opened
#[derive(Debug, Clone)]
pub struct AssessmentPlan {
    pub assignment_id: String,
    pub class_id: String,
    pub title: String,
    pub default_set: QuestionSet,
    pub alternate_set: QuestionSet,
    pub interventions: [InterventionItem; 3],
}

/// Запись о завершении задания для "student_assignments"
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRecord {
    pub assignment_id: String,
    pub class_id: String,
    pub student_id: String,
    pub completed_at: DateTime<Utc>,
}

/// Попытка ответа для аналитики (формат DKT-движка)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttemptLog {
    pub student_id: String,
    pub quiz_id: String,
    pub question_id: String,
    pub question_difficulty: u8,
    pub student_confidence: u8,
    pub correctness: u8,
    #[serde(rename = "recordedAt", with = "super::bson_datetime_as_chrono")]
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackView {
    pub correct: bool,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FlowPhaseName {
    Presenting,
    Feedback,
    Intervention,
    Completed,
}

/// Flow snapshot returned to the client after every action
#[derive(Debug, Clone, Serialize)]
pub struct FlowView {
    pub flow_id: String,
    pub assignment_id: String,
    pub phase: FlowPhaseName,
    pub active_set: ActiveSet,
    pub set_name: String,
    pub position: usize,
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<QuestionPrompt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,
    pub can_submit: bool,
    pub wrong_streak: u32,
    pub intervention_step: usize,
    pub alternate_correct: Vec<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<FeedbackView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intervention: Option<InterventionItem>,
    /// Client should leave the assessment screen
    pub exit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenFlowRequest {
    pub assignment_id: String,
}

/// Student input for a flow; fields are applied in order select → confidence → submit
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FlowActionRequest {
    SelectAnswer { answer: String },
    SetConfidence { confidence: Confidence },
    Submit,
    Continue,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuizPhaseName {
    Presenting,
    Feedback,
    Finished,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizView {
    pub quiz_id: String,
    pub assignment_id: String,
    pub phase: QuizPhaseName,
    /// 1-based number of the current question
    pub number: u32,
    pub total: u32,
    pub score: u32,
    pub tier: DifficultyTier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<QuestionPrompt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<FeedbackView>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartQuizRequest {
    pub assignment_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuizAnswerRequest {
    pub answer: Option<String>,
    pub confidence: Option<Confidence>,
}

/// Ответ сервиса knowledge tracing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasteryForecast {
    pub model_used: String,
    pub question_ids: Vec<i64>,
    pub predicted_probabilities: Vec<f64>,
}
