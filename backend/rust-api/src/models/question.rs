use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::bson_datetime_as_chrono;

/// Ordered difficulty scale
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyTier {
    Low,
    Medium,
    High,
}

impl DifficultyTier {
    pub const LOWEST: DifficultyTier = DifficultyTier::Low;
    pub const HIGHEST: DifficultyTier = DifficultyTier::High;

    /// One tier up, capped at the highest
    pub fn harder(self) -> Self {
        match self {
            DifficultyTier::Low => DifficultyTier::Medium,
            DifficultyTier::Medium | DifficultyTier::High => DifficultyTier::High,
        }
    }

    /// One tier down, floored at the lowest
    pub fn easier(self) -> Self {
        match self {
            DifficultyTier::High => DifficultyTier::Medium,
            DifficultyTier::Medium | DifficultyTier::Low => DifficultyTier::Low,
        }
    }

    /// Numeric level reported to analytics (0, 1, 2)
    pub fn level(self) -> u8 {
        match self {
            DifficultyTier::Low => 0,
            DifficultyTier::Medium => 1,
            DifficultyTier::High => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DifficultyTier::Low => "low",
            DifficultyTier::Medium => "medium",
            DifficultyTier::High => "high",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerOption {
    pub text: String,
    pub is_correct: bool,
}

/// Вопрос из коллекции "questions"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub teacher_id: String,
    #[serde(default)]
    pub title: String,
    pub text: String,
    pub options: Vec<AnswerOption>,
    pub difficulty: DifficultyTier,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(rename = "createdAt", with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
}

impl Question {
    /// Text of the first option marked correct
    pub fn correct_option(&self) -> Option<&AnswerOption> {
        self.options.iter().find(|opt| opt.is_correct)
    }

    /// Exact match of the selected option text against the correct options
    pub fn is_correct_answer(&self, answer: &str) -> bool {
        self.options
            .iter()
            .find(|opt| opt.text == answer)
            .is_some_and(|opt| opt.is_correct)
    }
}

/// Вопрос в том виде, в каком его видит ученик (без флагов правильности)
#[derive(Debug, Clone, Serialize)]
pub struct QuestionPrompt {
    pub id: String,
    pub title: String,
    pub text: String,
    pub options: Vec<String>,
    pub difficulty: DifficultyTier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl From<&Question> for QuestionPrompt {
    fn from(question: &Question) -> Self {
        Self {
            id: question.id.clone(),
            title: question.title.clone(),
            text: question.text.clone(),
            options: question.options.iter().map(|opt| opt.text.clone()).collect(),
            difficulty: question.difficulty,
            image_url: question.image_url.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[serde(default)]
    #[validate(length(max = 200, message = "Title must be at most 200 characters"))]
    pub title: String,

    #[validate(length(min = 1, max = 2000, message = "Text must be between 1 and 2000 characters"))]
    pub text: String,

    #[validate(length(min = 2, max = 10, message = "A question needs between 2 and 10 options"))]
    pub options: Vec<AnswerOption>,

    pub difficulty: DifficultyTier,

    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub tags: Vec<String>,

    #[validate(url(message = "Image URL must be a valid URL"))]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateQuestionRequest {
    #[validate(length(max = 200, message = "Title must be at most 200 characters"))]
    pub title: Option<String>,

    #[validate(length(min = 1, max = 2000, message = "Text must be between 1 and 2000 characters"))]
    pub text: Option<String>,

    #[validate(length(min = 2, max = 10, message = "A question needs between 2 and 10 options"))]
    pub options: Option<Vec<AnswerOption>>,

    pub difficulty: Option<DifficultyTier>,
    pub subject: Option<String>,
    pub topic: Option<String>,
    pub tags: Option<Vec<String>>,

    #[validate(url(message = "Image URL must be a valid URL"))]
    pub image_url: Option<String>,
}

/// Фильтр банка вопросов. Применяется к полностью загруженной коллекции.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuestionFilter {
    pub search: Option<String>,
    pub difficulty: Option<DifficultyTier>,
    /// Comma separated; every listed tag must be present
    pub tags: Option<String>,
}

impl QuestionFilter {
    pub fn matches(&self, question: &Question) -> bool {
        if let Some(difficulty) = self.difficulty {
            if question.difficulty != difficulty {
                return false;
            }
        }

        if let Some(search) = self.search.as_deref().map(str::trim) {
            if !search.is_empty() {
                let needle = search.to_lowercase();
                let hit = question.text.to_lowercase().contains(&needle)
                    || question.title.to_lowercase().contains(&needle)
                    || question.subject.to_lowercase().contains(&needle)
                    || question.topic.to_lowercase().contains(&needle);
                if !hit {
                    return false;
                }
            }
        }

        self.requested_tags().iter().all(|wanted| {
            question
                .tags
                .iter()
                .any(|tag| tag.eq_ignore_ascii_case(wanted))
        })
    }

    fn requested_tags(&self) -> Vec<String> {
        self.tags
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect()
    }
}
