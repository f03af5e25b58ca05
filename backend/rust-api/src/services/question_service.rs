use crate::errors::ServiceError;
use crate::models::new_id;
use crate::models::question::{
    AnswerOption, CreateQuestionRequest, Question, QuestionFilter, UpdateQuestionRequest,
};
use anyhow::{Context, Result};
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{doc, to_bson};
use mongodb::options::FindOptions;
use mongodb::Database;

/// At least one option must be marked correct, and option texts must be distinct
pub fn check_options(options: &[AnswerOption]) -> Result<()> {
    if !options.iter().any(|opt| opt.is_correct) {
        return Err(ServiceError::invalid("Mark at least one option as correct"));
    }
    if options.iter().any(|opt| opt.text.trim().is_empty()) {
        return Err(ServiceError::invalid("Option text must not be empty"));
    }
    for (i, opt) in options.iter().enumerate() {
        if options[..i].iter().any(|prev| prev.text == opt.text) {
            return Err(ServiceError::invalid(format!(
                "Duplicate option \"{}\"",
                opt.text
            )));
        }
    }
    Ok(())
}

pub struct QuestionService {
    mongo: Database,
}

impl QuestionService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    pub async fn create(&self, teacher_id: &str, req: CreateQuestionRequest) -> Result<Question> {
        check_options(&req.options)?;

        let question = Question {
            id: new_id(),
            teacher_id: teacher_id.to_string(),
            title: req.title,
            text: req.text,
            options: req.options,
            difficulty: req.difficulty,
            subject: req.subject,
            topic: req.topic,
            tags: req.tags,
            image_url: req.image_url,
            created_at: Utc::now(),
        };

        self.mongo
            .collection::<Question>("questions")
            .insert_one(&question)
            .await
            .context("Failed to insert question")?;

        tracing::info!(question_id = %question.id, teacher_id, "Question created");
        Ok(question)
    }

    /// Загружает весь банк вопросов и фильтрует в памяти
    pub async fn list(&self, filter: &QuestionFilter) -> Result<Vec<Question>> {
        let questions: Vec<Question> = self
            .mongo
            .collection::<Question>("questions")
            .find(doc! {})
            .with_options(FindOptions::builder().sort(doc! { "createdAt": -1 }).build())
            .await
            .context("Failed to query questions")?
            .try_collect()
            .await
            .context("Failed to collect questions")?;

        Ok(questions.into_iter().filter(|q| filter.matches(q)).collect())
    }

    pub async fn get(&self, question_id: &str) -> Result<Question> {
        self.mongo
            .collection::<Question>("questions")
            .find_one(doc! { "_id": question_id })
            .await
            .context("Failed to query question")?
            .ok_or_else(|| ServiceError::not_found("Question not found"))
    }

    async fn owned(&self, question_id: &str, teacher_id: &str) -> Result<Question> {
        let question = self.get(question_id).await?;
        if question.teacher_id != teacher_id {
            return Err(ServiceError::forbidden("Only the author can change this question"));
        }
        Ok(question)
    }

    pub async fn update(
        &self,
        question_id: &str,
        teacher_id: &str,
        req: UpdateQuestionRequest,
    ) -> Result<Question> {
        let mut question = self.owned(question_id, teacher_id).await?;

        if let Some(options) = req.options {
            check_options(&options)?;
            question.options = options;
        }
        if let Some(title) = req.title {
            question.title = title;
        }
        if let Some(text) = req.text {
            question.text = text;
        }
        if let Some(difficulty) = req.difficulty {
            question.difficulty = difficulty;
        }
        if let Some(subject) = req.subject {
            question.subject = subject;
        }
        if let Some(topic) = req.topic {
            question.topic = topic;
        }
        if let Some(tags) = req.tags {
            question.tags = tags;
        }
        if req.image_url.is_some() {
            question.image_url = req.image_url;
        }

        let update = doc! {
            "$set": {
                "title": &question.title,
                "text": &question.text,
                "options": to_bson(&question.options).context("Failed to encode options")?,
                "difficulty": question.difficulty.as_str(),
                "subject": &question.subject,
                "topic": &question.topic,
                "tags": question.tags.clone(),
                "image_url": question.image_url.as_deref(),
            }
        };

        self.mongo
            .collection::<Question>("questions")
            .update_one(doc! { "_id": question_id }, update)
            .await
            .context("Failed to update question")?;

        Ok(question)
    }

    pub async fn delete(&self, question_id: &str, teacher_id: &str) -> Result<()> {
        self.owned(question_id, teacher_id).await?;

        self.mongo
            .collection::<Question>("questions")
            .delete_one(doc! { "_id": question_id })
            .await
            .context("Failed to delete question")?;

        tracing::info!(question_id, teacher_id, "Question deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(text: &str, is_correct: bool) -> AnswerOption {
        AnswerOption {
            text: text.into(),
            is_correct,
        }
    }

    #[test]
    fn test_options_need_a_correct_answer() {
        assert!(check_options(&[option("4", true), option("5", false)]).is_ok());

        let err = check_options(&[option("4", false), option("5", false)]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ServiceError>(),
            Some(ServiceError::Invalid(_))
        ));
    }

    #[test]
    fn test_duplicate_or_blank_options_are_rejected() {
        assert!(check_options(&[option("4", true), option("4", false)]).is_err());
        assert!(check_options(&[option("4", true), option("  ", false)]).is_err());
    }
}
