//! Collaborators of the assessment flow: where plans come from, where
//! completions and quiz attempts go.

use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Bson},
    options::FindOptions,
    Database,
};
use thiserror::Error;

use crate::models::{
    assignment::{Assignment, AssignmentQuestion, AssignmentStatus},
    class::StudentClass,
    material::LearningMaterial,
    new_id, AssessmentPlan, AttemptLog, CompletionRecord, InterventionItem, InterventionKind,
    Question, QuestionSet,
};

pub const ALTERNATE_SET_NAME: &str = "Prerequisite review";

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Assignment {0} not found")]
    AssignmentNotFound(String),
    #[error("Student is not a member of the assignment's class")]
    NotEnrolled,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[async_trait]
pub trait AssessmentStore: Send + Sync {
    /// Loads both question sets and the intervention media of an assignment
    async fn load_plan(
        &self,
        assignment_id: &str,
        student_id: &str,
    ) -> Result<AssessmentPlan, PlanError>;

    async fn mark_completed(&self, record: &CompletionRecord) -> anyhow::Result<()>;
}

#[async_trait]
pub trait AttemptSink: Send + Sync {
    async fn record(&self, attempt: &AttemptLog) -> anyhow::Result<()>;
}

/// Interventions in presentation order, filled from the topic's material
pub fn interventions_from(material: Option<&LearningMaterial>) -> [InterventionItem; 3] {
    InterventionKind::SEQUENCE.map(|kind| {
        let url = material.and_then(|m| match kind {
            InterventionKind::Document => m.pdf_url.clone(),
            InterventionKind::Video => m.youtube_url.clone(),
            InterventionKind::Animation => m.animation_embed.clone(),
        });
        InterventionItem { kind, url }
    })
}

/// Fetches questions by id and returns them in the order of `ids`;
/// ids without a document are skipped
pub(crate) async fn fetch_questions_in_order(
    mongo: &Database,
    ids: &[String],
) -> anyhow::Result<Vec<Question>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let found: Vec<Question> = mongo
        .collection::<Question>("questions")
        .find(doc! { "_id": { "$in": ids.iter().cloned().map(Bson::String).collect::<Vec<_>>() } })
        .await
        .context("Failed to query questions")?
        .try_collect()
        .await
        .context("Failed to collect questions")?;

    let mut by_id: HashMap<String, Question> =
        found.into_iter().map(|q| (q.id.clone(), q)).collect();
    Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
}

pub struct MongoAssessmentStore {
    mongo: Database,
}

impl MongoAssessmentStore {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }
}

#[async_trait]
impl AssessmentStore for MongoAssessmentStore {
    async fn load_plan(
        &self,
        assignment_id: &str,
        student_id: &str,
    ) -> Result<AssessmentPlan, PlanError> {
        let assignment = self
            .mongo
            .collection::<Assignment>("assignments")
            .find_one(doc! { "_id": assignment_id })
            .await
            .context("Failed to query assignment")?
            .ok_or_else(|| PlanError::AssignmentNotFound(assignment_id.to_string()))?;

        let membership = self
            .mongo
            .collection::<StudentClass>("student_classes")
            .find_one(doc! { "student_id": student_id, "class_id": &assignment.class_id })
            .await
            .context("Failed to query class membership")?;
        if membership.is_none() {
            return Err(PlanError::NotEnrolled);
        }

        let links: Vec<AssignmentQuestion> = self
            .mongo
            .collection::<AssignmentQuestion>("assignment_questions")
            .find(doc! { "assignment_id": assignment_id })
            .with_options(FindOptions::builder().sort(doc! { "position": 1 }).build())
            .await
            .context("Failed to query assignment questions")?
            .try_collect()
            .await
            .context("Failed to collect assignment questions")?;
        let default_ids: Vec<String> = links.into_iter().map(|l| l.question_id).collect();

        let default_questions = fetch_questions_in_order(&self.mongo, &default_ids).await?;
        let alternate_questions =
            fetch_questions_in_order(&self.mongo, &assignment.remedial_question_ids).await?;

        let material = match assignment.topic_node_id.as_deref() {
            Some(node_id) => self
                .mongo
                .collection::<LearningMaterial>("learning_materials")
                .find_one(doc! { "topic_node_id": node_id })
                .await
                .context("Failed to query learning material")?,
            None => None,
        };

        tracing::debug!(
            assignment_id,
            default = default_questions.len(),
            alternate = alternate_questions.len(),
            has_material = material.is_some(),
            "Loaded assessment plan"
        );

        Ok(AssessmentPlan {
            assignment_id: assignment.id,
            class_id: assignment.class_id,
            default_set: QuestionSet::new(assignment.title.clone(), default_questions),
            alternate_set: QuestionSet::new(ALTERNATE_SET_NAME, alternate_questions),
            interventions: interventions_from(material.as_ref()),
            title: assignment.title,
        })
    }

    async fn mark_completed(&self, record: &CompletionRecord) -> anyhow::Result<()> {
        self.mongo
            .collection::<mongodb::bson::Document>("student_assignments")
            .update_one(
                doc! { "assignment_id": &record.assignment_id, "student_id": &record.student_id },
                doc! {
                    "$set": {
                        "class_id": &record.class_id,
                        "status": AssignmentStatus::Completed.as_str(),
                        "completed_at": mongodb::bson::DateTime::from_millis(
                            record.completed_at.timestamp_millis()
                        ),
                    },
                    "$setOnInsert": { "_id": new_id() },
                },
            )
            .upsert(true)
            .await
            .context("Failed to mark assignment completed")?;

        Ok(())
    }
}

/// Analytics sink backed by the "attempt_logs" collection
pub struct MongoAttemptLog {
    mongo: Database,
}

impl MongoAttemptLog {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }
}

#[async_trait]
impl AttemptSink for MongoAttemptLog {
    async fn record(&self, attempt: &AttemptLog) -> anyhow::Result<()> {
        self.mongo
            .collection::<AttemptLog>("attempt_logs")
            .insert_one(attempt)
            .await
            .context("Failed to insert attempt log")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interventions_follow_fixed_order_and_material_urls() {
        let material = LearningMaterial {
            id: "m1".into(),
            class_id: "c1".into(),
            topic_node_id: "n1".into(),
            pdf_url: Some("https://cdn.example.com/notes.pdf".into()),
            youtube_url: None,
            animation_embed: Some("https://anim.example.com/embed/1".into()),
        };

        let items = interventions_from(Some(&material));
        assert_eq!(
            items.iter().map(|i| i.kind).collect::<Vec<_>>(),
            InterventionKind::SEQUENCE.to_vec()
        );
        assert_eq!(items[0].url.as_deref(), Some("https://cdn.example.com/notes.pdf"));
        assert!(items[1].url.is_none());
        assert_eq!(items[2].url.as_deref(), Some("https://anim.example.com/embed/1"));

        assert!(interventions_from(None).iter().all(|i| i.url.is_none()));
    }
}
