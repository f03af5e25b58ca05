use std::collections::HashMap;

use crate::errors::ServiceError;
use crate::models::assignment::{
    Assignment, AssignmentQuestion, AssignmentResponse, AssignmentStatus, CreateAssignmentRequest,
    StudentAssignment, StudentAssignmentView, StudentAssignmentsResponse,
};
use crate::models::new_id;
use crate::services::class_service::{ensure_member, owned_class};
use anyhow::{Context, Result};
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson};
use mongodb::options::FindOptions;
use mongodb::Database;

/// Splits class assignments by the student's status rows; no row means pending
pub fn split_by_status(
    assignments: Vec<Assignment>,
    statuses: &[StudentAssignment],
) -> StudentAssignmentsResponse {
    let by_assignment: HashMap<&str, &StudentAssignment> = statuses
        .iter()
        .map(|s| (s.assignment_id.as_str(), s))
        .collect();

    let mut pending = Vec::new();
    let mut completed = Vec::new();
    for assignment in assignments {
        let row = by_assignment.get(assignment.id.as_str());
        let status = row.map(|r| r.status).unwrap_or_default();
        let view = StudentAssignmentView {
            id: assignment.id,
            title: assignment.title,
            due_date: assignment.due_date,
            status,
            completed_at: row.and_then(|r| r.completed_at),
        };
        match status {
            AssignmentStatus::Pending => pending.push(view),
            AssignmentStatus::Completed => completed.push(view),
        }
    }

    StudentAssignmentsResponse { pending, completed }
}

pub struct AssignmentService {
    mongo: Database,
}

impl AssignmentService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    /// Создать задание: сначала документ задания, затем связи с вопросами.
    /// Без транзакции: если второй шаг упал, задание остаётся без вопросов.
    pub async fn create(
        &self,
        teacher_id: &str,
        class_id: &str,
        req: CreateAssignmentRequest,
    ) -> Result<AssignmentResponse> {
        owned_class(&self.mongo, class_id, teacher_id).await?;

        let assignment = Assignment {
            id: new_id(),
            class_id: class_id.to_string(),
            title: req.title,
            due_date: req.due_date,
            topic_node_id: req.topic_node_id,
            remedial_question_ids: req.remedial_question_ids,
            created_at: Utc::now(),
        };

        self.mongo
            .collection::<Assignment>("assignments")
            .insert_one(&assignment)
            .await
            .context("Failed to insert assignment")?;

        let links: Vec<AssignmentQuestion> = req
            .question_ids
            .iter()
            .enumerate()
            .map(|(position, question_id)| AssignmentQuestion {
                id: new_id(),
                assignment_id: assignment.id.clone(),
                question_id: question_id.clone(),
                position: position as u32,
            })
            .collect();

        if let Err(err) = self
            .mongo
            .collection::<AssignmentQuestion>("assignment_questions")
            .insert_many(&links)
            .await
        {
            tracing::error!(
                assignment_id = %assignment.id,
                "Assignment stored without its questions: {}",
                err
            );
            return Err(err).context("Failed to link questions to assignment");
        }

        tracing::info!(
            assignment_id = %assignment.id,
            class_id,
            questions = links.len(),
            "Assignment created"
        );

        Ok(AssignmentResponse {
            id: assignment.id,
            class_id: assignment.class_id,
            title: assignment.title,
            due_date: assignment.due_date,
            question_ids: req.question_ids,
            remedial_question_ids: assignment.remedial_question_ids,
            topic_node_id: assignment.topic_node_id,
        })
    }

    async fn class_assignments(&self, class_id: &str) -> Result<Vec<Assignment>> {
        self.mongo
            .collection::<Assignment>("assignments")
            .find(doc! { "class_id": class_id })
            .with_options(FindOptions::builder().sort(doc! { "due_date": 1 }).build())
            .await
            .context("Failed to query assignments")?
            .try_collect()
            .await
            .context("Failed to collect assignments")
    }

    pub async fn list(&self, teacher_id: &str, class_id: &str) -> Result<Vec<AssignmentResponse>> {
        owned_class(&self.mongo, class_id, teacher_id).await?;
        let assignments = self.class_assignments(class_id).await?;
        if assignments.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Bson> = assignments
            .iter()
            .map(|a| Bson::String(a.id.clone()))
            .collect();
        let links: Vec<AssignmentQuestion> = self
            .mongo
            .collection::<AssignmentQuestion>("assignment_questions")
            .find(doc! { "assignment_id": { "$in": ids } })
            .with_options(FindOptions::builder().sort(doc! { "position": 1 }).build())
            .await
            .context("Failed to query assignment questions")?
            .try_collect()
            .await
            .context("Failed to collect assignment questions")?;

        let mut questions: HashMap<String, Vec<String>> = HashMap::new();
        for link in links {
            questions
                .entry(link.assignment_id)
                .or_default()
                .push(link.question_id);
        }

        Ok(assignments
            .into_iter()
            .map(|a| AssignmentResponse {
                question_ids: questions.remove(&a.id).unwrap_or_default(),
                id: a.id,
                class_id: a.class_id,
                title: a.title,
                due_date: a.due_date,
                remedial_question_ids: a.remedial_question_ids,
                topic_node_id: a.topic_node_id,
            })
            .collect())
    }

    pub async fn delete(&self, teacher_id: &str, assignment_id: &str) -> Result<()> {
        let assignment = self
            .mongo
            .collection::<Assignment>("assignments")
            .find_one(doc! { "_id": assignment_id })
            .await
            .context("Failed to query assignment")?
            .ok_or_else(|| ServiceError::not_found("Assignment not found"))?;
        owned_class(&self.mongo, &assignment.class_id, teacher_id).await?;

        self.mongo
            .collection::<Assignment>("assignments")
            .delete_one(doc! { "_id": assignment_id })
            .await
            .context("Failed to delete assignment")?;
        self.mongo
            .collection::<AssignmentQuestion>("assignment_questions")
            .delete_many(doc! { "assignment_id": assignment_id })
            .await
            .context("Failed to delete assignment questions")?;
        self.mongo
            .collection::<StudentAssignment>("student_assignments")
            .delete_many(doc! { "assignment_id": assignment_id })
            .await
            .context("Failed to delete student assignment statuses")?;

        tracing::info!(assignment_id, teacher_id, "Assignment deleted");
        Ok(())
    }

    /// Задания класса для ученика: pending / completed
    pub async fn for_student(
        &self,
        student_id: &str,
        class_id: &str,
    ) -> Result<StudentAssignmentsResponse> {
        ensure_member(&self.mongo, class_id, student_id).await?;
        let assignments = self.class_assignments(class_id).await?;

        let statuses: Vec<StudentAssignment> = self
            .mongo
            .collection::<StudentAssignment>("student_assignments")
            .find(doc! { "class_id": class_id, "student_id": student_id })
            .await
            .context("Failed to query assignment statuses")?
            .try_collect()
            .await
            .context("Failed to collect assignment statuses")?;

        Ok(split_by_status(assignments, &statuses))
    }
}
