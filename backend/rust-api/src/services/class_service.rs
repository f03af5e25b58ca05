use crate::errors::ServiceError;
use crate::models::class::{
    Class, CreateClassRequest, JoinClassRequest, StudentClass, StudentClassResponse,
    TeacherClassResponse, CLASS_CODE_LEN, CLASS_PASSKEY_LEN,
};
use crate::models::new_id;
use anyhow::{Context, Result};
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson};
use mongodb::options::FindOptions;
use mongodb::Database;
use rand::{rngs::StdRng, seq::IndexedRandom, Rng, SeedableRng};

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const MAX_CODE_ATTEMPTS: usize = 5;

/// Случайная строка из A-Z0-9
pub fn generate_code<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .filter_map(|_| CODE_ALPHABET.choose(rng).map(|b| *b as char))
        .collect()
}

/// Класс, принадлежащий учителю; иначе NotFound
pub(crate) async fn owned_class(mongo: &Database, class_id: &str, teacher_id: &str) -> Result<Class> {
    mongo
        .collection::<Class>("classes")
        .find_one(doc! { "_id": class_id, "teacher_id": teacher_id })
        .await
        .context("Failed to query class")?
        .ok_or_else(|| ServiceError::not_found("Class not found"))
}

/// Членство ученика в классе; иначе Forbidden
pub(crate) async fn ensure_member(mongo: &Database, class_id: &str, student_id: &str) -> Result<()> {
    let membership = mongo
        .collection::<StudentClass>("student_classes")
        .find_one(doc! { "class_id": class_id, "student_id": student_id })
        .await
        .context("Failed to query class membership")?;

    match membership {
        Some(_) => Ok(()),
        None => Err(ServiceError::forbidden("You are not a member of this class")),
    }
}

pub struct ClassService {
    mongo: Database,
}

impl ClassService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    /// Создать класс с уникальным кодом
    pub async fn create(&self, teacher_id: &str, req: CreateClassRequest) -> Result<TeacherClassResponse> {
        let classes = self.mongo.collection::<Class>("classes");

        let mut rng = StdRng::from_os_rng();
        let mut code = None;
        for _ in 0..MAX_CODE_ATTEMPTS {
            let candidate = generate_code(&mut rng, CLASS_CODE_LEN);
            let taken = classes
                .count_documents(doc! { "code": &candidate })
                .await
                .context("Failed to check class code")?;
            if taken == 0 {
                code = Some(candidate);
                break;
            }
        }
        let code = code.ok_or_else(|| ServiceError::conflict("Could not allocate a unique class code"))?;

        let passkey = req
            .passkey
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| generate_code(&mut rng, CLASS_PASSKEY_LEN));

        let class = Class {
            id: new_id(),
            name: req.name,
            level: req.level,
            description: req.description,
            code,
            passkey,
            teacher_id: teacher_id.to_string(),
            created_at: Utc::now(),
        };

        classes
            .insert_one(&class)
            .await
            .context("Failed to insert class")?;

        tracing::info!(class_id = %class.id, teacher_id, "Class created");
        Ok(class.into())
    }

    pub async fn list_for_teacher(&self, teacher_id: &str) -> Result<Vec<TeacherClassResponse>> {
        let classes: Vec<Class> = self
            .mongo
            .collection::<Class>("classes")
            .find(doc! { "teacher_id": teacher_id })
            .with_options(FindOptions::builder().sort(doc! { "createdAt": -1 }).build())
            .await
            .context("Failed to query classes")?
            .try_collect()
            .await
            .context("Failed to collect classes")?;

        Ok(classes.into_iter().map(Into::into).collect())
    }

    pub async fn list_for_student(&self, student_id: &str) -> Result<Vec<StudentClassResponse>> {
        let memberships: Vec<StudentClass> = self
            .mongo
            .collection::<StudentClass>("student_classes")
            .find(doc! { "student_id": student_id })
            .await
            .context("Failed to query memberships")?
            .try_collect()
            .await
            .context("Failed to collect memberships")?;

        if memberships.is_empty() {
            return Ok(Vec::new());
        }

        let class_ids: Vec<Bson> = memberships
            .into_iter()
            .map(|m| Bson::String(m.class_id))
            .collect();
        let classes: Vec<Class> = self
            .mongo
            .collection::<Class>("classes")
            .find(doc! { "_id": { "$in": class_ids } })
            .with_options(FindOptions::builder().sort(doc! { "name": 1 }).build())
            .await
            .context("Failed to query joined classes")?
            .try_collect()
            .await
            .context("Failed to collect joined classes")?;

        Ok(classes.into_iter().map(Into::into).collect())
    }

    /// Вступить в класс по коду и passkey (точное совпадение)
    pub async fn join(&self, student_id: &str, req: JoinClassRequest) -> Result<StudentClassResponse> {
        let class = self
            .mongo
            .collection::<Class>("classes")
            .find_one(doc! { "code": req.code.trim(), "passkey": &req.passkey })
            .await
            .context("Failed to query class by code")?
            .ok_or_else(|| {
                tracing::warn!(student_id, code = %req.code, "Join rejected");
                ServiceError::not_found("Invalid class code or passkey")
            })?;

        let memberships = self.mongo.collection::<StudentClass>("student_classes");
        let existing = memberships
            .find_one(doc! { "class_id": &class.id, "student_id": student_id })
            .await
            .context("Failed to query class membership")?;

        if existing.is_none() {
            memberships
                .insert_one(StudentClass {
                    id: new_id(),
                    student_id: student_id.to_string(),
                    class_id: class.id.clone(),
                    joined_at: Utc::now(),
                })
                .await
                .context("Failed to insert class membership")?;
            tracing::info!(class_id = %class.id, student_id, "Student joined class");
        }

        Ok(class.into())
    }
}
