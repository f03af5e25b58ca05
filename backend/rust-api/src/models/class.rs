use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::bson_datetime_as_chrono;

pub const CLASS_CODE_LEN: usize = 6;
pub const CLASS_PASSKEY_LEN: usize = 8;

/// Класс, хранится в коллекции "classes"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Class {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub level: String,
    #[serde(default)]
    pub description: String,
    /// Код для вступления в класс (6 символов)
    pub code: String,
    pub passkey: String,
    pub teacher_id: String,
    #[serde(rename = "createdAt", with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
}

/// Членство ученика в классе ("student_classes")
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentClass {
    #[serde(rename = "_id")]
    pub id: String,
    pub student_id: String,
    pub class_id: String,
    #[serde(rename = "joinedAt", with = "bson_datetime_as_chrono")]
    pub joined_at: DateTime<Utc>,
}

/// Представление класса для учителя (с passkey)
#[derive(Debug, Serialize)]
pub struct TeacherClassResponse {
    pub id: String,
    pub name: String,
    pub level: String,
    pub description: String,
    pub code: String,
    pub passkey: String,
    pub created_at: DateTime<Utc>,
}

impl From<Class> for TeacherClassResponse {
    fn from(class: Class) -> Self {
        Self {
            id: class.id,
            name: class.name,
            level: class.level,
            description: class.description,
            code: class.code,
            passkey: class.passkey,
            created_at: class.created_at,
        }
    }
}

/// Представление класса для ученика (без passkey)
#[derive(Debug, Serialize)]
pub struct StudentClassResponse {
    pub id: String,
    pub name: String,
    pub level: String,
    pub description: String,
    pub code: String,
}

impl From<Class> for StudentClassResponse {
    fn from(class: Class) -> Self {
        Self {
            id: class.id,
            name: class.name,
            level: class.level,
            description: class.description,
            code: class.code,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateClassRequest {
    #[validate(length(
        min = 1,
        max = 100,
        message = "Name must be between 1 and 100 characters"
    ))]
    pub name: String,

    #[validate(length(min = 1, max = 50, message = "Level must be between 1 and 50 characters"))]
    pub level: String,

    #[serde(default)]
    pub description: String,

    /// Если не задан, генерируется случайный
    #[validate(length(min = 4, max = 64, message = "Passkey must be between 4 and 64 characters"))]
    pub passkey: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct JoinClassRequest {
    #[validate(length(equal = 6, message = "Class code must be 6 characters"))]
    pub code: String,

    #[validate(length(min = 1, message = "Passkey is required"))]
    pub passkey: String,
}
