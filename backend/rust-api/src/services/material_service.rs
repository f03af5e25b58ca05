use std::collections::HashMap;

use crate::errors::ServiceError;
use crate::models::material::{
    LearningMaterial, MaterialTab, MaterialView, UploadResponse, UpsertMaterialRequest,
};
use crate::models::new_id;
use crate::models::topic::{Topic, TopicNode};
use crate::services::class_service::{ensure_member, owned_class};
use crate::services::object_storage::ObjectStorageClient;
use anyhow::{Context, Result};
use futures::TryStreamExt;
use lazy_static::lazy_static;
use mongodb::bson::{doc, Bson};
use mongodb::Database;
use regex::Regex;

lazy_static! {
    static ref YOUTUBE_ID: Regex =
        Regex::new(r"(?:youtu\.be/|youtube\.com/(?:watch\?v=|embed/))([^\s&?/]+)").unwrap();
}

/// Rewrites watch/short YouTube links into embeddable ones; other URLs pass through
pub fn youtube_embed_url(url: &str) -> String {
    match YOUTUBE_ID.captures(url).and_then(|caps| caps.get(1)) {
        Some(id) => format!("https://www.youtube.com/embed/{}", id.as_str()),
        None => url.to_string(),
    }
}

/// Content type for accepted upload extensions
pub fn upload_content_type(filename: &str) -> Option<&'static str> {
    let extension = filename.rsplit_once('.')?.1.to_ascii_lowercase();
    match extension.as_str() {
        "pdf" => Some("application/pdf"),
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// Joins materials with their topic nodes, ordered by week
pub fn build_views(
    materials: Vec<LearningMaterial>,
    nodes: &HashMap<String, TopicNode>,
    topic_names: &HashMap<String, String>,
    tab: Option<MaterialTab>,
) -> Vec<MaterialView> {
    let mut views: Vec<MaterialView> = materials
        .into_iter()
        .filter(|m| tab.map_or(true, |tab| m.has(tab)))
        .filter_map(|m| {
            let node = nodes.get(&m.topic_node_id)?;
            Some(MaterialView {
                topic_name: topic_names
                    .get(&node.topic_id)
                    .cloned()
                    .unwrap_or_default(),
                week: node.week,
                topic_node_id: m.topic_node_id,
                pdf_url: m.pdf_url,
                youtube_url: m.youtube_url,
                animation_embed: m.animation_embed,
            })
        })
        .collect();

    views.sort_by(|a, b| {
        a.week
            .cmp(&b.week)
            .then_with(|| a.topic_name.cmp(&b.topic_name))
    });
    views
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub struct MaterialService {
    mongo: Database,
    storage: Option<ObjectStorageClient>,
}

impl MaterialService {
    pub fn new(mongo: Database, storage: Option<ObjectStorageClient>) -> Self {
        Self { mongo, storage }
    }

    async fn class_node(&self, class_id: &str, topic_node_id: &str) -> Result<TopicNode> {
        self.mongo
            .collection::<TopicNode>("topic_nodes")
            .find_one(doc! { "_id": topic_node_id, "class_id": class_id })
            .await
            .context("Failed to query topic node")?
            .ok_or_else(|| ServiceError::not_found("Topic node not found in this class"))
    }

    /// Материалы узла целиком заменяются переданными ссылками
    pub async fn upsert(
        &self,
        teacher_id: &str,
        class_id: &str,
        topic_node_id: &str,
        req: UpsertMaterialRequest,
    ) -> Result<LearningMaterial> {
        owned_class(&self.mongo, class_id, teacher_id).await?;
        self.class_node(class_id, topic_node_id).await?;

        let collection = self.mongo.collection::<LearningMaterial>("learning_materials");
        let existing = collection
            .find_one(doc! { "topic_node_id": topic_node_id })
            .await
            .context("Failed to query learning material")?;

        let material = LearningMaterial {
            id: existing.map(|m| m.id).unwrap_or_else(new_id),
            class_id: class_id.to_string(),
            topic_node_id: topic_node_id.to_string(),
            pdf_url: non_empty(req.pdf_url),
            youtube_url: non_empty(req.youtube_url).map(|url| youtube_embed_url(&url)),
            animation_embed: non_empty(req.animation_embed),
        };

        collection
            .replace_one(doc! { "topic_node_id": topic_node_id }, &material)
            .upsert(true)
            .await
            .context("Failed to save learning material")?;

        tracing::info!(class_id, topic_node_id, "Learning material saved");
        Ok(material)
    }

    async fn views(&self, class_id: &str, tab: Option<MaterialTab>) -> Result<Vec<MaterialView>> {
        let materials: Vec<LearningMaterial> = self
            .mongo
            .collection::<LearningMaterial>("learning_materials")
            .find(doc! { "class_id": class_id })
            .await
            .context("Failed to query learning materials")?
            .try_collect()
            .await
            .context("Failed to collect learning materials")?;
        if materials.is_empty() {
            return Ok(Vec::new());
        }

        let nodes: HashMap<String, TopicNode> = self
            .mongo
            .collection::<TopicNode>("topic_nodes")
            .find(doc! { "class_id": class_id })
            .await
            .context("Failed to query topic nodes")?
            .try_collect::<Vec<_>>()
            .await
            .context("Failed to collect topic nodes")?
            .into_iter()
            .map(|n| (n.id.clone(), n))
            .collect();

        let topic_ids: Vec<Bson> = nodes
            .values()
            .map(|n| Bson::String(n.topic_id.clone()))
            .collect();
        let topic_names: HashMap<String, String> = self
            .mongo
            .collection::<Topic>("topics")
            .find(doc! { "_id": { "$in": topic_ids } })
            .await
            .context("Failed to query topics")?
            .try_collect::<Vec<_>>()
            .await
            .context("Failed to collect topics")?
            .into_iter()
            .map(|t| (t.id, t.name))
            .collect();

        Ok(build_views(materials, &nodes, &topic_names, tab))
    }

    pub async fn list_for_teacher(
        &self,
        teacher_id: &str,
        class_id: &str,
        tab: Option<MaterialTab>,
    ) -> Result<Vec<MaterialView>> {
        owned_class(&self.mongo, class_id, teacher_id).await?;
        self.views(class_id, tab).await
    }

    pub async fn list_for_student(
        &self,
        student_id: &str,
        class_id: &str,
        tab: Option<MaterialTab>,
    ) -> Result<Vec<MaterialView>> {
        ensure_member(&self.mongo, class_id, student_id).await?;
        self.views(class_id, tab).await
    }

    fn storage(&self) -> Result<&ObjectStorageClient> {
        self.storage
            .as_ref()
            .ok_or_else(|| ServiceError::upstream("File uploads are not configured"))
    }

    /// PDF конспекта для узла темы
    pub async fn upload_document(
        &self,
        teacher_id: &str,
        class_id: &str,
        topic_node_id: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadResponse> {
        if upload_content_type(filename) != Some("application/pdf") {
            return Err(ServiceError::invalid("Only PDF documents can be attached to a topic"));
        }
        owned_class(&self.mongo, class_id, teacher_id).await?;
        self.class_node(class_id, topic_node_id).await?;

        let storage = self.storage()?;
        let key = storage.build_upload_key(class_id, topic_node_id, filename);
        let url = storage
            .upload_public(&key, bytes, "application/pdf")
            .await?;

        Ok(UploadResponse { url, key })
    }

    /// Картинка для вопроса
    pub async fn upload_question_image(
        &self,
        teacher_id: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadResponse> {
        let content_type = upload_content_type(filename)
            .filter(|ct| ct.starts_with("image/"))
            .ok_or_else(|| ServiceError::invalid("Unsupported image type"))?;

        let storage = self.storage()?;
        let key = storage.build_upload_key("questions", teacher_id, filename);
        let url = storage.upload_public(&key, bytes, content_type).await?;

        Ok(UploadResponse { url, key })
    }
}
