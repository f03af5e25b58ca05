use serde::{Deserialize, Serialize};
use validator::Validate;

/// Учебные материалы темы ("learning_materials"), один документ на topic node
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LearningMaterial {
    #[serde(rename = "_id")]
    pub id: String,
    pub class_id: String,
    pub topic_node_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub youtube_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation_embed: Option<String>,
}

impl LearningMaterial {
    pub fn has(&self, tab: MaterialTab) -> bool {
        let value = match tab {
            MaterialTab::Notes => &self.pdf_url,
            MaterialTab::Videos => &self.youtube_url,
            MaterialTab::Animations => &self.animation_embed,
        };
        value.as_deref().is_some_and(|v| !v.trim().is_empty())
    }
}

/// Student material tabs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MaterialTab {
    Notes,
    Videos,
    Animations,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpsertMaterialRequest {
    #[validate(url(message = "PDF URL must be a valid URL"))]
    pub pdf_url: Option<String>,
    #[validate(url(message = "Video URL must be a valid URL"))]
    pub youtube_url: Option<String>,
    #[validate(url(message = "Animation URL must be a valid URL"))]
    pub animation_embed: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MaterialQuery {
    pub tab: Option<MaterialTab>,
}

/// Material joined with its topic node for display
#[derive(Debug, Serialize)]
pub struct MaterialView {
    pub topic_node_id: String,
    pub topic_name: String,
    pub week: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub youtube_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animation_embed: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
    pub key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadQuery {
    pub filename: String,
}
