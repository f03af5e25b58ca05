use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Тема из общего каталога ("topics")
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTopicRequest {
    #[validate(length(
        min = 1,
        max = 120,
        message = "Name must be between 1 and 120 characters"
    ))]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopicSearchQuery {
    pub search: Option<String>,
}

/// Topic reference placed into a week bucket
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopicRef {
    pub id: String,
    pub name: String,
}

pub const WEEK_KEY_PREFIX: &str = "week-";

/// Parses `week-N` into `N`
pub fn week_number(key: &str) -> Option<u32> {
    key.strip_prefix(WEEK_KEY_PREFIX)?
        .parse::<u32>()
        .ok()
        .filter(|week| *week > 0)
}

pub fn week_key(week: u32) -> String {
    format!("{}{}", WEEK_KEY_PREFIX, week)
}

/// Денормализованный снимок расписания класса ("class_timelines")
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ClassTimeline {
    #[serde(rename = "_id")]
    pub class_id: String,
    #[serde(default)]
    pub timeline: BTreeMap<String, Vec<TopicRef>>,
}

impl ClassTimeline {
    pub fn new(class_id: impl Into<String>) -> Self {
        Self {
            class_id: class_id.into(),
            timeline: BTreeMap::new(),
        }
    }

    /// Appends the topic to the end of the week bucket
    pub fn place(&mut self, week: u32, topic: TopicRef) {
        self.timeline.entry(week_key(week)).or_default().push(topic);
    }

    /// Removes the topic at `index` of the week bucket
    pub fn remove_at(&mut self, week: u32, index: usize) -> Option<TopicRef> {
        let bucket = self.timeline.get_mut(&week_key(week))?;
        if index >= bucket.len() {
            return None;
        }
        Some(bucket.remove(index))
    }

    /// All placed topics with their week number
    pub fn placed_topics(&self) -> Vec<(u32, &TopicRef)> {
        self.timeline
            .iter()
            .filter_map(|(key, topics)| week_number(key).map(|week| (week, topics)))
            .flat_map(|(week, topics)| topics.iter().map(move |topic| (week, topic)))
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PlaceTopicRequest {
    #[validate(range(min = 1, max = 52, message = "Week must be between 1 and 52"))]
    pub week: u32,
    pub topic_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaveTimelineRequest {
    pub timeline: BTreeMap<String, Vec<TopicRef>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct NodePosition {
    pub x: f64,
    pub y: f64,
}

/// Узел графа тем ("topic_nodes")
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicNode {
    #[serde(rename = "_id")]
    pub id: String,
    pub class_id: String,
    pub topic_id: String,
    pub week: u32,
    pub position: NodePosition,
}

/// Ребро графа тем ("topic_edges")
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicEdge {
    #[serde(rename = "_id")]
    pub id: String,
    pub class_id: String,
    pub source_node_id: String,
    pub target_node_id: String,
}

/// Node as submitted by the graph editor; `id` is the editor's own key
#[derive(Debug, Clone, Deserialize)]
pub struct GraphNodeInput {
    pub id: String,
    pub topic_id: String,
    pub week: u32,
    #[serde(default)]
    pub position: NodePosition,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphEdgeInput {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaveGraphRequest {
    #[serde(default)]
    pub nodes: Vec<GraphNodeInput>,
    #[serde(default)]
    pub edges: Vec<GraphEdgeInput>,
}

#[derive(Debug, Serialize)]
pub struct GraphResponse {
    pub nodes: Vec<TopicNode>,
    pub edges: Vec<TopicEdge>,
}

/// Documents to insert for a replace-all graph save
#[derive(Debug)]
pub struct GraphReplacePlan {
    pub nodes: Vec<TopicNode>,
    pub edges: Vec<TopicEdge>,
    /// Edges whose endpoints were not among the submitted nodes
    pub dropped_edges: usize,
}

impl GraphReplacePlan {
    /// Issues fresh node ids and remaps edge endpoints through them
    pub fn build(class_id: &str, request: &SaveGraphRequest, mut next_id: impl FnMut() -> String) -> Self {
        let mut id_map: HashMap<&str, String> = HashMap::new();
        let mut nodes = Vec::with_capacity(request.nodes.len());

        for input in &request.nodes {
            let id = next_id();
            id_map.insert(input.id.as_str(), id.clone());
            nodes.push(TopicNode {
                id,
                class_id: class_id.to_string(),
                topic_id: input.topic_id.clone(),
                week: input.week,
                position: input.position,
            });
        }

        let mut edges = Vec::with_capacity(request.edges.len());
        let mut dropped_edges = 0;
        for input in &request.edges {
            match (
                id_map.get(input.source.as_str()),
                id_map.get(input.target.as_str()),
            ) {
                (Some(source), Some(target)) => edges.push(TopicEdge {
                    id: next_id(),
                    class_id: class_id.to_string(),
                    source_node_id: source.clone(),
                    target_node_id: target.clone(),
                }),
                _ => dropped_edges += 1,
            }
        }

        Self {
            nodes,
            edges,
            dropped_edges,
        }
    }
}
