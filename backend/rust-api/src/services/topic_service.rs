use crate::errors::ServiceError;
use crate::models::new_id;
use crate::models::topic::{
    week_number, ClassTimeline, CreateTopicRequest, GraphReplacePlan, GraphResponse,
    PlaceTopicRequest, SaveGraphRequest, SaveTimelineRequest, Topic, TopicEdge, TopicNode,
    TopicRef,
};
use crate::services::class_service::owned_class;
use anyhow::{Context, Result};
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson};
use mongodb::options::FindOptions;
use mongodb::Database;

pub struct TopicService {
    mongo: Database,
}

impl TopicService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    /// Каталог тем с поиском по имени (без учёта регистра)
    pub async fn list_topics(&self, search: Option<&str>) -> Result<Vec<Topic>> {
        let filter = match search.map(str::trim).filter(|s| !s.is_empty()) {
            Some(term) => doc! { "name": { "$regex": regex::escape(term), "$options": "i" } },
            None => doc! {},
        };

        self.mongo
            .collection::<Topic>("topics")
            .find(filter)
            .with_options(FindOptions::builder().sort(doc! { "name": 1 }).build())
            .await
            .context("Failed to query topics")?
            .try_collect()
            .await
            .context("Failed to collect topics")
    }

    pub async fn create_topic(&self, req: CreateTopicRequest) -> Result<Topic> {
        let topic = Topic {
            id: new_id(),
            name: req.name.trim().to_string(),
            description: req.description,
        };

        self.mongo
            .collection::<Topic>("topics")
            .insert_one(&topic)
            .await
            .context("Failed to insert topic")?;

        tracing::info!(topic_id = %topic.id, name = %topic.name, "Topic created");
        Ok(topic)
    }

    async fn load_timeline(&self, class_id: &str) -> Result<ClassTimeline> {
        Ok(self
            .mongo
            .collection::<ClassTimeline>("class_timelines")
            .find_one(doc! { "_id": class_id })
            .await
            .context("Failed to query class timeline")?
            .unwrap_or_else(|| ClassTimeline::new(class_id)))
    }

    async fn store_timeline(&self, timeline: &ClassTimeline) -> Result<()> {
        self.mongo
            .collection::<ClassTimeline>("class_timelines")
            .replace_one(doc! { "_id": &timeline.class_id }, timeline)
            .upsert(true)
            .await
            .context("Failed to save class timeline")?;
        Ok(())
    }

    pub async fn timeline(&self, teacher_id: &str, class_id: &str) -> Result<ClassTimeline> {
        owned_class(&self.mongo, class_id, teacher_id).await?;
        self.load_timeline(class_id).await
    }

    /// Добавить тему в конец недели
    pub async fn place(
        &self,
        teacher_id: &str,
        class_id: &str,
        req: PlaceTopicRequest,
    ) -> Result<ClassTimeline> {
        owned_class(&self.mongo, class_id, teacher_id).await?;

        let topic = self
            .mongo
            .collection::<Topic>("topics")
            .find_one(doc! { "_id": &req.topic_id })
            .await
            .context("Failed to query topic")?
            .ok_or_else(|| ServiceError::not_found("Topic not found"))?;

        let mut timeline = self.load_timeline(class_id).await?;
        timeline.place(
            req.week,
            TopicRef {
                id: topic.id,
                name: topic.name,
            },
        );
        self.store_timeline(&timeline).await?;

        Ok(timeline)
    }

    /// Убрать тему из недели по индексу; рёбра графа чистятся по возможности
    pub async fn remove(
        &self,
        teacher_id: &str,
        class_id: &str,
        week: u32,
        index: usize,
    ) -> Result<ClassTimeline> {
        owned_class(&self.mongo, class_id, teacher_id).await?;

        let mut timeline = self.load_timeline(class_id).await?;
        let removed = timeline
            .remove_at(week, index)
            .ok_or_else(|| ServiceError::not_found("No topic at this position"))?;
        self.store_timeline(&timeline).await?;

        if let Err(err) = self.remove_topic_edges(class_id, &removed.id).await {
            tracing::warn!(
                class_id,
                topic_id = %removed.id,
                "Edge cleanup after timeline removal failed: {:#}",
                err
            );
        }

        Ok(timeline)
    }

    async fn remove_topic_edges(&self, class_id: &str, topic_id: &str) -> Result<u64> {
        let nodes: Vec<TopicNode> = self
            .mongo
            .collection::<TopicNode>("topic_nodes")
            .find(doc! { "class_id": class_id, "topic_id": topic_id })
            .await
            .context("Failed to query topic nodes")?
            .try_collect()
            .await
            .context("Failed to collect topic nodes")?;

        if nodes.is_empty() {
            return Ok(0);
        }

        let ids: Vec<Bson> = nodes.into_iter().map(|n| Bson::String(n.id)).collect();
        let result = self
            .mongo
            .collection::<TopicEdge>("topic_edges")
            .delete_many(doc! {
                "class_id": class_id,
                "$or": [
                    { "source_node_id": { "$in": ids.clone() } },
                    { "target_node_id": { "$in": ids } },
                ],
            })
            .await
            .context("Failed to delete topic edges")?;

        tracing::debug!(class_id, topic_id, deleted = result.deleted_count, "Topic edges removed");
        Ok(result.deleted_count)
    }

    pub async fn save_timeline(
        &self,
        teacher_id: &str,
        class_id: &str,
        req: SaveTimelineRequest,
    ) -> Result<ClassTimeline> {
        owned_class(&self.mongo, class_id, teacher_id).await?;

        if let Some(bad) = req.timeline.keys().find(|key| week_number(key).is_none()) {
            return Err(ServiceError::invalid(format!(
                "Timeline key \"{}\" is not of the form week-N",
                bad
            )));
        }

        let timeline = ClassTimeline {
            class_id: class_id.to_string(),
            timeline: req.timeline,
        };
        self.store_timeline(&timeline).await?;
        Ok(timeline)
    }

    pub async fn graph(&self, teacher_id: &str, class_id: &str) -> Result<GraphResponse> {
        owned_class(&self.mongo, class_id, teacher_id).await?;

        let nodes: Vec<TopicNode> = self
            .mongo
            .collection::<TopicNode>("topic_nodes")
            .find(doc! { "class_id": class_id })
            .with_options(FindOptions::builder().sort(doc! { "week": 1 }).build())
            .await
            .context("Failed to query topic nodes")?
            .try_collect()
            .await
            .context("Failed to collect topic nodes")?;

        let edges: Vec<TopicEdge> = self
            .mongo
            .collection::<TopicEdge>("topic_edges")
            .find(doc! { "class_id": class_id })
            .await
            .context("Failed to query topic edges")?
            .try_collect()
            .await
            .context("Failed to collect topic edges")?;

        Ok(GraphResponse { nodes, edges })
    }

    /// Полная замена графа класса. Без транзакции.
    pub async fn save_graph(
        &self,
        teacher_id: &str,
        class_id: &str,
        req: SaveGraphRequest,
    ) -> Result<GraphResponse> {
        owned_class(&self.mongo, class_id, teacher_id).await?;

        let plan = GraphReplacePlan::build(class_id, &req, new_id);
        if plan.dropped_edges > 0 {
            tracing::warn!(
                class_id,
                dropped = plan.dropped_edges,
                "Edges with unknown endpoints were dropped"
            );
        }

        let nodes = self.mongo.collection::<TopicNode>("topic_nodes");
        let edges = self.mongo.collection::<TopicEdge>("topic_edges");

        edges
            .delete_many(doc! { "class_id": class_id })
            .await
            .context("Failed to clear topic edges")?;
        nodes
            .delete_many(doc! { "class_id": class_id })
            .await
            .context("Failed to clear topic nodes")?;

        if !plan.nodes.is_empty() {
            nodes
                .insert_many(&plan.nodes)
                .await
                .context("Failed to insert topic nodes")?;
        }
        if !plan.edges.is_empty() {
            edges
                .insert_many(&plan.edges)
                .await
                .context("Failed to insert topic edges")?;
        }

        tracing::info!(
            class_id,
            nodes = plan.nodes.len(),
            edges = plan.edges.len(),
            "Topic graph saved"
        );

        Ok(GraphResponse {
            nodes: plan.nodes,
            edges: plan.edges,
        })
    }
}
