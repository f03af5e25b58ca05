use axum::{http::StatusCode, Router};
use classroom_api::models::user::UserRole;
use mongodb::bson::{doc, Document};
use serde_json::{json, Value};

mod common;
use common::send;

async fn create_class(app: &Router, teacher: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/v1/teacher/classes",
        Some(teacher),
        Some(json!({ "name": "Computer Science", "level": "Year 10" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["id"].as_str().unwrap().to_string()
}

async fn create_topic(app: &Router, teacher: &str, name: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/v1/teacher/topics",
        Some(teacher),
        Some(json!({ "name": name })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["_id"].as_str().unwrap().to_string()
}

fn node_id_for(graph: &Value, topic_id: &str) -> String {
    graph["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .find(|node| node["topic_id"] == topic_id)
        .and_then(|node| node["_id"].as_str())
        .unwrap()
        .to_string()
}

async fn count(app: &common::MongoTestApp, collection: &str, class_id: &str) -> u64 {
    app.db
        .collection::<Document>(collection)
        .count_documents(doc! { "class_id": class_id })
        .await
        .unwrap()
}

#[tokio::test]
async fn test_graph_save_replaces_nodes_and_remaps_edges() {
    let Some(app) = common::create_mongo_test_app().await else {
        return;
    };
    let teacher = common::token("teacher-1", UserRole::Teacher);
    let class_id = create_class(&app.router, &teacher).await;
    let recursion = create_topic(&app.router, &teacher, "Recursion").await;
    let functions = create_topic(&app.router, &teacher, "Functions").await;

    let graph_uri = format!("/api/v1/teacher/classes/{}/graph", class_id);
    let request = json!({
        "nodes": [
            { "id": "1", "topic_id": functions, "week": 1, "position": { "x": 50.0, "y": 50.0 } },
            { "id": "2", "topic_id": recursion, "week": 2, "position": { "x": 250.0, "y": 150.0 } },
        ],
        "edges": [
            { "source": "1", "target": "2" },
            { "source": "2", "target": "missing" },
        ],
    });

    let (status, saved) = send(&app.router, "PUT", &graph_uri, Some(&teacher), Some(request.clone())).await;
    assert_eq!(status, StatusCode::OK, "{}", saved);

    let functions_node = node_id_for(&saved, &functions);
    let recursion_node = node_id_for(&saved, &recursion);
    assert_ne!(functions_node, "1");
    assert_ne!(recursion_node, "2");

    let edges = saved["edges"].as_array().unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0]["source_node_id"], functions_node.as_str());
    assert_eq!(edges[0]["target_node_id"], recursion_node.as_str());

    let (status, loaded) = send(&app.router, "GET", &graph_uri, Some(&teacher), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(loaded["nodes"].as_array().unwrap().len(), 2);
    assert_eq!(loaded["edges"][0]["source_node_id"], functions_node.as_str());

    // Saving again replaces rather than appends
    let (status, resaved) = send(&app.router, "PUT", &graph_uri, Some(&teacher), Some(request)).await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(node_id_for(&resaved, &functions), functions_node);
    assert_eq!(count(&app, "topic_nodes", &class_id).await, 2);
    assert_eq!(count(&app, "topic_edges", &class_id).await, 1);

    let other = common::token("teacher-2", UserRole::Teacher);
    let (status, _) = send(&app.router, "GET", &graph_uri, Some(&other), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    app.cleanup().await;
}

#[tokio::test]
async fn test_timeline_removal_drops_edges_of_the_topic() {
    let Some(app) = common::create_mongo_test_app().await else {
        return;
    };
    let teacher = common::token("teacher-1", UserRole::Teacher);
    let class_id = create_class(&app.router, &teacher).await;
    let loops = create_topic(&app.router, &teacher, "Loops").await;
    let arrays = create_topic(&app.router, &teacher, "Arrays").await;
    let sorting = create_topic(&app.router, &teacher, "Sorting").await;

    let (status, _) = send(
        &app.router,
        "PUT",
        &format!("/api/v1/teacher/classes/{}/graph", class_id),
        Some(&teacher),
        Some(json!({
            "nodes": [
                { "id": "a", "topic_id": loops, "week": 1 },
                { "id": "b", "topic_id": arrays, "week": 1 },
                { "id": "c", "topic_id": sorting, "week": 2 },
            ],
            "edges": [
                { "source": "a", "target": "b" },
                { "source": "b", "target": "c" },
            ],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let place_uri = format!("/api/v1/teacher/classes/{}/timeline/topics", class_id);
    for topic_id in [&loops, &arrays] {
        let (status, body) = send(
            &app.router,
            "POST",
            &place_uri,
            Some(&teacher),
            Some(json!({ "week": 1, "topic_id": topic_id })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
    }

    let (status, timeline) = send(
        &app.router,
        "GET",
        &format!("/api/v1/teacher/classes/{}/timeline", class_id),
        Some(&teacher),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(timeline["timeline"]["week-1"][0]["name"], "Loops");
    assert_eq!(timeline["timeline"]["week-1"][1]["name"], "Arrays");

    let (status, timeline) = send(
        &app.router,
        "DELETE",
        &format!("/api/v1/teacher/classes/{}/timeline/weeks/1/0", class_id),
        Some(&teacher),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", timeline);
    let week_one = timeline["timeline"]["week-1"].as_array().unwrap();
    assert_eq!(week_one.len(), 1);
    assert_eq!(week_one[0]["id"], arrays.as_str());

    // Only the loops -> arrays edge touched the removed topic
    assert_eq!(count(&app, "topic_edges", &class_id).await, 1);
    assert_eq!(count(&app, "topic_nodes", &class_id).await, 3);

    let (status, _) = send(
        &app.router,
        "DELETE",
        &format!("/api/v1/teacher/classes/{}/timeline/weeks/1/5", class_id),
        Some(&teacher),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app.router,
        "POST",
        &place_uri,
        Some(&teacher),
        Some(json!({ "week": 1, "topic_id": "no-such-topic" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    app.cleanup().await;
}
