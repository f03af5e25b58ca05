use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod errors;
pub mod extractors;
pub mod flow;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;

pub use config::Config;
pub use services::AppState;

/// Upper bound for PDF and image upload bodies
const UPLOAD_BODY_LIMIT: usize = 20 * 1024 * 1024;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        .nest("/api/v1/auth", auth_routes(app_state.clone()))
        .nest(
            "/api/v1/teacher",
            teacher_routes()
                .route_layer(middleware::from_fn(
                    middlewares::auth::teacher_guard_middleware,
                ))
                .route_layer(middleware::from_fn_with_state(
                    app_state.clone(),
                    middlewares::auth::auth_middleware,
                )),
        )
        .nest(
            "/api/v1/student",
            student_only(student_routes(), app_state.clone()),
        )
        .nest(
            "/api/v1/assessments",
            student_only(assessment_routes(), app_state.clone()),
        )
        .nest(
            "/api/v1/quizzes",
            student_only(quiz_routes(), app_state.clone()),
        )
        .with_state(app_state)
        .layer(cors)
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

/// JWT auth followed by the student role check
fn student_only(router: Router<Arc<AppState>>, app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    router
        .route_layer(middleware::from_fn(
            middlewares::auth::student_guard_middleware,
        ))
        .route_layer(middleware::from_fn_with_state(
            app_state,
            middlewares::auth::auth_middleware,
        ))
}

fn auth_routes(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    let protected_routes = Router::new()
        .route("/me", get(handlers::auth::me))
        .route_layer(middleware::from_fn_with_state(
            app_state,
            middlewares::auth::auth_middleware,
        ));

    Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .merge(protected_routes)
}

fn teacher_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Classes
        .route(
            "/classes",
            get(handlers::classes::list_teacher_classes).post(handlers::classes::create_class),
        )
        // Question bank
        .route(
            "/questions",
            get(handlers::questions::list_questions).post(handlers::questions::create_question),
        )
        .route(
            "/questions/{id}",
            get(handlers::questions::get_question)
                .put(handlers::questions::update_question)
                .delete(handlers::questions::delete_question),
        )
        // Assignments
        .route(
            "/classes/{class_id}/assignments",
            get(handlers::assignments::list_assignments)
                .post(handlers::assignments::create_assignment),
        )
        .route(
            "/assignments/{id}",
            delete(handlers::assignments::delete_assignment),
        )
        // Topic catalogue, timeline and graph
        .route(
            "/topics",
            get(handlers::topics::list_topics).post(handlers::topics::create_topic),
        )
        .route(
            "/classes/{class_id}/timeline",
            get(handlers::topics::get_timeline).put(handlers::topics::save_timeline),
        )
        .route(
            "/classes/{class_id}/timeline/topics",
            post(handlers::topics::place_topic),
        )
        .route(
            "/classes/{class_id}/timeline/weeks/{week}/{index}",
            delete(handlers::topics::remove_topic),
        )
        .route(
            "/classes/{class_id}/graph",
            get(handlers::topics::get_graph).put(handlers::topics::save_graph),
        )
        // Learning materials
        .route(
            "/classes/{class_id}/materials",
            get(handlers::materials::list_teacher_materials),
        )
        .route(
            "/classes/{class_id}/materials/{topic_node_id}",
            put(handlers::materials::upsert_material),
        )
        .route(
            "/classes/{class_id}/materials/{topic_node_id}/pdf",
            post(handlers::materials::upload_material_pdf)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/uploads/question-image",
            post(handlers::materials::upload_question_image)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
}

fn student_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/classes", get(handlers::classes::list_student_classes))
        .route("/classes/join", post(handlers::classes::join_class))
        .route(
            "/classes/{class_id}/assignments",
            get(handlers::assignments::student_assignments),
        )
        .route(
            "/classes/{class_id}/materials",
            get(handlers::materials::list_student_materials),
        )
}

fn assessment_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(handlers::assessments::open_flow))
        .route(
            "/{id}",
            get(handlers::assessments::get_flow).delete(handlers::assessments::close_flow),
        )
        .route("/{id}/actions", post(handlers::assessments::flow_action))
}

fn quiz_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(handlers::quizzes::start_quiz))
        .route(
            "/{id}",
            get(handlers::quizzes::get_quiz).delete(handlers::quizzes::close_quiz),
        )
        .route("/{id}/answers", post(handlers::quizzes::answer_quiz))
        .route("/{id}/mastery", get(handlers::quizzes::quiz_mastery))
}
