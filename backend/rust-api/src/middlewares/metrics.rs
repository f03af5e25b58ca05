use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::metrics::{HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS};

/// Middleware для сбора HTTP метрик (latency, request count)
pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = normalize_path(req.uri().path());

    let response = next.run(req).await;

    let status = response.status().as_u16().to_string();
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[&method, &path])
        .observe(start.elapsed().as_secs_f64());

    response
}

/// Collapses document ids in the path into `{id}` to keep label cardinality low
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| if is_uuid_like(segment) { "{id}" } else { segment })
        .collect::<Vec<_>>()
        .join("/")
}

fn is_uuid_like(s: &str) -> bool {
    s.len() == 36
        && s.char_indices().all(|(i, c)| match i {
            8 | 13 | 18 | 23 => c == '-',
            _ => c.is_ascii_hexdigit(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path("/api/v1/student/flows/550e8400-e29b-41d4-a716-446655440000/actions"),
            "/api/v1/student/flows/{id}/actions"
        );
        assert_eq!(
            normalize_path("/api/v1/teacher/classes/550e8400-e29b-41d4-a716-446655440000/timeline/weeks/3/0"),
            "/api/v1/teacher/classes/{id}/timeline/weeks/3/0"
        );
        assert_eq!(normalize_path("/health"), "/health");
    }

    #[test]
    fn test_is_uuid_like() {
        assert!(is_uuid_like("550e8400-e29b-41d4-a716-446655440000"));
        assert!(!is_uuid_like("550e8400ae29bb41d4aa716a446655440000"));
        assert!(!is_uuid_like("ABC123"));
    }
}
