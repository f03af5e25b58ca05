use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::errors::ServiceError;
use crate::flow::QuizAttempt;
use crate::models::MasteryForecast;

/// Тело запроса `/predict`: параллельные массивы одинаковой длины
#[derive(Debug, Serialize, PartialEq)]
pub struct PredictRequest {
    pub q_ids: Vec<i64>,
    pub correctness: Vec<i64>,
    pub confidence: Vec<f64>,
    pub difficulty: Vec<f64>,
}

impl PredictRequest {
    pub fn from_attempts(attempts: &[QuizAttempt]) -> Self {
        Self {
            q_ids: attempts.iter().map(|a| a.pool_index as i64).collect(),
            correctness: attempts.iter().map(|a| i64::from(a.correct)).collect(),
            confidence: attempts
                .iter()
                .map(|a| f64::from(a.confidence.level()))
                .collect(),
            difficulty: attempts
                .iter()
                .map(|a| f64::from(a.difficulty.level()))
                .collect(),
        }
    }
}

/// HTTP client of the knowledge-tracing model service
#[derive(Clone)]
pub struct KnowledgeTracingClient {
    http: reqwest::Client,
    base_url: String,
}

impl KnowledgeTracingClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build knowledge-tracing HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub async fn predict(&self, attempts: &[QuizAttempt]) -> Result<MasteryForecast> {
        if attempts.is_empty() {
            return Err(ServiceError::invalid(
                "Answer at least one question before requesting a forecast",
            ));
        }

        let body = PredictRequest::from_attempts(attempts);
        let url = format!("{}/predict", self.base_url);

        let response = match self.http.post(&url).json(&body).send().await {
            Ok(response) => response,
            Err(err) => {
                tracing::error!("Knowledge-tracing request to {} failed: {}", url, err);
                return Err(ServiceError::upstream("Knowledge-tracing service is unavailable"));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::warn!(%status, detail = %detail, "Knowledge-tracing service rejected request");
            return Err(ServiceError::upstream(format!(
                "Knowledge-tracing service returned {}",
                status
            )));
        }

        let forecast: MasteryForecast = response
            .json()
            .await
            .context("Failed to decode knowledge-tracing response")?;

        tracing::debug!(
            model = %forecast.model_used,
            points = forecast.predicted_probabilities.len(),
            "Mastery forecast received"
        );
        Ok(forecast)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Confidence, DifficultyTier};

    #[test]
    fn test_predict_request_arrays_line_up() {
        let attempts = vec![
            QuizAttempt {
                question_id: "q-low".into(),
                pool_index: 0,
                difficulty: DifficultyTier::Low,
                confidence: Confidence::High,
                correct: true,
            },
            QuizAttempt {
                question_id: "q-mid".into(),
                pool_index: 3,
                difficulty: DifficultyTier::Medium,
                confidence: Confidence::Low,
                correct: false,
            },
        ];

        let request = PredictRequest::from_attempts(&attempts);
        assert_eq!(
            request,
            PredictRequest {
                q_ids: vec![0, 3],
                correctness: vec![1, 0],
                confidence: vec![2.0, 0.0],
                difficulty: vec![0.0, 1.0],
            }
        );
    }

    #[tokio::test]
    async fn test_empty_history_is_rejected_locally() {
        let client = KnowledgeTracingClient::new("http://127.0.0.1:9/").unwrap();
        assert_eq!(client.base_url, "http://127.0.0.1:9");

        let err = client.predict(&[]).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ServiceError>(),
            Some(ServiceError::Invalid(_))
        ));
    }
}
