//! REST API for the scenario rule service
//!
//! Exposes rule CRUD under `/api/v2/rule` and the trigger callback endpoint
//! the scheduler and stream engine post condition edges to. Trigger
//! callbacks are acknowledged with 202 Accepted as soon as they are
//! enqueued; evaluation happens on the evaluator task, never on the request
//! path.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use scenario_core::{Rule, RulePatch, TriggerPayload};
use scenario_engine::{EngineError, RuleService, TriggerQueue};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub rules: Arc<RuleService>,
    pub triggers: TriggerQueue,
}

/// Request body for adding a rule
#[derive(Deserialize)]
pub struct AddRuleRequest {
    pub rule: Rule,
}

/// Request body for a partial rule update
#[derive(Deserialize)]
pub struct UpdateRuleRequest {
    pub rule: RulePatch,
}

/// Response carrying a single rule
#[derive(Serialize)]
pub struct RuleResponse {
    pub rule: Rule,
}

/// Response carrying every rule
#[derive(Serialize)]
pub struct MultiRulesResponse {
    pub rules: Vec<Rule>,
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub message: String,
}

/// Engine error carried across the HTTP boundary
struct ApiError(EngineError);

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::Conflict(_) => StatusCode::CONFLICT,
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::Client(_) => StatusCode::BAD_GATEWAY,
        };
        let body = Json(ErrorResponse {
            message: self.0.to_string(),
        });
        (status, body).into_response()
    }
}

/// Build the service router
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Rule CRUD
        .route("/api/v2/rule", post(add_rule))
        .route("/api/v2/rule/all", get(get_all_rules))
        .route(
            "/api/v2/rule/name/:name",
            get(get_rule).put(update_rule).delete(delete_rule),
        )
        // Trigger callback posted by the scheduler and the stream engine
        .route("/api/v2/rule/id/:id", post(trigger_rule))
        // Health check
        .route("/api/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the API server
pub async fn start_server(state: AppState, addr: &str) -> std::io::Result<()> {
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("API server listening on {}", addr);
    axum::serve(listener, router).await
}

// ==================== Handlers ====================

/// GET /api/health
async fn health_check() -> &'static str {
    "OK"
}

/// POST /api/v2/rule
async fn add_rule(
    State(state): State<AppState>,
    Json(request): Json<AddRuleRequest>,
) -> Result<(StatusCode, Json<RuleResponse>), ApiError> {
    let rule = state.rules.add_rule(request.rule).await?;
    Ok((StatusCode::CREATED, Json(RuleResponse { rule })))
}

/// GET /api/v2/rule/all
async fn get_all_rules(State(state): State<AppState>) -> Json<MultiRulesResponse> {
    Json(MultiRulesResponse {
        rules: state.rules.all_rules(),
    })
}

/// GET /api/v2/rule/name/:name
async fn get_rule(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<RuleResponse>, ApiError> {
    let rule = state.rules.rule_by_name(&name)?;
    Ok(Json(RuleResponse { rule }))
}

/// PUT /api/v2/rule/name/:name
async fn update_rule(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<UpdateRuleRequest>,
) -> Result<Json<RuleResponse>, ApiError> {
    let rule = state.rules.update_rule_by_name(&name, request.rule).await?;
    Ok(Json(RuleResponse { rule }))
}

/// DELETE /api/v2/rule/name/:name
async fn delete_rule(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.rules.delete_rule_by_name(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v2/rule/id/:id
///
/// Always 202: the payload is enqueued as-is and the evaluator decides what
/// to do with it, including dropping events for unknown or locked rules.
async fn trigger_rule(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<TriggerPayload>,
) -> StatusCode {
    state.triggers.push(id, payload);
    StatusCode::ACCEPTED
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::Request;
    use std::collections::HashMap;
    use tower::ServiceExt;

    use async_trait::async_trait;
    use scenario_clients::{
        CallbackTarget, ClientResult, CommandClient, Interval, IntervalAction, Notification,
        NotificationClient, RegistryClient, RegistryEntry, SchedulerClient, StreamEngineClient,
        StreamRule,
    };
    use scenario_engine::{ConditionSynchronizer, TriggerEvaluator};
    use scenario_store::RuleStore;

    struct Noop;

    #[async_trait]
    impl SchedulerClient for Noop {
        async fn add_interval(&self, _interval: Interval) -> ClientResult<()> {
            Ok(())
        }
        async fn update_interval(&self, _interval: Interval) -> ClientResult<()> {
            Ok(())
        }
        async fn delete_interval(&self, _name: &str) -> ClientResult<()> {
            Ok(())
        }
        async fn all_intervals(&self) -> ClientResult<Vec<Interval>> {
            Ok(vec![])
        }
        async fn add_interval_action(&self, _action: IntervalAction) -> ClientResult<()> {
            Ok(())
        }
        async fn update_interval_action(&self, _action: IntervalAction) -> ClientResult<()> {
            Ok(())
        }
        async fn delete_interval_action(&self, _name: &str) -> ClientResult<()> {
            Ok(())
        }
        async fn all_interval_actions(&self) -> ClientResult<Vec<IntervalAction>> {
            Ok(vec![])
        }
    }

    #[async_trait]
    impl StreamEngineClient for Noop {
        async fn stream_exists(&self, _name: &str) -> ClientResult<bool> {
            Ok(true)
        }
        async fn create_stream(&self, _name: &str) -> ClientResult<()> {
            Ok(())
        }
        async fn create_rule(&self, _rule: &StreamRule) -> ClientResult<()> {
            Ok(())
        }
        async fn update_rule(&self, _rule: &StreamRule) -> ClientResult<()> {
            Ok(())
        }
        async fn drop_rule(&self, _name: &str) -> ClientResult<()> {
            Ok(())
        }
        async fn start_rule(&self, _name: &str) -> ClientResult<()> {
            Ok(())
        }
        async fn stop_rule(&self, _name: &str) -> ClientResult<()> {
            Ok(())
        }
        async fn restart_rule(&self, _name: &str) -> ClientResult<()> {
            Ok(())
        }
        async fn rule_names(&self) -> ClientResult<Vec<String>> {
            Ok(vec![])
        }
    }

    #[async_trait]
    impl RegistryClient for Noop {
        async fn entries_for_profile(&self, _profile: &str) -> ClientResult<Vec<RegistryEntry>> {
            Ok(vec![])
        }
        async fn add_entry(&self, _entry: RegistryEntry) -> ClientResult<()> {
            Ok(())
        }
        async fn update_entry(&self, _entry: RegistryEntry) -> ClientResult<()> {
            Ok(())
        }
        async fn delete_by_name(&self, _name: &str) -> ClientResult<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl CommandClient for Noop {
        async fn issue_set_command(
            &self,
            _device: &str,
            _command: &str,
            _params: HashMap<String, String>,
        ) -> ClientResult<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl NotificationClient for Noop {
        async fn send(&self, _notification: Notification) -> ClientResult<()> {
            Ok(())
        }
    }

    fn create_test_state() -> AppState {
        let store = Arc::new(RuleStore::new());
        let noop = Arc::new(Noop);

        let synchronizer = Arc::new(ConditionSynchronizer::new(
            noop.clone(),
            noop.clone(),
            CallbackTarget {
                host: "localhost".to_string(),
                port: 59720,
            },
            "deviceStream",
        ));
        let rules = Arc::new(RuleService::new(store.clone(), synchronizer, noop.clone()));

        let evaluator = Arc::new(TriggerEvaluator::new(
            store,
            noop.clone(),
            noop,
            "scenario",
        ));
        let (triggers, _handle) = evaluator.start();

        AppState { rules, triggers }
    }

    fn rule_body() -> String {
        r#"{
            "rule": {
                "name": "night-fan",
                "conditions": [
                    {"type": "threshold", "logic": "and",
                     "deviceThreshold": "sensor-1", "resourceThreshold": "temperature",
                     "operatorThreshold": ">", "valueThreshold": "30"}
                ],
                "actions": [
                    {"deviceName": "fan-1", "commandName": "setSpeed", "body": "{\"speed\":\"high\"}"}
                ]
            }
        }"#
        .to_string()
    }

    async fn add_sample_rule(app: Router) -> Response {
        app.oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v2/rule")
                .header("content-type", "application/json")
                .body(Body::from(rule_body()))
                .unwrap(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = create_router(create_test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_add_rule_created() {
        let state = create_test_state();
        let response = add_sample_rule(create_router(state)).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["rule"]["name"], "night-fan");
        assert!(parsed["rule"]["id"].as_str().is_some_and(|id| !id.is_empty()));
    }

    #[tokio::test]
    async fn test_add_then_list() {
        let state = create_test_state();
        add_sample_rule(create_router(state.clone())).await;

        let response = create_router(state)
            .oneshot(
                Request::builder()
                    .uri("/api/v2/rule/all")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["rules"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_duplicate_add_conflicts() {
        let state = create_test_state();
        add_sample_rule(create_router(state.clone())).await;
        let response = add_sample_rule(create_router(state)).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_invalid_rule_is_bad_request() {
        let app = create_router(create_test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v2/rule")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"rule": {"name": "empty", "conditions": [], "actions": []}}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_missing_rule_not_found() {
        let app = create_router(create_test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v2/rule/name/nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_rule_no_content() {
        let state = create_test_state();
        add_sample_rule(create_router(state.clone())).await;

        let response = create_router(state)
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/v2/rule/name/night-fan")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_trigger_is_accepted_even_for_unknown_rule() {
        let app = create_router(create_test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v2/rule/id/0e7f51a8-66d2-4a39-9f26-c5c3a30af836")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"triggerState": true, "triggerIndex": 0}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }
}
