//! API Integration tests for the ChargeFlow processor service
//!
//! These tests validate the public HTTP API of the processor using a
//! temporary on-disk database. They test the full request/response cycle
//! without requiring a live message broker.

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use chargeflow_processor::{
    config::ProcessorConfig, create_router, AppState, BrokerSubscriber, CachedReads,
    ProcessorMetrics, SessionStore,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

/// A processor wired to a temporary database, no broker connection
struct TestService {
    _dir: tempfile::TempDir,
    state: AppState,
}

impl TestService {
    fn router(&self) -> axum::Router {
        create_router(self.state.clone())
    }
}

async fn create_test_service() -> TestService {
    let dir = tempfile::tempdir().unwrap();

    let mut config = ProcessorConfig::default();
    config.database.path = dir.path().join("api_test.db").display().to_string();
    config.bootstrap.sessions_csv = None;
    config.bootstrap.stations_csv = None;

    let store = Arc::new(
        SessionStore::initialize(&config.database, &config.bootstrap)
            .await
            .unwrap(),
    );
    let metrics = Arc::new(ProcessorMetrics::new());
    let reads = Arc::new(CachedReads::new(store.clone(), metrics.clone()));
    let subscriber = Arc::new(BrokerSubscriber::new(
        config.broker.clone(),
        store.clone(),
        metrics.clone(),
    ));

    let state = AppState {
        store,
        reads,
        subscriber,
        metrics,
        config: Arc::new(config),
    };

    TestService { _dir: dir, state }
}

async fn seed_session(service: &TestService, user: &str, station: &str, start: &str, energy: f64) {
    let data = json!({
        "user_id": user,
        "charging_station_id": station,
        "charging_start_time": start,
        "charging_end_time": "2024-05-01 23:59:00",
        "energy_consumed_kwh": energy,
    });
    service
        .state
        .store
        .upsert_session(data.as_object().unwrap())
        .await
        .unwrap();
}

async fn seed_station(service: &TestService, id: &str, lat: f64, lon: f64) {
    let conn = service.state.store.pool().acquire().await.unwrap();
    conn.execute(
        "INSERT INTO charging_stations (station_id, latitude, longitude) VALUES (?1, ?2, ?3)",
        rusqlite::params![id, lat, lon],
    )
    .unwrap();
}

async fn get_json(router: axum::Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    (status, json)
}

#[cfg(test)]
mod api_tests {
    use super::*;

    #[tokio::test]
    async fn test_health_endpoint_returns_ok() {
        let service = create_test_service().await;
        let (status, json) = get_json(service.router(), "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["service"], "chargeflow-processor");
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["subscriber"], "disconnected");
        assert!(json.get("timestamp").is_some());
        assert!(json["pool_available"].as_u64().unwrap() >= 1);
    }

    #[tokio::test]
    async fn test_metrics_endpoint_returns_prometheus_format() {
        let service = create_test_service().await;

        let request = Request::builder()
            .method(Method::GET)
            .uri("/metrics")
            .body(Body::empty())
            .unwrap();

        let response = service.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body_str = String::from_utf8(body.to_vec()).unwrap();

        // Check basic Prometheus format
        assert!(body_str.contains("# HELP"));
        assert!(body_str.contains("# TYPE"));
        assert!(body_str.contains("chargeflow_messages_received_total"));
        assert!(body_str.contains("chargeflow_read_errors_total"));
    }

    #[tokio::test]
    async fn test_headers_endpoint_lists_session_columns() {
        let service = create_test_service().await;
        let (status, json) = get_json(service.router(), "/api/v1/headers").await;

        assert_eq!(status, StatusCode::OK);
        let headers: Vec<String> = serde_json::from_value(json).unwrap();
        assert!(headers.contains(&"user_id".to_string()));
        assert!(headers.contains(&"charging_station_id".to_string()));
        assert!(headers.contains(&"energy_consumed_kwh".to_string()));
    }

    #[tokio::test]
    async fn test_records_endpoint_returns_seeded_sessions() {
        let service = create_test_service().await;
        seed_session(&service, "u1", "s1", "2024-05-01 08:00:00", 22.5).await;
        seed_session(&service, "u2", "s2", "2024-05-01 09:00:00", 18.0).await;

        let (status, json) = get_json(service.router(), "/api/v1/records").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["rows"].as_array().unwrap().len(), 2);
        assert!(json["headers"]
            .as_array()
            .unwrap()
            .iter()
            .any(|h| h == "user_id"));
    }

    #[tokio::test]
    async fn test_user_records_strip_the_user_column() {
        let service = create_test_service().await;
        seed_session(&service, "u1", "s1", "2024-05-01 08:00:00", 22.5).await;
        seed_session(&service, "u2", "s2", "2024-05-01 09:00:00", 18.0).await;

        let (status, json) = get_json(service.router(), "/api/v1/users/u1/records").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["rows"].as_array().unwrap().len(), 1);
        let headers = json["headers"].as_array().unwrap();
        assert!(!headers.iter().any(|h| h == "user_id"));
        assert!(headers.iter().any(|h| h == "charging_station_id"));
    }

    #[tokio::test]
    async fn test_users_endpoint_returns_sorted_distinct_ids() {
        let service = create_test_service().await;
        seed_session(&service, "zoe", "s1", "2024-05-01 08:00:00", 10.0).await;
        seed_session(&service, "amy", "s1", "2024-05-01 09:00:00", 11.0).await;
        seed_session(&service, "amy", "s2", "2024-05-01 10:00:00", 12.0).await;

        let (status, json) = get_json(service.router(), "/api/v1/users").await;

        assert_eq!(status, StatusCode::OK);
        let users: Vec<String> = serde_json::from_value(json).unwrap();
        assert_eq!(users, vec!["amy".to_string(), "zoe".to_string()]);
    }

    #[tokio::test]
    async fn test_stations_endpoint() {
        let service = create_test_service().await;
        seed_station(&service, "s1", 52.37, 4.89).await;
        seed_station(&service, "s2", 51.92, 4.47).await;

        let (status, json) = get_json(service.router(), "/api/v1/stations").await;

        assert_eq!(status, StatusCode::OK);
        let stations = json.as_array().unwrap();
        assert_eq!(stations.len(), 2);
        assert!(stations.iter().any(|s| s["station_id"] == "s1"));
    }

    #[tokio::test]
    async fn test_user_stations_flag_only_visited_ones() {
        let service = create_test_service().await;
        seed_station(&service, "s1", 52.37, 4.89).await;
        seed_station(&service, "s2", 51.92, 4.47).await;
        seed_session(&service, "u1", "s1", "2024-05-01 08:00:00", 22.5).await;

        let (status, json) = get_json(service.router(), "/api/v1/users/u1/stations").await;

        assert_eq!(status, StatusCode::OK);
        let stations = json.as_array().unwrap();
        assert_eq!(stations.len(), 2);
        for station in stations {
            let visited = station["visited"].as_bool().unwrap();
            assert_eq!(visited, station["station_id"] == "s1");
        }
    }

    #[tokio::test]
    async fn test_features_endpoint_returns_value_pairs() {
        let service = create_test_service().await;
        seed_session(&service, "u1", "s1", "2024-05-01 08:00:00", 22.5).await;
        seed_session(&service, "u2", "s2", "2024-05-01 09:00:00", 18.0).await;

        let (status, json) = get_json(
            service.router(),
            "/api/v1/features?x=energy_consumed_kwh&y=charging_rate_kw",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["x"], "energy_consumed_kwh");
        assert_eq!(json["values"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_features_endpoint_rejects_unknown_column() {
        let service = create_test_service().await;

        let (status, json) = get_json(
            service.router(),
            "/api/v1/features?x=energy_consumed_kwh&y=bogus",
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Feature extraction failed");
        assert_eq!(json["category"], "validation");
        assert!(json["message"].as_str().unwrap().contains("bogus"));
    }

    #[tokio::test]
    async fn test_features_endpoint_requires_both_parameters() {
        let service = create_test_service().await;

        let (status, json) =
            get_json(service.router(), "/api/v1/features?x=energy_consumed_kwh").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Missing required parameter 'y'");
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let service = create_test_service().await;

        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/v1/records")
            .header("origin", "http://localhost:3000")
            .header("access-control-request-method", "GET")
            .body(Body::empty())
            .unwrap();

        let response = service.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response
            .headers()
            .get("access-control-allow-origin")
            .is_some());
    }
}

#[cfg(test)]
mod ingest_flow_tests {
    use super::*;

    #[tokio::test]
    async fn test_broker_payload_flows_through_to_the_read_api() {
        let service = create_test_service().await;

        let payload = json!({
            "timestamp": 1714550400.0,
            "data": {
                "user_id": "u9",
                "charging_station_id": "s7",
                "charging_start_time": "2024-05-01 08:00:00",
                "charging_end_time": "2024-05-01 09:30:00",
                "energy_consumed_kwh": 31.2,
                "vehicle_model": "Model Y"
            }
        });
        service
            .state
            .subscriber
            .handle_message(payload.to_string().as_bytes())
            .await;

        let (status, json) = get_json(service.router(), "/api/v1/users/u9/records").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["rows"].as_array().unwrap().len(), 1);

        use std::sync::atomic::Ordering;
        assert_eq!(
            service.state.metrics.messages_ingested.load(Ordering::Relaxed),
            1
        );
    }

    #[tokio::test]
    async fn test_redelivered_payload_does_not_duplicate_the_session() {
        let service = create_test_service().await;

        let payload = json!({
            "timestamp": 1714550400.0,
            "data": {
                "user_id": "u9",
                "charging_station_id": "s7",
                "charging_start_time": "2024-05-01 08:00:00",
                "charging_end_time": "2024-05-01 09:30:00",
                "energy_consumed_kwh": 31.2
            }
        });
        let bytes = payload.to_string();
        service.state.subscriber.handle_message(bytes.as_bytes()).await;
        service.state.subscriber.handle_message(bytes.as_bytes()).await;

        let records = service.state.store.all_records().await.unwrap();
        assert_eq!(records.rows.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_dropped_not_fatal() {
        let service = create_test_service().await;

        service.state.subscriber.handle_message(b"not json").await;
        service
            .state
            .subscriber
            .handle_message(br#"{"timestamp": "yesterday"}"#)
            .await;

        use std::sync::atomic::Ordering;
        assert_eq!(
            service.state.metrics.messages_dropped.load(Ordering::Relaxed),
            2
        );
        let records = service.state.store.all_records().await.unwrap();
        assert!(records.rows.is_empty());
    }
}
