use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use placement_engine::workflows::placement::{
    placement_router, ApplicationRepository, DriveRepository, PlacementService,
};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;

pub(crate) fn with_placement_routes<D, R>(service: Arc<PlacementService<D, R>>) -> Router
where
    D: DriveRepository + 'static,
    R: ApplicationRepository + 'static,
{
    placement_router(service)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::seeded_engine;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::{TimeZone, Utc};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use placement_engine::workflows::placement::{EngineConfig, ManualClock};
    use std::sync::atomic::AtomicBool;
    use tower::ServiceExt;

    fn app(ready: bool) -> Router {
        let clock = ManualClock::new(
            Utc.with_ymd_and_hms(2025, 8, 1, 9, 0, 0)
                .single()
                .expect("valid timestamp"),
        );
        let engine = seeded_engine(EngineConfig::default(), Arc::new(clock));
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };
        with_placement_routes(engine.service).layer(Extension(state))
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json payload")
    }

    #[tokio::test]
    async fn readiness_reports_initializing_until_bound() {
        let response = app(false)
            .oneshot(
                Request::get("/ready")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("route executes");

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_body(response).await["status"], "initializing");
    }

    #[tokio::test]
    async fn health_and_engine_routes_share_one_router() {
        let router = app(true);

        let health = router
            .clone()
            .oneshot(
                Request::get("/health")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("route executes");
        assert_eq!(health.status(), StatusCode::OK);

        let created = router
            .clone()
            .oneshot(
                Request::post("/api/v1/drives")
                    .header("content-type", "application/json")
                    .header("x-actor-id", "tpo")
                    .header("x-actor-role", "admin")
                    .body(Body::from(
                        json!({
                            "company_id": "northwind",
                            "title": "Data Engineer",
                            "vacancies": 2,
                            "package_category": "dream",
                            "criteria": { "eligible_branches": ["CSE"], "min_cgpa": 8.0 }
                        })
                        .to_string(),
                    ))
                    .expect("request builds"),
            )
            .await
            .expect("route executes");
        assert_eq!(created.status(), StatusCode::CREATED);
        let drive = json_body(created).await;
        assert_eq!(drive["status"], "draft");

        let listed = router
            .oneshot(
                Request::get("/api/v1/drives?status=draft")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("route executes");
        assert_eq!(listed.status(), StatusCode::OK);
        let listings = json_body(listed).await;
        assert_eq!(listings[0]["company_name"], "Northwind Analytics");
        assert_eq!(listings[0]["application_count"], 0);
    }

    #[tokio::test]
    async fn unknown_company_cannot_own_a_drive() {
        let response = app(true)
            .oneshot(
                Request::post("/api/v1/drives")
                    .header("content-type", "application/json")
                    .header("x-actor-id", "tpo")
                    .header("x-actor-role", "admin")
                    .body(Body::from(
                        json!({
                            "company_id": "initrode",
                            "title": "Analyst",
                            "vacancies": 1,
                            "package_category": "standard"
                        })
                        .to_string(),
                    ))
                    .expect("request builds"),
            )
            .await
            .expect("route executes");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
