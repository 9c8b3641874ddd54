use crate::{
    controller::{health_check_controller, index_controller, webhook_controller},
    middleware::request_log,
    sse::handler,
    AppState,
};
use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use log::*;
use service::config::Config;
use tower_http::cors::{AllowOrigin, CorsLayer};

pub fn define_routes(app_state: AppState) -> Router {
    let cors = cors_layer(&app_state.config);

    Router::new()
        .merge(index_routes())
        .merge(health_routes())
        .merge(sse_routes(app_state.clone()))
        .merge(webhook_routes(app_state))
        .fallback(index_controller::not_found)
        .layer(from_fn(request_log::log_request))
        .layer(cors)
}

fn index_routes() -> Router {
    Router::new().route("/", get(index_controller::index))
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

fn sse_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/events", get(handler::sse_handler))
        .with_state(app_state)
}

fn webhook_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/webhook", post(webhook_controller::receive))
        .with_state(app_state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid CORS origin {origin}: {e}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, Bytes};
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use clap::Parser;
    use events::Error;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use sse::connection::ConnectionHandle;
    use sse::message::{Frame, FrameKind};
    use sse::{LocalDispatcher, Manager};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tower::ServiceExt;

    const SCENARIO_TIMEOUT: Duration = Duration::from_secs(5);

    fn test_app() -> (Router, Arc<Manager>) {
        let config = Config::try_parse_from(["ci_relay"]).unwrap();
        let manager = Arc::new(Manager::new(config.heartbeat_interval()));
        let dispatcher = Arc::new(LocalDispatcher::new(Arc::clone(&manager)));
        let app_state = AppState::new(config, Arc::clone(&manager), dispatcher);
        (define_routes(app_state), manager)
    }

    #[derive(Default)]
    struct RecordingHandle(Mutex<Vec<Frame>>);

    impl ConnectionHandle for RecordingHandle {
        fn send(&self, frame: Frame) -> Result<(), Error> {
            self.0.lock().unwrap().push(frame);
            Ok(())
        }
    }

    impl RecordingHandle {
        fn notifications(&self) -> usize {
            self.0
                .lock()
                .unwrap()
                .iter()
                .filter(|frame| frame.kind == FrameKind::Notification)
                .count()
        }
    }

    fn webhook_request(body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn open_stream(app: &Router) -> Body {
        let response = app
            .clone()
            .oneshot(Request::builder().uri("/events").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        response.into_body()
    }

    async fn next_sse_frame(body: &mut Body) -> String {
        let frame = tokio::time::timeout(SCENARIO_TIMEOUT, body.frame())
            .await
            .expect("timed out waiting for an SSE frame")
            .expect("stream ended")
            .unwrap();
        let data: Bytes = frame.into_data().unwrap();
        String::from_utf8(data.to_vec()).unwrap()
    }

    async fn next_notification(body: &mut Body) -> String {
        loop {
            let frame = next_sse_frame(body).await;
            if frame.starts_with("event: notification") {
                return frame;
            }
        }
    }

    #[tokio::test]
    async fn test_index_route() {
        let (app, _) = test_app();

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({ "message": "Hello World!" }));
    }

    #[tokio::test]
    async fn test_health_route() {
        let (app, _) = test_app();

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unmatched_route_returns_not_found_json() {
        let (app, _) = test_app();

        let response = app
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await, json!({ "message": "Not Found" }));
    }

    #[tokio::test]
    async fn test_first_frame_is_connected() {
        let (app, manager) = test_app();

        let response = app
            .oneshot(Request::builder().uri("/events").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "text/event-stream"
        );
        let mut body = response.into_body();

        let first = next_sse_frame(&mut body).await;
        assert!(first.starts_with("event: connected\n"));
        assert!(first.contains(r#"data: {"message":"Connected to SSE stream"}"#));
        assert_eq!(manager.client_count(), 1);

        let second = next_sse_frame(&mut body).await;
        assert!(second.contains(r#"data: {"type":"heartbeat"}"#));
    }

    #[tokio::test]
    async fn test_webhook_reaches_every_connected_client() {
        let (app, _) = test_app();
        let mut streams = Vec::new();
        for _ in 0..3 {
            streams.push(open_stream(&app).await);
        }

        let response = app
            .clone()
            .oneshot(webhook_request(
                r#"{"status":"success","job_name":"build","project":"app"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({ "message": "Webhook received", "clientCount": 3 })
        );
        for stream in &mut streams {
            let notification = next_notification(stream).await;
            assert!(notification.contains("Job: build, Project: app, Status: success"));
        }
    }

    #[tokio::test]
    async fn test_invalid_webhook_is_rejected_and_not_broadcast() {
        let (app, manager) = test_app();
        let viewer = Arc::new(RecordingHandle::default());
        manager.register_connection(viewer.clone()).unwrap();

        let response = app.oneshot(webhook_request(r#"{"status":"x"}"#)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            json!({ "error": "Invalid webhook payload" })
        );
        assert_eq!(viewer.notifications(), 0);
    }

    #[tokio::test]
    async fn test_closed_stream_is_excluded_from_client_count() {
        let (app, manager) = test_app();
        let mut kept = open_stream(&app).await;
        let closed = open_stream(&app).await;
        assert_eq!(manager.client_count(), 2);

        drop(closed);

        let response = app
            .clone()
            .oneshot(webhook_request(
                r#"{"status":"failed","job_name":"test","project":"api"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(
            json_body(response).await,
            json!({ "message": "Webhook received", "clientCount": 1 })
        );
        assert!(next_notification(&mut kept)
            .await
            .contains("Job: test, Project: api, Status: failed"));
    }

    #[tokio::test]
    async fn test_event_stream_refused_once_shutdown_began() {
        let (app, manager) = test_app();
        manager.disconnect_all();

        let response = app
            .oneshot(Request::builder().uri("/events").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(manager.client_count(), 0);
    }

    #[tokio::test]
    async fn test_cors_allows_configured_origin() {
        let (app, _) = test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("origin", "http://localhost:3000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response
                .headers()
                .get("access-control-allow-origin")
                .unwrap(),
            "http://localhost:3000"
        );
    }
}
