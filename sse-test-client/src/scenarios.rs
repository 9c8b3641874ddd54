use crate::api_client::ApiClient;
use crate::output::TestResult;
use crate::sse_client::Connection;
use anyhow::Result;
use colored::*;
use reqwest::StatusCode;
use serde_json::json;
use std::time::{Duration, Instant};
use uuid::Uuid;

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);
const QUIET_WINDOW: Duration = Duration::from_secs(1);

/// Job names carry a fresh id so notifications from other runs don't match.
fn unique_job_name(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4())
}

fn finish(name: &str, started: Instant, outcome: Result<()>) -> TestResult {
    match outcome {
        Ok(()) => {
            println!("{} {}", "✓".green(), name);
            TestResult::pass(name, started.elapsed())
        }
        Err(e) => {
            println!("{} {}: {}", "✗".red(), name, e);
            TestResult::fail(name, e.to_string(), started.elapsed())
        }
    }
}

pub async fn test_connection(conn: &mut Connection) -> Result<TestResult> {
    let name = "Connection";
    println!("\n{} Testing {} ...", "→".blue(), name);
    let started = Instant::now();

    let outcome: Result<()> = async {
        let event = conn.wait_for_event("connected", EVENT_TIMEOUT).await?;
        match event.message() {
            Some("Connected to SSE stream") => Ok(()),
            other => anyhow::bail!("Unexpected connected frame for {}: {:?}", conn.label, other),
        }
    }
    .await;

    Ok(finish(name, started, outcome))
}

pub async fn test_broadcast(
    api: &ApiClient,
    viewer1: &mut Connection,
    viewer2: &mut Connection,
) -> Result<TestResult> {
    let name = "Webhook broadcast";
    println!("\n{} Testing {} ...", "→".blue(), name);
    let started = Instant::now();

    let outcome: Result<()> = async {
        let job_name = unique_job_name("smoke-build");
        let ack = api.post_webhook(&job_name, "sse-test-client", "success").await?;

        if ack.message != "Webhook received" {
            anyhow::bail!("Unexpected acknowledgment: {}", ack.message);
        }
        if ack.client_count < 2 {
            anyhow::bail!("Expected at least 2 clients, relay reported {}", ack.client_count);
        }

        for viewer in [viewer1, viewer2] {
            viewer.wait_for_notification(&job_name, EVENT_TIMEOUT).await?;
            println!("  {} {} received the notification", "✓".green(), viewer.label);
        }
        Ok(())
    }
    .await;

    Ok(finish(name, started, outcome))
}

pub async fn test_invalid_payload(api: &ApiClient, viewer: &mut Connection) -> Result<TestResult> {
    let name = "Invalid payload";
    println!("\n{} Testing {} ...", "→".blue(), name);
    let started = Instant::now();

    let outcome: Result<()> = async {
        let job_name = unique_job_name("smoke-invalid");
        let (status, body) = api
            .post_raw_webhook(&json!({ "status": "success", "job_name": job_name }))
            .await?;

        if status != StatusCode::BAD_REQUEST {
            anyhow::bail!("Expected 400, got {}", status);
        }
        if body != json!({ "error": "Invalid webhook payload" }) {
            anyhow::bail!("Unexpected error body: {}", body);
        }
        viewer.expect_no_notification(&job_name, QUIET_WINDOW).await
    }
    .await;

    Ok(finish(name, started, outcome))
}

pub async fn test_heartbeat(conn: &mut Connection, timeout: Duration) -> Result<TestResult> {
    let name = "Heartbeat";
    println!("\n{} Testing {} (up to {}s) ...", "→".blue(), name, timeout.as_secs());
    let started = Instant::now();

    let outcome = conn.wait_for_heartbeat(timeout).await.map(|_| ());

    Ok(finish(name, started, outcome))
}

/// Posts to one instance and expects the notification on a viewer of another.
pub async fn test_multi_instance(api: &ApiClient, peer_viewer: &mut Connection) -> Result<TestResult> {
    let name = "Multi-instance relay";
    println!("\n{} Testing {} ...", "→".blue(), name);
    let started = Instant::now();

    let outcome: Result<()> = async {
        let job_name = unique_job_name("smoke-deploy");
        api.post_webhook(&job_name, "sse-test-client", "failed").await?;

        peer_viewer
            .wait_for_notification(&job_name, EVENT_TIMEOUT)
            .await
            .map(|_| ())
    }
    .await;

    Ok(finish(name, started, outcome))
}
