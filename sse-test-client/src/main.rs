use anyhow::Result;
use clap::Parser;
use colored::*;
use std::time::Duration;

mod api_client;
mod output;
mod scenarios;
mod sse_client;

use api_client::ApiClient;
use output::print_test_summary;
use sse_client::Connection;

#[derive(Parser)]
#[command(name = "sse-test-client")]
#[command(about = "Smoke tests for a running CI/CD alert relay")]
struct Cli {
    /// Base URL of the relay (e.g., http://localhost:5500)
    #[arg(long)]
    base_url: String,

    /// Base URL of a second relay instance sharing the same broker channel
    #[arg(long)]
    peer_url: Option<String>,

    /// Test scenario to run
    #[arg(long, value_enum)]
    scenario: ScenarioChoice,

    /// Seconds to wait for a heartbeat; should exceed the relay's heartbeat interval
    #[arg(long, default_value_t = 10)]
    heartbeat_timeout: u64,

    /// Enable verbose output
    #[arg(long, short)]
    verbose: bool,
}

#[derive(clap::ValueEnum, Clone, PartialEq)]
enum ScenarioChoice {
    /// Open a stream and check the connected frame
    ConnectionTest,
    /// Post a webhook and check both viewers receive it
    Broadcast,
    /// Post a payload with a missing field and check it is rejected
    InvalidPayload,
    /// Wait for a heartbeat frame
    Heartbeat,
    /// Post to --base-url and check a viewer of --peer-url receives it
    MultiInstance,
    /// Run every scenario; multi-instance only when --peer-url is given
    All,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    }

    println!("{}", "=== SETUP PHASE ===".bright_white().bold());

    let client = reqwest::Client::new();
    let api_client = ApiClient::new(client, cli.base_url.clone());

    println!("{} Checking relay health...", "→".blue());
    api_client.health().await?;
    println!("{} Relay at {} is healthy", "✓".green(), api_client.base_url());

    println!("\n{} Establishing SSE connections...", "→".blue());
    let mut viewer1 = Connection::establish(&cli.base_url, "Viewer 1".to_string()).await?;
    let mut viewer2 = Connection::establish(&cli.base_url, "Viewer 2".to_string()).await?;
    println!("{} Viewer 1 SSE connection established", "✓".green());
    println!("{} Viewer 2 SSE connection established", "✓".green());

    let wants_peer = matches!(cli.scenario, ScenarioChoice::MultiInstance | ScenarioChoice::All);
    let mut peer_viewer = match (&cli.peer_url, wants_peer) {
        (Some(peer_url), true) => {
            let conn = Connection::establish(peer_url, "Peer viewer".to_string()).await?;
            println!("{} Peer viewer SSE connection established", "✓".green());
            Some(conn)
        }
        (None, true) if cli.scenario == ScenarioChoice::MultiInstance => {
            anyhow::bail!("--peer-url is required for the multi-instance scenario");
        }
        _ => None,
    };

    println!("\n{}", "=== TEST PHASE ===".bright_white().bold());

    let heartbeat_timeout = Duration::from_secs(cli.heartbeat_timeout);
    let mut results = Vec::new();

    if matches!(cli.scenario, ScenarioChoice::ConnectionTest | ScenarioChoice::All) {
        results.push(scenarios::test_connection(&mut viewer1).await?);
    }
    if matches!(cli.scenario, ScenarioChoice::Broadcast | ScenarioChoice::All) {
        // Both viewers must be registered before the webhook goes out
        if cli.scenario == ScenarioChoice::Broadcast {
            viewer1
                .wait_for_event("connected", Duration::from_secs(5))
                .await?;
        }
        viewer2
            .wait_for_event("connected", Duration::from_secs(5))
            .await?;
        results.push(scenarios::test_broadcast(&api_client, &mut viewer1, &mut viewer2).await?);
    }
    if matches!(cli.scenario, ScenarioChoice::InvalidPayload | ScenarioChoice::All) {
        results.push(scenarios::test_invalid_payload(&api_client, &mut viewer1).await?);
    }
    if matches!(cli.scenario, ScenarioChoice::Heartbeat | ScenarioChoice::All) {
        results.push(scenarios::test_heartbeat(&mut viewer1, heartbeat_timeout).await?);
    }
    if let Some(peer_viewer) = peer_viewer.as_mut() {
        peer_viewer
            .wait_for_event("connected", Duration::from_secs(5))
            .await?;
        results.push(scenarios::test_multi_instance(&api_client, peer_viewer).await?);
    }

    println!("\n{}", "=== RESULTS ===".bright_white().bold());
    print_test_summary(&results);

    let all_passed = results.iter().all(|r| r.passed);

    if all_passed {
        println!("\n{}", "All tests passed! ✓".bright_green().bold());
    } else {
        println!("\n{}", "Some tests failed! ✗".bright_red().bold());
    }

    std::process::exit(if all_passed { 0 } else { 1 });
}
