// Stream one run from an AG-UI backend and print what arrives
//
// Run with: AGUI_ENDPOINT=http://localhost:8000/api/agui/generate \
//     cargo run --example stream_run -- "a CLI todo app"

use std::io::Write;

use cassette_client::activity::ActivityProjection;
use cassette_client::{AguiClient, AguiEvent, ClientError, Diagnostic, EventKind};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    let prompt = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "Write a hello world script".to_string());

    let client = AguiClient::from_env()?;
    let activity = ActivityProjection::attach(&client);

    client.subscribe(EventKind::TextMessageContent, |event: &AguiEvent| {
        if let AguiEvent::TextMessageContent { delta, .. } = event {
            print!("{}", delta);
            let _ = std::io::stdout().flush();
        }
    });
    client.subscribe(EventKind::StepStarted, |event: &AguiEvent| {
        if let AguiEvent::StepStarted { step_name } = event {
            println!("\n== {} ==", step_name);
        }
    });
    client.subscribe_custom("agent_activity", |event: &AguiEvent| {
        if let AguiEvent::Custom { value, .. } = event {
            if let Some(message) = value.get("message").and_then(|m| m.as_str()) {
                println!("\n[activity] {}", message);
            }
        }
    });
    client.subscribe(EventKind::RunError, |event: &AguiEvent| {
        if let AguiEvent::RunError { message, .. } = event {
            eprintln!("\nrun error: {}", message);
        }
    });
    client.on_diagnostic(|diagnostic: &Diagnostic| eprintln!("[diagnostic] {}", diagnostic));

    // Ctrl-C cancels the run but still prints what was gathered
    let canceller = client.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            canceller.cancel();
        }
    });

    let state = client.run(&json!({ "prompt": prompt })).await?;

    println!("\n\nstatus: {}", client.status());
    println!("state: {}", serde_json::to_string_pretty(&state)?);
    for call in client.tool_calls() {
        println!("tool call {} ({}): {}", call.id, call.name, call.args);
    }
    for file in activity.view().files() {
        println!("file {} [{:?}]", file.path, file.status);
    }

    Ok(())
}
