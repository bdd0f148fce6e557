mod args;
mod client;
mod output;

use anyhow::Result;
use clap::Parser;
use futures_util::StreamExt;
use reqwest::Client;
use serde_json::{Map, Value};

use chakwrite_common::{AiActionData, ContextUpdate, Message, Payload};

use crate::args::{Args, Command};
use crate::client::{drain_events, send_message, url, Reply};
use crate::output::{print_ack, print_completion, print_state};

fn visual_settings(font: Option<String>, spacing: Option<f64>, enable_ocr: Option<bool>) -> Value {
    let mut settings = Map::new();
    if let Some(f) = font {
        settings.insert("font".into(), Value::from(f));
    }
    if let Some(s) = spacing {
        settings.insert("spacing".into(), Value::from(s));
    }
    if let Some(o) = enable_ocr {
        settings.insert("enableOcr".into(), Value::from(o));
    }
    Value::Object(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let client = Client::new();
    let base = args.broker_url.as_str();

    match args.command {
        Command::Ai {
            operation,
            text,
            tone,
            length,
            context,
        } => {
            let message = Message::PerformAiAction {
                target: None,
                data: AiActionData {
                    operation_type: operation.clone(),
                    payload: Payload {
                        text,
                        tone,
                        length,
                        context,
                    },
                    request_id: None,
                    config: None,
                },
            };
            let reply = send_message(&client, base, &message).await?;
            match (&reply, args.json) {
                (Reply::Json(v), true) => println!("{}", serde_json::to_string_pretty(v)?),
                _ => print_completion(&operation, &reply),
            }
        }
        Command::State => {
            let reply = send_message(&client, base, &Message::GetInitialState).await?;
            match (&reply, args.json) {
                (Reply::Json(v), true) => println!("{}", serde_json::to_string_pretty(v)?),
                _ => print_state(&reply),
            }
        }
        Command::Select { text } => {
            let message = Message::UpdateContext {
                data: ContextUpdate {
                    selected_text: Some(text),
                },
            };
            let reply = send_message(&client, base, &message).await?;
            print_ack("Selection recorded", &reply);
        }
        Command::Visuals {
            font,
            spacing,
            enable_ocr,
        } => {
            let message = Message::ApplyVisualChanges {
                settings: visual_settings(font, spacing, enable_ocr),
            };
            let reply = send_message(&client, base, &message).await?;
            print_ack("Visual changes sent", &reply);
        }
        Command::Command { name } => {
            let resp = client
                .post(url(base, &format!("/v1/commands/{name}")))
                .send()
                .await?;
            if resp.status().is_success() {
                println!("✓ Command '{name}' relayed to the page");
            } else {
                eprintln!("✗ Command '{name}' failed: {}", resp.text().await?);
            }
        }
        Command::Watch => {
            let resp = client.get(url(base, "/v1/page/events")).send().await?;
            if !resp.status().is_success() {
                anyhow::bail!("broker answered {}", resp.status());
            }
            let mut stream = resp.bytes_stream();
            let mut buf = String::new();
            while let Some(chunk) = stream.next().await {
                buf.push_str(&String::from_utf8_lossy(&chunk?));
                for data in drain_events(&mut buf) {
                    println!("{data}");
                }
            }
        }
        Command::Metrics => {
            let body = client.get(url(base, "/metrics")).send().await?.text().await?;
            print!("{body}");
        }
    }

    Ok(())
}
