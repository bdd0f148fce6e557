use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde_json::Value;

use chakwrite_common::Message;

pub fn url(broker_url: &str, path: &str) -> String {
    format!("{}{}", broker_url.trim_end_matches('/'), path)
}

/// What the broker answered to one wire message.
#[derive(Debug)]
pub enum Reply {
    Json(Value),
    Accepted,
    NotHandled,
}

pub async fn send_message(client: &Client, broker_url: &str, message: &Message) -> Result<Reply> {
    tracing::debug!(action = message.action(), broker=%broker_url, "sending message");
    let resp = client
        .post(url(broker_url, "/v1/messages"))
        .json(message)
        .send()
        .await
        .with_context(|| format!("reach broker at {broker_url}"))?;

    match resp.status() {
        StatusCode::ACCEPTED => Ok(Reply::Accepted),
        StatusCode::NO_CONTENT => Ok(Reply::NotHandled),
        s if s.is_success() => Ok(Reply::Json(resp.json().await?)),
        s => anyhow::bail!("broker answered {s}: {}", resp.text().await.unwrap_or_default()),
    }
}

/// Pull complete `data:` payloads out of an SSE buffer, leaving any partial
/// event in place.
pub fn drain_events(buf: &mut String) -> Vec<String> {
    let mut out = Vec::new();
    while let Some(end) = buf.find("\n\n") {
        let event: String = buf.drain(..end + 2).collect();
        let data: Vec<&str> = event
            .lines()
            .filter_map(|l| l.strip_prefix("data:"))
            .map(str::trim_start)
            .collect();
        if !data.is_empty() {
            out.push(data.join("\n"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_only_complete_events() {
        let mut buf = String::from(
            "event: updateVisuals\ndata: {\"action\":\"updateVisuals\"}\n\n:keep-alive\n\ndata: {\"act",
        );
        let events = drain_events(&mut buf);
        assert_eq!(events, vec!["{\"action\":\"updateVisuals\"}".to_string()]);
        assert_eq!(buf, "data: {\"act");
    }

    #[test]
    fn joins_url_without_double_slash() {
        assert_eq!(
            url("http://127.0.0.1:18470/", "/v1/messages"),
            "http://127.0.0.1:18470/v1/messages"
        );
    }
}
