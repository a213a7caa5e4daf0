use std::time::{Duration, Instant};

use serde_json::{json, Value};

use crate::cli::{utils::output_success, OutputFormat};

pub async fn handle(base_url: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let url = format!("{}/health", base_url.trim_end_matches('/'));
    let client = reqwest::Client::builder().timeout(Duration::from_secs(10)).build()?;

    let started = Instant::now();
    let response = client.get(&url).send().await?;
    let elapsed_ms = started.elapsed().as_millis();
    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);

    if !status.is_success() {
        anyhow::bail!("{} answered {} after {}ms: {}", url, status, elapsed_ms, body);
    }

    output_success(
        output_format,
        &format!("{} is healthy ({}ms)", base_url, elapsed_ms),
        Some(json!({ "url": url, "status": status.as_u16(), "elapsed_ms": elapsed_ms, "health": body })),
    )
}
