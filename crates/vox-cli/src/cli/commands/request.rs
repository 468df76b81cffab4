//! `vox request <METHOD> <PATH>` – one API call through the retry executor.

use anyhow::{Context, Result};
use serde_json::Value;
use std::io::Write;
use vox_core::client::ApiClient;
use vox_core::config::VoxConfig;

/// Validates `--data` as JSON and returns the compact bytes to send.
pub(crate) fn encode_body(data: Option<&str>) -> Result<Option<Vec<u8>>> {
    let Some(data) = data else {
        return Ok(None);
    };
    let value: Value = serde_json::from_str(data).context("--data must be valid JSON")?;
    Ok(Some(serde_json::to_vec(&value)?))
}

pub async fn run_request(
    cfg: &VoxConfig,
    method: &str,
    path: &str,
    data: Option<&str>,
    api_key: Option<String>,
) -> Result<()> {
    let mut cfg = cfg.clone();
    if api_key.is_some() {
        cfg.api_key = api_key;
    }
    let body = encode_body(data)?;
    let client = ApiClient::from_config(&cfg)?;

    let resp = tokio::task::spawn_blocking({
        let method = method.to_string();
        let path = path.to_string();
        move || client.request(&method, &path, body)
    })
    .await
    .context("request task join")??;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&resp.body)?;
    if !resp.body.ends_with(b"\n") {
        writeln!(stdout)?;
    }
    Ok(())
}
