//! `vox config` – print the effective configuration.

use anyhow::Result;
use std::path::Path;
use vox_core::config::{self, VoxConfig};
use vox_core::http_log::mask_secret;

/// Copy of `cfg` safe to print.
pub(crate) fn redacted(cfg: &VoxConfig) -> VoxConfig {
    let mut out = cfg.clone();
    out.api_key = cfg.api_key.as_deref().map(mask_secret);
    out
}

pub fn run_config(cfg: &VoxConfig, explicit: Option<&Path>) -> Result<()> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => config::config_path()?,
    };
    println!("# {}", path.display());
    print!("{}", toml::to_string_pretty(&redacted(cfg))?);
    Ok(())
}
