//! `vox schedule` – show the retry backoff schedule.

use anyhow::Result;
use vox_core::config::VoxConfig;
use vox_core::retry::RetryPolicy;

pub(crate) fn render_schedule(policy: &RetryPolicy) -> String {
    let mut out = format!("  {:>7}  {:>10}\n", "Retry", "Delay(ms)");
    for (i, delay) in policy.schedule().iter().enumerate() {
        out.push_str(&format!("  {:>7}  {:>10}\n", i + 1, delay.as_millis()));
    }
    out
}

pub fn run_schedule(cfg: &VoxConfig, attempts: Option<u32>) -> Result<()> {
    let mut policy = RetryPolicy::from(&cfg.retry);
    if let Some(n) = attempts {
        policy.max_attempts = n;
    }
    println!(
        "max attempts: {}, base: {} ms, cap: {} ms, jitter: {}, honor Retry-After: {}",
        policy.max_attempts(),
        policy.base_delay.as_millis(),
        policy.max_delay.as_millis(),
        if policy.jitter { "+/-10%" } else { "off" },
        policy.respect_retry_after
    );
    print!("{}", render_schedule(&policy));
    Ok(())
}
