pub mod client;
pub mod config;
pub mod http_log;
pub mod logging;
pub mod retry;
pub mod transport;

#[cfg(test)]
mod test_support;
