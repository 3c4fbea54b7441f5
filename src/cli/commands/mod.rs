//! CLI command implementations.

mod config;
mod doctor;
mod lookup;
mod run;

pub use config::run_config;
pub use doctor::run_doctor;
pub use lookup::run_lookup;
pub use run::run_bot;

/// Prefer a secret given on the command line, then the configured one.
fn choose_secret(
    flag: Option<String>,
    configured: impl FnOnce() -> crate::Result<String>,
) -> crate::Result<String> {
    match flag.filter(|v| !v.trim().is_empty()) {
        Some(value) => Ok(value),
        None => configured(),
    }
}
