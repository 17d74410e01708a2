//! Configuration loading: language model settings (JSON) and sourcing
//! pipeline settings (TOML). Both fall back to defaults when files are absent.

pub mod llm;
pub mod sourcing;

pub use llm::LlmConfig;
pub use sourcing::SourcingConfig;

/// Resolve a secret that may be given literally or as `"ENV"`.
pub(crate) fn resolve_secret(raw: &str, env_name: &str) -> String {
    if raw.trim().eq_ignore_ascii_case("env") {
        std::env::var(env_name).unwrap_or_default()
    } else {
        raw.to_string()
    }
}
