mod auth;
mod config_cmd;
mod doc;
mod draft;

pub use auth::AuthCommand;
pub use config_cmd::ConfigCommand;
pub use doc::DocCommand;
pub use draft::DraftCommand;

use clap::ValueEnum;
use std::sync::Arc;

use loomsync::{Config, Engine, EngineError, GitHubStore, LocalStore, MetaValue, Metadata, Session};

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Builds an engine for the signed-in repository.
pub async fn connect(config: &Config, store: &LocalStore) -> Result<Arc<Engine>, EngineError> {
    let credential = Session::new(store.credentials()).require().await?;
    tracing::debug!(
        "Using {} via {}",
        credential.address(),
        config.api_url.value
    );

    let remote = GitHubStore::from_credential(config.api_url.value.clone(), &credential);
    Ok(Arc::new(Engine::new(
        Arc::new(remote),
        store,
        config.engine_options(),
    )))
}

/// Metadata as a plain JSON object.
pub fn metadata_json(metadata: &Metadata) -> serde_json::Value {
    let map = metadata
        .iter()
        .map(|(key, value)| {
            let value = match value {
                MetaValue::String(s) => serde_json::json!(s),
                MetaValue::Number(n) => serde_json::json!(n),
                MetaValue::Bool(b) => serde_json::json!(b),
                MetaValue::List(items) => serde_json::json!(items),
            };
            (key.to_string(), value)
        })
        .collect();
    serde_json::Value::Object(map)
}
