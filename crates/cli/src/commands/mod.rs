pub mod agents;
pub mod gc;
pub mod run;

use foreman_agent::{ConfigResolver, ProviderResolver};
use foreman_config::Config;
use std::sync::Arc;

/// The production resolver: the provider router over the loaded config.
pub fn resolver(config: Arc<Config>) -> Arc<dyn ProviderResolver> {
    Arc::new(ConfigResolver(move |model_ref: &foreman_core::ModelRef| {
        foreman_providers::build_provider(model_ref, &config)
    }))
}
