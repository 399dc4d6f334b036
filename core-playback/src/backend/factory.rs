use std::sync::Arc;

use bridge_traits::{BridgeError, MediaEngineProvider};
use tracing::debug;

use super::{EngineAdapter, TuningProfile};
use crate::config::PlayerConfig;
use crate::error::{PlaybackError, Result};
use crate::traits::{AdapterFactory, BackendAdapter, BackendKind};

/// Builds [`EngineAdapter`]s from host-provided engines.
pub struct EngineAdapterFactory {
    provider: Arc<dyn MediaEngineProvider>,
}

impl EngineAdapterFactory {
    pub fn new(provider: Arc<dyn MediaEngineProvider>) -> Self {
        Self { provider }
    }
}

impl AdapterFactory for EngineAdapterFactory {
    fn create(&self, kind: BackendKind, config: &PlayerConfig) -> Result<Box<dyn BackendAdapter>> {
        let profile = TuningProfile::for_kind(kind, config);
        let engine = self
            .provider
            .create_engine(profile.flavor())
            .map_err(|err| match err {
                BridgeError::NotAvailable(msg) => {
                    PlaybackError::UnsupportedBackend(format!("{}: {}", kind, msg))
                }
                other => PlaybackError::Engine(other),
            })?;

        debug!(backend = %kind, flavor = ?profile.flavor(), "created engine adapter");
        Ok(Box::new(EngineAdapter::new(
            profile,
            engine,
            config.position_poll_interval,
        )))
    }
}
