use std::sync::Arc;

use nbproxy_common::GlobalConfig;
use nbproxy_core::{Dispatcher, UpstreamClient};

/// Shared by every handler through `State<Arc<AppState>>`.
#[derive(Debug)]
pub struct AppState {
    pub config: GlobalConfig,
    pub dispatcher: Dispatcher,
}

impl AppState {
    pub fn new(config: GlobalConfig, client: Arc<dyn UpstreamClient>) -> Self {
        let dispatcher = Dispatcher::from_config(client, &config);
        Self { config, dispatcher }
    }
}
