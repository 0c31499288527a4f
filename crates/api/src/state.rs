use std::{sync::Arc, time::Duration};

use fixit_domain::config::ApiConfig;
use fixit_domain::services::{
    AdminAuthenticator, AffiliateResolver, BalanceSettlementEngine, ConfigCache,
    ContactDisclosureService, StatsSink, TelemetryGuard,
};
use fixit_storage::SeaOrmStorage;

/// Knobs that shape the shared services; normally read from [`ApiConfig`].
#[derive(Debug, Clone)]
pub struct StateOptions {
    pub config_ttl: Duration,
    pub store_timeout: Duration,
    pub sink_capacity: usize,
    pub authenticator: AdminAuthenticator,
}

impl StateOptions {
    pub fn from_config(config: &ApiConfig) -> Self {
        Self {
            config_ttl: config.config_cache_ttl(),
            store_timeout: config.store_timeout(),
            sink_capacity: config.sink_capacity(),
            authenticator: AdminAuthenticator::new(
                config.admin_sessions(),
                config.admin_principal(),
            ),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    storage: SeaOrmStorage,
    disclosure: ContactDisclosureService,
    config_cache: Arc<ConfigCache>,
    affiliates: AffiliateResolver,
    sink: StatsSink,
    authenticator: Arc<AdminAuthenticator>,
    telemetry: TelemetryGuard,
}

impl AppState {
    /// Wires the services around one storage handle. Spawns the sink worker,
    /// so it must run inside a tokio runtime.
    pub fn new(storage: SeaOrmStorage, telemetry: TelemetryGuard, options: StateOptions) -> Self {
        let shared = Arc::new(storage.clone());
        let config_cache = Arc::new(ConfigCache::new(shared.clone(), options.config_ttl));
        let (sink, _worker) = StatsSink::spawn(shared.clone(), shared.clone(), options.sink_capacity);
        let settlement = BalanceSettlementEngine::new(shared, options.store_timeout);

        Self {
            storage,
            disclosure: ContactDisclosureService::new(settlement, sink.clone()),
            affiliates: AffiliateResolver::new(config_cache.clone()),
            config_cache,
            sink,
            authenticator: Arc::new(options.authenticator),
            telemetry,
        }
    }

    pub fn storage(&self) -> &SeaOrmStorage {
        &self.storage
    }

    pub fn disclosure(&self) -> &ContactDisclosureService {
        &self.disclosure
    }

    pub fn config_cache(&self) -> &ConfigCache {
        self.config_cache.as_ref()
    }

    pub fn affiliates(&self) -> &AffiliateResolver {
        &self.affiliates
    }

    pub fn sink(&self) -> &StatsSink {
        &self.sink
    }

    pub fn authenticator(&self) -> &AdminAuthenticator {
        self.authenticator.as_ref()
    }

    pub fn telemetry(&self) -> &TelemetryGuard {
        &self.telemetry
    }
}
