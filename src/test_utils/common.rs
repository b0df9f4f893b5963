use std::collections::HashMap;
use std::sync::Arc;

use crate::ClientSet;
use crate::ConsulBackend;
use crate::VaultBackend;
use crate::VaultSecret;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    env_logger::init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
    println!("setup logger for unit test.");
}

/// Bundle fake backends into the client set every fetch call expects.
pub fn test_client_set(vault: Arc<dyn VaultBackend>, consul: Arc<dyn ConsulBackend>) -> Arc<ClientSet> {
    Arc::new(ClientSet::new(vault, consul))
}

/// Shorthand for secret payloads in tests.
pub fn secret(pairs: &[(&str, &str)]) -> VaultSecret {
    VaultSecret {
        data: pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>(),
        lease_duration_secs: 0,
    }
}
