use std::fmt;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::with_cancellation;
use crate::ClientSet;
use crate::Dependency;
use crate::DependencyError;
use crate::DependencyValue;
use crate::Fetched;
use crate::QueryOptions;
use crate::ResponseMetadata;

/// Lists the service catalog, optionally scoped to one datacenter.
///
/// The registry supports native blocking queries, so `fetch` holds until the
/// catalog version moves past the wait index or the server-side wait elapses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogServicesQuery {
    datacenter: Option<String>,
}

impl CatalogServicesQuery {
    pub fn new(datacenter: Option<&str>) -> std::result::Result<Self, DependencyError> {
        if let Some(dc) = datacenter {
            if dc.is_empty() {
                return Err(DependencyError::InvalidArgument {
                    query: "catalog.services",
                    reason: "datacenter is empty".to_string(),
                });
            }
        }
        Ok(Self {
            datacenter: datacenter.map(str::to_string),
        })
    }

    pub fn datacenter(&self) -> Option<&str> {
        self.datacenter.as_deref()
    }
}

impl fmt::Display for CatalogServicesQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.datacenter {
            Some(dc) => write!(f, "catalog.services(@{})", dc),
            None => write!(f, "catalog.services"),
        }
    }
}

#[async_trait]
impl Dependency for CatalogServicesQuery {
    async fn fetch(
        &self,
        clients: &ClientSet,
        opts: &QueryOptions,
        cancel: &CancellationToken,
    ) -> std::result::Result<Fetched, DependencyError> {
        let blocking = opts.to_blocking();
        debug!("{} polling (wait_index={})", self, blocking.wait_index);

        let resp = with_cancellation(
            cancel,
            clients.consul().catalog_services(self.datacenter.clone(), &blocking),
        )
        .await?;

        let mut services = resp.value;
        services.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(Fetched {
            value: DependencyValue::Services(services),
            meta: ResponseMetadata { last_index: resp.index },
        })
    }
}
