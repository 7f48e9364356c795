use std::{collections::HashMap, fmt::Debug, sync::Arc};

use log::*;
use tokio::sync::RwLock;

use crate::{db_types::Chain, sources::TransferSource};

/// Maps each chain to exactly one live [`TransferSource`]. Registering a second source for a chain replaces the first.
///
/// The registry is a cheap, cloneable handle. Clones share the same map, so a source registered through one handle is
/// immediately visible to the scheduler and the ledger.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    sources: Arc<RwLock<HashMap<Chain, Arc<dyn TransferSource>>>>,
}

impl Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SourceRegistry")
    }
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `source` for `chain`, returning the source it replaced, if any.
    pub async fn register(&self, chain: Chain, source: Arc<dyn TransferSource>) -> Option<Arc<dyn TransferSource>> {
        let name = source.name().to_string();
        let previous = self.sources.write().await.insert(chain.clone(), source);
        match &previous {
            Some(old) => info!("🔌️ {name} replaces {} as the transfer source for {chain}", old.name()),
            None => info!("🔌️ {name} registered as the transfer source for {chain}"),
        }
        previous
    }

    pub async fn unregister(&self, chain: &Chain) -> Option<Arc<dyn TransferSource>> {
        let removed = self.sources.write().await.remove(chain);
        if removed.is_some() {
            info!("🔌️ Transfer source for {chain} removed");
        }
        removed
    }

    pub async fn get(&self, chain: &Chain) -> Option<Arc<dyn TransferSource>> {
        self.sources.read().await.get(chain).cloned()
    }

    pub async fn chains(&self) -> Vec<Chain> {
        let mut chains = self.sources.read().await.keys().cloned().collect::<Vec<_>>();
        chains.sort();
        chains
    }

    pub async fn len(&self) -> usize {
        self.sources.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sources.read().await.is_empty()
    }
}
