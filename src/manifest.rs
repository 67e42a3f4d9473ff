//! Source of the strategies tracked on each network.

use crate::settings::Settings;
use crate::types::ManifestEntry;
use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;

/// Supplies the entity manifest before each pass.
#[async_trait]
pub trait ManifestSource: Send + Sync {
    async fn entries(&self, chain_id: u64) -> Result<Vec<ManifestEntry>>;
}

/// In-memory manifest, seeded from configuration and replaceable at runtime
/// (e.g. by a registry indexer running in the same process).
#[derive(Debug, Default)]
pub struct StaticManifest {
    chains: DashMap<u64, Vec<ManifestEntry>>,
}

impl StaticManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let manifest = Self::new();
        for chain in &settings.chains {
            manifest.set_entries(chain.chain_id, chain.manifest_entries()?);
        }
        Ok(manifest)
    }

    /// Replaces the manifest of `chain_id`; the next pass picks it up.
    pub fn set_entries(&self, chain_id: u64, entries: Vec<ManifestEntry>) {
        self.chains.insert(chain_id, entries);
    }
}

#[async_trait]
impl ManifestSource for StaticManifest {
    async fn entries(&self, chain_id: u64) -> Result<Vec<ManifestEntry>> {
        Ok(self
            .chains
            .get(&chain_id)
            .map(|entries| entries.value().clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VaultVersion;
    use ethers::types::Address;

    #[tokio::test]
    async fn unknown_chain_has_an_empty_manifest() {
        let manifest = StaticManifest::new();
        assert!(manifest.entries(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn set_entries_replaces_previous_manifest() {
        let manifest = StaticManifest::new();
        let entry = |n| ManifestEntry::new(10, Address::from_low_u64_be(1), Address::from_low_u64_be(n), "0.3.1");
        manifest.set_entries(10, vec![entry(2), entry(3)]);
        manifest.set_entries(10, vec![entry(4)]);

        let entries = manifest.entries(10).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].strategy, Address::from_low_u64_be(4));
        assert_eq!(entries[0].vault_version, VaultVersion::V031);
    }
}
