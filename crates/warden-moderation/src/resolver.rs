//! Origin community to moderation target set
//!
//! An unaffiliated community (no config row, or no network) resolves to
//! itself. A networked community resolves to every community sharing its
//! network name. The origin always comes first; the rest follow in ascending
//! id order.

use std::sync::Arc;
use tracing::debug;
use warden_core::{CommunityId, CommunityRepository, NetworkName, RepositoryError};

/// Resolves the communities a network-wide action applies to
#[derive(Clone)]
pub struct NetworkResolver {
    repository: Arc<dyn CommunityRepository>,
}

impl NetworkResolver {
    /// Create a resolver over `repository`
    pub fn new(repository: Arc<dyn CommunityRepository>) -> Self {
        Self { repository }
    }

    /// Network the community belongs to, if any
    pub async fn network_of(
        &self,
        community: CommunityId,
    ) -> Result<Option<NetworkName>, RepositoryError> {
        Ok(self
            .repository
            .community(community)
            .await?
            .and_then(|config| config.network))
    }

    /// Every community an action issued in `origin` applies to
    pub async fn resolve(&self, origin: CommunityId) -> Result<Vec<CommunityId>, RepositoryError> {
        let Some(network) = self.network_of(origin).await? else {
            return Ok(vec![origin]);
        };

        let mut others: Vec<CommunityId> = self
            .repository
            .communities_in_network(&network)
            .await?
            .into_iter()
            .filter(|community| *community != origin)
            .collect();
        others.sort();
        others.dedup();

        let mut targets = Vec::with_capacity(others.len() + 1);
        targets.push(origin);
        targets.extend(others);
        debug!(%origin, %network, targets = targets.len(), "Resolved network");
        Ok(targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;
    use warden_core::CommunityConfig;
    use warden_effects::{MemoryStorageHandler, StorageCommunityRepository};

    fn repository() -> Arc<StorageCommunityRepository> {
        Arc::new(StorageCommunityRepository::new(Arc::new(
            MemoryStorageHandler::new(),
        )))
    }

    #[tokio::test]
    async fn test_unknown_and_unaffiliated_resolve_to_origin() {
        let repo = repository();
        repo.save_community(&CommunityConfig::new(CommunityId::new(2)))
            .await
            .unwrap();
        let resolver = NetworkResolver::new(repo);

        assert_eq!(
            resolver.resolve(CommunityId::new(1)).await.unwrap(),
            vec![CommunityId::new(1)]
        );
        assert_eq!(
            resolver.resolve(CommunityId::new(2)).await.unwrap(),
            vec![CommunityId::new(2)]
        );
    }

    #[tokio::test]
    async fn test_network_resolves_origin_first() {
        let repo = repository();
        let hub = NetworkName::new("hub").unwrap();
        for id in [5, 1, 9] {
            repo.save_community(&CommunityConfig::new(CommunityId::new(id)).with_network(hub.clone()))
                .await
                .unwrap();
        }
        let resolver = NetworkResolver::new(repo);

        assert_eq!(
            resolver.resolve(CommunityId::new(5)).await.unwrap(),
            vec![CommunityId::new(5), CommunityId::new(1), CommunityId::new(9)]
        );
    }

    proptest! {
        #[test]
        fn prop_resolution_is_exactly_the_network(
            assignment in prop::collection::vec(prop::option::of(0u8..3), 1..12),
            origin_index in any::<prop::sample::Index>(),
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let origin = origin_index.index(assignment.len());
            let targets = runtime.block_on(async {
                let repo = repository();
                for (id, network) in assignment.iter().enumerate() {
                    let mut config = CommunityConfig::new(CommunityId::new(id as u64));
                    if let Some(n) = network {
                        config = config.with_network(NetworkName::new(format!("net-{n}")).unwrap());
                    }
                    repo.save_community(&config).await.unwrap();
                }
                NetworkResolver::new(repo)
                    .resolve(CommunityId::new(origin as u64))
                    .await
                    .unwrap()
            });

            let expected: BTreeSet<CommunityId> = match assignment[origin] {
                None => BTreeSet::from([CommunityId::new(origin as u64)]),
                Some(n) => assignment
                    .iter()
                    .enumerate()
                    .filter(|(_, network)| **network == Some(n))
                    .map(|(id, _)| CommunityId::new(id as u64))
                    .collect(),
            };
            prop_assert_eq!(targets[0], CommunityId::new(origin as u64));
            prop_assert_eq!(targets.len(), expected.len());
            prop_assert_eq!(targets.into_iter().collect::<BTreeSet<_>>(), expected);
        }
    }
}
