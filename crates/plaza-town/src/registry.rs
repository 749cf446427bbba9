//! Town registry: creates, tracks, lists and deletes towns.

use std::collections::HashMap;
use std::sync::Arc;

use plaza_protocol::{ChannelId, TownId, TownListing};
use plaza_provider::ChannelProvider;

use crate::config::{TownConfig, generate_town_id};
use crate::controller::TownController;
use crate::error::TownError;

/// Every live town, keyed by id.
///
/// This is the entry point for directory operations from the gateway.
/// Towns are handed out as `Arc`s so callers can work with a town after
/// releasing whatever lock guards the registry.
pub struct TownRegistry<P: ChannelProvider> {
    towns: HashMap<TownId, Arc<TownController<P>>>,
    config: TownConfig,
    provider: Arc<P>,
}

impl<P: ChannelProvider> TownRegistry<P> {
    pub fn new(config: TownConfig, provider: Arc<P>) -> Self {
        Self {
            towns: HashMap::new(),
            config,
            provider,
        }
    }

    pub fn config(&self) -> &TownConfig {
        &self.config
    }

    /// Creates a town and returns its id and update password.
    ///
    /// A name matching the configured well-known id gets that id; any
    /// other name gets a fresh random one.
    pub fn create_town(
        &mut self,
        friendly_name: &str,
        is_publicly_listed: bool,
    ) -> Result<(TownId, String), TownError> {
        if friendly_name.trim().is_empty() {
            return Err(TownError::InvalidName);
        }

        let town_id = match self.config.well_known_id_for(friendly_name) {
            Some(id) if self.towns.contains_key(&id) => {
                return Err(TownError::AlreadyExists(id));
            }
            Some(id) => id,
            None => loop {
                let candidate = generate_town_id();
                if !self.towns.contains_key(&candidate) {
                    break candidate;
                }
            },
        };

        let town = Arc::new(TownController::new(
            town_id.clone(),
            friendly_name,
            is_publicly_listed,
            &self.config,
            Arc::clone(&self.provider),
        ));
        let password = town.update_password().to_string();
        self.towns.insert(town_id.clone(), town);

        tracing::info!(%town_id, friendly_name, is_publicly_listed, "town created");
        Ok((town_id, password))
    }

    pub fn get(&self, town_id: &TownId) -> Option<Arc<TownController<P>>> {
        self.towns.get(town_id).cloned()
    }

    /// Lists publicly listed towns.
    pub async fn list_public(&self) -> Vec<TownListing> {
        let mut listings = Vec::with_capacity(self.towns.len());
        for town in self.towns.values() {
            if town.is_publicly_listed().await {
                listings.push(town.listing().await);
            }
        }
        listings
    }

    /// Changes a town's name and/or visibility.
    ///
    /// Nothing changes unless the password matches and the new name, if
    /// given, is not blank.
    pub async fn update_town(
        &self,
        town_id: &TownId,
        password: &str,
        friendly_name: Option<String>,
        is_publicly_listed: Option<bool>,
    ) -> Result<(), TownError> {
        let town = self.authorize(town_id, password)?;
        if friendly_name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(TownError::InvalidName);
        }

        if let Some(name) = friendly_name {
            town.set_friendly_name(name).await;
        }
        if let Some(listed) = is_publicly_listed {
            town.set_publicly_listed(listed).await;
        }
        tracing::info!(%town_id, "town updated");
        Ok(())
    }

    /// Unregisters a town without tearing it down.
    ///
    /// Callers holding the registry behind a lock use this, release the
    /// lock, then call [`TownController::disconnect_all_players`].
    pub fn remove_town(
        &mut self,
        town_id: &TownId,
        password: &str,
    ) -> Result<Arc<TownController<P>>, TownError> {
        self.authorize(town_id, password)?;
        let town = self
            .towns
            .remove(town_id)
            .ok_or_else(|| TownError::NotFound(town_id.clone()))?;
        tracing::info!(%town_id, "town removed");
        Ok(town)
    }

    /// Removes a town and tears it down. Returns the channels the
    /// provider failed to delete.
    pub async fn delete_town(
        &mut self,
        town_id: &TownId,
        password: &str,
    ) -> Result<Vec<ChannelId>, TownError> {
        let town = self.remove_town(town_id, password)?;
        Ok(town.disconnect_all_players().await)
    }

    pub fn town_count(&self) -> usize {
        self.towns.len()
    }

    fn authorize(
        &self,
        town_id: &TownId,
        password: &str,
    ) -> Result<&Arc<TownController<P>>, TownError> {
        let town = self
            .towns
            .get(town_id)
            .ok_or_else(|| TownError::NotFound(town_id.clone()))?;
        if town.update_password() != password {
            return Err(TownError::InvalidPassword(town_id.clone()));
        }
        Ok(town)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plaza_provider::MemoryProvider;

    fn registry() -> TownRegistry<MemoryProvider> {
        TownRegistry::new(TownConfig::default(), Arc::new(MemoryProvider::new()))
    }

    #[test]
    fn test_create_town_rejects_blank_name() {
        let mut reg = registry();
        assert!(matches!(
            reg.create_town("   ", true),
            Err(TownError::InvalidName)
        ));
        assert_eq!(reg.town_count(), 0);
    }

    #[test]
    fn test_create_town_returns_password() {
        let mut reg = registry();
        let (id, password) = reg.create_town("Lobby", true).unwrap();

        let town = reg.get(&id).unwrap();
        assert_eq!(town.update_password(), password);
        assert_eq!(id.as_str().len(), 8);
    }

    #[test]
    fn test_create_town_well_known_id_is_unique() {
        let config = TownConfig {
            well_known_id: Some("demoTown".into()),
            ..TownConfig::default()
        };
        let mut reg = TownRegistry::new(config, Arc::new(MemoryProvider::new()));

        let (id, _) = reg.create_town("demoTown", true).unwrap();
        assert_eq!(id, TownId::from("demoTown"));

        assert!(matches!(
            reg.create_town("demoTown", true),
            Err(TownError::AlreadyExists(_))
        ));
        assert_eq!(reg.town_count(), 1);
    }

    #[test]
    fn test_remove_town_wrong_password() {
        let mut reg = registry();
        let (id, _) = reg.create_town("Lobby", true).unwrap();

        assert!(matches!(
            reg.remove_town(&id, "nope"),
            Err(TownError::InvalidPassword(_))
        ));
        assert_eq!(reg.town_count(), 1);
    }

    #[test]
    fn test_get_unknown_town() {
        let reg = registry();
        assert!(reg.get(&TownId::from("NOPE0000")).is_none());
    }
}
