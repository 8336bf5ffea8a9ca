// Entity service - Default bounds per entity, persisted on change
use crate::domain::entity::EntityBound;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub trait EntityStore: Send + Sync {
    fn save(&self, entities: &BTreeMap<String, EntityBound>) -> anyhow::Result<()>;
}

pub struct EntityService {
    entities: RwLock<BTreeMap<String, EntityBound>>,
    store: Arc<dyn EntityStore>,
}

impl EntityService {
    pub fn new(entities: BTreeMap<String, EntityBound>, store: Arc<dyn EntityStore>) -> Self {
        Self {
            entities: RwLock::new(entities),
            store,
        }
    }

    pub async fn list(&self) -> BTreeMap<String, EntityBound> {
        self.entities.read().await.clone()
    }

    pub async fn get(&self, entity_id: &str) -> Option<EntityBound> {
        self.entities.read().await.get(entity_id).cloned()
    }

    /// Rejects inverted bounds; nothing is stored or saved in that case.
    pub async fn upsert(&self, entity_id: &str, bound: EntityBound) -> anyhow::Result<()> {
        bound.validate()?;
        let mut entities = self.entities.write().await;
        entities.insert(entity_id.to_string(), bound);
        self.store.save(&entities)?;
        tracing::info!("Bounds for {} saved", entity_id);
        Ok(())
    }

    /// Returns false when the entity was not configured.
    pub async fn remove(&self, entity_id: &str) -> anyhow::Result<bool> {
        let mut entities = self.entities.write().await;
        if entities.remove(entity_id).is_none() {
            return Ok(false);
        }
        self.store.save(&entities)?;
        tracing::info!("Entity {} removed", entity_id);
        Ok(true)
    }
}
