use std::collections::HashMap;

use crate::model::{Entity, EntityId};

/// Stable reference into an [`EntityStore`]. A handle outlives the entity it
/// names; lookups through a stale handle return `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityHandle {
    index: u32,
    generation: u32,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    entity: Option<Entity>,
}

/// Arena of networked entities indexed by their string id.
#[derive(Debug, Default)]
pub struct EntityStore {
    slots: Vec<Slot>,
    free: Vec<u32>,
    by_id: HashMap<EntityId, EntityHandle>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. Replacing an entity with a known id keeps its
    /// handle.
    pub fn insert(&mut self, entity: Entity) -> EntityHandle {
        let handle = match self.handle_of(&entity.id) {
            Some(handle) => handle,
            None => self.allocate(entity.id.clone()),
        };
        self.slots[handle.index as usize].entity = Some(entity);
        handle
    }

    /// The entity named `id`, created by `make` if it is not tracked yet.
    /// `make` must build an entity with that same id.
    pub fn get_or_insert_with(
        &mut self,
        id: &EntityId,
        make: impl FnOnce() -> Entity,
    ) -> &mut Entity {
        let handle = match self.handle_of(id) {
            Some(handle) => handle,
            None => self.allocate(id.clone()),
        };
        self.slots[handle.index as usize]
            .entity
            .get_or_insert_with(make)
    }

    /// Reserve an empty slot for `id`.
    fn allocate(&mut self, id: EntityId) -> EntityHandle {
        let handle = match self.free.pop() {
            Some(index) => EntityHandle {
                index,
                generation: self.slots[index as usize].generation,
            },
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    entity: None,
                });
                EntityHandle {
                    index,
                    generation: 0,
                }
            }
        };

        self.by_id.insert(id, handle);
        handle
    }

    pub fn remove(&mut self, handle: EntityHandle) -> Option<Entity> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let entity = slot.entity.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.by_id.remove(&entity.id);
        Some(entity)
    }

    pub fn remove_by_id(&mut self, id: &EntityId) -> Option<Entity> {
        let handle = self.handle_of(id)?;
        self.remove(handle)
    }

    pub fn handle_of(&self, id: &EntityId) -> Option<EntityHandle> {
        self.by_id.get(id).copied()
    }

    pub fn get(&self, handle: EntityHandle) -> Option<&Entity> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.entity.as_ref())
    }

    pub fn get_mut(&mut self, handle: EntityHandle) -> Option<&mut Entity> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.entity.as_mut())
    }

    pub fn get_by_id(&self, id: &EntityId) -> Option<&Entity> {
        self.handle_of(id).and_then(|handle| self.get(handle))
    }

    pub fn get_by_id_mut(&mut self, id: &EntityId) -> Option<&mut Entity> {
        let handle = self.handle_of(id)?;
        self.get_mut(handle)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.slots.iter().filter_map(|slot| slot.entity.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.slots.iter_mut().filter_map(|slot| slot.entity.as_mut())
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::model::{EntityKind, SessionId};

    #[test]
    fn insert_and_lookup() {
        let mut store = EntityStore::new();
        let handle = store.insert(Entity::vehicle(
            EntityId::from("v1"),
            SessionId::from("me"),
            Vec3::ONE,
        ));
        store.insert(Entity::new(EntityId::from("flag"), EntityKind::Flag));

        assert_eq!(store.len(), 2);
        assert_eq!(store.handle_of(&EntityId::from("v1")), Some(handle));
        assert_eq!(store.get(handle).unwrap().transform.position, Vec3::ONE);
    }

    #[test]
    fn replace_keeps_handle() {
        let mut store = EntityStore::new();
        let first = store.insert(Entity::new(EntityId::from("p"), EntityKind::Projectile));
        let second = store.insert(Entity::new(EntityId::from("p"), EntityKind::Projectile));

        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn stale_handle_after_remove() {
        let mut store = EntityStore::new();
        let old = store.insert(Entity::new(EntityId::from("a"), EntityKind::Projectile));
        assert!(store.remove(old).is_some());

        let reused = store.insert(Entity::new(EntityId::from("b"), EntityKind::Projectile));

        assert_eq!(old.index, reused.index);
        assert!(store.get(old).is_none());
        assert_eq!(store.get(reused).unwrap().id, EntityId::from("b"));
        assert!(store.get_by_id(&EntityId::from("a")).is_none());
    }

    #[test]
    fn get_or_insert_creates_once() {
        let mut store = EntityStore::new();
        let id = EntityId::from("drone");

        store
            .get_or_insert_with(&id, || Entity::new(id.clone(), EntityKind::Vehicle))
            .game_state
            .score = 3;
        let entity =
            store.get_or_insert_with(&id, || Entity::new(id.clone(), EntityKind::Flag));

        assert_eq!(entity.kind, EntityKind::Vehicle);
        assert_eq!(entity.game_state.score, 3);
        assert_eq!(store.len(), 1);
    }
}
