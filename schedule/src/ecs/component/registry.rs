use std::{
    any::{TypeId, type_name},
    fmt,
    sync::{
        RwLock,
        atomic::{AtomicU32, Ordering},
    },
};

use dashmap::DashMap;

use crate::ecs::component::{Component, ComponentId, Resource};

/// What a registered type is used as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Attached to entities.
    Component,
    /// One instance per world.
    Resource,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Component => write!(f, "component"),
            Kind::Resource => write!(f, "resource"),
        }
    }
}

/// Metadata about a registered type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Info {
    id: ComponentId,
    kind: Kind,
    type_id: TypeId,
    name: &'static str,
}

impl Info {
    fn new<T: 'static>(id: ComponentId, kind: Kind) -> Self {
        Self {
            id,
            kind,
            type_id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// The registered id.
    #[inline]
    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// Component or resource.
    #[inline]
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// The Rust type id.
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Full type name, e.g. `my_game::physics::Position`.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name with module paths stripped, e.g. `Position`.
    pub fn short_name(&self) -> String {
        crate::ecs::util::short_name(self.name)
    }
}

/// A thread-safe registry handing out dense ids for component and resource types.
///
/// Lookups from `TypeId` are lock-free reads on a `DashMap`; registration takes a single map
/// shard plus the write lock on the info table, and only the first time a type is seen.
///
/// A type is either a component or a resource, never both. Registering it as the other kind is
/// a programming error and panics.
pub struct Registry {
    /// Map from Rust type to id.
    type_map: DashMap<TypeId, ComponentId>,

    /// Registered type metadata, indexed by id.
    infos: RwLock<Vec<Info>>,

    /// Next available id.
    next_id: AtomicU32,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("len", &self.len())
            .finish()
    }
}

impl Registry {
    /// Create an empty registry.
    #[inline]
    pub fn new() -> Self {
        Self {
            type_map: DashMap::new(),
            infos: RwLock::new(Vec::new()),
            next_id: AtomicU32::new(0),
        }
    }

    /// Register `C` as a component, returning its id. Idempotent.
    pub fn register_component<C: Component>(&self) -> ComponentId {
        self.register::<C>(Kind::Component)
    }

    /// Register `R` as a resource, returning its id. Idempotent.
    pub fn register_resource<R: Resource>(&self) -> ComponentId {
        self.register::<R>(Kind::Resource)
    }

    fn register<T: 'static>(&self, kind: Kind) -> ComponentId {
        let type_id = TypeId::of::<T>();

        // Fast path: already registered.
        if let Some(id) = self.type_map.get(&type_id).map(|entry| *entry.value()) {
            self.assert_kind::<T>(id, kind);
            return id;
        }

        match self.type_map.entry(type_id) {
            dashmap::Entry::Occupied(occupied) => {
                // Another thread won the race.
                let id = *occupied.get();
                drop(occupied);
                self.assert_kind::<T>(id, kind);
                id
            }
            dashmap::Entry::Vacant(vacant) => {
                let mut infos = self.infos.write().unwrap();
                let id = ComponentId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
                debug_assert_eq!(id.index(), infos.len());
                infos.push(Info::new::<T>(id, kind));
                vacant.insert(id);
                id
            }
        }
    }

    fn assert_kind<T: 'static>(&self, id: ComponentId, kind: Kind) {
        if let Some(info) = self.get_info(id)
            && info.kind() != kind
        {
            panic!(
                "type '{}' is already registered as a {}, cannot register as {}",
                type_name::<T>(),
                info.kind(),
                kind
            );
        }
    }

    /// Id of `C` if registered as a component.
    #[inline]
    pub fn component_id<C: Component>(&self) -> Option<ComponentId> {
        self.get_of_kind::<C>(Kind::Component)
    }

    /// Id of `R` if registered as a resource.
    #[inline]
    pub fn resource_id<R: Resource>(&self) -> Option<ComponentId> {
        self.get_of_kind::<R>(Kind::Resource)
    }

    fn get_of_kind<T: 'static>(&self, kind: Kind) -> Option<ComponentId> {
        let id = *self.type_map.get(&TypeId::of::<T>())?;
        self.get_info(id)
            .filter(|info| info.kind() == kind)
            .map(|info| info.id())
    }

    /// Metadata for an id.
    #[inline]
    pub fn get_info(&self, id: ComponentId) -> Option<Info> {
        self.infos.read().unwrap().get(id.index()).copied()
    }

    /// Full type name for an id.
    #[inline]
    pub fn get_name(&self, id: ComponentId) -> Option<&'static str> {
        self.get_info(id).map(|info| info.name())
    }

    /// Name for a bit position, used when rendering conflicts.
    pub(crate) fn get_name_by_index(&self, index: usize) -> String {
        match self.get_info(ComponentId::from(index)) {
            Some(info) => info.short_name(),
            None => format!("{}", ComponentId::from(index)),
        }
    }

    /// Number of registered types.
    #[inline]
    pub fn len(&self) -> usize {
        self.infos.read().unwrap().len()
    }

    /// Whether nothing is registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
