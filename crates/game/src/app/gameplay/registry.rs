use std::collections::HashMap;

use geocoin_engine::{Cell, CellKey, GeoBounds};

use super::cache::Memento;

#[derive(Debug, Default, Clone)]
pub(crate) struct CacheRegistry {
    entries: Vec<(CellKey, Memento)>,
    index_by_key: HashMap<CellKey, usize>,
}

impl CacheRegistry {
    pub(crate) fn from_entries(entries: Vec<(CellKey, Memento)>) -> Self {
        let mut registry = Self::default();
        for (key, memento) in entries {
            registry.set(key, memento);
        }
        registry
    }

    pub(crate) fn get(&self, key: &CellKey) -> Option<&Memento> {
        let index = self.index_by_key.get(key)?;
        self.entries.get(*index).map(|(_, memento)| memento)
    }

    /// Replaces in place, keeping the first insertion position.
    pub(crate) fn set(&mut self, key: CellKey, memento: Memento) {
        if let Some(index) = self.index_by_key.get(&key) {
            self.entries[*index].1 = memento;
            return;
        }
        self.index_by_key.insert(key.clone(), self.entries.len());
        self.entries.push((key, memento));
    }

    pub(crate) fn entries(&self) -> &[(CellKey, Memento)] {
        &self.entries
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.index_by_key.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct MarkerId(pub(crate) u64);

#[derive(Debug, Default)]
struct MarkerIdAllocator {
    next: u64,
}

impl MarkerIdAllocator {
    fn allocate(&mut self) -> MarkerId {
        let id = MarkerId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct CacheMarker {
    pub(crate) id: MarkerId,
    pub(crate) cell: Cell,
    pub(crate) bounds: GeoBounds,
}

/// Live map handles for caches currently in view. Never persisted.
#[derive(Debug, Default)]
pub(crate) struct MarkerRegistry {
    allocator: MarkerIdAllocator,
    markers: HashMap<CellKey, CacheMarker>,
}

impl MarkerRegistry {
    pub(crate) fn contains(&self, key: &CellKey) -> bool {
        self.markers.contains_key(key)
    }

    /// Returns `None` when the cell already has a marker.
    pub(crate) fn install(&mut self, key: CellKey, bounds: GeoBounds) -> Option<CacheMarker> {
        if self.markers.contains_key(&key) {
            return None;
        }
        let marker = CacheMarker {
            id: self.allocator.allocate(),
            cell: key.cell(),
            bounds,
        };
        self.markers.insert(key, marker);
        Some(marker)
    }

    pub(crate) fn remove(&mut self, key: &CellKey) -> Option<CacheMarker> {
        self.markers.remove(key)
    }

    /// Sorted by cell so listings are stable.
    pub(crate) fn markers(&self) -> Vec<CacheMarker> {
        let mut markers = self.markers.values().copied().collect::<Vec<_>>();
        markers.sort_by_key(|marker| marker.cell);
        markers
    }

    pub(crate) fn len(&self) -> usize {
        self.markers.len()
    }

    pub(crate) fn drain(&mut self) -> Vec<CacheMarker> {
        let mut markers = self
            .markers
            .drain()
            .map(|(_, marker)| marker)
            .collect::<Vec<_>>();
        markers.sort_by_key(|marker| marker.cell);
        markers
    }
}
