use std::collections::HashSet;

use slotmap::SlotMap;

use crate::{Car, CarId};

/// Dense storage of live cars addressed by stable handles.
#[derive(Debug)]
pub struct CarArena {
    slots: SlotMap<CarId, usize>,
    handles: Vec<CarId>,
    cars: Vec<Car>,
}

impl Default for CarArena {
    fn default() -> Self {
        Self::new()
    }
}

impl CarArena {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: SlotMap::with_key(),
            handles: Vec::new(),
            cars: Vec::new(),
        }
    }

    /// Create an arena with reserved capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: SlotMap::with_capacity_and_key(capacity),
            handles: Vec::with_capacity(capacity),
            cars: Vec::with_capacity(capacity),
        }
    }

    /// Number of live cars.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cars.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cars.is_empty()
    }

    /// Iterate over live handles in dense iteration order.
    pub fn iter_handles(&self) -> impl Iterator<Item = CarId> + '_ {
        self.handles.iter().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CarId, &Car)> + '_ {
        self.handles.iter().copied().zip(self.cars.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (CarId, &mut Car)> + '_ {
        self.handles.iter().copied().zip(self.cars.iter_mut())
    }

    /// Returns the dense index for `id`, if present.
    #[must_use]
    pub fn index_of(&self, id: CarId) -> Option<usize> {
        self.slots.get(id).copied()
    }

    #[must_use]
    pub fn contains(&self, id: CarId) -> bool {
        self.slots.contains_key(id)
    }

    #[must_use]
    pub fn get(&self, id: CarId) -> Option<&Car> {
        self.cars.get(self.index_of(id)?)
    }

    #[must_use]
    pub fn get_mut(&mut self, id: CarId) -> Option<&mut Car> {
        let index = self.index_of(id)?;
        self.cars.get_mut(index)
    }

    /// Insert a car and return its handle.
    pub fn insert(&mut self, car: Car) -> CarId {
        let index = self.cars.len();
        self.cars.push(car);
        let id = self.slots.insert(index);
        self.handles.push(id);
        id
    }

    /// Remove `id`, returning the car if it was present. Preserves the
    /// iteration order of the remaining cars.
    pub fn remove(&mut self, id: CarId) -> Option<Car> {
        let index = self.slots.remove(id)?;
        let removed = self.cars.remove(index);
        let removed_handle = self.handles.remove(index);
        debug_assert_eq!(removed_handle, id);
        for (offset, handle) in self.handles[index..].iter().enumerate() {
            if let Some(slot) = self.slots.get_mut(*handle) {
                *slot = index + offset;
            }
        }
        Some(removed)
    }

    /// Remove every car listed in `dead` with a single write-cursor pass.
    ///
    /// Survivors keep their relative order; the removed cars are returned in
    /// iteration order.
    pub fn remove_many(&mut self, dead: &HashSet<CarId>) -> Vec<(CarId, Car)> {
        if dead.is_empty() {
            return Vec::new();
        }
        let mut write = 0;
        let mut removed_order = Vec::new();
        for read in 0..self.handles.len() {
            let id = self.handles[read];
            if dead.contains(&id) {
                self.slots.remove(id);
                removed_order.push(id);
                continue;
            }
            if write != read {
                self.handles.swap(write, read);
                self.cars.swap(write, read);
            }
            if let Some(slot) = self.slots.get_mut(id) {
                *slot = write;
            }
            write += 1;
        }
        let tail_handles = self.handles.split_off(write);
        let tail_cars = self.cars.split_off(write);
        let mut tail: Vec<(CarId, Car)> = tail_handles.into_iter().zip(tail_cars).collect();
        tail.sort_by_key(|(id, _)| {
            removed_order
                .iter()
                .position(|removed| removed == id)
                .unwrap_or(usize::MAX)
        });
        tail
    }

    /// Drop every stored car.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.handles.clear();
        self.cars.clear();
    }
}
