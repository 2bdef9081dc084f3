// This module provides the typed slot arena that owns every declaration form produced while
// parsing an architecture description. Forms are appended and never freed individually; they
// are addressed through Handle values that carry the slot index and the arena generation at
// the time of allocation. Releasing the arena drops every slot at once and bumps the
// generation, so handles that escaped a previous session are rejected instead of aliasing
// new forms. Interned strings and verbatim code blocks live in the session's bumpalo arena
// instead; this arena only holds the structured forms that need mutation after creation.

//! Generation-checked slot arena.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Typed reference into an [`Arena`].
pub struct Handle<T> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    fn new(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            _marker: PhantomData,
        }
    }

    /// Slot index, stable for the lifetime of the arena generation.
    pub fn index(self) -> usize {
        self.index as usize
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({}@{})", self.index, self.generation)
    }
}

/// Append-only arena released as a single unit.
pub struct Arena<T> {
    slots: Vec<T>,
    generation: u32,
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            generation: 0,
        }
    }

    /// Store a value and return its handle.
    pub fn alloc(&mut self, value: T) -> Handle<T> {
        let index = self.slots.len() as u32;
        self.slots.push(value);
        Handle::new(index, self.generation)
    }

    /// Resolve a handle; stale or foreign handles yield `None`.
    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        if handle.generation != self.generation {
            return None;
        }
        self.slots.get(handle.index())
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        if handle.generation != self.generation {
            return None;
        }
        self.slots.get_mut(handle.index())
    }

    pub fn contains(&self, handle: Handle<T>) -> bool {
        self.get(handle).is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Iterate over every live slot in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> + '_ {
        let generation = self.generation;
        self.slots
            .iter()
            .enumerate()
            .map(move |(i, value)| (Handle::new(i as u32, generation), value))
    }

    /// Drop every slot at once. Outstanding handles become stale.
    pub fn release(&mut self) {
        self.slots.clear();
        self.generation = self.generation.wrapping_add(1);
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for Arena<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("generation", &self.generation)
            .field("len", &self.slots.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_and_get() {
        let mut arena = Arena::new();
        let a = arena.alloc("a");
        let b = arena.alloc("b");

        assert_eq!(arena.get(a), Some(&"a"));
        assert_eq!(arena.get(b), Some(&"b"));
        assert_eq!(arena.len(), 2);
        assert_ne!(a, b);
    }

    #[test]
    fn test_release_invalidates_handles() {
        let mut arena = Arena::new();
        let a = arena.alloc(1u32);
        arena.release();

        assert!(arena.is_empty());
        assert_eq!(arena.get(a), None);

        let b = arena.alloc(2u32);
        assert_eq!(a.index(), b.index());
        assert_eq!(arena.get(a), None);
        assert_eq!(arena.get(b), Some(&2));
    }

    #[test]
    fn test_iteration_order() {
        let mut arena = Arena::new();
        for i in 0..4 {
            arena.alloc(i * 10);
        }
        let values: Vec<_> = arena.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![0, 10, 20, 30]);

        let (h, _) = arena.iter().nth(2).unwrap();
        *arena.get_mut(h).unwrap() = 99;
        assert_eq!(arena.get(h), Some(&99));
    }
}
