// MIT/Apache2 License

//! The authoritative set of live windows.

use crate::event::NativeId;

/// An opaque, copyable name for a window opened through the runtime.
///
/// A handle is valid from the return of `open_window` until the return of
/// `close_window`, or until the runtime closes the window at shutdown. Once
/// invalid, the same handle value never names another window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle {
    index: u32,
    generation: u32,
}

struct Slot {
    generation: u32,
    native: Option<NativeId>,
}

/// Arena of window slots plus a reverse map for event attribution.
pub(crate) struct Registry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    by_native: HashMap<NativeId, WindowHandle>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            by_native: HashMap::with_hasher(Default::default()),
        }
    }

    pub(crate) fn insert(&mut self, native: NativeId) -> WindowHandle {
        let handle = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.native = Some(native);
                WindowHandle {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    native: Some(native),
                });
                WindowHandle {
                    index,
                    generation: 0,
                }
            }
        };

        self.by_native.insert(native, handle);
        handle
    }

    /// Unregister a window, returning the native window it named.
    pub(crate) fn remove(&mut self, handle: WindowHandle) -> Option<NativeId> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }

        let native = slot.native.take()?;
        self.by_native.remove(&native);

        // a slot that has used up its generations is retired for good
        if let Some(generation) = slot.generation.checked_add(1) {
            slot.generation = generation;
            self.free.push(handle.index);
        }

        Some(native)
    }

    pub(crate) fn get(&self, handle: WindowHandle) -> Option<NativeId> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.native)
    }

    /// Which live handle, if any, a native window belongs to.
    pub(crate) fn lookup(&self, native: NativeId) -> Option<WindowHandle> {
        self.by_native.get(&native).copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_native.len()
    }

    pub(crate) fn handles(&self) -> Vec<WindowHandle> {
        self.by_native.values().copied().collect()
    }
}

type HashMap<K, V> = hashbrown::HashMap<K, V, core::hash::BuildHasherDefault<rustc_hash::FxHasher>>;

#[cfg(test)]
mod tests {
    use super::Registry;
    use crate::event::NativeId;

    #[test]
    fn closed_handles_are_never_reused() {
        let mut registry = Registry::new();
        let first = registry.insert(NativeId(10));
        assert_eq!(registry.remove(first), Some(NativeId(10)));

        let second = registry.insert(NativeId(10));
        assert_ne!(first, second);
        assert_eq!(registry.get(first), None);
        assert_eq!(registry.get(second), Some(NativeId(10)));
        assert_eq!(registry.lookup(NativeId(10)), Some(second));
    }

    #[test]
    fn removing_twice_is_rejected() {
        let mut registry = Registry::new();
        let handle = registry.insert(NativeId(1));
        assert!(registry.remove(handle).is_some());
        assert!(registry.remove(handle).is_none());
        assert_eq!(registry.lookup(NativeId(1)), None);
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn exhausted_slots_are_retired() {
        let mut registry = Registry::new();
        let handle = registry.insert(NativeId(1));
        registry.slots[0].generation = u32::MAX;
        let handle = super::WindowHandle {
            generation: u32::MAX,
            ..handle
        };

        assert!(registry.remove(handle).is_some());
        let next = registry.insert(NativeId(2));
        assert_ne!(next.index, handle.index);
    }

    #[test]
    fn handles_lists_live_windows() {
        let mut registry = Registry::new();
        let a = registry.insert(NativeId(1));
        let b = registry.insert(NativeId(2));
        registry.remove(a);

        assert_eq!(registry.handles(), vec![b]);
    }
}
