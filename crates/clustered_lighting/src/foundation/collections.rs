//! Specialized collection types

pub use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Generational handle identifying a light owned by a [`LightRegistry`].
    ///
    /// A handle stays valid for the light's whole lifetime and never aliases a
    /// later light after removal; stale handles simply fail to resolve.
    ///
    /// [`LightRegistry`]: crate::lighting::LightRegistry
    pub struct LightHandle;
}

/// Handle-based arena storing lights by generational key
pub type LightArena<T> = SlotMap<LightHandle, T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removed_handle_does_not_alias_new_entry() {
        let mut arena: LightArena<u32> = LightArena::with_key();
        let first = arena.insert(1);
        arena.remove(first);
        let second = arena.insert(2);

        assert_ne!(first, second);
        assert!(arena.get(first).is_none());
        assert_eq!(arena.get(second), Some(&2));
    }
}
