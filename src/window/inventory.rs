use crate::registry::Registry;
use crate::types::ItemStack;

/// A fixed row of item slots.
#[derive(Debug, Clone, PartialEq)]
pub struct Inventory {
    slots: Vec<Option<ItemStack>>,
}

impl Inventory {
    pub fn new(size: usize) -> Self {
        Self { slots: vec![None; size] }
    }
    pub fn len(&self) -> usize {
        self.slots.len()
    }
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
    pub fn get(&self, slot: usize) -> Option<ItemStack> {
        self.slots.get(slot).copied().flatten()
    }
    pub fn set(&mut self, slot: usize, item: Option<ItemStack>) {
        if let Some(s) = self.slots.get_mut(slot) {
            *s = item;
        }
    }
    pub fn slots(&self) -> &[Option<ItemStack>] {
        &self.slots
    }

    /// The usual pick up / put down behaviour of a storage slot.
    ///
    /// Left click takes the whole stack into an empty cursor, puts the whole
    /// cursor into an empty slot, tops up a matching stack or swaps. Right
    /// click takes half, puts down one, or swaps. Shift clicks behave like
    /// plain clicks.
    pub fn standard_click(
        &mut self,
        slot: usize,
        cursor: &mut Option<ItemStack>,
        right_click: bool,
        _shift_click: bool,
        registry: &Registry,
    ) -> bool {
        let Some(content) = self.slots.get_mut(slot) else {
            return false;
        };
        match (content.take(), cursor.take()) {
            (None, None) => return false,
            (Some(mut held), None) => {
                if right_click && held.count > 1 {
                    let taken = (held.count + 1) / 2;
                    held.count -= taken;
                    *cursor = Some(ItemStack { count: taken, ..held });
                    *content = Some(held);
                } else {
                    *cursor = Some(held);
                }
            }
            (None, Some(mut carried)) => {
                if right_click && carried.count > 1 {
                    carried.count -= 1;
                    *content = Some(ItemStack { count: 1, ..carried });
                    *cursor = Some(carried);
                } else {
                    *content = Some(carried);
                }
            }
            (Some(mut held), Some(mut carried)) => {
                if !held.stacks_with(&carried) {
                    *content = Some(carried);
                    *cursor = Some(held);
                    return true;
                }
                let room = registry.max_stack(held.id) - held.count;
                let moved = if right_click { 1 } else { room.min(carried.count) };
                if room <= 0 {
                    *content = Some(held);
                    *cursor = Some(carried);
                    return false;
                }
                held.count += moved;
                carried.count -= moved;
                *content = Some(held);
                *cursor = (carried.count > 0).then_some(carried);
            }
        }
        true
    }

    /// Stores as much of `item` as fits, topping up matching stacks first.
    /// Returns what didn't fit.
    pub fn add(&mut self, mut item: ItemStack, registry: &Registry) -> Option<ItemStack> {
        let max = registry.max_stack(item.id);
        let kind = item;
        for held in self.slots.iter_mut().flatten().filter(|held| held.stacks_with(&kind)) {
            let moved = (max - held.count).clamp(0, item.count);
            held.count += moved;
            item.count -= moved;
            if item.count == 0 {
                return None;
            }
        }
        for slot in self.slots.iter_mut().filter(|s| s.is_none()) {
            let moved = item.count.min(max);
            *slot = Some(ItemStack { count: moved, ..item });
            item.count -= moved;
            if item.count == 0 {
                return None;
            }
        }
        Some(item)
    }

    pub fn take_all(&mut self) -> Vec<ItemStack> {
        self.slots.iter_mut().filter_map(Option::take).collect()
    }
}

/// A crafting grid preceded by its output slot. Recipes are someone else's
/// business; the output can only ever be taken from, never filled by hand.
#[derive(Debug, Clone, PartialEq)]
pub struct CraftingInventory {
    inner: Inventory,
}

impl CraftingInventory {
    pub const OUTPUT: usize = 0;

    pub fn new(width: usize, height: usize) -> Self {
        Self { inner: Inventory::new(1 + width * height) }
    }
    pub fn len(&self) -> usize {
        self.inner.len()
    }
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
    pub fn inventory(&self) -> &Inventory {
        &self.inner
    }
    pub fn set(&mut self, slot: usize, item: Option<ItemStack>) {
        self.inner.set(slot, item)
    }

    pub fn click(
        &mut self,
        slot: usize,
        cursor: &mut Option<ItemStack>,
        right_click: bool,
        shift_click: bool,
        registry: &Registry,
    ) -> bool {
        if slot != Self::OUTPUT {
            return self.inner.standard_click(slot, cursor, right_click, shift_click, registry);
        }
        let Some(output) = self.inner.get(Self::OUTPUT) else {
            return false;
        };
        match cursor {
            None => *cursor = Some(output),
            Some(carried) => {
                let total = carried.count as i16 + output.count as i16;
                if !carried.stacks_with(&output) || total > registry.max_stack(output.id) as i16 {
                    return false;
                }
                carried.count = total as i8;
            }
        }
        self.inner.set(Self::OUTPUT, None);
        true
    }

    /// Empties the grid, returning what was in it.
    pub fn take_all(&mut self) -> Vec<ItemStack> {
        self.inner.take_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIRT: i16 = 3;
    const SWORD: i16 = 276;

    fn click(inv: &mut Inventory, slot: usize, cursor: &mut Option<ItemStack>, right: bool) -> bool {
        inv.standard_click(slot, cursor, right, false, &Registry::default())
    }

    #[test]
    fn left_click_picks_up_and_puts_down() {
        let mut inv = Inventory::new(3);
        inv.set(0, Some(ItemStack::new(DIRT, 10)));
        let mut cursor = None;
        assert!(click(&mut inv, 0, &mut cursor, false));
        assert_eq!(cursor, Some(ItemStack::new(DIRT, 10)));
        assert!(click(&mut inv, 2, &mut cursor, false));
        assert_eq!(inv.get(2), Some(ItemStack::new(DIRT, 10)));
        assert_eq!(cursor, None);
        assert!(!click(&mut inv, 1, &mut cursor, false));
    }

    #[test]
    fn right_click_splits_and_places_one() {
        let mut inv = Inventory::new(2);
        inv.set(0, Some(ItemStack::new(DIRT, 5)));
        let mut cursor = None;
        assert!(click(&mut inv, 0, &mut cursor, true));
        assert_eq!(cursor.map(|c| c.count), Some(3));
        assert_eq!(inv.get(0).map(|c| c.count), Some(2));
        assert!(click(&mut inv, 1, &mut cursor, true));
        assert_eq!(inv.get(1).map(|c| c.count), Some(1));
        assert_eq!(cursor.map(|c| c.count), Some(2));
    }

    #[test]
    fn matching_stacks_merge_up_to_the_limit() {
        let mut inv = Inventory::new(1);
        inv.set(0, Some(ItemStack::new(DIRT, 60)));
        let mut cursor = Some(ItemStack::new(DIRT, 10));
        assert!(click(&mut inv, 0, &mut cursor, false));
        assert_eq!(inv.get(0).map(|c| c.count), Some(64));
        assert_eq!(cursor.map(|c| c.count), Some(6));
        assert!(!click(&mut inv, 0, &mut cursor, false));
    }

    #[test]
    fn different_items_swap() {
        let mut inv = Inventory::new(1);
        inv.set(0, Some(ItemStack::new(SWORD, 1)));
        let mut cursor = Some(ItemStack::new(DIRT, 4));
        assert!(click(&mut inv, 0, &mut cursor, false));
        assert_eq!(inv.get(0), Some(ItemStack::new(DIRT, 4)));
        assert_eq!(cursor, Some(ItemStack::new(SWORD, 1)));
    }

    #[test]
    fn add_tops_up_before_using_empty_slots() {
        let registry = Registry::default();
        let mut inv = Inventory::new(3);
        inv.set(1, Some(ItemStack::new(DIRT, 60)));
        assert_eq!(inv.add(ItemStack::new(DIRT, 70), &registry), None);
        assert_eq!(inv.get(1).map(|c| c.count), Some(64));
        assert_eq!(inv.get(0).map(|c| c.count), Some(64));
        assert_eq!(inv.get(2).map(|c| c.count), Some(2));
        assert_eq!(inv.add(ItemStack::new(SWORD, 1), &registry), Some(ItemStack::new(SWORD, 1)));
    }

    #[test]
    fn add_returns_what_does_not_fit() {
        let registry = Registry::default();
        let mut inv = Inventory::new(2);
        inv.set(0, Some(ItemStack::new(DIRT, 60)));
        assert_eq!(inv.add(ItemStack::new(DIRT, 70), &registry), Some(ItemStack::new(DIRT, 2)));
        assert_eq!(inv.get(0).map(|c| c.count), Some(64));
        assert_eq!(inv.get(1).map(|c| c.count), Some(64));
    }

    #[test]
    fn add_only_tops_up_identical_stacks() {
        let registry = Registry::default();
        let mut inv = Inventory::new(2);
        let worn = ItemStack { damage: 3, ..ItemStack::new(SWORD, 1) };
        inv.set(0, Some(worn));
        assert_eq!(inv.add(ItemStack::new(SWORD, 1), &registry), None);
        assert_eq!(inv.get(0), Some(worn));
        assert_eq!(inv.get(1), Some(ItemStack::new(SWORD, 1)));
    }

    #[test]
    fn crafting_output_cannot_be_filled() {
        let registry = Registry::default();
        let mut grid = CraftingInventory::new(2, 2);
        let mut cursor = Some(ItemStack::new(DIRT, 1));
        assert!(!grid.click(CraftingInventory::OUTPUT, &mut cursor, false, false, &registry));
        assert!(grid.click(1, &mut cursor, false, false, &registry));
        assert_eq!(cursor, None);

        grid.set(CraftingInventory::OUTPUT, Some(ItemStack::new(5, 4)));
        assert!(grid.click(CraftingInventory::OUTPUT, &mut cursor, false, false, &registry));
        assert_eq!(cursor, Some(ItemStack::new(5, 4)));
        assert_eq!(grid.take_all(), vec![ItemStack::new(DIRT, 1)]);
    }
}
