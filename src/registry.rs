//! Block and item type tables.
//!
//! The server treats block behaviour as data: a chunk asks the table whether
//! a block may be dug out or built over, and nothing more.

use crate::types::{BlockId, ItemId};
use std::collections::HashMap;

pub const MAX_STACK_DEFAULT: i8 = 64;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockAttrs {
    pub name: &'static str,
    pub opacity: i8,
    pub destructable: bool,
    pub solid: bool,
    pub replaceable: bool,
    pub attachable: bool,
}

#[derive(Debug, Clone, Default)]
pub struct BlockType {
    pub attrs: BlockAttrs,
    defined: bool,
}

/// Block types indexed by id. Gaps are undefined types.
#[derive(Debug, Clone, Default)]
pub struct BlockTypeList(Vec<BlockType>);

impl BlockTypeList {
    pub fn define(&mut self, id: BlockId, attrs: BlockAttrs) {
        let id = id as usize;
        if self.0.len() <= id {
            self.0.resize(id + 1, BlockType::default());
        }
        self.0[id] = BlockType { attrs, defined: true };
    }
    pub fn get(&self, id: BlockId) -> Option<&BlockType> {
        self.0.get(id as usize).filter(|b| b.defined)
    }
    /// Adds a plain item type for every defined block that has no item type yet.
    pub fn create_block_item_types(&self, items: &mut ItemTypeMap) {
        for (id, block) in self.0.iter().enumerate().filter(|(_, b)| b.defined) {
            items.0.entry(id as ItemId).or_insert_with(|| ItemType {
                id: id as ItemId,
                name: block.attrs.name.to_owned(),
                max_stack: MAX_STACK_DEFAULT,
            });
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemType {
    pub id: ItemId,
    pub name: String,
    pub max_stack: i8,
}

#[derive(Debug, Clone, Default)]
pub struct ItemTypeMap(HashMap<ItemId, ItemType>);

impl ItemTypeMap {
    pub fn insert(&mut self, item: ItemType) {
        self.0.insert(item.id, item);
    }
    pub fn get(&self, id: ItemId) -> Option<&ItemType> {
        self.0.get(&id)
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub mod blocks {
    use crate::types::BlockId;
    pub const AIR: BlockId = 0;
    pub const STONE: BlockId = 1;
    pub const GRASS: BlockId = 2;
    pub const DIRT: BlockId = 3;
    pub const COBBLESTONE: BlockId = 4;
    pub const PLANKS: BlockId = 5;
    pub const BEDROCK: BlockId = 7;
    pub const WATER: BlockId = 9;
    pub const SAND: BlockId = 12;
    pub const GRAVEL: BlockId = 13;
    pub const LOG: BlockId = 17;
    pub const LEAVES: BlockId = 18;
    pub const GLASS: BlockId = 20;
    pub const WORKBENCH: BlockId = 58;
}

/// Everything a chunk or window needs to know about types.
#[derive(Debug, Clone)]
pub struct Registry {
    pub blocks: BlockTypeList,
    pub items: ItemTypeMap,
}
impl Registry {
    pub fn new(blocks: BlockTypeList, mut items: ItemTypeMap) -> Self {
        blocks.create_block_item_types(&mut items);
        Self { blocks, items }
    }
    pub fn block(&self, id: BlockId) -> Option<&BlockAttrs> {
        self.blocks.get(id).map(|b| &b.attrs)
    }
    /// The block an item places, if it is a block item.
    pub fn block_for_item(&self, id: ItemId) -> Option<BlockId> {
        let id = BlockId::try_from(id).ok()?;
        (id != blocks::AIR && self.blocks.get(id).is_some()).then_some(id)
    }
    pub fn max_stack(&self, id: ItemId) -> i8 {
        self.items.get(id).map_or(MAX_STACK_DEFAULT, |item| item.max_stack)
    }
}
impl Default for Registry {
    fn default() -> Self {
        use blocks::*;
        let solid = |name| BlockAttrs {
            name,
            opacity: 15,
            destructable: true,
            solid: true,
            ..Default::default()
        };
        let mut list = BlockTypeList::default();
        list.define(AIR, BlockAttrs { name: "air", replaceable: true, ..Default::default() });
        list.define(STONE, solid("stone"));
        list.define(GRASS, solid("grass"));
        list.define(DIRT, solid("dirt"));
        list.define(COBBLESTONE, solid("cobblestone"));
        list.define(PLANKS, solid("planks"));
        list.define(BEDROCK, BlockAttrs { destructable: false, ..solid("bedrock") });
        list.define(WATER, BlockAttrs { name: "water", opacity: 3, replaceable: true, ..Default::default() });
        list.define(SAND, solid("sand"));
        list.define(GRAVEL, solid("gravel"));
        list.define(LOG, solid("log"));
        list.define(LEAVES, BlockAttrs { opacity: 1, ..solid("leaves") });
        list.define(GLASS, BlockAttrs { opacity: 0, ..solid("glass") });
        list.define(WORKBENCH, solid("workbench"));

        let mut items = ItemTypeMap::default();
        for (id, name) in [(256, "iron_shovel"), (257, "iron_pickaxe"), (258, "iron_axe"), (276, "diamond_sword")] {
            items.insert(ItemType { id, name: name.to_owned(), max_stack: 1 });
        }
        items.insert(ItemType { id: 280, name: "stick".to_owned(), max_stack: MAX_STACK_DEFAULT });
        Self::new(list, items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undefined_and_out_of_range_blocks_are_not_found() {
        let registry = Registry::default();
        assert_eq!(registry.block(blocks::STONE).map(|b| b.name), Some("stone"));
        assert!(registry.block(6).is_none());
        assert!(registry.block(200).is_none());
    }

    #[test]
    fn block_items_do_not_override_existing_items() {
        let mut list = BlockTypeList::default();
        list.define(1, BlockAttrs { name: "stone", ..Default::default() });
        list.define(4, BlockAttrs { name: "cobblestone", ..Default::default() });
        let mut items = ItemTypeMap::default();
        items.insert(ItemType { id: 4, name: "special".into(), max_stack: 8 });
        list.create_block_item_types(&mut items);

        assert_eq!(items.len(), 2);
        assert_eq!(items.get(1).map(|i| i.max_stack), Some(MAX_STACK_DEFAULT));
        assert_eq!(items.get(4).map(|i| i.name.as_str()), Some("special"));
    }

    #[test]
    fn only_block_items_place_blocks() {
        let registry = Registry::default();
        assert_eq!(registry.block_for_item(4), Some(blocks::COBBLESTONE));
        assert_eq!(registry.block_for_item(0), None);
        assert_eq!(registry.block_for_item(276), None);
        assert_eq!(registry.max_stack(276), 1);
        assert_eq!(registry.max_stack(3), 64);
    }
}
