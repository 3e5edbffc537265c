//! Windows map the flat slot numbers a client clicks on onto the inventories
//! behind them.

pub mod inventory;

pub use inventory::{CraftingInventory, Inventory};

use crate::network::Packet;
use crate::registry::Registry;
use crate::types::ItemStack;

/// The player's own inventory window is always open and always id 0.
pub const PLAYER_WINDOW: i8 = 0;
pub const WORKBENCH_INVENTORY_TYPE: i8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Crafting,
    Armor,
    Main,
    Holding,
}

// (region, first slot, one past the last slot)
const PLAYER_LAYOUT: &[(Region, usize, usize)] = &[
    (Region::Crafting, 0, 5),
    (Region::Armor, 5, 9),
    (Region::Main, 9, 36),
    (Region::Holding, 36, 45),
];
const WORKBENCH_LAYOUT: &[(Region, usize, usize)] = &[
    (Region::Crafting, 0, 10),
    (Region::Main, 10, 37),
    (Region::Holding, 37, 46),
];

fn locate(layout: &[(Region, usize, usize)], slot: usize) -> Option<(Region, usize)> {
    layout
        .iter()
        .find(|(_, start, end)| (*start..*end).contains(&slot))
        .map(|&(region, start, _)| (region, slot - start))
}

/// Everything a participant carries.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerInventory {
    pub crafting: CraftingInventory,
    pub armor: Inventory,
    pub main: Inventory,
    pub holding: Inventory,
}
impl Default for PlayerInventory {
    fn default() -> Self {
        Self {
            crafting: CraftingInventory::new(2, 2),
            armor: Inventory::new(4),
            main: Inventory::new(27),
            holding: Inventory::new(9),
        }
    }
}
impl PlayerInventory {
    pub fn new() -> Self {
        Self::default()
    }
    /// Stores `item`, holding bar first. Returns whatever didn't fit.
    pub fn add(&mut self, item: ItemStack, registry: &Registry) -> Option<ItemStack> {
        let rest = self.holding.add(item, registry)?;
        self.main.add(rest, registry)
    }
    pub fn held(&self, holding_slot: usize) -> Option<ItemStack> {
        self.holding.get(holding_slot)
    }
    /// The contents of window 0, in slot order.
    pub fn window_items(&self) -> Vec<Option<ItemStack>> {
        let regions = [self.crafting.inventory(), &self.armor, &self.main, &self.holding];
        regions.iter().flat_map(|inv| inv.slots().iter().copied()).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
enum WindowKind {
    Player,
    Workbench { crafting: CraftingInventory },
}

/// The window a participant currently has open.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    id: i8,
    kind: WindowKind,
}

impl Window {
    pub fn player() -> Self {
        Self { id: PLAYER_WINDOW, kind: WindowKind::Player }
    }
    pub fn workbench(id: i8) -> Self {
        Self { id, kind: WindowKind::Workbench { crafting: CraftingInventory::new(3, 3) } }
    }
    pub fn id(&self) -> i8 {
        self.id
    }
    pub fn is_player(&self) -> bool {
        matches!(self.kind, WindowKind::Player)
    }
    fn layout(&self) -> &'static [(Region, usize, usize)] {
        match self.kind {
            WindowKind::Player => PLAYER_LAYOUT,
            WindowKind::Workbench { .. } => WORKBENCH_LAYOUT,
        }
    }

    /// Applies a click on flat slot `slot`. Returns whether it was accepted;
    /// rejected clicks leave every inventory and the cursor untouched.
    pub fn click(
        &mut self,
        inv: &mut PlayerInventory,
        slot: i16,
        cursor: &mut Option<ItemStack>,
        right_click: bool,
        shift_click: bool,
        registry: &Registry,
    ) -> bool {
        let Ok(flat) = usize::try_from(slot) else {
            log::warn!("rejected click on negative slot {slot} in window {}", self.id);
            return false;
        };
        let Some((region, local)) = locate(self.layout(), flat) else {
            log::debug!("ignored click on slot {slot} past the end of window {}", self.id);
            return false;
        };
        match (region, &mut self.kind) {
            (Region::Crafting, WindowKind::Workbench { crafting }) => {
                crafting.click(local, cursor, right_click, shift_click, registry)
            }
            (Region::Crafting, WindowKind::Player) => {
                inv.crafting.click(local, cursor, right_click, shift_click, registry)
            }
            (Region::Armor, _) => inv.armor.standard_click(local, cursor, right_click, shift_click, registry),
            (Region::Main, _) => inv.main.standard_click(local, cursor, right_click, shift_click, registry),
            (Region::Holding, _) => inv.holding.standard_click(local, cursor, right_click, shift_click, registry),
        }
    }

    /// Contents of every slot of this window, in slot order.
    pub fn items(&self, inv: &PlayerInventory) -> Vec<Option<ItemStack>> {
        match &self.kind {
            WindowKind::Player => inv.window_items(),
            WindowKind::Workbench { crafting } => {
                let regions = [crafting.inventory(), &inv.main, &inv.holding];
                regions.iter().flat_map(|i| i.slots().iter().copied()).collect()
            }
        }
    }

    /// The packet that makes the client show this window, if it isn't the
    /// always-open player window.
    pub fn open_packet(&self) -> Option<Packet> {
        match &self.kind {
            WindowKind::Player => None,
            WindowKind::Workbench { crafting } => Some(Packet::OpenWindow {
                window_id: self.id,
                inventory_type: WORKBENCH_INVENTORY_TYPE,
                title: "Crafting".to_owned(),
                slots: (crafting.len() - 1) as i8,
            }),
        }
    }

    /// Closes the window, moving whatever was left on its crafting grid and
    /// the cursor back into `inv`. Returns the items that had no room.
    pub fn close(
        &mut self,
        inv: &mut PlayerInventory,
        cursor: &mut Option<ItemStack>,
        registry: &Registry,
    ) -> Vec<ItemStack> {
        let mut loose = match &mut self.kind {
            WindowKind::Player => inv.crafting.take_all(),
            WindowKind::Workbench { crafting } => crafting.take_all(),
        };
        loose.extend(cursor.take());
        *self = Window::player();
        loose.into_iter().filter_map(|item| inv.add(item, registry)).collect()
    }
}
