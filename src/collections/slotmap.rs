/// A vector of values addressed by index, where released indices are handed
/// out again by later inserts. Free slots form a linked list through `head`.
#[derive(Debug)]
pub struct SlotMap<T> {
    head: u32,
    entries: Vec<Result<T, u32>>,
}
impl<T> Default for SlotMap<T> {
    fn default() -> Self {
        Self::new()
    }
}
impl<T> SlotMap<T> {
    pub fn new() -> Self {
        Self {
            head: u32::MAX,
            entries: vec![],
        }
    }
    pub fn get_mut(&mut self, i: usize) -> Option<&mut T> {
        self.entries.get_mut(i).and_then(|r| r.as_mut().ok())
    }
    /// The index the next `insert` will use.
    pub fn next_idx(&self) -> usize {
        if self.head == u32::MAX {
            self.entries.len()
        } else {
            self.head as usize
        }
    }
    pub fn insert(&mut self, value: T) -> usize {
        let id = self.next_idx();
        match self.entries.get_mut(id) {
            Some(slot) => {
                if let Err(next) = core::mem::replace(slot, Ok(value)) {
                    self.head = next;
                }
            }
            None => self.entries.push(Ok(value)),
        }
        id
    }
    pub fn release(&mut self, i: usize) -> Option<T> {
        let slot = self.entries.get_mut(i)?;
        if slot.is_err() {
            return None;
        }
        let value = core::mem::replace(slot, Err(self.head)).ok();
        self.head = i as u32;
        value
    }
}

pub struct Iter<'a, T> {
    entries: core::iter::Enumerate<core::slice::Iter<'a, Result<T, u32>>>,
}
impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (usize, &'a T);
    fn next(&mut self) -> Option<Self::Item> {
        self.entries.find_map(|(i, v)| v.as_ref().ok().map(|v| (i, v)))
    }
}
impl<T> SlotMap<T> {
    /// Occupied slots in index order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter { entries: self.entries.iter().enumerate() }
    }
}
