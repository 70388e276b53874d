use crate::types::Handle;

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    // Err links to the next free slot
    value: Result<T, u32>,
}

#[derive(Debug)]
pub struct SlotMap<T> {
    head: u32,
    len: usize,
    entries: Vec<Slot<T>>,
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
            len: 0,
            entries: vec![],
        }
    }
    pub fn len(&self) -> usize {
        self.len
    }
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
    pub fn contains(&self, h: Handle) -> bool {
        self.get(h).is_some()
    }
    pub fn get(&self, h: Handle) -> Option<&T> {
        self.entries.get(h.index())
            .filter(|slot| slot.generation == h.generation)
            .and_then(|slot| slot.value.as_ref().ok())
    }
    pub fn get_mut(&mut self, h: Handle) -> Option<&mut T> {
        self.entries.get_mut(h.index())
            .filter(|slot| slot.generation == h.generation)
            .and_then(|slot| slot.value.as_mut().ok())
    }
    pub fn insert(&mut self, value: T) -> Handle {
        self.len += 1;
        if self.head == u32::MAX {
            let idx = self.entries.len() as u32;
            self.entries.push(Slot { generation: 0, value: Ok(value) });
            Handle { idx, generation: 0 }
        } else {
            let idx = self.head;
            let slot = &mut self.entries[idx as usize];
            self.head = match core::mem::replace(&mut slot.value, Ok(value)) {
                Err(next) => next,
                Ok(_) => unreachable!("corrupted slotmap"),
            };
            Handle { idx, generation: slot.generation }
        }
    }
    pub fn release(&mut self, h: Handle) -> Option<T> {
        let slot = self.entries.get_mut(h.index())
            .filter(|slot| slot.generation == h.generation && slot.value.is_ok())?;
        let value = core::mem::replace(&mut slot.value, Err(self.head)).ok();
        slot.generation = slot.generation.wrapping_add(1);
        self.head = h.idx;
        self.len -= 1;
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn released_handles_stay_dead_after_reuse() {
        let mut map = SlotMap::new();
        let a = map.insert("a");
        assert_eq!(map.release(a), Some("a"));
        let b = map.insert("b");
        assert_eq!(a.index(), b.index());
        assert_eq!(map.get(a), None);
        assert_eq!(map.get(b), Some(&"b"));
        assert_eq!(map.release(a), None);
        assert_eq!(map.len(), 1);
    }
}
