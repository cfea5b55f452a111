//! Provides the recency list used by the [LRUCache](crate::lru::LRUCache).
//!
//! The list is a doubly linked list whose nodes live in a plain vector of slots. Links are slot
//! indices rather than pointers and freed slots are recycled via a free list. Each slot carries a
//! generation which is bumped whenever its entry is removed. A [SlotId] remembers the generation
//! it was created with, so that a handle to an entry which has been evicted (and whose slot has
//! been reused since) never resolves to the wrong entry.

/// A handle to an entry within a [RecencyList].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SlotId {
    index: usize,
    generation: u32,
}

struct Node<K, V> {
    key: K,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

struct Slot<K, V> {
    generation: u32,
    node: Option<Node<K, V>>,
}

/// A doubly linked list of key/value pairs which supports O(1) insertion at the front, O(1)
/// move-to-front and O(1) removal of any entry (especially the last one).
///
/// The front is the most recently used entry, the back is the least recently used one.
pub struct RecencyList<K, V> {
    slots: Vec<Slot<K, V>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl<K, V> RecencyList<K, V> {
    /// Creates an empty list which can store up to **capacity** entries without re-allocating.
    pub fn with_capacity(capacity: usize) -> Self {
        RecencyList {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    /// Returns the number of entries in the list.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Determines if the list contains no entries at all.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts a new entry at the front of the list and returns its handle.
    pub fn push_front(&mut self, key: K, value: V) -> SlotId {
        let node = Node {
            key,
            value,
            prev: None,
            next: self.head,
        };

        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index].node = Some(node);
                index
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                self.slots.len() - 1
            }
        };

        match self.head {
            Some(head) => self.node_mut(head).prev = Some(index),
            None => self.tail = Some(index),
        }
        self.head = Some(index);
        self.len += 1;

        SlotId {
            index,
            generation: self.slots[index].generation,
        }
    }

    /// Returns the key and value stored for the given handle.
    pub fn get(&self, id: SlotId) -> Option<(&K, &V)> {
        self.live(id)
            .and_then(|index| self.slots[index].node.as_ref())
            .map(|node| (&node.key, &node.value))
    }

    /// Returns a mutable reference to the value stored for the given handle.
    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut V> {
        let index = self.live(id)?;
        self.slots[index].node.as_mut().map(|node| &mut node.value)
    }

    /// Moves the entry of the given handle to the front of the list.
    ///
    /// Returns **false** if the handle is stale.
    pub fn move_to_front(&mut self, id: SlotId) -> bool {
        let index = match self.live(id) {
            Some(index) => index,
            None => return false,
        };

        if self.head != Some(index) {
            self.unlink(index);

            let head = self.head;
            {
                let node = self.node_mut(index);
                node.prev = None;
                node.next = head;
            }
            match head {
                Some(head) => self.node_mut(head).prev = Some(index),
                None => self.tail = Some(index),
            }
            self.head = Some(index);
        }

        true
    }

    /// Returns the handle of the least recently used entry.
    pub fn back(&self) -> Option<SlotId> {
        self.tail.map(|index| SlotId {
            index,
            generation: self.slots[index].generation,
        })
    }

    /// Removes and returns the least recently used entry.
    pub fn pop_back(&mut self) -> Option<(K, V)> {
        let id = self.back()?;
        self.remove(id)
    }

    /// Removes the entry of the given handle and frees its slot.
    pub fn remove(&mut self, id: SlotId) -> Option<(K, V)> {
        let index = self.live(id)?;
        self.unlink(index);

        let slot = &mut self.slots[index];
        slot.generation = slot.generation.wrapping_add(1);
        let node = slot.node.take()?;
        self.free.push(index);
        self.len -= 1;

        Some((node.key, node.value))
    }

    /// Removes all entries.
    ///
    /// Note that all handles issued so far become invalid.
    pub fn clear(&mut self) {
        self.free.clear();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.node.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
            self.free.push(index);
        }
        self.head = None;
        self.tail = None;
        self.len = 0;
    }

    /// Iterates over all entries from the most recently used to the least recently used one.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            list: self,
            next: self.head,
            remaining: self.len,
        }
    }

    fn live(&self, id: SlotId) -> Option<usize> {
        match self.slots.get(id.index) {
            Some(slot) if slot.generation == id.generation && slot.node.is_some() => {
                Some(id.index)
            }
            _ => None,
        }
    }

    fn node(&self, index: usize) -> &Node<K, V> {
        match self.slots[index].node.as_ref() {
            Some(node) => node,
            None => unreachable!("A linked slot of a recency list is empty!"),
        }
    }

    fn node_mut(&mut self, index: usize) -> &mut Node<K, V> {
        match self.slots[index].node.as_mut() {
            Some(node) => node,
            None => unreachable!("A linked slot of a recency list is empty!"),
        }
    }

    /// Detaches the node at the given index from its neighbours (and from head / tail).
    fn unlink(&mut self, index: usize) {
        let (prev, next) = {
            let node = self.node(index);
            (node.prev, node.next)
        };

        match prev {
            Some(prev) => self.node_mut(prev).next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.node_mut(next).prev = prev,
            None => self.tail = prev,
        }

        let node = self.node_mut(index);
        node.prev = None;
        node.next = None;
    }

    /// Walks the list in both directions and verifies that all links are consistent.
    #[cfg(test)]
    pub fn assert_links(&self) {
        let mut forward = Vec::new();
        let mut prev = None;
        let mut cursor = self.head;
        while let Some(index) = cursor {
            let node = self.node(index);
            assert_eq!(node.prev, prev, "Broken back link at slot {}", index);
            forward.push(index);
            assert!(forward.len() <= self.len, "Cycle in recency list");
            prev = Some(index);
            cursor = node.next;
        }
        assert_eq!(prev, self.tail);
        assert_eq!(forward.len(), self.len);

        let occupied = self.slots.iter().filter(|slot| slot.node.is_some()).count();
        assert_eq!(occupied, self.len);
        assert_eq!(self.slots.len() - self.free.len(), self.len);
        for index in &self.free {
            assert!(self.slots[*index].node.is_none(), "Free slot {} is occupied", index);
        }
    }
}

/// Iterates over the entries of a [RecencyList] from front to back.
pub struct Iter<'a, K, V> {
    list: &'a RecencyList<K, V>,
    next: Option<usize>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.next?;
        let list = self.list;
        let node = list.node(index);
        self.next = node.next;
        self.remaining -= 1;

        Some((&node.key, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
