//! Recency list over a fixed slot arena.
//
// Links are slot indices instead of pointers, so every operation is O(1)
// and the list can never outlive or alias the slots it orders:
// - push_front: O(1)
// - move_to_front: O(1)
// - unlink: O(1)
// - tail: O(1)

/// Prev/next neighbours of one slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Link {
    prev: Option<usize>,
    next: Option<usize>,
}

/// Doubly linked list of slot indices; head is the most recently used slot.
#[derive(Debug)]
pub struct LRUList {
    head: Option<usize>,
    tail: Option<usize>,
    links: Vec<Link>,
    len: usize,
}

impl LRUList {
    /// Creates an empty list able to order `capacity` slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            head: None,
            tail: None,
            links: vec![Link::default(); capacity],
            len: 0,
        }
    }

    /// Most recently used slot.
    pub fn head(&self) -> Option<usize> {
        self.head
    }

    /// Least recently used slot.
    pub fn tail(&self) -> Option<usize> {
        self.tail
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Reports whether `idx` is currently a member of the list.
    pub fn contains(&self, idx: usize) -> bool {
        self.head == Some(idx) || self.links[idx].prev.is_some()
    }

    /// Slot after `idx` (towards the tail).
    pub fn next(&self, idx: usize) -> Option<usize> {
        self.links[idx].next
    }

    /// Slot before `idx` (towards the head).
    pub fn prev(&self, idx: usize) -> Option<usize> {
        self.links[idx].prev
    }

    /// Links a detached slot in as the new head. An empty list also gets it as tail.
    pub fn push_front(&mut self, idx: usize) {
        debug_assert!(!self.contains(idx), "slot {idx} is already linked");

        self.links[idx] = Link {
            prev: None,
            next: self.head,
        };
        match self.head {
            Some(old) => self.links[old].prev = Some(idx),
            None => self.tail = Some(idx),
        }
        self.head = Some(idx);
        self.len += 1;
    }

    /// Detaches `idx`, repairing head and tail when it was a boundary.
    /// Detaching an unlinked slot is a no-op.
    pub fn unlink(&mut self, idx: usize) {
        if !self.contains(idx) {
            return;
        }
        let Link { prev, next } = self.links[idx];

        match prev {
            Some(p) => self.links[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.links[n].prev = prev,
            None => self.tail = prev,
        }

        self.links[idx] = Link::default();
        self.len -= 1;
        debug_assert_eq!(self.head.is_none(), self.tail.is_none());
    }

    /// Moves `idx` to the head, linking it first if needed.
    pub fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }
        self.unlink(idx);
        self.push_front(idx);
    }

    /// Walks from head to tail.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            list: self,
            cursor: self.head,
            forward: true,
        }
    }

    /// Walks from tail to head.
    pub fn iter_rev(&self) -> Iter<'_> {
        Iter {
            list: self,
            cursor: self.tail,
            forward: false,
        }
    }
}

/// Iterator over slot indices in recency order.
pub struct Iter<'a> {
    list: &'a LRUList,
    cursor: Option<usize>,
    forward: bool,
}

impl Iterator for Iter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let idx = self.cursor?;
        let link = self.list.links[idx];
        self.cursor = if self.forward { link.next } else { link.prev };
        Some(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(list: &LRUList) -> Vec<usize> {
        list.iter().collect()
    }

    #[test]
    fn test_first_push_sets_head_and_tail() {
        let mut list = LRUList::new(4);
        list.push_front(2);

        assert_eq!(list.head(), Some(2));
        assert_eq!(list.tail(), Some(2));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_unlink_boundaries_repairs_head_and_tail() {
        let mut list = LRUList::new(4);
        for idx in 0..4 {
            list.push_front(idx);
        }
        assert_eq!(order(&list), vec![3, 2, 1, 0]);

        list.unlink(3);
        assert_eq!(list.head(), Some(2));
        list.unlink(0);
        assert_eq!(list.tail(), Some(1));
        assert_eq!(order(&list), vec![2, 1]);

        list.unlink(2);
        list.unlink(1);
        assert!(list.is_empty());
        assert_eq!(list.tail(), None);
        assert_eq!(list.len(), 0);
    }

    #[test]
    fn test_move_to_front_from_tail() {
        let mut list = LRUList::new(3);
        for idx in 0..3 {
            list.push_front(idx);
        }
        list.move_to_front(0);

        assert_eq!(order(&list), vec![0, 2, 1]);
        assert_eq!(list.tail(), Some(1));
        assert_eq!(list.iter_rev().collect::<Vec<_>>(), vec![1, 2, 0]);
    }

    #[test]
    fn test_unlink_detached_slot_is_noop() {
        let mut list = LRUList::new(3);
        list.push_front(1);
        list.unlink(0);

        assert_eq!(order(&list), vec![1]);
        assert!(!list.contains(0));
    }
}
