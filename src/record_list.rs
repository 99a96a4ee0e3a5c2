//! RecordList: doubly linked list over a `SlotMap` arena.
//!
//! Each record gets a generational key when pushed; the key stays valid
//! until that record is removed, and a removed key never resolves again even
//! if its arena slot is reused. The links give a walk (`first`/`next`) that
//! keeps working while other records are removed.

use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Permanent index of one record.
    pub struct RecordKey;
}

#[derive(Debug)]
struct Node<R> {
    record: R,
    prev: Option<RecordKey>,
    next: Option<RecordKey>,
}

#[derive(Debug)]
pub(crate) struct RecordList<R> {
    nodes: SlotMap<RecordKey, Node<R>>,
    head: Option<RecordKey>,
    tail: Option<RecordKey>,
}

impl<R> RecordList<R> {
    pub(crate) fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            head: None,
            tail: None,
        }
    }

    pub(crate) fn with_capacity(records: usize) -> Self {
        Self {
            nodes: SlotMap::with_capacity_and_key(records),
            head: None,
            tail: None,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn push_back(&mut self, record: R) -> RecordKey {
        let prev = self.tail;
        let key = self.nodes.insert(Node {
            record,
            prev,
            next: None,
        });
        match prev.and_then(|p| self.nodes.get_mut(p)) {
            Some(node) => node.next = Some(key),
            None => self.head = Some(key),
        }
        self.tail = Some(key);
        key
    }

    pub(crate) fn remove(&mut self, key: RecordKey) -> Option<R> {
        let node = self.nodes.remove(key)?;
        match node.prev.and_then(|p| self.nodes.get_mut(p)) {
            Some(prev) => prev.next = node.next,
            None => self.head = node.next,
        }
        match node.next.and_then(|n| self.nodes.get_mut(n)) {
            Some(next) => next.prev = node.prev,
            None => self.tail = node.prev,
        }
        Some(node.record)
    }

    pub(crate) fn get(&self, key: RecordKey) -> Option<&R> {
        self.nodes.get(key).map(|n| &n.record)
    }

    pub(crate) fn get_mut(&mut self, key: RecordKey) -> Option<&mut R> {
        self.nodes.get_mut(key).map(|n| &mut n.record)
    }

    pub(crate) fn first(&self) -> Option<RecordKey> {
        self.head
    }

    /// Successor of a live record.
    pub(crate) fn next(&self, key: RecordKey) -> Option<RecordKey> {
        self.nodes.get(key)?.next
    }

    /// Records in list (insertion) order.
    pub(crate) fn iter(&self) -> Iter<'_, R> {
        Iter {
            list: self,
            cursor: self.head,
        }
    }

    /// Records in arena order.
    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (RecordKey, &mut R)> {
        self.nodes.iter_mut().map(|(k, n)| (k, &mut n.record))
    }

    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.head = None;
        self.tail = None;
    }
}

pub(crate) struct Iter<'a, R> {
    list: &'a RecordList<R>,
    cursor: Option<RecordKey>,
}

impl<'a, R> Iterator for Iter<'a, R> {
    type Item = (RecordKey, &'a R);

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.cursor?;
        let node = self.list.nodes.get(key)?;
        self.cursor = node.next;
        Some((key, &node.record))
    }
}
