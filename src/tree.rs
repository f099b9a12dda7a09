//! The mutable, refcounted GVDB tree: the in-memory representation shared by
//! the parser and the writer.
//!
//! The public surface is grounded in `original_source/libdbdconf/inc/
//! libdbdconf/gvdb.h`'s `dbd_table_*`/`dbd_item_*` functions (including the
//! keyed list elements of `GVariantListElement{key,item}`, which is why
//! list entries carry a key here too, not just table entries). The backing
//! representation departs from the teacher (`gvdb-rs` has no single mutable
//! tree at all: `read::File`/`HashTable` are zero-copy and immutable,
//! `write::HashTableBuilder` is write-only) and instead uses `Rc<RefCell<_>>`
//! the way the teacher's own `write::Item`/`write::Chunk` graph links
//! children, with one addition: the parent edge is a `Weak`, not an `Rc`, so
//! the child-count bookkeeping below can walk upward without holding the
//! tree together via a reference cycle.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::error::{Error, Result};
use crate::variant::Variant;

/// The four node kinds a GVDB item can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemType {
    None,
    Variant,
    Table,
    List,
}

#[derive(Debug)]
enum Tag {
    None,
    Variant(Variant),
    Table(TableData),
    List(ListData),
}

#[derive(Debug, Default)]
struct TableData {
    entries: Vec<(String, Item)>,
    index: HashMap<String, usize>,
}

#[derive(Debug, Default)]
struct ListData {
    entries: Vec<(String, Item)>,
}

struct ItemInner {
    tag: Tag,
    parent: Option<Weak<RefCell<ItemInner>>>,
    /// Number of descendant leaves, not counting into nested tables (a
    /// nested table is opaque to its parent's count; a nested list
    /// contributes its own count recursively). See `propagate_delta`.
    child_count: usize,
}

/// A handle to a node in the tree. Cloning an `Item` is a refcount bump, the
/// same as `dbd_item_ref`; dropping the last clone is `dbd_item_unref`.
#[derive(Clone)]
pub struct Item(Rc<RefCell<ItemInner>>);

impl Item {
    fn new(tag: Tag) -> Self {
        Item(Rc::new(RefCell::new(ItemInner {
            tag,
            parent: None,
            child_count: 0,
        })))
    }

    /// A freshly created, untyped (`None`) item with no parent.
    pub fn new_empty() -> Self {
        Self::new(Tag::None)
    }

    /// A freshly created, empty table.
    pub fn new_table() -> Self {
        Self::new(Tag::Table(TableData::default()))
    }

    /// A freshly created, empty list.
    pub fn new_list() -> Self {
        Self::new(Tag::List(ListData::default()))
    }

    /// Matches `dbd_item_ref`: bump the refcount by cloning the handle.
    pub fn item_ref(&self) -> Item {
        self.clone()
    }

    /// Matches `dbd_item_unref`: drop this handle. A no-op beyond normal
    /// `Drop` semantics -- documented for call-site parity with the C API.
    pub fn item_unref(self) {
        drop(self)
    }

    pub fn get_type(&self) -> ItemType {
        match &self.0.borrow().tag {
            Tag::None => ItemType::None,
            Tag::Variant(_) => ItemType::Variant,
            Tag::Table(_) => ItemType::Table,
            Tag::List(_) => ItemType::List,
        }
    }

    /// Same object identity as `dbd_item_ref`/`unref` give you via a raw
    /// pointer: two `Item`s compare equal here iff they share one node.
    pub fn ptr_eq(&self, other: &Item) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn parent_item(&self) -> Option<Item> {
        self.0.borrow().parent.as_ref().and_then(Weak::upgrade).map(Item)
    }

    pub fn has_parent(&self) -> bool {
        self.0.borrow().parent.is_some()
    }

    /// Number of leaves this node contributes to an ancestor's count: 1 for
    /// a leaf/table, the list's own `child_count` plus 1 (for the slot the
    /// list itself occupies) if it is a list.
    fn count_contribution(&self) -> usize {
        match &self.0.borrow().tag {
            Tag::List(_) => self.0.borrow().child_count + 1,
            _ => 1,
        }
    }

    /// Walk upward from `parent`, adding `delta` to every ancestor `List`'s
    /// count, stopping (after one final addition) at the first ancestor
    /// that is not a list -- i.e. a `Table` absorbs the delta but does not
    /// forward it further up. Mirrors `dbd_item_set_parent` in
    /// `private_gvdb_parse.h`.
    fn propagate_delta(parent: &Item, delta: i64) {
        let mut walk = Some(parent.clone());
        while let Some(node) = walk {
            let is_list = matches!(node.0.borrow().tag, Tag::List(_));
            {
                let mut inner = node.0.borrow_mut();
                inner.child_count = apply_delta(inner.child_count, delta);
            }
            if is_list {
                walk = node.parent_item();
            } else {
                walk = None;
            }
        }
    }

    fn set_parent(&self, parent: &Item) -> Result<()> {
        if self.has_parent() {
            return Err(Error::DuplicateParent);
        }
        let delta = self.count_contribution() as i64;
        self.0.borrow_mut().parent = Some(Rc::downgrade(&parent.0));
        Self::propagate_delta(parent, delta);
        Ok(())
    }

    fn clear_parent_and_propagate(&self) {
        let delta = -(self.count_contribution() as i64);
        if let Some(parent) = self.parent_item() {
            Self::propagate_delta(&parent, delta);
        }
        self.0.borrow_mut().parent = None;
    }

    /// Number of leaves below this node (recursing through nested lists,
    /// opaque across nested tables). Zero for `None`/`Variant` nodes.
    pub fn child_count(&self) -> usize {
        match &self.0.borrow().tag {
            Tag::Table(_) => self.0.borrow().child_count,
            Tag::List(_) => self.0.borrow().child_count,
            _ => 0,
        }
    }

    /// Replace this node's payload with `value`, discarding whatever tag it
    /// held before. Does not touch parent linkage.
    pub fn set_variant(&self, value: Variant) {
        self.0.borrow_mut().tag = Tag::Variant(value);
    }

    pub fn get_variant(&self) -> Result<Variant> {
        match &self.0.borrow().tag {
            Tag::Variant(v) => Ok(v.clone()),
            _ => Err(Error::BadType("item does not hold a variant".into())),
        }
    }

    // -- table operations --------------------------------------------------

    /// Insert or replace `key` in this table with `child`. `child` must not
    /// already have a parent. Replacing an existing key detaches and
    /// returns the old child.
    pub fn table_set(&self, key: &str, child: Item) -> Result<Option<Item>> {
        if key.len() > u16::MAX as usize {
            return Err(Error::KeyTooLong(key.len()));
        }
        child.set_parent(self)?;

        let mut inner = self.0.borrow_mut();
        let Tag::Table(table) = &mut inner.tag else {
            drop(inner);
            child.clear_parent_and_propagate();
            return Err(Error::BadType("item is not a table".into()));
        };

        let old = if let Some(&idx) = table.index.get(key) {
            let (_, old_child) = std::mem::replace(&mut table.entries[idx], (key.to_string(), child));
            Some(old_child)
        } else {
            let idx = table.entries.len();
            table.entries.push((key.to_string(), child));
            table.index.insert(key.to_string(), idx);
            None
        };
        drop(inner);

        if let Some(old) = &old {
            old.clear_parent_and_propagate();
        }
        Ok(old)
    }

    /// Look up `key`, returning an owned handle (a refcount bump) rather
    /// than a borrowed reference, so callers may hold it past further
    /// mutation of this table.
    pub fn table_get(&self, key: &str) -> Result<Item> {
        let inner = self.0.borrow();
        let Tag::Table(table) = &inner.tag else {
            return Err(Error::BadType("item is not a table".into()));
        };
        let &idx = table
            .index
            .get(key)
            .ok_or_else(|| Error::NotFound(format!("no such key: {key}")))?;
        Ok(table.entries[idx].1.clone())
    }

    pub fn table_entries(&self) -> Result<Vec<(String, Item)>> {
        let inner = self.0.borrow();
        let Tag::Table(table) = &inner.tag else {
            return Err(Error::BadType("item is not a table".into()));
        };
        Ok(table.entries.clone())
    }

    pub fn table_unset(&self, key: &str) -> Result<Item> {
        let mut inner = self.0.borrow_mut();
        let Tag::Table(table) = &mut inner.tag else {
            return Err(Error::BadType("item is not a table".into()));
        };
        let idx = *table
            .index
            .get(key)
            .ok_or_else(|| Error::NotFound(format!("no such key: {key}")))?;
        let (_, removed) = table.entries.remove(idx);
        table.index.remove(key);
        for (_, i) in table.index.iter_mut() {
            if *i > idx {
                *i -= 1;
            }
        }
        drop(inner);
        removed.clear_parent_and_propagate();
        Ok(removed)
    }

    // -- list operations -----------------------------------------------------

    /// Replace this node's payload with an empty list.
    pub fn set_list(&self) {
        self.0.borrow_mut().tag = Tag::List(ListData::default());
    }

    pub fn list_append(&self, key: &str, child: Item) -> Result<()> {
        child.set_parent(self)?;
        let mut inner = self.0.borrow_mut();
        let Tag::List(list) = &mut inner.tag else {
            drop(inner);
            child.clear_parent_and_propagate();
            return Err(Error::BadType("item is not a list".into()));
        };
        list.entries.push((key.to_string(), child));
        Ok(())
    }

    /// Convenience wrapper matching `dbd_item_list_append_element`: wrap
    /// `value` in a fresh variant item and append it under `key`.
    pub fn list_append_one(&self, key: &str, value: Variant) -> Result<()> {
        let child = Item::new(Tag::Variant(value));
        self.list_append(key, child)
    }

    pub fn list_get(&self, index: usize) -> Result<(String, Item)> {
        let inner = self.0.borrow();
        let Tag::List(list) = &inner.tag else {
            return Err(Error::BadType("item is not a list".into()));
        };
        list.entries
            .get(index)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("list index {index} out of range")))
    }

    pub fn list_entries(&self) -> Result<Vec<(String, Item)>> {
        let inner = self.0.borrow();
        let Tag::List(list) = &inner.tag else {
            return Err(Error::BadType("item is not a list".into()));
        };
        Ok(list.entries.clone())
    }

    pub fn list_len(&self) -> Result<usize> {
        let inner = self.0.borrow();
        let Tag::List(list) = &inner.tag else {
            return Err(Error::BadType("item is not a list".into()));
        };
        Ok(list.entries.len())
    }

    /// Remove the first element keyed `key` (lookup returns the first
    /// match, per the tree's duplicate-key-tolerant list semantics).
    pub fn list_remove(&self, key: &str) -> Result<Item> {
        let mut inner = self.0.borrow_mut();
        let Tag::List(list) = &mut inner.tag else {
            return Err(Error::BadType("item is not a list".into()));
        };
        let pos = list
            .entries
            .iter()
            .position(|(k, _)| k == key)
            .ok_or_else(|| Error::NotFound(format!("no such list key: {key}")))?;
        let (_, removed) = list.entries.remove(pos);
        drop(inner);
        removed.clear_parent_and_propagate();
        Ok(removed)
    }

    /// Remove every element in `keys`. If `nonexist_cancel` is true and any
    /// key is missing, the list is left completely unchanged (no entries
    /// removed) -- this is the corrected form of the source's
    /// `list_remove_elements`, which freed entries before discovering a
    /// missing key and then re-indexed into a half-built replacement list.
    /// Here nothing is mutated until every key has been located.
    pub fn list_remove_elements(&self, keys: &[String], nonexist_cancel: bool) -> Result<()> {
        let mut inner = self.0.borrow_mut();
        let Tag::List(list) = &mut inner.tag else {
            return Err(Error::BadType("item is not a list".into()));
        };

        let mut positions = Vec::with_capacity(keys.len());
        let mut taken: Vec<usize> = Vec::new();
        for key in keys {
            let pos = list
                .entries
                .iter()
                .enumerate()
                .find(|(i, (k, _))| k == key && !taken.contains(i))
                .map(|(i, _)| i);
            match pos {
                Some(i) => {
                    taken.push(i);
                    positions.push(i);
                }
                None => {
                    if nonexist_cancel {
                        return Err(Error::NotFound(format!("no such list key: {key}")));
                    }
                }
            }
        }

        positions.sort_unstable();
        positions.dedup();
        let mut removed = Vec::with_capacity(positions.len());
        for &pos in positions.iter().rev() {
            removed.push(list.entries.remove(pos));
        }
        drop(inner);
        for (_, child) in removed {
            child.clear_parent_and_propagate();
        }
        Ok(())
    }

    pub fn list_clear(&self) -> Result<()> {
        let mut inner = self.0.borrow_mut();
        let Tag::List(list) = &mut inner.tag else {
            return Err(Error::BadType("item is not a list".into()));
        };
        let removed = std::mem::take(&mut list.entries);
        drop(inner);
        for (_, child) in removed {
            child.clear_parent_and_propagate();
        }
        Ok(())
    }
}

fn apply_delta(count: usize, delta: i64) -> usize {
    if delta >= 0 {
        count + delta as usize
    } else {
        count - (-delta) as usize
    }
}

impl std::fmt::Debug for Item {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Item")
            .field("type", &self.get_type())
            .field("child_count", &self.child_count())
            .finish()
    }
}
