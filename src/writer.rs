//! Lay out a tree's chunks, assign hash-item indices via bucket prefix-sums,
//! and emit a complete GVDB byte image.
//!
//! Grounded in the teacher's `write/file.rs` (`FileWriter`'s chunk queue:
//! `allocate_chunk_with_data`, `align_offset`, draining into one `Vec<u8>`)
//! and `write/hash.rs`'s `add_simple_hash_table`, plus
//! `original_source/libdbdconf/src/private_gvdb_export.h`'s `BucketCounter`
//! for the two-pass, explicit-prefix-sum bucket assignment (the teacher's
//! own `SimpleHashTable` reaches the same bucket ordering via a linked list
//! per bucket rather than a `bucket_starts` array; the prefix-sum form is
//! used here because it's what this crate's invariants are phrased against).

use log::{debug, trace};

use crate::byteview::{
    djb2_hash, GvdbPointer, HashHeader, HashItem, HashItemType, Header, HASH_HEADER_LEN,
    HASH_ITEM_LEN, HEADER_LEN, NO_PARENT,
};
use crate::endian::Endian;
use crate::error::{Error, Result};
use crate::tree::{Item, ItemType};

/// A pre-bloom-filter shift used by all writers in this lineage: the spec
/// stores zero bloom words, so the shift value itself never affects
/// lookups, only the header bytes. Matches the teacher's `HashHeader::new(5, 0, ..)`.
const BLOOM_SHIFT: u32 = 5;

struct Chunk {
    data: Vec<u8>,
    offset: usize,
}

struct Writer {
    offset: usize,
    chunks: Vec<Chunk>,
    byteswap: bool,
}

fn align_up(offset: usize, alignment: usize) -> usize {
    if alignment <= 1 {
        return offset;
    }
    let rem = offset % alignment;
    if rem == 0 {
        offset
    } else {
        offset + (alignment - rem)
    }
}

impl Writer {
    fn new(byteswap: bool) -> Self {
        Self {
            offset: 0,
            chunks: Vec::new(),
            byteswap,
        }
    }

    fn alloc(&mut self, data: Vec<u8>, alignment: usize) -> (usize, GvdbPointer) {
        self.offset = align_up(self.offset, alignment);
        let start = self.offset;
        let end = start + data.len();
        self.offset = end;
        let index = self.chunks.len();
        self.chunks.push(Chunk { data, offset: start });
        (index, GvdbPointer::new(start, end))
    }

    fn alloc_reserved(&mut self, size: usize, alignment: usize) -> (usize, GvdbPointer) {
        self.alloc(vec![0u8; size], alignment)
    }

    fn endian(&self) -> Endian {
        if self.byteswap {
            !Endian::NATIVE
        } else {
            Endian::NATIVE
        }
    }

    fn drain(mut self) -> Result<Vec<u8>> {
        self.chunks.sort_by_key(|c| c.offset);
        let mut out = Vec::with_capacity(self.offset);
        for chunk in &self.chunks {
            if chunk.offset > out.len() {
                let gap = chunk.offset - out.len();
                if gap >= 8 {
                    return Err(Error::InternalLayout(format!(
                        "padding gap of {gap} bytes before chunk at {}",
                        chunk.offset
                    )));
                }
                out.resize(out.len() + gap, 0);
            }
            out.extend_from_slice(&chunk.data);
        }
        Ok(out)
    }
}

/// One entry destined for a single table's flat hash-item array: either a
/// direct child of the table, or a (possibly deeply nested, through other
/// lists) member of a list that is itself a direct or indirect child.
struct FlatEntry {
    key: String,
    item: Item,
    /// Index into the same flat array of this entry's enclosing list, or
    /// `None` if it is a direct (top-level) child of the table.
    parent_slot: Option<usize>,
}

/// Flatten `entries` into `flat`, recursing into list children (but not
/// table children, which get their own hash-table block) and recording
/// each new entry's enclosing-list slot for the `parent_index` field.
fn flatten(entries: Vec<(String, Item)>, parent_slot: Option<usize>, flat: &mut Vec<FlatEntry>) -> Result<()> {
    for (key, item) in entries {
        if key.len() > u16::MAX as usize {
            return Err(Error::KeyTooLong(key.len()));
        }
        let slot = flat.len();
        let is_list = item.get_type() == ItemType::List;
        flat.push(FlatEntry {
            key,
            item: item.clone(),
            parent_slot,
        });
        if is_list {
            flatten(item.list_entries()?, Some(slot), flat)?;
        }
    }
    Ok(())
}

/// Serialize `root` (which must be a `Table`) into a complete GVDB byte image.
pub fn write(root: &Item, byteswap: bool) -> Result<Vec<u8>> {
    if root.get_type() != ItemType::Table {
        return Err(Error::BadType("write root must be a table".into()));
    }

    let mut writer = Writer::new(byteswap);
    let (header_index, _) = writer.alloc_reserved(HEADER_LEN, 1);

    debug!("writing GVDB file, byteswap={byteswap}");
    let root_pointer = write_table(&mut writer, root)?;

    let header = Header {
        signature: if byteswap {
            [
                crate::byteview::SIGNATURE0.swap_bytes(),
                crate::byteview::SIGNATURE1.swap_bytes(),
            ]
        } else {
            [crate::byteview::SIGNATURE0, crate::byteview::SIGNATURE1]
        },
        version: 0,
        options: 0,
        root: root_pointer,
    };
    writer.chunks[header_index].data = header.to_bytes().to_vec();

    writer.drain()
}

fn write_table(writer: &mut Writer, table: &Item) -> Result<GvdbPointer> {
    let mut flat = Vec::new();
    flatten(table.table_entries()?, None, &mut flat)?;

    let n = flat.len();
    let n_buckets = n as u32;
    let size = HASH_HEADER_LEN + 4 * n + HASH_ITEM_LEN * n;
    let (block_index, own_pointer) = writer.alloc_reserved(size, 4);

    // first pass: bucket occupancy counts
    let mut counts = vec![0u32; n];
    let mut buckets = Vec::with_capacity(n);
    for entry in &flat {
        let hash = djb2_hash(&entry.key);
        let bucket = if n_buckets == 0 { 0 } else { hash % n_buckets };
        buckets.push(bucket);
        if n_buckets > 0 {
            counts[bucket as usize] += 1;
        }
    }

    let mut bucket_starts = vec![0u32; n];
    let mut running = 0u32;
    for (i, start) in bucket_starts.iter_mut().enumerate() {
        *start = running;
        running += counts[i];
    }

    // second pass: absolute index assignment
    let mut occupied = vec![0u32; n];
    let mut abs_index = vec![0u32; n];
    let mut written = vec![false; n];
    for (slot, entry) in flat.iter().enumerate() {
        let bucket = buckets[slot] as usize;
        let offset_in_bucket = occupied[bucket];
        occupied[bucket] += 1;
        let index = bucket_starts[bucket] + offset_in_bucket;
        if index as usize >= n || written[index as usize] {
            return Err(Error::InternalLayout(format!(
                "bucket collision assigning hash item for key {:?}",
                entry.key
            )));
        }
        written[index as usize] = true;
        abs_index[slot] = index;
    }

    trace!("table with {n} entries over {n_buckets} buckets");

    {
        let header = HashHeader::new(BLOOM_SHIFT, 0, n_buckets);
        let block = &mut writer.chunks[block_index].data;
        block[0..HASH_HEADER_LEN].copy_from_slice(&header.to_bytes());
        for (i, start) in bucket_starts.iter().enumerate() {
            let off = HASH_HEADER_LEN + i * 4;
            block[off..off + 4].copy_from_slice(&start.to_le_bytes());
        }
    }

    for (slot, entry) in flat.iter().enumerate() {
        let (key_start, key_size) = {
            let (_, key_pointer) = writer.alloc(entry.key.as_bytes().to_vec(), 1);
            (key_pointer.start(), key_pointer.size() as u16)
        };

        let parent_index = match entry.parent_slot {
            None => NO_PARENT,
            Some(parent_slot) => abs_index[parent_slot],
        };

        let (type_char, value_pointer) = match entry.item.get_type() {
            ItemType::Variant => {
                let variant = entry.item.get_variant()?;
                let mut buf = Vec::new();
                variant.store(&mut buf, writer.endian())?;
                let (_, pointer) = writer.alloc(buf, 8);
                (HashItemType::Variant, pointer)
            }
            ItemType::Table => {
                let pointer = write_table(writer, &entry.item)?;
                (HashItemType::Table, pointer)
            }
            ItemType::List => {
                let mut index_bytes = Vec::new();
                for (child_slot, child_entry) in flat.iter().enumerate() {
                    if child_entry.parent_slot == Some(slot) {
                        index_bytes.extend_from_slice(&abs_index[child_slot].to_le_bytes());
                    }
                }
                let (_, pointer) = writer.alloc(index_bytes, 4);
                (HashItemType::List, pointer)
            }
            ItemType::None => {
                return Err(Error::BadType("cannot write a None-tagged node".into()));
            }
        };

        let hash_item = HashItem {
            hash_value: djb2_hash(&entry.key),
            parent: parent_index,
            key_start,
            key_size,
            type_char: type_char.into(),
            value: value_pointer,
        };

        let item_offset = HASH_HEADER_LEN + 4 * n + HASH_ITEM_LEN * abs_index[slot] as usize;
        let block = &mut writer.chunks[block_index].data;
        block[item_offset..item_offset + HASH_ITEM_LEN].copy_from_slice(&hash_item.to_bytes());
    }

    Ok(own_pointer)
}
