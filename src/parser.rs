//! Walk a GVDB blob's hash-item array and materialize a mutable [`tree::Item`].
//!
//! Grounded in the teacher's `read/hash.rs` (header/bucket/item offset
//! arithmetic), `read/hash_item.rs` (record layout), `read/header.rs`
//! (signature/version check), and `original_source/libdbdconf/src/
//! private_gvdb_parse.h` (`dbd_parse_table_header`, recursive list/table
//! materialization). Where the teacher stays zero-copy and answers queries
//! lazily against the mapped bytes, this module eagerly materializes the
//! whole subtree into owned [`tree::Item`] nodes, because the tree here is
//! mutable and shared with the writer.

use log::{debug, trace};

use crate::byteview::{
    ByteView, GvdbPointer, HashHeader, HashItem, HashItemType, Header, NO_PARENT,
};
use crate::endian::Endian;
use crate::error::{Error, Result};
use crate::tree::Item;
use crate::variant::Variant;

/// Parse a complete GVDB file image, returning its root table.
///
/// `trusted` is forwarded to variant decoding; it never weakens the
/// bounds/alignment checks `byteview::ByteView::deref` performs.
pub fn parse_file(data: &[u8], trusted: bool) -> Result<Item> {
    let header = Header::parse(data)?;
    if header.version != 0 {
        return Err(Error::InvalidHeader(format!(
            "unsupported version {}",
            header.version
        )));
    }
    let byteswap = header.is_byteswap()?;
    let view = ByteView::new(data);
    debug!("parsing GVDB file: {} bytes, byteswap={byteswap}", data.len());
    parse_table(view, byteswap, trusted, header.root)
}

/// Open `path` and `mmap` it into memory rather than reading it into a
/// `Vec<u8>`, then parse it the same way [`parse_file`] does. Materialization
/// copies every key/variant payload out of the mapped bytes into owned
/// [`tree::Item`] nodes before returning, so the mapping is unmapped as soon
/// as this function returns; the caller never holds a reference into it.
///
/// Grounded in the teacher's `read::File::from_file_mmap`.
///
/// # Safety
///
/// Same caveat as the teacher's `from_file_mmap`: if the file is modified or
/// truncated on disk while it is mapped, reading through the mapping is
/// undefined behavior. The caller is responsible for ensuring the file is
/// not concurrently modified for the duration of this call.
#[cfg(feature = "mmap")]
pub unsafe fn parse_file_mmap(path: &std::path::Path, trusted: bool) -> Result<Item> {
    let file = std::fs::File::open(path).map_err(Error::io(path))?;
    let mmap = memmap2::Mmap::map(&file).map_err(Error::io(path))?;
    parse_file(mmap.as_ref(), trusted)
}

/// Parse a single hash-table block at `pointer` into a `Table`-tagged [`Item`].
pub fn parse_table(view: ByteView, byteswap: bool, trusted: bool, pointer: GvdbPointer) -> Result<Item> {
    let block = view.deref(pointer, 4)?;
    let header = HashHeader::parse(block)?;

    let bloom_words_offset = crate::byteview::HASH_HEADER_LEN;
    let bloom_words_len = header.n_bloom_words() as usize * 4;
    let buckets_offset = bloom_words_offset + bloom_words_len;
    let buckets_len = header.n_buckets() as usize * 4;
    let items_offset = buckets_offset + buckets_len;

    if items_offset > block.len() {
        return Err(Error::Truncated(
            "hash table header/bloom/bucket sections exceed block size".into(),
        ));
    }
    let items_len = block.len() - items_offset;
    if items_len % crate::byteview::HASH_ITEM_LEN != 0 {
        return Err(Error::Truncated(
            "hash item section is not a multiple of the item record size".into(),
        ));
    }
    let n_hash_items = items_len / crate::byteview::HASH_ITEM_LEN;

    let mut items = Vec::with_capacity(n_hash_items);
    for i in 0..n_hash_items {
        let start = items_offset + i * crate::byteview::HASH_ITEM_LEN;
        let end = start + crate::byteview::HASH_ITEM_LEN;
        items.push(HashItem::parse(&block[start..end])?);
    }
    trace!("hash table block at {:?}: {n_hash_items} items", pointer);

    let root = Item::new_table();
    for (index, item) in items.iter().enumerate() {
        if item.parent != NO_PARENT {
            continue;
        }
        let Ok(key) = read_key(view, item) else {
            continue;
        };
        match materialize(view, byteswap, trusted, &items, index) {
            Ok(child) => {
                // table_set cannot fail here: `child` is freshly created and
                // unparented, and `root` is freshly created as a table.
                root.table_set(&key, child).ok();
            }
            Err(err) => {
                trace!("dropping corrupt top-level child {key:?}: {err}");
            }
        }
    }

    Ok(root)
}

fn read_key(view: ByteView, item: &HashItem) -> Result<String> {
    let bytes = view.deref(item.key_pointer(), 1)?;
    String::from_utf8(bytes.to_vec()).map_err(|e| Error::Truncated(format!("key is not utf-8: {e}")))
}

/// Materialize the hash item at `index` within `items` (a single table's
/// item array) into a tagged [`Item`], dispatching on `type_char`.
fn materialize(
    view: ByteView,
    byteswap: bool,
    trusted: bool,
    items: &[HashItem],
    index: usize,
) -> Result<Item> {
    let item = items[index];
    let type_char: HashItemType = item.type_char.try_into()?;

    match type_char {
        HashItemType::Variant => {
            let bytes = view.deref(item.value, 8)?;
            let endian = if byteswap { !Endian::NATIVE } else { Endian::NATIVE };
            let variant = Variant::from_bytes(bytes, endian, trusted)?;
            let node = Item::new_empty();
            node.set_variant(variant);
            Ok(node)
        }
        HashItemType::Table => parse_table(view, byteswap, trusted, item.value),
        HashItemType::List => {
            let bytes = view.deref(item.value, 4)?;
            if bytes.len() % 4 != 0 {
                return Err(Error::Truncated("list index array is not u32-aligned".into()));
            }
            let list = Item::new_list();
            for chunk in bytes.chunks_exact(4) {
                let element_index = crate::byteview::read_u32_le(chunk)? as usize;
                if element_index >= items.len() {
                    trace!("skipping out-of-range list index {element_index}");
                    continue;
                }
                let Ok(key) = read_key(view, &items[element_index]) else {
                    continue;
                };
                match materialize(view, byteswap, trusted, items, element_index) {
                    Ok(child) => {
                        list.list_append(&key, child).ok();
                    }
                    Err(err) => {
                        trace!("dropping corrupt list element {key:?}: {err}");
                    }
                }
            }
            Ok(list)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::writer::write;

    #[test]
    fn round_trips_empty_root() {
        let root = Item::new_table();
        let bytes = write(&root, false).unwrap();
        let parsed = parse_file(&bytes, true).unwrap();
        assert_eq!(parsed.child_count(), 0);
    }

    #[test]
    fn truncated_root_pointer_is_rejected() {
        let root = Item::new_table();
        let mut bytes = write(&root, false).unwrap();
        let len = bytes.len() as u32;
        bytes[20..24].copy_from_slice(&(len + 1000).to_le_bytes());
        assert!(matches!(parse_file(&bytes, true), Err(Error::Truncated(_))));
    }

    #[test]
    fn bad_version_is_rejected() {
        let root = Item::new_table();
        let mut bytes = write(&root, false).unwrap();
        bytes[8..12].copy_from_slice(&1u32.to_le_bytes());
        assert!(matches!(parse_file(&bytes, true), Err(Error::InvalidHeader(_))));
    }

    #[cfg(feature = "mmap")]
    #[test]
    fn round_trips_through_mmap() {
        let root = Item::new_table();
        let bytes = write(&root, false).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("test.gvdb");
        std::fs::write(&file_path, &bytes).unwrap();

        let parsed = unsafe { parse_file_mmap(&file_path, true).unwrap() };
        assert_eq!(parsed.child_count(), 0);
    }
}
