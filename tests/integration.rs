//! End-to-end coverage across the parser, writer, tree, and path modules.
//!
//! Exercises the quantified invariants, round-trip laws, and boundary
//! behaviors together rather than per-module, since they're properties of
//! the whole pipeline (build a tree -> write -> parse -> compare).

use gvdb::tree::{Item, ItemType};
use gvdb::{parser, path, writer, Error};

#[path = "common/mod.rs"]
mod common;
use common::{build_sample as sample_tree, int_variant, string_variant};

fn assert_tree_eq(a: &Item, b: &Item) {
    assert_eq!(a.get_type(), b.get_type());
    match a.get_type() {
        ItemType::Variant => {
            assert_eq!(a.get_variant().unwrap().print(), b.get_variant().unwrap().print());
        }
        ItemType::Table => {
            let ea = a.table_entries().unwrap();
            let eb = b.table_entries().unwrap();
            let mut ea_sorted = ea.clone();
            let mut eb_sorted = eb.clone();
            ea_sorted.sort_by(|x, y| x.0.cmp(&y.0));
            eb_sorted.sort_by(|x, y| x.0.cmp(&y.0));
            assert_eq!(ea_sorted.len(), eb_sorted.len());
            for ((ka, va), (kb, vb)) in ea_sorted.iter().zip(eb_sorted.iter()) {
                assert_eq!(ka, kb);
                assert_tree_eq(va, vb);
            }
            assert_eq!(a.child_count(), b.child_count());
        }
        ItemType::List => {
            let ea = a.list_entries().unwrap();
            let eb = b.list_entries().unwrap();
            assert_eq!(ea.len(), eb.len());
            for ((ka, va), (kb, vb)) in ea.iter().zip(eb.iter()) {
                assert_eq!(ka, kb);
                assert_tree_eq(va, vb);
            }
            assert_eq!(a.child_count(), b.child_count());
        }
        ItemType::None => {}
    }
}

#[test]
fn write_then_parse_round_trips_structurally() {
    let tree = sample_tree();
    let bytes = writer::write(&tree, false).unwrap();
    let parsed = parser::parse_file(&bytes, true).unwrap();
    assert_tree_eq(&tree, &parsed);
}

#[test]
fn byteswapped_file_round_trips() {
    let tree = sample_tree();
    let bytes = writer::write(&tree, true).unwrap();
    let parsed = parser::parse_file(&bytes, true).unwrap();
    assert_tree_eq(&tree, &parsed);
}

#[test]
fn scenario_read_nested_key() {
    let tree = sample_tree();
    let bytes = writer::write(&tree, false).unwrap();
    let parsed = parser::parse_file(&bytes, true).unwrap();

    assert_eq!(path::read(&parsed, "/greeting").unwrap(), "'hello'");
    assert_eq!(path::read(&parsed, "/sub/answer").unwrap(), "42");
}

#[test]
fn scenario_list_children() {
    let tree = sample_tree();
    let bytes = writer::write(&tree, false).unwrap();
    let parsed = parser::parse_file(&bytes, true).unwrap();

    let mut lines: Vec<&str> = path::list(&parsed, "/").unwrap().lines().collect();
    lines.sort_unstable();
    assert_eq!(lines, vec!["fruits", "greeting", "sub/"]);
}

#[test]
fn scenario_dump_includes_every_key() {
    let tree = sample_tree();
    let bytes = writer::write(&tree, false).unwrap();
    let parsed = parser::parse_file(&bytes, true).unwrap();

    let dump = path::dump(&parsed, "/").unwrap();
    assert!(dump.contains("[/]"));
    assert!(dump.contains("greeting='hello'"));
    assert!(dump.contains("[/sub/]"));
    assert!(dump.contains("answer=42"));
}

#[test]
fn key_length_boundary_65535_succeeds_65536_fails() {
    let root = Item::new_table();
    let ok_key = "k".repeat(65535);
    let item = Item::new_empty();
    item.set_variant(int_variant(1));
    root.table_set(&ok_key, item).unwrap();
    assert!(writer::write(&root, false).is_ok());

    let root2 = Item::new_table();
    let too_long_key = "k".repeat(65536);
    let item2 = Item::new_empty();
    item2.set_variant(int_variant(1));
    root2.table_set(&too_long_key, item2).unwrap();
    assert!(matches!(writer::write(&root2, false), Err(Error::KeyTooLong(65536))));
}

#[test]
fn out_of_range_list_index_is_skipped_on_parse() {
    use gvdb::byteview::{
        GvdbPointer, HashHeader, HashItem, HashItemType, Header, HASH_HEADER_LEN, HASH_ITEM_LEN,
        HEADER_LEN, NO_PARENT, SIGNATURE0, SIGNATURE1,
    };

    // A single top-level hash item, a `List` whose one-element index array
    // points past the end of the (empty) item table. The parser must
    // materialize an empty list rather than erroring.
    let block_size = HASH_HEADER_LEN + 4 + HASH_ITEM_LEN;
    let block_start = HEADER_LEN;
    let block_end = block_start + block_size;

    let key_start = block_end;
    let key = b"x";
    let key_end = key_start + key.len();

    let list_array_start = (key_end + 3) / 4 * 4;
    let list_array_end = list_array_start + 4;

    let hash_item = HashItem {
        hash_value: gvdb::byteview::djb2_hash("x"),
        parent: NO_PARENT,
        key_start: key_start as u32,
        key_size: key.len() as u16,
        type_char: HashItemType::List.into(),
        value: GvdbPointer::new(list_array_start, list_array_end),
    };

    let mut bytes = vec![0u8; list_array_end];

    let header = Header {
        signature: [SIGNATURE0, SIGNATURE1],
        version: 0,
        options: 0,
        root: GvdbPointer::new(block_start, block_end),
    };
    bytes[0..HEADER_LEN].copy_from_slice(&header.to_bytes());

    let hash_header = HashHeader::new(5, 0, 1);
    bytes[block_start..block_start + HASH_HEADER_LEN].copy_from_slice(&hash_header.to_bytes());
    bytes[block_start + HASH_HEADER_LEN..block_start + HASH_HEADER_LEN + 4]
        .copy_from_slice(&0u32.to_le_bytes());
    let item_offset = block_start + HASH_HEADER_LEN + 4;
    bytes[item_offset..item_offset + HASH_ITEM_LEN].copy_from_slice(&hash_item.to_bytes());

    bytes[key_start..key_end].copy_from_slice(key);
    bytes[list_array_start..list_array_end].copy_from_slice(&9999u32.to_le_bytes());

    let parsed = parser::parse_file(&bytes, true).unwrap();
    let list = parsed.table_get("x").unwrap();
    assert_eq!(list.list_len().unwrap(), 0);
}

#[test]
fn resolve_never_mutates_the_tree() {
    let tree = sample_tree();
    let before = tree.child_count();
    let _ = path::read(&tree, "/greeting");
    let _ = path::list(&tree, "/sub/");
    let _ = path::dump(&tree, "/");
    let _ = path::read(&tree, "/nonexistent");
    assert_eq!(tree.child_count(), before);
}

#[test]
fn list_remove_elements_rolls_back_on_missing_key() {
    let list = Item::new_list();
    list.list_append_one("a", string_variant("apple")).unwrap();
    list.list_append_one("b", string_variant("banana")).unwrap();

    let result = list.list_remove_elements(
        &["a".to_string(), "nonexistent".to_string()],
        true,
    );
    assert!(result.is_err());
    assert_eq!(list.list_len().unwrap(), 2);
}

#[test]
fn hash_reference_vectors() {
    assert_eq!(gvdb::byteview::djb2_hash(""), 5381);
    assert_eq!(gvdb::byteview::djb2_hash("abc"), 193485963);
}
