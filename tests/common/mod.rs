//! Shared fixture-building helpers for the scenario tests in
//! `integration.rs`, mirroring the build-then-dump/list/read pattern in
//! `original_source/libdbdconf/test/auto/make_test_data.c` and
//! `dump_list_read.c`.

#![allow(dead_code)]

use gvdb::tree::Item;
use gvdb::variant::Variant;

pub fn string_variant(s: &str) -> Variant {
    let owned: zvariant::OwnedValue = zvariant::Value::from(s).try_to_owned().unwrap();
    Variant::from_owned_value(owned)
}

pub fn int_variant(i: i32) -> Variant {
    let owned: zvariant::OwnedValue = zvariant::Value::from(i).try_to_owned().unwrap();
    Variant::from_owned_value(owned)
}

/// A small table with a string key, a keyed list, and one nested table —
/// enough surface to exercise `dump`/`list`/`read` at every node kind.
pub fn build_sample() -> Item {
    let root = Item::new_table();

    let greeting = Item::new_empty();
    greeting.set_variant(string_variant("hello"));
    root.table_set("greeting", greeting).unwrap();

    let fruits = Item::new_list();
    fruits.list_append_one("a", string_variant("apple")).unwrap();
    fruits.list_append_one("b", string_variant("banana")).unwrap();
    root.table_set("fruits", fruits).unwrap();

    let sub = Item::new_table();
    let answer = Item::new_empty();
    answer.set_variant(int_variant(42));
    sub.table_set("answer", answer).unwrap();
    root.table_set("sub", sub).unwrap();

    root
}
