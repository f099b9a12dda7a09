//! Property tests for the universally-quantified claims in spec.md §8: the
//! djb2 hash and bucket-prefix-sum arithmetic, and path-syntax boundary
//! behavior across arbitrary inputs.

use gvdb::byteview::djb2_hash;
use gvdb::path::{resolve, Mode};
use gvdb::tree::Item;
use proptest::prelude::*;

proptest! {
    /// `hash("")` is always 5381 regardless of how the empty string arrives.
    #[test]
    fn empty_string_hash_is_5381(_unused in any::<u8>()) {
        prop_assert_eq!(djb2_hash(""), 5381);
    }

    /// djb2 is a pure function of its bytes: hashing the same string twice
    /// gives the same value, and it never panics on arbitrary UTF-8 input.
    #[test]
    fn djb2_hash_is_deterministic(s in "\\PC*") {
        prop_assert_eq!(djb2_hash(&s), djb2_hash(&s));
    }

    /// Writing a table whose single key is any non-empty, slash-free string
    /// and reading it back by that exact path round-trips.
    #[test]
    fn single_key_round_trips_through_write_and_parse(
        key in "[a-zA-Z0-9_]{1,40}"
    ) {
        let root = Item::new_table();
        let child = Item::new_empty();
        let owned: zvariant::OwnedValue = zvariant::Value::from(7i32).try_to_owned().unwrap();
        child.set_variant(gvdb::variant::Variant::from_owned_value(owned));
        root.table_set(&key, child).unwrap();

        let bytes = gvdb::writer::write(&root, false).unwrap();
        let parsed = gvdb::parser::parse_file(&bytes, true).unwrap();
        let path = format!("/{key}");
        prop_assert_eq!(gvdb::path::read(&parsed, &path).unwrap(), "7");
    }

    /// Any path string lacking a leading slash is rejected with
    /// `PathSyntax`, never panics, never resolves.
    #[test]
    fn path_without_leading_slash_is_always_rejected(s in "[^/]{1,20}") {
        let root = Item::new_table();
        let result = resolve(&root, &s, Mode::Key);
        prop_assert!(matches!(result, Err(gvdb::Error::PathSyntax(_))));
    }
}
