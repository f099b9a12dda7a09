#![no_main]

use libfuzzer_sys::{fuzz_target, Corpus};

fn fuzz_item(item: &gvdb::Item, recursion_limit: usize) -> bool {
    let mut keep = false;
    match item.get_type() {
        gvdb::ItemType::Variant => {
            if item.get_variant().is_ok() {
                keep = true;
            }
        }
        gvdb::ItemType::Table => {
            if let Ok(entries) = item.table_entries() {
                for (_, child) in entries {
                    keep = true;
                    if recursion_limit > 0 {
                        keep &= fuzz_item(&child, recursion_limit - 1);
                    }
                }
            }
        }
        gvdb::ItemType::List => {
            if let Ok(entries) = item.list_entries() {
                for (_, child) in entries {
                    keep = true;
                    if recursion_limit > 0 {
                        keep &= fuzz_item(&child, recursion_limit - 1);
                    }
                }
            }
        }
        gvdb::ItemType::None => {}
    }
    keep
}

fuzz_target!(|data: &[u8]| -> Corpus {
    if let Ok(root) = gvdb::parser::parse_file(data, false) {
        if fuzz_item(&root, 16) {
            return Corpus::Keep;
        }
    }

    Corpus::Reject
});
