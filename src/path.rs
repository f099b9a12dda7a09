//! Resolve slash-delimited paths against a tree, and render the
//! dump/list/read textual views that ride on top of resolution.
//!
//! Grounded in `original_source/libdbdconf/src/gvdb.c`'s `dbd_table_dump`
//! (section-per-table, INI-like rendering) and `original_source/src/cli.c`'s
//! split between resolving a path and formatting what it finds. No
//! counterpart exists in the teacher crate (it has no path surface at all),
//! so this module is new.

use crate::error::{Error, Result};
use crate::tree::{Item, ItemType};

/// Whether `resolve` is being asked for a directory (table) or a key
/// (variant/list).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Directory,
    Key,
}

/// Resolve `path` against `root`. Never mutates the tree.
pub fn resolve(root: &Item, path: &str, mode: Mode) -> Result<Item> {
    if path.is_empty() {
        return Err(Error::PathSyntax("path is empty".into()));
    }
    if !path.starts_with('/') {
        return Err(Error::PathSyntax(format!("path does not start with '/': {path}")));
    }

    if path == "/" {
        return if mode == Mode::Directory {
            Ok(root.clone())
        } else {
            Err(Error::PathSyntax("key path cannot be the bare root".into()))
        };
    }

    let body = &path[1..];
    let mut segments: Vec<&str> = body.split('/').collect();

    let trailing_empty = segments.last().map(|s| s.is_empty()).unwrap_or(false);
    match mode {
        Mode::Directory => {
            if !trailing_empty {
                return Err(Error::PathSyntax(format!(
                    "directory path must end with '/': {path}"
                )));
            }
            segments.pop();
        }
        Mode::Key => {
            if trailing_empty {
                return Err(Error::PathSyntax(format!(
                    "key path must not end with '/': {path}"
                )));
            }
        }
    }

    if segments.iter().any(|s| s.is_empty()) {
        return Err(Error::PathSyntax(format!("empty path segment in {path}")));
    }

    let mut node = root.clone();
    let (last, head) = segments.split_last().ok_or_else(|| {
        Error::PathSyntax(format!("path has no segments: {path}"))
    })?;

    for segment in head {
        if node.get_type() != ItemType::Table {
            return Err(Error::NotFound(format!(
                "{segment} is not inside a table"
            )));
        }
        node = node.table_get(segment)?;
    }

    if node.get_type() != ItemType::Table {
        return Err(Error::NotFound(format!("{last} is not inside a table")));
    }
    node = node.table_get(last)?;

    match mode {
        Mode::Directory => {
            if node.get_type() != ItemType::Table {
                return Err(Error::NotFound(format!("{path} is not a table")));
            }
        }
        Mode::Key => {
            if !matches!(node.get_type(), ItemType::Variant | ItemType::List) {
                return Err(Error::NotFound(format!(
                    "{path} is not a variant or list"
                )));
            }
        }
    }

    Ok(node)
}

/// Render `node`'s value: a variant prints via the variant library; a list
/// renders as `{"k": v, ...}` with `v` rendered recursively. Nested element
/// values have their single quotes converted to double quotes, matching
/// `dump_section`'s list rendering (both ultimately go through the same
/// dump/read entry point in the original).
fn render_value(node: &Item) -> Result<String> {
    match node.get_type() {
        ItemType::Variant => Ok(node.get_variant()?.print()),
        ItemType::List => {
            let entries = node.list_entries()?;
            let rendered: Vec<String> = entries
                .iter()
                .map(|(key, child)| {
                    let value = render_value(child)?.replace('\'', "\"");
                    Ok(format!("{key:?}: {value}"))
                })
                .collect::<Result<_>>()?;
            Ok(format!("{{{}}}", rendered.join(", ")))
        }
        other => Err(Error::BadType(format!("cannot render node of type {other:?}"))),
    }
}

/// Single-quote `s`, doubling any inner single quotes so the outer
/// single-quoting stays unambiguous.
fn single_quote_doubled(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Resolve `path` as a key path and render its value.
pub fn read(root: &Item, path: &str) -> Result<String> {
    let node = resolve(root, path, Mode::Key)?;
    render_value(&node)
}

/// Resolve `path` as a directory and list its immediate children,
/// newline-joined. Table children get a trailing `/`.
pub fn list(root: &Item, path: &str) -> Result<String> {
    let node = resolve(root, path, Mode::Directory)?;
    let entries = node.table_entries()?;
    let lines: Vec<String> = entries
        .iter()
        .map(|(key, child)| {
            if child.get_type() == ItemType::Table {
                format!("{key}/")
            } else {
                key.clone()
            }
        })
        .collect();
    Ok(lines.join("\n"))
}

/// Resolve `path` as a directory and render every descendant variant/list
/// as an INI-like stream, recursing into sub-tables as further sections.
pub fn dump(root: &Item, path: &str) -> Result<String> {
    let node = resolve(root, path, Mode::Directory)?;
    let mut sections = Vec::new();
    dump_section(&node, normalize_dir(path), &mut sections)?;
    Ok(sections.join("\n\n"))
}

fn normalize_dir(path: &str) -> String {
    if path == "/" {
        "/".to_string()
    } else {
        path.to_string()
    }
}

fn dump_section(table: &Item, path: String, sections: &mut Vec<String>) -> Result<()> {
    let mut lines = vec![format!("[{path}]")];
    let mut subsections = Vec::new();

    for (key, child) in table.table_entries()? {
        match child.get_type() {
            ItemType::Table => {
                let child_path = format!("{path}{key}/");
                subsections.push((child, child_path));
            }
            ItemType::List => {
                let rendered = render_value(&child)?.replace('\'', "\"");
                lines.push(format!("{key}={}", single_quote_doubled(&rendered)));
            }
            ItemType::Variant => {
                lines.push(format!("{key}={}", child.get_variant()?.print()));
            }
            ItemType::None => {}
        }
    }

    sections.push(lines.join("\n"));
    for (child, child_path) in subsections {
        dump_section(&child, child_path, sections)?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::variant::Variant;

    fn string_variant(s: &str) -> Variant {
        let owned: zvariant::OwnedValue = zvariant::Value::from(s).try_to_owned().unwrap();
        Variant::from_owned_value(owned)
    }

    fn int_variant(i: i32) -> Variant {
        let owned: zvariant::OwnedValue = zvariant::Value::from(i).try_to_owned().unwrap();
        Variant::from_owned_value(owned)
    }

    #[test]
    fn path_syntax_errors() {
        let root = Item::new_table();
        assert!(matches!(resolve(&root, "", Mode::Key), Err(Error::PathSyntax(_))));
        assert!(matches!(
            resolve(&root, "no-slash", Mode::Key),
            Err(Error::PathSyntax(_))
        ));
        assert!(matches!(resolve(&root, "/dir", Mode::Directory), Err(Error::PathSyntax(_))));
        assert!(matches!(resolve(&root, "/key/", Mode::Key), Err(Error::PathSyntax(_))));
    }

    #[test]
    fn scenario_s1_read_greeting() {
        let root = Item::new_table();
        let greeting = Item::new_empty();
        greeting.set_variant(string_variant("hello"));
        root.table_set("greeting", greeting).unwrap();

        assert_eq!(read(&root, "/greeting").unwrap(), "'hello'");
    }

    #[test]
    fn scenario_s2_read_fruit_list() {
        let root = Item::new_table();
        let fruits = Item::new_list();
        fruits.list_append_one("a", string_variant("apple")).unwrap();
        fruits.list_append_one("b", string_variant("banana")).unwrap();
        fruits.list_append_one("c", string_variant("cherry")).unwrap();
        root.table_set("fruits", fruits).unwrap();

        let rendered = read(&root, "/fruits").unwrap();
        assert_eq!(rendered, "{\"a\": \"apple\", \"b\": \"banana\", \"c\": \"cherry\"}");
    }

    #[test]
    fn scenario_s3_subtable_navigation() {
        let root = Item::new_table();
        let sub = Item::new_table();
        let n = Item::new_empty();
        n.set_variant(int_variant(42));
        sub.table_set("n", n).unwrap();
        root.table_set("sub", sub).unwrap();

        assert_eq!(list(&root, "/").unwrap(), "sub/");
        assert_eq!(list(&root, "/sub/").unwrap(), "n");
        assert_eq!(read(&root, "/sub/n").unwrap(), "42");
    }

    #[test]
    fn scenario_s6_not_found() {
        let root = Item::new_table();
        assert!(matches!(read(&root, "/nonexistent"), Err(Error::NotFound(_))));
    }
}
