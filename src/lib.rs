//! Read, edit, and write GVDB (GLib variant database) files.
//!
//! GVDB is the memory-mappable binary format `dconf` uses to store
//! hierarchical key/value settings. This crate provides the binary-format
//! parser (bytes → tree), a mutable tree model (variant / table / list
//! nodes with parent linkage and child-count bookkeeping), a hash-indexed
//! writer (tree → bytes), and a path-addressed query surface on top.
//!
//! The tree (`tree::Item`) is the thing you hold onto; `parser::parse` and
//! `writer::write` move between it and bytes, and `path` resolves
//! slash-delimited paths against it for the `dump`/`list`/`read` views.

pub mod byteview;
pub mod endian;
pub mod error;
pub mod parser;
pub mod path;
pub mod service;
pub mod tree;
pub mod variant;
pub mod writer;

pub use endian::Endian;
pub use error::{Error, Result};
pub use tree::{Item, ItemType};
