//! Language front end.
//!
//! Only Go is supported: the checker reads Go sources through tree-sitter and
//! never shells out to the Go toolchain.

pub mod go;

pub use go::{Go, ImportSpec, StructTag};
