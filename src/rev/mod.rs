//! Asset revisioning: content-addressed filenames and reference rewriting.
//!
//! A production build runs two hashing sub-passes. The first covers the
//! binary assets (images, fonts); the second covers stylesheets and
//! scripts, after their contents have been rewritten against the first
//! sub-pass's manifest (rewriting changes their bytes, so their hashes
//! are only stable afterwards). HTML is rewritten last, against the
//! merge of both sub-passes.

mod hasher;
mod manifest;
mod rewrite;

pub use hasher::{hash_asset, hash_tree, hashed_file_name, is_revved};
pub use manifest::Manifest;
pub use rewrite::{rewrite_file, rewrite_tree};
