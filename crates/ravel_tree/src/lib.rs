#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![no_std]

// -----------------------------------------------------------------------------
// No STD Support

#[cfg(feature = "std")]
extern crate std;

extern crate alloc;

// -----------------------------------------------------------------------------
// Modules

mod node;
mod reader;
mod writer;

pub mod path;

// -----------------------------------------------------------------------------
// Top-level exports

pub use node::{TreeNode, TreeNodeReader, TreeNodeWriter};
pub use reader::TreeReader;
pub use writer::TreeWriter;
