#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![no_std]

pub use ravel_marshal as marshal;
pub use ravel_tree as tree;
pub use ravel_utils as utils;
