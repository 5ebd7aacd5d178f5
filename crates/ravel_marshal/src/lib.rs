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

mod facade;

pub mod convert;
pub mod driver;
pub mod error;
pub mod mapper;
pub mod object;
pub mod refs;

// -----------------------------------------------------------------------------
// Top-level exports

pub use error::{Error, Result};
pub use facade::Ravel;
pub use object::{Obj, obj};
pub use refs::ReferenceMode;
