//! The drivers that walk graphs and documents, applying reference
//! strategies and error context around the converters.

mod data_holder;
mod marshaller;
mod unmarshaller;

pub use data_holder::DataHolder;
pub use marshaller::{MarshalContext, Marshaller};
pub use unmarshaller::{UnmarshalContext, Unmarshaller};
