//! Allows reading Java Object Serialization streams, reconstructing the
//! object graph, its class descriptors, and framed primitive data.
//!
//! The stream format is self-describing: items are introduced by a
//! one-byte token, every registerable item (object, string, array, enum
//! constant, class descriptor) is assigned a handle in first-appearance
//! order, and back-references by handle make arbitrary (including
//! cyclic) graphs reconstructible. Primitive payloads travel in
//! length-prefixed block-data frames between object-level tokens.
//!
//! ```no_run
//! use java_read::{ObjectReader, Value};
//!
//! # fn example() -> Result<(), java_read::Error> {
//! let file = std::fs::File::open("payload.bin")?;
//! let mut reader = ObjectReader::new(file)?;
//! let value = reader.read_object()?;
//! if let Value::String(s) = value {
//!     println!("read {s}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Host integration goes through [`ClassResolver`]: binding stream class
//! names to local behavior (custom read hooks, externalizable payload
//! readers, enum interning, object substitution). The default
//! [`ClassRegistry`] materializes any class as a dynamic record, so
//! arbitrary streams decode without prior registration.

pub mod desc;
pub mod error;
pub mod fields;
pub mod resolve;
pub mod token;
pub mod validate;
pub mod value;

mod data;
mod frame;
mod handles;
mod reader;

/// Result type with [`Error`](error::Error) error variant.
pub type Result<T> = std::result::Result<T, error::Error>;

pub use desc::{ClassDesc, DescFlags, FieldDesc, FieldType};
pub use error::Error;
pub use fields::GetField;
pub use reader::{HookInput, ObjectReader};
pub use resolve::{Class, ClassRegistry, ClassResolver, ClassSpec, Primitive};
pub use validate::ValidationFn;
pub use value::{ArrayData, ArrayValue, EnumValue, FieldValue, ObjectValue, PrimValue, Value};
