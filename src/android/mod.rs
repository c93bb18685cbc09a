//! Compiled Android XML (AXML) decoding and in-place attribute patching.

pub mod attributes;
pub mod chunk;
pub mod document;
pub mod editor;
pub mod error;
pub mod parser;
pub mod patch;
pub mod resize;
pub mod serializer;
pub mod string_pool;
pub mod value;

pub use attributes::{WellKnownAttribute, ANDROID_SCHEMA_URI};
pub use document::AxmlDocument;
pub use editor::{EditOptions, ManifestEditor};
pub use error::{AxmlError, AxmlResult};
pub use parser::{XmlCursor, XmlEvent};
pub use patch::{AttributeKey, AttributePatcher, PatchOutcome};
pub use value::ResValue;
