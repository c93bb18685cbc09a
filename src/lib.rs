//! # axml-patch
//!
//! Patches attributes of a compiled `AndroidManifest.xml` in place, without
//! decompiling it to text and recompiling.
//!
//! The element tree is never rebuilt: an existing attribute record is repointed at a
//! new string, or a new 20-byte record is spliced into the start tag at the position
//! that keeps its attributes sorted by resource id. New strings are appended to the
//! string pool so every existing index stays valid.
//!
//! # Examples
//!
//! ```no_run
//!  use axml_patch::android::ManifestEditor;
//!
//!  let mut editor = ManifestEditor::open("AndroidManifest.xml").unwrap();
//!  editor.set_extract_native_libs(false).unwrap();
//!  editor.set_package_name("com.example.patched").unwrap();
//! ```

pub mod android;
#[cfg(test)]
mod tests;

pub use android::{AttributeKey, AxmlDocument, AxmlError, AxmlResult, EditOptions, ManifestEditor};
