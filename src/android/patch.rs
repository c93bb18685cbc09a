//! In-place attribute overwrite and insertion.
//!
//! A patch never re-encodes the element tree. It finds the first start tag with the
//! requested name and then either
//!
//! * points the matching record(s) at a new string (no size changes), or
//! * opens a new 20-byte record at the position that keeps the records sorted by
//!   resource id and fills it in.
//!
//! In both cases every record written references the pool index the value string
//! receives when it is appended, which happens exactly once at the end of the patch.

use crate::android::attributes::{WellKnownAttribute, ANDROID_SCHEMA_URI};
use crate::android::chunk::{AttributeRecord, StartElementHeader, NO_ENTRY_INDEX};
use crate::android::document::AxmlDocument;
use crate::android::error::{AxmlError, AxmlResult};
use crate::android::parser::XmlEvent;
use crate::android::resize::{grow_start_tag, insertion_slot};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the attribute to patch is identified.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeKey {
    /// A platform attribute, matched by the resource id of its name.
    ResourceId(u32),
    /// An attribute matched by its raw name, e.g. `package` on `<manifest>`.
    Name(String),
}

impl AttributeKey {
    fn matches(&self, name: Option<&str>, resource_id: Option<u32>) -> bool {
        match self {
            AttributeKey::ResourceId(id) => resource_id == Some(*id),
            AttributeKey::Name(wanted) => name == Some(wanted.as_str()),
        }
    }
}

impl From<u32> for AttributeKey {
    fn from(value: u32) -> Self {
        AttributeKey::ResourceId(value)
    }
}

impl From<&str> for AttributeKey {
    fn from(value: &str) -> Self {
        AttributeKey::Name(value.to_string())
    }
}

impl From<String> for AttributeKey {
    fn from(value: String) -> Self {
        AttributeKey::Name(value)
    }
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeKey::ResourceId(id) => write!(f, "{id:#010x}"),
            AttributeKey::Name(name) => write!(f, "{name}"),
        }
    }
}

/// What a successful patch did to the document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatchOutcome {
    /// Existing records were repointed; sizes and counts are unchanged.
    Overwritten { records: usize, value_index: u32 },
    /// A record was inserted at `slot` of the element's attribute list.
    Inserted { slot: usize, value_index: u32 },
}

impl PatchOutcome {
    pub fn value_index(&self) -> u32 {
        match self {
            PatchOutcome::Overwritten { value_index, .. } => *value_index,
            PatchOutcome::Inserted { value_index, .. } => *value_index,
        }
    }
}

/// The element a patch targets, captured so the cursor's borrow can end before mutation.
struct TargetElement {
    header: StartElementHeader,
    resource_ids: Vec<Option<u32>>,
    matches: Vec<usize>,
}

enum NameRef {
    Existing(u32),
    /// Plain name new to the pool.
    Append(String),
    /// Platform attribute whose name is not in the resource map yet.
    Map { name: &'static str, resource_id: u32 },
}

/// Everything an insert needs, resolved before the document is touched.
struct InsertPlan {
    namespace: u32,
    name: NameRef,
    resource_id: Option<u32>,
}

pub struct AttributePatcher<'a> {
    document: &'a mut AxmlDocument,
    reuse_pooled_values: bool,
}

impl<'a> AttributePatcher<'a> {
    pub fn new(document: &'a mut AxmlDocument) -> Self {
        AttributePatcher {
            document,
            reuse_pooled_values: false,
        }
    }

    /// Point records at an existing equal pool string instead of appending a copy.
    pub fn reuse_pooled_values(mut self, reuse: bool) -> Self {
        self.reuse_pooled_values = reuse;
        self
    }

    /// Sets `key` on the first `<element>` to the string `value`.
    pub fn set_attribute(
        &mut self,
        element: &str,
        key: &AttributeKey,
        value: &str,
    ) -> AxmlResult<PatchOutcome> {
        let target = self.locate(element, key)?;
        let reused = if self.reuse_pooled_values {
            self.document.string_pool().find(value)
        } else {
            None
        };

        if target.matches.is_empty() {
            let plan = self.plan_insert(key)?;
            self.insert(element, key, target, plan, value, reused)
        } else {
            self.overwrite(element, key, &target, value, reused)
        }
    }

    fn locate(&self, element: &str, key: &AttributeKey) -> AxmlResult<TargetElement> {
        let mut cursor = self.document.cursor();
        loop {
            match cursor.next()? {
                XmlEvent::EndDocument => {
                    return Err(AxmlError::ElementNotFound {
                        element: element.to_string(),
                    })
                }
                XmlEvent::StartTag if cursor.name() == Some(element) => {
                    let header = *cursor
                        .start_element()
                        .ok_or_else(|| AxmlError::malformed(0, "start tag without header"))?;
                    let count = cursor.attribute_count();
                    let resource_ids = (0..count)
                        .map(|i| cursor.attribute_name_resource(i))
                        .collect::<Vec<_>>();
                    let matches = (0..count)
                        .filter(|&i| key.matches(cursor.attribute_name(i), resource_ids[i]))
                        .collect();
                    return Ok(TargetElement {
                        header,
                        resource_ids,
                        matches,
                    });
                }
                _ => {}
            }
        }
    }

    fn overwrite(
        &mut self,
        element: &str,
        key: &AttributeKey,
        target: &TargetElement,
        value: &str,
        reused: Option<u32>,
    ) -> AxmlResult<PatchOutcome> {
        if target.matches.len() > 1 {
            warn!(
                "<{element}> carries {} `{key}` attributes; rewriting all of them",
                target.matches.len()
            );
        }
        let value_index = reused.unwrap_or_else(|| self.document.string_pool().next_index());
        let body = self.document.body_mut();
        for &index in &target.matches {
            let offset = target.header.record_offset(index);
            AttributeRecord::read_at(body, offset)?
                .with_string_value(value_index)
                .write_at(body, offset)?;
        }
        self.commit_value(value, value_index, reused.is_some())?;
        debug!("Overwrote `{key}` on <{element}> with pool string {value_index}");
        Ok(PatchOutcome::Overwritten {
            records: target.matches.len(),
            value_index,
        })
    }

    fn plan_insert(&self, key: &AttributeKey) -> AxmlResult<InsertPlan> {
        let pool = self.document.string_pool();
        let (name, resource_id) = match key {
            AttributeKey::ResourceId(id) => match self.document.name_index_for_resource(*id) {
                Some(name_index) => (NameRef::Existing(name_index), Some(*id)),
                None => {
                    let attribute = WellKnownAttribute::from_resource_id(*id)
                        .ok_or(AxmlError::AttributeNameUnresolved { resource_id: *id })?;
                    let name = NameRef::Map {
                        name: attribute.attribute_name(),
                        resource_id: *id,
                    };
                    (name, Some(*id))
                }
            },
            AttributeKey::Name(name) => match pool.find(name) {
                Some(name_index) => (
                    NameRef::Existing(name_index),
                    self.document.resource_id_of(name_index),
                ),
                None => (NameRef::Append(name.clone()), None),
            },
        };
        // Platform attributes live in the android namespace; plain names in none.
        let namespace = match resource_id {
            Some(_) => pool
                .find(ANDROID_SCHEMA_URI)
                .ok_or(AxmlError::SchemaUriMissing)?,
            None => NO_ENTRY_INDEX,
        };
        Ok(InsertPlan {
            namespace,
            name,
            resource_id,
        })
    }

    fn insert(
        &mut self,
        element: &str,
        key: &AttributeKey,
        mut target: TargetElement,
        plan: InsertPlan,
        value: &str,
        reused: Option<u32>,
    ) -> AxmlResult<PatchOutcome> {
        let name_index = match plan.name {
            NameRef::Existing(index) => index,
            NameRef::Append(name) => self.document.string_pool_mut().append(name),
            NameRef::Map { name, resource_id } => {
                let index = self.document.append_resource_name(name, resource_id)?;
                // The map grew, so the element moved.
                target = self.locate(element, key)?;
                index
            }
        };

        let slot = insertion_slot(&target.resource_ids, plan.resource_id);
        let offset = target.header.record_offset(slot);
        grow_start_tag(self.document.body_mut(), &target.header, offset)?;

        let value_index = reused.unwrap_or_else(|| self.document.string_pool().next_index());
        AttributeRecord::string(plan.namespace, name_index, value_index)
            .write_at(self.document.body_mut(), offset)?;
        self.commit_value(value, value_index, reused.is_some())?;
        debug!(
            "Inserted attribute {name_index} into <{element}> at slot {slot} with pool string {value_index}"
        );
        Ok(PatchOutcome::Inserted { slot, value_index })
    }

    /// Appends the value string unless an existing entry is being reused. The index it
    /// lands on must be the one the records were pointed at.
    fn commit_value(&mut self, value: &str, value_index: u32, reused: bool) -> AxmlResult<()> {
        if reused {
            return Ok(());
        }
        let appended = self.document.string_pool_mut().append(value);
        if appended != value_index {
            return Err(AxmlError::malformed(
                0,
                format!("value landed at pool index {appended} but records point at {value_index}"),
            ));
        }
        Ok(())
    }
}

impl AxmlDocument {
    /// Shorthand for [`AttributePatcher::set_attribute`] with default options.
    pub fn set_attribute(
        &mut self,
        element: &str,
        key: impl Into<AttributeKey>,
        value: &str,
    ) -> AxmlResult<PatchOutcome> {
        AttributePatcher::new(self).set_attribute(element, &key.into(), value)
    }

    /// Reads back the first `key` attribute of the first `<element>`.
    pub fn attribute_value(
        &self,
        element: &str,
        key: impl Into<AttributeKey>,
    ) -> AxmlResult<Option<crate::android::value::ResValue>> {
        let key = key.into();
        let mut cursor = self.cursor();
        if cursor.seek_start_tag(element)?.is_none() {
            return Err(AxmlError::ElementNotFound {
                element: element.to_string(),
            });
        }
        for i in 0..cursor.attribute_count() {
            if key.matches(cursor.attribute_name(i), cursor.attribute_name_resource(i)) {
                return cursor.attribute_value(i);
            }
        }
        Ok(None)
    }
}
