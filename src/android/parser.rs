use crate::android::chunk::{
    AttributeRecord, ChunkHeader, StartElementHeader, RES_XML_CDATA_TYPE,
    RES_XML_END_ELEMENT_TYPE, RES_XML_END_NAMESPACE_TYPE, RES_XML_RESOURCE_MAP_TYPE,
    RES_XML_START_ELEMENT_TYPE, RES_XML_START_NAMESPACE_TYPE,
};
use crate::android::document::AxmlDocument;
use crate::android::error::{AxmlError, AxmlResult};
use crate::android::value::ResValue;
use log::warn;

/// Structural events produced by [`XmlCursor::next`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum XmlEvent {
    StartNamespace,
    EndNamespace,
    StartTag,
    EndTag,
    Text,
    EndDocument,
}

/// Pull-style cursor over the body of an [`AxmlDocument`].
///
/// After a [`XmlEvent::StartTag`] the accessors describe that element; after any other
/// event they return `None` or zero.
pub struct XmlCursor<'a> {
    document: &'a AxmlDocument,
    position: usize,
    depth: usize,
    element: Option<StartElementHeader>,
    records: Vec<AttributeRecord>,
}

impl<'a> XmlCursor<'a> {
    pub fn new(document: &'a AxmlDocument) -> Self {
        XmlCursor {
            document,
            position: 0,
            depth: 0,
            element: None,
            records: Vec::new(),
        }
    }

    pub fn next(&mut self) -> AxmlResult<XmlEvent> {
        let body = self.document.body();
        loop {
            self.element = None;
            self.records.clear();
            if self.position >= body.len() {
                return Ok(XmlEvent::EndDocument);
            }
            let chunk = ChunkHeader::read_at(body, self.position)?;
            self.position = chunk.end();
            match chunk.chunk_type {
                RES_XML_START_NAMESPACE_TYPE => return Ok(XmlEvent::StartNamespace),
                RES_XML_END_NAMESPACE_TYPE => return Ok(XmlEvent::EndNamespace),
                RES_XML_START_ELEMENT_TYPE => {
                    let element = StartElementHeader::read(body, chunk)?;
                    self.records = (0..element.attribute_count as usize)
                        .map(|i| AttributeRecord::read_at(body, element.record_offset(i)))
                        .collect::<AxmlResult<_>>()?;
                    self.element = Some(element);
                    self.depth += 1;
                    return Ok(XmlEvent::StartTag);
                }
                RES_XML_END_ELEMENT_TYPE => {
                    self.depth = self.depth.checked_sub(1).ok_or_else(|| {
                        AxmlError::malformed(chunk.start, "end element without matching start")
                    })?;
                    return Ok(XmlEvent::EndTag);
                }
                RES_XML_CDATA_TYPE => return Ok(XmlEvent::Text),
                RES_XML_RESOURCE_MAP_TYPE => {}
                other => {
                    warn!(
                        "Skipping unknown chunk type {other:#06x} at body offset {:#x}",
                        chunk.start
                    );
                }
            }
        }
    }

    /// Advances to the first start tag named `name`; `None` once the document ends.
    pub fn seek_start_tag(&mut self, name: &str) -> AxmlResult<Option<StartElementHeader>> {
        loop {
            match self.next()? {
                XmlEvent::EndDocument => return Ok(None),
                XmlEvent::StartTag if self.name() == Some(name) => return Ok(self.element),
                _ => {}
            }
        }
    }

    /// Nesting depth of elements, counting the current start tag.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn start_element(&self) -> Option<&StartElementHeader> {
        self.element.as_ref()
    }

    pub fn name(&self) -> Option<&'a str> {
        let element = self.element?;
        self.document.string_pool().get(element.name)
    }

    pub fn attribute_count(&self) -> usize {
        self.records.len()
    }

    /// Body offset of the first attribute record of the current start tag.
    pub fn attribute_block_offset(&self) -> Option<usize> {
        self.element.map(|element| element.attribute_block_offset())
    }

    pub fn attribute_record(&self, index: usize) -> Option<&AttributeRecord> {
        self.records.get(index)
    }

    pub fn attribute_name(&self, index: usize) -> Option<&'a str> {
        let record = self.records.get(index)?;
        self.document.string_pool().get(record.name)
    }

    pub fn attribute_namespace(&self, index: usize) -> Option<&'a str> {
        let record = self.records.get(index)?;
        self.document.string_pool().get(record.namespace)
    }

    pub fn attribute_name_resource(&self, index: usize) -> Option<u32> {
        let record = self.records.get(index)?;
        self.document.resource_id_of(record.name)
    }

    pub fn attribute_value(&self, index: usize) -> AxmlResult<Option<ResValue>> {
        self.records
            .get(index)
            .map(|record| ResValue::decode(self.document.string_pool(), record))
            .transpose()
    }

    /// Resource id assigned to the attribute name `raw_name`, if the map has one.
    pub fn resolve_resource_id(&self, raw_name: &str) -> Option<u32> {
        let name_idx = self.document.string_pool().find(raw_name)?;
        self.document.resource_id_of(name_idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fixtures::{attr, FixtureElement, ManifestFixture};

    #[test]
    fn walks_events_in_document_order() {
        let bytes = ManifestFixture::new(
            FixtureElement::new("manifest")
                .attr(attr::raw("package", "com.example"))
                .child(
                    FixtureElement::new("application")
                        .attr(attr::id("label", 0x0101_0001, "Demo"))
                        .child(FixtureElement::new("activity")),
                ),
        )
        .build();
        let document = AxmlDocument::from_bytes(&bytes).unwrap();
        let mut cursor = document.cursor();
        let mut seen = Vec::new();
        loop {
            let event = cursor.next().unwrap();
            let name = cursor.name().map(str::to_string);
            seen.push((event, name, cursor.depth()));
            if event == XmlEvent::EndDocument {
                break;
            }
        }
        assert_eq!(
            seen,
            vec![
                (XmlEvent::StartNamespace, None, 0),
                (XmlEvent::StartTag, Some("manifest".to_string()), 1),
                (XmlEvent::StartTag, Some("application".to_string()), 2),
                (XmlEvent::StartTag, Some("activity".to_string()), 3),
                (XmlEvent::EndTag, None, 2),
                (XmlEvent::EndTag, None, 1),
                (XmlEvent::EndTag, None, 0),
                (XmlEvent::EndNamespace, None, 0),
                (XmlEvent::EndDocument, None, 0),
            ]
        );
        assert_eq!(cursor.next().unwrap(), XmlEvent::EndDocument);
    }

    #[test]
    fn exposes_attributes_of_current_start_tag() {
        let bytes = ManifestFixture::application(vec![
            attr::id("label", 0x0101_0001, "Demo"),
            attr::id_bool("allowBackup", 0x0101_0280, true),
        ])
        .build();
        let document = AxmlDocument::from_bytes(&bytes).unwrap();
        let mut cursor = document.cursor();
        let element = cursor.seek_start_tag("application").unwrap().unwrap();

        assert_eq!(cursor.attribute_count(), 2);
        assert_eq!(cursor.attribute_block_offset(), Some(element.chunk.start + 36));
        assert_eq!(cursor.attribute_name(0), Some("label"));
        assert_eq!(cursor.attribute_name_resource(0), Some(0x0101_0001));
        assert_eq!(
            cursor.attribute_namespace(1),
            Some("http://schemas.android.com/apk/res/android")
        );
        assert_eq!(
            cursor.attribute_value(0).unwrap(),
            Some(ResValue::String("Demo".into()))
        );
        assert_eq!(cursor.attribute_value(1).unwrap(), Some(ResValue::Boolean(true)));
        assert_eq!(cursor.attribute_value(2).unwrap(), None);
        assert_eq!(cursor.resolve_resource_id("allowBackup"), Some(0x0101_0280));
        assert_eq!(cursor.resolve_resource_id("theme"), None);
    }

    #[test]
    fn seek_reports_missing_element() {
        let bytes = ManifestFixture::application(vec![]).build();
        let document = AxmlDocument::from_bytes(&bytes).unwrap();
        assert_eq!(document.cursor().seek_start_tag("service").unwrap(), None);
    }
}
