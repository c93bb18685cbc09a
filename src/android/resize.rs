//! Growing a start element by one attribute record.

use crate::android::chunk::{write_u16_at, write_u32_at, StartElementHeader, ATTRIBUTE_RECORD_SIZE};
use crate::android::error::{AxmlError, AxmlResult};
use log::debug;

/// Slot at which a record with `new_id` keeps the records sorted by resource id.
///
/// Records without a resource id sort after every record that has one, so an
/// id-less attribute always goes last and an id-bearing one goes before the first
/// larger or id-less record.
pub fn insertion_slot(resource_ids: &[Option<u32>], new_id: Option<u32>) -> usize {
    match new_id {
        None => resource_ids.len(),
        Some(new_id) => resource_ids
            .iter()
            .position(|id| id.map_or(true, |id| id > new_id))
            .unwrap_or(resource_ids.len()),
    }
}

/// Opens a zeroed 20-byte record at `insertion_offset` inside `element`.
///
/// Everything from `insertion_offset` to the end of the buffer moves forward by one
/// record, the element's chunk size grows by 20 and its attribute count by one. The
/// id/class/style indices are bumped when the record they name moved.
pub fn grow_start_tag(
    buf: &mut Vec<u8>,
    element: &StartElementHeader,
    insertion_offset: usize,
) -> AxmlResult<()> {
    let block = element.attribute_block_offset();
    if insertion_offset < block
        || insertion_offset > element.attributes_end()
        || (insertion_offset - block) % ATTRIBUTE_RECORD_SIZE != 0
    {
        return Err(AxmlError::malformed(
            insertion_offset,
            format!(
                "insertion point is not a record boundary of the element at {:#x}",
                element.chunk.start
            ),
        ));
    }
    if element.chunk.end() > buf.len() {
        return Err(AxmlError::malformed(
            element.chunk.start,
            "start element extends past end of buffer",
        ));
    }
    let chunk_size = element
        .chunk
        .chunk_size
        .checked_add(ATTRIBUTE_RECORD_SIZE as u32)
        .ok_or_else(|| AxmlError::malformed(element.chunk.start, "chunk size overflow"))?;
    let attribute_count = element
        .attribute_count
        .checked_add(1)
        .ok_or_else(|| AxmlError::malformed(element.chunk.start, "attribute count overflow"))?;
    let slot = (insertion_offset - block) / ATTRIBUTE_RECORD_SIZE;

    buf.splice(insertion_offset..insertion_offset, [0u8; ATTRIBUTE_RECORD_SIZE]);

    // Header fields all sit before the insertion point, so their offsets are unchanged.
    write_u32_at(buf, element.chunk_size_offset(), chunk_size)?;
    write_u16_at(buf, element.attribute_count_offset(), attribute_count)?;
    for (offset, index) in element.special_indices() {
        if index as usize > slot {
            write_u16_at(buf, offset, index + 1)?;
        }
    }
    debug!(
        "Grew start element at {:#x} to {chunk_size} bytes, {attribute_count} attributes (slot {slot})",
        element.chunk.start
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::android::chunk::{AttributeRecord, ChunkHeader};
    use crate::android::document::AxmlDocument;
    use crate::tests::fixtures::{attr, ManifestFixture};

    #[test]
    fn slot_follows_resource_id_order() {
        let ids = [Some(0x0101_0001), Some(0x0101_0003), Some(0x0101_0280), None];
        assert_eq!(insertion_slot(&ids, Some(0x0101_0000)), 0);
        assert_eq!(insertion_slot(&ids, Some(0x0101_0002)), 1);
        assert_eq!(insertion_slot(&ids, Some(0x0101_04ea)), 3);
        assert_eq!(insertion_slot(&ids, None), 4);
        assert_eq!(insertion_slot(&[], Some(0x0101_04ea)), 0);
        assert_eq!(insertion_slot(&[Some(1), Some(2)], Some(3)), 2);
    }

    fn application(document: &AxmlDocument) -> StartElementHeader {
        document
            .cursor()
            .seek_start_tag("application")
            .unwrap()
            .expect("application element")
    }

    #[test]
    fn grows_chunk_and_count_and_shifts_tail() {
        let bytes = ManifestFixture::application(vec![
            attr::id("label", 0x0101_0001, "Demo"),
            attr::id("name", 0x0101_0003, "com.example.App"),
        ])
        .build();
        let document = AxmlDocument::from_bytes(&bytes).unwrap();
        let element = application(&document);
        let mut body = document.body().to_vec();
        let tail = body[element.record_offset(1)..].to_vec();

        grow_start_tag(&mut body, &element, element.record_offset(1)).unwrap();

        let grown = StartElementHeader::read(&body, ChunkHeader::read_at(&body, element.chunk.start).unwrap())
            .unwrap();
        assert_eq!(grown.chunk.chunk_size, element.chunk.chunk_size + 20);
        assert_eq!(grown.attribute_count, element.attribute_count + 1);
        assert_eq!(grown.attributes_end(), grown.chunk.end());
        assert_eq!(&body[element.record_offset(1)..element.record_offset(2)], &[0u8; 20]);
        assert_eq!(&body[element.record_offset(2)..], &tail[..]);
        assert_eq!(
            AttributeRecord::read_at(&body, grown.record_offset(0)).unwrap(),
            AttributeRecord::read_at(document.body(), element.record_offset(0)).unwrap()
        );
    }

    #[test]
    fn empty_element_gets_record_right_after_header() {
        let bytes = ManifestFixture::application(vec![]).build();
        let document = AxmlDocument::from_bytes(&bytes).unwrap();
        let element = application(&document);
        assert_eq!(element.attribute_count, 0);
        let mut body = document.body().to_vec();

        grow_start_tag(&mut body, &element, element.attribute_block_offset()).unwrap();

        let grown = StartElementHeader::read(&body, ChunkHeader::read_at(&body, element.chunk.start).unwrap())
            .unwrap();
        assert_eq!(grown.attribute_count, 1);
        assert_eq!(grown.chunk.chunk_size, 56);
    }

    #[test]
    fn bumps_special_indices_behind_the_slot() {
        let bytes = ManifestFixture::application(vec![
            attr::id("label", 0x0101_0001, "Demo"),
            attr::id("name", 0x0101_0003, "com.example.App"),
        ])
        .build();
        let document = AxmlDocument::from_bytes(&bytes).unwrap();
        let element = application(&document);
        let mut body = document.body().to_vec();
        // Pretend `name` (record 1) is the element's id attribute and `label` its style.
        let [(id_offset, _), _, (style_offset, _)] = element.special_indices();
        write_u16_at(&mut body, id_offset, 2).unwrap();
        write_u16_at(&mut body, style_offset, 1).unwrap();
        let element = StartElementHeader::read(&body, element.chunk).unwrap();

        grow_start_tag(&mut body, &element, element.record_offset(1)).unwrap();

        let grown = StartElementHeader::read(&body, ChunkHeader::read_at(&body, element.chunk.start).unwrap())
            .unwrap();
        assert_eq!(grown.id_index, 3);
        assert_eq!(grown.style_index, 1);
        assert_eq!(grown.class_index, 0);
    }

    #[test]
    fn refuses_offsets_off_record_boundaries() {
        let bytes = ManifestFixture::application(vec![attr::id("label", 0x0101_0001, "Demo")])
            .build();
        let document = AxmlDocument::from_bytes(&bytes).unwrap();
        let element = application(&document);
        let mut body = document.body().to_vec();
        let before = body.clone();
        assert!(grow_start_tag(&mut body, &element, element.record_offset(0) + 4).is_err());
        assert!(grow_start_tag(&mut body, &element, element.record_offset(2)).is_err());
        assert!(grow_start_tag(&mut body, &element, element.chunk.start).is_err());
        assert_eq!(body, before);
    }
}
