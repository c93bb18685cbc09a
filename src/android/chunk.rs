//! Typed views over the chunks of a binary XML buffer.
//!
//! Every view is read from (and written back to) a validated offset. Reads go through
//! `nom`'s little-endian number parsers, writes through bounds-checked slices, and any
//! access outside the buffer becomes [`AxmlError::MalformedChunk`] instead of a panic.

use crate::android::error::{AxmlError, AxmlResult};
use nom::number::complete::{le_u16, le_u32, le_u8};
use nom::sequence::tuple;
use nom::IResult;

pub const RES_STRING_POOL_TYPE: u16 = 0x0001;
pub const RES_XML_TYPE: u16 = 0x0003;
pub const RES_XML_START_NAMESPACE_TYPE: u16 = 0x0100;
pub const RES_XML_END_NAMESPACE_TYPE: u16 = 0x0101;
pub const RES_XML_START_ELEMENT_TYPE: u16 = 0x0102;
pub const RES_XML_END_ELEMENT_TYPE: u16 = 0x0103;
pub const RES_XML_CDATA_TYPE: u16 = 0x0104;
pub const RES_XML_RESOURCE_MAP_TYPE: u16 = 0x0180;

pub const NO_ENTRY_INDEX: u32 = 0xFFFF_FFFF;

pub const CHUNK_HEADER_SIZE: usize = 8;
/// Chunk header plus line number and comment index.
pub const NODE_HEADER_SIZE: u16 = 16;
pub const ATTRIBUTE_EXT_SIZE: usize = 20;
pub const ATTRIBUTE_RECORD_SIZE: usize = 20;

pub const TYPE_NULL: u8 = 0x00;
pub const TYPE_REFERENCE: u8 = 0x01;
pub const TYPE_ATTRIBUTE: u8 = 0x02;
pub const TYPE_STRING: u8 = 0x03;
pub const TYPE_FLOAT: u8 = 0x04;
pub const TYPE_INT_DEC: u8 = 0x10;
pub const TYPE_INT_HEX: u8 = 0x11;
pub const TYPE_INT_BOOLEAN: u8 = 0x12;

/// Packed typed-value header (size 8, res0 0, type string) as it appears on the wire.
pub const STRING_VALUE_HEADER: u32 = 0x0300_0008;

/// Runs `parser` on `buf[offset..]`, mapping any nom failure to a malformed chunk at `offset`.
pub(crate) fn parse_at<'a, O>(
    buf: &'a [u8],
    offset: usize,
    what: &str,
    parser: impl FnOnce(&'a [u8]) -> IResult<&'a [u8], O>,
) -> AxmlResult<O> {
    let input = buf.get(offset..).ok_or_else(|| {
        AxmlError::malformed(offset, format!("{what} starts past end of buffer"))
    })?;
    parser(input)
        .map(|(_, out)| out)
        .map_err(|_| AxmlError::malformed(offset, format!("truncated {what}")))
}

pub(crate) fn write_u16_at(buf: &mut [u8], offset: usize, value: u16) -> AxmlResult<()> {
    write_bytes_at(buf, offset, &value.to_le_bytes())
}

pub(crate) fn write_u32_at(buf: &mut [u8], offset: usize, value: u32) -> AxmlResult<()> {
    write_bytes_at(buf, offset, &value.to_le_bytes())
}

fn write_bytes_at(buf: &mut [u8], offset: usize, bytes: &[u8]) -> AxmlResult<()> {
    let end = offset
        .checked_add(bytes.len())
        .ok_or_else(|| AxmlError::malformed(offset, "write offset overflow"))?;
    let target = buf
        .get_mut(offset..end)
        .ok_or_else(|| AxmlError::malformed(offset, "write past end of buffer"))?;
    target.copy_from_slice(bytes);
    Ok(())
}

pub(crate) fn write_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

pub(crate) fn write_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

pub(crate) fn align_to_four(buf: &mut Vec<u8>) {
    while buf.len() % 4 != 0 {
        buf.push(0);
    }
}

pub(crate) fn begin_chunk(buf: &mut Vec<u8>, chunk_type: u16, header_size: u16) -> usize {
    let start = buf.len();
    write_u16(buf, chunk_type);
    write_u16(buf, header_size);
    write_u32(buf, 0); // placeholder for chunk size
    start
}

pub(crate) fn finalize_chunk(buf: &mut Vec<u8>, chunk_start: usize) -> AxmlResult<()> {
    align_to_four(buf);
    let size = u32::try_from(buf.len() - chunk_start)
        .map_err(|_| AxmlError::malformed(chunk_start, "chunk larger than 4 GiB"))?;
    write_u32_at(buf, chunk_start + 4, size)
}

fn chunk_header_fields(input: &[u8]) -> IResult<&[u8], (u16, u16, u32)> {
    tuple((le_u16, le_u16, le_u32))(input)
}

fn node_fields(input: &[u8]) -> IResult<&[u8], (u32, u32)> {
    tuple((le_u32, le_u32))(input)
}

#[allow(clippy::type_complexity)]
fn attribute_ext_fields(input: &[u8]) -> IResult<&[u8], (u32, u32, u16, u16, u16, u16, u16, u16)> {
    tuple((le_u32, le_u32, le_u16, le_u16, le_u16, le_u16, le_u16, le_u16))(input)
}

fn attribute_record_fields(input: &[u8]) -> IResult<&[u8], (u32, u32, u32, u16, u8, u8, u32)> {
    tuple((le_u32, le_u32, le_u32, le_u16, le_u8, le_u8, le_u32))(input)
}

/// The `(type, headerSize, chunkSize)` triple every chunk starts with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkHeader {
    pub chunk_type: u16,
    pub header_size: u16,
    pub chunk_size: u32,
    /// Offset of the header within the buffer it was read from.
    pub start: usize,
}

impl ChunkHeader {
    /// Reads the header at `start` and checks that the whole chunk lies inside `buf`.
    pub fn read_at(buf: &[u8], start: usize) -> AxmlResult<Self> {
        let (chunk_type, header_size, chunk_size) =
            parse_at(buf, start, "chunk header", chunk_header_fields)?;
        if (header_size as usize) < CHUNK_HEADER_SIZE || chunk_size < header_size as u32 {
            return Err(AxmlError::malformed(
                start,
                format!("invalid chunk sizing (header {header_size}, chunk {chunk_size})"),
            ));
        }
        let end = start
            .checked_add(chunk_size as usize)
            .ok_or_else(|| AxmlError::malformed(start, "chunk size overflow"))?;
        if end > buf.len() {
            return Err(AxmlError::malformed(
                start,
                format!(
                    "chunk of {chunk_size} bytes extends past end of buffer ({} bytes)",
                    buf.len()
                ),
            ));
        }
        Ok(ChunkHeader {
            chunk_type,
            header_size,
            chunk_size,
            start,
        })
    }

    pub fn body_start(&self) -> usize {
        self.start + self.header_size as usize
    }

    pub fn end(&self) -> usize {
        self.start + self.chunk_size as usize
    }
}

/// Header and attribute extension of a `RES_XML_START_ELEMENT_TYPE` chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StartElementHeader {
    pub chunk: ChunkHeader,
    pub line_number: u32,
    pub comment: u32,
    pub namespace: u32,
    pub name: u32,
    pub attribute_start: u16,
    pub attribute_size: u16,
    pub attribute_count: u16,
    /// 1-based position of the `id` attribute, 0 when absent. Same for class and style.
    pub id_index: u16,
    pub class_index: u16,
    pub style_index: u16,
}

impl StartElementHeader {
    pub fn read(buf: &[u8], chunk: ChunkHeader) -> AxmlResult<Self> {
        if chunk.chunk_type != RES_XML_START_ELEMENT_TYPE {
            return Err(AxmlError::malformed(
                chunk.start,
                format!("expected start element chunk, found type {:#06x}", chunk.chunk_type),
            ));
        }
        if chunk.header_size < NODE_HEADER_SIZE {
            return Err(AxmlError::malformed(
                chunk.start,
                "start element header shorter than a node header",
            ));
        }
        let (line_number, comment) =
            parse_at(buf, chunk.start + CHUNK_HEADER_SIZE, "node header", node_fields)?;

        let ext_offset = chunk.body_start();
        if ext_offset + ATTRIBUTE_EXT_SIZE > chunk.end() {
            return Err(AxmlError::malformed(
                ext_offset,
                "attribute extension exceeds start element chunk",
            ));
        }
        let (namespace, name, attribute_start, attribute_size, attribute_count, id_index, class_index, style_index) =
            parse_at(buf, ext_offset, "attribute extension", attribute_ext_fields)?;
        if attribute_size as usize != ATTRIBUTE_RECORD_SIZE {
            return Err(AxmlError::malformed(
                ext_offset,
                format!("unsupported attribute record size {attribute_size}"),
            ));
        }

        let header = StartElementHeader {
            chunk,
            line_number,
            comment,
            namespace,
            name,
            attribute_start,
            attribute_size,
            attribute_count,
            id_index,
            class_index,
            style_index,
        };
        if header.attribute_block_offset() < ext_offset + ATTRIBUTE_EXT_SIZE
            || header.attributes_end() > chunk.end()
        {
            return Err(AxmlError::malformed(
                chunk.start,
                format!(
                    "{attribute_count} attribute records do not fit in a {} byte chunk",
                    chunk.chunk_size
                ),
            ));
        }
        Ok(header)
    }

    pub fn attribute_block_offset(&self) -> usize {
        self.chunk.body_start() + self.attribute_start as usize
    }

    pub fn record_offset(&self, index: usize) -> usize {
        self.attribute_block_offset() + index * ATTRIBUTE_RECORD_SIZE
    }

    pub fn attributes_end(&self) -> usize {
        self.record_offset(self.attribute_count as usize)
    }

    pub(crate) fn chunk_size_offset(&self) -> usize {
        self.chunk.start + 4
    }

    pub(crate) fn attribute_count_offset(&self) -> usize {
        self.chunk.body_start() + 12
    }

    /// Offsets and current values of the id, class and style index fields.
    pub(crate) fn special_indices(&self) -> [(usize, u16); 3] {
        let ext = self.chunk.body_start();
        [
            (ext + 14, self.id_index),
            (ext + 16, self.class_index),
            (ext + 18, self.style_index),
        ]
    }
}

/// The 8-byte `Res_value` carried by every attribute record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TypedValue {
    pub size: u16,
    pub res0: u8,
    pub data_type: u8,
    pub data: u32,
}

impl TypedValue {
    pub fn string(index: u32) -> Self {
        TypedValue {
            size: 8,
            res0: 0,
            data_type: TYPE_STRING,
            data: index,
        }
    }

    /// The size, res0 and type fields packed the way they sit in memory.
    pub fn header_word(&self) -> u32 {
        (self.data_type as u32) << 24 | (self.res0 as u32) << 16 | self.size as u32
    }
}

/// One 20-byte attribute record of a start element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttributeRecord {
    pub namespace: u32,
    pub name: u32,
    pub raw_value: u32,
    pub typed_value: TypedValue,
}

impl AttributeRecord {
    /// A string-valued record whose raw value and typed data both point at `value_index`.
    pub fn string(namespace: u32, name: u32, value_index: u32) -> Self {
        AttributeRecord {
            namespace,
            name,
            raw_value: value_index,
            typed_value: TypedValue::string(value_index),
        }
    }

    pub fn read_at(buf: &[u8], offset: usize) -> AxmlResult<Self> {
        let (namespace, name, raw_value, size, res0, data_type, data) =
            parse_at(buf, offset, "attribute record", attribute_record_fields)?;
        Ok(AttributeRecord {
            namespace,
            name,
            raw_value,
            typed_value: TypedValue {
                size,
                res0,
                data_type,
                data,
            },
        })
    }

    /// Writes all five fields in one bounds-checked copy.
    pub fn write_at(&self, buf: &mut [u8], offset: usize) -> AxmlResult<()> {
        write_bytes_at(buf, offset, &self.to_bytes())
    }

    /// Points both string references at `value_index` and retypes the value as a string.
    pub fn with_string_value(self, value_index: u32) -> Self {
        AttributeRecord {
            raw_value: value_index,
            typed_value: TypedValue::string(value_index),
            ..self
        }
    }

    pub fn to_bytes(&self) -> [u8; ATTRIBUTE_RECORD_SIZE] {
        let mut bytes = [0u8; ATTRIBUTE_RECORD_SIZE];
        bytes[0..4].copy_from_slice(&self.namespace.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.name.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.raw_value.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.typed_value.header_word().to_le_bytes());
        bytes[16..20].copy_from_slice(&self.typed_value.data.to_le_bytes());
        bytes
    }
}
