use crate::android::chunk::{
    align_to_four, begin_chunk, finalize_chunk, parse_at, write_u16, write_u32, ChunkHeader,
    NO_ENTRY_INDEX, RES_STRING_POOL_TYPE,
};
use crate::android::error::{AxmlError, AxmlResult};
use bitflags::bitflags;
use log::warn;
use nom::number::complete::le_u32;
use nom::sequence::tuple;
use nom::IResult;

const STRING_POOL_HEADER_SIZE: u16 = 28;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct StringPoolFlags: u32 {
        const SORTED = 0x0000_0001;
        const UTF8 = 0x0000_0100;
    }
}

fn pool_header_fields(input: &[u8]) -> IResult<&[u8], (u32, u32, u32, u32, u32)> {
    tuple((le_u32, le_u32, le_u32, le_u32, le_u32))(input)
}

/// The document's shared string table.
///
/// Indices of existing entries never change: new strings only ever go to the end.
/// Style spans of the original pool are carried through untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StringPool {
    strings: Vec<String>,
    flags: StringPoolFlags,
    style_offsets: Vec<u32>,
    style_data: Vec<u8>,
}

impl StringPool {
    pub fn with_strings(strings: Vec<String>, utf8: bool) -> Self {
        let flags = if utf8 {
            StringPoolFlags::UTF8
        } else {
            StringPoolFlags::empty()
        };
        StringPool {
            strings,
            flags,
            style_offsets: Vec::new(),
            style_data: Vec::new(),
        }
    }

    pub(crate) fn parse(buf: &[u8], header: &ChunkHeader) -> AxmlResult<Self> {
        if header.chunk_type != RES_STRING_POOL_TYPE {
            return Err(AxmlError::malformed(
                header.start,
                format!("expected string pool chunk, found type {:#06x}", header.chunk_type),
            ));
        }
        if header.header_size < STRING_POOL_HEADER_SIZE {
            return Err(AxmlError::malformed(header.start, "string pool header too short"));
        }
        let (string_count, style_count, flags, strings_start, styles_start) =
            parse_at(buf, header.start + 8, "string pool header", pool_header_fields)?;
        let flags = StringPoolFlags::from_bits_retain(flags);
        let chunk_end = header.end();

        let offsets_start = header.body_start();
        let offsets_len = (string_count as usize)
            .checked_add(style_count as usize)
            .and_then(|count| count.checked_mul(4))
            .ok_or_else(|| AxmlError::malformed(header.start, "string count overflow"))?;
        if offsets_start + offsets_len > chunk_end {
            return Err(AxmlError::malformed(
                offsets_start,
                "string pool offsets exceed chunk bounds",
            ));
        }
        let read_offsets = |from: usize, count: u32| -> AxmlResult<Vec<u32>> {
            (0..count as usize)
                .map(|i| parse_at(buf, from + i * 4, "string offset", le_u32))
                .collect()
        };
        let string_offsets = read_offsets(offsets_start, string_count)?;
        let style_offsets = read_offsets(offsets_start + string_count as usize * 4, style_count)?;

        let strings_base = header.start + strings_start as usize;
        let mut strings = Vec::with_capacity(string_count as usize);
        for offset in string_offsets {
            let absolute = strings_base + offset as usize;
            let text = if flags.contains(StringPoolFlags::UTF8) {
                read_utf8_string(buf, absolute, chunk_end)?
            } else {
                read_utf16_string(buf, absolute, chunk_end)?
            };
            strings.push(text);
        }

        let style_data = if style_count > 0 && styles_start != 0 {
            let from = header.start + styles_start as usize;
            buf.get(from..chunk_end)
                .ok_or_else(|| AxmlError::malformed(from, "style data exceeds chunk bounds"))?
                .to_vec()
        } else {
            Vec::new()
        };

        Ok(StringPool {
            strings,
            flags,
            style_offsets,
            style_data,
        })
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn is_utf8(&self) -> bool {
        self.flags.contains(StringPoolFlags::UTF8)
    }

    pub fn flags(&self) -> StringPoolFlags {
        self.flags
    }

    /// The index the next appended string will receive.
    pub fn next_index(&self) -> u32 {
        self.strings.len() as u32
    }

    pub fn get(&self, idx: u32) -> Option<&str> {
        if idx == NO_ENTRY_INDEX {
            return None;
        }
        self.strings.get(idx as usize).map(|s| s.as_str())
    }

    /// Index of the first entry equal to `value`.
    pub fn find(&self, value: &str) -> Option<u32> {
        self.strings
            .iter()
            .position(|s| s == value)
            .map(|idx| idx as u32)
    }

    pub fn append(&mut self, value: impl Into<String>) -> u32 {
        let idx = self.next_index();
        self.strings.push(value.into());
        idx
    }

    /// Encodes the pool as a `RES_STRING_POOL_TYPE` chunk in its original encoding.
    pub fn to_chunk(&self) -> AxmlResult<Vec<u8>> {
        let string_count = self.strings.len() as u32;
        let style_count = self.style_offsets.len() as u32;
        let strings_start =
            STRING_POOL_HEADER_SIZE as u32 + (string_count + style_count) * 4;

        let mut string_data = Vec::new();
        let mut offsets = Vec::with_capacity(self.strings.len());
        for s in &self.strings {
            offsets.push(string_data.len() as u32);
            if self.is_utf8() {
                write_utf8_string(&mut string_data, s)?;
            } else {
                write_utf16_string(&mut string_data, s);
            }
        }
        align_to_four(&mut string_data);

        let styles_start = if style_count > 0 {
            strings_start + string_data.len() as u32
        } else {
            0
        };
        // Appending breaks any ordering the producer promised.
        let flags = self.flags - StringPoolFlags::SORTED;

        let mut chunk = Vec::new();
        let chunk_start = begin_chunk(&mut chunk, RES_STRING_POOL_TYPE, STRING_POOL_HEADER_SIZE);
        write_u32(&mut chunk, string_count);
        write_u32(&mut chunk, style_count);
        write_u32(&mut chunk, flags.bits());
        write_u32(&mut chunk, strings_start);
        write_u32(&mut chunk, styles_start);
        for offset in offsets {
            write_u32(&mut chunk, offset);
        }
        for offset in &self.style_offsets {
            write_u32(&mut chunk, *offset);
        }
        chunk.extend_from_slice(&string_data);
        chunk.extend_from_slice(&self.style_data);
        finalize_chunk(&mut chunk, chunk_start)?;
        Ok(chunk)
    }
}

fn read_utf8_string(data: &[u8], offset: usize, limit: usize) -> AxmlResult<String> {
    let mut cursor = offset;
    // The first length is in UTF-16 units and only matters to Android's own decoder.
    let (_, len_bytes) = read_utf8_length(data, cursor, limit)?;
    cursor += len_bytes;
    let (byte_len, byte_len_size) = read_utf8_length(data, cursor, limit)?;
    cursor += byte_len_size;
    if cursor + byte_len >= limit {
        return Err(AxmlError::malformed(offset, "UTF-8 string exceeds chunk bounds"));
    }
    let slice = &data[cursor..cursor + byte_len];
    match std::str::from_utf8(slice) {
        Ok(text) => Ok(text.to_string()),
        Err(err) => match cesu8::from_java_cesu8(slice) {
            Ok(text) => {
                warn!("String pool entry at {offset:#x} is CESU-8 encoded; decoded leniently");
                Ok(text.into_owned())
            }
            Err(_) => Err(AxmlError::malformed(offset, err.to_string())),
        },
    }
}

fn read_utf16_string(data: &[u8], offset: usize, limit: usize) -> AxmlResult<String> {
    let mut cursor = offset;
    let (char_count, header_bytes) = read_utf16_length(data, cursor, limit)?;
    cursor += header_bytes;
    let byte_len = char_count * 2;
    if cursor + byte_len + 2 > limit {
        return Err(AxmlError::malformed(offset, "UTF-16 string exceeds chunk bounds"));
    }
    let units: Vec<u16> = data[cursor..cursor + byte_len]
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    cursor += byte_len;
    if u16::from_le_bytes([data[cursor], data[cursor + 1]]) != 0 {
        return Err(AxmlError::malformed(offset, "UTF-16 string missing terminator"));
    }
    String::from_utf16(&units).map_err(|err| AxmlError::malformed(offset, err.to_string()))
}

fn read_utf8_length(data: &[u8], offset: usize, limit: usize) -> AxmlResult<(usize, usize)> {
    if offset >= limit {
        return Err(AxmlError::malformed(offset, "invalid UTF-8 length offset"));
    }
    let first = data[offset];
    if (first & 0x80) == 0 {
        Ok((first as usize, 1))
    } else {
        if offset + 1 >= limit {
            return Err(AxmlError::malformed(offset, "truncated UTF-8 length"));
        }
        let second = data[offset + 1];
        let length = (((first & 0x7F) as usize) << 8) | second as usize;
        Ok((length, 2))
    }
}

fn read_utf16_length(data: &[u8], offset: usize, limit: usize) -> AxmlResult<(usize, usize)> {
    if offset + 2 > limit {
        return Err(AxmlError::malformed(offset, "invalid UTF-16 length offset"));
    }
    let first = u16::from_le_bytes([data[offset], data[offset + 1]]);
    if (first & 0x8000) == 0 {
        Ok((first as usize, 2))
    } else {
        if offset + 4 > limit {
            return Err(AxmlError::malformed(offset, "truncated UTF-16 length"));
        }
        let second = u16::from_le_bytes([data[offset + 2], data[offset + 3]]);
        let length = (((first & 0x7FFF) as usize) << 16) | second as usize;
        Ok((length, 4))
    }
}

fn write_utf8_length(buf: &mut Vec<u8>, len: usize) -> AxmlResult<()> {
    if len < 0x80 {
        buf.push(len as u8);
    } else if len < 0x8000 {
        buf.push(0x80 | (len >> 8) as u8);
        buf.push((len & 0xFF) as u8);
    } else {
        return Err(AxmlError::malformed(
            0,
            format!("string of length {len} is too long for a UTF-8 pool"),
        ));
    }
    Ok(())
}

fn write_utf8_string(buf: &mut Vec<u8>, text: &str) -> AxmlResult<()> {
    write_utf8_length(buf, text.encode_utf16().count())?;
    write_utf8_length(buf, text.len())?;
    buf.extend_from_slice(text.as_bytes());
    buf.push(0);
    Ok(())
}

fn write_utf16_string(buf: &mut Vec<u8>, text: &str) {
    let units: Vec<u16> = text.encode_utf16().collect();
    let len = units.len();
    if len < 0x8000 {
        write_u16(buf, len as u16);
    } else {
        let first = 0x8000 | ((len >> 16) as u16 & 0x7FFF);
        let second = (len & 0xFFFF) as u16;
        write_u16(buf, first);
        write_u16(buf, second);
    }
    for unit in units {
        write_u16(buf, unit);
    }
    write_u16(buf, 0);
}
