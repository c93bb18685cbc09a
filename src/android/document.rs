use crate::android::chunk::{
    begin_chunk, finalize_chunk, parse_at, write_u32, ChunkHeader, StartElementHeader, RES_STRING_POOL_TYPE,
    RES_XML_RESOURCE_MAP_TYPE, RES_XML_START_ELEMENT_TYPE, RES_XML_TYPE,
};
use crate::android::error::{AxmlError, AxmlResult};
use crate::android::parser::XmlCursor;
use crate::android::string_pool::StringPool;
use log::{debug, warn};
use nom::number::complete::le_u32;
use std::fs;
use std::path::Path;

/// A decoded binary XML document, split the way the patcher needs it.
///
/// The outer `RES_XML_TYPE` header is dropped and rebuilt on encode, the string pool is
/// held decoded, and every chunk after the pool (resource map, namespaces, elements)
/// stays as raw bytes in `body`. Offsets handed out by [`XmlCursor`] are offsets into
/// `body`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AxmlDocument {
    pool: StringPool,
    body: Vec<u8>,
    resource_map: Vec<u32>,
}

impl AxmlDocument {
    pub fn from_bytes(bytes: &[u8]) -> AxmlResult<Self> {
        let xml_header = ChunkHeader::read_at(bytes, 0)?;
        if xml_header.chunk_type != RES_XML_TYPE {
            return Err(AxmlError::malformed(
                0,
                format!(
                    "binary XML does not start with RES_XML_TYPE (found {:#06x})",
                    xml_header.chunk_type
                ),
            ));
        }
        if xml_header.end() < bytes.len() {
            warn!(
                "Ignoring {} trailing bytes after the XML chunk",
                bytes.len() - xml_header.end()
            );
        }
        let bytes = &bytes[..xml_header.end()];

        let pool_header = ChunkHeader::read_at(bytes, xml_header.body_start())?;
        if pool_header.chunk_type != RES_STRING_POOL_TYPE {
            return Err(AxmlError::malformed(
                pool_header.start,
                "string pool must be the first chunk of the document",
            ));
        }
        let pool = StringPool::parse(bytes, &pool_header)?;
        let body = bytes[pool_header.end()..].to_vec();
        let resource_map = read_resource_map(&body)?;
        debug!(
            "Decoded binary XML: {} strings, {} resource ids, {} body bytes",
            pool.len(),
            resource_map.len(),
            body.len()
        );

        Ok(AxmlDocument {
            pool,
            body,
            resource_map,
        })
    }

    pub fn read_from_file(path: impl AsRef<Path>) -> AxmlResult<Self> {
        let bytes = fs::read(path.as_ref())?;
        Self::from_bytes(&bytes)
    }

    /// Re-encodes the pool and concatenates it with the body under a fresh XML header.
    pub fn to_bytes(&self) -> AxmlResult<Vec<u8>> {
        let pool_chunk = self.pool.to_chunk()?;
        let mut document = Vec::with_capacity(8 + pool_chunk.len() + self.body.len());
        let xml_start = begin_chunk(&mut document, RES_XML_TYPE, 8);
        document.extend_from_slice(&pool_chunk);
        document.extend_from_slice(&self.body);
        finalize_chunk(&mut document, xml_start)?;
        Ok(document)
    }

    pub fn string_pool(&self) -> &StringPool {
        &self.pool
    }

    pub(crate) fn string_pool_mut(&mut self) -> &mut StringPool {
        &mut self.pool
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub(crate) fn body_mut(&mut self) -> &mut Vec<u8> {
        &mut self.body
    }

    pub fn resource_map(&self) -> &[u32] {
        &self.resource_map
    }

    /// Resource id assigned to the pool string `name_idx`, if any.
    pub fn resource_id_of(&self, name_idx: u32) -> Option<u32> {
        self.resource_map
            .get(name_idx as usize)
            .copied()
            .filter(|id| *id != 0)
    }

    /// Pool index of the attribute name carrying `resource_id`.
    pub fn name_index_for_resource(&self, resource_id: u32) -> Option<u32> {
        self.resource_map
            .iter()
            .position(|id| *id == resource_id)
            .map(|idx| idx as u32)
    }

    /// Appends `name` to the pool and assigns it `resource_id` in the resource map.
    ///
    /// Map entries between the old end of the map and the new string are padded with
    /// zero, which reads as "no resource id". No existing pool index changes, but every
    /// chunk after the map moves by the map's growth, so offsets taken earlier are stale.
    pub(crate) fn append_resource_name(&mut self, name: &str, resource_id: u32) -> AxmlResult<u32> {
        let name_idx = self.pool.next_index();
        if self.resource_map.len() > name_idx as usize {
            return Err(AxmlError::malformed(
                0,
                format!(
                    "resource map has {} entries but the pool only {name_idx} strings",
                    self.resource_map.len()
                ),
            ));
        }
        let mut resource_map = self.resource_map.clone();
        resource_map.resize(name_idx as usize, 0);
        resource_map.push(resource_id);

        let mut chunk = Vec::with_capacity(8 + resource_map.len() * 4);
        let map_start = begin_chunk(&mut chunk, RES_XML_RESOURCE_MAP_TYPE, 8);
        for id in &resource_map {
            write_u32(&mut chunk, *id);
        }
        finalize_chunk(&mut chunk, map_start)?;

        // A document without a map gets one right after the pool.
        let existing = match find_chunk(&self.body, RES_XML_RESOURCE_MAP_TYPE)? {
            Some(header) => header.start..header.end(),
            None => 0..0,
        };
        self.body.splice(existing, chunk);
        self.pool.append(name);
        self.resource_map = resource_map;
        debug!("Mapped new pool string {name_idx} (`{name}`) to resource id {resource_id:#010x}");
        Ok(name_idx)
    }

    pub fn cursor(&self) -> XmlCursor<'_> {
        XmlCursor::new(self)
    }

    /// Checks that every start element's size and count fields describe exactly the
    /// records it holds.
    pub fn validate(&self) -> AxmlResult<()> {
        let mut position = 0;
        while position < self.body.len() {
            let chunk = ChunkHeader::read_at(&self.body, position)?;
            if chunk.chunk_type == RES_XML_START_ELEMENT_TYPE {
                let element = StartElementHeader::read(&self.body, chunk)?;
                if element.attributes_end() != chunk.end() {
                    return Err(AxmlError::malformed(
                        chunk.start,
                        format!(
                            "start element spans {} bytes but its {} records end at {:#x}",
                            chunk.chunk_size,
                            element.attribute_count,
                            element.attributes_end()
                        ),
                    ));
                }
            }
            position = chunk.end();
        }
        Ok(())
    }
}

fn find_chunk(body: &[u8], chunk_type: u16) -> AxmlResult<Option<ChunkHeader>> {
    let mut position = 0;
    while position < body.len() {
        let chunk = ChunkHeader::read_at(body, position)?;
        if chunk.chunk_type == chunk_type {
            return Ok(Some(chunk));
        }
        position = chunk.end();
    }
    Ok(None)
}

fn read_resource_map(body: &[u8]) -> AxmlResult<Vec<u32>> {
    let Some(chunk) = find_chunk(body, RES_XML_RESOURCE_MAP_TYPE)? else {
        return Ok(Vec::new());
    };
    let count = (chunk.end() - chunk.body_start()) / 4;
    (0..count)
        .map(|i| parse_at(body, chunk.body_start() + i * 4, "resource id", le_u32))
        .collect()
}
