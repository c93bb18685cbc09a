use crate::android::chunk::{
    AttributeRecord, TYPE_ATTRIBUTE, TYPE_FLOAT, TYPE_INT_BOOLEAN, TYPE_INT_DEC, TYPE_INT_HEX,
    TYPE_NULL, TYPE_REFERENCE, TYPE_STRING,
};
use crate::android::error::{AxmlError, AxmlResult};
use crate::android::string_pool::StringPool;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An attribute value as Android would read it back.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResValue {
    String(String),
    Boolean(bool),
    Integer(i64),
    Hex(u32),
    Reference(u32),
}

impl ResValue {
    /// Decodes a record, preferring the raw string when one is present.
    pub fn decode(pool: &StringPool, record: &AttributeRecord) -> AxmlResult<Self> {
        if let Some(raw) = pool.get(record.raw_value) {
            return Ok(ResValue::String(raw.to_string()));
        }

        let data = record.typed_value.data;
        match record.typed_value.data_type {
            TYPE_NULL => Ok(ResValue::String(String::new())),
            TYPE_STRING => pool
                .get(data)
                .map(|s| ResValue::String(s.to_string()))
                .ok_or_else(|| {
                    AxmlError::malformed(0, format!("string value references missing pool entry {data}"))
                }),
            TYPE_REFERENCE | TYPE_ATTRIBUTE => Ok(ResValue::Reference(data)),
            TYPE_INT_BOOLEAN => Ok(ResValue::Boolean(data != 0)),
            TYPE_INT_DEC => Ok(ResValue::Integer(i64::from(data as i32))),
            TYPE_INT_HEX => Ok(ResValue::Hex(data)),
            TYPE_FLOAT => Ok(ResValue::String(f32::from_bits(data).to_string())),
            _ => Ok(ResValue::Hex(data)),
        }
    }
}

impl fmt::Display for ResValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResValue::String(text) => write!(f, "{text}"),
            ResValue::Boolean(flag) => write!(f, "{flag}"),
            ResValue::Integer(num) => write!(f, "{num}"),
            ResValue::Hex(value) => write!(f, "0x{value:x}"),
            ResValue::Reference(id) => write!(f, "@0x{id:08x}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::android::chunk::{TypedValue, NO_ENTRY_INDEX};

    fn typed(data_type: u8, data: u32) -> AttributeRecord {
        AttributeRecord {
            namespace: NO_ENTRY_INDEX,
            name: 0,
            raw_value: NO_ENTRY_INDEX,
            typed_value: TypedValue {
                size: 8,
                res0: 0,
                data_type,
                data,
            },
        }
    }

    #[test]
    fn decodes_typed_values() {
        let pool = StringPool::with_strings(vec!["label".into(), "hello".into()], false);
        assert_eq!(
            ResValue::decode(&pool, &typed(TYPE_INT_BOOLEAN, 0xFFFF_FFFF)).unwrap(),
            ResValue::Boolean(true)
        );
        assert_eq!(
            ResValue::decode(&pool, &typed(TYPE_INT_DEC, (-3i32) as u32)).unwrap(),
            ResValue::Integer(-3)
        );
        assert_eq!(
            ResValue::decode(&pool, &typed(TYPE_REFERENCE, 0x7f0b_0001)).unwrap(),
            ResValue::Reference(0x7f0b_0001)
        );
        assert_eq!(
            ResValue::decode(&pool, &typed(TYPE_STRING, 1)).unwrap(),
            ResValue::String("hello".into())
        );
        assert!(ResValue::decode(&pool, &typed(TYPE_STRING, 7)).is_err());
    }

    #[test]
    fn raw_string_wins_over_typed_data() {
        let pool = StringPool::with_strings(vec!["label".into(), "false".into()], false);
        let mut record = typed(TYPE_INT_BOOLEAN, 0xFFFF_FFFF);
        record.raw_value = 1;
        assert_eq!(
            ResValue::decode(&pool, &record).unwrap(),
            ResValue::String("false".into())
        );
    }

    #[test]
    fn display_matches_manifest_text() {
        assert_eq!(ResValue::Boolean(false).to_string(), "false");
        assert_eq!(ResValue::Integer(31).to_string(), "31");
        assert_eq!(ResValue::Reference(0x7f0b_0001).to_string(), "@0x7f0b0001");
    }
}
