//! MessagePack encoding of the table of contents.
//!
//! The box itself is written as a map keyed by field name, entries as
//! positional arrays. Timestamps use the MessagePack timestamp extension
//! (type -1) and digests are raw binary, so boxes stay readable by other
//! goxr implementations.

use std::fmt;
use std::io::{Read, Write};

use byteorder::{BigEndian, ByteOrder};
use chrono::{DateTime, TimeZone, Utc};
use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::entry::Checksum;
use crate::error::{Error, Result};
use crate::meta::BoxMetadata;

const TIMESTAMP_EXT: i8 = -1;
const NANOS_PER_SEC: u32 = 1_000_000_000;

pub(crate) fn write_toc<W: Write>(out: &mut W, meta: &BoxMetadata) -> Result<()> {
    rmp_serde::encode::write_named(out, meta).map_err(Error::TocEncode)
}

/// Decodes exactly one document. Anything after it is left unread.
pub(crate) fn read_toc<R: Read>(reader: R) -> Result<BoxMetadata> {
    let mut de = rmp_serde::Deserializer::new(reader);
    BoxMetadata::deserialize(&mut de).map_err(Error::Toc)
}

/// A byte string that serializes as MessagePack `bin`.
struct RawBytes<'a>(&'a [u8]);

impl Serialize for RawBytes<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_bytes(self.0)
    }
}

/// Owned counterpart of [`RawBytes`], also accepting a plain sequence of bytes.
struct ByteBuf(Vec<u8>);

struct ByteBufVisitor;

impl<'de> Visitor<'de> for ByteBufVisitor {
    type Value = ByteBuf;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a byte string")
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> std::result::Result<ByteBuf, E> {
        Ok(ByteBuf(v.to_vec()))
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> std::result::Result<ByteBuf, E> {
        Ok(ByteBuf(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<ByteBuf, A::Error> {
        let mut out = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(b) = seq.next_element::<u8>()? {
            out.push(b);
        }
        Ok(ByteBuf(out))
    }
}

impl<'de> Deserialize<'de> for ByteBuf {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<ByteBuf, D::Error> {
        deserializer.deserialize_bytes(ByteBufVisitor)
    }
}

/// `#[serde(with)]` helpers for entry digests.
pub(crate) mod checksum {
    use super::*;

    pub fn serialize<S: Serializer>(
        checksum: &Checksum,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        RawBytes(checksum).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Checksum, D::Error> {
        let ByteBuf(bytes) = ByteBuf::deserialize(deserializer)?;
        let mut checksum = [0u8; 32];
        if bytes.len() != checksum.len() {
            return Err(de::Error::invalid_length(bytes.len(), &"32 bytes"));
        }
        checksum.copy_from_slice(&bytes);
        Ok(checksum)
    }
}

/// `#[serde(with)]` helpers storing a time as a MessagePack timestamp.
pub(crate) mod timestamp {
    use super::*;

    pub fn serialize<S: Serializer>(
        time: &DateTime<Utc>,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        let data = encode(time);
        serializer.serialize_newtype_struct(
            rmp_serde::MSGPACK_EXT_STRUCT_NAME,
            &(TIMESTAMP_EXT, RawBytes(&data)),
        )
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<DateTime<Utc>, D::Error> {
        deserializer.deserialize_newtype_struct(rmp_serde::MSGPACK_EXT_STRUCT_NAME, ExtVisitor)
    }

    struct ExtVisitor;

    impl<'de> Visitor<'de> for ExtVisitor {
        type Value = DateTime<Utc>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a timestamp extension")
        }

        fn visit_newtype_struct<D: Deserializer<'de>>(
            self,
            deserializer: D,
        ) -> std::result::Result<DateTime<Utc>, D::Error> {
            let (tag, ByteBuf(data)) = <(i8, ByteBuf)>::deserialize(deserializer)?;
            if tag != TIMESTAMP_EXT {
                return Err(de::Error::custom(format!("unexpected extension type {}", tag)));
            }
            decode(&data).ok_or_else(|| de::Error::custom("invalid timestamp"))
        }
    }

    pub(super) fn encode(time: &DateTime<Utc>) -> Vec<u8> {
        let secs = time.timestamp();
        let nanos = time.timestamp_subsec_nanos();

        if secs >> 34 == 0 && nanos < NANOS_PER_SEC {
            let data = (u64::from(nanos) << 34) | secs as u64;
            if data >> 32 == 0 {
                let mut buf = vec![0u8; 4];
                BigEndian::write_u32(&mut buf, data as u32);
                return buf;
            }
            let mut buf = vec![0u8; 8];
            BigEndian::write_u64(&mut buf, data);
            return buf;
        }

        let mut buf = vec![0u8; 12];
        BigEndian::write_u32(&mut buf[..4], nanos);
        BigEndian::write_i64(&mut buf[4..], secs);
        buf
    }

    pub(super) fn decode(data: &[u8]) -> Option<DateTime<Utc>> {
        let (secs, nanos) = match data.len() {
            4 => (i64::from(BigEndian::read_u32(data)), 0),
            8 => {
                let data = BigEndian::read_u64(data);
                ((data & 0x3_ffff_ffff) as i64, (data >> 34) as u32)
            }
            12 => (BigEndian::read_i64(&data[4..]), BigEndian::read_u32(&data[..4])),
            _ => return None,
        };
        Utc.timestamp_opt(secs, nanos).single()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Entry;

    #[test]
    fn timestamp_forms() {
        let whole = Utc.timestamp_opt(1_589_709_600, 0).unwrap();
        assert_eq!(timestamp::encode(&whole).len(), 4);

        let fraction = Utc.timestamp_opt(1_589_709_600, 123_000_000).unwrap();
        assert_eq!(timestamp::encode(&fraction).len(), 8);

        let ancient = Utc.timestamp_opt(-1, 500).unwrap();
        assert_eq!(timestamp::encode(&ancient).len(), 12);

        for t in &[whole, fraction, ancient] {
            assert_eq!(timestamp::decode(&timestamp::encode(t)), Some(*t));
        }
        assert_eq!(timestamp::decode(&[1, 2, 3]), None);
    }

    #[test]
    fn entry_is_a_positional_array_with_binary_digest() {
        let entry = Entry {
            name: "a.txt".into(),
            offset: 25,
            length: 5,
            mode: 0o644,
            mod_time: Utc.timestamp_opt(1_589_709_600, 0).unwrap(),
            checksum: [7u8; 32],
            meta: Default::default(),
        };
        let bytes = rmp_serde::to_vec(&entry).unwrap();

        // fixarray of 7, fixstr "a.txt"
        assert_eq!(bytes[0], 0x97);
        assert_eq!(&bytes[1..7], b"\xa5a.txt");
        // fixext4 with type -1 for the time, then bin8 of 32 bytes
        let ext = bytes.iter().position(|b| *b == 0xd6).unwrap();
        assert_eq!(bytes[ext + 1], 0xff);
        assert_eq!(&bytes[ext + 6..ext + 8], &[0xc4, 32]);

        let back: Entry = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn box_is_a_named_map() {
        let meta = BoxMetadata {
            name: "site".into(),
            ..BoxMetadata::default()
        };
        let mut bytes = vec![];
        write_toc(&mut bytes, &meta).unwrap();

        // fixmap of 8, keys as fixstr
        assert_eq!(bytes[0], 0x88);
        for key in &[
            "name",
            "description",
            "version",
            "revision",
            "built",
            "builtBy",
            "entries",
            "meta",
        ] {
            let mut encoded = vec![0xa0 | key.len() as u8];
            encoded.extend_from_slice(key.as_bytes());
            assert!(
                bytes.windows(encoded.len()).any(|w| w == &encoded[..]),
                "missing {}",
                key
            );
        }

        let back = read_toc(&bytes[..]).unwrap();
        assert_eq!(back, meta);
    }
}
