//! MySQL column type codes and the row-image decoding matrix (§4.7).
//!
//! Type codes and packed-metadata interpretation mirror
//! `enum_field_types` from the MySQL/MariaDB wire protocol.

use common::codec::Cursor;
use common::err::{CResult, ReError};
use common::time_util;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ColumnTypeCode {
    Decimal = 0,
    Tiny = 1,
    Short = 2,
    Long = 3,
    Float = 4,
    Double = 5,
    Null = 6,
    Timestamp = 7,
    LongLong = 8,
    Int24 = 9,
    Date = 10,
    Time = 11,
    DateTime = 12,
    Year = 13,
    NewDate = 14,
    VarChar = 15,
    Bit = 16,
    Timestamp2 = 17,
    DateTime2 = 18,
    Time2 = 19,
    Json = 245,
    NewDecimal = 246,
    Enum = 247,
    Set = 248,
    TinyBlob = 249,
    MediumBlob = 250,
    LongBlob = 251,
    Blob = 252,
    VarString = 253,
    String = 254,
    Geometry = 255,
}

/// A column type paired with the per-column metadata bytes `TABLE_MAP_EVENT`
/// carries for it (§4.5). Metadata layout depends on the type code: most
/// fixed-width integer types carry none.
#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub code: ColumnTypeCode,
    pub metadata: Vec<u8>,
}

impl ColumnDef {
    /// Number of metadata bytes `TABLE_MAP_EVENT` stores per type code.
    pub fn metadata_len(code: ColumnTypeCode) -> usize {
        use ColumnTypeCode::*;
        match code {
            Float | Double | Blob | Geometry | TinyBlob | MediumBlob | LongBlob => 1,
            VarChar | Bit | NewDecimal | VarString | String | Json => 2,
            Timestamp2 | DateTime2 | Time2 => 1,
            _ => 0,
        }
    }
}

/// A decoded cell value, already in the shape the Avro writer consumes.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub enum ColumnValue {
    Null,
    Int(i64),
    Float(f32),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    /// Temporal values are formatted to `YYYY-MM-DD[ HH:MM:SS]` text per §4.7.
    Temporal(String),
}

/// Decodes one cell from `cursor` according to `def`, returning the value.
///
/// Caller has already consulted the row image's null bitmap; this function
/// is only invoked for non-null cells (§4.6 step 3).
pub fn decode_cell(cursor: &mut Cursor, def: &ColumnDef) -> CResult<ColumnValue> {
    use ColumnTypeCode::*;
    match def.code {
        Tiny => Ok(ColumnValue::Int(cursor.read_u8()? as i8 as i64)),
        Short => Ok(ColumnValue::Int(cursor.read_u16()? as i16 as i64)),
        Int24 => {
            let raw = cursor.read_u24()?;
            let signed = if raw & 0x0080_0000 != 0 {
                (raw | 0xff00_0000) as i32
            } else {
                raw as i32
            };
            Ok(ColumnValue::Int(signed as i64))
        }
        Long => Ok(ColumnValue::Int(cursor.read_u32()? as i32 as i64)),
        LongLong => Ok(ColumnValue::Int(cursor.read_u64()? as i64)),
        Year => Ok(ColumnValue::Int(1900 + cursor.read_u8()? as i64)),
        Float => Ok(ColumnValue::Float(f32::from_le_bytes(
            cursor.read_bytes(4)?.try_into().unwrap(),
        ))),
        Double => Ok(ColumnValue::Double(f64::from_le_bytes(
            cursor.read_bytes(8)?.try_into().unwrap(),
        ))),
        Null => Ok(ColumnValue::Null),

        Date => {
            let raw = cursor.read_u24()?;
            let day = raw & 0x1f;
            let month = (raw >> 5) & 0xf;
            let year = raw >> 9;
            Ok(ColumnValue::Temporal(time_util::format_date(
                year as i32, month, day,
            )))
        }
        Time => {
            let raw = cursor.read_u24()?;
            let sec = raw % 100;
            let min = (raw / 100) % 100;
            let hour = raw / 10000;
            Ok(ColumnValue::Temporal(time_util::format_time(
                hour as i32,
                min,
                sec,
            )))
        }
        Timestamp => {
            let secs = u32::from_be_bytes(cursor.read_bytes(4)?.try_into().unwrap()) as i64;
            Ok(ColumnValue::Temporal(time_util::format_unix_timestamp(secs)))
        }
        Timestamp2 => {
            let secs = u32::from_be_bytes(cursor.read_bytes(4)?.try_into().unwrap()) as i64;
            skip_fractional_seconds(cursor, def.metadata.first().copied().unwrap_or(0))?;
            Ok(ColumnValue::Temporal(time_util::format_unix_timestamp(secs)))
        }
        DateTime => {
            let raw = cursor.read_u64()?;
            let date = raw / 1_000_000;
            let time = raw % 1_000_000;
            let year = (date / 10000) as i32;
            let month = ((date / 100) % 100) as u32;
            let day = (date % 100) as u32;
            let hour = (time / 10000) as u32;
            let minute = ((time / 100) % 100) as u32;
            let sec = (time % 100) as u32;
            Ok(ColumnValue::Temporal(time_util::format_datetime(
                year, month, day, hour, minute, sec,
            )))
        }
        DateTime2 => {
            let raw = cursor.read_unpack5()?;
            let n = (raw as i64 - 0x8000000000i64).unsigned_abs();
            let date = n >> 17;
            let time = n & 0x1ffff;
            let sec = time & 0x3f;
            let minute = (time >> 6) & 0x3f;
            let hour = time >> 12;
            let mday = date & 0x1f;
            let yearmonth = date >> 5;
            let mon = yearmonth % 13;
            let year = yearmonth / 13;
            skip_fractional_seconds(cursor, def.metadata.first().copied().unwrap_or(0))?;
            Ok(ColumnValue::Temporal(time_util::format_datetime(
                year as i32,
                mon as u32,
                mday as u32,
                hour as u32,
                minute as u32,
                sec as u32,
            )))
        }
        Time2 => {
            // Same base layout as DATETIME2 without the date component.
            let raw = cursor.read_bytes(3)?;
            let n = common::codec::extract_u24(raw);
            let sec = n % 100;
            let minute = (n / 100) % 100;
            let hour = n / 10000;
            skip_fractional_seconds(cursor, def.metadata.first().copied().unwrap_or(0))?;
            Ok(ColumnValue::Temporal(time_util::format_time(
                hour as i32,
                minute,
                sec,
            )))
        }
        NewDate => Ok(ColumnValue::Null),

        VarChar | VarString | Decimal | NewDecimal | Geometry => {
            let bytes = cursor.read_lenenc_str()?;
            Ok(ColumnValue::String(String::from_utf8_lossy(bytes).into_owned()))
        }

        String => {
            // metadata[1] carries the real type when it encodes ENUM/SET (real_type >= 0xf7).
            let real_type = def.metadata.first().copied().unwrap_or(0);
            if real_type == u8::from(Enum) || real_type == u8::from(Set) {
                let width = def.metadata.get(1).copied().unwrap_or(1) as usize;
                let mut value: u64 = 0;
                for i in 0..width {
                    value |= (cursor.read_u8()? as u64) << (8 * i);
                }
                Ok(ColumnValue::Int(value as i64))
            } else {
                let (_, bytes) = cursor.read_fixed_len_str()?;
                Ok(ColumnValue::String(String::from_utf8_lossy(bytes).into_owned()))
            }
        }

        TinyBlob | MediumBlob | LongBlob | Blob | Json => {
            let len_bytes = def.metadata.first().copied().unwrap_or(1) as usize;
            let raw_len = cursor.read_bytes(len_bytes)?;
            let mut padded = [0u8; 4];
            padded[..len_bytes].copy_from_slice(raw_len);
            let len = common::codec::extract_u32(&padded) as usize;
            let bytes = cursor.read_bytes(len)?;
            Ok(ColumnValue::Bytes(bytes.to_vec()))
        }

        Bit => {
            // metadata[0] is the bit-length remainder (N % 8), metadata[1] is
            // already a whole-byte count (N / 8), not a second bit count.
            let (bit_rem, whole_bytes) = (
                def.metadata.first().copied().unwrap_or(0) as usize,
                def.metadata.get(1).copied().unwrap_or(0) as usize,
            );
            let len = whole_bytes + (bit_rem + 7) / 8;
            let bytes = cursor.read_bytes(len.max(1))?;
            Ok(ColumnValue::Bytes(bytes.to_vec()))
        }

        Enum | Set => Err(ReError::new(
            "ENUM/SET must be decoded through the STRING metadata path",
        )),
    }
}

fn skip_fractional_seconds(cursor: &mut Cursor, decimals: u8) -> CResult<()> {
    let bytes = (decimals as usize + 1) / 2;
    if bytes > 0 {
        cursor.skip(bytes)?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn def(code: ColumnTypeCode, metadata: Vec<u8>) -> ColumnDef {
        ColumnDef { code, metadata }
    }

    #[test]
    fn decodes_signed_integers() {
        let mut c = Cursor::new(&[0xff]);
        assert_eq!(
            decode_cell(&mut c, &def(ColumnTypeCode::Tiny, vec![])).unwrap(),
            ColumnValue::Int(-1)
        );
    }

    #[test]
    fn decodes_date_bit_packing() {
        // 2024-03-05: year=2024, month=3, day=5 -> (2024<<9)|(3<<5)|5
        let raw = (2024u32 << 9) | (3 << 5) | 5;
        let bytes = raw.to_le_bytes();
        let mut c = Cursor::new(&bytes[..3]);
        let v = decode_cell(&mut c, &def(ColumnTypeCode::Date, vec![])).unwrap();
        assert_eq!(v, ColumnValue::Temporal("2024-03-05".to_string()));
    }

    #[test]
    fn decodes_varchar_lenenc() {
        let mut c = Cursor::new(&[3, b'a', b'b', b'c']);
        let v = decode_cell(&mut c, &def(ColumnTypeCode::VarChar, vec![1, 0])).unwrap();
        assert_eq!(v, ColumnValue::String("abc".to_string()));
    }

    #[test]
    fn decodes_enum_through_string_metadata() {
        let mut c = Cursor::new(&[2]);
        let v = decode_cell(
            &mut c,
            &def(ColumnTypeCode::String, vec![u8::from(ColumnTypeCode::Enum), 1]),
        )
        .unwrap();
        assert_eq!(v, ColumnValue::Int(2));
    }

    #[test]
    fn decodes_blob_with_one_byte_length() {
        let mut c = Cursor::new(&[3, b'x', b'y', b'z']);
        let v = decode_cell(&mut c, &def(ColumnTypeCode::Blob, vec![1])).unwrap();
        assert_eq!(v, ColumnValue::Bytes(b"xyz".to_vec()));
    }

    #[test]
    fn decodes_timestamp_seconds_big_endian() {
        // A seconds-since-epoch value whose big-endian and little-endian
        // byte-swapped readings land on very different instants, so a
        // regression back to little-endian decoding shows up as a mismatch.
        let secs: u32 = 1_709_640_000; // 2024-03-05 12:00:00 UTC
        let mut c = Cursor::new(&secs.to_be_bytes());
        let v = decode_cell(&mut c, &def(ColumnTypeCode::Timestamp, vec![])).unwrap();
        let expected = time_util::format_unix_timestamp(secs as i64);
        assert_eq!(v, ColumnValue::Temporal(expected));

        let mut swapped = Cursor::new(&secs.to_le_bytes());
        let wrong = decode_cell(&mut swapped, &def(ColumnTypeCode::Timestamp, vec![])).unwrap();
        assert_ne!(v, wrong);
    }

    #[test]
    fn decodes_timestamp2_seconds_big_endian_with_fractional_bytes() {
        let secs: u32 = 1_709_640_000;
        let mut bytes = secs.to_be_bytes().to_vec();
        bytes.push(0); // one fractional-second byte for decimals in 1..=2
        let mut c = Cursor::new(&bytes);
        let v = decode_cell(&mut c, &def(ColumnTypeCode::Timestamp2, vec![1])).unwrap();
        let expected = time_util::format_unix_timestamp(secs as i64);
        assert_eq!(v, ColumnValue::Temporal(expected));
    }

    #[test]
    fn decodes_bit_16_as_two_bytes() {
        // BIT(16): metadata = [0, 2] (0 leftover bits, 2 whole bytes).
        let mut c = Cursor::new(&[0xab, 0xcd, 0xff]);
        let v = decode_cell(&mut c, &def(ColumnTypeCode::Bit, vec![0, 2])).unwrap();
        assert_eq!(v, ColumnValue::Bytes(vec![0xab, 0xcd]));
    }

    #[test]
    fn decodes_bit_with_leftover_bits() {
        // BIT(17): metadata = [1, 2] (1 leftover bit, 2 whole bytes) -> 3 bytes total.
        let mut c = Cursor::new(&[0x01, 0xab, 0xcd, 0xff]);
        let v = decode_cell(&mut c, &def(ColumnTypeCode::Bit, vec![1, 2])).unwrap();
        assert_eq!(v, ColumnValue::Bytes(vec![0x01, 0xab, 0xcd]));
    }
}
