use std::io::{Read, Write};

use csv_core::ReadFieldResult;

use crate::errors::Result;

pub trait FromU32 {
    fn from_u32(src: u32) -> Self;
}

#[cfg(any(target_pointer_width = "32", target_pointer_width = "64"))]
impl FromU32 for usize {
    #[inline(always)]
    fn from_u32(src: u32) -> Self {
        // Since the pointer width is guaranteed to be 32 or 64,
        // the following process always succeeds.
        unsafe { Self::try_from(src).unwrap_unchecked() }
    }
}

pub fn parse_csv_row(row: &str) -> Vec<String> {
    let mut features = vec![];
    let mut rdr = csv_core::Reader::new();
    let mut bytes = row.as_bytes();
    let mut output = [0; 4096];
    loop {
        let (result, nin, nout) = rdr.read_field(bytes, &mut output);
        let end = match result {
            ReadFieldResult::InputEmpty => true,
            ReadFieldResult::Field { .. } => false,
            ReadFieldResult::End => true,
            _ => unreachable!(),
        };
        features.push(std::str::from_utf8(&output[..nout]).unwrap().to_string());
        if end {
            break;
        }
        bytes = &bytes[nin..];
    }
    features
}

/// Writes a 7-bit variable-length integer, least-significant group first.
pub fn write_vu64<W>(mut wtr: W, mut v: u64) -> Result<()>
where
    W: Write,
{
    while v >= 0x80 {
        wtr.write_all(&[(v as u8 & 0x7F) | 0x80])?;
        v >>= 7;
    }
    wtr.write_all(&[v as u8])?;
    Ok(())
}

pub fn read_vu64<R>(mut rdr: R) -> Result<u64>
where
    R: Read,
{
    let mut v = 0;
    let mut shift = 0;
    loop {
        let mut b = [0];
        rdr.read_exact(&mut b)?;
        v |= u64::from(b[0] & 0x7F) << shift;
        if b[0] < 0x80 {
            return Ok(v);
        }
        shift += 7;
    }
}

#[inline(always)]
pub const fn zigzag_encode(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

#[inline(always)]
pub const fn zigzag_decode(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}

#[cfg(test)]
macro_rules! hashmap {
    ( $($k:expr => $v:expr,)* ) => {
        {
            #[allow(unused_mut)]
            let mut h = hashbrown::HashMap::new();
            $(
                h.insert($k, $v);
            )*
            h
        }
    };
    ( $($k:expr => $v:expr),* ) => {
        hashmap![$( $k => $v, )*]
    };
}

#[cfg(test)]
pub(crate) use hashmap;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_csv_row() {
        assert_eq!(
            &["명사", "한국"],
            parse_csv_row("명사,한국").as_slice()
        );
    }

    #[test]
    fn test_parse_csv_row_with_quote() {
        assert_eq!(
            &["명사", "1,2-디클로로에탄"],
            parse_csv_row("명사,\"1,2-디클로로에탄\"").as_slice()
        );
    }

    #[test]
    fn test_vu64_roundtrip() {
        let values = [0, 1, 127, 128, 300, u64::from(u32::MAX), u64::MAX];
        let mut buf = vec![];
        for &v in &values {
            write_vu64(&mut buf, v).unwrap();
        }
        let mut slice = buf.as_slice();
        for &v in &values {
            assert_eq!(read_vu64(&mut slice).unwrap(), v);
        }
        assert!(slice.is_empty());
    }

    #[test]
    fn test_zigzag() {
        for v in [0, 1, -1, 2, -2, i64::MAX, i64::MIN, 12345, -54321] {
            assert_eq!(zigzag_decode(zigzag_encode(v)), v);
        }
    }
}
