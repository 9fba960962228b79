//! Bigram connection-cost matrix.

use std::io::{prelude::*, BufReader, Read, Write};

use bincode::{Decode, Encode};

use crate::errors::{HaneulError, Result};
use crate::utils;

const STREAM_MAGIC: &[u8; 4] = b"hCON";
const STREAM_VERSION: u32 = 1;

/// Dense matrix of connection costs between a right context id and a
/// following left context id.
#[derive(Decode, Encode)]
pub struct ConnectionCosts {
    data: Vec<i16>,
    num_right: usize,
    num_left: usize,
}

impl ConnectionCosts {
    pub(crate) fn new(data: Vec<i16>, num_right: usize, num_left: usize) -> Self {
        debug_assert_eq!(data.len(), num_right * num_left);
        Self {
            data,
            num_right,
            num_left,
        }
    }

    /// Maximum number of left connection ids.
    #[inline(always)]
    pub fn num_left(&self) -> usize {
        self.num_left
    }

    /// Maximum number of right connection ids.
    #[inline(always)]
    pub fn num_right(&self) -> usize {
        self.num_right
    }

    /// Cost of connecting a morpheme with `right_id` to a following
    /// morpheme with `left_id`.
    #[inline(always)]
    pub fn cost(&self, right_id: u16, left_id: u16) -> i32 {
        debug_assert!(usize::from(right_id) < self.num_right);
        debug_assert!(usize::from(left_id) < self.num_left);
        let index = usize::from(left_id) * self.num_right + usize::from(right_id);
        i32::from(self.data[index])
    }

    /// Creates a new instance from `matrix.def`.
    pub fn from_reader<R>(rdr: R) -> Result<Self>
    where
        R: Read,
    {
        let reader = BufReader::new(rdr);
        let mut lines = reader.lines();

        let header = lines
            .next()
            .ok_or_else(|| HaneulError::invalid_format("matrix.def", "missing header"))??;
        let (num_right, num_left) = Self::parse_header(&header)?;
        let mut data = vec![0; num_right * num_left];

        for line in lines {
            let line = line?;
            if !line.is_empty() {
                let (right_id, left_id, conn_cost) = Self::parse_body(&line)?;
                if num_right <= right_id || num_left <= left_id {
                    return Err(HaneulError::invalid_format(
                        "matrix.def",
                        "left/right_id must be within num_left/right.",
                    ));
                }
                data[left_id * num_right + right_id] = conn_cost;
            }
        }
        Ok(Self::new(data, num_right, num_left))
    }

    fn parse_header(line: &str) -> Result<(usize, usize)> {
        let cols: Vec<_> = line.split_whitespace().collect();
        if cols.len() != 2 {
            let msg = format!(
                "The header must consist of two integers separated by spaces, {line}"
            );
            Err(HaneulError::invalid_format("matrix.def", msg))
        } else {
            let num_right: u16 = cols[0].parse()?;
            let num_left: u16 = cols[1].parse()?;
            Ok((usize::from(num_right), usize::from(num_left)))
        }
    }

    fn parse_body(line: &str) -> Result<(usize, usize, i16)> {
        let cols: Vec<_> = line.split_whitespace().collect();
        if cols.len() != 3 {
            let msg = format!(
                "A row other than the header must consist of three integers separated by spaces, {line}"
            );
            Err(HaneulError::invalid_format("matrix.def", msg))
        } else {
            Ok((cols[0].parse()?, cols[1].parse()?, cols[2].parse()?))
        }
    }

    /// Serializes the matrix: magic, version, sizes, then zig-zag-encoded
    /// deltas between consecutive cells.
    pub fn save<W>(&self, mut wtr: W) -> Result<()>
    where
        W: Write,
    {
        wtr.write_all(STREAM_MAGIC)?;
        wtr.write_all(&STREAM_VERSION.to_le_bytes())?;
        utils::write_vu64(&mut wtr, self.num_right as u64)?;
        utils::write_vu64(&mut wtr, self.num_left as u64)?;
        let mut prev = 0;
        for &cost in &self.data {
            let delta = i64::from(cost) - prev;
            utils::write_vu64(&mut wtr, utils::zigzag_encode(delta))?;
            prev = i64::from(cost);
        }
        Ok(())
    }

    /// Deserializes a matrix written by [`Self::save`].
    pub fn load<R>(mut rdr: R) -> Result<Self>
    where
        R: Read,
    {
        let mut magic = [0; 4];
        rdr.read_exact(&mut magic)?;
        if &magic != STREAM_MAGIC {
            return Err(HaneulError::invalid_format("matrix.bin", "bad magic"));
        }
        let mut version = [0; 4];
        rdr.read_exact(&mut version)?;
        if u32::from_le_bytes(version) != STREAM_VERSION {
            return Err(HaneulError::invalid_format(
                "matrix.bin",
                format!("unsupported version: {}", u32::from_le_bytes(version)),
            ));
        }
        let num_right = utils::read_vu64(&mut rdr)? as usize;
        let num_left = utils::read_vu64(&mut rdr)? as usize;
        let mut data = Vec::with_capacity(num_right * num_left);
        let mut prev = 0;
        for _ in 0..num_right * num_left {
            let delta = utils::zigzag_decode(utils::read_vu64(&mut rdr)?);
            let cost = prev + delta;
            data.push(i16::try_from(cost).map_err(|_| {
                HaneulError::invalid_format("matrix.bin", "connection cost overflows i16")
            })?);
            prev = cost;
        }
        Ok(Self::new(data, num_right, num_left))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_2x2() {
        let data = "2 2
0 0 0
0 1 1
1 0 -2
1 1 -3";
        let conn = ConnectionCosts::from_reader(data.as_bytes()).unwrap();
        assert_eq!(conn.cost(0, 0), 0);
        assert_eq!(conn.cost(0, 1), 1);
        assert_eq!(conn.cost(1, 0), -2);
        assert_eq!(conn.cost(1, 1), -3);
    }

    #[test]
    fn test_2x3() {
        let data = "2 3
0 0 0
0 1 1
0 2 2
1 0 -3
1 1 -4
1 2 -5";
        let conn = ConnectionCosts::from_reader(data.as_bytes()).unwrap();
        assert_eq!(conn.num_right(), 2);
        assert_eq!(conn.num_left(), 3);
        assert_eq!(conn.cost(0, 2), 2);
        assert_eq!(conn.cost(1, 0), -3);
    }

    #[test]
    fn test_missing_header() {
        assert!(ConnectionCosts::from_reader("".as_bytes()).is_err());
    }

    #[test]
    fn test_short_body_row() {
        let data = "2 2
0 0 0
1 -2";
        assert!(ConnectionCosts::from_reader(data.as_bytes()).is_err());
    }

    #[test]
    fn test_out_of_bounds_id() {
        let data = "2 2
2 0 -2";
        assert!(ConnectionCosts::from_reader(data.as_bytes()).is_err());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let data = "3 3
0 0 10
0 1 -20
1 0 30
1 1 -40
2 2 5
0 2 7";
        let conn = ConnectionCosts::from_reader(data.as_bytes()).unwrap();
        let mut bytes = vec![];
        conn.save(&mut bytes).unwrap();
        let loaded = ConnectionCosts::load(bytes.as_slice()).unwrap();
        for right_id in 0..3 {
            for left_id in 0..3 {
                assert_eq!(conn.cost(right_id, left_id), loaded.cost(right_id, left_id));
            }
        }
    }

    #[test]
    fn test_load_rejects_version_mismatch() {
        let conn = ConnectionCosts::from_reader("1 1\n0 0 0".as_bytes()).unwrap();
        let mut bytes = vec![];
        conn.save(&mut bytes).unwrap();
        bytes[4] = 0xFF;
        assert!(ConnectionCosts::load(bytes.as_slice()).is_err());
    }
}
