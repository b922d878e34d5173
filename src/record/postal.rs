//! Postal-code records and their fixed-width projection.

use std::io::BufRead;

use crate::common::{Error, Key, Result};

/// Bytes reserved for the place name.
pub const PLACE_LEN: usize = 40;
/// Bytes reserved for the state code.
pub const STATE_LEN: usize = 2;
/// Bytes reserved for the county name.
pub const COUNTY_LEN: usize = 40;

/// A postal code record keyed by ZIP.
///
/// Text fields are truncated to their fixed widths when the record is built,
/// so a record held in memory is always identical to what a leaf block
/// stores. Truncation is silent and never splits a UTF-8 character.
///
/// # Layout (102 bytes)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       4     zip (i32, little-endian)
/// 4       40    place (UTF-8, zero-padded)
/// 44      2     state (UTF-8, zero-padded)
/// 46      40    county (UTF-8, zero-padded)
/// 86      8     latitude (f64, little-endian)
/// 94      8     longitude (f64, little-endian)
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostalRecord {
    zip: Key,
    place: String,
    state: String,
    county: String,
    latitude: f64,
    longitude: f64,
}

impl PostalRecord {
    /// Size of the on-disk projection.
    pub const ENCODED_SIZE: usize = 4 + PLACE_LEN + STATE_LEN + COUNTY_LEN + 8 + 8;

    const OFFSET_PLACE: usize = 4;
    const OFFSET_STATE: usize = Self::OFFSET_PLACE + PLACE_LEN;
    const OFFSET_COUNTY: usize = Self::OFFSET_STATE + STATE_LEN;
    const OFFSET_LATITUDE: usize = Self::OFFSET_COUNTY + COUNTY_LEN;
    const OFFSET_LONGITUDE: usize = Self::OFFSET_LATITUDE + 8;

    pub fn new(
        zip: Key,
        place: &str,
        state: &str,
        county: &str,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            zip,
            place: fit(place, PLACE_LEN),
            state: fit(state, STATE_LEN),
            county: fit(county, COUNTY_LEN),
            latitude,
            longitude,
        }
    }

    /// A record carrying only a key.
    pub fn keyed(zip: Key) -> Self {
        Self {
            zip,
            ..Self::default()
        }
    }

    #[inline]
    pub fn zip(&self) -> Key {
        self.zip
    }

    pub fn place(&self) -> &str {
        &self.place
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn county(&self) -> &str {
        &self.county
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Write the fixed-width projection into `buf`.
    ///
    /// # Panics
    /// Panics if `buf.len() < PostalRecord::ENCODED_SIZE`.
    pub fn encode_into(&self, buf: &mut [u8]) {
        assert!(buf.len() >= Self::ENCODED_SIZE, "buffer too small for PostalRecord");

        buf[..Self::ENCODED_SIZE].fill(0);
        buf[0..4].copy_from_slice(&self.zip.to_le_bytes());
        put_text(&mut buf[Self::OFFSET_PLACE..Self::OFFSET_STATE], &self.place);
        put_text(&mut buf[Self::OFFSET_STATE..Self::OFFSET_COUNTY], &self.state);
        put_text(&mut buf[Self::OFFSET_COUNTY..Self::OFFSET_LATITUDE], &self.county);
        buf[Self::OFFSET_LATITUDE..Self::OFFSET_LONGITUDE]
            .copy_from_slice(&self.latitude.to_le_bytes());
        buf[Self::OFFSET_LONGITUDE..Self::ENCODED_SIZE]
            .copy_from_slice(&self.longitude.to_le_bytes());
    }

    /// Read a record from its fixed-width projection.
    ///
    /// # Panics
    /// Panics if `buf.len() < PostalRecord::ENCODED_SIZE`.
    pub fn decode(buf: &[u8]) -> Self {
        assert!(buf.len() >= Self::ENCODED_SIZE, "buffer too small for PostalRecord");

        let zip = i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        Self {
            zip,
            place: get_text(&buf[Self::OFFSET_PLACE..Self::OFFSET_STATE]),
            state: get_text(&buf[Self::OFFSET_STATE..Self::OFFSET_COUNTY]),
            county: get_text(&buf[Self::OFFSET_COUNTY..Self::OFFSET_LATITUDE]),
            latitude: get_f64(&buf[Self::OFFSET_LATITUDE..Self::OFFSET_LONGITUDE]),
            longitude: get_f64(&buf[Self::OFFSET_LONGITUDE..Self::ENCODED_SIZE]),
        }
    }

    /// Parse one line of the length-indicated postal file.
    ///
    /// Lines look like `LLzip,place,state,county,latitude,longitude`, where
    /// `LL` is a two-digit record length. The length is checked for being
    /// numeric and otherwise dropped.
    pub fn parse_line(line_no: usize, line: &str) -> Result<Self> {
        let err = |reason: &str| Error::ParseRecord {
            line: line_no,
            reason: reason.to_string(),
        };

        let line = line.trim_end_matches(&['\r', '\n'][..]);
        let (length, body) = match (line.get(..2), line.get(2..)) {
            (Some(length), Some(body)) => (length, body),
            _ => return Err(err("line too short for a length prefix")),
        };
        if !length.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err("record length prefix is not numeric"));
        }

        let fields: Vec<&str> = body.split(',').collect();
        if fields.len() != 6 {
            return Err(err(&format!("expected 6 fields, found {}", fields.len())));
        }

        let zip = fields[0]
            .trim()
            .parse::<Key>()
            .map_err(|e| err(&format!("bad zip {:?}: {}", fields[0], e)))?;
        let latitude = fields[4]
            .trim()
            .parse::<f64>()
            .map_err(|e| err(&format!("bad latitude {:?}: {}", fields[4], e)))?;
        let longitude = fields[5]
            .trim()
            .parse::<f64>()
            .map_err(|e| err(&format!("bad longitude {:?}: {}", fields[5], e)))?;

        Ok(Self::new(zip, fields[1], fields[2], fields[3], latitude, longitude))
    }
}

/// Read every record from a length-indicated postal file.
///
/// The first line is a column header and is skipped, as are blank lines.
/// Records are returned in file order.
pub fn read_length_indicated<R: BufRead>(reader: R) -> Result<Vec<PostalRecord>> {
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate().skip(1) {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(PostalRecord::parse_line(idx + 1, &line)?);
    }
    tracing::debug!(count = records.len(), "read postal records");
    Ok(records)
}

/// Truncate to at most `max` bytes on a character boundary.
fn fit(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

fn put_text(dst: &mut [u8], s: &str) {
    let n = s.len().min(dst.len());
    dst[..n].copy_from_slice(&s.as_bytes()[..n]);
}

fn get_text(src: &[u8]) -> String {
    let end = src.iter().position(|&b| b == 0).unwrap_or(src.len());
    String::from_utf8_lossy(&src[..end]).into_owned()
}

fn get_f64(src: &[u8]) -> f64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&src[..8]);
    f64::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PostalRecord {
        PostalRecord::new(56301, "St. Cloud", "MN", "Stearns", 45.5412, -94.1819)
    }

    #[test]
    fn test_encoded_size() {
        assert_eq!(PostalRecord::ENCODED_SIZE, 102);
    }

    #[test]
    fn test_encode_decode() {
        let record = sample();
        let mut buf = [0xFFu8; PostalRecord::ENCODED_SIZE];
        record.encode_into(&mut buf);
        assert_eq!(PostalRecord::decode(&buf), record);
    }

    #[test]
    fn test_encode_zero_pads() {
        let mut buf = [0xFFu8; PostalRecord::ENCODED_SIZE];
        PostalRecord::keyed(1).encode_into(&mut buf);
        assert_eq!(&buf[0..4], &1i32.to_le_bytes());
        assert!(buf[4..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_fields_are_truncated() {
        let long_place = "x".repeat(60);
        let record = PostalRecord::new(1, &long_place, "MINN", "", 0.0, 0.0);
        assert_eq!(record.place().len(), PLACE_LEN);
        assert_eq!(record.state(), "MI");

        let mut buf = [0u8; PostalRecord::ENCODED_SIZE];
        record.encode_into(&mut buf);
        assert_eq!(PostalRecord::decode(&buf), record);
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        // 'é' is two bytes; 39 ASCII + 'é' would straddle the 40-byte limit.
        let place = format!("{}é", "a".repeat(39));
        let record = PostalRecord::new(1, &place, "", "", 0.0, 0.0);
        assert_eq!(record.place(), "a".repeat(39));
    }

    #[test]
    fn test_parse_line() {
        let record =
            PostalRecord::parse_line(2, "4756301,St. Cloud,MN,Stearns,45.5412,-94.1819").unwrap();
        assert_eq!(record, sample());
    }

    #[test]
    fn test_parse_line_errors() {
        assert!(matches!(
            PostalRecord::parse_line(3, "4"),
            Err(Error::ParseRecord { line: 3, .. })
        ));
        assert!(PostalRecord::parse_line(1, "xx501,Holtsville,NY,Suffolk,40.8,-73.0").is_err());
        assert!(PostalRecord::parse_line(1, "30501,Holtsville,NY").is_err());
        assert!(PostalRecord::parse_line(1, "30abc,Holtsville,NY,Suffolk,40.8,-73.0").is_err());
    }

    #[test]
    fn test_read_length_indicated() {
        let input = "zip,place,state,county,latitude,longitude\n\
                     38501,Holtsville,NY,Suffolk,40.8154,-73.0451\n\
                     \n\
                     38544,Holtsville,NY,Suffolk,40.8154,-73.0451\n";
        let records = read_length_indicated(input.as_bytes()).unwrap();
        let zips: Vec<Key> = records.iter().map(|r| r.zip()).collect();
        assert_eq!(zips, vec![501, 544]);
        assert_eq!(records[0].county(), "Suffolk");
    }
}
