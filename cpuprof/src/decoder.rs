//! # Raw CPU Sample Stream Decoding
//!
//! The sampling profiler emits a flat sequence of 64-bit words. The stream is
//! a series of variable-length records, each starting with its own word
//! count (the count includes itself):
//!
//! ```text
//! header:  [3, 0, period]                           period in microseconds
//! sample:  [N, 0, count, addr_0, ..., addr_{N-4}]  N >= 3
//! ```
//!
//! The second word of every record is reserved and must be zero. A sample
//! record with no addresses (`N == 3`) is a count-only marker and produces no
//! stack. Any inconsistency aborts decoding; there is no best-effort
//! recovery.

use log::debug;

use crate::domain::FormatError;

/// Words in the header record and the minimum length of any record.
const RECORD_PREFIX_WORDS: usize = 3;

/// Byte order of a raw stream handed over as bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
    /// Byte order of the machine running the decoder (the producer's order
    /// when decoding in-process).
    #[default]
    Native,
    Little,
    Big,
}

/// Split a raw byte buffer into 64-bit words.
///
/// # Errors
/// Returns [`FormatError::PartialWord`] if the length is not a multiple of 8.
pub fn words_from_bytes(bytes: &[u8], endianness: Endianness) -> Result<Vec<u64>, FormatError> {
    if bytes.len() % 8 != 0 {
        return Err(FormatError::PartialWord { len: bytes.len() });
    }

    let words = bytes
        .chunks_exact(8)
        .map(|chunk| {
            let mut word = [0u8; 8];
            word.copy_from_slice(chunk);
            match endianness {
                Endianness::Native => u64::from_ne_bytes(word),
                Endianness::Little => u64::from_le_bytes(word),
                Endianness::Big => u64::from_be_bytes(word),
            }
        })
        .collect();

    Ok(words)
}

/// One stack record, borrowing its addresses from the input stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackRecord<'a> {
    /// Number of samples this stack represents.
    pub count: u64,
    /// Raw addresses in stream order.
    pub addresses: &'a [u64],
}

impl StackRecord<'_> {
    #[must_use]
    pub fn to_owned_record(&self) -> OwnedStackRecord {
        OwnedStackRecord { count: self.count, addresses: self.addresses.to_vec() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedStackRecord {
    pub count: u64,
    pub addresses: Vec<u64>,
}

/// A fully decoded stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedStream {
    /// Sampling period in the stream's unit (microseconds).
    pub period: u64,
    pub records: Vec<OwnedStackRecord>,
}

/// Streaming decoder over a word slice.
///
/// The header is validated on construction; stack records are produced by
/// iteration. After the first error the iterator is exhausted.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    words: &'a [u64],
    pos: usize,
    period: u64,
    failed: bool,
}

impl<'a> Decoder<'a> {
    /// Validate the header record and position the decoder after it.
    ///
    /// # Errors
    /// Returns a [`FormatError`] if the stream is empty or does not start
    /// with a `[3, 0, period]` record.
    pub fn new(words: &'a [u64]) -> Result<Self, FormatError> {
        if words.is_empty() {
            return Err(FormatError::MissingHeader);
        }

        let header = &words[..words.len().min(RECORD_PREFIX_WORDS)];
        match *header {
            [3, 0, period] => {
                debug!("Stream header: period {period}us, {} words", words.len());
                Ok(Self { words, pos: RECORD_PREFIX_WORDS, period, failed: false })
            }
            _ => Err(FormatError::BadHeader { found: header.to_vec() }),
        }
    }

    /// Sampling period declared by the header, in microseconds.
    #[must_use]
    pub fn period(&self) -> u64 {
        self.period
    }

    /// Word offset of the next record.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Read the record at the current position, advancing past it.
    ///
    /// Returns `Ok(None)` for a count-only marker.
    fn read_record(&mut self) -> Result<Option<StackRecord<'a>>, FormatError> {
        let offset = self.pos;
        let remaining = self.words.len() - offset;
        let declared = self.words[offset];

        if declared < RECORD_PREFIX_WORDS as u64 {
            return Err(FormatError::InvalidLength { offset, declared });
        }
        let len = usize::try_from(declared)
            .ok()
            .filter(|&len| len <= remaining)
            .ok_or(FormatError::Truncated { offset, declared, remaining })?;

        let record = &self.words[offset..offset + len];
        if record[1] != 0 {
            return Err(FormatError::NonZeroReserved { offset, value: record[1] });
        }
        self.pos += len;

        let count = record[2];
        let addresses = &record[RECORD_PREFIX_WORDS..];
        if addresses.is_empty() {
            debug!("Skipping count-only record at word {offset} (count {count})");
            return Ok(None);
        }

        Ok(Some(StackRecord { count, addresses }))
    }
}

impl<'a> Iterator for Decoder<'a> {
    type Item = Result<StackRecord<'a>, FormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.failed && self.pos < self.words.len() {
            match self.read_record() {
                Ok(Some(record)) => return Some(Ok(record)),
                Ok(None) => {}
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

/// Decode a whole stream into owned records.
///
/// # Errors
/// Returns the first [`FormatError`] encountered; no partial result.
pub fn decode(words: &[u64]) -> Result<DecodedStream, FormatError> {
    let decoder = Decoder::new(words)?;
    let period = decoder.period();
    let records = decoder
        .map(|record| record.map(|r| r.to_owned_record()))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DecodedStream { period, records })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_only() {
        let decoded = decode(&[3, 0, 2000]).unwrap();
        assert_eq!(decoded.period, 2000);
        assert!(decoded.records.is_empty());
    }

    #[test]
    fn test_records_preserve_order() {
        let words = [3, 0, 100, 5, 0, 10, 0xA, 0xC, 4, 0, 7, 0xB];
        let decoded = decode(&words).unwrap();

        assert_eq!(
            decoded.records,
            vec![
                OwnedStackRecord { count: 10, addresses: vec![0xA, 0xC] },
                OwnedStackRecord { count: 7, addresses: vec![0xB] },
            ]
        );
    }

    #[test]
    fn test_count_only_marker_is_skipped() {
        let words = [3, 0, 100, 3, 0, 5, 4, 0, 1, 0xA];
        let decoded = decode(&words).unwrap();

        assert_eq!(decoded.records, vec![OwnedStackRecord { count: 1, addresses: vec![0xA] }]);
    }

    #[test]
    fn test_empty_stream_rejected() {
        assert_eq!(decode(&[]), Err(FormatError::MissingHeader));
    }

    #[test]
    fn test_bad_header_rejected() {
        assert_eq!(
            decode(&[4, 0, 2000, 0]),
            Err(FormatError::BadHeader { found: vec![4, 0, 2000] })
        );
        assert_eq!(decode(&[3, 1, 2000]), Err(FormatError::BadHeader { found: vec![3, 1, 2000] }));
        assert_eq!(decode(&[3, 0]), Err(FormatError::BadHeader { found: vec![3, 0] }));
    }

    #[test]
    fn test_truncated_record_rejected() {
        let words = [3, 0, 100, 6, 0, 10, 0xA, 0xB];
        assert_eq!(
            decode(&words),
            Err(FormatError::Truncated { offset: 3, declared: 6, remaining: 5 })
        );
    }

    #[test]
    fn test_short_record_length_rejected() {
        let words = [3, 0, 100, 2, 0];
        assert_eq!(decode(&words), Err(FormatError::InvalidLength { offset: 3, declared: 2 }));

        // A zero length would otherwise never advance
        let words = [3, 0, 100, 0];
        assert_eq!(decode(&words), Err(FormatError::InvalidLength { offset: 3, declared: 0 }));
    }

    #[test]
    fn test_nonzero_reserved_rejected() {
        let words = [3, 0, 100, 4, 9, 1, 0xA];
        assert_eq!(decode(&words), Err(FormatError::NonZeroReserved { offset: 3, value: 9 }));
    }

    #[test]
    fn test_iterator_stops_after_error() {
        let words = [3, 0, 100, 4, 0, 1, 0xA, 4, 7, 1, 0xB, 4, 0, 1, 0xC];
        let mut decoder = Decoder::new(&words).unwrap();

        assert!(decoder.next().unwrap().is_ok());
        assert!(decoder.next().unwrap().is_err());
        assert!(decoder.next().is_none());
    }

    #[test]
    fn test_words_from_bytes() {
        let mut bytes = Vec::new();
        for word in [3u64, 0, 2000] {
            bytes.extend_from_slice(&word.to_le_bytes());
        }

        assert_eq!(words_from_bytes(&bytes, Endianness::Little).unwrap(), vec![3, 0, 2000]);
        assert_eq!(
            words_from_bytes(&bytes[..20], Endianness::Little),
            Err(FormatError::PartialWord { len: 20 })
        );
    }

    #[test]
    fn test_words_from_big_endian_bytes() {
        let bytes = 2000u64.to_be_bytes();
        assert_eq!(words_from_bytes(&bytes, Endianness::Big).unwrap(), vec![2000]);
    }
}
