use super::RootError;

/// Flag marking the first word of an object header as a byte count.
pub const BYTE_COUNT_MASK: u32 = 0x4000_0000;
/// Same flag as seen from the 16-bit version word.
pub const BYTE_COUNT_VMASK: u16 = 0x4000;
/// `TObject::fBits` flag: object carries a process-id index after the bits.
const IS_REFERENCED: u32 = 1 << 4;

/// A version header read at the start of a streamed object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VersionHeader {
    pub version: i16,
    /// Absolute position just past the object, when a byte count was present.
    pub end: Option<usize>,
}

/// Big-endian cursor over a decoded object or record.
pub struct RBuffer<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> RBuffer<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        RBuffer { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn seek(&mut self, pos: usize) -> Result<(), RootError> {
        if pos > self.data.len() {
            return Err(RootError::Truncated {
                at: pos,
                need: 0,
                len: self.data.len(),
            });
        }
        self.pos = pos;
        Ok(())
    }

    pub fn skip(&mut self, n: usize) -> Result<(), RootError> {
        self.take(n).map(|_| ())
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8], RootError> {
        let end = self.pos.checked_add(n).filter(|&e| e <= self.data.len());
        match end {
            Some(end) => {
                let out = &self.data[self.pos..end];
                self.pos = end;
                Ok(out)
            }
            None => Err(RootError::Truncated {
                at: self.pos,
                need: n,
                len: self.data.len(),
            }),
        }
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], RootError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, RootError> {
        Ok(self.array::<1>()?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, RootError> {
        Ok(i8::from_be_bytes(self.array()?))
    }

    pub fn read_i16(&mut self) -> Result<i16, RootError> {
        Ok(i16::from_be_bytes(self.array()?))
    }

    pub fn read_u16(&mut self) -> Result<u16, RootError> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, RootError> {
        Ok(i32::from_be_bytes(self.array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, RootError> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64, RootError> {
        Ok(i64::from_be_bytes(self.array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32, RootError> {
        Ok(f32::from_be_bytes(self.array()?))
    }

    pub fn read_f64(&mut self) -> Result<f64, RootError> {
        Ok(f64::from_be_bytes(self.array()?))
    }

    /// A seek pointer: 64-bit when `wide`, 32-bit otherwise.
    pub fn read_seek(&mut self, wide: bool) -> Result<u64, RootError> {
        let value = if wide {
            self.read_i64()?
        } else {
            self.read_i32()? as i64
        };
        u64::try_from(value).map_err(|_| RootError::Malformed(format!("negative seek {value}")))
    }

    /// A count that must be non-negative.
    pub fn read_len(&mut self) -> Result<usize, RootError> {
        let n = self.read_i32()?;
        usize::try_from(n).map_err(|_| RootError::Malformed(format!("negative length {n}")))
    }

    /// `TString`: one length byte, or 255 followed by a 32-bit length.
    pub fn read_string(&mut self) -> Result<String, RootError> {
        let short = self.read_u8()?;
        let len = if short == 255 {
            self.read_u32()? as usize
        } else {
            short as usize
        };
        let bytes = self.take(len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Object version header, with or without a leading byte count.
    ///
    /// The flag sits in the high half of the byte count, so the first 16 bits
    /// tell whether a count or a bare version follows.
    pub fn read_version(&mut self) -> Result<VersionHeader, RootError> {
        let start = self.pos;
        let high = self.read_u16()?;
        if high & BYTE_COUNT_VMASK == 0 {
            return Ok(VersionHeader {
                version: high as i16,
                end: None,
            });
        }

        let low = self.read_u16()?;
        let word = (u32::from(high) << 16) | u32::from(low);
        let count = (word & !BYTE_COUNT_MASK) as usize;
        let end = start + 4 + count;
        if end > self.data.len() {
            return Err(RootError::Truncated {
                at: start,
                need: count + 4,
                len: self.data.len(),
            });
        }
        let version = self.read_i16()?;
        Ok(VersionHeader {
            version,
            end: Some(end),
        })
    }

    /// Move to the end recorded in `header`.
    pub fn finish(&mut self, header: VersionHeader, class: &str) -> Result<(), RootError> {
        match header.end {
            Some(end) => self.seek(end),
            None => Err(RootError::Malformed(format!(
                "{class} has no byte count, cannot skip its remaining members"
            ))),
        }
    }

    /// Skip a whole versioned object using its byte count.
    pub fn skip_object(&mut self, class: &str) -> Result<(), RootError> {
        let header = self.read_version()?;
        self.finish(header, class)
    }

    /// Skip the `TObject` base, which is streamed without a byte count.
    pub fn skip_tobject(&mut self) -> Result<(), RootError> {
        let version = self.read_u16()?;
        if version & BYTE_COUNT_VMASK != 0 {
            self.skip(4)?;
        }
        let _unique_id = self.read_u32()?;
        let bits = self.read_u32()?;
        if bits & IS_REFERENCED != 0 {
            self.skip(2)?;
        }
        Ok(())
    }

    /// `TNamed`: returns `(name, title)`.
    pub fn read_tnamed(&mut self) -> Result<(String, String), RootError> {
        let header = self.read_version()?;
        self.skip_tobject()?;
        let name = self.read_string()?;
        let title = self.read_string()?;
        if let Some(end) = header.end {
            self.seek(end)?;
        }
        Ok((name, title))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_short_and_long_strings() {
        let long = "x".repeat(300);
        let mut data = vec![2, b'I', b'D', 255];
        data.extend_from_slice(&300u32.to_be_bytes());
        data.extend_from_slice(long.as_bytes());

        let mut buf = RBuffer::new(&data);
        assert_eq!(buf.read_string().unwrap(), "ID");
        assert_eq!(buf.read_string().unwrap(), long);
        assert_eq!(buf.remaining(), 0);
    }

    #[test]
    fn version_with_and_without_byte_count() {
        let mut data = Vec::new();
        data.extend_from_slice(&(BYTE_COUNT_MASK | 6).to_be_bytes());
        data.extend_from_slice(&3i16.to_be_bytes());
        data.extend_from_slice(&[0xAA; 4]);
        data.extend_from_slice(&5i16.to_be_bytes());

        let mut buf = RBuffer::new(&data);
        let header = buf.read_version().unwrap();
        assert_eq!(
            header,
            VersionHeader {
                version: 3,
                end: Some(10)
            }
        );
        buf.finish(header, "TH1D").unwrap();

        let bare = buf.read_version().unwrap();
        assert_eq!(bare, VersionHeader { version: 5, end: None });
        assert_eq!(buf.remaining(), 0);
        assert!(buf.finish(bare, "TAxis").is_err());
    }

    #[test]
    fn bare_version_needs_only_two_bytes() {
        let data = 5i16.to_be_bytes();
        let mut buf = RBuffer::new(&data);
        assert_eq!(
            buf.read_version().unwrap(),
            VersionHeader { version: 5, end: None }
        );
    }

    #[test]
    fn byte_count_past_the_buffer_is_truncation() {
        let mut data = (BYTE_COUNT_MASK | 40).to_be_bytes().to_vec();
        data.extend_from_slice(&3i16.to_be_bytes());
        let mut buf = RBuffer::new(&data);
        assert!(matches!(
            buf.read_version(),
            Err(RootError::Truncated { at: 0, need: 44, len: 6 })
        ));
    }

    #[test]
    fn truncation_is_an_error() {
        let data = [0u8, 1];
        let mut buf = RBuffer::new(&data);
        assert!(matches!(
            buf.read_i32(),
            Err(RootError::Truncated { at: 0, need: 4, len: 2 })
        ));
    }
}
