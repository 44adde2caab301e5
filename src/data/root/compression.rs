use std::io::Read;

use flate2::read::ZlibDecoder;

use super::RootError;

/// Size of the header in front of every compressed block.
pub const BLOCK_HEADER_LEN: usize = 9;
/// Largest payload a single block can describe (24-bit sizes).
pub const MAX_BLOCK_LEN: usize = 0xFF_FFFF;

/// Algorithms a block header can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Zlib,
    Zstd,
}

impl Codec {
    pub fn tag(self) -> &'static [u8; 2] {
        match self {
            Codec::Zlib => b"ZL",
            Codec::Zstd => b"ZS",
        }
    }

    /// Method byte ROOT writes after the tag.
    pub fn method(self) -> u8 {
        match self {
            Codec::Zlib => 8,
            Codec::Zstd => 1,
        }
    }

    fn from_tag(tag: [u8; 2]) -> Result<Self, RootError> {
        match &tag {
            b"ZL" => Ok(Codec::Zlib),
            b"ZS" => Ok(Codec::Zstd),
            _ => Err(RootError::UnsupportedCompression(
                String::from_utf8_lossy(&tag).into_owned(),
            )),
        }
    }
}

fn u24(bytes: &[u8]) -> usize {
    bytes[0] as usize | (bytes[1] as usize) << 8 | (bytes[2] as usize) << 16
}

/// Encode a 24-bit little-endian size.
pub fn put_u24(out: &mut Vec<u8>, value: usize) {
    out.extend_from_slice(&[value as u8, (value >> 8) as u8, (value >> 16) as u8]);
}

/// Inflate a sequence of compressed blocks into exactly `expected` bytes.
pub fn decompress(mut input: &[u8], expected: usize) -> Result<Vec<u8>, RootError> {
    let mut out = Vec::with_capacity(expected);

    while out.len() < expected {
        if input.len() < BLOCK_HEADER_LEN {
            return Err(RootError::Decompress(format!(
                "block header truncated after {} of {expected} bytes",
                out.len()
            )));
        }
        let codec = Codec::from_tag([input[0], input[1]])?;
        let compressed_len = u24(&input[3..6]);
        let raw_len = u24(&input[6..9]);
        let body = input
            .get(BLOCK_HEADER_LEN..BLOCK_HEADER_LEN + compressed_len)
            .ok_or_else(|| {
                RootError::Decompress(format!(
                    "block claims {compressed_len} bytes, {} available",
                    input.len() - BLOCK_HEADER_LEN
                ))
            })?;

        let block = match codec {
            Codec::Zlib => {
                let mut block = Vec::with_capacity(raw_len);
                ZlibDecoder::new(body)
                    .read_to_end(&mut block)
                    .map_err(|e| RootError::Decompress(format!("zlib: {e}")))?;
                block
            }
            Codec::Zstd => zstd::bulk::decompress(body, raw_len)
                .map_err(|e| RootError::Decompress(format!("zstd: {e}")))?,
        };
        if block.len() != raw_len {
            return Err(RootError::Decompress(format!(
                "block inflated to {} bytes, header says {raw_len}",
                block.len()
            )));
        }

        out.extend_from_slice(&block);
        input = &input[BLOCK_HEADER_LEN + compressed_len..];
    }

    if out.len() != expected {
        return Err(RootError::Decompress(format!(
            "object inflated to {} bytes, key says {expected}",
            out.len()
        )));
    }
    Ok(out)
}
