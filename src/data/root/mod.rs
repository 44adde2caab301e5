/// Reader for the ROOT container files written by the stage0 pass.
///
/// Only what is needed to pull a top-level 1-D histogram out of a file is
/// implemented: the file header, the top directory and its key list,
/// compressed object payloads, and the `TH1` family streamers.
mod buffer;
mod compression;
mod file;
mod th1;
pub mod writer;

use thiserror::Error;

use super::model::HistogramError;

pub use compression::Codec;
pub use file::{Key, RootFile};
pub use th1::HistogramKind;

/// Errors raised while reading a ROOT file.
#[derive(Debug, Error)]
pub enum RootError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a ROOT file (magic {0:?})")]
    BadMagic([u8; 4]),

    #[error("record truncated: need {need} bytes at offset {at}, buffer holds {len}")]
    Truncated { at: usize, need: usize, len: usize },

    #[error("unsupported compression algorithm {0:?}")]
    UnsupportedCompression(String),

    #[error("decompression failed: {0}")]
    Decompress(String),

    #[error("no object named {0:?} in the top directory")]
    KeyNotFound(String),

    #[error("object {name:?} is a {class}, not a supported 1-D histogram")]
    UnsupportedClass { name: String, class: String },

    #[error("malformed record: {0}")]
    Malformed(String),

    #[error("invalid histogram: {0}")]
    Histogram(#[from] HistogramError),
}
