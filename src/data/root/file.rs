use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use log::{debug, trace};

use super::buffer::RBuffer;
use super::compression;
use super::th1;
use super::RootError;
use crate::data::model::Histogram1D;

const MAGIC: &[u8; 4] = b"root";
/// Enough for the large-file header layout including the UUID.
const HEADER_PEEK: u64 = 128;
/// Enough for the large-file directory record.
const DIRECTORY_PEEK: u64 = 64;
/// File versions from here on use 64-bit seeks in the header.
const LARGE_FILE_VERSION: i32 = 1_000_000;
/// Directory and key versions above this use 64-bit seeks.
const WIDE_SEEK_VERSION: i16 = 1000;

// ---------------------------------------------------------------------------
// File header and top directory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct FileHeader {
    version: i32,
    begin: u64,
    end: u64,
    nbytes_name: u64,
    compress: i32,
}

impl FileHeader {
    fn parse(data: &[u8]) -> Result<Self, RootError> {
        let mut buf = RBuffer::new(data);
        let magic = buf.take(4)?;
        if magic != MAGIC {
            let mut found = [0u8; 4];
            found.copy_from_slice(magic);
            return Err(RootError::BadMagic(found));
        }

        let version = buf.read_i32()?;
        let wide = version >= LARGE_FILE_VERSION;
        let begin = buf.read_seek(false)?;
        let end = buf.read_seek(wide)?;
        let _seek_free = buf.read_seek(wide)?;
        let _nbytes_free = buf.read_i32()?;
        let _nfree = buf.read_i32()?;
        let nbytes_name = buf.read_len()? as u64;
        let _units = buf.read_u8()?;
        let compress = buf.read_i32()?;

        Ok(FileHeader {
            version,
            begin,
            end,
            nbytes_name,
            compress,
        })
    }
}

#[derive(Debug, Clone)]
struct Directory {
    nbytes_keys: usize,
    seek_keys: u64,
}

impl Directory {
    fn parse(data: &[u8]) -> Result<Self, RootError> {
        let mut buf = RBuffer::new(data);
        let version = buf.read_i16()?;
        let wide = version > WIDE_SEEK_VERSION;
        let _ctime = buf.read_u32()?;
        let _mtime = buf.read_u32()?;
        let nbytes_keys = buf.read_len()?;
        let _nbytes_name = buf.read_i32()?;
        let _seek_dir = buf.read_seek(wide)?;
        let _seek_parent = buf.read_seek(wide)?;
        let seek_keys = buf.read_seek(wide)?;
        Ok(Directory {
            nbytes_keys,
            seek_keys,
        })
    }
}

// ---------------------------------------------------------------------------
// Key – directory entry describing one stored object
// ---------------------------------------------------------------------------

/// One entry of a directory's key list.
#[derive(Debug, Clone, PartialEq)]
pub struct Key {
    /// Total bytes on disk, key header included.
    pub nbytes: usize,
    pub version: i16,
    /// Uncompressed object length.
    pub objlen: usize,
    pub keylen: usize,
    pub cycle: i16,
    pub seek_key: u64,
    pub class_name: String,
    pub name: String,
    pub title: String,
}

impl Key {
    pub(super) fn parse(buf: &mut RBuffer<'_>) -> Result<Self, RootError> {
        let nbytes = buf.read_len()?;
        let version = buf.read_i16()?;
        let objlen = buf.read_len()?;
        let _datime = buf.read_u32()?;
        let keylen = buf.read_i16()?;
        let cycle = buf.read_i16()?;
        let wide = version > WIDE_SEEK_VERSION;
        let seek_key = buf.read_seek(wide)?;
        let _seek_pdir = buf.read_seek(wide)?;
        let class_name = buf.read_string()?;
        let name = buf.read_string()?;
        let title = buf.read_string()?;

        let keylen = usize::try_from(keylen)
            .map_err(|_| RootError::Malformed(format!("key {name:?} has negative length")))?;
        if keylen > nbytes {
            return Err(RootError::Malformed(format!(
                "key {name:?} header ({keylen} bytes) longer than record ({nbytes} bytes)"
            )));
        }

        Ok(Key {
            nbytes,
            version,
            objlen,
            keylen,
            cycle,
            seek_key,
            class_name,
            name,
            title,
        })
    }

    /// Whether the payload on disk is a sequence of compressed blocks.
    pub fn is_compressed(&self) -> bool {
        self.objlen != self.nbytes - self.keylen
    }
}

// ---------------------------------------------------------------------------
// RootFile – an open file and its top-level keys
// ---------------------------------------------------------------------------

/// An open ROOT file with its top-level key list loaded.
pub struct RootFile<R> {
    reader: R,
    header: FileHeader,
    keys: Vec<Key>,
}

impl RootFile<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self, RootError> {
        let file = File::open(path)?;
        RootFile::from_reader(BufReader::new(file))
    }
}

impl<R: Read + Seek> RootFile<R> {
    pub fn from_reader(mut reader: R) -> Result<Self, RootError> {
        let head = read_up_to(&mut reader, 0, HEADER_PEEK)?;
        let header = FileHeader::parse(&head)?;
        trace!(
            "ROOT file version {} (compression {}), fBEGIN {}, fEND {}",
            header.version,
            header.compress,
            header.begin,
            header.end
        );

        let dir_record = read_up_to(&mut reader, header.begin + header.nbytes_name, DIRECTORY_PEEK)?;
        let directory = Directory::parse(&dir_record)?;

        let key_block = read_exact_at(&mut reader, directory.seek_keys, directory.nbytes_keys)?;
        let mut buf = RBuffer::new(&key_block);
        let _list_key = Key::parse(&mut buf)?;
        let nkeys = buf.read_len()?;
        let keys = (0..nkeys)
            .map(|_| Key::parse(&mut buf))
            .collect::<Result<Vec<_>, _>>()?;
        debug!("top directory holds {} keys", keys.len());

        Ok(RootFile {
            reader,
            header,
            keys,
        })
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    /// Compression setting recorded in the file header (`algorithm * 100 + level`).
    pub fn compression(&self) -> i32 {
        self.header.compress
    }

    /// The key named `name` with the highest cycle.
    pub fn find_key(&self, name: &str) -> Option<&Key> {
        self.keys
            .iter()
            .filter(|k| k.name == name)
            .max_by_key(|k| k.cycle)
    }

    /// Uncompressed object bytes for `key`.
    pub fn read_object(&mut self, key: &Key) -> Result<Vec<u8>, RootError> {
        let record = read_exact_at(&mut self.reader, key.seek_key, key.nbytes)?;
        let payload = &record[key.keylen..];
        if key.is_compressed() {
            compression::decompress(payload, key.objlen)
        } else {
            Ok(payload.to_vec())
        }
    }

    /// Fetch the top-level 1-D histogram called `name`.
    pub fn histogram(&mut self, name: &str) -> Result<Histogram1D, RootError> {
        let key = self
            .find_key(name)
            .cloned()
            .ok_or_else(|| RootError::KeyNotFound(name.to_string()))?;
        let kind = th1::HistogramKind::from_class(&key.class_name).ok_or_else(|| {
            RootError::UnsupportedClass {
                name: key.name.clone(),
                class: key.class_name.clone(),
            }
        })?;
        let data = self.read_object(&key)?;
        th1::decode(&data, kind)
    }
}

fn read_exact_at<R: Read + Seek>(
    reader: &mut R,
    offset: u64,
    len: usize,
) -> Result<Vec<u8>, RootError> {
    reader.seek(SeekFrom::Start(offset))?;
    let mut out = vec![0u8; len];
    reader.read_exact(&mut out)?;
    Ok(out)
}

/// Read at most `len` bytes; records near the end of small files may be shorter.
fn read_up_to<R: Read + Seek>(reader: &mut R, offset: u64, len: u64) -> Result<Vec<u8>, RootError> {
    reader.seek(SeekFrom::Start(offset))?;
    let mut out = Vec::with_capacity(len as usize);
    reader.by_ref().take(len).read_to_end(&mut out)?;
    Ok(out)
}
