use std::fs;
use std::io::Write;
use std::path::Path;

use flate2::write::ZlibEncoder;

use super::buffer::BYTE_COUNT_MASK;
use super::compression::{put_u24, Codec, MAX_BLOCK_LEN};
use super::th1::HistogramKind;
use super::RootError;
use crate::data::model::{Axis, Histogram1D};

const FILE_VERSION: i32 = 62206;
const BEGIN: usize = 100;
const KEY_VERSION: i16 = 4;
const DIRECTORY_VERSION: i16 = 5;
/// Added to the file version for the large-file header layout.
const LARGE_FILE_VERSION: i32 = 1_000_000;
/// Added to directory and key versions when seeks are 64-bit.
const WIDE_SEEK_VERSION: i16 = 1000;
/// `kNotDeleted | kIsOnHeap`
const TOBJECT_BITS: u32 = 0x0300_0000;

// ---------------------------------------------------------------------------
// WBuffer – big-endian output buffer
// ---------------------------------------------------------------------------

#[derive(Default)]
struct WBuffer {
    data: Vec<u8>,
}

impl WBuffer {
    fn u8(&mut self, v: u8) {
        self.data.push(v);
    }

    fn i16(&mut self, v: i16) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    fn u16(&mut self, v: u16) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    fn i32(&mut self, v: i32) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    fn f32(&mut self, v: f32) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    fn f64(&mut self, v: f64) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    fn len32(&mut self, v: usize) {
        self.i32(v as i32);
    }

    fn seek(&mut self, wide: bool, v: usize) {
        if wide {
            self.data.extend_from_slice(&(v as i64).to_be_bytes());
        } else {
            self.len32(v);
        }
    }

    fn string(&mut self, s: &str) {
        if s.len() < 255 {
            self.u8(s.len() as u8);
        } else {
            self.u8(255);
            self.u32(s.len() as u32);
        }
        self.data.extend_from_slice(s.as_bytes());
    }

    /// Start a versioned object; returns the position of its byte count.
    fn begin_object(&mut self, version: i16) -> usize {
        let start = self.data.len();
        self.u32(0);
        self.i16(version);
        start
    }

    fn end_object(&mut self, start: usize) {
        let count = (self.data.len() - start - 4) as u32;
        self.data[start..start + 4].copy_from_slice(&(count | BYTE_COUNT_MASK).to_be_bytes());
    }

    fn tnamed(&mut self, name: &str, title: &str) {
        let start = self.begin_object(1);
        self.u16(1);
        self.u32(0);
        self.u32(TOBJECT_BITS);
        self.string(name);
        self.string(title);
        self.end_object(start);
    }

    fn tarray_f64(&mut self, values: &[f64]) {
        self.len32(values.len());
        for &v in values {
            self.f64(v);
        }
    }
}

fn string_len(s: &str) -> usize {
    if s.len() < 255 {
        1 + s.len()
    } else {
        5 + s.len()
    }
}

// ---------------------------------------------------------------------------
// Object streamers
// ---------------------------------------------------------------------------

fn write_axis(buf: &mut WBuffer, name: &str, axis: &Axis) {
    let start = buf.begin_object(10);
    buf.tnamed(name, "");

    let att = buf.begin_object(4);
    buf.i32(510);
    buf.i16(1);
    buf.i16(1);
    buf.i16(42);
    buf.f32(0.005);
    buf.f32(0.035);
    buf.f32(0.03);
    buf.f32(1.0);
    buf.f32(0.035);
    buf.i16(1);
    buf.i16(42);
    buf.end_object(att);

    buf.len32(axis.nbins());
    buf.f64(axis.xmin());
    buf.f64(axis.xmax());
    buf.tarray_f64(axis.edges());
    buf.i32(0);
    buf.i32(0);
    buf.u16(0);
    buf.u8(0);
    buf.string("");
    // Null fLabels and fModLabs pointers.
    buf.u32(0);
    buf.u32(0);
    buf.end_object(start);
}

/// Stream `hist` as a `TH1x` object of the given storage kind.
pub fn encode_histogram(hist: &Histogram1D, kind: HistogramKind) -> Result<Vec<u8>, RootError> {
    let mut buf = WBuffer::default();
    let outer = buf.begin_object(3);
    let th1 = buf.begin_object(8);

    buf.tnamed(&hist.name, &hist.title);
    let line = buf.begin_object(2);
    buf.i16(602);
    buf.i16(1);
    buf.i16(1);
    buf.end_object(line);
    let fill = buf.begin_object(2);
    buf.i16(0);
    buf.i16(1001);
    buf.end_object(fill);
    let marker = buf.begin_object(2);
    buf.i16(1);
    buf.i16(1);
    buf.f32(1.0);
    buf.end_object(marker);

    let ncells = hist.axis().nbins() + 2;
    buf.len32(ncells);
    write_axis(&mut buf, "xaxis", hist.axis());
    let unit = Axis::fixed(1, 0.0, 1.0)?;
    write_axis(&mut buf, "yaxis", &unit);
    write_axis(&mut buf, "zaxis", &unit);

    buf.i16(0);
    buf.i16(1000);
    let total = hist.integral();
    buf.f64(total);
    for _ in 0..4 {
        buf.f64(0.0);
    }
    buf.f64(-1111.0);
    buf.f64(-1111.0);
    buf.f64(0.0);
    buf.tarray_f64(&[]);
    buf.tarray_f64(&[]);
    buf.string("");
    // Null fFunctions pointer, empty fBuffer.
    buf.u32(0);
    buf.i32(0);
    buf.u8(0);
    buf.i32(0);
    buf.i32(2);
    buf.end_object(th1);

    buf.len32(ncells);
    for bin in 0..ncells {
        let v = hist.bin_content(bin);
        match kind {
            HistogramKind::Double => buf.f64(v),
            HistogramKind::Float => buf.f32(v as f32),
            HistogramKind::Int => buf.i32(v as i32),
            HistogramKind::Short => buf.i16(v as i16),
            HistogramKind::Char => buf.u8(v as i8 as u8),
        }
    }
    buf.end_object(outer);
    Ok(buf.data)
}

// ---------------------------------------------------------------------------
// Compression
// ---------------------------------------------------------------------------

fn compress(raw: &[u8], codec: Codec) -> Result<Vec<u8>, RootError> {
    let mut out = Vec::new();
    for chunk in raw.chunks(MAX_BLOCK_LEN) {
        let body = match codec {
            Codec::Zlib => {
                let mut enc = ZlibEncoder::new(Vec::new(), flate2::Compression::new(1));
                enc.write_all(chunk)?;
                enc.finish()?
            }
            Codec::Zstd => zstd::bulk::compress(chunk, 5)?,
        };
        if body.len() > MAX_BLOCK_LEN {
            return Ok(raw.to_vec());
        }
        out.extend_from_slice(codec.tag());
        out.push(codec.method());
        put_u24(&mut out, body.len());
        put_u24(&mut out, chunk.len());
        out.extend_from_slice(&body);
    }
    // Payloads that do not shrink are stored as-is, which is how the reader
    // tells them apart.
    if out.len() >= raw.len() {
        return Ok(raw.to_vec());
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// RootWriter – lays out a whole file
// ---------------------------------------------------------------------------

struct Entry {
    class_name: String,
    name: String,
    title: String,
    cycle: i16,
    objlen: usize,
    payload: Vec<u8>,
}

/// Builder for a flat file of histograms.
///
/// Used for test fixtures and the sample generator. It writes a single flat
/// directory of `TH1` objects with just enough of each streamer for
/// [`RootFile`](super::RootFile) to decode; it does not emit streamer info,
/// so ROOT itself may refuse these files.
pub struct RootWriter {
    codec: Option<Codec>,
    /// Large-file layout: 64-bit seeks in the header, directory and keys.
    wide: bool,
    entries: Vec<Entry>,
}

impl Default for RootWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl RootWriter {
    pub fn new() -> Self {
        RootWriter {
            codec: None,
            wide: false,
            entries: Vec::new(),
        }
    }

    pub fn with_compression(codec: Codec) -> Self {
        RootWriter {
            codec: Some(codec),
            ..RootWriter::new()
        }
    }

    /// Write the layout ROOT uses for files past 2 GB.
    pub fn with_large_layout(mut self) -> Self {
        self.wide = true;
        self
    }

    /// Add a histogram; writing the same name again adds a higher cycle.
    pub fn add_histogram(
        &mut self,
        hist: &Histogram1D,
        kind: HistogramKind,
    ) -> Result<&mut Self, RootError> {
        let raw = encode_histogram(hist, kind)?;
        self.add_object(kind.class_name(), &hist.name, &hist.title, raw)
    }

    /// Add an already streamed object under an arbitrary class name.
    pub fn add_object(
        &mut self,
        class_name: &str,
        name: &str,
        title: &str,
        raw: Vec<u8>,
    ) -> Result<&mut Self, RootError> {
        let cycle = self.entries.iter().filter(|e| e.name == name).count() as i16 + 1;
        let objlen = raw.len();
        let payload = match self.codec {
            Some(codec) => compress(&raw, codec)?,
            None => raw,
        };
        self.entries.push(Entry {
            class_name: class_name.to_string(),
            name: name.to_string(),
            title: title.to_string(),
            cycle,
            objlen,
            payload,
        });
        Ok(self)
    }

    fn compression_setting(&self) -> i32 {
        match self.codec {
            None => 0,
            Some(Codec::Zlib) => 101,
            Some(Codec::Zstd) => 505,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        const FILE_NAME: &str = "stage0.root";
        let wide = self.wide;
        let key = |nbytes, objlen, cycle, seek_key, class_name, name, title| KeyHeader {
            nbytes,
            objlen,
            cycle,
            seek_key,
            class_name,
            name,
            title,
            wide,
        };

        // Directory block: key, file name/title, directory record.
        let dir_keylen = key_len(wide, "TFile", FILE_NAME, "");
        let nbytes_name = dir_keylen + string_len(FILE_NAME) + string_len("");
        let dir_record_len = 2 + 4 * 4 + 3 * seek_len(wide) + 18;
        let dir_block_len = nbytes_name + dir_record_len;

        let mut pos = BEGIN + dir_block_len;
        let mut object_keys = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let keylen = key_len(wide, &entry.class_name, &entry.name, &entry.title);
            let header = key(
                keylen + entry.payload.len(),
                entry.objlen,
                entry.cycle,
                pos,
                entry.class_name.as_str(),
                entry.name.as_str(),
                entry.title.as_str(),
            );
            pos += header.nbytes;
            object_keys.push(header);
        }

        let seek_keys = pos;
        let list_keylen = key_len(wide, "TFile", FILE_NAME, "");
        let nbytes_keys = list_keylen
            + 4
            + object_keys
                .iter()
                .map(|k| key_len(wide, k.class_name, k.name, k.title))
                .sum::<usize>();
        let end = seek_keys + nbytes_keys;

        let mut buf = WBuffer::default();

        // File header.
        buf.data.extend_from_slice(b"root");
        buf.i32(if wide {
            FILE_VERSION + LARGE_FILE_VERSION
        } else {
            FILE_VERSION
        });
        buf.len32(BEGIN);
        buf.seek(wide, end);
        buf.seek(wide, 0);
        buf.i32(0);
        buf.i32(0);
        buf.len32(nbytes_name);
        buf.u8(seek_len(wide) as u8);
        buf.i32(self.compression_setting());
        buf.seek(wide, 0);
        buf.i32(0);
        buf.data.resize(BEGIN, 0);

        key(
            dir_block_len,
            dir_block_len - dir_keylen,
            1,
            BEGIN,
            "TFile",
            FILE_NAME,
            "",
        )
        .write(&mut buf);
        buf.string(FILE_NAME);
        buf.string("");
        buf.i16(if wide {
            DIRECTORY_VERSION + WIDE_SEEK_VERSION
        } else {
            DIRECTORY_VERSION
        });
        buf.u32(0);
        buf.u32(0);
        buf.len32(nbytes_keys);
        buf.len32(nbytes_name);
        buf.seek(wide, BEGIN);
        buf.seek(wide, 0);
        buf.seek(wide, seek_keys);
        buf.data.extend_from_slice(&[0u8; 18]);

        for (header, entry) in object_keys.iter().zip(&self.entries) {
            header.write(&mut buf);
            buf.data.extend_from_slice(&entry.payload);
        }

        key(
            nbytes_keys,
            nbytes_keys - list_keylen,
            1,
            seek_keys,
            "TFile",
            FILE_NAME,
            "",
        )
        .write(&mut buf);
        buf.len32(object_keys.len());
        for header in &object_keys {
            header.write(&mut buf);
        }

        debug_assert_eq!(buf.data.len(), end);
        buf.data
    }

    pub fn write(&self, path: &Path) -> Result<(), RootError> {
        fs::write(path, self.to_bytes())?;
        Ok(())
    }
}

struct KeyHeader<'a> {
    nbytes: usize,
    objlen: usize,
    cycle: i16,
    seek_key: usize,
    class_name: &'a str,
    name: &'a str,
    title: &'a str,
    wide: bool,
}

fn seek_len(wide: bool) -> usize {
    if wide {
        8
    } else {
        4
    }
}

fn key_len(wide: bool, class_name: &str, name: &str, title: &str) -> usize {
    4 + 2 + 4 + 4 + 2 + 2 + 2 * seek_len(wide)
        + string_len(class_name)
        + string_len(name)
        + string_len(title)
}

impl KeyHeader<'_> {
    fn write(&self, buf: &mut WBuffer) {
        buf.len32(self.nbytes);
        buf.i16(if self.wide {
            KEY_VERSION + WIDE_SEEK_VERSION
        } else {
            KEY_VERSION
        });
        buf.len32(self.objlen);
        buf.u32(0);
        buf.i16(key_len(self.wide, self.class_name, self.name, self.title) as i16);
        buf.i16(self.cycle);
        buf.seek(self.wide, self.seek_key);
        buf.seek(self.wide, BEGIN);
        buf.string(self.class_name);
        buf.string(self.name);
        buf.string(self.title);
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::data::root::RootFile;

    fn id_histogram(bin200: f64, bin201: f64) -> Histogram1D {
        let axis = Axis::fixed(1000, 0.0, 1000.0).unwrap();
        let mut values = vec![1.0; 1000];
        values[200] = bin200;
        values[201] = bin201;
        Histogram1D::from_bins("ID", axis, &values, 0.0, 4.0).unwrap()
    }

    fn reopen(bytes: Vec<u8>) -> RootFile<Cursor<Vec<u8>>> {
        RootFile::from_reader(Cursor::new(bytes)).unwrap()
    }

    #[test]
    fn uncompressed_histogram_reads_back() {
        let mut writer = RootWriter::new();
        writer
            .add_histogram(&id_histogram(5.0, 3.0), HistogramKind::Double)
            .unwrap();
        let mut file = reopen(writer.to_bytes());

        assert_eq!(file.compression(), 0);
        assert_eq!(file.keys().len(), 1);
        assert!(!file.keys()[0].is_compressed());

        let hist = file.histogram("ID").unwrap();
        assert_eq!(hist, id_histogram(5.0, 3.0));
        assert_eq!(hist.content_at(200.0), 5.0);
        assert_eq!(hist.content_at(201.0), 3.0);
        assert_eq!(hist.content_at(5000.0), 4.0);
    }

    #[test]
    fn compressed_payloads_read_back() {
        for codec in [Codec::Zlib, Codec::Zstd] {
            let mut writer = RootWriter::with_compression(codec);
            writer
                .add_histogram(&id_histogram(0.0, 7.0), HistogramKind::Double)
                .unwrap();
            let mut file = reopen(writer.to_bytes());
            assert!(file.keys()[0].is_compressed(), "{codec:?}");
            let hist = file.histogram("ID").unwrap();
            assert_eq!(hist.content_at(200.0), 0.0);
            assert_eq!(hist.content_at(201.0), 7.0);
        }
    }

    #[test]
    fn narrow_storage_kinds_decode() {
        let mut writer = RootWriter::new();
        let axis = Axis::variable(vec![0.0, 100.0, 200.0, 300.0]).unwrap();
        let hist = Histogram1D::from_bins("ID", axis, &[1.0, -2.0, 3.0], 0.0, 0.0).unwrap();
        writer.add_histogram(&hist, HistogramKind::Short).unwrap();
        let mut file = reopen(writer.to_bytes());
        let back = file.histogram("ID").unwrap();
        assert_eq!(back.content_at(150.0), -2.0);
        assert_eq!(back.axis().edges(), &[0.0, 100.0, 200.0, 300.0]);

        for kind in [HistogramKind::Float, HistogramKind::Int, HistogramKind::Char] {
            let mut writer = RootWriter::new();
            writer.add_histogram(&hist, kind).unwrap();
            let back = reopen(writer.to_bytes()).histogram("ID").unwrap();
            assert_eq!(back, hist, "{kind:?}");
        }
    }

    #[test]
    fn large_layout_reads_back() {
        for codec in [None, Some(Codec::Zstd)] {
            let writer = match codec {
                Some(codec) => RootWriter::with_compression(codec),
                None => RootWriter::new(),
            };
            let mut writer = writer.with_large_layout();
            writer
                .add_histogram(&id_histogram(5.0, 3.0), HistogramKind::Double)
                .unwrap()
                .add_histogram(&id_histogram(6.0, 0.0), HistogramKind::Double)
                .unwrap();
            let bytes = writer.to_bytes();
            assert_eq!(&bytes[4..8], &(FILE_VERSION + LARGE_FILE_VERSION).to_be_bytes());

            let mut file = reopen(bytes);
            assert_eq!(file.keys().len(), 2);
            assert!(file.keys().iter().all(|k| k.version > WIDE_SEEK_VERSION));
            assert_eq!(file.find_key("ID").map(|k| k.cycle), Some(2));
            let hist = file.histogram("ID").unwrap();
            assert_eq!(hist, id_histogram(6.0, 0.0));
        }
    }

    #[test]
    fn highest_cycle_wins() {
        let mut writer = RootWriter::new();
        writer
            .add_histogram(&id_histogram(0.0, 0.0), HistogramKind::Double)
            .unwrap()
            .add_histogram(&id_histogram(9.0, 9.0), HistogramKind::Double)
            .unwrap();
        let mut file = reopen(writer.to_bytes());
        assert_eq!(file.find_key("ID").map(|k| k.cycle), Some(2));
        assert_eq!(file.histogram("ID").unwrap().content_at(200.0), 9.0);
    }

    #[test]
    fn missing_and_unsupported_objects() {
        let mut writer = RootWriter::new();
        let raw = encode_histogram(&id_histogram(1.0, 1.0), HistogramKind::Double).unwrap();
        writer.add_object("TH2D", "ID", "", raw).unwrap();
        let mut file = reopen(writer.to_bytes());

        assert!(matches!(file.histogram("Esum"), Err(RootError::KeyNotFound(n)) if n == "Esum"));
        assert!(matches!(
            file.histogram("ID"),
            Err(RootError::UnsupportedClass { class, .. }) if class == "TH2D"
        ));
    }

    #[test]
    fn rejects_foreign_files() {
        let err = RootFile::from_reader(Cursor::new(b"PAR1 not root at all".to_vec()))
            .err()
            .unwrap();
        assert!(matches!(err, RootError::BadMagic(m) if &m == b"PAR1"));
    }
}
