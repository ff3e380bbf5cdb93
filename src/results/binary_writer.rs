use super::{FrequencyResult, ModeResult, PortResult, ResultSink, SinkError};

use bytes::{Buf, BufMut, BytesMut};
use num_complex::Complex64;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/*
    Record layout (little endian)

    u64 frequency index | f64 normalized frequency | f64 wavelength | u64 max modes | f64 total power
    u64 N | N x c64 field
    u64 P | P x port:
        u64 port | u64 B | B x u64 boundary node
        u64 M | M x mode:
            f64 eigenvalue | c64 beta | u8 propagating | c64 scattering
            u8 flag [c64 normalized beta] | u8 flag [f64 defect confinement]
            u64 V | V x c64 eigenvector

    Index file: one (u64 offset, u64 length) pair per record, in append order
*/

const INDEX_ENTRY_SIZE: usize = 16;

fn data_path(dir: &Path, prefix: &str) -> PathBuf {
    dir.join(format!("{}.dat", prefix))
}

fn index_path(dir: &Path, prefix: &str) -> PathBuf {
    dir.join(format!("{}.idx", prefix))
}

/// Appends binary-encoded results to `<prefix>.dat` and their offsets to `<prefix>.idx`
pub struct BinaryResultWriter {
    data: BufWriter<File>,
    index: BufWriter<File>,
    offset: u64,
}

impl BinaryResultWriter {
    /// Open (or create) the data and index files, appending after any existing records
    pub fn create(dir: impl AsRef<Path>, prefix: &str) -> std::io::Result<Self> {
        let open = |path: PathBuf| OpenOptions::new().create(true).append(true).open(path);
        let data = open(data_path(dir.as_ref(), prefix))?;
        let index = open(index_path(dir.as_ref(), prefix))?;
        let offset = data.metadata()?.len();

        Ok(Self {
            data: BufWriter::new(data),
            index: BufWriter::new(index),
            offset,
        })
    }
}

impl ResultSink for BinaryResultWriter {
    fn persist(&mut self, result: &FrequencyResult) -> Result<(), SinkError> {
        let mut record = BytesMut::new();
        encode_result(result, &mut record);

        self.data.write_all(&record)?;
        self.data.flush()?;

        let mut entry = BytesMut::with_capacity(INDEX_ENTRY_SIZE);
        entry.put_u64_le(self.offset);
        entry.put_u64_le(record.len() as u64);
        self.index.write_all(&entry)?;
        self.index.flush()?;

        self.offset += record.len() as u64;
        Ok(())
    }
}

/// Random access to results written by a [BinaryResultWriter]
pub struct BinaryResultReader {
    data: File,
    entries: Vec<(u64, u64)>,
}

impl BinaryResultReader {
    pub fn open(dir: impl AsRef<Path>, prefix: &str) -> Result<Self, SinkError> {
        let data = File::open(data_path(dir.as_ref(), prefix))?;
        let mut index_bytes = Vec::new();
        File::open(index_path(dir.as_ref(), prefix))?.read_to_end(&mut index_bytes)?;

        if index_bytes.len() % INDEX_ENTRY_SIZE != 0 {
            return Err(SinkError::Corrupt(format!(
                "index file length ({}) is not a multiple of {}",
                index_bytes.len(),
                INDEX_ENTRY_SIZE
            )));
        }

        let mut buf = index_bytes.as_slice();
        let mut entries = Vec::with_capacity(index_bytes.len() / INDEX_ENTRY_SIZE);
        while buf.has_remaining() {
            entries.push((buf.get_u64_le(), buf.get_u64_le()));
        }

        Ok(Self { data, entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read the `n`th appended result
    pub fn read(&mut self, n: usize) -> Result<FrequencyResult, SinkError> {
        let (offset, length) = *self.entries.get(n).ok_or(SinkError::IndexOutOfRange {
            index: n,
            len: self.entries.len(),
        })?;

        let mut record = vec![0; length as usize];
        self.data.seek(SeekFrom::Start(offset))?;
        self.data.read_exact(&mut record)?;

        let mut buf = record.as_slice();
        let result = decode_result(&mut buf)?;
        if buf.has_remaining() {
            return Err(SinkError::Corrupt(format!(
                "{} trailing bytes after record {}",
                buf.remaining(),
                n
            )));
        }
        Ok(result)
    }
}

// ----------------------------------------------------------------------------------------------------
// Encoding
// ----------------------------------------------------------------------------------------------------

fn put_c64(buf: &mut BytesMut, value: Complex64) {
    buf.put_f64_le(value.re);
    buf.put_f64_le(value.im);
}

fn put_c64_list(buf: &mut BytesMut, values: &[Complex64]) {
    buf.put_u64_le(values.len() as u64);
    values.iter().for_each(|v| put_c64(buf, *v));
}

fn encode_result(result: &FrequencyResult, buf: &mut BytesMut) {
    buf.put_u64_le(result.frequency_index as u64);
    buf.put_f64_le(result.normalized_frequency);
    buf.put_f64_le(result.wavelength);
    buf.put_u64_le(result.max_modes as u64);
    buf.put_f64_le(result.total_power);
    put_c64_list(buf, &result.field);

    buf.put_u64_le(result.ports.len() as u64);
    for port in result.ports.iter() {
        buf.put_u64_le(port.port as u64);
        buf.put_u64_le(port.boundary_nodes.len() as u64);
        port.boundary_nodes
            .iter()
            .for_each(|id| buf.put_u64_le(*id as u64));

        buf.put_u64_le(port.modes.len() as u64);
        for mode in port.modes.iter() {
            buf.put_f64_le(mode.eigenvalue);
            put_c64(buf, mode.beta);
            buf.put_u8(mode.propagating as u8);
            put_c64(buf, mode.scattering);
            match mode.normalized_beta {
                Some(value) => {
                    buf.put_u8(1);
                    put_c64(buf, value);
                }
                None => buf.put_u8(0),
            }
            match mode.defect_confinement {
                Some(value) => {
                    buf.put_u8(1);
                    buf.put_f64_le(value);
                }
                None => buf.put_u8(0),
            }
            put_c64_list(buf, &mode.eigenvector);
        }
    }
}

// ----------------------------------------------------------------------------------------------------
// Decoding
// ----------------------------------------------------------------------------------------------------

fn ensure(buf: &&[u8], needed: usize) -> Result<(), SinkError> {
    if buf.remaining() < needed {
        Err(SinkError::Corrupt(format!(
            "record ended early ({} bytes left, {} needed)",
            buf.remaining(),
            needed
        )))
    } else {
        Ok(())
    }
}

fn get_u64(buf: &mut &[u8]) -> Result<u64, SinkError> {
    ensure(buf, 8)?;
    Ok(buf.get_u64_le())
}

fn get_len(buf: &mut &[u8], item_size: usize) -> Result<usize, SinkError> {
    let len = get_u64(buf)? as usize;
    ensure(buf, len.saturating_mul(item_size))?;
    Ok(len)
}

fn get_f64(buf: &mut &[u8]) -> Result<f64, SinkError> {
    ensure(buf, 8)?;
    Ok(buf.get_f64_le())
}

fn get_u8(buf: &mut &[u8]) -> Result<u8, SinkError> {
    ensure(buf, 1)?;
    Ok(buf.get_u8())
}

fn get_c64(buf: &mut &[u8]) -> Result<Complex64, SinkError> {
    Ok(Complex64::new(get_f64(buf)?, get_f64(buf)?))
}

fn get_c64_list(buf: &mut &[u8]) -> Result<Vec<Complex64>, SinkError> {
    let len = get_len(buf, 16)?;
    (0..len).map(|_| get_c64(buf)).collect()
}

fn get_flag(buf: &mut &[u8]) -> Result<bool, SinkError> {
    match get_u8(buf)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(SinkError::Corrupt(format!("invalid flag byte {}", other))),
    }
}

fn decode_result(buf: &mut &[u8]) -> Result<FrequencyResult, SinkError> {
    let frequency_index = get_u64(buf)? as usize;
    let normalized_frequency = get_f64(buf)?;
    let wavelength = get_f64(buf)?;
    let max_modes = get_u64(buf)? as usize;
    let total_power = get_f64(buf)?;
    let field = get_c64_list(buf)?;

    let num_ports = get_u64(buf)? as usize;
    let mut ports = Vec::with_capacity(num_ports.min(buf.remaining()));
    for _ in 0..num_ports {
        let port = get_u64(buf)? as usize;
        let num_nodes = get_len(buf, 8)?;
        let boundary_nodes = (0..num_nodes)
            .map(|_| get_u64(buf).map(|id| id as usize))
            .collect::<Result<Vec<_>, _>>()?;

        let num_modes = get_u64(buf)? as usize;
        let mut modes = Vec::with_capacity(num_modes.min(buf.remaining()));
        for _ in 0..num_modes {
            let eigenvalue = get_f64(buf)?;
            let beta = get_c64(buf)?;
            let propagating = get_flag(buf)?;
            let scattering = get_c64(buf)?;
            let normalized_beta = if get_flag(buf)? {
                Some(get_c64(buf)?)
            } else {
                None
            };
            let defect_confinement = if get_flag(buf)? {
                Some(get_f64(buf)?)
            } else {
                None
            };
            let eigenvector = get_c64_list(buf)?;

            modes.push(ModeResult {
                eigenvalue,
                beta,
                propagating,
                scattering,
                eigenvector,
                normalized_beta,
                defect_confinement,
            });
        }

        ports.push(PortResult {
            port,
            boundary_nodes,
            modes,
        });
    }

    Ok(FrequencyResult {
        frequency_index,
        normalized_frequency,
        wavelength,
        max_modes,
        field,
        ports,
        total_power,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::tests::sample_result;

    #[test]
    fn records_are_indexed() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut writer = BinaryResultWriter::create(dir.path(), "sweep").unwrap();
            for i in 0..3 {
                writer.persist(&sample_result(i)).unwrap();
            }
        }

        let mut reader = BinaryResultReader::open(dir.path(), "sweep").unwrap();
        assert_eq!(reader.len(), 3);
        assert_eq!(reader.read(2).unwrap(), sample_result(2));
        assert_eq!(reader.read(0).unwrap(), sample_result(0));
        assert!(matches!(
            reader.read(3),
            Err(SinkError::IndexOutOfRange { index: 3, len: 3 })
        ));
    }

    #[test]
    fn reopening_appends() {
        let dir = tempfile::tempdir().unwrap();
        BinaryResultWriter::create(dir.path(), "sweep")
            .unwrap()
            .persist(&sample_result(0))
            .unwrap();
        BinaryResultWriter::create(dir.path(), "sweep")
            .unwrap()
            .persist(&sample_result(5))
            .unwrap();

        let mut reader = BinaryResultReader::open(dir.path(), "sweep").unwrap();
        assert_eq!(reader.len(), 2);
        assert_eq!(reader.read(1).unwrap().frequency_index, 5);
    }

    #[test]
    fn truncated_record() {
        let mut record = BytesMut::new();
        encode_result(&sample_result(0), &mut record);
        let mut buf = &record[..record.len() - 3];

        assert!(matches!(decode_result(&mut buf), Err(SinkError::Corrupt(_))));
    }
}
