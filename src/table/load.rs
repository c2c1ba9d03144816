use anyhow::{bail, Context, Result};
use csv::{ByteRecord, ReaderBuilder};
use std::{
    fs::{self, File},
    io::{Cursor, Read},
    path::Path,
};
use tracing::{debug, info};
use zip::ZipArchive;

use super::RawTable;
use crate::config::Encoding;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Read a comma-delimited file with a header row into a [`RawTable`].
///
/// A `.zip` path is opened as an archive and its first `.csv` entry is read.
#[tracing::instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
pub fn load_raw_table<P: AsRef<Path>>(path: P, encoding: Encoding) -> Result<RawTable> {
    let path = path.as_ref();
    let is_zip = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("zip"))
        .unwrap_or(false);

    let bytes = if is_zip {
        read_first_csv_entry(path)?
    } else {
        fs::read(path).with_context(|| format!("Failed to read input file: {:?}", path))?
    };

    let table = parse_csv_bytes(&bytes, encoding)
        .with_context(|| format!("Failed to parse {:?}", path))?;
    info!(
        rows = table.num_rows(),
        columns = table.headers.len(),
        "loaded raw table"
    );
    Ok(table)
}

fn read_first_csv_entry(zip_path: &Path) -> Result<Vec<u8>> {
    let file = File::open(zip_path)
        .with_context(|| format!("Failed to open ZIP file: {:?}", zip_path))?;
    let mut archive = ZipArchive::new(file)
        .with_context(|| format!("Failed to read ZIP archive: {:?}", zip_path))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .with_context(|| format!("Failed to access ZIP entry #{} in {:?}", i, zip_path))?;
        let name = entry.name().to_string();
        if entry.is_file() && name.to_lowercase().ends_with(".csv") {
            debug!(entry = %name, "reading csv entry");
            let mut buf = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut buf)
                .with_context(|| format!("Failed to read {} into memory", name))?;
            return Ok(buf);
        }
    }
    bail!("no .csv entry in {:?}", zip_path)
}

/// Parse CSV bytes. The first record is the header; short rows are padded
/// with empty (missing) cells, long rows are rejected.
pub fn parse_csv_bytes(data: &[u8], encoding: Encoding) -> Result<RawTable> {
    let data = data.strip_prefix(UTF8_BOM).unwrap_or(data);
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(Cursor::new(data));

    let mut records = rdr.byte_records();
    let headers = match records.next() {
        Some(first) => decode_record(&first.context("CSV parse error in header row")?, encoding),
        None => bail!("input has no header row"),
    };
    if headers.is_empty() {
        bail!("header row has no columns");
    }

    let mut rows = Vec::new();
    for (idx, result) in records.enumerate() {
        // record 0 is the header
        let record = result.with_context(|| format!("CSV parse error at record {}", idx + 1))?;
        if record.len() > headers.len() {
            bail!(
                "record {} has {} fields but the header has {}",
                idx + 1,
                record.len(),
                headers.len()
            );
        }
        let mut row = decode_record(&record, encoding);
        row.resize(headers.len(), String::new());
        rows.push(row);
    }

    Ok(RawTable { headers, rows })
}

fn decode_record(record: &ByteRecord, encoding: Encoding) -> Vec<String> {
    record
        .iter()
        .map(|field| match encoding {
            // every latin-1 byte is the code point of the same value
            Encoding::Latin1 => field.iter().map(|&b| b as char).collect(),
            Encoding::Utf8 => String::from_utf8_lossy(field).into_owned(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{Builder, NamedTempFile};
    use zip::write::SimpleFileOptions;
    use zip::CompressionMethod;

    #[test]
    fn test_parse_pads_short_rows() -> Result<()> {
        let table = parse_csv_bytes(b"a,b,c\n1,2,3\n4,5\n", Encoding::Utf8)?;
        assert_eq!(table.headers, vec!["a", "b", "c"]);
        assert_eq!(table.rows, vec![vec!["1", "2", "3"], vec!["4", "5", ""]]);
        Ok(())
    }

    #[test]
    fn test_parse_rejects_long_rows() {
        let err = parse_csv_bytes(b"a,b\n1,2,3\n", Encoding::Utf8).unwrap_err();
        assert!(err.to_string().contains("record 1"));
    }

    #[test]
    fn test_latin1_decoding() -> Result<()> {
        // "España" with ñ as the single latin-1 byte 0xF1
        let bytes = b"country\nEspa\xF1a\n";
        let table = parse_csv_bytes(bytes, Encoding::Latin1)?;
        assert_eq!(table.rows[0][0], "España");
        Ok(())
    }

    #[test]
    fn test_bom_is_stripped() -> Result<()> {
        let table = parse_csv_bytes(b"\xEF\xBB\xBFType,Sales\nDEBIT,1\n", Encoding::Utf8)?;
        assert_eq!(table.headers[0], "Type");
        Ok(())
    }

    #[test]
    fn test_empty_input_is_an_error() {
        assert!(parse_csv_bytes(b"", Encoding::Utf8).is_err());
    }

    #[test]
    fn test_load_from_zip() -> Result<()> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
            let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
            zip.start_file("readme.txt", options)?;
            zip.write_all(b"not a table")?;
            zip.start_file("orders.csv", options)?;
            zip.write_all(b"Market,Sales\nLATAM,10\nEurope,20\n")?;
            zip.finish()?;
        }
        let mut tmp = Builder::new().suffix(".zip").tempfile()?;
        tmp.write_all(&buf)?;

        let table = load_raw_table(tmp.path(), Encoding::Utf8)?;
        assert_eq!(table.headers, vec!["Market", "Sales"]);
        assert_eq!(table.num_rows(), 2);
        Ok(())
    }

    #[test]
    fn test_load_plain_file() -> Result<()> {
        let mut tmp = NamedTempFile::new()?;
        tmp.write_all(b"x\n1\n2\n3\n")?;
        let table = load_raw_table(tmp.path(), Encoding::Latin1)?;
        assert_eq!(table.num_rows(), 3);
        Ok(())
    }
}
