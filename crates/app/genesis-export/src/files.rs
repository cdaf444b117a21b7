//! Readers and writers for the per-account export files.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::Path;

use alloy_primitives::{hex, Address, Bytes, FixedBytes, B256};
use exrpc_rpc_types::RpcLog;

use crate::error::{ExportError, ExportResult};
use crate::layout::ExportLayout;

/// Write `code` as hex. Returns `false` without touching disk when empty.
pub fn write_account_code(
    layout: &ExportLayout,
    address: &Address,
    code: &Bytes,
) -> ExportResult<bool> {
    if code.is_empty() {
        return Ok(false);
    }
    let path = layout.code_path(address);
    fs::write(&path, hex::encode_prefixed(code)).map_err(|e| ExportError::io(&path, e))?;
    Ok(true)
}

/// Write one `key:value` line per slot. The file is removed when no slot
/// was written. Returns the number of slots written.
pub fn write_account_storage<I>(
    layout: &ExportLayout,
    address: &Address,
    slots: I,
) -> ExportResult<usize>
where
    I: IntoIterator<Item = (B256, B256)>,
{
    let path = layout.storage_path(address);
    let file = File::create(&path).map_err(|e| ExportError::io(&path, e))?;
    let mut writer = BufWriter::new(file);

    let mut written = 0usize;
    for (key, value) in slots {
        writeln!(writer, "{key}:{value}").map_err(|e| ExportError::io(&path, e))?;
        written += 1;
    }
    writer.flush().map_err(|e| ExportError::io(&path, e))?;
    drop(writer);

    if written == 0 {
        fs::remove_file(&path).map_err(|e| ExportError::io(&path, e))?;
    }
    Ok(written)
}

pub fn write_tx_logs(layout: &ExportLayout, hash: &B256, logs: &[RpcLog]) -> ExportResult<()> {
    let path = layout.txlogs_path(hash);
    let file = File::create(&path).map_err(|e| ExportError::io(&path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, logs).map_err(|e| ExportError::json(&path, e))?;
    writer.flush().map_err(|e| ExportError::io(&path, e))
}

pub fn read_code(path: &Path) -> ExportResult<Bytes> {
    let text = fs::read_to_string(path).map_err(|e| ExportError::io(path, e))?;
    hex::decode(text.trim())
        .map(Bytes::from)
        .map_err(|e| ExportError::InvalidHex {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

/// Read `key:value` slots. A missing file has no slots.
pub fn read_storage(path: &Path) -> ExportResult<Vec<(B256, B256)>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(ExportError::io(path, e)),
    };

    let mut slots = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| ExportError::io(path, e))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let invalid = || ExportError::InvalidStorageLine {
            path: path.to_path_buf(),
            line: index + 1,
        };
        let (key, value) = line.split_once(':').ok_or_else(invalid)?;
        let key = parse_padded::<32>(key).ok_or_else(invalid)?;
        let value = parse_padded::<32>(value).ok_or_else(invalid)?;
        slots.push((key, value));
    }
    Ok(slots)
}

pub fn read_tx_logs(path: &Path) -> ExportResult<Vec<RpcLog>> {
    let file = File::open(path).map_err(|e| ExportError::io(path, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| ExportError::json(path, e))
}

/// Hash named by an export file, e.g. `0x0de6...f2.json`.
pub fn hash_from_file_name(file_name: &str) -> ExportResult<B256> {
    parse_padded::<32>(file_stem(file_name))
        .ok_or_else(|| ExportError::InvalidFileName(file_name.to_string()))
}

/// Address named by an export file, e.g. `0xAb5801...eC9B.code`.
pub fn address_from_file_name(file_name: &str) -> ExportResult<Address> {
    parse_padded::<20>(file_stem(file_name))
        .map(Address::from)
        .ok_or_else(|| ExportError::InvalidFileName(file_name.to_string()))
}

fn file_stem(file_name: &str) -> &str {
    file_name.split('.').next().unwrap_or_default()
}

/// Decode hex into `N` bytes, left-padding short input with zeros.
fn parse_padded<const N: usize>(text: &str) -> Option<FixedBytes<N>> {
    let text = text.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    if digits.is_empty() || digits.len() > N * 2 {
        return None;
    }
    let bytes = if digits.len() % 2 == 1 {
        hex::decode(format!("0{digits}")).ok()?
    } else {
        hex::decode(digits).ok()?
    };
    let mut out = [0u8; N];
    out[N - bytes.len()..].copy_from_slice(&bytes);
    Some(FixedBytes(out))
}
