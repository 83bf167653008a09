//! 记录行编解码：base64 + `\n`，保证记录内的换行和非 UTF-8 字节不破坏行边界。

use crate::error::StorageError;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use domain::StorageRecord;

/// 编码为一整行（含结尾换行符）
pub(crate) fn encode_line(record: &StorageRecord) -> Vec<u8> {
    let mut line = STANDARD.encode(record.as_bytes()).into_bytes();
    line.push(b'\n');
    line
}

/// 解码一行（允许结尾的 `\n` / `\r\n`）；空行即空记录
pub(crate) fn decode_line(line: &[u8]) -> Result<StorageRecord, StorageError> {
    STANDARD
        .decode(trim_line_end(line))
        .map(StorageRecord::new)
        .map_err(|err| StorageError::Decode(err.to_string()))
}

fn trim_line_end(mut line: &[u8]) -> &[u8] {
    while let [rest @ .., last] = line {
        if *last == b'\n' || *last == b'\r' {
            line = rest;
        } else {
            break;
        }
    }
    line
}
