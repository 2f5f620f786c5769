mod line;

use http::StatusCode;

pub(crate) use line::{LineError, read_line, skip_line};

/// Best-effort status code of a raw HTTP/1.x response, for logging only.
pub(crate) fn sniff_status(bytes: &[u8]) -> Option<StatusCode> {
    let rest = bytes.strip_prefix(b"HTTP/")?;
    let space = rest.iter().position(|byte| *byte == b' ')?;
    let code = rest.get(space + 1..space + 4)?;
    StatusCode::from_bytes(code).ok()
}
