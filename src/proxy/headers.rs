/// Client headers replaced by the proxy's own fixed values.
const SUPPRESSED_REQUEST_HEADERS: [&str; 3] = ["user-agent", "connection", "proxy-connection"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderAction {
    Forward,
    Skip,
    EndOfHeaders,
}

/// Decide what to do with one raw client header line (terminator included).
///
/// Lines are forwarded byte-for-byte unless their name is one the proxy asserts itself.
/// Names are matched case-insensitively.
pub fn classify_request_header(line: &[u8]) -> HeaderAction {
    if is_blank_line(line) {
        return HeaderAction::EndOfHeaders;
    }
    let Some(colon) = line.iter().position(|byte| *byte == b':') else {
        return HeaderAction::Forward;
    };
    let name = line[..colon].trim_ascii();
    if SUPPRESSED_REQUEST_HEADERS
        .iter()
        .any(|suppressed| name.eq_ignore_ascii_case(suppressed.as_bytes()))
    {
        HeaderAction::Skip
    } else {
        HeaderAction::Forward
    }
}

fn is_blank_line(line: &[u8]) -> bool {
    matches!(line, b"\r\n" | b"\n")
}

/// Header block appended to every forwarded request, blank line included.
pub fn normalized_request_headers(user_agent: &str) -> String {
    format!("User-Agent: {user_agent}\r\nConnection: close\r\nProxy-Connection: close\r\n\r\n")
}
