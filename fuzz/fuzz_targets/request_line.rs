#![no_main]

use libfuzzer_sys::fuzz_target;

use relaycache::proxy::request::parse_request_line;
use relaycache::proxy::target::resolve_target;

fuzz_target!(|data: &[u8]| {
    let line = String::from_utf8_lossy(data);
    if let Ok(request) = parse_request_line(line.as_ref()) {
        let _ = request.origin_form(&resolve_target(&request.target).uri);
    }
    let target = resolve_target(line.as_ref());
    assert!(target.uri.starts_with('/'));
});
