#![no_main]

use std::io::{Cursor, Read};
use std::pin::Pin;
use std::sync::OnceLock;
use std::task::{Context, Poll};

use libfuzzer_sys::fuzz_target;
use tokio::io::{AsyncRead, BufReader, ReadBuf};

use relaycache::proxy::http::fuzzing::{read_lines, sniff_status};

struct CursorRead {
    inner: Cursor<Vec<u8>>,
}

impl CursorRead {
    fn new(data: &[u8]) -> Self {
        Self {
            inner: Cursor::new(data.to_vec()),
        }
    }
}

impl AsyncRead for CursorRead {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let unfilled = buf.initialize_unfilled();
        let read = Read::read(&mut self.inner, unfilled)?;
        buf.advance(read);
        Poll::Ready(Ok(()))
    }
}

fn runtime() -> &'static tokio::runtime::Runtime {
    static RUNTIME: OnceLock<tokio::runtime::Runtime> = OnceLock::new();
    RUNTIME.get_or_init(|| {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("build tokio runtime")
    })
}

fuzz_target!(|data: &[u8]| {
    let max_line_length = data.first().map(|b| *b as usize + 1).unwrap_or(1);
    let _ = sniff_status(data);

    runtime().block_on(async {
        let mut reader = BufReader::new(CursorRead::new(data));
        read_lines(&mut reader, max_line_length).await;
    });
});
