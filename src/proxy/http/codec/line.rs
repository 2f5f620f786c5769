use std::io;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

#[derive(Debug, Error)]
pub(crate) enum LineError {
    #[error("line exceeds configured limit of {limit} bytes")]
    TooLong { limit: usize },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Read one `\n`-terminated line into `buf`, terminator included.
///
/// Returns 0 when the peer closed before sending anything. A final line cut off by
/// end-of-stream is returned as is.
pub(crate) async fn read_line<S>(
    reader: &mut BufReader<S>,
    buf: &mut Vec<u8>,
    max_len: usize,
) -> Result<usize, LineError>
where
    S: AsyncRead + Unpin,
{
    buf.clear();

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(buf.len());
        }

        let newline_pos = available.iter().position(|byte| *byte == b'\n');
        let consume = newline_pos.map(|idx| idx + 1).unwrap_or(available.len());

        if buf.len() + consume > max_len {
            return Err(LineError::TooLong { limit: max_len });
        }

        buf.extend_from_slice(&available[..consume]);
        reader.consume(consume);

        if newline_pos.is_some() {
            return Ok(buf.len());
        }
    }
}

/// Consume the rest of the current line, terminator included, without keeping it.
///
/// Returns the number of bytes skipped; 0 means the stream was already at its end.
pub(crate) async fn skip_line<S>(reader: &mut BufReader<S>) -> io::Result<usize>
where
    S: AsyncRead + Unpin,
{
    let mut skipped = 0usize;

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(skipped);
        }

        let newline_pos = available.iter().position(|byte| *byte == b'\n');
        let consume = newline_pos.map(|idx| idx + 1).unwrap_or(available.len());
        reader.consume(consume);
        skipped = skipped.saturating_add(consume);

        if newline_pos.is_some() {
            return Ok(skipped);
        }
    }
}
