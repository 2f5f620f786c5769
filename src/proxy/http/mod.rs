mod capture;
pub(crate) mod codec;
mod forward;
mod respond;
mod server;

pub use respond::{BAD_REQUEST_RESPONSE, send_bad_request, shutdown_stream};
pub use server::handle_http;

#[cfg(feature = "fuzzing")]
pub mod fuzzing {
    use tokio::io::{AsyncRead, BufReader};

    pub fn sniff_status(bytes: &[u8]) -> Option<u16> {
        super::codec::sniff_status(bytes).map(|status| status.as_u16())
    }

    /// Drive the line reader over arbitrary input until EOF or a rejected line.
    pub async fn read_lines<S>(reader: &mut BufReader<S>, max_line_length: usize)
    where
        S: AsyncRead + Unpin,
    {
        let mut line = Vec::new();
        while let Ok(read) = super::codec::read_line(reader, &mut line, max_line_length).await {
            if read == 0 {
                break;
            }
            let _ = crate::proxy::headers::classify_request_header(&line);
        }
    }
}
