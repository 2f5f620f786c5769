use bytes::{Bytes, BytesMut};

/// Mirror of the relayed response, kept only while it stays under the object size limit.
#[derive(Debug)]
pub(super) struct ResponseCapture {
    buf: BytesMut,
    limit: usize,
    eligible: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub(super) enum CaptureResult {
    Cacheable(Bytes),
    TooLarge,
    Empty,
}

impl CaptureResult {
    pub(super) fn label(&self) -> &'static str {
        match self {
            Self::Cacheable(_) => "stored",
            Self::TooLarge => "too_large",
            Self::Empty => "empty",
        }
    }
}

impl ResponseCapture {
    pub(super) fn new(limit: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            limit,
            eligible: true,
        }
    }

    /// Append `chunk` if the capture would stay strictly below the limit; otherwise give up on
    /// caching this response for good and release what was captured.
    pub(super) fn push(&mut self, chunk: &[u8]) {
        if !self.eligible {
            return;
        }
        if self.buf.len() + chunk.len() < self.limit {
            self.buf.extend_from_slice(chunk);
        } else {
            self.eligible = false;
            self.buf = BytesMut::new();
        }
    }

    pub(super) fn finish(self) -> CaptureResult {
        if !self.eligible {
            CaptureResult::TooLarge
        } else if self.buf.is_empty() {
            CaptureResult::Empty
        } else {
            CaptureResult::Cacheable(self.buf.freeze())
        }
    }
}
