pub mod cancel;
pub mod decoder;

pub use cancel::{ActiveRequest, CancellationToken, StreamController};
pub use decoder::{SseDecoder, delta_stream};

/// Transient state of one request: its cancellation flag and the text
/// received so far.
#[derive(Debug)]
pub struct StreamHandle {
    pub token: CancellationToken,
    pub text: String,
}

impl StreamHandle {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            text: String::new(),
        }
    }

    pub fn record(&mut self, delta: &str) {
        self.text.push_str(delta);
    }
}
