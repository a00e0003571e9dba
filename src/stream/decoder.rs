use crate::core::error::PluginError;
use futures::stream::{self, BoxStream, Stream, StreamExt};

const DONE_SENTINEL: &str = "[DONE]";

/// Incremental parser for OpenAI-compatible `text/event-stream` bodies.
///
/// Bytes are fed as they arrive. Multi-byte UTF-8 sequences and lines may
/// be split across chunks; both are carried over to the next `feed`.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending_bytes: Vec<u8>,
    line: String,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once the `[DONE]` sentinel has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Decode one chunk and return the content deltas it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<String>, PluginError> {
        if self.done {
            return Ok(Vec::new());
        }

        let text = self.decode_utf8(chunk)?;
        self.line.push_str(&text);

        let mut deltas = Vec::new();
        while let Some(pos) = self.line.find('\n') {
            let line: String = self.line.drain(..=pos).collect();
            if let Some(delta) = self.parse_line(&line)? {
                deltas.push(delta);
            }
            if self.done {
                self.line.clear();
                break;
            }
        }
        Ok(deltas)
    }

    /// Process whatever is left once the source is exhausted.
    pub fn finish(&mut self) -> Result<Vec<String>, PluginError> {
        if self.done {
            return Ok(Vec::new());
        }
        if !self.pending_bytes.is_empty() {
            return Err(PluginError::Decode(
                "stream ended inside a UTF-8 sequence".to_string(),
            ));
        }

        let rest = std::mem::take(&mut self.line);
        Ok(self.parse_line(&rest)?.into_iter().collect())
    }

    fn decode_utf8(&mut self, chunk: &[u8]) -> Result<String, PluginError> {
        self.pending_bytes.extend_from_slice(chunk);

        match std::str::from_utf8(&self.pending_bytes) {
            Ok(text) => {
                let text = text.to_string();
                self.pending_bytes.clear();
                Ok(text)
            }
            Err(e) if e.error_len().is_none() => {
                // Incomplete sequence at the end, keep it for the next chunk
                let valid = e.valid_up_to();
                let tail = self.pending_bytes.split_off(valid);
                let text = String::from_utf8(std::mem::replace(&mut self.pending_bytes, tail))
                    .map_err(|e| PluginError::Decode(format!("Invalid UTF-8: {}", e)))?;
                Ok(text)
            }
            Err(e) => Err(PluginError::Decode(format!("Invalid UTF-8: {}", e))),
        }
    }

    fn parse_line(&mut self, line: &str) -> Result<Option<String>, PluginError> {
        let line = line.trim_end_matches(['\n', '\r']);
        if line.trim().is_empty() || line.starts_with(':') {
            return Ok(None);
        }

        let Some(data) = line.strip_prefix("data:") else {
            tracing::trace!(line, "ignoring non-data event field");
            return Ok(None);
        };
        let data = data.strip_prefix(' ').unwrap_or(data);

        if data.trim() == DONE_SENTINEL {
            self.done = true;
            return Ok(None);
        }

        let parsed: serde_json::Value = serde_json::from_str(data)
            .map_err(|e| PluginError::Decode(format!("Failed to parse stream data: {}", e)))?;

        let content = parsed
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.get("delta"))
            .and_then(|delta| delta.get("content"))
            .and_then(|text| text.as_str());

        Ok(content.map(str::to_string))
    }
}

struct DeltaState<B, E> {
    source: BoxStream<'static, Result<B, E>>,
    decoder: SseDecoder,
    finished: bool,
}

/// Turn a streamed response body into a lazy sequence of delta batches,
/// one batch per network chunk that completed at least one delta.
///
/// The sequence ends after `[DONE]` or when the body ends. The first error
/// ends it as well; the source is not read again.
pub fn delta_stream<S, B, E>(source: S) -> BoxStream<'static, Result<Vec<String>, PluginError>>
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<PluginError> + Send + 'static,
{
    let state = DeltaState {
        source: source.boxed(),
        decoder: SseDecoder::new(),
        finished: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if st.finished || st.decoder.is_done() {
                return None;
            }

            let batch = match st.source.next().await {
                Some(Ok(chunk)) => st.decoder.feed(chunk.as_ref()),
                Some(Err(e)) => Err(e.into()),
                None => {
                    st.finished = true;
                    st.decoder.finish()
                }
            };
            match batch {
                Ok(deltas) if deltas.is_empty() => continue,
                Ok(deltas) => return Some((Ok(deltas), st)),
                Err(e) => {
                    st.finished = true;
                    return Some((Err(e), st));
                }
            }
        }
    })
    .boxed()
}
