//! Reassembles blank-line delimited frames from a chunked byte stream.

use encoding_rs::{CoderResult, Decoder, UTF_8};
use engine_logging::engine_debug;

pub const FRAME_DELIMITER: &str = "\n\n";

/// Incremental frame splitter for one response body.
///
/// Bytes are decoded as UTF-8 with a streaming decoder, so a character split
/// across two reads is held back until its remaining bytes arrive. Text after
/// the last delimiter stays buffered for the next [`FrameDecoder::push`].
pub struct FrameDecoder {
    decoder: Decoder,
    buffer: String,
    /// Bytes of `buffer` already searched for a delimiter.
    scanned: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            decoder: UTF_8.new_decoder_without_bom_handling(),
            buffer: String::new(),
            scanned: 0,
        }
    }

    /// Feeds one chunk and returns every frame it completed, in arrival order.
    /// Whitespace-only segments are skipped.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.decode(bytes, false);
        self.drain_frames()
    }

    /// Takes the buffered, not yet delimited text.
    pub fn flush(&mut self) -> String {
        self.scanned = 0;
        std::mem::take(&mut self.buffer)
    }

    /// Ends the stream. Any dangling partial frame is returned and discarded.
    pub fn finish(mut self) -> Option<String> {
        self.decode(&[], true);
        let rest = self.flush();
        if rest.trim().is_empty() {
            return None;
        }
        engine_debug!("Discarding {} bytes of undelimited trailing data", rest.len());
        Some(rest)
    }

    fn decode(&mut self, mut src: &[u8], last: bool) {
        loop {
            let needed = self
                .decoder
                .max_utf8_buffer_length(src.len())
                .unwrap_or(src.len() * 3 + 4);
            self.buffer.reserve(needed);
            let (result, read, _replaced) = self.decoder.decode_to_string(src, &mut self.buffer, last);
            src = &src[read..];
            match result {
                CoderResult::InputEmpty => break,
                CoderResult::OutputFull => continue,
            }
        }
    }

    fn drain_frames(&mut self) -> Vec<String> {
        let mut frames = Vec::new();
        let mut consumed = 0;
        // A delimiter may straddle the end of the previous scan.
        let mut from = self.scanned.saturating_sub(FRAME_DELIMITER.len() - 1);
        while let Some(pos) = find_delimiter(&self.buffer.as_bytes()[from..]) {
            let end = from + pos;
            let frame = &self.buffer[consumed..end];
            if !frame.trim().is_empty() {
                frames.push(frame.to_string());
            }
            consumed = end + FRAME_DELIMITER.len();
            from = consumed;
        }
        self.buffer.drain(..consumed);
        self.scanned = self.buffer.len();
        frames
    }
}

fn find_delimiter(bytes: &[u8]) -> Option<usize> {
    bytes
        .windows(FRAME_DELIMITER.len())
        .position(|window| window == FRAME_DELIMITER.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::FrameDecoder;

    const STREAM: &str = concat!(
        "data: {\"type\":\"content\",\"content\":\"Año \"}\n\n",
        "data: {\"type\":\"content\",\"content\":\"日本語 🦀\"}\n\n",
        "\n\n",
        "data: {\"type\":\"done\"}\n\n",
    );

    fn decode_in_pieces(bytes: &[u8], cuts: &[usize]) -> Vec<String> {
        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        let mut start = 0;
        for &cut in cuts.iter().chain(std::iter::once(&bytes.len())) {
            frames.extend(decoder.push(&bytes[start..cut]));
            start = cut;
        }
        assert_eq!(decoder.finish(), None);
        frames
    }

    #[test]
    fn single_chunk_yields_frames_in_order() {
        let frames = decode_in_pieces(STREAM.as_bytes(), &[]);
        assert_eq!(
            frames,
            vec![
                "data: {\"type\":\"content\",\"content\":\"Año \"}",
                "data: {\"type\":\"content\",\"content\":\"日本語 🦀\"}",
                "data: {\"type\":\"done\"}",
            ]
        );
    }

    #[test]
    fn every_single_split_point_gives_the_same_frames() {
        let bytes = STREAM.as_bytes();
        let expected = decode_in_pieces(bytes, &[]);
        for cut in 0..=bytes.len() {
            assert_eq!(decode_in_pieces(bytes, &[cut]), expected, "cut at {cut}");
        }
    }

    #[test]
    fn every_pair_of_split_points_gives_the_same_frames() {
        let bytes = STREAM.as_bytes();
        let expected = decode_in_pieces(bytes, &[]);
        for first in 0..=bytes.len() {
            for second in first..=bytes.len() {
                assert_eq!(
                    decode_in_pieces(bytes, &[first, second]),
                    expected,
                    "cuts at {first},{second}"
                );
            }
        }
    }

    #[test]
    fn byte_at_a_time_gives_the_same_frames() {
        let bytes = STREAM.as_bytes();
        let cuts: Vec<usize> = (1..bytes.len()).collect();
        assert_eq!(decode_in_pieces(bytes, &cuts), decode_in_pieces(bytes, &[]));
    }

    #[test]
    fn trailing_partial_is_buffered_then_completed() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"data: {\"type\":").is_empty());
        assert_eq!(decoder.buffer, "data: {\"type\":");

        let frames = decoder.push(b"\"done\"}\n\n");
        assert_eq!(frames, vec!["data: {\"type\":\"done\"}"]);
        assert!(decoder.buffer.is_empty());
    }

    #[test]
    fn long_frame_in_small_reads_is_scanned_once() {
        let payload = format!("data: {}\n\n", "é".repeat(5_000));
        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        for chunk in payload.as_bytes().chunks(7) {
            frames.extend(decoder.push(chunk));
            assert_eq!(decoder.scanned, decoder.buffer.len());
        }
        assert_eq!(frames, vec![payload.trim_end().to_string()]);
        assert!(decoder.buffer.is_empty());
    }

    #[test]
    fn split_multibyte_character_is_not_replaced() {
        let text = "data: é\n\n".as_bytes();
        let split = text.iter().position(|&b| b == 0xC3).unwrap() + 1;
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(&text[..split]).is_empty());
        assert_eq!(decoder.push(&text[split..]), vec!["data: é"]);
    }

    #[test]
    fn invalid_bytes_become_replacement_characters() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(b"data: \xFFx\n\n");
        assert_eq!(frames, vec!["data: \u{FFFD}x"]);
    }

    #[test]
    fn finish_returns_dangling_partial() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b"data: {\"type\":\"done\"}\n\ndata: {\"ty");
        assert_eq!(decoder.finish(), Some("data: {\"ty".to_string()));
    }

    #[test]
    fn flush_takes_pending_text() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b"partial");
        assert_eq!(decoder.flush(), "partial");
        assert_eq!(decoder.flush(), "");
    }
}
