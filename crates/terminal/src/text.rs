//! Incremental UTF-8 decoding for the input text view.

/// Substituted for invalid byte sequences, like a non-fatal `TextDecoder`.
const REPLACEMENT: char = '\u{FFFD}';

/// Streaming UTF-8 decoder that tolerates code points split across chunks.
///
/// A code point whose bytes straddle a chunk boundary is held back until the
/// rest arrives; invalid sequences become U+FFFD instead of an error.
#[derive(Debug, Default)]
pub(crate) struct Utf8Decoder {
    /// Bytes of an incomplete trailing code point from the previous chunk.
    partial: Vec<u8>,
}

impl Utf8Decoder {
    /// Decode the next chunk, carrying any trailing partial code point over
    /// to the following call.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut input = std::mem::take(&mut self.partial);
        input.extend_from_slice(chunk);

        let mut decoded = String::with_capacity(input.len());
        let mut rest = input.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    decoded.push_str(valid);
                    break;
                }
                Err(error) => {
                    let (valid, after) = rest.split_at(error.valid_up_to());
                    decoded.push_str(&String::from_utf8_lossy(valid));
                    match error.error_len() {
                        Some(invalid_len) => {
                            decoded.push(REPLACEMENT);
                            rest = &after[invalid_len..];
                        }
                        None => {
                            // Incomplete trailing sequence; wait for the
                            // next chunk.
                            self.partial = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        decoded
    }

    /// Finish decoding at end of stream.
    ///
    /// A held-back partial code point can never complete, so it is emitted
    /// as a single replacement character.
    pub fn flush(&mut self) -> String {
        if self.partial.is_empty() {
            String::new()
        } else {
            self.partial.clear();
            REPLACEMENT.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_passthrough() {
        let mut decoder = Utf8Decoder::default();
        assert_eq!(decoder.decode(b"hello\n"), "hello\n");
        assert_eq!(decoder.flush(), "");
    }

    #[test]
    fn multibyte_split_across_chunks() {
        // U+20AC EURO SIGN is E2 82 AC.
        let mut decoder = Utf8Decoder::default();
        assert_eq!(decoder.decode(&[0xE2, 0x82]), "");
        assert_eq!(decoder.decode(&[0xAC, b'!']), "\u{20AC}!");
        assert_eq!(decoder.flush(), "");
    }

    #[test]
    fn four_byte_code_point_split_three_ways() {
        // U+1F600 is F0 9F 98 80.
        let mut decoder = Utf8Decoder::default();
        assert_eq!(decoder.decode(&[0xF0]), "");
        assert_eq!(decoder.decode(&[0x9F, 0x98]), "");
        assert_eq!(decoder.decode(&[0x80]), "\u{1F600}");
    }

    #[test]
    fn invalid_byte_becomes_replacement() {
        let mut decoder = Utf8Decoder::default();
        assert_eq!(decoder.decode(&[b'a', 0xFF, b'b']), "a\u{FFFD}b");
    }

    #[test]
    fn truncated_sequence_mid_chunk_becomes_replacement() {
        // E2 82 followed by ASCII can never complete.
        let mut decoder = Utf8Decoder::default();
        assert_eq!(decoder.decode(&[0xE2, 0x82, b'x']), "\u{FFFD}x");
    }

    #[test]
    fn flush_replaces_dangling_partial() {
        let mut decoder = Utf8Decoder::default();
        assert_eq!(decoder.decode(&[0xE2]), "");
        assert_eq!(decoder.flush(), "\u{FFFD}");
        // Flushing again yields nothing.
        assert_eq!(decoder.flush(), "");
    }

    #[test]
    fn empty_chunk_is_harmless() {
        let mut decoder = Utf8Decoder::default();
        assert_eq!(decoder.decode(&[]), "");
        assert_eq!(decoder.decode("é".as_bytes()), "é");
    }
}
