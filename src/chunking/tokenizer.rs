// Sub-word token approximation shared by chunking, retrieval and metrics

/// Longest alphanumeric piece counted as one token
const MAX_PIECE_CHARS: usize = 4;

/// A token's byte span in the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub start: usize,
    pub end: usize,
}

/// Split text into approximate sub-word tokens.
///
/// Every maximal alphanumeric run is cut into pieces of at most four characters and every
/// other non-whitespace character becomes a token of its own. Whitespace is never part of
/// a token.
#[inline]
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut piece_start: Option<usize> = None;
    let mut piece_chars = 0;

    for (offset, ch) in text.char_indices() {
        if ch.is_alphanumeric() {
            match piece_start {
                Some(_) if piece_chars < MAX_PIECE_CHARS => piece_chars += 1,
                Some(start) => {
                    tokens.push(Token { start, end: offset });
                    piece_start = Some(offset);
                    piece_chars = 1;
                }
                None => {
                    piece_start = Some(offset);
                    piece_chars = 1;
                }
            }
            continue;
        }

        if let Some(start) = piece_start.take() {
            tokens.push(Token { start, end: offset });
            piece_chars = 0;
        }

        if !ch.is_whitespace() {
            tokens.push(Token {
                start: offset,
                end: offset + ch.len_utf8(),
            });
        }
    }

    if let Some(start) = piece_start {
        tokens.push(Token {
            start,
            end: text.len(),
        });
    }

    tokens
}

#[inline]
pub fn estimate_token_count(text: &str) -> usize {
    tokenize(text).len()
}
