//! Lexical tokenizer shared by the BLEU and Jaccard metrics.

/// Word characters are alphanumerics (Unicode aware) and `_`.
#[inline]
pub fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Split source text into word runs and single punctuation characters.
///
/// Whitespace separates tokens and is dropped. Empty input yields an empty
/// sequence.
pub fn tokenize(code: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut word_start: Option<usize> = None;

    for (idx, c) in code.char_indices() {
        if is_word_char(c) {
            if word_start.is_none() {
                word_start = Some(idx);
            }
            continue;
        }

        if let Some(start) = word_start.take() {
            tokens.push(&code[start..idx]);
        }
        if !c.is_whitespace() {
            tokens.push(&code[idx..idx + c.len_utf8()]);
        }
    }

    if let Some(start) = word_start {
        tokens.push(&code[start..]);
    }

    tokens
}

/// Word runs only, in order.
pub fn words(code: &str) -> Vec<&str> {
    tokenize(code)
        .into_iter()
        .filter(|token| token.chars().next().is_some_and(is_word_char))
        .collect()
}
