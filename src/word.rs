//! Word splitting for bionic annotation
//!
//! A token here is a run of non-whitespace characters. Splitting isolates the
//! leading punctuation, the word core that gets partial emphasis, and whatever
//! trails it.

/// A token split into prefix, core and suffix.
///
/// `prefix + core + suffix` always reproduces the original token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Word<'a> {
    /// Leading non-word characters (quotes, brackets, ...).
    pub prefix: &'a str,
    /// First contiguous run of word characters. Never empty.
    pub core: &'a str,
    /// Everything after the core.
    pub suffix: &'a str,
}

impl Word<'_> {
    /// Length of the core in characters.
    pub fn core_len(&self) -> usize {
        self.core.chars().count()
    }
}

/// Unicode letter-or-digit test used for word cores.
pub fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric()
}

/// Split a whitespace-free token into prefix, core and suffix.
///
/// Returns `None` when the token contains no word character at all, in which
/// case the caller passes it through untouched. Internal whitespace is not
/// handled here; callers split on whitespace first.
///
/// # Example
/// ```
/// use bionic_reader::word::split_token;
///
/// let word = split_token("(hello),").unwrap();
/// assert_eq!((word.prefix, word.core, word.suffix), ("(", "hello", "),"));
/// assert!(split_token("--").is_none());
/// ```
pub fn split_token(token: &str) -> Option<Word<'_>> {
    let start = token.find(is_word_char)?;
    let rest = &token[start..];
    let core_len = rest.find(|ch: char| !is_word_char(ch)).unwrap_or(rest.len());
    let end = start + core_len;
    Some(Word {
        prefix: &token[..start],
        core: &token[start..end],
        suffix: &token[end..],
    })
}
