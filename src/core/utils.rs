//! Small formatting helpers shared by the handlers and the pipeline.

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Makes a user-supplied file name safe to use as a single path component.
///
/// Replaced characters:
/// - `/` and `\` -> `_` (path separators)
/// - `:` `*` `?` `<` `>` `|` -> `_` (reserved on Windows)
/// - `"` -> `'`
/// - control characters -> `_`
///
/// Leading and trailing whitespace and dots are trimmed, so `..` can never
/// survive. An empty result becomes `unnamed`.
///
/// # Example
///
/// ```
/// use encodebot::core::utils::escape_filename;
///
/// assert_eq!(escape_filename("../clip*.mkv"), "_clip_.mkv");
/// ```
pub fn escape_filename(filename: &str) -> String {
    let mut result = String::with_capacity(filename.len());

    for c in filename.chars() {
        match c {
            '/' | '\\' => result.push('_'),
            ':' | '*' | '?' | '<' | '>' | '|' => result.push('_'),
            '"' => result.push('\''),
            c if c.is_control() => result.push('_'),
            _ => result.push(c),
        }
    }

    let result = result.trim_matches(|c: char| c.is_whitespace() || c == '.');

    if result.is_empty() {
        "unnamed".to_string()
    } else {
        result.to_string()
    }
}

/// Converts a byte count to mebibytes for display.
pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB
}

/// Returns at most the last `max_chars` characters of `text`.
///
/// Counts characters, not bytes, so multi-byte output from ffmpeg is never
/// split in the middle of a code point.
pub fn tail_chars(text: &str, max_chars: usize) -> &str {
    let total = text.chars().count();
    if total <= max_chars {
        return text;
    }
    let skip = total - max_chars;
    match text.char_indices().nth(skip) {
        Some((idx, _)) => &text[idx..],
        None => "",
    }
}

/// Lowercased extension of a file name, if any.
pub fn file_extension(name: &str) -> Option<String> {
    std::path::Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}
