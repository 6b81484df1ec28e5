//! Locale prefixes on tokenized values: `\0{locale}\0{text}`.

const MARK: char = '\u{0}';

/// Prefixes `text` with its locale marker.
pub fn with_locale(locale: &str, text: &str) -> String {
    let mut out = String::with_capacity(locale.len() + text.len() + 2);
    out.push(MARK);
    out.push_str(locale);
    out.push(MARK);
    out.push_str(text);
    out
}

/// Splits a value into its locale (if marked) and the remaining text.
pub fn split_locale(value: &str) -> (Option<&str>, &str) {
    if let Some(rest) = value.strip_prefix(MARK) {
        if let Some((locale, text)) = rest.split_once(MARK) {
            return (Some(locale), text);
        }
    }
    (None, value)
}
