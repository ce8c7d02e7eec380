//! Repair of UTF-8 text that was decoded as Latin-1 somewhere upstream.
//!
//! Many EPG providers emit UTF-8 bytes but label or process them as a
//! single-byte Western encoding, so `"RTL²"` arrives as `"RTLÂ²"`. Mapping
//! every character back to its byte value and decoding those bytes as UTF-8
//! undoes that damage.

/// Attempts to undo Latin-1 mojibake in `text`.
///
/// Returns `None` when a character does not fit in a single byte or when the
/// resulting bytes are not valid UTF-8.
#[must_use]
pub fn repair_text(text: &str) -> Option<String> {
    let bytes = text
        .chars()
        .map(|ch| u8::try_from(u32::from(ch)).ok())
        .collect::<Option<Vec<u8>>>()?;

    String::from_utf8(bytes).ok()
}

/// Returns the repaired form of `text`, or `text` itself if it cannot be
/// repaired.
///
/// This never fails. Pure ASCII and already-correct UTF-8 containing
/// characters above U+00FF come back unchanged.
///
/// # Examples
///
/// ```
/// use xmltv_split::normalize_text;
///
/// assert_eq!(normalize_text("RTLÂ²"), "RTL²");
/// assert_eq!(normalize_text("RTL²"), "RTL²");
/// assert_eq!(normalize_text("Das Erste"), "Das Erste");
/// ```
#[must_use]
pub fn normalize_text(text: &str) -> String {
    repair_text(text).unwrap_or_else(|| text.to_owned())
}
