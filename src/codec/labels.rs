//! Labels for decoded bitmaps.
//!
//! The processor returns chart strips in standard 12-lead order. Anything
//! past the twelfth record gets a numbered `chart_N` label.

use std::borrow::Cow;

/// Canonical lead names, in reply order.
pub const LEAD_NAMES: [&str; 12] = [
    "I", "II", "III", "aVR", "aVL", "aVF", "V1", "V2", "V3", "V4", "V5", "V6",
];

/// Prefix for records beyond the canonical list.
pub const OVERFLOW_PREFIX: &str = "chart_";

/// Label for the record at `index`.
///
/// ```
/// use leadwire::codec::label_for;
///
/// assert_eq!(label_for(0), "I");
/// assert_eq!(label_for(11), "V6");
/// assert_eq!(label_for(12), "chart_12");
/// ```
pub fn label_for(index: usize) -> Cow<'static, str> {
    match LEAD_NAMES.get(index) {
        Some(name) => Cow::Borrowed(name),
        None => Cow::Owned(format!("{OVERFLOW_PREFIX}{index}")),
    }
}
