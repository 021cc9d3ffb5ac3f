//! String helpers for log output and user-supplied text.

/// Truncates an identifier for display purposes.
///
/// Shows only the first 8 characters followed by ".." for longer strings.
pub fn truncate_id(id: &str) -> String {
	match id.char_indices().nth(8) {
		Some((end, _)) => format!("{}..", &id[..end]),
		None => id.to_string(),
	}
}

/// Returns the trimmed text if it contains anything other than whitespace.
pub fn non_blank(text: Option<&str>) -> Option<&str> {
	text.map(str::trim).filter(|t| !t.is_empty())
}
