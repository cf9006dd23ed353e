/// Normalise a free-text carrier name or delivery method for comparison.
///
/// Lower-cases, folds the Spanish accented vowels and `ñ` to their plain
/// forms, and trims surrounding whitespace. `None` and empty input yield an
/// empty string.
pub fn normalize_text(input: Option<&str>) -> String {
    let Some(text) = input else {
        return String::new();
    };

    text.to_lowercase()
        .chars()
        .map(|c| match c {
            'á' => 'a',
            'é' => 'e',
            'í' => 'i',
            'ó' => 'o',
            'ú' => 'u',
            'ñ' => 'n',
            other => other,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Normalise a scanned or stored barcode.
///
/// Scanners and spreadsheet imports disagree on formatting: codes arrive with
/// padding, embedded spaces, comma decimal separators, or a spurious `.00`
/// suffix on numeric codes. All of those collapse to the same canonical form.
pub fn normalize_barcode(input: &str) -> String {
    let compact: String = input
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    match compact.split_once('.') {
        Some((int_part, frac_part))
            if is_digits(int_part) && is_digits(frac_part) =>
        {
            int_part.to_string()
        }
        _ => compact,
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}
