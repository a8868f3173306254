/// Normalize OCR output for reviewers: strip control characters, collapse runs
/// of whitespace, and drop blank lines.
pub fn clean_ocr_text(raw: &str) -> String {
    raw.lines()
        .map(|line| {
            line.chars()
                .map(|ch| if ch.is_control() { ' ' } else { ch })
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
