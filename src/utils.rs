const MAX_TITLE_LENGTH: usize = 72;

/// First line of a commit message, cut down to something that fits in a log line.
pub(crate) fn commit_title(message: &str) -> String {
    let title = message.lines().next().unwrap_or_default().trim();
    if title.chars().count() <= MAX_TITLE_LENGTH {
        title.to_owned()
    } else {
        title.chars().take(MAX_TITLE_LENGTH).collect::<String>() + "…"
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn keeps_first_line_only() {
        assert_eq!(commit_title("Fix parser\n\nLong explanation"), "Fix parser");
        assert_eq!(commit_title(""), "");
    }

    #[test]
    fn shortens_long_titles_on_char_boundaries() {
        let title = "é".repeat(100);
        let short = commit_title(&title);
        assert_eq!(short.chars().count(), MAX_TITLE_LENGTH + 1);
        assert!(short.ends_with('…'));
    }
}
