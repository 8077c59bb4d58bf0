use std::sync::LazyLock;

use cardsync_core::ListStyle;
use regex::Regex;

static ORDERED_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.[ \t]+").expect("valid regex"));

/// Text as it should be written into a text layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedText {
    pub text: String,
    pub list_style: ListStyle,
}

/// Turns `"1. Foo\n2. Bar"` into a native numbered list. The first line
/// decides: if it starts with a number, dot and space, the prefix is
/// stripped from every line that has one and the range becomes an ordered
/// list. Anything else is written verbatim.
pub fn format_text(raw: &str) -> FormattedText {
    let normalized = raw.replace("\r\n", "\n");
    let is_list = normalized
        .split('\n')
        .next()
        .is_some_and(|first| ORDERED_ITEM.is_match(first));

    if !is_list {
        return FormattedText {
            text: normalized,
            list_style: ListStyle::None,
        };
    }

    let text = normalized
        .split('\n')
        .map(|line| ORDERED_ITEM.replace(line, ""))
        .collect::<Vec<_>>()
        .join("\n");
    FormattedText {
        text,
        list_style: ListStyle::Ordered,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_lines_become_ordered_list() {
        let formatted = format_text("1. A\n2. B");
        assert_eq!(formatted.text, "A\nB");
        assert_eq!(formatted.list_style, ListStyle::Ordered);
    }

    #[test]
    fn plain_lines_stay_unstyled() {
        let formatted = format_text("A\nB");
        assert_eq!(formatted.text, "A\nB");
        assert_eq!(formatted.list_style, ListStyle::None);
    }

    #[test]
    fn first_line_decides() {
        let formatted = format_text("Intro\n1. A\n2. B");
        assert_eq!(formatted.text, "Intro\n1. A\n2. B");
        assert_eq!(formatted.list_style, ListStyle::None);

        let formatted = format_text("10. Ten\ncontinued\n11. Eleven");
        assert_eq!(formatted.text, "Ten\ncontinued\nEleven");
        assert_eq!(formatted.list_style, ListStyle::Ordered);
    }

    #[test]
    fn decimals_and_missing_space_are_not_lists() {
        assert_eq!(format_text("1.5 cups").list_style, ListStyle::None);
        assert_eq!(format_text("1.A").list_style, ListStyle::None);
        assert_eq!(format_text("").list_style, ListStyle::None);
    }

    #[test]
    fn windows_line_endings_are_normalized() {
        let formatted = format_text("1. A\r\n2. B");
        assert_eq!(formatted.text, "A\nB");
    }
}
