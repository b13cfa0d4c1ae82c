//! Keyword emphasis for recipe text.
//!
//! Ingredients carry a list of keywords (`"flour"`, `"egg white"`) and step text
//! refers to them in free prose. [`highlight`] marks every occurrence so a
//! terminal rendering of a recipe shows which ingredient each step touches.
//!
//! Matching is a single left-to-right scan. At every position the keywords are
//! tried longest first, so `"egg white"` always wins over `"egg"` when both start
//! at the same place. There is no word-boundary check: `"egg"` is highlighted
//! inside `"eggplant"` as well.

/// ANSI blue foreground.
pub const EMPHASIS_START: &str = "\x1b[34m";
/// ANSI default foreground.
pub const EMPHASIS_END: &str = "\x1b[39m";

/// Sorts keywords by descending length. Ties keep their original order.
pub fn sort_longest_first<S: AsRef<str>>(keywords: &mut [S]) {
    keywords.sort_by(|a, b| {
        b.as_ref()
            .chars()
            .count()
            .cmp(&a.as_ref().chars().count())
    });
}

/// Wraps every case-insensitive, non-overlapping keyword occurrence in `text`
/// with the emphasis marker. The matched slice of `text` is kept as-is, only
/// the markers are added.
pub fn highlight<S: AsRef<str>>(text: &str, keywords: &[S]) -> String {
    let mut keywords: Vec<&str> = keywords
        .iter()
        .map(|k| k.as_ref())
        .filter(|k| !k.is_empty())
        .collect();
    if keywords.is_empty() {
        return text.to_string();
    }
    sort_longest_first(&mut keywords);

    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    'scan: while !rest.is_empty() {
        for keyword in &keywords {
            if let Some(len) = match_len(rest, keyword) {
                out.push_str(EMPHASIS_START);
                out.push_str(&rest[..len]);
                out.push_str(EMPHASIS_END);
                rest = &rest[len..];
                continue 'scan;
            }
        }

        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            out.push(c);
        }
        rest = chars.as_str();
    }

    out
}

/// Removes every emphasis marker from `text`.
pub fn strip_emphasis(text: &str) -> String {
    text.replace(EMPHASIS_START, "").replace(EMPHASIS_END, "")
}

// Byte length of the prefix of `haystack` equal to `needle` ignoring case.
fn match_len(haystack: &str, needle: &str) -> Option<usize> {
    let mut consumed = 0;
    let mut hay = haystack.chars();
    for n in needle.chars() {
        let h = hay.next()?;
        if !h.to_lowercase().eq(n.to_lowercase()) {
            return None;
        }
        consumed += h.len_utf8();
    }
    Some(consumed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn em(s: &str) -> String {
        format!("{EMPHASIS_START}{s}{EMPHASIS_END}")
    }

    #[test]
    fn test_longer_keyword_is_not_shadowed() {
        let out = highlight("egg white and egg yolk", &["egg", "egg white"]);
        assert_eq!(out, format!("{} and {} yolk", em("egg white"), em("egg")));
    }

    #[test]
    fn test_case_insensitive_keeps_original_case() {
        let out = highlight("Sift the Flour twice", &["FLOUR"]);
        assert_eq!(out, format!("Sift the {} twice", em("Flour")));
    }

    #[test]
    fn test_no_word_boundary_check() {
        let out = highlight("roast the eggplant", &["egg"]);
        assert_eq!(out, format!("roast the {}plant", em("egg")));
    }

    #[test]
    fn test_no_keywords_returns_input() {
        let empty: [&str; 0] = [];
        assert_eq!(highlight("boil water", &empty), "boil water");
        assert_eq!(highlight("boil water", &[""]), "boil water");
    }

    #[test]
    fn test_multibyte_text() {
        let out = highlight("fold in the crème fraîche", &["CRÈME FRAÎCHE"]);
        assert_eq!(out, format!("fold in the {}", em("crème fraîche")));
    }

    #[test]
    fn test_adjacent_matches() {
        let out = highlight("saltsalt", &["salt"]);
        assert_eq!(out, format!("{}{}", em("salt"), em("salt")));
    }

    #[test]
    fn test_strip_round_trip() {
        let cases: [(&str, &[&str]); 5] = [
            ("egg white and egg yolk", &["egg", "egg white", "yolk"]),
            ("Mix Butter, butter and BUTTER", &["butter"]),
            ("nothing matches here", &["saffron"]),
            ("ÄÖÜ äöü", &["ä", "öü"]),
            ("", &["anything"]),
        ];
        for (text, keywords) in cases {
            assert_eq!(strip_emphasis(&highlight(text, keywords)), text);
        }
    }

    #[test]
    fn test_sort_longest_first_is_stable() {
        let mut keywords = vec!["ab", "c", "de", "fgh"];
        sort_longest_first(&mut keywords);
        assert_eq!(keywords, vec!["fgh", "ab", "de", "c"]);
    }
}
