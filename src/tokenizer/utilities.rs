use once_cell::sync::Lazy;
use regex::Regex;

/// Unicode punctuation (categories P*)
static PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\p{P}$").unwrap());

/// Unicode control, format and unassigned characters (categories C*)
static CONTROL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\p{C}$").unwrap());

/// Nonspacing combining marks (category Mn)
static NONSPACING_MARK: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\p{Mn}$").unwrap());

fn char_matches(re: &Regex, c: char) -> bool {
    let mut buf = [0u8; 4];
    re.is_match(c.encode_utf8(&mut buf))
}

pub fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r') || c.is_whitespace()
}

/// Tab and newlines count as whitespace, not control
pub fn is_control(c: char) -> bool {
    if matches!(c, '\t' | '\n' | '\r') {
        return false;
    }
    char_matches(&CONTROL, c)
}

/// ASCII non-alphanumerics count as punctuation even where Unicode says otherwise (e.g. `$`, `^`)
pub fn is_punctuation(c: char) -> bool {
    let cp = c as u32;
    if (33..=47).contains(&cp) || (58..=64).contains(&cp) || (91..=96).contains(&cp) || (123..=126).contains(&cp) {
        return true;
    }
    char_matches(&PUNCTUATION, c)
}

pub fn is_nonspacing_mark(c: char) -> bool {
    char_matches(&NONSPACING_MARK, c)
}

/// CJK Unified Ideographs and their extensions
pub fn is_chinese_char(c: char) -> bool {
    let cp = c as u32;
    (0x4E00..=0x9FFF).contains(&cp)
        || (0x3400..=0x4DBF).contains(&cp)
        || (0x20000..=0x2A6DF).contains(&cp)
        || (0x2A700..=0x2B73F).contains(&cp)
        || (0x2B740..=0x2B81F).contains(&cp)
        || (0x2B820..=0x2CEAF).contains(&cp)
        || (0xF900..=0xFAFF).contains(&cp)
        || (0x2F800..=0x2FA1F).contains(&cp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_character_classes() {
        assert!(is_punctuation('$'));
        assert!(is_punctuation('¿'));
        assert!(is_punctuation('-'));
        assert!(!is_punctuation('a'));
        assert!(is_control('\u{200B}'));
        assert!(!is_control('\t'));
        assert!(is_control('\u{0007}'));
        assert!(is_whitespace('\u{00A0}'));
        assert!(is_chinese_char('中'));
        assert!(!is_chinese_char('a'));
        assert!(is_nonspacing_mark('\u{0301}'));
    }
}
