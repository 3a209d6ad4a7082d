//! Normalization of raw model output into conversation-safe text
//!
//! Sanitized text uses a tiny markup vocabulary: `<br>` for a paragraph
//! break and `<strong>`/`</strong>` for strong emphasis. Renderers should go
//! through [`segments`] rather than injecting the string as markup.

use regex::{Captures, Regex};
use std::sync::LazyLock;

const BREAK: &str = "<br>";
const STRONG_OPEN: &str = "<strong>";
const STRONG_CLOSE: &str = "</strong>";

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[A-Za-z][^<>]*>").expect("tag pattern is valid"));

static BREAK_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^<br\s*/?>$").expect("break pattern is valid"));

static NEWLINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r\n|\r|\n").expect("newline pattern is valid"));

static STRONG_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*([^*]+)\*\*").expect("emphasis pattern is valid"));

/// Turn raw model output into display text
///
/// Steps run in order: strip foreign markup, trim, convert newlines to
/// `<br>`, wrap `**span**` in `<strong>`. Stripping and wrapping each run to
/// a fixed point, which makes the whole function idempotent.
pub fn sanitize(raw: &str) -> String {
    let stripped = strip_tags(raw);
    let trimmed = stripped.trim();
    let broken = NEWLINE.replace_all(trimmed, BREAK);
    emphasize(&broken)
}

/// Remove every tag outside the output vocabulary
fn strip_tags(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = TAG
            .replace_all(&current, |caps: &Captures| {
                let tag = &caps[0];
                if BREAK_TAG.is_match(tag) {
                    BREAK.to_string()
                } else if tag == STRONG_OPEN || tag == STRONG_CLOSE {
                    tag.to_string()
                } else {
                    String::new()
                }
            })
            .into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

fn emphasize(text: &str) -> String {
    let mut current = text.to_string();
    while STRONG_SPAN.is_match(&current) {
        current = STRONG_SPAN
            .replace_all(&current, "<strong>$1</strong>")
            .into_owned();
    }
    current
}

/// A piece of sanitized text, ready for safe rendering
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Strong(String),
    Break,
}

/// Split sanitized text into renderable segments
///
/// Unbalanced emphasis tags are tolerated: a stray closing tag is dropped and
/// an unclosed opening tag runs to the end of the text.
pub fn segments(sanitized: &str) -> Vec<Segment> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut rest = sanitized;

    while !rest.is_empty() {
        let next_tag = [BREAK, STRONG_OPEN, STRONG_CLOSE]
            .iter()
            .filter_map(|tag| rest.find(tag).map(|pos| (pos, *tag)))
            .min_by_key(|(pos, _)| *pos);

        let (text, tag) = match next_tag {
            Some((pos, tag)) => (&rest[..pos], Some(tag)),
            None => (rest, None),
        };

        if !text.is_empty() {
            push_text(&mut out, text, depth > 0);
        }

        match tag {
            Some(BREAK) => out.push(Segment::Break),
            Some(STRONG_OPEN) => depth += 1,
            Some(_) => depth = depth.saturating_sub(1),
            None => break,
        }
        let consumed = text.len() + tag.map_or(0, str::len);
        rest = &rest[consumed..];
    }

    out
}

fn push_text(out: &mut Vec<Segment>, text: &str, strong: bool) {
    match (out.last_mut(), strong) {
        (Some(Segment::Text(prev)), false) | (Some(Segment::Strong(prev)), true) => {
            prev.push_str(text)
        }
        _ if strong => out.push(Segment::Strong(text.to_string())),
        _ => out.push(Segment::Text(text.to_string())),
    }
}

/// Sanitized text with markup removed, suitable for speech synthesis
pub fn plain_text(sanitized: &str) -> String {
    segments(sanitized)
        .into_iter()
        .map(|segment| match segment {
            Segment::Text(text) | Segment::Strong(text) => text,
            Segment::Break => "\n".to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(sanitize("Hi there"), "Hi there");
        assert_eq!(sanitize("3 < 5 and 6 > 2"), "3 < 5 and 6 > 2");
    }

    #[test]
    fn test_strips_markup() {
        assert_eq!(sanitize("<p>Hello <em>world</em></p>"), "Hello world");
        assert_eq!(
            sanitize("<script>alert(1)</script>safe"),
            "alert(1)safe"
        );
    }

    #[test]
    fn test_strip_reaches_fixed_point() {
        // removing the inner tag exposes another one
        assert_eq!(sanitize("<<b>i>text"), "text");
    }

    #[test]
    fn test_newlines_become_breaks() {
        assert_eq!(sanitize("one\ntwo\r\nthree\rfour"), "one<br>two<br>three<br>four");
        assert_eq!(sanitize("line<BR/>next"), "line<br>next");
        assert_eq!(sanitize("\n\nHello\n"), "Hello");
    }

    #[test]
    fn test_emphasis_is_wrapped() {
        assert_eq!(
            sanitize("This is **important** text"),
            "This is <strong>important</strong> text"
        );
        assert_eq!(sanitize("unpaired ** marker"), "unpaired ** marker");
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "Hello",
            "**bold** and\nnew line",
            "<div>**a**b**</div>\r\n",
            "****x**y**",
            "<**b**>",
            "a<\nfoo>",
            "<strong>given</strong> by the model",
            "<<b>i>x\n**",
            "",
            "   ",
        ];
        for input in inputs {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once, "not idempotent for {:?}", input);
        }
    }

    #[test]
    fn test_segments() {
        let sanitized = sanitize("Say **hello**\nthen leave");
        assert_eq!(
            segments(&sanitized),
            vec![
                Segment::Text("Say ".to_string()),
                Segment::Strong("hello".to_string()),
                Segment::Break,
                Segment::Text("then leave".to_string()),
            ]
        );
    }

    #[test]
    fn test_segments_tolerate_unbalanced_tags() {
        assert_eq!(
            segments("a</strong>b<strong>c"),
            vec![Segment::Text("ab".to_string()), Segment::Strong("c".to_string())]
        );
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(plain_text(&sanitize("**Two** plus two\nis four")), "Two plus two\nis four");
    }
}
