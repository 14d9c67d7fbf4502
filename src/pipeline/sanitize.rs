const FENCE: &str = "```";

/// Isolates the payload of a model reply by removing the outermost Markdown
/// fence pair and any prose around it.
///
/// A fence marker only counts at the start of a line (opener) or the end of a
/// line (closer), so backticks inside a JSON string value are left alone.
/// Fences are peeled until none remain, so the result is a fixpoint:
/// `sanitize(&sanitize(x)) == sanitize(x)`. Text without a complete fence pair
/// is only trimmed.
pub fn sanitize(raw: &str) -> String {
    let mut current = raw.trim();
    while let Some(inner) = strip_outer_fence(current) {
        current = inner;
    }
    current.to_string()
}

pub fn has_fence(text: &str) -> bool {
    strip_outer_fence(text.trim()).is_some()
}

fn strip_outer_fence(text: &str) -> Option<&str> {
    let open = text
        .match_indices(FENCE)
        .map(|(index, _)| index)
        .find(|index| starts_line(text, *index))?;
    let body_start = open + FENCE.len();
    let close = text
        .rmatch_indices(FENCE)
        .map(|(index, _)| index)
        .take_while(|index| *index >= body_start)
        .find(|index| ends_line(text, index + FENCE.len()))?;
    Some(drop_info_string(&text[body_start..close]).trim())
}

fn starts_line(text: &str, index: usize) -> bool {
    let before = text[..index].trim_end_matches([' ', '\t']);
    before.is_empty() || before.ends_with('\n')
}

fn ends_line(text: &str, index: usize) -> bool {
    let after = text[index..].trim_start_matches([' ', '\t']);
    after.is_empty() || after.starts_with(['\n', '\r'])
}

// The opener may carry a language tag ("json", "JSON", "jsonc") either on its
// own line or directly before the payload.
fn drop_info_string(body: &str) -> &str {
    if let Some((first_line, rest)) = body.split_once('\n')
        && is_info_string(first_line.trim())
    {
        return rest;
    }

    let trimmed = body.trim_start();
    match (trimmed.get(..4), trimmed.get(4..)) {
        (Some(tag), Some(rest))
            if tag.eq_ignore_ascii_case("json") && rest.starts_with(char::is_whitespace) =>
        {
            rest
        }
        _ => body,
    }
}

fn is_info_string(line: &str) -> bool {
    line.chars()
        .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '+' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tagged_fence() {
        let raw = "```json\n[{\"a\": 1}]\n```";
        assert_eq!(sanitize(raw), "[{\"a\": 1}]");
    }

    #[test]
    fn strips_untagged_fence_and_surrounding_prose() {
        let raw = "Here is the digest you asked for:\n```\n{\"a\": 1}\n```\nLet me know!";
        assert_eq!(sanitize(raw), "{\"a\": 1}");
    }

    #[test]
    fn strips_inline_tag_without_newline() {
        assert_eq!(sanitize("```json {\"a\": 1}```"), "{\"a\": 1}");
    }

    #[test]
    fn leaves_unfenced_text_alone_apart_from_trimming() {
        assert_eq!(sanitize("  {\"a\": 1}\n"), "{\"a\": 1}");
        assert_eq!(
            sanitize("Sorry, I cannot comply."),
            "Sorry, I cannot comply."
        );
    }

    #[test]
    fn unmatched_opener_is_not_a_fence() {
        let raw = "```json\n{\"a\": 1}";
        assert_eq!(sanitize(raw), raw);
        assert!(!has_fence(raw));
    }

    #[test]
    fn empty_fence_yields_empty_text() {
        assert_eq!(sanitize("```json\n```"), "");
        assert_eq!(sanitize("``````"), "");
    }

    #[test]
    fn single_line_fence_keeps_its_content() {
        assert_eq!(sanitize("```hello```"), "hello");
    }

    #[test]
    fn backticks_inside_json_strings_survive() {
        let inline = "{\"summary\": \"use ```x``` here\"}";
        assert_eq!(sanitize(inline), inline);
        assert!(!has_fence(inline));

        let fenced = format!("```json\n{inline}\n```");
        assert_eq!(sanitize(&fenced), inline);
    }

    #[test]
    fn indented_fence_after_prose_is_stripped() {
        let raw = "Digest below.\n  ```json\n  [1, 2]\n  ```  \nThanks";
        assert_eq!(sanitize(raw), "[1, 2]");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let samples = [
            "",
            "plain",
            "```json\n[1, 2]\n```",
            "```json\n```nested```\n```",
            "prose ```a``` more ```b``` tail",
            "{\"summary\": \"use ```x``` here\"}",
            "```",
            "````",
            "  ```JSON\n{\"k\": \"v\"}\n```  ",
            "```json {\"x\": \"```\"}```",
        ];
        for sample in samples {
            let once = sanitize(sample);
            assert_eq!(sanitize(&once), once, "not idempotent for {sample:?}");
        }
    }
}
