use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

fn code_block_regex() -> &'static Regex {
    static CODE_BLOCK: OnceLock<Regex> = OnceLock::new();
    CODE_BLOCK.get_or_init(|| Regex::new(r"(?s)```.*?```").expect("code block pattern is valid"))
}

fn community_name_regex() -> &'static Regex {
    static NAME: OnceLock<Regex> = OnceLock::new();
    NAME.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("community name pattern is valid"))
}

fn escape_text(segment: &str) -> String {
    let decoded = html_escape::decode_html_entities(segment);
    html_escape::encode_text(&decoded).to_string()
}

/// Escapes HTML outside fenced code blocks, which are kept as written.
/// Entities are decoded first so already-escaped text is not escaped twice.
/// Text between the fences is escaped segment by segment.
pub fn sanitize_markdown_content(markdown_input: &str) -> String {
    let mut output = String::with_capacity(markdown_input.len());
    let mut last = 0;

    for block in code_block_regex().find_iter(markdown_input) {
        output.push_str(&escape_text(&markdown_input[last..block.start()]));
        output.push_str(block.as_str());
        last = block.end();
    }
    output.push_str(&escape_text(&markdown_input[last..]));
    output
}

/// Strips all HTML tags, for titles and descriptions.
pub fn strip_all_html(input: &str) -> String {
    ammonia::Builder::new().tags(HashSet::new()).clean(input).to_string()
}

/// Community names double as URL path segments.
pub fn is_valid_community_name(name: &str) -> bool {
    community_name_regex().is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_escapes_html_but_keeps_code_blocks() {
        let input = "<script>x</script>\n```\n<b>kept</b>\n```";
        let output = sanitize_markdown_content(input);

        assert!(output.starts_with("&lt;script&gt;"));
        assert!(output.contains("```\n<b>kept</b>\n```"));
    }

    #[test]
    fn placeholder_lookalike_text_is_left_alone() {
        let input = "__CODE_BLOCK_PLACEHOLDER_0__ then\n```\nlet x = 1;\n```";
        let output = sanitize_markdown_content(input);

        assert_eq!(output, input);
        assert_eq!(output.matches("```").count(), 2);
    }

    #[test]
    fn text_around_several_blocks_is_escaped() {
        let input = "<i>a</i>```<b>1</b>```<i>b</i>```<b>2</b>```";
        assert_eq!(
            sanitize_markdown_content(input),
            "&lt;i&gt;a&lt;/i&gt;```<b>1</b>```&lt;i&gt;b&lt;/i&gt;```<b>2</b>```"
        );
    }

    #[test]
    fn escaped_input_is_not_escaped_twice() {
        assert_eq!(sanitize_markdown_content("a &lt; b"), "a &lt; b");
    }

    #[test]
    fn strip_all_html_keeps_text() {
        assert_eq!(strip_all_html("<b>Robotics</b> club"), "Robotics club");
    }

    #[test]
    fn community_names_are_path_safe() {
        assert!(is_valid_community_name("robotics_2-club"));
        assert!(!is_valid_community_name(""));
        assert!(!is_valid_community_name("robo tics"));
        assert!(!is_valid_community_name("../etc"));
    }
}
