//! Fenced code block helpers for completion output and log rendering.

/// Collect the bodies of fenced blocks, in order.
///
/// With `lang` set, only blocks opened with that info string are kept.
/// An unterminated block runs to the end of the text.
pub fn extract_code_blocks(text: &str, lang: Option<&str>) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Option<(bool, Vec<&str>)> = None;

    for line in text.lines() {
        let trimmed = line.trim_start();
        match current.take() {
            None => {
                if let Some(info) = trimmed.strip_prefix("```") {
                    let keep = lang.map_or(true, |wanted| info.trim().eq_ignore_ascii_case(wanted));
                    current = Some((keep, Vec::new()));
                }
            }
            Some((keep, lines)) if trimmed.starts_with("```") => {
                if keep {
                    blocks.push(lines.join("\n"));
                }
            }
            Some((keep, mut lines)) => {
                lines.push(line);
                current = Some((keep, lines));
            }
        }
    }

    if let Some((true, lines)) = current {
        blocks.push(lines.join("\n"));
    }
    blocks
}

/// Wrap `body` in a fence tagged with `lang`.
pub fn fence(lang: &str, body: &str) -> String {
    format!("```{lang}\n{}\n```", body.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_blocks_in_order() {
        let text = "intro\n```json\n{\"a\": 1}\n```\nmiddle\n```\nplain\n```\n";
        assert_eq!(
            extract_code_blocks(text, None),
            vec!["{\"a\": 1}".to_string(), "plain".to_string()]
        );
        assert_eq!(
            extract_code_blocks(text, Some("json")),
            vec!["{\"a\": 1}".to_string()]
        );
    }

    #[test]
    fn unterminated_block_runs_to_end() {
        assert_eq!(
            extract_code_blocks("```json\n[1,\n2]", Some("json")),
            vec!["[1,\n2]".to_string()]
        );
    }

    #[test]
    fn fence_wraps_body() {
        assert_eq!(fence("text", "a\n"), "```text\na\n```");
    }
}
