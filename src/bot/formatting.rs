//! Answer shaping for Telegram's message limits.

/// Longest first message before the rest moves behind "read more".
pub const FIRST_PART_LIMIT: usize = 999;
/// A word boundary past this point is preferred for the cut.
const SOFT_CUT_FROM: usize = 800;
/// Stay under Telegram's 4096-character message limit.
pub const MESSAGE_LIMIT: usize = 4000;

/// Char index where a long answer is cut, or `None` when it fits.
pub fn cut_point(text: &str) -> Option<usize> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= FIRST_PART_LIMIT {
        return None;
    }
    let last_space = chars[..FIRST_PART_LIMIT].iter().rposition(|c| *c == ' ');
    Some(match last_space {
        Some(pos) if pos > SOFT_CUT_FROM => pos,
        _ => FIRST_PART_LIMIT,
    })
}

/// First part of an answer, shortened when needed.
pub fn first_part(text: &str) -> String {
    match cut_point(text) {
        Some(cut) => text.chars().take(cut).collect(),
        None => text.to_string(),
    }
}

/// Whatever `first_part` left out, trimmed.
pub fn remainder(text: &str) -> String {
    match cut_point(text) {
        Some(cut) => text.chars().skip(cut).collect::<String>().trim().to_string(),
        None => String::new(),
    }
}

/// Split on line boundaries into messages no longer than `max_chars`.
/// A single line longer than the limit is hard-split.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut parts = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split('\n') {
        let line_len = line.chars().count();
        if current_len + line_len + 1 <= max_chars {
            current.push_str(line);
            current.push('\n');
            current_len += line_len + 1;
            continue;
        }
        if !current.trim().is_empty() {
            parts.push(current.trim().to_string());
        }
        current.clear();
        current_len = 0;

        let mut chars = line.chars().peekable();
        while chars.peek().is_some() {
            let chunk: String = chars.by_ref().take(max_chars.saturating_sub(1).max(1)).collect();
            if chars.peek().is_some() {
                parts.push(chunk);
            } else {
                current_len = chunk.chars().count() + 1;
                current = chunk;
                current.push('\n');
            }
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

/// "1. Name" lines for the product picker.
pub fn numbered_names<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    names
        .into_iter()
        .enumerate()
        .map(|(i, name)| format!("{}. {}\n", i + 1, name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_answers_are_not_cut() {
        assert_eq!(cut_point("короткий ответ"), None);
        assert_eq!(remainder("короткий ответ"), "");
    }

    #[test]
    fn long_answers_cut_at_late_space() {
        let text = format!("{} {}", "а".repeat(900), "б".repeat(300));
        assert_eq!(cut_point(&text), Some(900));
        assert_eq!(first_part(&text).chars().count(), 900);
        assert_eq!(remainder(&text), "б".repeat(300));
    }

    #[test]
    fn early_space_forces_hard_cut() {
        let text = format!("{} {}", "а".repeat(100), "б".repeat(1200));
        assert_eq!(cut_point(&text), Some(FIRST_PART_LIMIT));
        let rest = remainder(&text);
        assert_eq!(
            first_part(&text).chars().count() + rest.chars().count(),
            text.chars().count()
        );
    }

    #[test]
    fn split_keeps_lines_together() {
        let text = ["aaaa", "bbbb", "cccc"].join("\n");
        assert_eq!(split_message(&text, 10), vec!["aaaa\nbbbb", "cccc"]);
        assert_eq!(split_message("tiny", 10), vec!["tiny"]);
    }

    #[test]
    fn split_breaks_oversized_lines() {
        let text = format!("{}\nend", "x".repeat(25));
        let parts = split_message(&text, 10);
        assert!(parts.iter().all(|p| p.chars().count() <= 10));
        assert_eq!(parts.concat().replace('\n', ""), format!("{}end", "x".repeat(25)));
    }

    #[test]
    fn numbered_list() {
        assert_eq!(numbered_names(["A", "B"]), "1. A\n2. B\n");
    }
}
