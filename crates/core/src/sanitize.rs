pub fn sanitize_component(value: &str) -> String {
    value
        .chars()
        .map(|ch| if is_disallowed_char(ch) { '_' } else { ch })
        .collect()
}

fn is_disallowed_char(ch: char) -> bool {
    matches!(ch, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|')
        || ch == '\0'
        || ch.is_control()
}
