//! Operator annotations injected into fresh WHOIS responses.

const SOURCE_PREFIX: &str = "source:";

/// Copy `text` line by line and emit `extra` right after every line starting
/// with `source:`. Text without such a line is returned unchanged.
pub fn insert_after_source(text: &str, extra: &[String]) -> String {
    if extra.is_empty() || !text.lines().any(|line| line.starts_with(SOURCE_PREFIX)) {
        return text.to_string();
    }

    let added: usize = extra.iter().map(|line| line.len() + 2).sum();
    let mut out = String::with_capacity(text.len() + added);

    for line in text.split_inclusive('\n') {
        out.push_str(line);
        if !line.starts_with(SOURCE_PREFIX) {
            continue;
        }

        let eol = if line.ends_with("\r\n") { "\r\n" } else { "\n" };
        if !line.ends_with('\n') {
            out.push_str(eol);
        }
        for extra_line in extra {
            out.push_str(extra_line);
            out.push_str(eol);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extra() -> Vec<String> {
        vec![
            "descr:         Domain for sale!".to_string(),
            "descr:         rubleff@gmail.com".to_string(),
        ]
    }

    #[test]
    fn test_without_source_line_is_unchanged() {
        let text = "domain:        EXAMPLE.RU\nnserver:       a.ns.example.ru.\n";
        assert_eq!(insert_after_source(text, &extra()), text);
    }

    #[test]
    fn test_inserts_after_source_line() {
        let text = "domain:        EXAMPLE.RU\nsource:        TCI\n\nLast updated on 2021-01-01\n";
        let expected = "domain:        EXAMPLE.RU\nsource:        TCI\n\
                        descr:         Domain for sale!\n\
                        descr:         rubleff@gmail.com\n\
                        \nLast updated on 2021-01-01\n";
        assert_eq!(insert_after_source(text, &extra()), expected);
    }

    #[test]
    fn test_keeps_crlf_terminators() {
        let text = "domain: EXAMPLE.RU\r\nsource: TCI\r\n";
        let expected = "domain: EXAMPLE.RU\r\nsource: TCI\r\ndescr:         Domain for sale!\r\n\
                        descr:         rubleff@gmail.com\r\n";
        assert_eq!(insert_after_source(text, &extra()), expected);
    }

    #[test]
    fn test_source_as_last_unterminated_line() {
        let text = "domain: EXAMPLE.RU\nsource: TCI";
        let extra = vec!["descr: note".to_string()];
        assert_eq!(
            insert_after_source(text, &extra),
            "domain: EXAMPLE.RU\nsource: TCI\ndescr: note\n"
        );
    }

    #[test]
    fn test_prefix_must_start_the_line() {
        let text = "remarks: source: nowhere\n  source: indented\n";
        assert_eq!(insert_after_source(text, &extra()), text);
    }

    #[test]
    fn test_every_source_line_is_annotated() {
        let text = "source: A\nsource: B\n";
        let extra = vec!["x".to_string()];
        assert_eq!(insert_after_source(text, &extra), "source: A\nx\nsource: B\nx\n");
    }
}
