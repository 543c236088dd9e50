use logsift::parser::{parse_line, split_lines};

#[test]
fn parse_line_with_comma_millis_and_dotted_logger() {
    let rec = parse_line("2026-01-29 10:22:01,123 INFO my.module Something happened", 7);
    assert_eq!(rec.timestamp_raw.as_deref(), Some("2026-01-29 10:22:01,123"));
    assert_eq!(rec.level.as_deref(), Some("INFO"));
    assert_eq!(rec.logger.as_deref(), Some("my.module"));
    assert_eq!(rec.message, "Something happened");
    assert_eq!(rec.line_number, 7);
    assert_eq!(rec.raw_text, "2026-01-29 10:22:01,123 INFO my.module Something happened");
}

#[test]
fn parse_iso_line_with_bracketed_logger() {
    let rec = parse_line("2026-01-29T10:22:01Z ERROR [Auth] Login failed", 1);
    assert_eq!(rec.timestamp_raw.as_deref(), Some("2026-01-29T10:22:01Z"));
    assert_eq!(rec.level.as_deref(), Some("ERROR"));
    assert_eq!(rec.logger.as_deref(), Some("[Auth]"));
    assert_eq!(rec.message, "Login failed");
}

#[test]
fn single_word_body_is_the_message_not_a_logger() {
    let rec = parse_line("2026-01-29 10:22:01 INFO started", 1);
    assert_eq!(rec.logger, None);
    assert_eq!(rec.message, "started");
}

#[test]
fn warning_is_normalized_and_unknown_levels_are_kept() {
    let warn = parse_line("2026-01-29 10:22:01 WARNING disk almost full", 1);
    assert_eq!(warn.level.as_deref(), Some("WARN"));

    let notice = parse_line("2026-01-29 10:22:01 NOTICE cron job queued", 2);
    assert_eq!(notice.level.as_deref(), Some("NOTICE"));
    assert_eq!(notice.logger.as_deref(), Some("cron"));
}

#[test]
fn lowercase_level_does_not_match() {
    let rec = parse_line("2026-01-29 10:22:01 info something", 3);
    assert!(!rec.is_structured());
    assert_eq!(rec.timestamp_raw, None);
    assert_eq!(rec.message, "2026-01-29 10:22:01 info something");
}

#[test]
fn unmatched_line_keeps_trimmed_text_as_message() {
    let rec = parse_line("   Traceback (most recent call last):  ", 12);
    assert_eq!(rec.timestamp_raw, None);
    assert_eq!(rec.level, None);
    assert_eq!(rec.logger, None);
    assert_eq!(rec.message, "Traceback (most recent call last):");
    assert_eq!(rec.raw_text, "   Traceback (most recent call last):  ");
}

#[test]
fn trailing_newline_is_stripped() {
    let rec = parse_line("2026-01-29 10:22:01 DEBUG app.db query ok\r\n", 1);
    assert_eq!(rec.message, "query ok");
    assert_eq!(rec.raw_text, "2026-01-29 10:22:01 DEBUG app.db query ok");
}

#[test]
fn empty_body_after_level_yields_empty_message() {
    let rec = parse_line("2026-01-29 10:22:01 INFO  ", 1);
    assert_eq!(rec.level.as_deref(), Some("INFO"));
    assert_eq!(rec.message, "");
    assert_eq!(rec.pattern_text(), "2026-01-29 10:22:01 INFO  ");
    assert_eq!(rec.example_text(), "2026-01-29 10:22:01 INFO");
}

#[test]
fn split_lines_handles_all_terminators() {
    assert_eq!(split_lines("a\nb\r\nc\rd"), vec!["a", "b", "c", "d"]);
    assert_eq!(split_lines("a\n\nb\n"), vec!["a", "", "b"]);
    assert!(split_lines("").is_empty());
}
