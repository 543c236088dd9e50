use logsift::masking::{fingerprint, fingerprint_line, mask_message};
use logsift::parser::parse_line;

#[test]
fn masking_replaces_uuid_hex_and_numbers() {
    let input = "user 42 session 550e8400-e29b-41d4-a716-446655440000 addr 0xdeadBEEF retries 3";
    assert_eq!(mask_message(input), "user <NUM> session <UUID> addr <HEX> retries <NUM>");
}

#[test]
fn hex_is_masked_before_numbers() {
    assert_eq!(mask_message("0x1A"), "<HEX>");
    assert_eq!(fingerprint(Some("ERROR"), None, "bad register 0x1A"), "ERROR | bad register <HEX>");
}

#[test]
fn whitespace_is_collapsed_and_trimmed() {
    assert_eq!(mask_message("  took\t 15   ms  "), "took <NUM> ms");
}

#[test]
fn fingerprint_joins_present_parts_only() {
    assert_eq!(fingerprint(Some("INFO"), Some("app.db"), "query 7 ok"), "INFO | app.db | query <NUM> ok");
    assert_eq!(fingerprint(Some("INFO"), None, "query 7 ok"), "INFO | query <NUM> ok");
    assert_eq!(fingerprint(None, None, "query 7 ok"), "query <NUM> ok");
}

#[test]
fn lines_differing_only_in_volatile_tokens_share_a_fingerprint() {
    let a = parse_line("2026-01-29 10:22:01 INFO worker.pool job 17 finished in 250 ms id=6fa459ea-ee8a-3ca4-894e-db77e160355e", 1);
    let b = parse_line("2026-01-29 11:00:59.999 INFO worker.pool job   9001 finished in 3 ms id=16fd2706-8baf-433b-82eb-8c7fada847da", 2);
    assert_eq!(fingerprint_line(&a), fingerprint_line(&b));
    assert_eq!(fingerprint_line(&a), "INFO | worker.pool | job <NUM> finished in <NUM> ms id=<UUID>");
}

#[test]
fn lines_differing_in_words_level_or_logger_do_not_merge() {
    let base = parse_line("2026-01-29 10:22:01 INFO worker.pool job 17 finished", 1);
    let word = parse_line("2026-01-29 10:22:01 INFO worker.pool job 17 failed", 2);
    let level = parse_line("2026-01-29 10:22:01 ERROR worker.pool job 17 finished", 3);
    let logger = parse_line("2026-01-29 10:22:01 INFO worker.queue job 17 finished", 4);
    let fp = fingerprint_line(&base);
    assert_ne!(fp, fingerprint_line(&word));
    assert_ne!(fp, fingerprint_line(&level));
    assert_ne!(fp, fingerprint_line(&logger));
}

#[test]
fn unparsed_line_fingerprints_its_whole_text() {
    let rec = parse_line("  connection reset by peer 10.0.0.5  ", 1);
    assert_eq!(fingerprint_line(&rec), "connection reset by peer <NUM>.<NUM>.<NUM>.<NUM>");
}
