//! Pipe-delimited replication stream tokenizer.
//!
//! Probes submit `update` bundles as a single `|`-delimited string. This
//! crate splits that string into tokens (respecting `"`-quoted substrings
//! and `\`-escapes) and then groups the resulting tokens into
//! `replication | recordXml | rawXml | extra` quadruples per the probe's
//! wire grammar.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use gracc_error::{ErrorCode, GraccError};

/// One `replication` group extracted from a tokenized bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationGroup {
    /// The record's XML, as submitted by the probe.
    pub record_xml: String,
    /// The raw XML accompanying the record (historically unused by
    /// downstream consumers, but carried through).
    pub raw_xml: String,
    /// A third, probe-defined extra field.
    pub extra: String,
}

/// Split `input` on unescaped, unquoted `|` separators.
///
/// A `"` toggles "inside double-quoted string" state unless it is preceded
/// by an odd-length run of backslashes (i.e. the quote itself is escaped).
/// While inside a quoted string, `|` does not separate tokens. On reaching
/// the end of `input`, any accumulated bytes form a final token, possibly
/// empty.
///
/// # Examples
///
/// ```
/// use gracc_tokenizer::tokenize;
/// assert_eq!(tokenize("a|b|c"), vec!["a", "b", "c"]);
/// assert_eq!(tokenize(r#"a|"b|c"|d"#), vec!["a", r#""b|c""#, "d"]);
/// ```
pub fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut backslash_run = 0usize;

    for c in input.chars() {
        match c {
            '\\' => {
                backslash_run += 1;
                current.push(c);
            }
            '"' => {
                let escaped = backslash_run % 2 == 1;
                if !escaped {
                    in_quotes = !in_quotes;
                }
                current.push(c);
                backslash_run = 0;
            }
            '|' if !in_quotes => {
                tokens.push(std::mem::take(&mut current));
                backslash_run = 0;
            }
            _ => {
                current.push(c);
                backslash_run = 0;
            }
        }
    }
    tokens.push(current);
    tokens
}

/// Tokenize `input`, enforcing a caller-specified maximum buffer size.
///
/// `start_buffer_size` is used as the initial capacity hint for the token
/// accumulator; `max_buffer_size` bounds the total input size this call
/// will accept. Exceeding it is a parse failure (`MalformedBundle`), per
/// the tokenizer's growable-buffer contract.
pub fn tokenize_bounded(
    input: &str,
    start_buffer_size: usize,
    max_buffer_size: usize,
) -> Result<Vec<String>, GraccError> {
    if input.len() > max_buffer_size {
        return Err(GraccError::new(
            ErrorCode::MalformedBundle,
            format!(
                "input of {} bytes exceeds max buffer size of {} bytes",
                input.len(),
                max_buffer_size
            ),
        )
        .with_context("input_len", input.len())
        .with_context("max_buffer_size", max_buffer_size));
    }
    let _ = start_buffer_size;
    Ok(tokenize(input))
}

/// Group tokens into `replication` quadruples.
///
/// Empty tokens between groups are skipped. A tag other than the literal
/// `replication` is skipped silently, for forward compatibility with
/// future probe tag types. Running out of tokens in the middle of a
/// quadruple is a parse failure.
pub fn parse_replication_groups(tokens: &[String]) -> Result<Vec<ReplicationGroup>, GraccError> {
    const TAG: &str = "replication";
    let mut groups = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        if tokens[i].is_empty() {
            i += 1;
            continue;
        }
        if tokens[i] != TAG {
            i += 1;
            continue;
        }
        if i + 3 >= tokens.len() {
            return Err(GraccError::new(
                ErrorCode::MalformedBundle,
                "reached end of input in the middle of a replication group",
            ));
        }
        groups.push(ReplicationGroup {
            record_xml: tokens[i + 1].clone(),
            raw_xml: tokens[i + 2].clone(),
            extra: tokens[i + 3].clone(),
        });
        i += 4;
    }

    Ok(groups)
}

/// Convenience: tokenize and group in one call.
pub fn parse_bundle_payload(
    input: &str,
    start_buffer_size: usize,
    max_buffer_size: usize,
) -> Result<Vec<ReplicationGroup>, GraccError> {
    let tokens = tokenize_bounded(input, start_buffer_size, max_buffer_size)?;
    parse_replication_groups(&tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- 1. Round-trip on plain strings ---------------------------------------

    #[test]
    fn round_trip_plain_tokens() {
        assert_eq!(tokenize("A|hello|B"), vec!["A", "hello", "B"]);
    }

    // -- 2. Quote respect -------------------------------------------------------

    #[test]
    fn quote_respect() {
        assert_eq!(
            tokenize(r#"a|"b|c"|d"#),
            vec!["a".to_string(), r#""b|c""#.to_string(), "d".to_string()]
        );
    }

    // -- 3. Escape respect --------------------------------------------------------

    #[test]
    fn escape_respect() {
        let input = "a|\"b\\\"|c\"|d";
        let expected = vec!["a".to_string(), "\"b\\\"|c\"".to_string(), "d".to_string()];
        assert_eq!(tokenize(input), expected);
    }

    // -- 4. Double backslash does not escape the quote ----------------------------

    #[test]
    fn double_backslash_does_not_escape() {
        // a | "b\\" | c  -- the quote closes the string since \\ is two escaped
        // backslashes, not an escape of the following quote.
        let input = "a|\"b\\\\\"|c";
        let tokens = tokenize(input);
        assert_eq!(tokens, vec!["a".to_string(), "\"b\\\\\"".to_string(), "c".to_string()]);
    }

    // -- 5. Empty token on trailing separator --------------------------------------

    #[test]
    fn trailing_separator_yields_empty_final_token() {
        assert_eq!(tokenize("a|b|"), vec!["a", "b", ""]);
    }

    // -- 6. Single group parses ------------------------------------------------------

    #[test]
    fn single_replication_group() {
        let tokens = tokenize("replication|REC|RAW|EXTRA|");
        let groups = parse_replication_groups(&tokens).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].record_xml, "REC");
        assert_eq!(groups[0].raw_xml, "RAW");
        assert_eq!(groups[0].extra, "EXTRA");
    }

    // -- 7. Multiple interleaved groups -----------------------------------------------

    #[test]
    fn multiple_groups() {
        let tokens = tokenize("replication|A1|B1|C1|replication|A2|B2|C2|");
        let groups = parse_replication_groups(&tokens).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[1].record_xml, "A2");
    }

    // -- 8. Unknown tag skipped silently -----------------------------------------------

    #[test]
    fn unknown_tag_skipped() {
        let tokens = tokenize("futuretag|ignored|replication|A|B|C|");
        let groups = parse_replication_groups(&tokens).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].record_xml, "A");
    }

    // -- 9. EOF mid-triple is a parse failure -------------------------------------------

    #[test]
    fn eof_mid_triple_is_malformed() {
        let tokens = tokenize("replication|A|B");
        let err = parse_replication_groups(&tokens).unwrap_err();
        assert_eq!(err.code, ErrorCode::MalformedBundle);
    }

    // -- 10. Empty tokens between groups are skipped ------------------------------------

    #[test]
    fn empty_tokens_between_groups_skipped() {
        let tokens = tokenize("||replication|A|B|C||");
        let groups = parse_replication_groups(&tokens).unwrap();
        assert_eq!(groups.len(), 1);
    }

    // -- 11. Bounded tokenizer rejects oversized input ------------------------------------

    #[test]
    fn bounded_rejects_oversized_input() {
        let input = "a".repeat(100);
        let err = tokenize_bounded(&input, 16, 10).unwrap_err();
        assert_eq!(err.code, ErrorCode::MalformedBundle);
    }

    #[test]
    fn bounded_accepts_input_within_max() {
        let tokens = tokenize_bounded("a|b|c", 16, 1024).unwrap();
        assert_eq!(tokens, vec!["a", "b", "c"]);
    }

    // -- 12. Full pipeline helper ------------------------------------------------------

    #[test]
    fn parse_bundle_payload_end_to_end() {
        let groups =
            parse_bundle_payload("replication|REC|RAW|EXTRA|", 16, 1024).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].record_xml, "REC");
    }

    proptest::proptest! {
        // Property 1: tokenize("A|" + s + "|B") == ["A", s, "B"] when s has
        // no '|' or '"'.
        #[test]
        fn round_trip_property(s in "[a-zA-Z0-9 ]*") {
            let input = format!("A|{s}|B");
            proptest::prop_assert_eq!(tokenize(&input), vec!["A".to_string(), s, "B".to_string()]);
        }

        #[test]
        fn never_panics_on_arbitrary_input(s in "\\PC*") {
            let _ = tokenize(&s);
        }
    }
}
