use rstest::rstest;

use super::*;
use crate::source::MemorySource;

fn scan_all(text: &str, window: usize) -> (Vec<(String, String)>, Option<ParseError>) {
    let mut src = MemorySource::new(text.as_bytes().to_vec());
    let mut scanner = Scanner::new(window, 16);
    let mut keys = Vec::new();
    loop {
        match scanner.scan_next_key(&mut src) {
            Ok(Some(found)) => {
                let raw = text[found.range].to_string();
                keys.push((found.key, raw));
            }
            Ok(None) => return (keys, None),
            Err(Error::Parse(err)) => return (keys, Some(err)),
            Err(other) => panic!("unexpected error {other:?}"),
        }
    }
}

fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
    items
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

#[rstest]
#[case(1)]
#[case(3)]
#[case(64)]
fn ranges_cover_raw_values(#[case] window: usize) {
    let text = r#" { "A":{ },"B":{ "B1":10, "B2":"ab}cd" } , "Z" : [1,"]",{}] ,"n":-1.5e3,"t":true } "#;
    let (keys, err) = scan_all(text, window);
    assert_eq!(err, None);
    assert_eq!(
        keys,
        pairs(&[
            ("A", "{ }"),
            ("B", r#"{ "B1":10, "B2":"ab}cd" }"#),
            ("Z", r#"[1,"]",{}]"#),
            ("n", "-1.5e3"),
            ("t", "true"),
        ])
    );
}

#[test]
fn escaped_keys_are_decoded() {
    let text = r#"{"a\"b":1,"é":"x\"}"}"#;
    let (keys, err) = scan_all(text, 4);
    assert_eq!(err, None);
    assert_eq!(keys, pairs(&[("a\"b", "1"), ("é", r#""x\"}""#)]));
}

#[test]
fn empty_object_has_no_keys() {
    let (keys, err) = scan_all("  {\n}\n", 2);
    assert!(keys.is_empty());
    assert_eq!(err, None);
}

#[rstest]
#[case("[1,2,3]", "[1,2,3]")]
#[case(" \"solo\" ", "\"solo\"")]
#[case("42", "42")]
#[case("null", "null")]
fn non_object_root_is_one_entry(#[case] text: &str, #[case] raw: &str) {
    let (keys, err) = scan_all(text, 8);
    assert_eq!(err, None);
    assert_eq!(keys, pairs(&[("", raw)]));
}

#[test]
fn duplicate_keys_are_reported_in_order() {
    let (keys, err) = scan_all(r#"{"a":1,"a":2}"#, 8);
    assert_eq!(err, None);
    assert_eq!(keys, pairs(&[("a", "1"), ("a", "2")]));
}

#[rstest]
#[case(r#"{"a":1,"b":[1,2}"#, 1, SyntaxError::MismatchedDelimiter, 15)]
#[case(r#"{"a":1 "b":2}"#, 1, SyntaxError::UnexpectedByte(b'"'), 7)]
#[case(r#"{"a":1,}"#, 1, SyntaxError::ExpectedKey, 7)]
#[case(r#"{"a" 1}"#, 0, SyntaxError::ExpectedColon, 5)]
#[case(r#"{"a":1,"b":"#, 1, SyntaxError::UnexpectedEndOfInput, 11)]
#[case(r#"{"a":1}x"#, 1, SyntaxError::TrailingCharacters, 7)]
#[case("{\"a\":\"x\ny\"}", 0, SyntaxError::ControlCharacterInString(b'\n'), 7)]
#[case(r#"{"a":}"#, 0, SyntaxError::UnexpectedByte(b'}'), 5)]
fn malformed_structure(
    #[case] text: &str,
    #[case] good: usize,
    #[case] kind: SyntaxError,
    #[case] offset: usize,
) {
    let (keys, err) = scan_all(text, 4);
    assert_eq!(keys.len(), good);
    assert_eq!(err, Some(ParseError::new(offset, kind)));
}

#[test]
fn parse_errors_are_sticky() {
    let text = r#"{"a":1,"b":[}"#;
    let mut src = MemorySource::new(text.as_bytes().to_vec());
    let mut scanner = Scanner::new(16, 16);
    assert_eq!(scanner.scan_next_key(&mut src).unwrap().unwrap().key, "a");
    let before = scanner.cursor();

    let first = scanner.scan_next_key(&mut src).unwrap_err();
    let second = scanner.scan_next_key(&mut src).unwrap_err();
    assert_eq!(first.to_string(), second.to_string());
    assert_eq!(scanner.cursor(), before);
    assert!(scanner.failure().is_some());
    assert!(!scanner.is_finished());
}

#[test]
fn depth_limit_applies_to_skipping() {
    let mut src = MemorySource::new(br#"{"deep":[[[[1]]]]}"#.to_vec());
    let mut scanner = Scanner::new(16, 3);
    let err = scanner.scan_next_key(&mut src).unwrap_err();
    assert!(matches!(
        err,
        Error::Parse(ParseError {
            kind: SyntaxError::NestingTooDeep(3),
            offset: 11
        })
    ));
}

#[rstest]
#[case("  \n\t", false)]
#[case("  {}", true)]
#[case("7", true)]
fn has_content_skips_leading_whitespace(#[case] text: &str, #[case] expected: bool) {
    let mut src = MemorySource::new(text.as_bytes().to_vec());
    let mut scanner = Scanner::new(2, 16);
    assert_eq!(scanner.has_content(&mut src).unwrap(), expected);
    assert_eq!(scanner.cursor().state, ScanState::Start);
}

#[test]
fn decode_range_materializes_value() {
    let text = r#"{"a":1,"b":"two","c":[1,2,3]}"#;
    let mut src = MemorySource::new(text.as_bytes().to_vec());
    let mut scanner = Scanner::new(8, 16);
    let mut found = Vec::new();
    while let Some(k) = scanner.scan_next_key(&mut src).unwrap() {
        found.push(k);
    }
    assert!(scanner.is_finished());
    assert_eq!(scanner.cursor().offset, text.len());

    let texts: Vec<String> = found
        .iter()
        .map(|k| scanner.decode_range(&mut src, k.range.clone()).unwrap().to_string())
        .collect();
    assert_eq!(texts, ["1", r#""two""#, "[1,2,3]"]);
}
