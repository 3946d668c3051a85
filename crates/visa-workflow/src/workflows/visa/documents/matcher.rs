/// Strips every whitespace character and uppercases the rest, so OCR output
/// such as `"a1 234 567"` compares equal to `"A1234567"`.
pub fn normalize_passport_number(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// True when the normalized expected number appears contiguously in the
/// normalized extracted text. An expected value that normalizes to nothing
/// never matches; callers treat it as "no expected number".
pub fn passport_number_matches(extracted: &str, expected: &str) -> bool {
    let expected = normalize_passport_number(expected);
    if expected.is_empty() {
        return false;
    }

    normalize_passport_number(extracted).contains(&expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_ignores_case_and_whitespace() {
        assert!(passport_number_matches("A1 234567", "a1234567"));
        assert!(passport_number_matches(
            "PASSPORT NO.\n x 12\t34 56 7 \nSURNAME",
            "X1234567"
        ));
    }

    #[test]
    fn match_requires_contiguous_substring() {
        assert!(!passport_number_matches("A12 DOE 34567", "A1234567"));
        assert!(!passport_number_matches("", "A1234567"));
    }

    #[test]
    fn blank_expected_value_never_matches() {
        assert!(!passport_number_matches("A1234567", "  \t"));
    }
}
