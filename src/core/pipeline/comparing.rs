use crate::core::domain::{OutputMethod, TestConfig};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VerdictStatus {
    Success,
    Failed,
    Skipped,
    Error,
}

/// One comparison verdict for one submission. The comparer never decides
/// when to run; it only computes this.
#[derive(Clone, Debug)]
pub struct Verdict {
    pub status: VerdictStatus,
    pub message: Option<String>,
}

impl Verdict {
    fn success() -> Self {
        Self {
            status: VerdictStatus::Success,
            message: None,
        }
    }

    fn failed(message: String) -> Self {
        Self {
            status: VerdictStatus::Failed,
            message: Some(message),
        }
    }

    fn skipped(message: String) -> Self {
        Self {
            status: VerdictStatus::Skipped,
            message: Some(message),
        }
    }

    fn error(message: &str) -> Self {
        Self {
            status: VerdictStatus::Error,
            message: Some(message.to_string()),
        }
    }
}

/// Trims surrounding whitespace and canonicalizes line endings so platform
/// differences never cause spurious mismatches.
pub fn normalize_output(raw: &str) -> String {
    raw.trim().replace("\r\n", "\n").replace('\r', "\n")
}

/// Compares a submission's captured output against the expected output.
///
/// `File` expectations were resolved to file contents when the test
/// configuration was saved, so every built-in method reduces to literal
/// equality of the normalized strings.
// TODO: run `Script` expectations as an actual comparison command and use
// its exit code; until those semantics are settled it falls back to
// literal comparison like the other methods.
pub fn compare_output(actual: Option<&str>, test: &TestConfig) -> Verdict {
    let Some(actual) = actual else {
        return Verdict::error("no captured output to compare");
    };
    let Some(expected) = test.expected_output.as_deref() else {
        return Verdict::error("no expected output configured");
    };

    match &test.output_method {
        OutputMethod::Manual | OutputMethod::File | OutputMethod::Script => {
            let actual = normalize_output(actual);
            let expected = normalize_output(expected);
            if actual == expected {
                Verdict::success()
            } else {
                Verdict::failed(format!("expected {expected:?}, got {actual:?}"))
            }
        }
        OutputMethod::Other(method) => {
            Verdict::skipped(format!("unsupported output method: {method}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::InputMethod;

    fn test_config(method: OutputMethod, expected: Option<&str>) -> TestConfig {
        TestConfig {
            input_method: InputMethod::Manual,
            input: String::new(),
            output_method: method,
            expected_output: expected.map(|e| e.to_string()),
        }
    }

    #[test]
    fn crlf_and_lf_compare_equal() {
        let test = test_config(OutputMethod::Manual, Some("line one\nline two"));
        let verdict = compare_output(Some("line one\r\nline two\r\n"), &test);
        assert_eq!(verdict.status, VerdictStatus::Success);
        assert!(verdict.message.is_none());
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let test = test_config(OutputMethod::Manual, Some("  42  "));
        let verdict = compare_output(Some("\n42\n"), &test);
        assert_eq!(verdict.status, VerdictStatus::Success);
    }

    #[test]
    fn mismatch_is_a_failure_with_both_sides_in_the_message() {
        let test = test_config(OutputMethod::Manual, Some("hello"));
        let verdict = compare_output(Some("hola"), &test);
        assert_eq!(verdict.status, VerdictStatus::Failed);
        let message = verdict.message.unwrap();
        assert!(message.contains("hello") && message.contains("hola"));
    }

    #[test]
    fn file_expectations_compare_as_resolved_contents() {
        let test = test_config(OutputMethod::File, Some("expected file body\n"));
        let verdict = compare_output(Some("expected file body"), &test);
        assert_eq!(verdict.status, VerdictStatus::Success);
    }

    #[test]
    fn script_expectations_fall_back_to_literal_comparison() {
        let test = test_config(OutputMethod::Script, Some("out"));
        assert_eq!(
            compare_output(Some("out"), &test).status,
            VerdictStatus::Success
        );
        assert_eq!(
            compare_output(Some("other"), &test).status,
            VerdictStatus::Failed
        );
    }

    #[test]
    fn missing_actual_output_is_an_error() {
        let test = test_config(OutputMethod::Manual, Some("hello"));
        let verdict = compare_output(None, &test);
        assert_eq!(verdict.status, VerdictStatus::Error);
        assert!(verdict.message.is_some());
    }

    #[test]
    fn missing_expected_output_is_an_error_for_every_method() {
        for method in [
            OutputMethod::Manual,
            OutputMethod::File,
            OutputMethod::Script,
            OutputMethod::Other("regex".to_string()),
        ] {
            let test = test_config(method, None);
            let verdict = compare_output(Some("anything"), &test);
            assert_eq!(verdict.status, VerdictStatus::Error);
        }
    }

    #[test]
    fn unknown_output_method_is_skipped() {
        let test = test_config(OutputMethod::Other("regex".to_string()), Some("x"));
        let verdict = compare_output(Some("x"), &test);
        assert_eq!(verdict.status, VerdictStatus::Skipped);
        assert!(verdict.message.unwrap().contains("regex"));
    }
}
