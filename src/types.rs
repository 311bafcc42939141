use std::str::FromStr;
use serde::Deserialize;

/// What the executor does with the rest of the plan after a non-tolerant
/// target fails.
///
/// - `FailFast`: no new non-tolerant target starts; everything still pending
///   is recorded as skipped (default).
/// - `Continue`: only targets that depend on the failure are skipped;
///   independent targets keep running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    FailFast,
    Continue,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        FailurePolicy::FailFast
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "fail_fast" => Ok(FailurePolicy::FailFast),
            "continue" => Ok(FailurePolicy::Continue),
            other => Err(format!(
                "invalid failure_policy: {other} (expected \"fail_fast\" or \"continue\")"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_policy_names_loosely() {
        assert_eq!("fail-fast".parse(), Ok(FailurePolicy::FailFast));
        assert_eq!(" Continue ".parse(), Ok(FailurePolicy::Continue));
        assert!("later".parse::<FailurePolicy>().is_err());
    }
}
