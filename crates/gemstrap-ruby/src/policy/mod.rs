//! Compatibility policy for the auxiliary package tools
//!
//! Policies are ordered rule tables. Each table is evaluated top to bottom
//! and the first matching row wins; later tables refine the result of
//! earlier ones.

pub mod bundler;
pub mod rubygems;

pub use bundler::{BundlerDecision, RuntimeFacts, resolve_bundler};
pub use rubygems::{RubygemsPlan, coerce_version, plan_rubygems};

/// One row of a decision table
pub struct Rule<C, T> {
    /// Logged when the row fires
    pub reason: &'static str,
    pub when: fn(&C) -> bool,
    pub then: T,
}

/// Returns the first row whose predicate holds, without backtracking.
pub fn first_match<'r, C, T>(rules: &'r [Rule<C, T>], ctx: &C) -> Option<&'r Rule<C, T>> {
    rules.iter().find(|rule| (rule.when)(ctx))
}

/// Like [`first_match`], logging the reason of the matching row.
pub fn apply<'r, C, T>(rules: &'r [Rule<C, T>], ctx: &C) -> Option<&'r T> {
    let rule = first_match(rules, ctx)?;
    tracing::info!("{}", rule.reason);
    Some(&rule.then)
}

#[cfg(test)]
mod tests {
    use super::*;

    static SIGN: &[Rule<i32, &str>] = &[
        Rule {
            reason: "negative",
            when: |n| *n < 0,
            then: "-",
        },
        Rule {
            reason: "small",
            when: |n| *n < 10,
            then: "small",
        },
        Rule {
            reason: "any",
            when: |_| true,
            then: "large",
        },
    ];

    #[test]
    fn test_first_match_wins() {
        assert_eq!(apply(SIGN, &-5), Some(&"-"));
        assert_eq!(apply(SIGN, &5), Some(&"small"));
        assert_eq!(first_match(SIGN, &50).map(|r| r.reason), Some("any"));
    }

    #[test]
    fn test_no_match() {
        assert!(first_match(&SIGN[..1], &3).is_none());
    }
}
