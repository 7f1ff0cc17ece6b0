//! Timed, optionally grouped, stages

use std::time::Instant;

/// Runs `f` as a named stage and logs how long it took.
///
/// With `grouped`, the stage output is folded into a GitHub Actions log
/// group.
pub fn measure<T>(name: &str, grouped: bool, f: impl FnOnce() -> T) -> T {
    if grouped {
        println!("::group::{}", name);
    } else {
        tracing::info!("{}", name);
    }

    let start = Instant::now();
    let result = f();
    tracing::info!("Took {:6.2} seconds", start.elapsed().as_secs_f64());

    if grouped {
        println!("::endgroup::");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_returns_result() {
        let value = measure("Computing", false, || 42);
        assert_eq!(value, 42);

        let result: Result<(), &str> = measure("Failing", true, || Err("boom"));
        assert_eq!(result, Err("boom"));
    }
}
