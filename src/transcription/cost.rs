//! Cost estimation for metered transcription.
//!
//! The transcription service bills per second of audio at a per-minute rate
//! that depends on the model. The same function produces the pre-charge
//! estimate (used to filter eligible credentials) and the final charge when
//! the provider reports the actually billed duration.

use super::model::Model;

/// Estimates the charge in dollars for transcribing `duration_seconds` of
/// audio with the given model.
///
/// Pure and deterministic; callers recompute with the provider-billed
/// duration when the response carries one.
pub fn estimate(duration_seconds: f64, model: Model) -> f64 {
    duration_seconds / 60.0 * model.rate_per_minute()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_scales_with_duration() {
        let one_minute = estimate(60.0, Model::Fast);
        assert!((one_minute - Model::Fast.rate_per_minute()).abs() < 1e-12);
        let two_minutes = estimate(120.0, Model::Fast);
        assert!((two_minutes - 2.0 * one_minute).abs() < 1e-12);
    }

    #[test]
    fn test_estimate_zero_duration_is_free() {
        assert_eq!(estimate(0.0, Model::Accurate), 0.0);
    }

    #[test]
    fn test_accurate_model_costs_more() {
        assert!(estimate(62.5, Model::Accurate) > estimate(62.5, Model::Fast));
    }
}
