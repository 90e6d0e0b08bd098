//! Rule-based fading classifier over a short trailing rssi window.
//!
//! Rules are evaluated as a priority cascade, first match wins:
//!
//! 1. fast fading: the latest step is at least `fast_threshold_db`
//! 2. slow fading: the window never rises and drops at least `slow_threshold_db`
//! 3. multipath fading: at least `oscillation_count` steps of
//!    `oscillation_threshold_db` or more, in either direction
//! 4. moderate variation: the latest step is at least `moderate_threshold_db`

use fadewatch_types::fading::{FadingCategory, FadingThresholds};
use serde::{Deserialize, Serialize};

/// Number of rssi values (current included) the rules look at.
pub const WINDOW_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub category: Option<FadingCategory>,
    /// Current minus previous rssi.
    pub delta: f64,
}

/// Classify the newest value of `window` (oldest first, current last).
///
/// Only the last [`WINDOW_LEN`] values are considered. With fewer values the
/// result carries the delta but never a category.
pub fn classify(window: &[f64], thresholds: &FadingThresholds) -> Classification {
    let delta = match window {
        [.., previous, current] => current - previous,
        _ => 0.0,
    };

    if window.len() < WINDOW_LEN {
        return Classification {
            category: None,
            delta,
        };
    }

    let recent = &window[window.len() - WINDOW_LEN..];
    let category = if delta.abs() >= thresholds.fast_threshold_db {
        Some(FadingCategory::FastFading)
    } else if is_slow_fade(recent, thresholds.slow_threshold_db) {
        Some(FadingCategory::SlowFading)
    } else if oscillation_count(recent, thresholds.oscillation_threshold_db)
        >= thresholds.oscillation_count
    {
        Some(FadingCategory::MultipathFading)
    } else if delta.abs() >= thresholds.moderate_threshold_db {
        Some(FadingCategory::ModerateVariation)
    } else {
        None
    };

    Classification { category, delta }
}

fn is_slow_fade(window: &[f64], slow_threshold_db: f64) -> bool {
    let non_increasing = window.windows(2).all(|pair| pair[0] >= pair[1]);
    match (window.first(), window.last()) {
        (Some(first), Some(last)) => non_increasing && first - last >= slow_threshold_db,
        _ => false,
    }
}

fn oscillation_count(window: &[f64], oscillation_threshold_db: f64) -> usize {
    window
        .windows(2)
        .filter(|pair| (pair[1] - pair[0]).abs() >= oscillation_threshold_db)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> FadingThresholds {
        FadingThresholds::default()
    }

    #[test]
    fn short_windows_never_classify() {
        let windows: [&[f64]; 5] = [
            &[],
            &[-50.0],
            &[-50.0, -90.0],
            &[-50.0, -40.0, -60.0],
            &[-50.0, -52.0, -54.0, -90.0],
        ];
        for window in windows {
            let result = classify(window, &defaults());
            assert_eq!(result.category, None, "window {window:?}");
        }
    }

    #[test]
    fn cold_start_still_reports_delta() {
        let result = classify(&[-50.0, -61.0], &defaults());
        assert_eq!(result.category, None);
        assert_eq!(result.delta, -11.0);
        assert_eq!(classify(&[-50.0], &defaults()).delta, 0.0);
    }

    #[test]
    fn alternating_small_swings_are_unlabeled() {
        let result = classify(&[-50.0, -55.0, -51.0, -56.0, -52.0], &defaults());
        assert_eq!(result.category, None);
        assert_eq!(result.delta, 4.0);
    }

    #[test]
    fn steady_decline_is_slow_fading() {
        let result = classify(&[-50.0, -52.0, -54.0, -56.0, -58.0], &defaults());
        assert_eq!(result.category, Some(FadingCategory::SlowFading));
        assert_eq!(result.delta, -2.0);
    }

    #[test]
    fn flat_steps_still_count_as_non_increasing() {
        let result = classify(&[-50.0, -50.0, -54.0, -58.0, -58.0], &defaults());
        assert_eq!(result.category, Some(FadingCategory::SlowFading));
    }

    #[test]
    fn single_upward_tick_disqualifies_slow_fading() {
        let result = classify(&[-50.0, -53.0, -52.0, -56.0, -59.0], &defaults());
        assert_ne!(result.category, Some(FadingCategory::SlowFading));
    }

    #[test]
    fn large_drop_is_fast_fading() {
        let result = classify(&[-50.0, -49.0, -51.0, -50.0, -61.0], &defaults());
        assert_eq!(result.category, Some(FadingCategory::FastFading));
        assert_eq!(result.delta, -11.0);
    }

    #[test]
    fn large_rise_is_fast_fading() {
        let result = classify(&[-70.0, -70.0, -70.0, -70.0, -58.0], &defaults());
        assert_eq!(result.category, Some(FadingCategory::FastFading));
    }

    #[test]
    fn fast_fading_shadows_slow_fading() {
        let window = [-40.0, -42.0, -44.0, -46.0, -58.0];
        assert!(is_slow_fade(&window, defaults().slow_threshold_db));
        let result = classify(&window, &defaults());
        assert_eq!(result.category, Some(FadingCategory::FastFading));
    }

    #[test]
    fn repeated_large_swings_are_multipath() {
        let result = classify(&[-50.0, -56.0, -50.0, -56.0, -52.0], &defaults());
        assert_eq!(result.category, Some(FadingCategory::MultipathFading));
    }

    #[test]
    fn moderate_step_without_pattern() {
        let result = classify(&[-50.0, -51.0, -50.0, -51.0, -58.0], &defaults());
        assert_eq!(result.category, Some(FadingCategory::ModerateVariation));
    }

    #[test]
    fn thresholds_are_inclusive() {
        let fast = classify(&[-50.0, -50.0, -50.0, -50.0, -60.0], &defaults());
        assert_eq!(fast.category, Some(FadingCategory::FastFading));
        assert_eq!(fast.delta, -10.0);

        let multipath = classify(&[-50.0, -55.0, -50.0, -55.0, -55.0], &defaults());
        assert_eq!(multipath.category, Some(FadingCategory::MultipathFading));

        let moderate = classify(&[-50.0, -51.0, -50.0, -51.0, -57.0], &defaults());
        assert_eq!(moderate.category, Some(FadingCategory::ModerateVariation));
        assert_eq!(moderate.delta, -6.0);
    }

    #[test]
    fn just_below_thresholds_stays_unlabeled() {
        let two_swings = classify(&[-50.0, -55.0, -50.0, -50.0, -50.0], &defaults());
        assert_eq!(two_swings.category, None);

        let shallow_decline = classify(&[-50.0, -51.0, -52.0, -53.0, -54.0], &defaults());
        assert_eq!(shallow_decline.category, None);

        let small_step = classify(&[-50.0, -51.0, -50.0, -51.0, -56.5], &defaults());
        assert_eq!(small_step.category, None);
    }

    #[test]
    fn only_last_five_values_matter() {
        let mut window = vec![-20.0, -90.0, -20.0, -90.0];
        window.extend_from_slice(&[-50.0, -55.0, -51.0, -56.0, -52.0]);
        assert_eq!(classify(&window, &defaults()).category, None);
    }

    #[test]
    fn shadowed_moderate_threshold_never_fires() {
        let thresholds = FadingThresholds {
            moderate_threshold_db: 12.0,
            ..defaults()
        };
        let result = classify(&[-50.0, -51.0, -50.0, -51.0, -62.0], &thresholds);
        assert_eq!(result.category, Some(FadingCategory::FastFading));
        let result = classify(&[-50.0, -51.0, -50.0, -51.0, -58.0], &thresholds);
        assert_eq!(result.category, None);
    }

    #[test]
    fn classification_is_deterministic() {
        let window = [-50.0, -56.0, -50.0, -56.0, -52.0];
        assert_eq!(classify(&window, &defaults()), classify(&window, &defaults()));
    }
}
