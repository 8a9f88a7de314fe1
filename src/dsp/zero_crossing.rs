//! Zero-crossing search.

/// Find the zero crossing closest to `start_index`.
///
/// A crossing sits between `i - 1` and `i` when `x[i] * x[i - 1] <= 0`; the
/// returned index is whichever of the two has the smaller magnitude. The scan
/// goes right first, then left from `start_index - 1` no further than the
/// distance already found on the right. A closer crossing on the left wins.
///
/// Returns `None` when `start_index` is past the end or no crossing exists.
pub fn nearest_zero_crossing(samples: &[f32], start_index: usize) -> Option<usize> {
    if start_index >= samples.len() {
        return None;
    }

    let quieter = |i: usize| {
        if samples[i].abs() < samples[i - 1].abs() {
            i
        } else {
            i - 1
        }
    };

    let start = start_index.max(1);
    let mut found = None;
    let mut distance = None;

    for i in start..samples.len() {
        if samples[i] * samples[i - 1] <= 0.0 {
            found = Some(quieter(i));
            distance = Some(i - start_index);
            break;
        }
    }

    for i in (1..start).rev() {
        if let Some(d) = distance {
            if start_index - i >= d {
                break;
            }
        }
        if samples[i] * samples[i - 1] <= 0.0 {
            found = Some(quieter(i));
            break;
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0 ; "from the start")]
    #[test_case(3 ; "from the middle")]
    #[test_case(6 ; "just before")]
    fn test_single_crossing_found_from_the_left(start: usize) {
        // Sign change between 6 and 7; sample 7 is quieter
        let samples = [0.9, 0.8, 0.7, 0.6, 0.5, 0.4, 0.3, -0.1, -0.5, -0.9];
        assert_eq!(nearest_zero_crossing(&samples, start), Some(7));
    }

    #[test]
    fn test_picks_quieter_side() {
        let samples = [0.9, 0.8, 0.05, -0.6, -0.9];
        assert_eq!(nearest_zero_crossing(&samples, 0), Some(2));
    }

    #[test]
    fn test_left_crossing_can_win() {
        // Crossing at 1/2 is 2 samples left of the start, the right one is 4 away
        let samples = [0.5, 0.4, -0.2, -0.3, -0.4, -0.5, -0.6, -0.7, 0.1, 0.5];
        assert_eq!(nearest_zero_crossing(&samples, 4), Some(2));
    }

    #[test]
    fn test_left_scan_limited_by_right_distance() {
        let samples = [0.5, -0.5, -0.4, -0.3, -0.3, -0.2, 0.2, 0.3];
        // Right crossing at distance 1 from index 5; left one is 4 away
        assert_eq!(nearest_zero_crossing(&samples, 5), Some(5));
    }

    #[test]
    fn test_no_crossing() {
        assert_eq!(nearest_zero_crossing(&[0.5, 0.6, 0.7], 0), None);
        assert_eq!(nearest_zero_crossing(&[0.5, -0.5], 2), None);
        assert_eq!(nearest_zero_crossing(&[], 0), None);
    }

    #[test]
    fn test_exact_zero_counts_as_crossing() {
        let samples = [0.4, 0.3, 0.0, 0.3];
        assert_eq!(nearest_zero_crossing(&samples, 0), Some(2));
    }
}
