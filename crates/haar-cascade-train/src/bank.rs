//! Exhaustive two-rectangle feature enumeration.

use haar_cascade_core::{HaarFeature, Rect};

/// Every two-rectangle feature that fits in a `window × window` square.
///
/// Order is fixed and doubles as the tie-break order of the boosting search:
/// 1. horizontal pairs (white above black): width, then height with
///    `2h <= window`, then `x`, then `y`;
/// 2. vertical pairs (white left of black): width with `2w <= window`, then
///    height, then `x`, then `y`.
pub fn build_feature_bank(window: usize) -> Vec<HaarFeature> {
    let mut bank = Vec::with_capacity(feature_bank_size(window));

    for w in 1..=window {
        for h in (1..=window).take_while(|h| 2 * h <= window) {
            for x in 0..=window - w {
                for y in 0..=window - 2 * h {
                    bank.push(HaarFeature::new(
                        Rect { x, y, width: w, height: h },
                        Rect { x, y: y + h, width: w, height: h },
                    ));
                }
            }
        }
    }

    for w in (1..=window).take_while(|w| 2 * w <= window) {
        for h in 1..=window {
            for x in 0..=window - 2 * w {
                for y in 0..=window - h {
                    bank.push(HaarFeature::new(
                        Rect { x, y, width: w, height: h },
                        Rect { x: x + w, y, width: w, height: h },
                    ));
                }
            }
        }
    }

    bank
}

/// Closed-form length of [`build_feature_bank`]; grows as `O(window^4)`.
pub fn feature_bank_size(window: usize) -> usize {
    let placements_1d = window * (window + 1) / 2;
    let half = window / 2;
    let placements_pair = half * (window - half);
    2 * placements_1d * placements_pair
}

#[cfg(test)]
mod tests {
    use super::*;
    use haar_cascade_core::FeatureKind;
    use std::collections::HashSet;

    #[test]
    fn size_matches_enumeration() {
        for n in 0..=12 {
            assert_eq!(build_feature_bank(n).len(), feature_bank_size(n), "window {n}");
        }
        assert_eq!(feature_bank_size(4), 80);
        assert_eq!(feature_bank_size(24), 86_400);
    }

    #[test]
    fn order_starts_with_smallest_horizontal_pair() {
        let bank = build_feature_bank(4);
        assert_eq!(
            bank[0],
            HaarFeature::new(
                Rect::new(0, 0, 1, 1).expect("rect"),
                Rect::new(0, 1, 1, 1).expect("rect"),
            )
        );
        // y varies fastest
        assert_eq!(bank[1].white, Rect::new(0, 1, 1, 1).expect("rect"));
        assert_eq!(bank[40].kind(), FeatureKind::VerticalPair);
        assert!(bank[..40]
            .iter()
            .all(|f| f.kind() == FeatureKind::HorizontalPair));
    }

    #[test]
    fn every_feature_fits_and_is_unique() {
        let n = 7;
        let bank = build_feature_bank(n);
        let unique: HashSet<_> = bank.iter().collect();
        assert_eq!(unique.len(), bank.len());
        for f in &bank {
            let (w, h) = f.extent();
            assert!(w <= n && h <= n, "{f:?} does not fit");
            assert_eq!(f.white.area(), f.black.area());
        }
    }

    #[test]
    fn canonical_half_split_is_present() {
        let bank = build_feature_bank(4);
        let canonical = HaarFeature::new(
            Rect::new(0, 0, 4, 2).expect("rect"),
            Rect::new(0, 2, 4, 2).expect("rect"),
        );
        assert!(bank.contains(&canonical));
    }
}
