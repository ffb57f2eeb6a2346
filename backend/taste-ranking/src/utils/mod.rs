// Numeric helpers shared by the learner and the scorer

use std::collections::BTreeMap;

/// Half-life decay: 1.0 at age 0, 0.5 after one half-life
pub fn half_life_decay(age: f64, half_life: f64) -> f64 {
    if age <= 0.0 {
        return 1.0;
    }
    (-age / half_life).exp2()
}

/// Clamp into the [-1, 1] range every stored value must respect
pub fn clamp_unit(value: f64) -> f64 {
    value.clamp(-1.0, 1.0)
}

/// Cosine similarity of two sparse vectors
///
/// Missing keys count as zero. A zero vector on either side yields 0.0.
pub fn cosine_similarity<K: Ord>(a: &BTreeMap<K, f64>, b: &BTreeMap<K, f64>) -> f64 {
    let mut dot = 0.0;
    let mut norm_a = 0.0;
    for (key, value) in a {
        norm_a += value * value;
        if let Some(other) = b.get(key) {
            dot += value * other;
        }
    }
    let norm_b: f64 = b.values().map(|v| v * v).sum();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_life_decay() {
        assert!((half_life_decay(0.0, 90.0) - 1.0).abs() < 1e-12);
        assert!((half_life_decay(90.0, 90.0) - 0.5).abs() < 1e-12);
        assert!((half_life_decay(180.0, 90.0) - 0.25).abs() < 1e-12);
        // future timestamps are not boosted
        assert_eq!(half_life_decay(-3.0, 90.0), 1.0);
    }

    #[test]
    fn test_cosine_zero_vector_is_zero() {
        let empty: BTreeMap<u8, f64> = BTreeMap::new();
        let full: BTreeMap<u8, f64> = [(1, 1.0)].into_iter().collect();
        assert_eq!(cosine_similarity(&empty, &full), 0.0);
        assert_eq!(cosine_similarity(&full, &empty), 0.0);

        let zeros: BTreeMap<u8, f64> = [(1, 0.0)].into_iter().collect();
        assert_eq!(cosine_similarity(&zeros, &full), 0.0);
    }

    #[test]
    fn test_cosine_sign_and_scale() {
        let a: BTreeMap<u8, f64> = [(1, 1.0), (2, 0.0)].into_iter().collect();
        let b: BTreeMap<u8, f64> = [(1, -3.0)].into_iter().collect();
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-12);

        let c: BTreeMap<u8, f64> = [(1, 1.0), (2, 1.0)].into_iter().collect();
        let d: BTreeMap<u8, f64> = [(1, 2.0)].into_iter().collect();
        assert!((cosine_similarity(&c, &d) - 1.0 / 2f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_clamp_unit() {
        assert_eq!(clamp_unit(1.7), 1.0);
        assert_eq!(clamp_unit(-2.5), -1.0);
        assert_eq!(clamp_unit(0.3), 0.3);
    }
}
