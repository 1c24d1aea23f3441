//! Bootstrap sampling of training rows.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Rows seen and not seen by one tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Sample {
    /// Drawn rows, with repetition, in draw order.
    pub(crate) in_bag: Vec<usize>,
    /// Rows never drawn, in ascending order.
    pub(crate) out_of_bag: Vec<usize>,
}

/// Number of draws for `n_rows` rows at `ratio`: `round(n_rows * ratio)`.
pub(crate) fn draw_count(n_rows: usize, ratio: f64) -> usize {
    (n_rows as f64 * ratio).round() as usize
}

/// RNG of tree `tree_index`; depends only on `(seed, tree_index)`.
pub(crate) fn tree_rng(seed: u64, tree_index: usize) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(tree_index as u64);
    rng
}

/// Draw `draw_count` rows uniformly with replacement from `rows`.
pub(crate) fn bootstrap_sample(rows: &[usize], draw_count: usize, rng: &mut impl Rng) -> Sample {
    let mut drawn = vec![false; rows.len()];
    let mut in_bag = Vec::with_capacity(draw_count);
    for _ in 0..draw_count {
        let pos = rng.gen_range(0..rows.len());
        in_bag.push(rows[pos]);
        drawn[pos] = true;
    }
    let out_of_bag = rows
        .iter()
        .zip(&drawn)
        .filter(|&(_, &d)| !d)
        .map(|(&row, _)| row)
        .collect();
    Sample { in_bag, out_of_bag }
}

/// Every row exactly once, no out-of-bag rows.
pub(crate) fn full_sample(rows: &[usize]) -> Sample {
    Sample {
        in_bag: rows.to_vec(),
        out_of_bag: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_count_rounds() {
        assert_eq!(draw_count(10, 1.0), 10);
        assert_eq!(draw_count(10, 0.25), 3);
        assert_eq!(draw_count(10, 0.24), 2);
        assert_eq!(draw_count(3, 0.1), 0);
        assert_eq!(draw_count(4, 2.0), 8);
    }

    #[test]
    fn sample_size_matches_draw_count() {
        let rows: Vec<usize> = (0..100).collect();
        let mut rng = tree_rng(42, 0);
        let sample = bootstrap_sample(&rows, 63, &mut rng);
        assert_eq!(sample.in_bag.len(), 63);
        assert!(sample.in_bag.iter().all(|r| *r < 100));
    }

    #[test]
    fn oob_rows_are_never_drawn() {
        let rows: Vec<usize> = (0..50).map(|i| i * 2).collect();
        let mut rng = tree_rng(1, 3);
        let sample = bootstrap_sample(&rows, 50, &mut rng);
        for row in &sample.out_of_bag {
            assert!(!sample.in_bag.contains(row));
            assert!(rows.contains(row));
        }
        let mut seen: Vec<usize> = sample.in_bag.clone();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len() + sample.out_of_bag.len(), rows.len());
    }

    #[test]
    fn stream_depends_on_seed_and_index_only() {
        let rows: Vec<usize> = (0..30).collect();
        let a = bootstrap_sample(&rows, 30, &mut tree_rng(9, 4));
        let b = bootstrap_sample(&rows, 30, &mut tree_rng(9, 4));
        let c = bootstrap_sample(&rows, 30, &mut tree_rng(9, 5));
        assert_eq!(a, b);
        assert_ne!(a.in_bag, c.in_bag);
    }

    #[test]
    fn full_sample_has_no_oob() {
        let sample = full_sample(&[0, 2, 5]);
        assert_eq!(sample.in_bag, vec![0, 2, 5]);
        assert!(sample.out_of_bag.is_empty());
    }
}
