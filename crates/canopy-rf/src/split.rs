//! Label statistics and best-split search.

use std::collections::BTreeMap;

use canopy_io::{ColumnData, Dataset, OOV_CODE};
use rand::Rng;

use crate::node::{CategorySet, ColumnIndex, Impurity, LeafValue, SplitCondition, Test};

/// Splits must remove more than this fraction of the parent's weighted impurity.
pub(crate) const MIN_RELATIVE_GAIN: f64 = 1e-12;

/// Label column viewed as the training target.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Target<'a> {
    /// Categorical label codes; `n_classes` counts the reserved code 0.
    Classification { codes: &'a [u32], n_classes: usize },
    /// Numerical label values.
    Regression { values: &'a [f64] },
}

impl Target<'_> {
    /// Return `true` when the label of `row` is present.
    pub(crate) fn is_labelled(&self, row: usize) -> bool {
        match self {
            Target::Classification { codes, .. } => codes[row] != OOV_CODE,
            Target::Regression { values } => !values[row].is_nan(),
        }
    }

    /// Return `true` when every row in `rows` carries the same label.
    pub(crate) fn is_pure(&self, rows: &[usize]) -> bool {
        let Some(&first) = rows.first() else {
            return true;
        };
        match self {
            Target::Classification { codes, .. } => rows.iter().all(|&r| codes[r] == codes[first]),
            Target::Regression { values } => rows.iter().all(|&r| values[r] == values[first]),
        }
    }
}

/// Sufficient statistics of the labels of a set of rows.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LabelStats {
    /// Per-class counts (classification).
    Counts { counts: Vec<usize>, n: usize },
    /// Count, sum and sum of squares (regression).
    Moments { n: usize, sum: f64, sum_sq: f64 },
}

impl LabelStats {
    pub(crate) fn empty(target: Target<'_>) -> Self {
        match target {
            Target::Classification { n_classes, .. } => LabelStats::Counts {
                counts: vec![0; n_classes],
                n: 0,
            },
            Target::Regression { .. } => LabelStats::Moments {
                n: 0,
                sum: 0.0,
                sum_sq: 0.0,
            },
        }
    }

    pub(crate) fn from_rows(target: Target<'_>, rows: impl IntoIterator<Item = usize>) -> Self {
        let mut stats = Self::empty(target);
        for row in rows {
            stats.add(target, row);
        }
        stats
    }

    pub(crate) fn add(&mut self, target: Target<'_>, row: usize) {
        match (self, target) {
            (LabelStats::Counts { counts, n }, Target::Classification { codes, .. }) => {
                counts[codes[row] as usize] += 1;
                *n += 1;
            }
            (LabelStats::Moments { n, sum, sum_sq }, Target::Regression { values }) => {
                let y = values[row];
                *n += 1;
                *sum += y;
                *sum_sq += y * y;
            }
            _ => {}
        }
    }

    pub(crate) fn remove(&mut self, target: Target<'_>, row: usize) {
        match (self, target) {
            (LabelStats::Counts { counts, n }, Target::Classification { codes, .. }) => {
                counts[codes[row] as usize] -= 1;
                *n -= 1;
            }
            (LabelStats::Moments { n, sum, sum_sq }, Target::Regression { values }) => {
                let y = values[row];
                *n -= 1;
                *sum -= y;
                *sum_sq -= y * y;
            }
            _ => {}
        }
    }

    pub(crate) fn merge(&mut self, other: &Self) {
        match (self, other) {
            (LabelStats::Counts { counts, n }, LabelStats::Counts { counts: o, n: on }) => {
                for (c, oc) in counts.iter_mut().zip(o) {
                    *c += oc;
                }
                *n += on;
            }
            (
                LabelStats::Moments { n, sum, sum_sq },
                LabelStats::Moments {
                    n: on,
                    sum: os,
                    sum_sq: osq,
                },
            ) => {
                *n += on;
                *sum += os;
                *sum_sq += osq;
            }
            _ => {}
        }
    }

    pub(crate) fn subtract(&mut self, other: &Self) {
        match (self, other) {
            (LabelStats::Counts { counts, n }, LabelStats::Counts { counts: o, n: on }) => {
                for (c, oc) in counts.iter_mut().zip(o) {
                    *c -= oc;
                }
                *n -= on;
            }
            (
                LabelStats::Moments { n, sum, sum_sq },
                LabelStats::Moments {
                    n: on,
                    sum: os,
                    sum_sq: osq,
                },
            ) => {
                *n -= on;
                *sum -= os;
                *sum_sq -= osq;
            }
            _ => {}
        }
    }

    pub(crate) fn count(&self) -> usize {
        match self {
            LabelStats::Counts { n, .. } | LabelStats::Moments { n, .. } => *n,
        }
    }

    /// `n · I`, where `I` is the Gini impurity or the variance.
    pub(crate) fn weighted_impurity(&self) -> f64 {
        self.weighted_impurity_with(None)
    }

    /// `n · I` of the union of `self` and `extra`.
    fn weighted_impurity_with(&self, extra: Option<&Self>) -> f64 {
        match (self, extra) {
            (
                LabelStats::Counts { counts, n },
                Some(LabelStats::Counts {
                    counts: extra,
                    n: en,
                }),
            ) => weighted_gini(counts.iter().zip(extra).map(|(a, b)| a + b), n + en),
            (LabelStats::Counts { counts, n }, _) => weighted_gini(counts.iter().copied(), *n),
            (
                LabelStats::Moments { n, sum, sum_sq },
                Some(LabelStats::Moments {
                    n: en,
                    sum: es,
                    sum_sq: esq,
                }),
            ) => weighted_variance(n + en, sum + es, sum_sq + esq),
            (LabelStats::Moments { n, sum, sum_sq }, _) => weighted_variance(*n, *sum, *sum_sq),
        }
    }

    pub(crate) fn impurity(&self) -> Impurity {
        let n = self.count();
        if n == 0 {
            return Impurity::new(0.0);
        }
        Impurity::new(self.weighted_impurity() / n as f64)
    }

    fn mean(&self) -> f64 {
        match self {
            LabelStats::Moments { n, sum, .. } if *n > 0 => sum / *n as f64,
            _ => 0.0,
        }
    }

    fn fraction(&self, class: usize) -> f64 {
        match self {
            LabelStats::Counts { counts, n } if *n > 0 => counts[class] as f64 / *n as f64,
            _ => 0.0,
        }
    }

    pub(crate) fn leaf_value(&self) -> LeafValue {
        match self {
            LabelStats::Counts { counts, .. } => LeafValue::Classification {
                counts: counts.clone(),
            },
            LabelStats::Moments { .. } => LeafValue::Regression { mean: self.mean() },
        }
    }
}

fn weighted_gini(counts: impl Iterator<Item = usize>, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let sum_sq: f64 = counts.map(|c| (c as f64) * (c as f64)).sum();
    n as f64 - sum_sq / n as f64
}

fn weighted_variance(n: usize, sum: f64, sum_sq: f64) -> f64 {
    if n == 0 {
        return 0.0;
    }
    (sum_sq - sum * sum / n as f64).max(0.0)
}

/// Threshold strictly between `lo` and `hi`, or `lo` when none is representable.
fn midpoint(lo: f64, hi: f64) -> f64 {
    let mid = lo / 2.0 + hi / 2.0;
    if mid >= lo && mid < hi { mid } else { lo }
}

/// Draw `k` distinct columns from `features` (partial Fisher-Yates), in draw order.
pub(crate) fn sample_columns(features: &[usize], k: usize, rng: &mut impl Rng) -> Vec<usize> {
    let mut order = features.to_vec();
    let take = k.min(order.len());
    for i in 0..take {
        let j = rng.gen_range(i..order.len());
        order.swap(i, j);
    }
    order.truncate(take);
    order
}

/// Best split found for a node.
#[derive(Debug, Clone)]
pub(crate) struct SplitCandidate {
    pub(crate) condition: SplitCondition,
    /// `n·I(parent) − n_l·I(left) − n_r·I(right)`.
    pub(crate) gain: f64,
}

/// Searches splits of a node's rows over candidate columns.
pub(crate) struct SplitSearch<'a> {
    dataset: &'a Dataset,
    target: Target<'a>,
    min_examples_per_leaf: usize,
}

impl<'a> SplitSearch<'a> {
    pub(crate) fn new(dataset: &'a Dataset, target: Target<'a>, min_examples_per_leaf: usize) -> Self {
        Self {
            dataset,
            target,
            min_examples_per_leaf,
        }
    }

    /// Find the split with the largest gain over `columns`.
    ///
    /// Earlier columns win ties. Returns `None` when no candidate satisfies
    /// `min_examples_per_leaf` or the best gain is at most
    /// [`MIN_RELATIVE_GAIN`] times the parent's weighted impurity. The cutoff
    /// scales with the label, so tiny label units still split.
    pub(crate) fn best_split(
        &self,
        rows: &[usize],
        parent: &LabelStats,
        columns: &[usize],
    ) -> Option<SplitCandidate> {
        let parent_weighted = parent.weighted_impurity();
        let mut best: Option<SplitCandidate> = None;
        for &column in columns {
            let found = match self.dataset.column(column) {
                ColumnData::Numerical(values) | ColumnData::Boolean(values) => {
                    self.numerical(column, values, rows, parent_weighted)
                }
                ColumnData::Categorical(codes) => {
                    self.categorical(column, codes, rows, parent_weighted)
                }
            };
            if let Some(candidate) = found {
                if best.as_ref().is_none_or(|b| candidate.gain > b.gain) {
                    best = Some(candidate);
                }
            }
        }
        best.filter(|b| b.gain > MIN_RELATIVE_GAIN * parent_weighted.max(f64::MIN_POSITIVE))
    }

    /// Score a partition of the non-missing rows. Missing rows join the side
    /// with more non-missing rows (left on ties).
    fn score(
        &self,
        left: &LabelStats,
        right: &LabelStats,
        missing: &LabelStats,
        parent_weighted: f64,
    ) -> Option<(f64, bool)> {
        let missing_left = left.count() >= right.count();
        let (n_left, n_right) = if missing_left {
            (left.count() + missing.count(), right.count())
        } else {
            (left.count(), right.count() + missing.count())
        };
        if n_left < self.min_examples_per_leaf || n_right < self.min_examples_per_leaf {
            return None;
        }
        let extra = (missing.count() > 0).then_some(missing);
        let (left_weighted, right_weighted) = if missing_left {
            (left.weighted_impurity_with(extra), right.weighted_impurity())
        } else {
            (left.weighted_impurity(), right.weighted_impurity_with(extra))
        };
        Some((parent_weighted - left_weighted - right_weighted, missing_left))
    }

    fn numerical(
        &self,
        column: usize,
        values: &[f64],
        rows: &[usize],
        parent_weighted: f64,
    ) -> Option<SplitCandidate> {
        let mut missing = LabelStats::empty(self.target);
        let mut present: Vec<(f64, usize)> = Vec::with_capacity(rows.len());
        for &row in rows {
            let x = values[row];
            if x.is_nan() {
                missing.add(self.target, row);
            } else {
                present.push((x, row));
            }
        }
        if present.len() < 2 {
            return None;
        }
        present.sort_unstable_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        // Incremental scan: left grows from empty, right shrinks from full.
        let mut left = LabelStats::empty(self.target);
        let mut right = LabelStats::from_rows(self.target, present.iter().map(|&(_, r)| r));
        let mut best: Option<(f64, f64, bool)> = None;
        for i in 0..present.len() - 1 {
            let (x, row) = present[i];
            left.add(self.target, row);
            right.remove(self.target, row);

            let next = present[i + 1].0;
            if x == next {
                continue;
            }
            let Some((gain, missing_left)) = self.score(&left, &right, &missing, parent_weighted)
            else {
                continue;
            };
            if best.is_none_or(|(g, _, _)| gain > g) {
                best = Some((gain, midpoint(x, next), missing_left));
            }
        }

        best.map(|(gain, threshold, missing_left)| SplitCandidate {
            condition: SplitCondition {
                column: ColumnIndex::new(column),
                test: Test::Threshold(threshold),
                missing_left,
            },
            gain,
        })
    }

    fn categorical(
        &self,
        column: usize,
        codes: &[u32],
        rows: &[usize],
        parent_weighted: f64,
    ) -> Option<SplitCandidate> {
        let mut missing = LabelStats::empty(self.target);
        let mut per_code: BTreeMap<u32, LabelStats> = BTreeMap::new();
        for &row in rows {
            let code = codes[row];
            if code == OOV_CODE {
                missing.add(self.target, row);
            } else {
                per_code
                    .entry(code)
                    .or_insert_with(|| LabelStats::empty(self.target))
                    .add(self.target, row);
            }
        }
        if per_code.len() < 2 {
            return None;
        }
        let groups: Vec<(u32, LabelStats)> = per_code.into_iter().collect();
        let mut total = LabelStats::empty(self.target);
        for (_, stats) in &groups {
            total.merge(stats);
        }

        let mut best: Option<(f64, CategorySet, bool)> = None;
        for order in orderings(&groups, &total) {
            let mut left = LabelStats::empty(self.target);
            let mut right = total.clone();
            for i in 0..order.len() - 1 {
                let stats = &groups[order[i]].1;
                left.merge(stats);
                right.subtract(stats);
                let Some((gain, missing_left)) =
                    self.score(&left, &right, &missing, parent_weighted)
                else {
                    continue;
                };
                if best.as_ref().is_none_or(|(g, _, _)| gain > *g) {
                    let set = CategorySet::from_codes(order[..=i].iter().map(|&g| groups[g].0));
                    best = Some((gain, set, missing_left));
                }
            }
        }

        best.map(|(gain, set, missing_left)| SplitCandidate {
            condition: SplitCondition {
                column: ColumnIndex::new(column),
                test: Test::InSet(set),
                missing_left,
            },
            gain,
        })
    }
}

/// Orderings of the observed codes whose prefixes are evaluated.
///
/// Regression: by mean label. Classification: by the fraction of each present
/// class in turn; with two classes a single ordering covers both.
fn orderings(groups: &[(u32, LabelStats)], total: &LabelStats) -> Vec<Vec<usize>> {
    let sorted_by = |key: &dyn Fn(&LabelStats) -> f64| {
        let mut order: Vec<usize> = (0..groups.len()).collect();
        order.sort_by(|&a, &b| key(&groups[a].1).total_cmp(&key(&groups[b].1)).then(a.cmp(&b)));
        order
    };
    match total {
        LabelStats::Moments { .. } => vec![sorted_by(&|s| s.mean())],
        LabelStats::Counts { counts, .. } => {
            let present: Vec<usize> = counts
                .iter()
                .enumerate()
                .filter(|&(_, &c)| c > 0)
                .map(|(class, _)| class)
                .collect();
            let take = if present.len() <= 2 { 1 } else { present.len() };
            present
                .iter()
                .take(take)
                .map(|&class| sorted_by(&|s| s.fraction(class)))
                .collect()
        }
    }
}
