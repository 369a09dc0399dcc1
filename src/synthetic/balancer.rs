//! SMOTE oversampling combined with majority undersampling

use crate::data::{ColumnValues, Dataset, FeatureColumn};
use crate::error::{HarnessError, Result};
use crate::synthetic::{imbalance, ResampleResult, Sampler};
use rand::prelude::*;
use rand::seq::index;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::{debug, info};

/// Ordered (distance, index) pair for BinaryHeap-based partial sort
#[derive(Debug, Clone, Copy)]
struct DistIdx(f64, usize);

impl PartialEq for DistIdx {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for DistIdx {}
impl PartialOrd for DistIdx {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DistIdx {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0).then(self.1.cmp(&other.1))
    }
}

/// Balancer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalancerConfig {
    /// Skip balancing entirely when false
    pub enabled: bool,
    /// Synthetic minority records per 100 minority records
    pub perc_over: f64,
    /// Majority records kept per 100 synthetic records
    pub perc_under: f64,
    /// Neighbours considered for interpolation
    pub k_neighbors: usize,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            perc_over: 100.0,
            perc_under: 200.0,
            k_neighbors: 5,
        }
    }
}

impl BalancerConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.perc_over.is_finite() && self.perc_over >= 0.0) {
            return Err(HarnessError::config("perc_over", "must be a non-negative number"));
        }
        if !(self.perc_under.is_finite() && self.perc_under >= 0.0) {
            return Err(HarnessError::config("perc_under", "must be a non-negative number"));
        }
        if self.k_neighbors == 0 {
            return Err(HarnessError::config("k_neighbors", "must be at least 1"));
        }
        Ok(())
    }
}

/// SMOTE + random undersampling.
///
/// With `perc_over = p` the balancer creates `floor(p/100)` synthetic records
/// per minority record, plus one for a random subset covering the fractional
/// part. It then keeps `floor(perc_under/100 * n_synthetic)` majority records,
/// drawn without replacement. If those counts would not move the label split
/// strictly closer to 1:1, every majority record is kept and exactly enough
/// minority records are synthesized to even the classes.
#[derive(Debug, Clone)]
pub struct ClassBalancer {
    config: BalancerConfig,
    seed: u64,
}

impl ClassBalancer {
    pub fn new(config: BalancerConfig, seed: u64) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, seed })
    }

    pub fn config(&self) -> &BalancerConfig {
        &self.config
    }

    /// Target `(n_synthetic, n_majority_kept)` for the given class sizes
    fn plan(&self, n_min: usize, n_maj: usize) -> (usize, usize) {
        let over = self.config.perc_over / 100.0;
        let n_synth = (over.floor() as usize) * n_min + ((over - over.floor()) * n_min as f64).round() as usize;
        let kept = ((self.config.perc_under / 100.0 * n_synth as f64).floor() as usize).min(n_maj);

        let before = imbalance([n_maj, n_min]);
        let after = imbalance([kept, n_min + n_synth]);
        if after < before {
            (n_synth, kept)
        } else {
            (n_maj - n_min, n_maj)
        }
    }
}

impl Sampler for ClassBalancer {
    fn resample(&self, data: &Dataset) -> Result<ResampleResult> {
        let [neg, pos] = data.class_indices();
        let (minority_label, minority, majority) = if pos.len() <= neg.len() { (1u8, pos, neg) } else { (0u8, neg, pos) };

        if minority.len() == majority.len() {
            debug!("Classes already even, balancing skipped");
            return Ok(ResampleResult {
                dataset: data.clone(),
                minority_label,
                n_synthetic: 0,
                n_majority_kept: majority.len(),
            });
        }

        let k = self.config.k_neighbors;
        if minority.len() < k + 1 {
            return Err(HarnessError::InsufficientMinoritySamples {
                available: minority.len(),
                required: k + 1,
            });
        }

        let (n_synth, n_kept) = self.plan(minority.len(), majority.len());
        let mut rng = StdRng::seed_from_u64(self.seed);

        let minority_data = data.subset(&minority);
        let space = NeighbourSpace::new(&minority_data);
        let neighbours: Vec<Vec<usize>> = (0..minority.len())
            .into_par_iter()
            .map(|i| space.nearest(i, k))
            .collect();

        // Seeds: every minority record `floor(over)` times, then a random subset
        let per_record = n_synth / minority.len();
        let remainder = n_synth - per_record * minority.len();
        let mut seeds: Vec<usize> = (0..per_record).flat_map(|_| 0..minority.len()).collect();
        let mut extra = index::sample(&mut rng, minority.len(), remainder).into_vec();
        extra.sort_unstable();
        seeds.extend(extra);

        let synthetic = space.synthesize(&minority_data, &seeds, &neighbours, &mut rng)?;

        let mut kept = index::sample(&mut rng, majority.len(), n_kept).into_vec();
        kept.sort_unstable();
        let mut retained: Vec<usize> = kept.iter().map(|&i| majority[i]).chain(minority.iter().copied()).collect();
        retained.sort_unstable();

        let dataset = data.subset(&retained).concat(&synthetic)?;

        info!(
            minority_label,
            minority = minority.len(),
            synthetic = n_synth,
            majority_kept = n_kept,
            majority_dropped = majority.len() - n_kept,
            "Balanced training data"
        );

        Ok(ResampleResult {
            dataset,
            minority_label,
            n_synthetic: n_synth,
            n_majority_kept: n_kept,
        })
    }
}

/// Minority records in a form suited to distance computations
struct NeighbourSpace<'a> {
    numeric: Vec<(&'a [f64], f64)>,
    categorical: Vec<&'a [usize]>,
    n: usize,
}

impl<'a> NeighbourSpace<'a> {
    fn new(data: &'a Dataset) -> Self {
        let mut numeric = Vec::new();
        let mut categorical = Vec::new();
        for column in data.columns() {
            match &column.values {
                ColumnValues::Numeric(values) => {
                    let (lo, hi) = values
                        .iter()
                        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
                    let range = if hi - lo > 0.0 { hi - lo } else { 1.0 };
                    numeric.push((values.as_slice(), range));
                }
                ColumnValues::Categorical { codes, .. } => categorical.push(codes.as_slice()),
            }
        }
        Self {
            numeric,
            categorical,
            n: data.len(),
        }
    }

    /// Range-normalized Euclidean distance, categorical mismatches counting 1
    fn distance(&self, a: usize, b: usize) -> f64 {
        let numeric: f64 = self
            .numeric
            .iter()
            .map(|(values, range)| ((values[a] - values[b]) / range).powi(2))
            .sum();
        let mismatches = self.categorical.iter().filter(|codes| codes[a] != codes[b]).count();
        (numeric + mismatches as f64).sqrt()
    }

    /// k nearest other records, nearest first
    fn nearest(&self, i: usize, k: usize) -> Vec<usize> {
        let mut heap: BinaryHeap<DistIdx> = BinaryHeap::with_capacity(k + 1);
        for j in (0..self.n).filter(|&j| j != i) {
            let candidate = DistIdx(self.distance(i, j), j);
            if heap.len() < k {
                heap.push(candidate);
            } else if let Some(top) = heap.peek() {
                if candidate < *top {
                    heap.pop();
                    heap.push(candidate);
                }
            }
        }
        heap.into_sorted_vec().into_iter().map(|DistIdx(_, j)| j).collect()
    }

    /// Interpolate one synthetic record per seed
    fn synthesize(
        &self,
        data: &Dataset,
        seeds: &[usize],
        neighbours: &[Vec<usize>],
        rng: &mut StdRng,
    ) -> Result<Dataset> {
        let picks: Vec<(usize, usize, f64, Vec<bool>)> = seeds
            .iter()
            .map(|&s| {
                let nn = neighbours[s][rng.gen_range(0..neighbours[s].len())];
                let gap: f64 = rng.gen();
                let from_neighbour: Vec<bool> = (0..self.categorical.len()).map(|_| rng.gen_bool(0.5)).collect();
                (s, nn, gap, from_neighbour)
            })
            .collect();

        let mut columns = Vec::with_capacity(data.columns().len());
        let mut cat_idx = 0;
        for column in data.columns() {
            let values = match &column.values {
                ColumnValues::Numeric(v) => ColumnValues::Numeric(
                    picks
                        .iter()
                        .map(|&(s, nn, gap, _)| v[s] + gap * (v[nn] - v[s]))
                        .collect(),
                ),
                ColumnValues::Categorical { levels, codes } => {
                    let out = picks
                        .iter()
                        .map(|(s, nn, _, flags)| if flags[cat_idx] { codes[*nn] } else { codes[*s] })
                        .collect();
                    cat_idx += 1;
                    ColumnValues::Categorical {
                        levels: levels.clone(),
                        codes: out,
                    }
                }
            };
            columns.push(FeatureColumn {
                name: column.name.clone(),
                values,
            });
        }

        let label = data.labels().first().copied().unwrap_or(1);
        Dataset::new(columns, vec![label; seeds.len()], data.label_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::imbalance;

    fn create_imbalanced_data(n_neg: usize, n_pos: usize) -> Dataset {
        let n = n_neg + n_pos;
        let labels: Vec<u8> = (0..n).map(|i| u8::from(i >= n_neg)).collect();
        let age: Vec<f64> = (0..n).map(|i| if i >= n_neg { 50.0 + (i % 7) as f64 } else { 30.0 + (i % 11) as f64 }).collect();
        let geo: Vec<&str> = (0..n).map(|i| ["France", "Germany", "Spain"][i % 3]).collect();
        Dataset::new(
            vec![FeatureColumn::numeric("Age", age), FeatureColumn::categorical("Geography", &geo)],
            labels,
            "Exited",
        )
        .unwrap()
    }

    #[test]
    fn test_default_percentages() {
        let data = create_imbalanced_data(80, 20);
        let balancer = ClassBalancer::new(BalancerConfig::default(), 42).unwrap();
        let result = balancer.resample(&data).unwrap();

        assert_eq!(result.minority_label, 1);
        assert_eq!(result.n_synthetic, 20);
        assert_eq!(result.n_majority_kept, 40);
        assert_eq!(result.dataset.class_counts(), [40, 40]);
    }

    #[test]
    fn test_synthetic_values_interpolated() {
        let data = create_imbalanced_data(80, 20);
        let result = ClassBalancer::new(BalancerConfig::default(), 1).unwrap().resample(&data).unwrap();

        let ages = result.dataset.column("Age").unwrap().as_numeric().unwrap();
        let synthetic = &ages[ages.len() - result.n_synthetic..];
        assert!(synthetic.iter().all(|&a| (50.0..=56.0).contains(&a)));
        assert!(result.dataset.labels()[ages.len() - result.n_synthetic..].iter().all(|&l| l == 1));
    }

    #[test]
    fn test_fractional_oversampling() {
        let data = create_imbalanced_data(80, 20);
        let config = BalancerConfig {
            perc_over: 150.0,
            ..Default::default()
        };
        let result = ClassBalancer::new(config, 3).unwrap().resample(&data).unwrap();
        assert_eq!(result.n_synthetic, 30);
        assert_eq!(result.n_majority_kept, 60);
    }

    #[test]
    fn test_overshoot_falls_back_to_even_split() {
        let data = create_imbalanced_data(25, 20);
        let result = ClassBalancer::new(BalancerConfig::default(), 3).unwrap().resample(&data).unwrap();
        assert_eq!(result.dataset.class_counts(), [25, 25]);
        assert!(imbalance(result.dataset.class_counts()) < imbalance(data.class_counts()));
    }

    #[test]
    fn test_insufficient_minority() {
        let data = create_imbalanced_data(30, 4);
        let err = ClassBalancer::new(BalancerConfig::default(), 3).unwrap().resample(&data).unwrap_err();
        assert!(matches!(
            err,
            HarnessError::InsufficientMinoritySamples { available: 4, required: 6 }
        ));
    }

    #[test]
    fn test_deterministic() {
        let data = create_imbalanced_data(80, 20);
        let balancer = ClassBalancer::new(BalancerConfig::default(), 9).unwrap();
        let a = balancer.resample(&data).unwrap();
        let b = balancer.resample(&data).unwrap();
        assert_eq!(a.dataset, b.dataset);
    }

    #[test]
    fn test_invalid_config() {
        let config = BalancerConfig {
            k_neighbors: 0,
            ..Default::default()
        };
        assert!(ClassBalancer::new(config, 0).is_err());
    }
}
