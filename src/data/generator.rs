//! Synthetic bank-customer table generator
//!
//! Produces a raw table with the same columns as the bank churn export
//! (identifiers included) so the whole harness can be exercised without the
//! real file. Feature distributions are conditioned on the label so that the
//! classifiers have signal to find: churners skew older, more German, less
//! active and hold a single product more often.

use crate::error::{HarnessError, Result};
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const SURNAMES: &[&str] = &[
    "Hargrave", "Hill", "Onio", "Boni", "Mitchell", "Chu", "Bartlett", "Obinna", "He", "Bearce", "Andrews", "Kay",
    "Chin", "Scott", "Goforth", "Romeo", "Henderson", "Muldrow", "Hao", "McDonald",
];

/// Seeded generator of churn-shaped tables
#[derive(Debug, Clone)]
pub struct ChurnGenerator {
    n_records: usize,
    positive_rate: f64,
    seed: u64,
}

impl Default for ChurnGenerator {
    fn default() -> Self {
        Self {
            n_records: 10_000,
            positive_rate: 0.2,
            seed: 42,
        }
    }
}

impl ChurnGenerator {
    pub fn new(n_records: usize) -> Self {
        Self {
            n_records,
            ..Default::default()
        }
    }

    pub fn with_positive_rate(mut self, rate: f64) -> Self {
        self.positive_rate = rate;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Generate the table. The number of churners is exactly
    /// `round(n_records * positive_rate)`.
    pub fn generate(&self) -> Result<DataFrame> {
        if self.n_records == 0 {
            return Err(HarnessError::config("n_records", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.positive_rate) {
            return Err(HarnessError::config(
                "positive_rate",
                format!("must be in [0, 1], got {}", self.positive_rate),
            ));
        }

        let n = self.n_records;
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        let n_pos = (n as f64 * self.positive_rate).round() as usize;
        let mut exited: Vec<i64> = (0..n).map(|i| i64::from(i < n_pos)).collect();
        exited.shuffle(&mut rng);

        let mut row_number = Vec::with_capacity(n);
        let mut customer_id = Vec::with_capacity(n);
        let mut surname = Vec::with_capacity(n);
        let mut credit_score = Vec::with_capacity(n);
        let mut geography = Vec::with_capacity(n);
        let mut gender = Vec::with_capacity(n);
        let mut age = Vec::with_capacity(n);
        let mut tenure = Vec::with_capacity(n);
        let mut balance = Vec::with_capacity(n);
        let mut num_products = Vec::with_capacity(n);
        let mut has_card = Vec::with_capacity(n);
        let mut is_active = Vec::with_capacity(n);
        let mut salary = Vec::with_capacity(n);

        for (i, &label) in exited.iter().enumerate() {
            let churned = label == 1;

            row_number.push(i as i64 + 1);
            customer_id.push(15_565_701 + i as i64 * 7);
            surname.push(SURNAMES[rng.gen_range(0..SURNAMES.len())]);

            let score_mean = if churned { 645.0 } else { 652.0 };
            credit_score.push(normal(&mut rng, score_mean, 97.0).clamp(350.0, 850.0).round() as i64);

            let geo_weights = if churned { [0.40, 0.40, 0.20] } else { [0.53, 0.21, 0.26] };
            geography.push(["France", "Germany", "Spain"][pick(&mut rng, &geo_weights)]);

            let female = if churned { 0.56 } else { 0.43 };
            gender.push(if rng.gen_bool(female) { "Female" } else { "Male" });

            let (age_mean, age_sd) = if churned { (45.0, 9.5) } else { (37.0, 10.0) };
            age.push(normal(&mut rng, age_mean, age_sd).clamp(18.0, 92.0).round() as i64);

            tenure.push(rng.gen_range(0..=10i64));

            let zero_balance = if churned { 0.25 } else { 0.39 };
            let b = if rng.gen_bool(zero_balance) {
                0.0
            } else {
                (normal(&mut rng, 120_000.0, 30_000.0).max(0.0) * 100.0).round() / 100.0
            };
            balance.push(b);

            let product_weights = if churned {
                [0.69, 0.17, 0.11, 0.03]
            } else {
                [0.46, 0.53, 0.01, 0.0]
            };
            num_products.push(pick(&mut rng, &product_weights) as i64 + 1);

            has_card.push(i64::from(rng.gen_bool(0.7)));

            let active = if churned { 0.36 } else { 0.55 };
            is_active.push(i64::from(rng.gen_bool(active)));

            salary.push((rng.gen_range(11.58..199_992.48f64) * 100.0).round() / 100.0);
        }

        let df = df!(
            "RowNumber" => row_number,
            "CustomerId" => customer_id,
            "Surname" => surname,
            "CreditScore" => credit_score,
            "Geography" => geography,
            "Gender" => gender,
            "Age" => age,
            "Tenure" => tenure,
            "Balance" => balance,
            "NumOfProducts" => num_products,
            "HasCrCard" => has_card,
            "IsActiveMember" => is_active,
            "EstimatedSalary" => salary,
            "Exited" => exited
        )?;
        Ok(df)
    }
}

/// Box-Muller draw from N(mean, sd)
fn normal<R: Rng>(rng: &mut R, mean: f64, sd: f64) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mean + sd * z
}

/// Index drawn according to (unnormalized) weights
fn pick<R: Rng>(rng: &mut R, weights: &[f64]) -> usize {
    let total: f64 = weights.iter().sum();
    let mut target = rng.gen::<f64>() * total;
    for (i, &w) in weights.iter().enumerate() {
        if target < w {
            return i;
        }
        target -= w;
    }
    weights.len() - 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_schema() {
        let df = ChurnGenerator::new(50).with_seed(1).generate().unwrap();
        assert_eq!(df.height(), 50);
        let names: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
        assert_eq!(names.first().map(String::as_str), Some("RowNumber"));
        assert_eq!(names.last().map(String::as_str), Some("Exited"));
        assert_eq!(names.len(), 14);
    }

    #[test]
    fn test_exact_positive_count() {
        let df = ChurnGenerator::new(1000)
            .with_positive_rate(0.2)
            .with_seed(5)
            .generate()
            .unwrap();
        let exited = df.column("Exited").unwrap().as_materialized_series().i64().unwrap().sum();
        assert_eq!(exited, Some(200));
    }

    #[test]
    fn test_deterministic() {
        let a = ChurnGenerator::new(100).with_seed(9).generate().unwrap();
        let b = ChurnGenerator::new(100).with_seed(9).generate().unwrap();
        assert!(a.equals(&b));
    }

    #[test]
    fn test_invalid_rate() {
        assert!(ChurnGenerator::new(10).with_positive_rate(1.5).generate().is_err());
        assert!(ChurnGenerator::new(0).generate().is_err());
    }
}
