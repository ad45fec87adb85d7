//! Random subset selection of eligible rows.

use crate::table::Table;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;

/// Keeps each row independently with a fixed probability.
pub struct Sampler {
    fraction: f64,
    rng: StdRng,
}

impl Sampler {
    /// `fraction` is clamped to `[0, 1]`; a `seed` makes the selection reproducible.
    pub fn new(fraction: f64, seed: Option<u64>) -> Self {
        let fraction = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Sampler { fraction, rng }
    }

    pub fn fraction(&self) -> f64 {
        self.fraction
    }

    /// Returns the kept rows in their original order; `table` is left untouched.
    pub fn sample(&mut self, table: &Table) -> Table {
        let fraction = self.fraction;
        let rng = &mut self.rng;
        table.select_rows(|_| rng.gen_bool(fraction))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Value;

    fn numbered(rows: usize) -> Table {
        let mut table = Table::new(vec!["n".to_owned()]);
        for index in 0..rows {
            table.push_row(vec![Value::Number(index as f64)]);
        }
        table
    }

    fn numbers(table: &Table) -> Vec<f64> {
        table
            .rows()
            .iter()
            .map(|row| match row[0] {
                Value::Number(number) => number,
                _ => panic!("expected number"),
            })
            .collect()
    }

    #[test]
    fn sample_is_ordered_subset_without_duplicates() {
        let input = numbered(1000);
        let sample = Sampler::new(0.2, Some(42)).sample(&input);
        let picked = numbers(&sample);

        assert!(picked.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(picked.iter().all(|number| *number < 1000.0));
        assert!(picked.len() > 100 && picked.len() < 300, "{}", picked.len());
        assert_eq!(input.len(), 1000);
        assert_eq!(sample.columns(), input.columns());
    }

    #[test]
    fn same_seed_same_sample() {
        let input = numbered(200);
        let first = Sampler::new(0.2, Some(7)).sample(&input);
        let second = Sampler::new(0.2, Some(7)).sample(&input);
        assert_eq!(first, second);
    }

    #[test]
    fn extreme_fractions() {
        let input = numbered(50);
        assert!(Sampler::new(0.0, None).sample(&input).is_empty());
        assert_eq!(Sampler::new(1.0, None).sample(&input), input);
        assert_eq!(Sampler::new(3.0, None).fraction(), 1.0);
        assert_eq!(Sampler::new(f64::NAN, None).fraction(), 0.0);
        assert!(Sampler::new(0.2, Some(1)).sample(&Table::new(vec!["n".to_owned()])).is_empty());
    }
}
