//! Named numeric series, indexed by bar.

use std::collections::HashMap;

use crate::compiler::CompiledStrategy;
use crate::domain::Bar;
use crate::graph::PriceField;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SeriesError {
    #[error("missing series: {}", .0.join(", "))]
    Missing(Vec<String>),
    #[error("series `{key}` has {found} values, expected {expected}")]
    LengthMismatch {
        key: String,
        found: usize,
        expected: usize,
    },
}

/// Price columns plus externally computed indicator series, keyed the way
/// `IndicatorSpec::key` and `PriceField::key` name them.
#[derive(Debug, Clone, Default)]
pub struct SeriesSet {
    series: HashMap<String, Vec<f64>>,
}

impl SeriesSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// One series per price field.
    pub fn from_bars(bars: &[Bar]) -> Self {
        let mut set = Self::new();
        for field in PriceField::ALL {
            let values = bars
                .iter()
                .map(|bar| match field {
                    PriceField::Open => bar.open,
                    PriceField::High => bar.high,
                    PriceField::Low => bar.low,
                    PriceField::Close => bar.close,
                    PriceField::Volume => bar.volume,
                })
                .collect();
            set.insert(field.key(), values);
        }
        set
    }

    pub fn insert(&mut self, key: impl Into<String>, values: Vec<f64>) {
        self.series.insert(key.into(), values);
    }

    /// Value of `key` at bar `index`, if the series exists and is that long.
    pub fn get(&self, key: &str, index: usize) -> Option<f64> {
        self.series.get(key).and_then(|v| v.get(index).copied())
    }

    pub fn get_series(&self, key: &str) -> Option<&[f64]> {
        self.series.get(key).map(|v| v.as_slice())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.series.contains_key(key)
    }

    /// Number of bars, taken from the close series.
    pub fn bar_count(&self) -> usize {
        self.series
            .get(PriceField::Close.key())
            .map_or(0, Vec::len)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Every series the strategy reads must be present and as long as the
    /// close series. Close itself is always required: entries fill at it and
    /// exits test against it.
    pub fn check_requirements(&self, strategy: &CompiledStrategy) -> Result<(), SeriesError> {
        let mut needed: Vec<String> = vec![PriceField::Close.key().to_string()];
        let mut push = |key: String| {
            if !needed.contains(&key) {
                needed.push(key);
            }
        };
        for rule in strategy.actions() {
            rule.predicate.for_each_expression(&mut |e| {
                if let Some(key) = e.series_key() {
                    push(key);
                }
            });
        }
        for spec in strategy.indicators() {
            push(spec.key());
        }

        let missing: Vec<String> = needed
            .iter()
            .filter(|key| !self.contains(key))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(SeriesError::Missing(missing));
        }

        let expected = self.bar_count();
        for key in &needed {
            let found = self.series[key].len();
            if found != expected {
                return Err(SeriesError::LengthMismatch {
                    key: key.clone(),
                    found,
                    expected,
                });
            }
        }
        Ok(())
    }
}
