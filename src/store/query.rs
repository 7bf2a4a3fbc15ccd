//! Read-only operations
//!
//! Every query takes one consistent snapshot (optimistic, with a single
//! shared-lock retry) and evaluates over it in parallel with rayon. Records
//! are immutable, so evaluation needs no lock once the snapshot is taken.
//!
//! Degenerate parameters (blank search terms, negative or inverted price
//! ranges) produce an empty result rather than an error.
//!
//! Filter results are returned in id order so repeated calls over the same
//! content agree.

use super::MaterialStore;
use crate::core::{Material, MaterialType};
use crate::errors::Result;
use crate::infrastructure::metrics::Timer;
use rayon::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Aggregates computed from one snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogStats {
    pub count: usize,
    pub total_value: f64,
    pub average_price: f64,
    pub median_price: f64,
    pub unique_types: usize,
    pub print_count: usize,
    pub media_count: usize,
}

impl CatalogStats {
    pub fn from_records(records: &[Arc<Material>]) -> Self {
        let count = records.len();
        if count == 0 {
            return Self {
                count: 0,
                total_value: 0.0,
                average_price: 0.0,
                median_price: 0.0,
                unique_types: 0,
                print_count: 0,
                media_count: 0,
            };
        }

        let mut prices: Vec<f64> = records.iter().map(|m| m.price()).collect();
        prices.par_sort_unstable_by(f64::total_cmp);

        let total_value: f64 = prices.iter().sum();
        let mid = count / 2;
        let median_price = if count % 2 == 0 {
            (prices[mid - 1] + prices[mid]) / 2.0
        } else {
            prices[mid]
        };

        let unique_types = records.iter().map(|m| m.kind()).collect::<HashSet<_>>().len();
        let print_count = records.iter().filter(|m| m.kind().is_print()).count();

        Self {
            count,
            total_value,
            average_price: total_value / count as f64,
            median_price,
            unique_types,
            print_count,
            media_count: count - print_count,
        }
    }
}

impl MaterialStore {
    /// Lifecycle check, snapshot, evaluate.
    fn query<T>(&self, name: &'static str, eval: impl FnOnce(&[Arc<Material>]) -> T) -> Result<T> {
        self.lifecycle.ensure_open()?;
        let _timer = Timer::new(&self.metrics, name);
        let snapshot = self.consistent_snapshot();
        Ok(eval(&snapshot))
    }

    fn select(
        &self,
        name: &'static str,
        predicate: impl Fn(&Material) -> bool + Sync,
    ) -> Result<Vec<Arc<Material>>> {
        self.query(name, |records| {
            let mut selected: Vec<_> = records
                .par_iter()
                .filter(|material| predicate(material))
                .cloned()
                .collect();
            selected.par_sort_unstable_by(|a, b| a.id().cmp(b.id()));
            selected
        })
    }

    /// Case-insensitive substring match on the title
    pub fn search_by_title(&self, term: &str) -> Result<Vec<Arc<Material>>> {
        self.lifecycle.ensure_open()?;
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        self.select("query.search_by_title", |m| m.title().to_lowercase().contains(&needle))
    }

    /// Case-insensitive substring match on the creator
    pub fn search_by_creator(&self, term: &str) -> Result<Vec<Arc<Material>>> {
        self.lifecycle.ensure_open()?;
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        self.select("query.search_by_creator", |m| m.creator().to_lowercase().contains(&needle))
    }

    pub fn filter(&self, predicate: impl Fn(&Material) -> bool + Sync) -> Result<Vec<Arc<Material>>> {
        self.select("query.filter", predicate)
    }

    pub fn by_type(&self, kind: MaterialType) -> Result<Vec<Arc<Material>>> {
        self.select("query.by_type", |m| m.kind() == kind)
    }

    /// Inclusive range. Negative, NaN or inverted bounds give no results.
    pub fn by_price_range(&self, min: f64, max: f64) -> Result<Vec<Arc<Material>>> {
        self.lifecycle.ensure_open()?;
        if !(min >= 0.0 && max >= 0.0 && min <= max) {
            return Ok(Vec::new());
        }
        self.select("query.by_price_range", |m| m.price() >= min && m.price() <= max)
    }

    pub fn by_year(&self, year: i32) -> Result<Vec<Arc<Material>>> {
        self.select("query.by_year", |m| m.year() == year)
    }

    /// Records whose creator equals any of `creators`, ignoring case
    pub fn by_creators<I, S>(&self, creators: I) -> Result<Vec<Arc<Material>>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.lifecycle.ensure_open()?;
        let wanted: HashSet<String> = creators
            .into_iter()
            .map(|c| c.as_ref().trim().to_lowercase())
            .filter(|c| !c.is_empty())
            .collect();
        if wanted.is_empty() {
            return Ok(Vec::new());
        }
        self.select("query.by_creators", |m| wanted.contains(&m.creator().to_lowercase()))
    }

    /// All records by title (case-insensitive), ties broken by id
    pub fn sorted_all(&self) -> Result<Vec<Arc<Material>>> {
        self.sorted_by(|a, b| a.title().to_lowercase().cmp(&b.title().to_lowercase()))
    }

    /// All records ordered by `compare`; equal records fall back to id order
    /// so the result is a total order.
    pub fn sorted_by(
        &self,
        compare: impl Fn(&Material, &Material) -> Ordering + Sync,
    ) -> Result<Vec<Arc<Material>>> {
        self.query("query.sorted_by", |records| {
            let mut sorted = records.to_vec();
            sorted.par_sort_unstable_by(|a, b| compare(a, b).then_with(|| a.id().cmp(b.id())));
            sorted
        })
    }

    pub fn aggregate_stats(&self) -> Result<CatalogStats> {
        self.query("query.aggregate_stats", CatalogStats::from_records)
    }

    pub fn count_by_type(&self) -> Result<BTreeMap<MaterialType, usize>> {
        self.query("query.count_by_type", |records| {
            let mut counts = BTreeMap::new();
            for material in records {
                *counts.entry(material.kind()).or_insert(0) += 1;
            }
            counts
        })
    }

    /// Sum of list prices
    pub fn total_value(&self) -> Result<f64> {
        self.query("query.total_value", |records| {
            records.par_iter().map(|m| m.price()).sum()
        })
    }

    /// Sum of `price * (1 - discount_rate)`
    pub fn total_discounted_value(&self) -> Result<f64> {
        self.query("query.total_discounted_value", |records| {
            records.par_iter().map(|m| m.discounted_price()).sum()
        })
    }

    /// Sum of `price * discount_rate`
    pub fn total_discount_amount(&self) -> Result<f64> {
        self.query("query.total_discount_amount", |records| {
            records.par_iter().map(|m| m.discount_amount()).sum()
        })
    }
}
