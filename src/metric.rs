//! Collected metrics and the sink they are delivered to

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;

use crate::error::FetchError;

/// A single metric parsed from a scraped endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub name: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, f64>,
    pub timestamp: DateTime<Utc>,
}

impl Metric {
    pub fn new(name: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
            timestamp,
        }
    }

    pub fn has_tag(&self, key: &str) -> bool {
        self.tags.contains_key(key)
    }

    pub fn add_tag(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.tags.insert(key.into(), value.into());
    }

    pub fn add_field(&mut self, key: impl Into<String>, value: f64) {
        self.fields.insert(key.into(), value);
    }
}

/// Line-protocol style rendering: `name,tag=v field=1 <unix nanos>`
impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&escape(&self.name, &[',', ' ']))?;
        for (key, value) in &self.tags {
            write!(
                f,
                ",{}={}",
                escape(key, &[',', '=', ' ']),
                escape(value, &[',', '=', ' '])
            )?;
        }

        let fields = self
            .fields
            .iter()
            .map(|(key, value)| format!("{}={}", escape(key, &[',', '=', ' ']), value))
            .collect::<Vec<_>>()
            .join(",");
        write!(f, " {}", fields)?;

        if let Some(nanos) = self.timestamp.timestamp_nanos_opt() {
            write!(f, " {}", nanos)?;
        }
        Ok(())
    }
}

fn escape(value: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Receives the outcome of every fetch
pub trait Accumulator: Send + Sync {
    fn add_metric(&self, metric: Metric);

    fn add_error(&self, url: &str, error: &FetchError);
}

/// Accumulator that keeps everything in memory
#[derive(Debug, Default)]
pub struct MemoryAccumulator {
    metrics: Mutex<Vec<Metric>>,
    errors: Mutex<Vec<String>>,
}

impl MemoryAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain collected metrics
    pub fn take_metrics(&self) -> Vec<Metric> {
        std::mem::take(&mut *self.metrics.lock().unwrap_or_else(|e| e.into_inner()))
    }

    /// Drain collected error messages
    pub fn take_errors(&self) -> Vec<String> {
        std::mem::take(&mut *self.errors.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl Accumulator for MemoryAccumulator {
    fn add_metric(&self, metric: Metric) {
        self.metrics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(metric);
    }

    fn add_error(&self, url: &str, error: &FetchError) {
        self.errors
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(format!("{}: {}", url, error));
    }
}
