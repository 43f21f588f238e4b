//! Prometheus text format parsing
//!
//! Converts a scraped exposition body into [`Metric`] values. Labels become
//! tags; the sample value becomes a field named after the sample type.

use prometheus_parse::{Sample, Scrape, Value};
use regex::Regex;
use std::io;
use std::sync::LazyLock;

use crate::metric::Metric;

/// `name{label="value",...} value [timestamp]`
static SAMPLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"^[a-zA-Z_:][a-zA-Z0-9_:]*"#,
        r#"(?:\{\s*(?:[a-zA-Z_][a-zA-Z0-9_]*\s*=\s*"(?:[^"\\]|\\.)*"\s*"#,
        r#"(?:,\s*[a-zA-Z_][a-zA-Z0-9_]*\s*=\s*"(?:[^"\\]|\\.)*"\s*)*,?\s*)?\})?"#,
        r#"\s+[+-]?(?:Inf|NaN|(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?)"#,
        r#"(?:\s+-?\d+)?$"#,
    ))
    .unwrap()
});

/// Parse a Prometheus text exposition body
///
/// Every non-comment line must be a well-formed sample; otherwise the whole
/// body is rejected and no metrics are returned.
pub fn parse_metrics(prometheus_text: &str) -> io::Result<Vec<Metric>> {
    validate_samples(prometheus_text)?;

    let lines: Vec<_> = prometheus_text.lines().map(|s| Ok(s.to_owned())).collect();
    let scrape = Scrape::parse(lines.into_iter())?;

    Ok(scrape.samples.iter().map(convert_sample).collect())
}

fn validate_samples(prometheus_text: &str) -> io::Result<()> {
    for (idx, line) in prometheus_text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if !SAMPLE_RE.is_match(line) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("line {}: malformed sample {:?}", idx + 1, line),
            ));
        }
    }
    Ok(())
}

fn convert_sample(sample: &Sample) -> Metric {
    let mut metric = Metric::new(sample.metric.clone(), sample.timestamp);
    for (key, value) in sample.labels.iter() {
        metric.add_tag(key.clone(), value.clone());
    }

    match &sample.value {
        Value::Counter(v) => metric.add_field("counter", *v),
        Value::Gauge(v) => metric.add_field("gauge", *v),
        Value::Untyped(v) => metric.add_field("value", *v),
        Value::Histogram(buckets) => {
            for bucket in buckets {
                metric.add_field(format_bound(bucket.less_than), bucket.count);
            }
        }
        Value::Summary(quantiles) => {
            for quantile in quantiles {
                metric.add_field(format_bound(quantile.quantile), quantile.count);
            }
        }
    }

    metric
}

/// Format a bucket bound or quantile the way the exposition format spells it
fn format_bound(bound: f64) -> String {
    if bound.is_infinite() && bound.is_sign_positive() {
        "+Inf".to_string()
    } else {
        bound.to_string()
    }
}
