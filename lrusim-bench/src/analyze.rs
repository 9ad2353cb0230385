// Copyright 2026 lrusim Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{fmt::Display, time::Duration};

use anyhow::{anyhow, Result};
use hdrhistogram::Histogram;
use itertools::Itertools;
use lrusim_memory::{Cache, MetricsSnapshot, SweepStats};

/// Highest trackable clean latency. (us)
const MAX_LATENCY_US: u64 = 60 * 1_000_000;

/// Operation counts of one accessor thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientReport {
    pub references: u64,
    pub cleans: u64,
}

/// What the dedicated cleaner thread observed.
#[derive(Debug)]
pub struct CleanerReport {
    pub passes: u64,
    pub evicted: u64,
    /// Latency of every blocking clean, gate wait included. (us)
    pub lats: Histogram<u64>,
}

impl CleanerReport {
    pub fn new() -> Result<Self> {
        let lats = Histogram::new_with_bounds(1, MAX_LATENCY_US, 3)
            .map_err(|e| anyhow!("failed to create latency histogram: {e:?}"))?;
        Ok(Self {
            passes: 0,
            evicted: 0,
            lats,
        })
    }

    pub fn record(&mut self, lat: Duration, stats: SweepStats) {
        self.passes += 1;
        self.evicted += stats.evicted as u64;
        let lat = u64::try_from(lat.as_micros()).unwrap_or(u64::MAX);
        if let Err(e) = self.lats.record(lat) {
            tracing::error!("metrics error: {:?}, value: {}", e, lat);
        }
    }
}

#[derive(Debug)]
struct CleanerAnalysis {
    passes: u64,
    evicted: u64,
    p50: u64,
    p90: u64,
    p99: u64,
    max: u64,
}

#[derive(Debug)]
pub struct Analysis {
    variant: String,
    elapsed: Duration,
    clients: Vec<ClientReport>,
    references: u64,
    cleans: u64,
    throughput: f64,
    cleaner: Option<CleanerAnalysis>,
    metrics: MetricsSnapshot,
    resident: usize,
}

pub fn analyze(
    elapsed: Duration,
    clients: &[ClientReport],
    cleaner: Option<&CleanerReport>,
    cache: &Cache,
) -> Analysis {
    let references = clients.iter().map(|c| c.references).sum::<u64>();
    let cleans = clients.iter().map(|c| c.cleans).sum::<u64>() + cleaner.map(|c| c.passes).unwrap_or_default();

    let secs = elapsed.as_secs_f64();
    let throughput = if secs > 0.0 {
        (references + cleans) as f64 / secs
    } else {
        0.0
    };

    let cleaner = cleaner.map(|c| CleanerAnalysis {
        passes: c.passes,
        evicted: c.evicted,
        p50: c.lats.value_at_quantile(0.5),
        p90: c.lats.value_at_quantile(0.9),
        p99: c.lats.value_at_quantile(0.99),
        max: c.lats.max(),
    });

    Analysis {
        variant: format!("{cache:?}"),
        elapsed,
        clients: clients.to_vec(),
        references,
        cleans,
        throughput,
        cleaner,
        metrics: cache.metrics(),
        resident: cache.len(),
    }
}

impl Display for Analysis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "variant: {}", self.variant)?;
        writeln!(f, "elapsed: {:.3?}", self.elapsed)?;
        writeln!(
            f,
            "clients: [{}]",
            self.clients
                .iter()
                .map(|c| format!("{}+{}", c.references, c.cleans))
                .join(", ")
        )?;
        writeln!(f, "references: {}", self.references)?;
        writeln!(f, "cleans: {}", self.cleans)?;
        writeln!(f, "throughput: {:.0} ops/s", self.throughput)?;
        if let Some(cleaner) = &self.cleaner {
            writeln!(f, "cleaner passes: {}", cleaner.passes)?;
            writeln!(f, "cleaner evicted: {}", cleaner.evicted)?;
            writeln!(
                f,
                "blocking clean lat p50: {}us, p90: {}us, p99: {}us, max: {}us",
                cleaner.p50, cleaner.p90, cleaner.p99, cleaner.max
            )?;
        }
        writeln!(f, "{}", self.metrics)?;
        write!(f, "resident entries: {}", self.resident)
    }
}

#[cfg(test)]
mod tests {
    use lrusim_memory::CacheBuilder;

    use super::*;

    #[test]
    fn test_analyze_totals() {
        let cache = CacheBuilder::new(2).build().unwrap();
        cache.reference(1).unwrap();

        let mut cleaner = CleanerReport::new().unwrap();
        cleaner.record(
            Duration::from_micros(10),
            SweepStats {
                visited: 1,
                evicted: 1,
                decayed: 0,
            },
        );
        let clients = [
            ClientReport {
                references: 100,
                cleans: 1,
            },
            ClientReport {
                references: 50,
                cleans: 0,
            },
        ];

        let analysis = analyze(Duration::from_secs(2), &clients, Some(&cleaner), &cache);
        assert_eq!(analysis.references, 150);
        assert_eq!(analysis.cleans, 2);
        assert_eq!(analysis.throughput, 76.0);
        assert_eq!(analysis.resident, 1);

        let text = analysis.to_string();
        assert!(text.contains("clients: [100+1, 50+0]"));
        assert!(text.contains("cleaner passes: 1"));
    }

    #[test]
    fn test_cleaner_report_out_of_range_latency() {
        let mut cleaner = CleanerReport::new().unwrap();
        cleaner.record(Duration::MAX, SweepStats::default());
        cleaner.record(Duration::from_micros(MAX_LATENCY_US * 2), SweepStats::default());
        assert_eq!(cleaner.passes, 2);
        assert_eq!(cleaner.lats.len(), 0);

        cleaner.record(Duration::from_micros(MAX_LATENCY_US), SweepStats::default());
        assert_eq!(cleaner.lats.len(), 1);
    }
}
