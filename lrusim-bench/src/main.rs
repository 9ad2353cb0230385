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

//! `lrusim-bench` drives an approximate LRU cache with concurrent accessor threads and reports
//! the throughput each locking strategy sustains.

mod analyze;

use std::{
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use analyze::{analyze, CleanerReport, ClientReport};
use anyhow::{anyhow, ensure, Context as _, Result};
use clap::{Parser, ValueEnum};
use lrusim_common::{
    key::{Key, DEFAULT_LOW_WATER_MARK, DEFAULT_MAX_KEY},
    stop::StopSignal,
};
use lrusim_memory::{Cache, CacheBuilder, CleanOutcome, DecayPolicy, StoreConfig};
use rand::{rngs::StdRng, Rng, SeedableRng};

#[cfg(all(feature = "jemalloc", not(target_env = "msvc")))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "LRU simulator")]
struct Args {
    /// Accessor thread count. More than one also spawns a dedicated cleaner thread.
    #[arg(short = 'c', long, value_name = "NUMCLIENTS", default_value_t = 1)]
    clients: usize,

    /// Simulation length. (s)
    #[arg(short = 'l', long, default_value_t = 30)]
    length: u64,

    /// Fix the key generator seeds. Accessor `i` is seeded with `seed + i`.
    #[arg(short = 's', long)]
    seed: Option<u64>,

    /// Locking strategy of the entry store.
    #[arg(long, value_enum, default_value_t = Variant::Sharded)]
    variant: Variant,

    /// Shard count of the sharded store. `0` means derive it from the client count.
    #[arg(long, default_value_t = 0)]
    shards: usize,

    /// Keys are drawn from `[0, max_key)`.
    #[arg(long, default_value_t = DEFAULT_MAX_KEY)]
    max_key: Key,

    /// The dedicated cleaner waits until the cache holds more entries than this.
    #[arg(long, default_value_t = DEFAULT_LOW_WATER_MARK)]
    low_water_mark: usize,

    /// References between two cleans issued by the accessors themselves.
    ///
    /// Only used without a dedicated cleaner.
    #[arg(long, default_value_t = 64)]
    clean_ratio: u64,

    /// Decay rule of eviction passes.
    #[arg(long, value_enum, default_value_t = Decay::Reset)]
    decay: Decay,

    /// Print the cache contents at the end of the run.
    #[arg(long, default_value_t = false)]
    dump: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Variant {
    Mutex,
    Sharded,
    Atomic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Decay {
    Reset,
    Decrement,
}

impl From<Decay> for DecayPolicy {
    fn from(decay: Decay) -> Self {
        match decay {
            Decay::Reset => DecayPolicy::Reset,
            Decay::Decrement => DecayPolicy::Decrement,
        }
    }
}

impl Args {
    fn store_config(&self) -> StoreConfig {
        match self.variant {
            Variant::Mutex => StoreConfig::Mutex,
            Variant::Sharded => StoreConfig::Sharded {
                shards: (self.shards > 0).then_some(self.shards),
            },
            Variant::Atomic => StoreConfig::Atomic,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Context {
    max_key: Key,
    clean_ratio: u64,
    dedicated_cleaner: bool,
}

fn init_logger() {
    use tracing_subscriber::{prelude::*, EnvFilter};

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_line_number(true))
        .with(EnvFilter::from_default_env())
        .init();
}

fn main() -> Result<()> {
    init_logger();

    #[cfg(feature = "deadlock")]
    {
        std::thread::spawn(move || loop {
            std::thread::sleep(Duration::from_secs(1));
            let deadlocks = parking_lot::deadlock::check_deadlock();
            if deadlocks.is_empty() {
                continue;
            }

            println!("{} deadlocks detected", deadlocks.len());
            for (i, threads) in deadlocks.iter().enumerate() {
                println!("Deadlock #{}", i);
                for t in threads {
                    println!("Thread Id {:#?}", t.thread_id());
                    println!("{:#?}", t.backtrace());
                }
            }
            panic!()
        });
    }

    let args = Args::parse();
    println!("{:#?}", args);
    ensure!(args.clients > 0, "\"--clients\" value must be greater than 0");
    ensure!(args.clean_ratio > 0, "\"--clean-ratio\" value must be greater than 0");

    let cache = CacheBuilder::new(args.clients)
        .with_max_key(args.max_key)
        .with_low_water_mark(args.low_water_mark)
        .with_decay_policy(args.decay.into())
        .with_store_config(args.store_config())
        .build()?;

    let context = Context {
        max_key: args.max_key,
        clean_ratio: args.clean_ratio,
        dedicated_cleaner: args.clients > 1,
    };
    let stop = StopSignal::new();

    let start = Instant::now();
    let (clients, cleaner) = match spawn_all(&args, context, &cache, &stop) {
        Ok(handles) => handles,
        Err(e) => {
            stop.stop();
            cache.shutdown();
            return Err(e);
        }
    };
    tracing::info!(
        clients = args.clients,
        dedicated_cleaner = context.dedicated_cleaner,
        "[lrusim-bench]: started"
    );

    if stop.wait_timeout(Duration::from_secs(args.length)) {
        tracing::warn!("[lrusim-bench]: stopped before the configured length");
    }
    stop.stop();
    // Release the cleaner if it is parked in the watermark gate.
    cache.shutdown();

    let clients = clients.into_iter().map(join).collect::<Vec<_>>();
    let cleaner = cleaner.map(join).transpose();
    let elapsed = start.elapsed();

    let clients = clients.into_iter().collect::<Result<Vec<_>>>()?;
    let cleaner = cleaner?;

    let analysis = analyze(elapsed, &clients, cleaner.as_ref(), &cache);
    println!("\nTotal:\n{}", analysis);

    if args.dump {
        println!("\n{}", cache.snapshot());
    }

    Ok(())
}

type ClientHandle = JoinHandle<Result<ClientReport>>;
type CleanerHandle = JoinHandle<Result<CleanerReport>>;

fn spawn_all(
    args: &Args,
    context: Context,
    cache: &Cache,
    stop: &StopSignal,
) -> Result<(Vec<ClientHandle>, Option<CleanerHandle>)> {
    let cleaner = if context.dedicated_cleaner {
        let cache = cache.clone();
        let stop = stop.clone();
        let handle = thread::Builder::new()
            .name("lrusim-cleaner".to_string())
            .spawn(move || clean(cache, stop))
            .context("cleaner thread creation failed")?;
        Some(handle)
    } else {
        None
    };

    let clients = (0..args.clients)
        .map(|id| {
            let cache = cache.clone();
            let stop = stop.clone();
            let seed = args.seed.map(|seed| seed.wrapping_add(id as u64));
            thread::Builder::new()
                .name(format!("lrusim-client-{id}"))
                .spawn(move || access(id, seed, context, cache, stop))
                .with_context(|| format!("client thread {id} creation failed"))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok((clients, cleaner))
}

fn join<T>(handle: JoinHandle<Result<T>>) -> Result<T> {
    let name = handle.thread().name().unwrap_or("unnamed").to_string();
    handle.join().map_err(|_| anyhow!("thread {name} panicked"))?
}

fn access(id: usize, seed: Option<u64>, context: Context, cache: Cache, stop: StopSignal) -> Result<ClientReport> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    tracing::debug!(id, ?seed, "[client]: start");

    let mut report = ClientReport::default();
    while !stop.is_stopped() {
        let key = rng.random_range(0..context.max_key);
        if let Err(e) = cache.reference(key) {
            tracing::error!(id, key, "[client]: reference failed: {e}");
            stop.stop();
            return Err(e).with_context(|| format!("client {id} failed to reference key {key}"));
        }
        report.references += 1;

        if !context.dedicated_cleaner && report.references % context.clean_ratio == 0 {
            cache.clean(false);
            report.cleans += 1;
        }
    }
    Ok(report)
}

fn clean(cache: Cache, stop: StopSignal) -> Result<CleanerReport> {
    let mut report = CleanerReport::new()?;
    while !stop.is_stopped() {
        let start = Instant::now();
        match cache.clean(true) {
            CleanOutcome::Swept(stats) => report.record(start.elapsed(), stats),
            CleanOutcome::Aborted => break,
        }
    }
    tracing::debug!(passes = report.passes, "[cleaner]: exit");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_args_verify() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "lrusim-bench",
            "-c",
            "4",
            "-l",
            "1",
            "-s",
            "7",
            "--variant",
            "mutex",
        ])
        .unwrap();
        assert_eq!(args.clients, 4);
        assert_eq!(args.length, 1);
        assert_eq!(args.seed, Some(7));
        assert_eq!(args.store_config(), StoreConfig::Mutex);
        assert_eq!(DecayPolicy::from(args.decay), DecayPolicy::Reset);

        let args = Args::try_parse_from(["lrusim-bench", "--shards", "32"]).unwrap();
        assert_eq!(args.clients, 1);
        assert_eq!(args.length, 30);
        assert_eq!(args.store_config(), StoreConfig::Sharded { shards: Some(32) });

        let err = Args::try_parse_from(["lrusim-bench", "-x"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
        let err = Args::try_parse_from(["lrusim-bench", "-h"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_run_without_dedicated_cleaner() {
        let cache = CacheBuilder::new(1).with_max_key(64).build().unwrap();
        let stop = StopSignal::new();
        let context = Context {
            max_key: 64,
            clean_ratio: 8,
            dedicated_cleaner: false,
        };

        let handle = {
            let cache = cache.clone();
            let stop = stop.clone();
            thread::spawn(move || access(0, Some(1), context, cache, stop))
        };
        thread::sleep(Duration::from_millis(50));
        stop.stop();
        cache.shutdown();

        let report = handle.join().unwrap().unwrap();
        assert!(report.references > 0);
        assert_eq!(report.cleans, report.references / 8);
        assert!(cache.metrics().clean_pass >= report.cleans);
    }

    #[test]
    fn test_run_with_dedicated_cleaner() {
        let cache = CacheBuilder::new(4).with_max_key(128).build().unwrap();
        let stop = StopSignal::new();
        let context = Context {
            max_key: 128,
            clean_ratio: 64,
            dedicated_cleaner: true,
        };

        let cleaner = {
            let cache = cache.clone();
            let stop = stop.clone();
            thread::spawn(move || clean(cache, stop))
        };
        let clients = (0..4)
            .map(|id| {
                let cache = cache.clone();
                let stop = stop.clone();
                thread::spawn(move || access(id, Some(id as u64), context, cache, stop))
            })
            .collect::<Vec<_>>();

        thread::sleep(Duration::from_millis(100));
        stop.stop();
        cache.shutdown();

        for client in clients {
            let report = client.join().unwrap().unwrap();
            assert_eq!(report.cleans, 0);
        }
        cleaner.join().unwrap().unwrap();
    }
}
