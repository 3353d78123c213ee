//! Context-switch benchmark driver.
//!
//! Drives each engine through a two-party ping-pong entirely via the
//! public surface: two workers share one counter, each bumps it once per
//! turn, and the loop runs until the configured switch count is reached.
//! Reports mean/min/max nanoseconds per switch over several samples and
//! persists them as key=value lines, one file per engine.
//!
//! Usage: `bench [stackless|stackful|both] [switches]`

use std::cell::Cell;
use std::fs;
use std::io;
use std::path::Path;
use std::rc::Rc;
use std::time::Instant;

use coropool::{Resume, StackfulEngine, StacklessEngine};

const NUM_SWITCHES: u64 = 10_000_000;
const WARMUP_SWITCHES: u64 = 100_000;
const NUM_SAMPLES: usize = 10;

/// Drives one ping-pong run to `target` and returns the elapsed time of
/// the switching loop. The workers finish once the counter reaches their
/// own target, so the pair is created fresh per run and destroyed here;
/// reusing a pair for a second run with a higher target would spin forever
/// on finished coroutines.
fn ping_pong_stackless(
    engine: &mut StacklessEngine,
    counter: &Rc<Cell<u64>>,
    target: u64,
) -> std::time::Duration {
    let mut worker = |counter: Rc<Cell<u64>>| {
        engine
            .create(move |cx| {
                if counter.get() >= target {
                    cx.finish();
                    return;
                }
                counter.set(counter.get() + 1);
                cx.yield_at(0);
            })
            .unwrap()
    };
    let ping = worker(counter.clone());
    let pong = worker(counter.clone());

    counter.set(0);
    let start = Instant::now();
    while counter.get() < target {
        engine.resume(ping).unwrap();
        engine.resume(pong).unwrap();
    }
    let elapsed = start.elapsed();

    assert_eq!(engine.resume(ping).unwrap(), Resume::Finished);
    assert_eq!(engine.resume(pong).unwrap(), Resume::Finished);
    engine.destroy(ping);
    engine.destroy(pong);
    elapsed
}

fn ping_pong_stackful(
    engine: &mut StackfulEngine,
    counter: &Rc<Cell<u64>>,
    target: u64,
) -> std::time::Duration {
    let mut worker = |counter: Rc<Cell<u64>>| {
        engine
            .create(move |yielder| {
                while counter.get() < target {
                    counter.set(counter.get() + 1);
                    yielder.suspend();
                }
            })
            .unwrap()
    };
    let ping = worker(counter.clone());
    let pong = worker(counter.clone());

    counter.set(0);
    let start = Instant::now();
    while counter.get() < target {
        engine.resume(ping).unwrap();
        engine.resume(pong).unwrap();
    }
    let elapsed = start.elapsed();

    // run both off their loops so destroy reclaims finished coroutines
    assert_eq!(engine.resume(ping).unwrap(), Resume::Finished);
    assert_eq!(engine.resume(pong).unwrap(), Resume::Finished);
    engine.destroy(ping);
    engine.destroy(pong);
    elapsed
}

/// One sample: fresh engine, a warmup run, then a timed run of `switches`
/// turns. Returns nanoseconds per switch. The warmup target is capped at
/// `switches` so small overrides terminate.
fn sample_stackless(switches: u64) -> f64 {
    let counter = Rc::new(Cell::new(0u64));
    let mut engine = StacklessEngine::new();

    ping_pong_stackless(&mut engine, &counter, WARMUP_SWITCHES.min(switches));
    let elapsed = ping_pong_stackless(&mut engine, &counter, switches);
    engine.cleanup();

    elapsed.as_nanos() as f64 / switches as f64
}

fn sample_stackful(switches: u64) -> f64 {
    let counter = Rc::new(Cell::new(0u64));
    let mut engine = StackfulEngine::new();

    ping_pong_stackful(&mut engine, &counter, WARMUP_SWITCHES.min(switches));
    let elapsed = ping_pong_stackful(&mut engine, &counter, switches);
    engine.cleanup();

    elapsed.as_nanos() as f64 / switches as f64
}

fn stats(samples: &[f64]) -> (f64, f64, f64) {
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    let min = samples.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    (mean, min, max)
}

fn write_results(path: &Path, mean: f64, min: f64, max: f64) -> io::Result<()> {
    fs::write(path, format!("mean={mean:.2}\nmin={min:.2}\nmax={max:.2}\n"))
}

fn run_engine(name: &str, switches: u64, sample: impl Fn(u64) -> f64) {
    println!("Running {name} benchmark...");
    let samples: Vec<f64> = (0..NUM_SAMPLES)
        .map(|i| {
            let ns = sample(switches);
            println!("  sample {}: {ns:.2} ns/switch", i + 1);
            ns
        })
        .collect();

    let (mean, min, max) = stats(&samples);
    println!("\n{name} results:");
    println!("  mean: {mean:.2} ns/switch");
    println!("  min:  {min:.2} ns/switch");
    println!("  max:  {max:.2} ns/switch");

    let path = format!("{name}_results.txt");
    match write_results(Path::new(&path), mean, min, max) {
        Ok(()) => println!("results saved to {path}\n"),
        Err(err) => eprintln!("failed to save {path}: {err}\n"),
    }
}

fn main() {
    env_logger::init();

    let which = std::env::args().nth(1).unwrap_or_else(|| "both".to_owned());
    let switches = std::env::args()
        .nth(2)
        .map(|arg| arg.parse().expect("switch count must be an integer"))
        .unwrap_or(NUM_SWITCHES);

    println!("=======================================================");
    println!("  Coroutine context-switch benchmark");
    println!("=======================================================");
    println!("switches per sample: {switches}");
    println!("samples per engine:  {NUM_SAMPLES}");
    println!("-------------------------------------------------------\n");

    if which == "stackless" || which == "both" {
        run_engine("stackless", switches, sample_stackless);
    }
    if which == "stackful" || which == "both" {
        run_engine("stackful", switches, sample_stackful);
    }
}
