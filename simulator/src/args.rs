use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Deterministic statement reuse simulator")]
pub(crate) struct Args {
    #[arg(long)]
    pub(crate) iterations: Option<u64>,
    #[arg(long)]
    pub(crate) seed: Option<u64>,
    /// Number of distinct rendered statements the workload draws from.
    #[arg(long, default_value_t = 8)]
    pub(crate) texts: usize,
    /// Session budget, e.g. `30s` or `2m`.
    #[arg(long, value_parser = humantime::parse_duration, default_value = "30s")]
    pub(crate) budget: Duration,
    #[arg(long, default_value_t = 0.02)]
    pub(crate) close_rate: f64,
    #[arg(long, default_value_t = 0.03)]
    pub(crate) flush_rate: f64,
    #[arg(long, default_value_t = 0.10)]
    pub(crate) tick_rate: f64,
    #[arg(long)]
    pub(crate) log: Option<PathBuf>,
    #[arg(long)]
    pub(crate) quick: bool,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SimConfig {
    pub(crate) iterations: u64,
    pub(crate) seed: u64,
    pub(crate) texts: usize,
    pub(crate) budget_ms: u64,
    pub(crate) close_rate: f64,
    pub(crate) flush_rate: f64,
    pub(crate) tick_rate: f64,
    pub(crate) log: Option<PathBuf>,
    pub(crate) preset: Option<String>,
    pub(crate) first_steps: usize,
    pub(crate) tail_steps: usize,
}

impl SimConfig {
    pub(crate) fn from_args(args: Args) -> Self {
        let mut config = SimConfig {
            iterations: args.iterations.unwrap_or(100_000),
            seed: args.seed.unwrap_or_else(random_seed),
            texts: args.texts.max(1),
            budget_ms: u64::try_from(args.budget.as_millis()).unwrap_or(u64::MAX),
            close_rate: clamp_rate(args.close_rate),
            flush_rate: clamp_rate(args.flush_rate),
            tick_rate: clamp_rate(args.tick_rate),
            log: args.log,
            preset: None,
            first_steps: 30,
            tail_steps: 80,
        };

        if args.quick {
            config.apply_quick();
        }

        config
    }

    fn apply_quick(&mut self) {
        self.preset = Some("quick".to_string());
        self.iterations = 10_000;
        self.texts = 4;
        self.close_rate = 0.05;
        self.flush_rate = 0.05;
    }
}

fn clamp_rate(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

fn random_seed() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    now.as_secs() ^ u64::from(now.subsec_nanos())
}
