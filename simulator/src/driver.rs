use rand::Rng;
use rand_chacha::ChaCha8Rng;
use sql_reuse::{ReuseCache, StatementLog};

use crate::args::SimConfig;
use crate::fake::{FakeClock, FakeCommand, FakeHandle, FakeRenderer, FakeSession};
use crate::logging::EventLog;
use crate::model::{Model, Op};
use crate::oracle::Oracle;

/// Everything one simulated session owns.
struct World {
    clock: FakeClock,
    session: FakeSession,
    renderer: FakeRenderer,
    cache: ReuseCache<FakeHandle>,
    model: Model,
}

impl World {
    fn new(config: &SimConfig) -> Self {
        let clock = FakeClock::default();
        Self {
            session: FakeSession::new(clock.clone(), config.budget_ms),
            clock,
            renderer: FakeRenderer::default(),
            cache: ReuseCache::new(),
            model: Model::default(),
        }
    }

    /// Apply one op and check it. `Ok` carries a short label for the event log.
    fn apply(&mut self, op: &Op) -> Result<String, String> {
        match *op {
            Op::Acquire { text, value } => {
                let sql = FakeRenderer::render(text);
                let statement_id = format!("sim.{text}");
                let log = StatementLog::new(&statement_id);
                let command = FakeCommand { text, value };
                let handle = self
                    .cache
                    .acquire(&mut self.session, &self.renderer, &command, &log)
                    .map_err(|err| format!("acquire {statement_id} failed: {err}"))?;
                Oracle::check_acquire(
                    &mut self.model,
                    &sql,
                    value,
                    handle,
                    &self.session,
                    self.renderer.prepared(),
                )?;
                Ok(format!("handle={} conn={}", handle.id, handle.conn.id))
            }
            Op::DropConnection => {
                self.session.drop_connection();
                Ok("dropped".to_string())
            }
            Op::Flush { rollback } => {
                self.renderer.closed_ids.borrow_mut().clear();
                let results = self.cache.flush_all(rollback);
                let closed = self.renderer.closed_ids.borrow().clone();
                let count = closed.len();
                Oracle::check_flush(&mut self.model, closed, results.len(), self.cache.len())?;
                Ok(format!("closed={count}"))
            }
            Op::Tick(ms) => {
                self.clock.advance(ms);
                Ok(format!("now={}ms", self.clock.now_ms()))
            }
        }
    }
}

pub(crate) fn run(config: SimConfig, rng: &mut ChaCha8Rng) {
    let mut world = World::new(&config);
    let mut events = EventLog::new(config.first_steps, config.tail_steps);

    for step in 0..config.iterations {
        let op = next_op(&config, rng);
        match world.apply(&op) {
            Ok(label) => events.record(format!("step={step} op={op:?} {label}")),
            Err(reason) => {
                events.record(format!("step={step} op={op:?} FAILED"));
                events.dump_failure(&reason);
                std::process::exit(1);
            }
        }

        if let Err(reason) = Oracle::check_size(&world.model, world.cache.len()) {
            events.dump_failure(&reason);
            std::process::exit(1);
        }
    }

    let stats = world.cache.stats();
    let stats_json = serde_json::to_string(&stats).unwrap_or_else(|_| "{}".to_string());
    tracing::info!(
        "complete: steps={} time={}ms connections={} prepared={} closed={} hit_rate={:.3} stats={}",
        config.iterations,
        world.clock.now_ms(),
        world.session.opened,
        world.model.prepared,
        world.model.closed,
        stats.hit_rate(),
        stats_json
    );
}

fn next_op(config: &SimConfig, rng: &mut ChaCha8Rng) -> Op {
    let weights = [
        (OpKind::Acquire, 1.0),
        (OpKind::DropConnection, config.close_rate),
        (OpKind::Flush, config.flush_rate),
        (OpKind::Tick, config.tick_rate),
    ];
    match choose_weighted(&weights, rng) {
        OpKind::Acquire => Op::Acquire {
            text: rng.random_range(0..config.texts),
            value: rng.random_range(-1000..=1000),
        },
        OpKind::DropConnection => Op::DropConnection,
        OpKind::Flush => Op::Flush {
            rollback: rng.random::<bool>(),
        },
        OpKind::Tick => Op::Tick(rng.random_range(1..=250)),
    }
}

#[derive(Debug, Clone, Copy)]
enum OpKind {
    Acquire,
    DropConnection,
    Flush,
    Tick,
}

fn choose_weighted(items: &[(OpKind, f64)], rng: &mut ChaCha8Rng) -> OpKind {
    let total: f64 = items.iter().map(|(_, weight)| weight.max(0.0)).sum();
    let mut target = rng.random::<f64>() * total;
    for (kind, weight) in items {
        let w = weight.max(0.0);
        if target <= w {
            return *kind;
        }
        target -= w;
    }
    OpKind::Acquire
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn config() -> SimConfig {
        SimConfig {
            iterations: 2_000,
            seed: 11,
            texts: 4,
            budget_ms: 5_000,
            close_rate: 0.05,
            flush_rate: 0.05,
            tick_rate: 0.2,
            log: None,
            preset: None,
            first_steps: 5,
            tail_steps: 5,
        }
    }

    #[test]
    fn seeded_workload_holds_every_invariant() {
        let config = config();
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let mut world = World::new(&config);
        for _ in 0..config.iterations {
            let op = next_op(&config, &mut rng);
            assert!(world.apply(&op).is_ok(), "{op:?}");
            assert!(Oracle::check_size(&world.model, world.cache.len()).is_ok());
        }
        assert!(world.cache.stats().hits > 0);
    }

    #[test]
    fn dropped_connection_forces_a_new_prepare() {
        let config = config();
        let mut world = World::new(&config);
        let acquire = Op::Acquire { text: 1, value: 3 };
        assert!(world.apply(&acquire).is_ok());
        assert!(world.apply(&Op::DropConnection).is_ok());
        assert!(world.apply(&acquire).is_ok());
        assert_eq!(world.renderer.prepared(), 2);
        assert_eq!(world.session.opened, 2);
        assert_eq!(world.cache.stats().stale_evictions, 1);
    }

    #[test]
    fn same_seed_replays_same_ops() {
        let config = config();
        let mut a = ChaCha8Rng::seed_from_u64(3);
        let mut b = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..100 {
            assert_eq!(
                format!("{:?}", next_op(&config, &mut a)),
                format!("{:?}", next_op(&config, &mut b))
            );
        }
    }
}
