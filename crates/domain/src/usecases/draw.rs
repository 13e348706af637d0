//! Draw engine - timed rolling animation followed by an independent final pick
//!
//! State machine: `Idle -> Rolling -> Settled -> Idle`. The rolling candidate
//! is a presentation signal only; the committed pick is sampled separately
//! once the rolling duration elapses. `Settled` keeps the last winner on
//! display until it is acknowledged or the next roll begins.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior, interval};

use crate::model::CanonicalComment;

/// Configuration for the draw engine
#[derive(Debug, Clone)]
pub struct DrawConfig {
    /// How long the rolling animation runs before settling
    pub rolling_duration: Duration,
    /// Interval between rolling candidate updates
    pub tick_interval: Duration,
    /// Fixed RNG seed for reproducible draws
    pub seed: Option<u64>,
}

impl Default for DrawConfig {
    fn default() -> Self {
        Self {
            rolling_duration: Duration::from_secs(3),
            tick_interval: Duration::from_millis(50),
            seed: None,
        }
    }
}

/// Observable state of the engine
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DrawPhase {
    #[default]
    Idle,
    Rolling {
        candidate: Option<CanonicalComment>,
    },
    Settled {
        winner: CanonicalComment,
    },
}

impl DrawPhase {
    pub fn is_rolling(&self) -> bool {
        matches!(self, DrawPhase::Rolling { .. })
    }

    /// True when a new roll may start
    pub fn is_ready(&self) -> bool {
        !self.is_rolling()
    }
}

/// How a single roll ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawOutcome {
    Settled(CanonicalComment),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DrawError {
    #[error("No eligible candidates to draw from")]
    EmptyPool,
}

/// Cloneable control surface: observe the phase, cancel a roll
#[derive(Clone)]
pub struct DrawHandle {
    phase: Arc<watch::Sender<DrawPhase>>,
    cancel: Arc<watch::Sender<u64>>,
}

impl DrawHandle {
    /// Cancel the in-flight roll, if any. Nothing is committed.
    pub fn cancel(&self) {
        self.cancel.send_modify(|epoch| *epoch = epoch.wrapping_add(1));
        self.phase.send_if_modified(|phase| {
            if phase.is_rolling() {
                *phase = DrawPhase::Idle;
                true
            } else {
                false
            }
        });
    }

    /// Dismiss a settled result, returning to `Idle`. No-op in other phases.
    pub fn acknowledge(&self) {
        self.phase.send_if_modified(|phase| {
            if matches!(phase, DrawPhase::Settled { .. }) {
                *phase = DrawPhase::Idle;
                true
            } else {
                false
            }
        });
    }

    /// Subscribe to phase changes, including every rolling candidate
    pub fn subscribe(&self) -> watch::Receiver<DrawPhase> {
        self.phase.subscribe()
    }

    pub fn phase(&self) -> DrawPhase {
        self.phase.borrow().clone()
    }

    /// Current cancel epoch; a roll started at one epoch is void once it moves
    pub fn epoch(&self) -> u64 {
        *self.cancel.borrow()
    }
}

/// Runs rolls over an eligible pool
pub struct DrawEngine {
    config: DrawConfig,
    handle: DrawHandle,
    rng: Mutex<StdRng>,
}

impl DrawEngine {
    pub fn new(config: DrawConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let (phase, _) = watch::channel(DrawPhase::Idle);
        let (cancel, _) = watch::channel(0u64);

        Self {
            config,
            handle: DrawHandle {
                phase: Arc::new(phase),
                cancel: Arc::new(cancel),
            },
            rng: Mutex::new(rng),
        }
    }

    pub fn config(&self) -> &DrawConfig {
        &self.config
    }

    pub fn handle(&self) -> DrawHandle {
        self.handle.clone()
    }

    pub fn phase(&self) -> DrawPhase {
        self.handle.phase()
    }

    /// Return to `Idle`, cancelling any roll in flight
    pub fn reset(&self) {
        self.handle.cancel();
        self.handle.phase.send_replace(DrawPhase::Idle);
    }

    /// Roll over `pool` and settle on one candidate
    pub async fn roll(&self, pool: &[CanonicalComment]) -> Result<DrawOutcome, DrawError> {
        let epoch = self.handle.epoch();
        self.roll_in_epoch(pool, epoch).await
    }

    /// Like [`roll`](Self::roll), but void if the cancel epoch has already
    /// moved past `epoch`
    pub async fn roll_in_epoch(
        &self,
        pool: &[CanonicalComment],
        epoch: u64,
    ) -> Result<DrawOutcome, DrawError> {
        if pool.is_empty() {
            return Err(DrawError::EmptyPool);
        }

        let mut cancelled = self.handle.cancel.subscribe();
        if *cancelled.borrow_and_update() != epoch {
            return Ok(DrawOutcome::Cancelled);
        }

        self.handle.acknowledge();

        self.handle
            .phase
            .send_replace(DrawPhase::Rolling { candidate: None });
        tracing::debug!(pool = pool.len(), "Rolling started");

        let deadline = Instant::now() + self.config.rolling_duration;
        let mut ticker = interval(self.config.tick_interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancelled.changed() => {
                    tracing::debug!("Rolling cancelled");
                    self.handle.phase.send_replace(DrawPhase::Idle);
                    return Ok(DrawOutcome::Cancelled);
                }
                _ = ticker.tick() => {}
            }

            if Instant::now() >= deadline {
                break;
            }

            let candidate = pool[self.sample(pool.len())].clone();
            self.handle.phase.send_replace(DrawPhase::Rolling {
                candidate: Some(candidate),
            });
        }

        let winner = pool[self.sample(pool.len())].clone();
        tracing::debug!(comment_id = %winner.comment_id, "Rolling settled");
        self.handle.phase.send_replace(DrawPhase::Settled {
            winner: winner.clone(),
        });

        Ok(DrawOutcome::Settled(winner))
    }

    fn sample(&self, len: usize) -> usize {
        let mut rng = match self.rng.lock() {
            Ok(rng) => rng,
            Err(poisoned) => poisoned.into_inner(),
        };
        rng.random_range(0..len)
    }
}

impl Default for DrawEngine {
    fn default() -> Self {
        Self::new(DrawConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(n: usize) -> Vec<CanonicalComment> {
        (0..n)
            .map(|i| CanonicalComment {
                comment_id: i.to_string(),
                author_id: format!("u{}", i),
                author_name: format!("user {}", i),
                avatar_url: String::new(),
                text: "接好运".to_string(),
                level: 3,
                created_at: 0,
                likes: 0,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_pool_refuses_to_start() {
        let engine = DrawEngine::default();
        assert_eq!(engine.roll(&[]).await, Err(DrawError::EmptyPool));
        assert_eq!(engine.phase(), DrawPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_roll_settles_on_pool_member() {
        let engine = DrawEngine::default();
        let pool = pool(5);

        let outcome = engine.roll(&pool).await.unwrap();

        let DrawOutcome::Settled(winner) = outcome else {
            panic!("expected a settled draw");
        };
        assert!(pool.contains(&winner));
        assert_eq!(engine.phase(), DrawPhase::Settled { winner });
    }

    #[tokio::test(start_paused = true)]
    async fn test_rolling_publishes_candidates() {
        let engine = Arc::new(DrawEngine::default());
        let mut phases = engine.handle().subscribe();
        let pool = pool(3);

        let roller = {
            let engine = Arc::clone(&engine);
            let pool = pool.clone();
            tokio::spawn(async move { engine.roll(&pool).await })
        };

        let mut saw_candidate = false;
        while phases.changed().await.is_ok() {
            match phases.borrow_and_update().clone() {
                DrawPhase::Rolling {
                    candidate: Some(candidate),
                } => {
                    assert!(pool.contains(&candidate));
                    saw_candidate = true;
                }
                DrawPhase::Settled { .. } => break,
                _ => {}
            }
        }

        assert!(saw_candidate);
        assert!(matches!(
            roller.await.unwrap(),
            Ok(DrawOutcome::Settled(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_rolling_returns_to_idle() {
        let engine = Arc::new(DrawEngine::default());
        let handle = engine.handle();
        let pool = pool(4);

        let roller = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.roll(&pool).await })
        };

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(handle.phase().is_rolling());
        handle.cancel();

        assert_eq!(roller.await.unwrap(), Ok(DrawOutcome::Cancelled));
        assert_eq!(handle.phase(), DrawPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_epoch_is_cancelled_before_rolling() {
        let engine = DrawEngine::default();
        let epoch = engine.handle().epoch();
        engine.handle().cancel();

        let outcome = engine.roll_in_epoch(&pool(2), epoch).await.unwrap();

        assert_eq!(outcome, DrawOutcome::Cancelled);
        assert_eq!(engine.phase(), DrawPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settled_result_is_acknowledged_back_to_idle() {
        let engine = DrawEngine::default();
        let handle = engine.handle();

        engine.roll(&pool(3)).await.unwrap();
        assert!(matches!(handle.phase(), DrawPhase::Settled { .. }));
        assert!(handle.phase().is_ready());

        handle.acknowledge();
        assert_eq!(handle.phase(), DrawPhase::Idle);

        // idle and rolling phases are left alone
        handle.acknowledge();
        assert_eq!(handle.phase(), DrawPhase::Idle);
        assert!(!DrawPhase::Rolling { candidate: None }.is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn test_seeded_draws_repeat() {
        let config = DrawConfig {
            seed: Some(7),
            ..Default::default()
        };
        let pool = pool(50);

        let first = DrawEngine::new(config.clone()).roll(&pool).await.unwrap();
        let second = DrawEngine::new(config).roll(&pool).await.unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_sampling_covers_whole_range() {
        let engine = DrawEngine::new(DrawConfig {
            seed: Some(1),
            ..Default::default()
        });
        let mut hits = [0usize; 4];
        for _ in 0..4000 {
            hits[engine.sample(4)] += 1;
        }
        assert!(hits.iter().all(|&h| h > 800), "skewed sampling: {:?}", hits);
    }
}
