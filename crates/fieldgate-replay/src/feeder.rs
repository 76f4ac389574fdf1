use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fieldgate_domain::{CinProducer, SensorRow};

/// How a tick value maps onto a row index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexPolicy {
    /// Cycle through the rows indefinitely: `tick % len`.
    Loop,
    /// Advance once per tick and hold the final row: `min(tick, len - 1)`.
    Clamp,
}

impl IndexPolicy {
    pub fn select(&self, tick: u64, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let len = len as u64;
        let idx = match self {
            IndexPolicy::Loop => tick % len,
            IndexPolicy::Clamp => tick.min(len - 1),
        };
        Some(idx as usize)
    }
}

/// Replays immutable row lists on a fixed period.
///
/// All sources share a single tick counter, so playback advances in
/// lock-step across sources even when their row counts differ.
pub struct ScheduledFeeder {
    sources: Vec<(u32, Vec<SensorRow>)>,
    tick: AtomicU64,
    policy: IndexPolicy,
    producer: Arc<dyn CinProducer>,
}

impl ScheduledFeeder {
    pub fn new(
        producer: Arc<dyn CinProducer>,
        policy: IndexPolicy,
        sources: Vec<(u32, Vec<SensorRow>)>,
    ) -> Self {
        let sizes: Vec<(u32, usize)> = sources.iter().map(|(no, rows)| (*no, rows.len())).collect();
        info!(sources = ?sizes, policy = ?policy, "Scheduled feeder ready");
        if sources.iter().all(|(_, rows)| rows.is_empty()) {
            warn!("No replay rows to feed, check the configured file paths");
        }

        Self {
            sources,
            tick: AtomicU64::new(0),
            policy,
            producer,
        }
    }

    /// Publishes one row per non-empty source at the current tick.
    /// Returns the number of rows actually published; one source's
    /// failure never prevents the others from being attempted.
    pub async fn tick(&self) -> usize {
        let tick = self.tick.fetch_add(1, Ordering::SeqCst);
        let mut sent = 0;

        for (sensor_no, rows) in &self.sources {
            let Some(idx) = self.policy.select(tick, rows.len()) else {
                continue;
            };
            match self
                .producer
                .publish_row(*sensor_no, rows[idx].fields.clone())
                .await
            {
                Ok(()) => sent += 1,
                Err(e) => warn!(
                    sensor_no = sensor_no,
                    tick = tick,
                    error = %e,
                    "Replay publish failed"
                ),
            }
        }

        if sent > 0 {
            debug!(tick = tick, sent = sent, "Replay tick");
        }
        sent
    }

    /// Drives ticks on the configured period after an initial delay,
    /// until cancelled.
    pub async fn run(
        &self,
        rate: Duration,
        initial_delay: Duration,
        token: CancellationToken,
    ) -> anyhow::Result<()> {
        tokio::select! {
            _ = token.cancelled() => return Ok(()),
            _ = tokio::time::sleep(initial_delay) => {}
        }

        let mut interval = tokio::time::interval(rate);
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("Scheduled feeder stopped");
                    return Ok(());
                }
                _ = interval.tick() => {
                    self.tick().await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldgate_domain::MockCinProducer;
    use serde_json::{Map, Value};

    fn row(temp: f64) -> SensorRow {
        let mut fields = Map::new();
        fields.insert("temp".to_string(), Value::from(temp));
        SensorRow::new(fields)
    }

    #[test]
    fn test_loop_policy_wraps() {
        let policy = IndexPolicy::Loop;
        assert_eq!(policy.select(0, 2), Some(0));
        assert_eq!(policy.select(1, 2), Some(1));
        assert_eq!(policy.select(2, 2), Some(0));
        assert_eq!(policy.select(7, 3), Some(1));
    }

    #[test]
    fn test_clamp_policy_holds_last_row() {
        let policy = IndexPolicy::Clamp;
        assert_eq!(policy.select(0, 2), Some(0));
        assert_eq!(policy.select(1, 2), Some(1));
        assert_eq!(policy.select(5, 2), Some(1));
        assert_eq!(policy.select(u64::MAX, 2), Some(1));
    }

    #[test]
    fn test_empty_rows_select_nothing() {
        assert_eq!(IndexPolicy::Loop.select(3, 0), None);
        assert_eq!(IndexPolicy::Clamp.select(3, 0), None);
    }

    #[tokio::test]
    async fn test_loop_mode_replays_first_row_at_tick_two() {
        let mut producer = MockCinProducer::new();
        let mut seq = mockall::Sequence::new();
        for expected in [21.34, 22.0, 21.34] {
            producer
                .expect_publish_row()
                .withf(move |no, fields| {
                    *no == 1 && fields.get("temp").and_then(Value::as_f64) == Some(expected)
                })
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_, _| Ok(()));
        }

        let feeder = ScheduledFeeder::new(
            Arc::new(producer),
            IndexPolicy::Loop,
            vec![(1, vec![row(21.34), row(22.0)])],
        );
        for _ in 0..3 {
            assert_eq!(feeder.tick().await, 1);
        }
    }

    #[tokio::test]
    async fn test_clamp_mode_holds_final_row() {
        let mut producer = MockCinProducer::new();
        producer
            .expect_publish_row()
            .withf(|_, fields| fields.get("temp").and_then(Value::as_f64) == Some(21.34))
            .times(1)
            .returning(|_, _| Ok(()));
        producer
            .expect_publish_row()
            .withf(|_, fields| fields.get("temp").and_then(Value::as_f64) == Some(22.0))
            .times(5)
            .returning(|_, _| Ok(()));

        let feeder = ScheduledFeeder::new(
            Arc::new(producer),
            IndexPolicy::Clamp,
            vec![(1, vec![row(21.34), row(22.0)])],
        );
        for _ in 0..6 {
            feeder.tick().await;
        }
    }

    #[tokio::test]
    async fn test_shared_tick_across_sources() {
        let mut producer = MockCinProducer::new();
        // Tick 0 hits index 0 of both sources despite different lengths.
        producer
            .expect_publish_row()
            .withf(|no, fields| {
                (*no == 1 && fields.get("temp").and_then(Value::as_f64) == Some(10.0))
                    || (*no == 2 && fields.get("temp").and_then(Value::as_f64) == Some(30.0))
            })
            .times(2)
            .returning(|_, _| Ok(()));

        let feeder = ScheduledFeeder::new(
            Arc::new(producer),
            IndexPolicy::Loop,
            vec![
                (1, vec![row(10.0), row(11.0), row(12.0)]),
                (2, vec![row(30.0)]),
            ],
        );
        assert_eq!(feeder.tick().await, 2);
    }

    #[tokio::test]
    async fn test_empty_source_skipped_silently() {
        let mut producer = MockCinProducer::new();
        producer
            .expect_publish_row()
            .withf(|no, _| *no == 2)
            .times(1)
            .returning(|_, _| Ok(()));

        let feeder = ScheduledFeeder::new(
            Arc::new(producer),
            IndexPolicy::Loop,
            vec![(1, vec![]), (2, vec![row(20.0)])],
        );
        assert_eq!(feeder.tick().await, 1);
    }

    #[tokio::test]
    async fn test_one_failing_source_does_not_block_others() {
        let mut producer = MockCinProducer::new();
        producer
            .expect_publish_row()
            .withf(|no, _| *no == 1)
            .times(2)
            .returning(|_, _| Err(fieldgate_domain::DomainError::Parse("boom".into())));
        producer
            .expect_publish_row()
            .withf(|no, _| *no == 2)
            .times(2)
            .returning(|_, _| Ok(()));

        let feeder = ScheduledFeeder::new(
            Arc::new(producer),
            IndexPolicy::Loop,
            vec![(1, vec![row(10.0)]), (2, vec![row(20.0)])],
        );
        // Failure in source 1 neither skips source 2 nor poisons the next tick.
        assert_eq!(feeder.tick().await, 1);
        assert_eq!(feeder.tick().await, 1);
    }
}
