// In-memory late-ack queue

use async_trait::async_trait;
use powq_core::domain::JobId;
use powq_core::error::Result;
use powq_core::port::{JobQueue, Reservation, TimeProvider};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Default)]
struct QueueState {
    ready: VecDeque<JobId>,
    /// (ready_at, job_id), kept sorted by ready_at
    delayed: Vec<(i64, JobId)>,
    in_flight: Vec<Reservation>,
}

impl QueueState {
    fn promote_due(&mut self, now: i64) {
        let due = self.delayed.partition_point(|(ready_at, _)| *ready_at <= now);
        for (_, job_id) in self.delayed.drain(..due) {
            self.ready.push_back(job_id);
        }
    }
}

pub struct InMemoryJobQueue {
    state: Mutex<QueueState>,
    time_provider: Arc<dyn TimeProvider>,
}

impl InMemoryJobQueue {
    pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            time_provider,
        }
    }

    /// Reservations not yet acknowledged
    pub async fn in_flight(&self) -> usize {
        self.state.lock().await.in_flight.len()
    }

    /// Entries parked for a later retry
    pub async fn delayed(&self) -> usize {
        self.state.lock().await.delayed.len()
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, job_id: &JobId) -> Result<()> {
        self.state.lock().await.ready.push_back(job_id.clone());
        Ok(())
    }

    async fn enqueue_delayed(&self, job_id: &JobId, ready_at: i64) -> Result<()> {
        let mut state = self.state.lock().await;
        let pos = state.delayed.partition_point(|(at, _)| *at <= ready_at);
        state.delayed.insert(pos, (ready_at, job_id.clone()));
        Ok(())
    }

    async fn reserve(&self) -> Result<Option<Reservation>> {
        let now = self.time_provider.now_millis();
        let mut state = self.state.lock().await;
        state.promote_due(now);

        let Some(job_id) = state.ready.pop_front() else {
            return Ok(None);
        };
        let reservation = Reservation {
            job_id,
            reserved_at: now,
        };
        state.in_flight.push(reservation.clone());
        Ok(Some(reservation))
    }

    async fn ack(&self, reservation: &Reservation) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(pos) = state.in_flight.iter().position(|r| r == reservation) {
            state.in_flight.remove(pos);
        } else {
            debug!(job_id = %reservation.job_id, "Ack for unknown reservation ignored");
        }
        Ok(())
    }

    async fn requeue_stale(&self, older_than: Duration) -> Result<Vec<JobId>> {
        let cutoff = self.time_provider.now_millis() - older_than.as_millis() as i64;
        let mut state = self.state.lock().await;

        let (stale, live): (Vec<_>, Vec<_>) = std::mem::take(&mut state.in_flight)
            .into_iter()
            .partition(|r| r.reserved_at <= cutoff);
        state.in_flight = live;

        // Oldest reservation ends up at the very head
        for reservation in stale.iter().rev() {
            state.ready.push_front(reservation.job_id.clone());
        }
        Ok(stale.into_iter().map(|r| r.job_id).collect())
    }

    async fn depth(&self) -> Result<usize> {
        Ok(self.state.lock().await.ready.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use powq_core::port::time_provider::mocks::ManualClock;

    fn queue() -> (Arc<ManualClock>, InMemoryJobQueue) {
        let clock = Arc::new(ManualClock::new(1_000));
        (clock.clone(), InMemoryJobQueue::new(clock))
    }

    #[tokio::test]
    async fn test_fifo_reserve_and_ack() {
        let (_, queue) = queue();
        for id in ["a", "b", "c"] {
            queue.enqueue(&id.to_string()).await.unwrap();
        }
        assert_eq!(queue.depth().await.unwrap(), 3);

        let first = queue.reserve().await.unwrap().unwrap();
        let second = queue.reserve().await.unwrap().unwrap();
        assert_eq!(first.job_id, "a");
        assert_eq!(second.job_id, "b");
        assert_eq!(queue.depth().await.unwrap(), 1);
        assert_eq!(queue.in_flight().await, 2);

        queue.ack(&first).await.unwrap();
        assert_eq!(queue.in_flight().await, 1);
    }

    #[tokio::test]
    async fn test_empty_queue_returns_none() {
        let (_, queue) = queue();
        assert!(queue.reserve().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delayed_entries_become_ready_when_due() {
        let (clock, queue) = queue();
        queue.enqueue_delayed(&"late".to_string(), 3_000).await.unwrap();
        queue.enqueue_delayed(&"early".to_string(), 2_000).await.unwrap();

        assert!(queue.reserve().await.unwrap().is_none());
        assert_eq!(queue.delayed().await, 2);

        clock.advance_millis(1_000);
        assert_eq!(queue.reserve().await.unwrap().unwrap().job_id, "early");
        assert!(queue.reserve().await.unwrap().is_none());

        clock.advance_millis(1_000);
        assert_eq!(queue.reserve().await.unwrap().unwrap().job_id, "late");
    }

    #[tokio::test]
    async fn test_unacked_reservations_are_redelivered_first() {
        let (clock, queue) = queue();
        queue.enqueue(&"orphan".to_string()).await.unwrap();
        queue.enqueue(&"next".to_string()).await.unwrap();

        let orphan = queue.reserve().await.unwrap().unwrap();
        assert!(queue.requeue_stale(Duration::from_secs(60)).await.unwrap().is_empty());

        clock.advance_secs(61);
        let redelivered = queue.requeue_stale(Duration::from_secs(60)).await.unwrap();
        assert_eq!(redelivered, vec![orphan.job_id.clone()]);
        assert_eq!(queue.in_flight().await, 0);

        let again = queue.reserve().await.unwrap().unwrap();
        assert_eq!(again.job_id, "orphan");
        assert_ne!(again, orphan);

        // the stale reservation can no longer be acked away
        queue.ack(&orphan).await.unwrap();
        assert_eq!(queue.in_flight().await, 1);
    }
}
