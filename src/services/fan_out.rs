//! Bounded concurrent execution of independent units.
//!
//! Each unit owns its input and produces its own outcome; a failing unit
//! never stops its siblings. The join waits for every unit unless a deadline
//! is configured, in which case units still running at the deadline are
//! dropped and reported as unfinished.

use futures::stream::{self, StreamExt};
use std::future::Future;
use std::time::Duration;

use crate::domain::models::EngineConfig;

/// Units that completed, in submission order, and keys of the ones that did not.
#[derive(Debug)]
pub struct FanOutResult<K, T> {
    pub completed: Vec<(K, T)>,
    pub unfinished: Vec<K>,
}

#[derive(Debug, Clone, Copy)]
pub struct FanOut {
    max_concurrency: usize,
    deadline: Option<Duration>,
}

impl Default for FanOut {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl FanOut {
    pub fn new(max_concurrency: usize, deadline: Option<Duration>) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
            deadline,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.max_fan_out,
            config.join_timeout_ms.map(Duration::from_millis),
        )
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Deadline in milliseconds, for error reporting.
    pub fn deadline_ms(&self) -> u64 {
        self.deadline
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    /// Run `unit` once per `(key, input)` pair and join.
    pub async fn run<K, I, T, F, Fut>(&self, items: Vec<(K, I)>, mut unit: F) -> FanOutResult<K, T>
    where
        K: Clone,
        F: FnMut(I) -> Fut,
        Fut: Future<Output = T>,
    {
        let keys: Vec<K> = items.iter().map(|(k, _)| k.clone()).collect();
        let mut slots: Vec<Option<T>> = keys.iter().map(|_| None).collect();

        let mut outcomes = stream::iter(items.into_iter().enumerate())
            .map(|(index, (_, input))| {
                let fut = unit(input);
                async move { (index, fut.await) }
            })
            .buffer_unordered(self.max_concurrency);

        let drain = async {
            while let Some((index, outcome)) = outcomes.next().await {
                slots[index] = Some(outcome);
            }
        };

        match self.deadline {
            Some(deadline) => {
                let _ = tokio::time::timeout(deadline, drain).await;
            }
            None => drain.await,
        }

        drop(outcomes);

        let mut completed = Vec::with_capacity(keys.len());
        let mut unfinished = Vec::new();
        for (key, slot) in keys.into_iter().zip(slots) {
            match slot {
                Some(outcome) => completed.push((key, outcome)),
                None => unfinished.push(key),
            }
        }

        FanOutResult {
            completed,
            unfinished,
        }
    }
}
