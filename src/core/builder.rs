use std::marker::PhantomData;
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use super::{config::SchedulerConfig, engine::Shared, scheduler::Scheduler, state::JobKey};
use crate::{
    events::Bus,
    subscribers::{Subscribe, SubscriberSet},
    tasks::HandlerRef,
};

/// Builder for constructing a [`Scheduler`] with optional subscribers.
pub struct SchedulerBuilder<T> {
    cfg: SchedulerConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
    _record: PhantomData<fn() -> T>,
}

impl<T> SchedulerBuilder<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: SchedulerConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            _record: PhantomData,
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive lifecycle events through dedicated workers with
    /// bounded queues; a slow subscriber never delays scheduling.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the scheduler and spawns its coordinator.
    ///
    /// `identity` derives the stable job key from a record. Must be called inside a
    /// tokio runtime.
    pub fn build<F>(self, identity: F, handler: HandlerRef<T>) -> Scheduler<T>
    where
        F: Fn(&T) -> JobKey + Send + Sync + 'static,
    {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let token = CancellationToken::new();

        if !self.subscribers.is_empty() {
            let set = SubscriberSet::new(self.subscribers, bus.clone());
            subscriber_listener(set, &bus, token.clone());
        }

        let shared = Shared::spawn(self.cfg, Arc::new(identity), handler, bus, token);
        Scheduler::from_shared(shared)
    }
}

/// Forwards bus events to the subscriber set until the scheduler shuts down.
fn subscriber_listener(set: SubscriberSet, bus: &Bus, token: CancellationToken) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                ev = rx.recv() => match ev {
                    Ok(ev) => set.emit(&ev),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "subscriber listener lagged behind the event bus");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
        set.shutdown().await;
    });
}
