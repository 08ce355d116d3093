//! Task that owns one [`AggregateRoot`] and processes requests in order.
//!
//! Commands for the same aggregate id must not interleave: each one reads
//! the state the previous one produced. The actor task is the single owner
//! of the root, and [`AggregateHandle`] is the cloneable way in.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info_span, Instrument};

use super::{Aggregate, AggregateConfig, AggregateRoot};
use crate::error::{AggregateError, Result};
use crate::state::State;

const CHANNEL_CAPACITY: usize = 64;

type Reply<T> = oneshot::Sender<Result<T>>;

enum Request<A: Aggregate> {
    Handle {
        command: A::Command,
        reply: Reply<State<A::State>>,
    },
    Rehydrate {
        reply: Reply<State<A::State>>,
    },
    State {
        reply: oneshot::Sender<State<A::State>>,
    },
    Compact {
        reply: Reply<Option<u64>>,
    },
    RollbackTo {
        sequence: u64,
        reply: Reply<State<A::State>>,
    },
}

/// Async handle to an aggregate owned by a background task.
///
/// The task stops once every handle has been dropped.
pub struct AggregateHandle<A: Aggregate> {
    aggregate_id: String,
    sender: mpsc::Sender<Request<A>>,
}

impl<A: Aggregate> Clone for AggregateHandle<A> {
    fn clone(&self) -> Self {
        Self {
            aggregate_id: self.aggregate_id.clone(),
            sender: self.sender.clone(),
        }
    }
}

impl<A: Aggregate> AggregateHandle<A> {
    /// Start a task owning an already-built root.
    pub fn spawn(root: AggregateRoot<A>) -> Self {
        let aggregate_id = root.aggregate_id().to_string();
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let span = info_span!("aggregate.actor", kind = A::KIND, aggregate_id = %aggregate_id);
        tokio::spawn(run_actor(root, receiver).instrument(span));
        Self {
            aggregate_id,
            sender,
        }
    }

    /// Rehydrate the aggregate, then start its task.
    pub async fn load(aggregate_id: impl Into<String>, config: AggregateConfig) -> Result<Self> {
        let root = AggregateRoot::<A>::load(aggregate_id, config).await?;
        Ok(Self::spawn(root))
    }

    pub fn aggregate_id(&self) -> &str {
        &self.aggregate_id
    }

    pub async fn handle(&self, command: A::Command) -> Result<State<A::State>> {
        self.request(|reply| Request::Handle { command, reply }).await?
    }

    pub async fn rehydrate(&self) -> Result<State<A::State>> {
        self.request(|reply| Request::Rehydrate { reply }).await?
    }

    pub async fn state(&self) -> Result<State<A::State>> {
        self.request(|reply| Request::State { reply }).await
    }

    pub async fn compact(&self) -> Result<Option<u64>> {
        self.request(|reply| Request::Compact { reply }).await?
    }

    pub async fn rollback_to(&self, sequence: u64) -> Result<State<A::State>> {
        self.request(|reply| Request::RollbackTo { sequence, reply }).await?
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Request<A>,
    ) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(build(reply))
            .await
            .map_err(|_| self.stopped())?;
        response.await.map_err(|_| self.stopped())
    }

    fn stopped(&self) -> AggregateError {
        AggregateError::ActorStopped {
            aggregate_id: self.aggregate_id.clone(),
        }
    }
}

async fn run_actor<A: Aggregate>(
    mut root: AggregateRoot<A>,
    mut receiver: mpsc::Receiver<Request<A>>,
) {
    while let Some(request) = receiver.recv().await {
        // A dropped reply receiver means the caller gave up; the work is still done.
        match request {
            Request::Handle { command, reply } => {
                let _ = reply.send(root.handle(command).await);
            }
            Request::Rehydrate { reply } => {
                let _ = reply.send(root.rehydrate().await);
            }
            Request::State { reply } => {
                let _ = reply.send(root.current_state().clone());
            }
            Request::Compact { reply } => {
                let _ = reply.send(root.compact().await);
            }
            Request::RollbackTo { sequence, reply } => {
                let _ = reply.send(root.rollback_to(sequence).await);
            }
        }
    }
    debug!("All handles dropped, actor stopping");
}
