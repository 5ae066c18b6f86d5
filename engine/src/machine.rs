//! The generic state machine engine and its event dispatcher.
//!
//! One worker task per machine instance drains a FIFO queue: receive an
//! event, run the resolver, replace the state cell, publish the new state
//! on a watch channel, and spawn each resolved action. The worker performs
//! no branching of its own - every decision lives in the resolver - so the
//! engine is substitutable in tests by injecting a mock [`ActionRunner`].
//!
//! Serialization is the point: resolvers branch on "current state", and two
//! events resolving concurrently against the same old state could both
//! start the same exchange. The single consumer makes the observed state
//! sequence consistent with a total order of submitted events.

use std::fmt;
use std::sync::Arc;

use futures_util::future::{AbortHandle, Abortable, BoxFuture};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use gatehouse_types::{Action, Event};

/// Queue depth per machine instance. Producers back-pressure (await) once
/// this many events are pending.
const EVENT_QUEUE_CAPACITY: usize = 64;

/// A pure state-transition function for one machine.
pub trait Resolver: Send + Sync + 'static {
    type State: Clone + fmt::Debug + Send + Sync + 'static;

    /// Must not perform IO, read the clock, or consult anything beyond the
    /// two arguments. An event outside this machine's namespace (or with no
    /// transition defined for the current state) resolves to a no-op.
    fn resolve(&self, state: &Self::State, event: &Event) -> Resolution<Self::State>;

    /// Short label for transition logs.
    fn state_label(state: &Self::State) -> &'static str;
}

/// The outcome of resolving one event: the replacement state and the
/// actions to schedule.
#[derive(Debug)]
pub struct Resolution<S> {
    pub new_state: S,
    pub actions: Vec<Action>,
}

impl<S> Resolution<S> {
    /// Transition with no actions.
    pub fn next(new_state: S) -> Self {
        Self {
            new_state,
            actions: Vec::new(),
        }
    }

    /// Transition and schedule one action.
    pub fn with(new_state: S, action: Action) -> Self {
        Self {
            new_state,
            actions: vec![action],
        }
    }

    /// No-op: same state, nothing scheduled. Models "event irrelevant in
    /// this state", e.g. a stray network response after cancellation.
    pub fn unchanged(state: &S) -> Self
    where
        S: Clone,
    {
        Self::next(state.clone())
    }
}

/// Executes one action, emitting outcome events through the sender. The
/// closure captures whatever environment the actions need.
pub type ActionRunner = Arc<dyn Fn(Action, EventSender) -> BoxFuture<'static, ()> + Send + Sync>;

enum Input {
    Event(Event),
    Reset,
}

/// Event producer handed to actions.
///
/// Holds only a weak sender: an in-flight action never keeps its machine
/// alive, and an emit after shutdown is dropped quietly.
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::WeakSender<Input>,
}

impl EventSender {
    pub async fn send(&self, event: Event) {
        let Some(tx) = self.tx.upgrade() else {
            tracing::debug!(namespace = event.namespace(), "machine stopped; event dropped");
            return;
        };
        if tx.send(Input::Event(event)).await.is_err() {
            tracing::debug!("machine stopped while enqueueing; event dropped");
        }
    }
}

/// Handle to a spawned machine: enqueue events, observe state, reset.
pub struct MachineHandle<S> {
    name: &'static str,
    tx: mpsc::Sender<Input>,
    state_rx: watch::Receiver<S>,
}

impl<S: Clone + Send + Sync + 'static> MachineHandle<S> {
    pub async fn send(&self, event: Event) {
        if self.tx.send(Input::Event(event)).await.is_err() {
            tracing::warn!(machine = self.name, "machine worker stopped; event dropped");
        }
    }

    /// Sender for action completions and other external producers.
    #[must_use]
    pub fn sender(&self) -> EventSender {
        EventSender {
            tx: self.tx.downgrade(),
        }
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> S {
        self.state_rx.borrow().clone()
    }

    /// Watch receiver for state-change notifications.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<S> {
        self.state_rx.clone()
    }

    /// Waits until the predicate holds (checking the current state first).
    /// Returns `None` if the machine stopped before that happened.
    pub async fn wait_for(&self, mut predicate: impl FnMut(&S) -> bool) -> Option<S> {
        let mut rx = self.state_rx.clone();
        match rx.wait_for(|state| predicate(state)).await {
            Ok(state) => Some(state.clone()),
            Err(_) => None,
        }
    }

    /// Cancels all in-flight actions and restores the initial state.
    pub async fn reset(&self) {
        if self.tx.send(Input::Reset).await.is_err() {
            tracing::warn!(machine = self.name, "machine worker stopped; reset dropped");
        }
    }
}

pub struct StateMachine;

impl StateMachine {
    /// Spawns the worker task for one machine instance.
    pub fn spawn<R: Resolver>(
        name: &'static str,
        resolver: R,
        initial: R::State,
        runner: ActionRunner,
    ) -> MachineHandle<R::State> {
        let (tx, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (state_tx, state_rx) = watch::channel(initial.clone());
        let events = EventSender {
            tx: tx.downgrade(),
        };
        tokio::spawn(drive(name, resolver, initial, runner, rx, state_tx, events));
        MachineHandle { name, tx, state_rx }
    }
}

async fn drive<R: Resolver>(
    name: &'static str,
    resolver: R,
    initial: R::State,
    runner: ActionRunner,
    mut rx: mpsc::Receiver<Input>,
    state_tx: watch::Sender<R::State>,
    events: EventSender,
) {
    let mut state = initial.clone();
    let mut in_flight: Vec<(AbortHandle, JoinHandle<()>)> = Vec::new();

    while let Some(input) = rx.recv().await {
        in_flight.retain(|(_, join)| !join.is_finished());
        match input {
            Input::Reset => {
                let cancelled = in_flight.len();
                for (abort, _) in in_flight.drain(..) {
                    abort.abort();
                }
                state = initial.clone();
                let _ = state_tx.send(state.clone());
                tracing::debug!(machine = name, cancelled, "reset");
            }
            Input::Event(event) => {
                let resolution = resolver.resolve(&state, &event);
                let from = R::state_label(&state);
                let to = R::state_label(&resolution.new_state);
                if from == to && resolution.actions.is_empty() {
                    tracing::trace!(
                        machine = name,
                        event = event.namespace(),
                        state = from,
                        "event resolved to a no-op"
                    );
                } else {
                    tracing::debug!(
                        machine = name,
                        event = event.namespace(),
                        from,
                        to,
                        actions = resolution.actions.len(),
                        "resolved"
                    );
                }
                state = resolution.new_state;
                let _ = state_tx.send(state.clone());
                for action in resolution.actions {
                    let (abort, registration) = AbortHandle::new_pair();
                    let future = Abortable::new(runner(action, events.clone()), registration);
                    let join = tokio::spawn(async move {
                        let _ = future.await;
                    });
                    in_flight.push((abort, join));
                }
            }
        }
    }

    // Handle dropped: cancel whatever is still running.
    for (abort, _) in in_flight.drain(..) {
        abort.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::{ActionRunner, Resolution, Resolver, StateMachine};
    use std::sync::Arc;
    use std::time::Duration;

    use futures_util::FutureExt;

    use gatehouse_types::{Action, Event, SignInEvent, StoreAction};

    /// Appends every challenge answer it sees; emits a store action for the
    /// "spawn" marker so tests can exercise action scheduling.
    struct RecordingResolver;

    impl Resolver for RecordingResolver {
        type State = Vec<String>;

        fn resolve(&self, state: &Vec<String>, event: &Event) -> Resolution<Vec<String>> {
            let Event::SignIn(SignInEvent::VerifyChallengeAnswer { answer }) = event else {
                return Resolution::unchanged(state);
            };
            let mut next = state.clone();
            next.push(answer.clone());
            if answer == "spawn" {
                Resolution::with(next, Action::Store(StoreAction::LoadCredentials))
            } else {
                Resolution::next(next)
            }
        }

        fn state_label(_state: &Vec<String>) -> &'static str {
            "recording"
        }
    }

    fn noop_runner() -> ActionRunner {
        Arc::new(|_action, _events| async {}.boxed())
    }

    fn answer(text: impl Into<String>) -> Event {
        Event::SignIn(SignInEvent::VerifyChallengeAnswer {
            answer: text.into(),
        })
    }

    #[tokio::test]
    async fn events_from_one_producer_keep_submission_order() {
        let handle =
            StateMachine::spawn("test", RecordingResolver, Vec::new(), noop_runner());
        for i in 0..10 {
            handle.send(answer(format!("e{i}"))).await;
        }
        let state = handle.wait_for(|state| state.len() == 10).await.unwrap();
        let expected: Vec<String> = (0..10).map(|i| format!("e{i}")).collect();
        assert_eq!(state, expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_producers_resolve_to_a_total_order() {
        let handle = Arc::new(StateMachine::spawn(
            "test",
            RecordingResolver,
            Vec::new(),
            noop_runner(),
        ));

        let mut senders = Vec::new();
        for producer in 0..8 {
            let handle = Arc::clone(&handle);
            senders.push(tokio::spawn(async move {
                for i in 0..25 {
                    handle.send(answer(format!("p{producer}-{i}"))).await;
                }
            }));
        }
        for sender in senders {
            sender.await.unwrap();
        }

        let state = handle.wait_for(|state| state.len() == 200).await.unwrap();

        // Every event appears exactly once.
        let mut sorted = state.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), 200);

        // Per-producer submission order survives the interleaving.
        for producer in 0..8 {
            let prefix = format!("p{producer}-");
            let seen: Vec<usize> = state
                .iter()
                .filter_map(|entry| entry.strip_prefix(&prefix))
                .map(|i| i.parse().unwrap())
                .collect();
            let expected: Vec<usize> = (0..25).collect();
            assert_eq!(seen, expected, "producer {producer} order violated");
        }
    }

    #[tokio::test]
    async fn reset_restores_initial_state_and_cancels_actions() {
        // The runner sleeps, then tries to append; reset must abort it
        // before the sleep completes.
        let runner: ActionRunner = Arc::new(|_action, events| {
            async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                events.send(answer("from-action")).await;
            }
            .boxed()
        });
        let handle = StateMachine::spawn("test", RecordingResolver, Vec::new(), runner);

        handle.send(answer("spawn")).await;
        handle.wait_for(|state| state.len() == 1).await.unwrap();
        handle.reset().await;

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(handle.state().is_empty(), "aborted action still emitted");
    }

    #[tokio::test]
    async fn foreign_events_leave_state_untouched() {
        let handle =
            StateMachine::spawn("test", RecordingResolver, Vec::new(), noop_runner());
        handle
            .send(Event::CredentialStore(
                gatehouse_types::CredentialStoreEvent::Load,
            ))
            .await;
        handle.send(answer("only")).await;
        let state = handle.wait_for(|state| !state.is_empty()).await.unwrap();
        assert_eq!(state, vec!["only".to_string()]);
    }
}
