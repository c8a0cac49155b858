use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    config::ControllerConfig,
    error::Failure,
    events::{Bus, Event, EventKind},
    observers::{Observe, ObserverSet},
    operation::OperationRef,
};

use super::{
    builder::ControllerBuilder,
    context::CoordinationContext,
    mapper::{self, ErrorMapper},
    slot::{Generation, Slot},
    state::{Snapshot, State},
};

/// Reason attached to the `Cancelled` event of a unit replaced by a newer `start`.
const REASON_SUPERSEDED: &str = "superseded";
/// Reason attached to the `Cancelled` event of an explicit `cancel`.
const REASON_CANCELLED: &str = "cancelled";
/// Reason attached when the current unit itself reported `Failure::Cancelled`.
const REASON_UNIT_CANCELLED: &str = "unit_cancelled";
/// Reason attached when a unit's completion can no longer be delivered.
const REASON_COMPLETION_LOST: &str = "completion_lost";

/// Single-slot cancellable task controller.
///
/// Runs at most one unit of work at a time. Starting a new unit cancels the
/// previous one (cooperatively, through its [`CancellationToken`]) and makes
/// its eventual completion inert: every unit carries a [`Generation`] and a
/// completion is applied only while its generation is still the current one.
///
/// All methods, and every completion, run on the coordination context: the
/// thread driving the [`tokio::task::LocalSet`] the controller is used in.
/// Debug builds assert this. If that `LocalSet` is dropped while a unit is in
/// flight, the unit is cancelled and the controller returns to `Idle` with a
/// `Cancelled{reason="completion_lost"}` event.
///
/// # Example
/// ```rust
/// use taskslot::{Controller, Failure, State};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let local = tokio::task::LocalSet::new();
/// local.run_until(async {
///     let ctl: Controller<u32, String> = Controller::new();
///
///     ctl.start_with(5u32, |i, _ctx| async move { Ok::<u32, Failure<String>>(i * 2) });
///     assert_eq!(ctl.state(), State::Active);
///
///     ctl.wait_idle().await;
///     assert_eq!(ctl.value(), Some(10));
///     assert_eq!(ctl.error(), None);
/// }).await;
/// # }
/// ```
pub struct Controller<V, E> {
    shared: Arc<Shared<V, E>>,
}

struct Shared<V, E> {
    name: Arc<str>,
    ctx: CoordinationContext,
    mapper: Option<ErrorMapper<E>>,
    observers: ObserverSet<V, E>,
    bus: Bus,
    state_tx: watch::Sender<State>,
    inner: Mutex<Inner<V, E>>,
}

/// Fields mutated by transitions (never held while observers run).
struct Inner<V, E> {
    state: State,
    value: Option<V>,
    error: Option<E>,
    slot: Slot,
}

/// Event plus the snapshot observers receive with it (absent when nobody observes).
type Pending<V, E> = (Event, Option<Snapshot<V, E>>);

type UnitJoin<V, E> = JoinHandle<Result<V, Failure<E>>>;

/// Delivers one unit's outcome back to its controller.
///
/// Dropped without [`finish`](Self::finish), it releases its generation instead,
/// so a unit whose completion is lost never leaves the controller `Active`.
struct Completion<V, E>
where
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    shared: Weak<Shared<V, E>>,
    generation: Generation,
    armed: bool,
}

impl<V, E> Completion<V, E>
where
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn finish(mut self, res: Result<Result<V, Failure<E>>, JoinError>) {
        self.armed = false;
        if let Some(shared) = self.shared.upgrade() {
            shared.complete(self.generation, res);
        }
    }
}

impl<V, E> Drop for Completion<V, E>
where
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Some(shared) = self.shared.upgrade() {
            shared.abandon(self.generation);
        }
    }
}

impl<V, E> Controller<V, E>
where
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Creates an idle controller with default config, no mapper and no observers.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates an idle controller using `f` to map failures into `E`.
    pub fn with_error_mapper<F>(f: F) -> Self
    where
        F: Fn(&Failure<E>) -> Option<E> + Send + Sync + 'static,
    {
        Self::builder().with_error_mapper(f).build()
    }

    /// Returns a builder for mapper, observers and config.
    pub fn builder() -> ControllerBuilder<V, E> {
        ControllerBuilder::new()
    }

    pub(super) fn from_parts(
        config: ControllerConfig,
        mapper: Option<ErrorMapper<E>>,
        observers: Vec<Arc<dyn Observe<V, E>>>,
    ) -> Self {
        let (state_tx, _state_rx) = watch::channel(State::Idle);
        Self {
            shared: Arc::new(Shared {
                name: Arc::from(&*config.name),
                ctx: CoordinationContext::capture(),
                mapper,
                observers: ObserverSet::new(observers),
                bus: Bus::new(config.bus_capacity_clamped()),
                state_tx,
                inner: Mutex::new(Inner {
                    state: State::Idle,
                    value: None,
                    error: None,
                    slot: Slot::new(),
                }),
            }),
        }
    }

    // ---------------------------
    // Commands
    // ---------------------------

    /// Starts a unit of work, superseding the current one (if any).
    ///
    /// The previous unit is cancelled and the controller is `Active` before `op`
    /// is called with the new unit's cancellation token. The future it returns is
    /// spawned on the tokio runtime. Returns as soon as the unit is spawned;
    /// observe completion via the fields, observers,
    /// [`subscribe`](Self::subscribe) or [`wait_idle`](Self::wait_idle).
    ///
    /// # Panics
    /// Must be called from within a [`tokio::task::LocalSet`]; the completion is
    /// delivered back through `spawn_local`. Outside one this panics before any
    /// state changes. If `op` itself panics, the new unit is released and the
    /// controller is `Idle` again.
    pub fn start<F, Fut>(&self, op: F) -> Generation
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<V, Failure<E>>> + Send + 'static,
    {
        self.shared.ctx.check("start");
        self.spawn_unit(None, op)
    }

    /// Same as [`start`](Self::start), but `op` also receives `input`.
    pub fn start_with<I, F, Fut>(&self, input: I, op: F) -> Generation
    where
        F: FnOnce(I, CancellationToken) -> Fut,
        Fut: Future<Output = Result<V, Failure<E>>> + Send + 'static,
    {
        self.shared.ctx.check("start_with");
        self.spawn_unit(None, move |token| op(input, token))
    }

    /// Starts a named operation; its name is carried in events.
    pub fn run(&self, operation: OperationRef<V, E>) -> Generation {
        self.shared.ctx.check("run");
        let name: Arc<str> = Arc::from(operation.name());
        self.spawn_unit(Some(name), move |token| async move {
            operation.run(token).await
        })
    }

    /// Cancels the current unit and returns to `Idle` without waiting for it.
    ///
    /// The unit is only signalled; if it completes later, its result is discarded.
    /// No-op when already idle.
    pub fn cancel(&self) {
        self.shared.ctx.check("cancel");
        let pending = {
            let mut inner = self.shared.lock();
            let Some(unit) = inner.slot.cancel() else {
                return;
            };
            self.shared.set_state(&mut inner, State::Idle);
            tracing::trace!(
                controller = %self.shared.name,
                generation = unit.generation.get(),
                "unit cancelled"
            );
            let ev = Event::new(EventKind::Cancelled, self.shared.name.clone())
                .with_generation(unit.generation.get())
                .with_operation(unit.operation)
                .with_reason(REASON_CANCELLED);
            self.shared.pending(ev, &inner)
        };
        self.shared.emit(pending);
    }

    /// Clears `value` and `error`. Leaves `state` and the in-flight unit untouched.
    pub fn clean(&self) {
        self.shared.ctx.check("clean");
        let pending = {
            let mut inner = self.shared.lock();
            inner.value = None;
            inner.error = None;
            let ev = Event::new(EventKind::Cleaned, self.shared.name.clone());
            self.shared.pending(ev, &inner)
        };
        self.shared.emit(pending);
    }

    // ---------------------------
    // Reads
    // ---------------------------

    /// Current lifecycle state.
    pub fn state(&self) -> State {
        self.shared.ctx.check("state");
        self.shared.lock().state
    }

    /// Returns `true` while a unit of work is current.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.state() == State::Active
    }

    /// Last successful result.
    pub fn value(&self) -> Option<V> {
        self.shared.ctx.check("value");
        self.shared.lock().value.clone()
    }

    /// Last mapped failure.
    pub fn error(&self) -> Option<E> {
        self.shared.ctx.check("error");
        self.shared.lock().error.clone()
    }

    /// Generation of the in-flight unit, if any.
    pub fn generation(&self) -> Option<Generation> {
        self.shared.ctx.check("generation");
        self.shared.lock().slot.generation()
    }

    /// Copy of all observable fields.
    pub fn snapshot(&self) -> Snapshot<V, E> {
        self.shared.ctx.check("snapshot");
        self.shared.snapshot(&self.shared.lock())
    }

    /// Controller name (from [`ControllerConfig::name`]).
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Receiver of every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.shared.bus.subscribe()
    }

    /// Receiver that tracks `state` changes.
    pub fn watch_state(&self) -> watch::Receiver<State> {
        self.shared.state_tx.subscribe()
    }

    /// Resolves once the controller is `Idle`.
    ///
    /// Returns immediately if nothing is running.
    pub async fn wait_idle(&self) {
        let mut rx = self.shared.state_tx.subscribe();
        let _ = rx.wait_for(|s| *s == State::Idle).await;
    }

    // ---------------------------
    // Internals
    // ---------------------------

    /// Cancel previous unit → clear fields → `Active` → build and spawn under a new generation.
    fn spawn_unit<F, Fut>(&self, operation: Option<Arc<str>>, op: F) -> Generation
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<V, Failure<E>>> + Send + 'static,
    {
        // Panics outside a LocalSet, so it goes before any transition.
        let (handoff_tx, handoff_rx) = oneshot::channel::<(Completion<V, E>, UnitJoin<V, E>)>();
        tokio::task::spawn_local(async move {
            if let Ok((completion, join)) = handoff_rx.await {
                completion.finish(join.await);
            }
        });

        let token = CancellationToken::new();
        let mut pending = Vec::with_capacity(2);
        let generation = {
            let mut inner = self.shared.lock();

            if let Some(prev) = inner.slot.cancel() {
                self.shared.set_state(&mut inner, State::Idle);
                tracing::trace!(
                    controller = %self.shared.name,
                    generation = prev.generation.get(),
                    "unit superseded"
                );
                let ev = Event::new(EventKind::Cancelled, self.shared.name.clone())
                    .with_generation(prev.generation.get())
                    .with_operation(prev.operation)
                    .with_reason(REASON_SUPERSEDED);
                pending.push(self.shared.pending(ev, &inner));
            }

            inner.value = None;
            inner.error = None;
            let generation = inner.slot.occupy(token.clone(), operation.clone());
            self.shared.set_state(&mut inner, State::Active);
            tracing::trace!(
                controller = %self.shared.name,
                generation = generation.get(),
                "unit started"
            );

            let ev = Event::new(EventKind::Started, self.shared.name.clone())
                .with_generation(generation.get())
                .with_operation(operation);
            pending.push(self.shared.pending(ev, &inner));
            generation
        };

        let completion = Completion {
            shared: Arc::downgrade(&self.shared),
            generation,
            armed: true,
        };
        for p in pending {
            self.shared.emit(p);
        }

        let join = tokio::spawn(op(token));
        let _ = handoff_tx.send((completion, join));
        generation
    }
}

impl<V, E> Default for Controller<V, E>
where
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V, E> Shared<V, E>
where
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn lock(&self) -> MutexGuard<'_, Inner<V, E>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, inner: &mut Inner<V, E>, state: State) {
        inner.state = state;
        self.state_tx.send_replace(state);
    }

    fn snapshot(&self, inner: &Inner<V, E>) -> Snapshot<V, E> {
        Snapshot {
            state: inner.state,
            value: inner.value.clone(),
            error: inner.error.clone(),
            generation: inner.slot.generation(),
        }
    }

    fn pending(&self, ev: Event, inner: &Inner<V, E>) -> Pending<V, E> {
        let snap = (!self.observers.is_empty()).then(|| self.snapshot(inner));
        (ev, snap)
    }

    /// Notifies observers (lock released) and publishes on the bus.
    fn emit(&self, (ev, snap): Pending<V, E>) {
        if let Some(snap) = snap {
            self.observers.notify(&ev, &snap, &self.bus);
        }
        self.bus.publish(ev);
    }

    /// Applies a unit's outcome if its generation is still current.
    fn complete(&self, generation: Generation, res: Result<Result<V, Failure<E>>, JoinError>) {
        self.ctx.check("complete");
        let outcome = res.unwrap_or_else(|join| Err(Failure::from_join(join)));

        let pending = {
            let mut inner = self.lock();
            let Some(unit) = inner.slot.release(generation) else {
                drop(inner);
                tracing::debug!(
                    controller = %self.name,
                    generation = generation.get(),
                    outcome = if outcome.is_ok() { "ok" } else { "err" },
                    "discarding stale completion"
                );
                self.bus.publish(
                    Event::new(EventKind::StaleDiscarded, self.name.clone())
                        .with_generation(generation.get()),
                );
                return;
            };

            let elapsed_ms = unit.elapsed_ms();
            let ev = match outcome {
                Ok(v) => {
                    inner.value = Some(v);
                    inner.error = None;
                    Event::new(EventKind::Succeeded, self.name.clone())
                }
                Err(Failure::Cancelled) => {
                    inner.value = None;
                    inner.error = None;
                    Event::new(EventKind::Cancelled, self.name.clone())
                        .with_reason(REASON_UNIT_CANCELLED)
                }
                Err(failure) => {
                    let reason = failure.reason();
                    let label = failure.as_label();
                    inner.value = None;
                    inner.error = mapper::dispatch(self.mapper.as_ref(), failure);
                    if inner.error.is_some() {
                        Event::new(EventKind::Failed, self.name.clone()).with_reason(reason)
                    } else {
                        tracing::debug!(
                            controller = %self.name,
                            generation = generation.get(),
                            failure = label,
                            %reason,
                            "failure not representable as domain error; swallowed"
                        );
                        Event::new(EventKind::Swallowed, self.name.clone()).with_reason(reason)
                    }
                }
            };
            self.set_state(&mut inner, State::Idle);
            tracing::trace!(
                controller = %self.name,
                generation = generation.get(),
                elapsed_ms,
                kind = ev.kind.as_label(),
                "unit completed"
            );

            let ev = ev
                .with_generation(generation.get())
                .with_operation(unit.operation);
            self.pending(ev, &inner)
        };
        self.emit(pending);
    }
}

impl<V, E> Shared<V, E>
where
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Releases `generation` when its completion can no longer be delivered.
    fn abandon(&self, generation: Generation) {
        let pending = {
            let mut inner = self.lock();
            let Some(unit) = inner.slot.release(generation) else {
                return;
            };
            unit.token.cancel();
            self.set_state(&mut inner, State::Idle);
            tracing::warn!(
                controller = %self.name,
                generation = generation.get(),
                "completion lost; unit released"
            );
            let ev = Event::new(EventKind::Cancelled, self.name.clone())
                .with_generation(generation.get())
                .with_operation(unit.operation)
                .with_reason(REASON_COMPLETION_LOST);
            self.pending(ev, &inner)
        };
        // A second panic while unwinding aborts, so observers are skipped then.
        if std::thread::panicking() {
            self.bus.publish(pending.0);
        } else {
            self.emit(pending);
        }
    }
}

impl<V, E> Drop for Shared<V, E> {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        inner.slot.cancel();
    }
}
