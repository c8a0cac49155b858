use std::fmt;
use std::future::Future;
use std::hint::black_box;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, oneshot};
use tokio::task::LocalSet;
use tokio_util::sync::CancellationToken;

use crate::{
    ControllerConfig, Event, EventKind, Failure, Observe, OperationFn, OperationRef,
};

use super::{Controller, Snapshot, State};

#[derive(Debug, Clone, PartialEq)]
enum MyErr {
    NotFound,
    Mapped(String),
}

impl fmt::Display for MyErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug)]
enum CustomError {
    Boom,
}

impl fmt::Display for CustomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("boom")
    }
}

impl std::error::Error for CustomError {}

type Ctl = Controller<u32, MyErr>;

async fn local<F: Future>(f: F) -> F::Output {
    LocalSet::new().run_until(f).await
}

/// Waits until an event of `kind` shows up on `rx`.
async fn next_of(rx: &mut broadcast::Receiver<Event>, kind: EventKind) -> Event {
    loop {
        let ev = rx.recv().await.expect("bus open");
        if ev.kind == kind {
            return ev;
        }
    }
}

type UnitFuture = Pin<Box<dyn Future<Output = Result<u32, Failure<MyErr>>> + Send>>;

/// Unit that finishes with `result` once `gate` fires (or its sender is dropped).
fn gated(
    gate: oneshot::Receiver<()>,
    result: Result<u32, Failure<MyErr>>,
) -> impl FnOnce(CancellationToken) -> UnitFuture {
    move |_ctx: CancellationToken| {
        let fut: UnitFuture = Box::pin(async move {
            let _ = gate.await;
            result
        });
        fut
    }
}

#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<(EventKind, Snapshot<u32, MyErr>)>>,
}

impl Observe<u32, MyErr> for Recorder {
    fn on_event(&self, ev: &Event, snap: &Snapshot<u32, MyErr>) {
        self.seen.lock().unwrap().push((ev.kind, snap.clone()));
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

impl Recorder {
    fn kinds(&self) -> Vec<EventKind> {
        self.seen.lock().unwrap().iter().map(|(k, _)| *k).collect()
    }
}

#[test]
fn fresh_controller_is_idle_and_empty() {
    let ctl = Ctl::new();
    assert_eq!(ctl.state(), State::Idle);
    assert_eq!(ctl.value(), None);
    assert_eq!(ctl.error(), None);
    assert_eq!(ctl.generation(), None);
    assert_eq!(ctl.snapshot(), Snapshot::default());
    assert_eq!(ctl.name(), "controller");
}

#[tokio::test]
async fn start_clears_previous_result_and_goes_active() {
    local(async {
        let ctl = Ctl::new();
        ctl.start(|_ctx| async { Ok(7) });
        ctl.wait_idle().await;
        assert_eq!(ctl.value(), Some(7));

        let (_tx, rx) = oneshot::channel();
        ctl.start(gated(rx, Ok(8)));

        assert_eq!(ctl.state(), State::Active);
        assert!(ctl.is_active());
        assert_eq!(ctl.value(), None);
        assert_eq!(ctl.error(), None);
    })
    .await;
}

#[tokio::test]
async fn success_sets_value_and_clears_error() {
    local(async {
        let ctl = Ctl::new();
        ctl.start(|_ctx| async { Err(Failure::domain(MyErr::NotFound)) });
        ctl.wait_idle().await;
        assert_eq!(ctl.error(), Some(MyErr::NotFound));

        ctl.start(|_ctx| async { Ok(42) });
        ctl.wait_idle().await;
        assert_eq!(ctl.state(), State::Idle);
        assert_eq!(ctl.value(), Some(42));
        assert_eq!(ctl.error(), None);
        assert_eq!(ctl.generation(), None);
    })
    .await;
}

#[tokio::test]
async fn start_with_passes_input() {
    local(async {
        let ctl = Ctl::new();
        ctl.start_with(5u32, |i, _ctx| async move { Ok(i * 2) });
        ctl.wait_idle().await;
        assert_eq!(ctl.value(), Some(10));
        assert_eq!(ctl.error(), None);
        assert_eq!(ctl.state(), State::Idle);
    })
    .await;
}

#[tokio::test]
async fn domain_failure_without_mapper_is_used_directly() {
    local(async {
        let ctl = Ctl::new();
        ctl.start(|_ctx| async { Err(Failure::domain(MyErr::NotFound)) });
        ctl.wait_idle().await;
        assert_eq!(ctl.error(), Some(MyErr::NotFound));
        assert_eq!(ctl.value(), None);
        assert_eq!(ctl.state(), State::Idle);
    })
    .await;
}

#[tokio::test]
async fn foreign_failure_without_mapper_is_swallowed() {
    local(async {
        let ctl = Ctl::new();
        let mut rx = ctl.subscribe();
        ctl.start(|_ctx| async { Err(Failure::foreign(CustomError::Boom)) });
        ctl.wait_idle().await;

        assert_eq!(ctl.error(), None);
        assert_eq!(ctl.value(), None);
        assert_eq!(ctl.state(), State::Idle);

        let ev = next_of(&mut rx, EventKind::Swallowed).await;
        assert_eq!(ev.reason.as_deref(), Some("boom"));
    })
    .await;
}

#[tokio::test]
async fn mapper_result_takes_precedence() {
    local(async {
        let ctl = Ctl::with_error_mapper(|f: &Failure<MyErr>| {
            f.foreign_ref().map(|e| MyErr::Mapped(e.to_string()))
        });
        ctl.start(|_ctx| async { Err(Failure::foreign(CustomError::Boom)) });
        ctl.wait_idle().await;
        assert_eq!(ctl.error(), Some(MyErr::Mapped("boom".into())));
        assert_eq!(ctl.value(), None);

        // Mapper declines: the domain variant still goes through.
        ctl.start(|_ctx| async { Err(Failure::domain(MyErr::NotFound)) });
        ctl.wait_idle().await;
        assert_eq!(ctl.error(), Some(MyErr::NotFound));

        // Mapper declines and nothing to fall back on.
        ctl.start(|_ctx| async { Err(Failure::Aborted) });
        ctl.wait_idle().await;
        assert_eq!(ctl.error(), None);
        assert_eq!(ctl.state(), State::Idle);
    })
    .await;
}

#[tokio::test]
async fn panicking_unit_is_reported_as_failure() {
    local(async {
        let ctl = Ctl::with_error_mapper(|f: &Failure<MyErr>| match f {
            Failure::Panicked { message } => Some(MyErr::Mapped(message.clone())),
            _ => None,
        });
        ctl.start(|_ctx| async {
            if std::hint::black_box(true) {
                panic!("unit exploded");
            }
            Ok(0)
        });
        ctl.wait_idle().await;
        assert_eq!(ctl.error(), Some(MyErr::Mapped("unit exploded".into())));
        assert_eq!(ctl.state(), State::Idle);
    })
    .await;
}

#[tokio::test]
async fn newer_start_wins_when_old_unit_finishes_last() {
    local(async {
        let ctl = Ctl::new();
        let mut rx = ctl.subscribe();

        let (a_tx, a_rx) = oneshot::channel();
        let (b_tx, b_rx) = oneshot::channel();
        let ga = ctl.start(gated(a_rx, Ok(1)));
        let gb = ctl.start(gated(b_rx, Ok(2)));
        assert!(gb > ga);
        assert_eq!(ctl.generation(), Some(gb));

        b_tx.send(()).unwrap();
        ctl.wait_idle().await;
        assert_eq!(ctl.value(), Some(2));

        a_tx.send(()).unwrap();
        let stale = next_of(&mut rx, EventKind::StaleDiscarded).await;
        assert_eq!(stale.generation, Some(ga.get()));

        assert_eq!(ctl.value(), Some(2));
        assert_eq!(ctl.error(), None);
        assert_eq!(ctl.state(), State::Idle);
    })
    .await;
}

#[tokio::test]
async fn old_unit_finishing_first_does_not_end_new_run() {
    local(async {
        let ctl = Ctl::new();
        let mut rx = ctl.subscribe();

        let (a_tx, a_rx) = oneshot::channel();
        let (b_tx, b_rx) = oneshot::channel();
        ctl.start(gated(a_rx, Err(Failure::domain(MyErr::NotFound))));
        ctl.start(gated(b_rx, Ok(2)));

        a_tx.send(()).unwrap();
        next_of(&mut rx, EventKind::StaleDiscarded).await;
        assert_eq!(ctl.state(), State::Active);
        assert_eq!(ctl.error(), None);
        assert_eq!(ctl.value(), None);

        b_tx.send(()).unwrap();
        ctl.wait_idle().await;
        assert_eq!(ctl.value(), Some(2));
        assert_eq!(ctl.error(), None);
    })
    .await;
}

#[tokio::test]
async fn superseded_unit_receives_cancellation() {
    local(async {
        let ctl = Ctl::new();
        let (seen_tx, seen_rx) = oneshot::channel();
        ctl.start(move |ctx| async move {
            ctx.cancelled().await;
            let _ = seen_tx.send(());
            Err(Failure::Cancelled)
        });
        ctl.start(|_ctx| async { Ok(3) });

        seen_rx.await.expect("old unit observed cancellation");
        ctl.wait_idle().await;
        assert_eq!(ctl.value(), Some(3));
    })
    .await;
}

#[tokio::test]
async fn cancel_when_idle_is_a_noop() {
    local(async {
        let ctl = Ctl::new();
        let mut rx = ctl.subscribe();
        ctl.cancel();
        ctl.cancel();
        assert_eq!(ctl.snapshot(), Snapshot::default());
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    })
    .await;
}

#[tokio::test]
async fn cancel_is_immediate_and_idempotent() {
    local(async {
        let ctl = Ctl::new();
        let mut rx = ctl.subscribe();
        let (tx, gate) = oneshot::channel();
        let token_seen = Arc::new(Mutex::new(None::<CancellationToken>));
        let ts = token_seen.clone();
        let g = ctl.start(move |ctx| {
            *ts.lock().unwrap() = Some(ctx.clone());
            async move {
                let _ = gate.await;
                Ok(9)
            }
        });

        ctl.cancel();
        assert_eq!(ctl.state(), State::Idle);
        assert_eq!(ctl.generation(), None);
        let token = token_seen.lock().unwrap().clone().expect("token captured");
        assert!(token.is_cancelled());

        ctl.cancel();
        assert_eq!(ctl.state(), State::Idle);

        let ev = next_of(&mut rx, EventKind::Cancelled).await;
        assert_eq!(ev.generation, Some(g.get()));
        assert_eq!(ev.reason.as_deref(), Some("cancelled"));

        // The unit ignores the signal and finishes anyway: still inert.
        tx.send(()).unwrap();
        next_of(&mut rx, EventKind::StaleDiscarded).await;
        assert_eq!(ctl.value(), None);
        assert_eq!(ctl.state(), State::Idle);
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    })
    .await;
}

#[tokio::test]
async fn clean_resets_fields_without_touching_run() {
    local(async {
        let ctl = Ctl::new();
        ctl.start(|_ctx| async { Err(Failure::domain(MyErr::NotFound)) });
        ctl.wait_idle().await;
        ctl.clean();
        assert_eq!(ctl.error(), None);
        assert_eq!(ctl.state(), State::Idle);

        let (tx, rx) = oneshot::channel();
        let g = ctl.start(gated(rx, Ok(5)));
        ctl.clean();
        assert_eq!(ctl.state(), State::Active);
        assert_eq!(ctl.generation(), Some(g));

        tx.send(()).unwrap();
        ctl.wait_idle().await;
        assert_eq!(ctl.value(), Some(5));
    })
    .await;
}

#[tokio::test]
async fn unit_reporting_cancelled_ends_without_error() {
    local(async {
        let ctl = Ctl::new();
        let mut rx = ctl.subscribe();
        ctl.start(|_ctx| async { Err(Failure::Cancelled) });
        ctl.wait_idle().await;
        assert_eq!(ctl.snapshot(), Snapshot::default());
        let ev = next_of(&mut rx, EventKind::Cancelled).await;
        assert_eq!(ev.reason.as_deref(), Some("unit_cancelled"));
    })
    .await;
}

#[tokio::test]
async fn observers_see_every_transition_in_order() {
    local(async {
        let rec = Arc::new(Recorder::default());
        let ctl: Ctl = Controller::builder()
            .with_config(ControllerConfig::named("search"))
            .with_observer(rec.clone())
            .build();

        let (a_tx, a_rx) = oneshot::channel::<()>();
        ctl.start(gated(a_rx, Ok(1)));
        ctl.start(|_ctx| async { Ok(2) });
        ctl.wait_idle().await;
        drop(a_tx);
        ctl.clean();

        assert_eq!(
            rec.kinds(),
            vec![
                EventKind::Started,
                EventKind::Cancelled,
                EventKind::Started,
                EventKind::Succeeded,
                EventKind::Cleaned,
            ]
        );

        let seen = rec.seen.lock().unwrap();
        assert_eq!(seen[0].1.state, State::Active);
        assert_eq!(seen[1].1.state, State::Idle);
        assert_eq!(seen[2].1.state, State::Active);
        assert_eq!(seen[3].1.value, Some(2));
        assert_eq!(seen[3].1.state, State::Idle);
        assert_eq!(seen[4].1.value, None);
    })
    .await;
}

#[tokio::test]
async fn stale_completion_does_not_reach_observers() {
    local(async {
        let rec = Arc::new(Recorder::default());
        let ctl: Ctl = Controller::builder().with_observer(rec.clone()).build();
        let mut rx = ctl.subscribe();

        let (tx, gate) = oneshot::channel();
        ctl.start(gated(gate, Ok(1)));
        ctl.cancel();
        tx.send(()).unwrap();
        next_of(&mut rx, EventKind::StaleDiscarded).await;

        assert_eq!(rec.kinds(), vec![EventKind::Started, EventKind::Cancelled]);
    })
    .await;
}

#[tokio::test]
async fn named_operation_is_carried_in_events() {
    local(async {
        let ctl = Ctl::new();
        let mut rx = ctl.subscribe();
        let op: OperationRef<u32, MyErr> =
            OperationFn::arc("lookup", |_ctx: CancellationToken| async {
                Ok::<u32, Failure<MyErr>>(11)
            });

        let g = ctl.run(op.clone());
        let started = next_of(&mut rx, EventKind::Started).await;
        assert_eq!(started.operation.as_deref(), Some("lookup"));
        assert_eq!(started.generation, Some(g.get()));

        ctl.wait_idle().await;
        let done = next_of(&mut rx, EventKind::Succeeded).await;
        assert_eq!(done.operation.as_deref(), Some("lookup"));
        assert_eq!(ctl.value(), Some(11));

        // Same operation, second run.
        ctl.run(op);
        ctl.wait_idle().await;
        assert_eq!(ctl.value(), Some(11));
    })
    .await;
}

#[tokio::test]
async fn watch_state_tracks_lifecycle() {
    local(async {
        let ctl = Ctl::new();
        let state_rx = ctl.watch_state();
        assert_eq!(*state_rx.borrow(), State::Idle);

        let (tx, gate) = oneshot::channel();
        ctl.start(gated(gate, Ok(1)));
        assert_eq!(*state_rx.borrow(), State::Active);

        tx.send(()).unwrap();
        ctl.wait_idle().await;
        assert_eq!(*state_rx.borrow(), State::Idle);
    })
    .await;
}

#[tokio::test]
async fn dropping_controller_cancels_in_flight_unit() {
    local(async {
        let ctl = Ctl::new();
        let (seen_tx, seen_rx) = oneshot::channel();
        ctl.start(move |ctx| async move {
            ctx.cancelled().await;
            let _ = seen_tx.send(());
            Err(Failure::Cancelled)
        });
        drop(ctl);
        seen_rx.await.expect("unit observed cancellation after drop");
    })
    .await;
}

#[tokio::test]
async fn new_unit_is_built_after_previous_one_is_cancelled() {
    local(async {
        let ctl = Ctl::new();
        let (_tx, gate) = oneshot::channel();
        let mut first = None;
        let g1 = ctl.start(|ctx| {
            first = Some(ctx.clone());
            gated(gate, Ok(1))(ctx)
        });
        let first = first.expect("first unit built");

        let mut seen = None;
        let g2 = ctl.start(|_ctx| {
            seen = Some((first.is_cancelled(), ctl.state(), ctl.generation()));
            async { Ok(2) }
        });

        assert_eq!(seen, Some((true, State::Active, Some(g2))));
        assert!(g2 > g1);
        ctl.wait_idle().await;
        assert_eq!(ctl.value(), Some(2));
    })
    .await;
}

#[tokio::test]
async fn start_outside_local_set_panics_before_any_transition() {
    let ctl = Ctl::new();
    let mut rx = ctl.subscribe();
    let mut built = false;

    let res = catch_unwind(AssertUnwindSafe(|| {
        ctl.start(|_ctx| {
            built = true;
            async { Ok(1) }
        })
    }));

    assert!(res.is_err());
    assert!(!built);
    assert_eq!(ctl.snapshot(), Snapshot::default());
    assert!(matches!(
        rx.try_recv(),
        Err(broadcast::error::TryRecvError::Empty)
    ));
    ctl.wait_idle().await;
}

#[tokio::test]
async fn panicking_op_closure_leaves_controller_idle() {
    local(async {
        let ctl = Ctl::new();
        let mut rx = ctl.subscribe();

        let res = catch_unwind(AssertUnwindSafe(|| {
            ctl.start(|_ctx| -> UnitFuture {
                if black_box(true) {
                    panic!("cannot build unit");
                }
                Box::pin(async { Ok(1) })
            })
        }));

        assert!(res.is_err());
        assert_eq!(ctl.state(), State::Idle);
        assert_eq!(ctl.generation(), None);
        let ev = next_of(&mut rx, EventKind::Cancelled).await;
        assert_eq!(ev.generation, Some(1));
        assert_eq!(ev.reason.as_deref(), Some("completion_lost"));
    })
    .await;
}

#[tokio::test]
async fn dropping_local_set_releases_in_flight_unit() {
    let ctl = Ctl::new();
    let mut rx = ctl.subscribe();
    let (_tx, gate) = oneshot::channel();
    let mut token = None;

    let set = LocalSet::new();
    let g = set
        .run_until(async {
            ctl.start(|ctx| {
                token = Some(ctx.clone());
                gated(gate, Ok(7))(ctx)
            })
        })
        .await;
    assert_eq!(ctl.state(), State::Active);

    drop(set);

    assert_eq!(ctl.state(), State::Idle);
    assert_eq!(ctl.generation(), None);
    assert_eq!(ctl.value(), None);
    assert!(token.expect("unit built").is_cancelled());
    let ev = next_of(&mut rx, EventKind::Cancelled).await;
    assert_eq!(ev.generation, Some(g.get()));
    assert_eq!(ev.reason.as_deref(), Some("completion_lost"));
}

#[cfg(debug_assertions)]
#[test]
fn calls_off_the_coordination_thread_are_caught_in_debug() {
    let ctl = Ctl::new();
    let res = std::thread::spawn(move || ctl.cancel()).join();
    assert!(res.is_err());
}
