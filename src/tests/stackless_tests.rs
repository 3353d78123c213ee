use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rand::Rng;
use test_log::test;

use crate::{CoroError, CoroState, Resume, StacklessEngine};

#[test]
fn create_starts_in_init() {
    let mut engine = StacklessEngine::new();
    let id = engine.create(|cx| cx.finish()).unwrap();
    assert_eq!(id, 0);
    assert_eq!(engine.state(id), CoroState::Init);
    assert_eq!(engine.current(), None);
}

#[test]
fn n_yields_take_n_plus_one_resumes() {
    let n = 5;
    let mut engine = StacklessEngine::new();
    // the resume point doubles as the turn counter
    let id = engine
        .create(move |cx| {
            let turn = cx.resume_point();
            if turn < n {
                cx.yield_at(turn + 1);
            } else {
                cx.finish();
            }
        })
        .unwrap();

    for _ in 0..n {
        assert_eq!(engine.resume(id).unwrap(), Resume::Yielded);
        assert_eq!(engine.state(id), CoroState::Suspended);
    }
    assert_eq!(engine.resume(id).unwrap(), Resume::Finished);
    assert_eq!(engine.state(id), CoroState::Finished);
}

#[test]
fn finished_resume_is_idempotent() {
    let hits = Rc::new(Cell::new(0u32));
    let mut engine = StacklessEngine::new();
    let h = hits.clone();
    let id = engine
        .create(move |cx| {
            h.set(h.get() + 1);
            cx.finish();
        })
        .unwrap();

    assert_eq!(engine.resume(id).unwrap(), Resume::Finished);
    assert_eq!(hits.get(), 1);
    for _ in 0..3 {
        assert_eq!(engine.resume(id).unwrap(), Resume::Finished);
    }
    // the logic function is never re-entered after completion
    assert_eq!(hits.get(), 1);
}

#[test]
fn invalid_handles_fail_gracefully() {
    let mut engine = StacklessEngine::with_capacity(8);
    for bad in [3, 8, usize::MAX] {
        assert!(matches!(
            engine.resume(bad),
            Err(CoroError::InvalidHandle(id)) if id == bad
        ));
        assert_eq!(engine.state(bad), CoroState::Init);
        engine.destroy(bad); // silent no-op
    }
}

#[test]
fn plain_return_counts_as_out_of_work() {
    let points = Rc::new(RefCell::new(Vec::new()));
    let mut engine = StacklessEngine::new();
    let p = points.clone();
    let id = engine
        .create(move |cx| {
            p.borrow_mut().push(cx.resume_point());
            // no yield_at, no finish: out of work this turn
        })
        .unwrap();

    assert_eq!(engine.resume(id).unwrap(), Resume::Yielded);
    assert_eq!(engine.state(id), CoroState::Suspended);
    assert_eq!(engine.resume(id).unwrap(), Resume::Yielded);
    // the resume point never moved, so both turns re-entered at 0
    assert_eq!(*points.borrow(), vec![0, 0]);
}

#[test]
fn ping_pong_advances_counter_two_per_round() {
    let target = 100u64;
    let counter = Rc::new(Cell::new(0u64));
    let mut engine = StacklessEngine::new();

    let mut worker = |counter: Rc<Cell<u64>>| {
        engine
            .create(move |cx| {
                if counter.get() >= target {
                    cx.finish();
                    return;
                }
                counter.set(counter.get() + 1);
                cx.yield_at(0);
            })
            .unwrap()
    };
    let ping = worker(counter.clone());
    let pong = worker(counter.clone());

    let mut rounds = 0;
    while counter.get() < target {
        assert_eq!(engine.resume(ping).unwrap(), Resume::Yielded);
        assert_eq!(engine.resume(pong).unwrap(), Resume::Yielded);
        rounds += 1;
        assert_eq!(counter.get(), rounds * 2);
    }
    assert_eq!(counter.get(), target);

    assert_eq!(engine.resume(ping).unwrap(), Resume::Finished);
    assert_eq!(engine.resume(pong).unwrap(), Resume::Finished);
}

#[test]
fn pool_exhaustion_leaves_prior_handles_valid() {
    let capacity = 16;
    let mut engine = StacklessEngine::with_capacity(capacity);
    let ids: Vec<_> = (0..capacity)
        .map(|i| {
            let id = engine.create(|cx| cx.finish()).unwrap();
            assert_eq!(id, i);
            id
        })
        .collect();

    assert!(matches!(
        engine.create(|cx| cx.finish()),
        Err(CoroError::PoolExhausted)
    ));

    for id in ids {
        assert_eq!(engine.state(id), CoroState::Init);
        assert_eq!(engine.resume(id).unwrap(), Resume::Finished);
    }
}

#[test]
fn destroyed_slot_is_reused_first_fit() {
    let mut engine = StacklessEngine::new();
    for i in 0..3 {
        assert_eq!(engine.create(|cx| cx.finish()).unwrap(), i);
    }
    engine.destroy(1);
    assert_eq!(engine.state(1), CoroState::Init);
    assert_eq!(engine.create(|cx| cx.finish()).unwrap(), 1);
    assert_eq!(engine.create(|cx| cx.finish()).unwrap(), 3);
}

#[test]
fn cleanup_restores_fresh_engine() {
    let mut engine = StacklessEngine::with_capacity(32);
    for _ in 0..10 {
        engine.create(|cx| cx.yield_at(1)).unwrap();
    }
    engine.resume(4).unwrap();

    engine.cleanup();
    engine.cleanup(); // idempotent
    for id in 0..engine.capacity() {
        assert_eq!(engine.state(id), CoroState::Init);
    }
    assert_eq!(engine.current(), None);
    assert_eq!(engine.create(|cx| cx.finish()).unwrap(), 0);
}

#[test]
fn create_destroy_churn_keeps_bookkeeping_consistent() {
    let capacity = 16;
    let mut engine = StacklessEngine::with_capacity(capacity);
    let mut live = vec![false; capacity];
    let mut rng = rand::thread_rng();

    for _ in 0..1000 {
        if rng.gen_bool(0.5) {
            match engine.create(|cx| cx.finish()) {
                Ok(id) => {
                    // first-fit: the lowest free slot in the model
                    assert_eq!(Some(id), live.iter().position(|l| !l));
                    live[id] = true;
                }
                Err(CoroError::PoolExhausted) => assert!(live.iter().all(|l| *l)),
                Err(err) => panic!("unexpected error: {err}"),
            }
        } else {
            let id = rng.gen_range(0..capacity);
            engine.destroy(id);
            live[id] = false;
        }

        let snapshot: Vec<bool> = live.clone();
        for (id, is_live) in snapshot.into_iter().enumerate() {
            // never-resumed slots report Init whether live or free; only
            // resume tells them apart
            assert_eq!(engine.state(id), CoroState::Init);
            if !is_live {
                assert!(matches!(engine.resume(id), Err(CoroError::InvalidHandle(_))));
            }
        }
    }
}
