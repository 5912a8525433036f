mod common;

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use flicker_core::acquisition::{CameraAcquisition, PairAssembler};
use flicker_core::channel::FrameChannel;
use flicker_core::config::{AcquisitionMode, ProcessingConfig};
use flicker_core::error::FlickerError;
use flicker_core::events::{event_channel, EventReceiver, PipelineEvent};
use flicker_core::frame::FrameItem;
use flicker_core::processing::FrameProcessor;
use flicker_core::state::{RunState, SharedContext};

use common::{constant_frame, MockCamera, Script};

const POLL: Duration = Duration::from_millis(1);
/// Upper bound for a loop to notice a stop request.
const EXIT_BOUND: Duration = Duration::from_millis(500);

struct Rig {
    ctx: Arc<SharedContext>,
    channel: Arc<FrameChannel>,
    acquisition: Arc<CameraAcquisition<MockCamera>>,
    events: EventReceiver,
}

fn rig(script: Script, capacity: usize) -> Rig {
    let camera = MockCamera::new(script, (8, 8));
    let ctx = Arc::new(SharedContext::new((8, 8), ProcessingConfig::default()));
    let channel = Arc::new(FrameChannel::new(capacity));
    let (tx, events) = event_channel(8);
    let acquisition = Arc::new(CameraAcquisition::new(
        camera,
        Arc::clone(&ctx),
        Arc::clone(&channel),
        tx,
        POLL,
    ));
    Rig {
        ctx,
        channel,
        acquisition,
        events,
    }
}

/// Run the acquisition loop on a thread; the receiver fires when it exits.
fn spawn_loop(rig: &Rig, mode: AcquisitionMode) -> mpsc::Receiver<()> {
    let (done_tx, done_rx) = mpsc::channel();
    let acquisition = Arc::clone(&rig.acquisition);
    thread::spawn(move || {
        acquisition.run(mode).unwrap();
        let _ = done_tx.send(());
    });
    done_rx
}

#[test]
fn test_pairing_by_parity_over_1000_pairs() {
    let rig = rig(Script::Jittered, 2);
    rig.ctx.start().unwrap();
    let done = spawn_loop(&rig, AcquisitionMode::Difference);

    let mut pairs = 0;
    let deadline = Instant::now() + Duration::from_secs(30);
    while pairs < 1000 {
        assert!(Instant::now() < deadline, "only {pairs} pairs arrived");
        let Some(item) = rig.channel.try_pop(Duration::from_millis(10)) else {
            continue;
        };
        match item {
            FrameItem::DifferencePair(a, b) => {
                assert!(a.is_even(), "A has odd index {}", a.index);
                assert_eq!(b.index, a.index + 1);
                assert_eq!(a.index / 2, pairs as u64);
                pairs += 1;
            }
            other => panic!("unexpected item {other:?}"),
        }
    }

    rig.ctx.pause();
    done.recv_timeout(EXIT_BOUND).expect("acquisition loop did not exit");
}

#[test]
fn test_degenerate_pair_on_stop() {
    let rig = rig(Script::EvenOnly, 2);
    rig.ctx.start().unwrap();
    let done = spawn_loop(&rig, AcquisitionMode::Difference);

    thread::sleep(Duration::from_millis(30));
    assert_eq!(rig.channel.items(), 0, "no pair can complete from A frames");

    rig.ctx.pause();
    done.recv_timeout(EXIT_BOUND).expect("acquisition loop deadlocked");

    assert_eq!(rig.channel.items(), 1);
    assert!(matches!(rig.channel.try_pop(POLL), Some(FrameItem::Incomplete)));
    assert!(rig.channel.try_pop(POLL).is_none());
}

#[test]
fn test_loops_exit_within_latency_bound() {
    // Producer blocked on a full channel.
    let rig = rig(Script::Jittered, 2);
    rig.ctx.start().unwrap();
    let done = spawn_loop(&rig, AcquisitionMode::Single);

    // Consumer idling on an empty channel of its own.
    let (tx, _events) = event_channel(8);
    let empty = Arc::new(FrameChannel::new(2));
    let mut processor = FrameProcessor::new(Arc::clone(&rig.ctx), empty, tx, POLL);
    let (proc_tx, proc_done) = mpsc::channel();
    thread::spawn(move || {
        processor.run();
        let _ = proc_tx.send(());
    });

    let deadline = Instant::now() + Duration::from_secs(5);
    while rig.channel.items() < 2 {
        assert!(Instant::now() < deadline, "channel never filled");
        thread::sleep(POLL);
    }

    let stop = Instant::now();
    rig.ctx.pause();
    done.recv_timeout(EXIT_BOUND).expect("producer missed the latency bound");
    proc_done
        .recv_timeout(EXIT_BOUND)
        .expect("consumer missed the latency bound");
    assert!(stop.elapsed() < EXIT_BOUND);
}

#[test]
fn test_stall_returns_the_slot() {
    let rig = rig(Script::Stalling, 2);
    rig.ctx.start().unwrap();
    let done = spawn_loop(&rig, AcquisitionMode::Single);

    thread::sleep(Duration::from_millis(20));
    rig.ctx.pause();
    done.recv_timeout(EXIT_BOUND).unwrap();

    assert_eq!(rig.channel.items(), 0);
    assert_eq!(rig.channel.reserved(), 0);
    assert_eq!(rig.channel.spaces(), 2);
}

#[test]
fn test_ready_notification_only_outside_reconfigure() {
    let rig = rig(Script::Jittered, 2);

    rig.ctx.start().unwrap();
    let done = spawn_loop(&rig, AcquisitionMode::Single);
    thread::sleep(Duration::from_millis(5));
    assert!(rig.ctx.begin_reconfigure());
    done.recv_timeout(EXIT_BOUND).unwrap();
    assert!(rig.events.try_iter().all(|e| !matches!(e, PipelineEvent::CameraReady)));

    rig.ctx.start().unwrap();
    let done = spawn_loop(&rig, AcquisitionMode::Single);
    thread::sleep(Duration::from_millis(5));
    rig.ctx.pause();
    done.recv_timeout(EXIT_BOUND).unwrap();
    assert!(rig.events.try_iter().any(|e| matches!(e, PipelineEvent::CameraReady)));
    assert_eq!(rig.ctx.state(), RunState::Idle);
}

#[test]
fn test_reconfigure_while_running_is_busy() {
    let rig = rig(Script::Jittered, 2);
    rig.ctx.start().unwrap();
    let done = spawn_loop(&rig, AcquisitionMode::Single);
    thread::sleep(Duration::from_millis(5));

    assert!(matches!(rig.acquisition.set_binning(2), Err(FlickerError::DeviceBusy)));
    assert!(matches!(rig.acquisition.grab_n_frames(1), Err(FlickerError::DeviceBusy)));

    rig.ctx.pause();
    done.recv_timeout(EXIT_BOUND).unwrap();
}

#[test]
fn test_set_binning_updates_shape_and_clears_channel() {
    let rig = rig(Script::Jittered, 2);
    rig.channel
        .try_push(FrameItem::Single(constant_frame(1, (8, 8), 0)), POLL)
        .unwrap();

    rig.acquisition.set_binning(2).unwrap();
    assert_eq!(rig.ctx.dim(), (4, 4));
    assert_eq!(rig.acquisition.frame_dim().unwrap(), (4, 4));
    assert_eq!(rig.channel.items(), 0);
    assert!(matches!(rig.events.try_recv(), Ok(PipelineEvent::CameraReady)));

    assert!(rig.acquisition.set_binning(3).is_err());
    assert_eq!(rig.acquisition.binning().unwrap(), 2);
}

#[test]
fn test_set_exposure_validates() {
    let rig = rig(Script::Jittered, 2);
    rig.acquisition.set_exposure_time(0.2).unwrap();
    assert_eq!(rig.acquisition.exposure().unwrap(), 0.2);
    assert!(rig.acquisition.set_exposure_time(0.0).is_err());
    assert!(rig.acquisition.set_exposure_time(f64::NAN).is_err());
}

#[test]
fn test_grab_n_frames_between_runs() {
    let rig = rig(Script::Jittered, 2);
    let frames = rig.acquisition.grab_n_frames(3).unwrap();
    assert_eq!(frames.len(), 3);
    assert!(frames.iter().all(|f| f.dim() == (8, 8)));

    // The difference loop can start again after a grab, so the trigger was
    // handed back in a usable state.
    rig.ctx.start().unwrap();
    let done = spawn_loop(&rig, AcquisitionMode::Difference);
    let item = rig.channel.try_pop(Duration::from_secs(2));
    rig.ctx.pause();
    done.recv_timeout(EXIT_BOUND).unwrap();
    assert!(matches!(item, Some(FrameItem::DifferencePair(..))));

    assert_eq!(rig.acquisition.grab_n_frames(2).unwrap().len(), 2);
}

#[test]
fn test_pair_assembler_recovers_from_lost_frames() {
    let dim = (2, 2);
    let mut pairs = PairAssembler::default();

    // B of pair 0 lost: A0 is replaced by A2.
    assert!(pairs.offer(constant_frame(0, dim, 0)).is_none());
    assert!(pairs.offer(constant_frame(0, dim, 2)).is_none());
    let (a, b) = pairs.offer(constant_frame(0, dim, 3)).unwrap();
    assert_eq!((a.index, b.index), (2, 3));
    assert!(pairs.is_empty());

    // Stale B from an older pair is discarded.
    assert!(pairs.offer(constant_frame(0, dim, 6)).is_none());
    assert!(pairs.offer(constant_frame(0, dim, 5)).is_none());
    let (a, b) = pairs.offer(constant_frame(0, dim, 7)).unwrap();
    assert_eq!((a.index, b.index), (6, 7));

    // Odd-first arrival.
    assert!(pairs.offer(constant_frame(0, dim, 9)).is_none());
    let (a, b) = pairs.offer(constant_frame(0, dim, 8)).unwrap();
    assert_eq!((a.index, b.index), (8, 9));
}

#[test]
fn test_stall_keeps_half_pair() {
    let rig = rig(Script::StallOnce, 2);
    rig.ctx.start().unwrap();
    let done = spawn_loop(&rig, AcquisitionMode::Difference);

    let item = rig.channel.try_pop(Duration::from_secs(2));
    rig.ctx.pause();
    done.recv_timeout(EXIT_BOUND).unwrap();

    // A0 arrived before the stall and still pairs with B1 after it.
    match item {
        Some(FrameItem::DifferencePair(a, b)) => assert_eq!((a.index, b.index), (0, 1)),
        other => panic!("expected the first pair, got {other:?}"),
    }
}
