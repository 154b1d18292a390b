//! Spoken-turn concurrency integration tests
//!
//! Drives the session state machine with a simulated playback actor on a
//! real thread — no audio hardware required, same lock discipline as the
//! production pipeline.

use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};

use vesper_assistant::voice::{Phase, SessionHandle};

mod common;

/// Frames the fake playback writes; 5 ms per frame ≈ 5 s of audio
const FRAMES: usize = 1_000;
const FRAME_TIME: Duration = Duration::from_millis(5);

/// Interrupt must take effect well inside this window
const LATENCY_BUDGET: Duration = Duration::from_millis(500);

fn speaking_session() -> SessionHandle {
    let handle = SessionHandle::new();
    handle.begin_utterance("hello there").unwrap();
    assert!(handle.start_speaking());
    handle
}

#[test]
fn pause_interrupt_halts_playback_within_budget() {
    let handle = speaking_session();
    let (frames, join) = common::spawn_playback(handle.clone(), FRAMES, FRAME_TIME);

    thread::sleep(Duration::from_millis(50));
    assert_eq!(handle.phase(), Phase::Speaking);

    // Pause-class interrupt: is_speaking drops immediately, pending stays
    let paused_at = Instant::now();
    assert!(handle.try_pause());
    assert!(!handle.is_speaking());
    assert!(handle.pending_text().is_some());

    // The playback actor must observe the halt within the budget
    join.join().unwrap();
    assert!(paused_at.elapsed() < LATENCY_BUDGET);

    // No frames were written after the halt settled
    let frames_at_join = frames.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(frames.load(Ordering::SeqCst), frames_at_join);
    assert!(frames_at_join < FRAMES);

    assert_eq!(handle.phase(), Phase::Paused);
}

#[test]
fn stop_interrupt_discards_the_utterance() {
    let handle = speaking_session();
    let (_frames, join) = common::spawn_playback(handle.clone(), FRAMES, FRAME_TIME);

    thread::sleep(Duration::from_millis(50));
    let stopped_at = Instant::now();
    assert!(handle.request_stop());
    assert!(handle.pending_text().is_none());

    join.join().unwrap();
    assert!(stopped_at.elapsed() < LATENCY_BUDGET);
    assert_eq!(handle.phase(), Phase::Stopped);
    assert!(!handle.is_speaking());
}

#[test]
fn unhindered_playback_finishes() {
    let handle = speaking_session();
    let (frames, join) = common::spawn_playback(handle.clone(), 20, Duration::from_millis(2));

    join.join().unwrap();
    assert_eq!(handle.phase(), Phase::Finished);
    assert_eq!(frames.load(Ordering::SeqCst), 20);
    assert!(handle.pending_text().is_none());
}

#[test]
fn superseding_speak_beats_resume() {
    // speak("X"), pause it, then speak("Y") before any resume
    let handle = SessionHandle::new();
    handle.begin_utterance("X").unwrap();
    assert!(handle.start_speaking());
    let (_frames, join) = common::spawn_playback(handle.clone(), FRAMES, FRAME_TIME);

    thread::sleep(Duration::from_millis(30));
    assert!(handle.try_pause());
    join.join().unwrap();
    assert_eq!(handle.pending_text().as_deref(), Some("X"));

    // The new utterance wins; X is abandoned
    handle.begin_utterance("Y").unwrap();
    assert_eq!(handle.pending_text().as_deref(), Some("Y"));

    // Resuming the superseded pause is now a contract violation
    assert!(handle.resume_text().is_err());

    // Y runs to completion; X is never spoken again
    assert!(handle.start_speaking());
    let (_frames, join) = common::spawn_playback(handle.clone(), 10, Duration::from_millis(2));
    join.join().unwrap();
    assert_eq!(handle.phase(), Phase::Finished);
    assert!(handle.pending_text().is_none());
}

#[test]
fn resume_replays_the_paused_text() {
    let handle = speaking_session();
    let (_frames, join) = common::spawn_playback(handle.clone(), FRAMES, FRAME_TIME);

    thread::sleep(Duration::from_millis(30));
    assert!(handle.try_pause());
    join.join().unwrap();

    let text = handle.resume_text().unwrap();
    assert_eq!(text, "hello there");

    // The resume path re-enters the normal speak lifecycle
    handle.begin_utterance(&text).unwrap();
    assert!(handle.start_speaking());
    handle.complete_utterance();
    assert_eq!(handle.phase(), Phase::Finished);
}

#[test]
fn stop_during_generation_never_reaches_playback() {
    let handle = SessionHandle::new();
    handle.begin_utterance("long reply").unwrap();

    // Stop arrives while the synthesizer is still working
    assert!(handle.request_stop());
    assert!(!handle.start_speaking());
    assert_eq!(handle.phase(), Phase::Stopped);
    assert!(handle.pending_text().is_none());
}

#[test]
fn concurrent_pause_and_stop_resolve_to_exactly_one() {
    // An interrupt resolves to pause or stop, never both: whichever actor
    // wins the lock decides the outcome
    for _ in 0..20 {
        let handle = speaking_session();
        let pause_handle = handle.clone();
        let stop_handle = handle.clone();

        let pause = thread::spawn(move || pause_handle.try_pause());
        let stop = thread::spawn(move || stop_handle.request_stop());
        let paused = pause.join().unwrap();
        let stopped = stop.join().unwrap();

        // Exactly one interrupt action takes effect
        assert!(paused ^ stopped, "paused={paused} stopped={stopped}");
        if paused {
            assert_eq!(handle.phase(), Phase::Paused);
            assert!(handle.pending_text().is_some());
        } else {
            assert!(handle.pending_text().is_none());
            handle.settle_after_halt();
            assert_eq!(handle.phase(), Phase::Stopped);
        }
    }
}
