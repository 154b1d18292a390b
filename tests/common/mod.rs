//! Shared test utilities

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use vesper_assistant::voice::SessionHandle;
use vesper_assistant::{Arity, ToolRegistry};

/// Build a registry whose tools record their invocation order
#[allow(dead_code)]
pub fn recording_registry() -> (Arc<Mutex<Vec<String>>>, ToolRegistry) {
    let calls = Arc::new(Mutex::new(Vec::new()));

    let slow_calls = Arc::clone(&calls);
    let fast_calls = Arc::clone(&calls);

    let registry = ToolRegistry::builder()
        .register("slow_tool", "sleeps then answers", Arity::exact(1), move |args| {
            // Slower than fast_tool on purpose: order must still hold
            thread::sleep(Duration::from_millis(50));
            slow_calls.lock().unwrap().push(format!("slow_tool({})", args[0]));
            Ok(format!("slow:{}", args[0]))
        })
        .register("fast_tool", "answers immediately", Arity::exact(1), move |args| {
            fast_calls.lock().unwrap().push(format!("fast_tool({})", args[0]));
            Ok(format!("fast:{}", args[0]))
        })
        .build();

    (calls, registry)
}

/// Simulated playback actor: writes frames until drained or halted.
///
/// Returns the frame counter and the join handle; the counter stops
/// advancing within a frame or two of a halt.
#[allow(dead_code)]
pub fn spawn_playback(
    handle: SessionHandle,
    max_frames: usize,
    frame_time: Duration,
) -> (Arc<AtomicUsize>, thread::JoinHandle<()>) {
    let frames = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&frames);

    let join = thread::spawn(move || {
        for _ in 0..max_frames {
            if handle.playback_should_halt() {
                handle.settle_after_halt();
                return;
            }
            counter.fetch_add(1, Ordering::SeqCst);
            thread::sleep(frame_time);
        }
        handle.complete_utterance();
    });

    (frames, join)
}
