//! System-wide input hook using macOS CGEventTap
//!
//! The tap is created in filtering mode on a dedicated thread with its own
//! CFRunLoop. Suppressed events are rewritten to `CGEventType::Null`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use core_foundation::base::TCFType;
use core_foundation::mach_port::CFMachPortRef;
use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop};
use core_graphics::event::{
    CGEvent, CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement,
    CGEventTapProxy, CGEventType, EventField,
};
use tracing::{error, info, warn};

use super::filter::{EventFilter, InputKind, RawInput, Verdict};
use super::interceptor::{HookBackend, HookError, HookHandle};
use super::keys::Modifiers;

#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    fn CGEventTapIsEnabled(tap: CFMachPortRef) -> bool;
    fn CGEventTapEnable(tap: CFMachPortRef, enable: bool);
}

/// How long the run loop sleeps between checks of the running flag
const RUN_LOOP_SLICE: Duration = Duration::from_millis(100);

/// CGEventTap-backed hook
pub struct EventTapBackend;

impl HookBackend for EventTapBackend {
    fn install(&self, filter: Arc<EventFilter>) -> Result<Box<dyn HookHandle>, HookError> {
        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), HookError>>();

        let thread_running = Arc::clone(&running);
        let thread = thread::Builder::new()
            .name("event-tap".to_string())
            .spawn(move || {
                info!("event tap thread started");

                if let Err(e) = run_event_loop(filter, thread_running, &ready_tx) {
                    let _ = ready_tx.send(Err(e));
                }

                info!("event tap thread stopped");
            })
            .map_err(|e| HookError::ThreadSpawn(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Box::new(TapHandle {
                running,
                thread: Some(thread),
            })),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => Err(HookError::TapThreadExited),
        }
    }
}

/// Keeps the tap thread alive until removed
struct TapHandle {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl HookHandle for TapHandle {
    fn remove(mut self: Box<Self>) {
        self.running.store(false, Ordering::SeqCst);

        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("event tap thread panicked");
            }
        }
    }
}

/// Event types the tap listens to
fn events_of_interest(block_mouse: bool) -> Vec<CGEventType> {
    let mut events = vec![
        CGEventType::KeyDown,
        CGEventType::KeyUp,
        CGEventType::FlagsChanged,
    ];
    if block_mouse {
        events.extend([
            CGEventType::LeftMouseDown,
            CGEventType::LeftMouseUp,
            CGEventType::RightMouseDown,
            CGEventType::RightMouseUp,
            CGEventType::OtherMouseDown,
            CGEventType::OtherMouseUp,
            CGEventType::ScrollWheel,
        ]);
    }
    events
}

/// Run the CFRunLoop with the event tap
fn run_event_loop(
    filter: Arc<EventFilter>,
    running: Arc<AtomicBool>,
    ready: &mpsc::Sender<Result<(), HookError>>,
) -> Result<(), HookError> {
    let callback_filter = Arc::clone(&filter);

    // Must stay fast and non-blocking: the filter only touches atomics
    let callback = move |_proxy: CGEventTapProxy,
                         event_type: CGEventType,
                         event: &CGEvent|
                         -> Option<CGEvent> {
        let kind = match event_type {
            CGEventType::KeyDown => InputKind::KeyDown,
            CGEventType::KeyUp => InputKind::KeyUp,
            CGEventType::FlagsChanged => InputKind::FlagsChanged,
            CGEventType::TapDisabledByTimeout | CGEventType::TapDisabledByUserInput => {
                callback_filter.tap_disabled();
                return None;
            }
            _ => InputKind::Mouse,
        };

        let input = RawInput {
            kind,
            key_code: event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE) as u16,
            modifiers: Modifiers::from_flags(event.get_flags()),
        };

        match callback_filter.decide(input) {
            Verdict::Pass => None,
            Verdict::Suppress => {
                let consumed = event.clone();
                consumed.set_type(CGEventType::Null);
                Some(consumed)
            }
        }
    };

    let tap = CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::Default,
        events_of_interest(filter.blocks_mouse()),
        callback,
    )
    .map_err(|_| {
        error!("failed to create event tap - is Accessibility permission granted?");
        HookError::EventTapCreation
    })?;

    let run_loop_source = tap
        .mach_port
        .create_runloop_source(0)
        .map_err(|_| HookError::RunLoopSource)?;
    let run_loop = CFRunLoop::get_current();

    unsafe {
        run_loop.add_source(&run_loop_source, kCFRunLoopCommonModes);
    }

    tap.enable();
    let _ = ready.send(Ok(()));
    info!("event tap created and enabled");

    let port = tap.mach_port.as_concrete_TypeRef();

    while running.load(Ordering::SeqCst) {
        unsafe {
            CFRunLoop::run_in_mode(kCFRunLoopDefaultMode, RUN_LOOP_SLICE, true);
        }

        // macOS turns slow taps off; keep ours on while installed
        if running.load(Ordering::SeqCst) && !unsafe { CGEventTapIsEnabled(port) } {
            warn!("event tap was disabled by macOS, re-enabling");
            unsafe { CGEventTapEnable(port, true) };
        }
    }

    // Tap is removed when it goes out of scope
    Ok(())
}
