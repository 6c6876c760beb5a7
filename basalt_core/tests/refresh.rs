// Copyright 2026 the Basalt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! End-to-end refresh cycles: invalidate, paint, dispatch, flush.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use basalt_core::area::Area;
use basalt_core::color::{Color, ColorFormat};
use basalt_core::display::{Display, DisplayConfig, DisplayEvent};
use basalt_core::engine::Engine;
use basalt_core::error::RenderError;
use basalt_core::flush::{FlushFrame, FlushState};
use basalt_core::invalidate::InvalidationConfig;
use basalt_core::layer::Layer;
use basalt_core::renderer::Renderers;
use basalt_core::target::DrawTarget;
use basalt_core::task::{TaskKind, TaskView};
use basalt_core::time::{Duration, HostTime, ManualClock};
use basalt_core::unit::ExecutionMode;

const RED: Color = Color::rgb(255, 0, 0);
const BLUE: Color = Color::rgb(0, 0, 255);

/// Fills rectangle tasks with the `Color` in their descriptor.
fn color_fill() -> Renderers {
    Renderers::new().with(TaskKind::Rectangle, |t: &mut DrawTarget, v: &TaskView| {
        if let Some(color) = v.descriptor::<Color>() {
            t.fill(&v.area, *color);
        }
    })
}

/// A flushed frame as seen by the hardware.
#[derive(Debug)]
struct Flushed {
    area: Area,
    last: bool,
    format: ColorFormat,
    bytes: usize,
    width: u32,
    pixels: Vec<Color>,
}

impl Flushed {
    fn at(&self, x: u32, y: u32) -> Color {
        self.pixels[(y * self.width + x) as usize]
    }
}

type Frames = Arc<Mutex<Vec<Flushed>>>;

/// Records every frame and acknowledges it right away.
fn acking_target(display: &Display) -> Frames {
    let frames = Frames::default();
    let sink = Arc::clone(&frames);
    display.set_flush_target(move |frame: FlushFrame| {
        let (width, pixels) = frame.buffer().map_or((0, Vec::new()), |buf| {
            let mut px = Vec::new();
            if buf.format() == ColorFormat::Rgb888 || buf.format() == ColorFormat::Argb8888 {
                for y in 0..buf.height() {
                    for x in 0..buf.width() {
                        px.push(buf.pixel(x, y));
                    }
                }
            }
            (buf.width(), px)
        });
        sink.lock().unwrap().push(Flushed {
            area: frame.area(),
            last: frame.is_last(),
            format: frame.format(),
            bytes: frame.pixels().len(),
            width,
            pixels,
        });
        frame.ready();
    });
    frames
}

/// Paints the whole region with `color`.
fn solid_painter(display: &Display, color: Color) {
    display.set_painter(move |_: &Display, base: &Arc<Layer>, area: &Area| {
        base.push_task(TaskKind::Rectangle, *area, Arc::new(color));
    });
}

fn setup(config: DisplayConfig) -> (Engine, Arc<Display>, Frames) {
    let engine = Engine::new();
    let display = engine.create_display(config.with_format(ColorFormat::Rgb888)).unwrap();
    display.add_software_unit(color_fill(), ExecutionMode::Inline);
    let frames = acking_target(&display);
    (engine, display, frames)
}

#[test]
fn overlapping_invalidations_render_as_one_area() {
    let engine = Engine::new();
    let config = DisplayConfig::partial(32, 32, 32)
        .with_format(ColorFormat::Rgb888)
        .with_invalidation(InvalidationConfig::DEFAULT.with_merge_slack(200));
    let display = engine.create_display(config).unwrap();
    display.add_software_unit(color_fill(), ExecutionMode::Inline);
    solid_painter(&display, RED);
    let frames = acking_target(&display);

    display.invalidate(&Area::new(0, 0, 10, 10));
    display.invalidate(&Area::new(5, 5, 15, 15));
    let report = engine.refresh(&display).unwrap();
    assert_eq!(report.dirty.areas(), &[Area::new(0, 0, 15, 15)]);

    let frames = frames.lock().unwrap();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].area, Area::new(0, 0, 15, 15));
}

#[test]
fn disjoint_tasks_on_two_units_flush_once() {
    disjoint_tasks_flush_once(&color_fill(), ExecutionMode::Inline);
}

fn disjoint_tasks_flush_once(renderers: &Renderers, mode: ExecutionMode) {
    let engine = Engine::new();
    let display = engine
        .create_display(DisplayConfig::partial(32, 8, 8).with_format(ColorFormat::Rgb888))
        .unwrap();
    display.add_software_units(2, renderers, mode);
    let frames = acking_target(&display);
    display.set_painter(|_: &Display, base: &Arc<Layer>, _: &Area| {
        for x in [0, 10, 20] {
            base.push_task(TaskKind::Rectangle, Area::new(x, 0, x + 7, 7), Arc::new(BLUE));
        }
    });

    let union = Area::new(0, 0, 27, 7);
    display.invalidate(&union);
    let report = engine.refresh(&display).unwrap();
    assert_eq!(report.tasks, 3);
    assert!(display.base_layer().is_drained(), "every task reached ready");

    let frames = frames.lock().unwrap();
    assert_eq!(frames.len(), 1, "one flush for the union");
    assert_eq!(frames[0].area, union);
    assert_eq!(frames[0].at(0, 0), BLUE);
    assert_eq!(frames[0].at(8, 0), Color::BLACK, "gap between tasks untouched");
    assert_eq!(frames[0].at(27, 7), BLUE);
}

#[test]
fn overflow_collapses_to_full_screen_redraw() {
    let engine = Engine::new();
    let config = DisplayConfig::partial(16, 16, 16)
        .with_format(ColorFormat::Rgb888)
        .with_invalidation(InvalidationConfig::DEFAULT.with_capacity(4));
    let display = engine.create_display(config).unwrap();
    display.add_software_unit(color_fill(), ExecutionMode::Inline);
    solid_painter(&display, RED);
    let frames = acking_target(&display);

    for i in 0..5 {
        display.invalidate(&Area::new(i * 3, i * 3, i * 3, i * 3));
    }
    assert_eq!(display.overflow_count(), 1);
    assert_eq!(display.dirty_areas(), vec![display.screen_area()]);

    engine.refresh(&display).unwrap();
    let frames = frames.lock().unwrap();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].area, Area::new(0, 0, 15, 15));
}

#[test]
fn flushing_until_asynchronous_acknowledgment() {
    let clock = Arc::new(ManualClock::new(HostTime(0)));
    let engine = Engine::new().with_clock(clock.clone());
    let display = engine
        .create_display(
            DisplayConfig::partial(8, 8, 8)
                .with_format(ColorFormat::Rgb888)
                .with_double_buffer(),
        )
        .unwrap();
    display.add_software_unit(color_fill(), ExecutionMode::Inline);
    solid_painter(&display, RED);

    let pending: Arc<Mutex<Option<FlushFrame>>> = Arc::default();
    let hold = Arc::clone(&pending);
    display.set_flush_target(move |frame: FlushFrame| {
        *hold.lock().unwrap() = Some(frame);
    });

    let before = display.active_buffer();
    display.invalidate_all();
    engine.refresh(&display).unwrap();

    for _ in 0..5 {
        assert_eq!(display.flush_state(), FlushState::Flushing);
        clock.advance(Duration(1));
    }
    let frame = pending.lock().unwrap().take().expect("frame was submitted");
    assert!(frame.is_last(), "single band is the last chunk");
    frame.ready();

    assert_eq!(display.flush_state(), FlushState::Idle);
    assert_ne!(display.active_buffer(), before, "double buffers swapped");
}

#[test]
fn partial_mode_flushes_bands_with_one_last_chunk() {
    let (engine, display, frames) = setup(DisplayConfig::partial(16, 8, 2));
    solid_painter(&display, RED);

    display.invalidate_all();
    let report = engine.refresh(&display).unwrap();
    assert_eq!(report.flushes, 4, "8 rows in bands of 2");

    let frames = frames.lock().unwrap();
    let areas: Vec<_> = frames.iter().map(|f| f.area).collect();
    assert_eq!(
        areas,
        vec![
            Area::new(0, 0, 15, 1),
            Area::new(0, 2, 15, 3),
            Area::new(0, 4, 15, 5),
            Area::new(0, 6, 15, 7),
        ]
    );
    let lasts: Vec<_> = frames.iter().map(|f| f.last).collect();
    assert_eq!(lasts, vec![false, false, false, true]);
    assert!(frames.iter().all(|f| f.at(3, 1) == RED), "every band painted");
}

#[test]
fn narrow_areas_get_taller_bands() {
    let (engine, display, frames) = setup(DisplayConfig::partial(16, 8, 2));
    solid_painter(&display, RED);

    // Four columns wide: the 32-pixel buffer holds eight rows.
    display.invalidate(&Area::new(0, 0, 3, 7));
    display.invalidate(&Area::new(10, 0, 13, 7));
    engine.refresh(&display).unwrap();

    let frames = frames.lock().unwrap();
    assert_eq!(frames.len(), 2);
    assert!(!frames[0].last, "first area is not the last chunk");
    assert!(frames[1].last, "second area ends the refresh");
}

#[test]
fn direct_mode_syncs_the_other_buffer() {
    let (engine, display, frames) = setup(DisplayConfig::direct(8, 8).with_double_buffer());
    let color = Arc::new(Mutex::new(RED));
    let paint = Arc::clone(&color);
    display.set_painter(move |_: &Display, base: &Arc<Layer>, area: &Area| {
        base.push_task(TaskKind::Rectangle, *area, Arc::new(*paint.lock().unwrap()));
    });

    display.invalidate_all();
    engine.refresh(&display).unwrap();

    *color.lock().unwrap() = BLUE;
    display.invalidate(&Area::new(0, 0, 3, 3));
    engine.refresh(&display).unwrap();

    let frames = frames.lock().unwrap();
    assert_eq!(frames.len(), 2);
    let second = &frames[1];
    assert_eq!(second.area, Area::new(0, 0, 3, 3));
    assert!(second.last, "single area is last");
    assert_eq!(second.at(0, 0), BLUE, "redrawn area");
    assert_eq!(second.at(7, 7), RED, "copied from the first buffer");
}

#[test]
fn direct_mode_flushes_each_area() {
    let (engine, display, frames) = setup(DisplayConfig::direct(16, 16));
    solid_painter(&display, BLUE);

    display.invalidate(&Area::new(0, 0, 3, 3));
    display.invalidate(&Area::new(8, 8, 11, 11));
    let report = engine.refresh(&display).unwrap();
    assert_eq!(report.flushes, 2);

    let frames = frames.lock().unwrap();
    assert_eq!(frames[0].width, 16, "direct buffers span the screen");
    assert!(!frames[0].last && frames[1].last, "only the final area is last");
    assert_eq!(frames[1].at(9, 9), BLUE);
    assert_eq!(frames[1].at(0, 0), BLUE, "earlier area kept in the same buffer");
}

#[test]
fn full_mode_redraws_the_screen() {
    let (engine, display, frames) = setup(DisplayConfig::full(8, 8));
    solid_painter(&display, RED);

    display.invalidate(&Area::new(2, 2, 3, 3));
    let report = engine.refresh(&display).unwrap();
    assert_eq!(report.dirty.areas(), &[display.screen_area()]);

    let frames = frames.lock().unwrap();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].area, display.screen_area());
    assert_eq!(frames[0].at(7, 7), RED);
}

#[test]
fn bands_are_converted_to_the_flush_format() {
    let engine = Engine::new();
    let display = engine
        .create_display(
            DisplayConfig::partial(8, 4, 4)
                .with_format(ColorFormat::Argb8888)
                .with_flush_format(ColorFormat::Rgb565),
        )
        .unwrap();
    display.add_software_unit(color_fill(), ExecutionMode::Inline);
    solid_painter(&display, RED);
    let frames = acking_target(&display);

    display.invalidate_all();
    engine.refresh(&display).unwrap();
    display.invalidate_all();
    engine.refresh(&display).unwrap();

    let frames = frames.lock().unwrap();
    assert_eq!(frames.len(), 2, "buffer reusable after conversion");
    for f in frames.iter() {
        assert_eq!(f.format, ColorFormat::Rgb565);
        assert_eq!(f.bytes, 8 * 4 * 2);
    }
}

#[test]
fn missing_flush_target_keeps_areas_dirty() {
    let engine = Engine::new();
    let display = engine.create_display(DisplayConfig::partial(8, 8, 8)).unwrap();
    display.add_software_unit(color_fill(), ExecutionMode::Inline);

    let area = Area::new(1, 1, 4, 4);
    display.invalidate(&area);
    assert_eq!(
        engine.refresh(&display),
        Err(RenderError::NoFlushTarget(display.id()))
    );
    assert_eq!(display.dirty_areas(), vec![area]);
}

#[test]
fn failed_refresh_keeps_areas_dirty_while_paused() {
    let engine = Engine::new();
    let display = engine.create_display(DisplayConfig::partial(8, 8, 8)).unwrap();
    display.add_software_unit(color_fill(), ExecutionMode::Inline);

    let area = Area::new(0, 0, 7, 7);
    display.invalidate(&area);
    let _paused = display.pause_invalidation();
    assert_eq!(
        engine.refresh(&display),
        Err(RenderError::NoFlushTarget(display.id()))
    );
    assert_eq!(display.dirty_areas(), vec![area]);
}

#[test]
fn aborted_refresh_keeps_areas_dirty_while_paused() {
    let engine = Engine::new();
    let display = engine
        .create_display(DisplayConfig::partial(8, 8, 8).with_format(ColorFormat::Rgb888))
        .unwrap();
    solid_painter(&display, RED);
    let frames = acking_target(&display);

    let area = Area::new(2, 2, 5, 5);
    display.invalidate(&area);
    let paused = display.pause_invalidation();
    assert_eq!(
        engine.refresh(&display),
        Err(RenderError::NoRenderUnits(display.id()))
    );
    drop(paused);
    assert_eq!(display.dirty_areas(), vec![area]);

    display.add_software_unit(color_fill(), ExecutionMode::Inline);
    engine.refresh(&display).unwrap();
    assert_eq!(frames.lock().unwrap()[0].area, area);
}

#[test]
fn missing_units_abort_and_retry_later() {
    let engine = Engine::new();
    let display = engine
        .create_display(DisplayConfig::partial(8, 8, 8).with_format(ColorFormat::Rgb888))
        .unwrap();
    solid_painter(&display, RED);
    let frames = acking_target(&display);

    let area = Area::new(0, 0, 7, 3);
    display.invalidate(&area);
    assert_eq!(
        engine.refresh(&display),
        Err(RenderError::NoRenderUnits(display.id()))
    );
    assert_eq!(display.dirty_areas(), vec![area], "areas requeued");
    assert!(!display.base_layer().has_queued(), "queued tasks discarded");
    assert!(!display.is_refreshing(), "refresh ended");
    assert!(frames.lock().unwrap().is_empty(), "nothing flushed");

    display.add_software_unit(color_fill(), ExecutionMode::Inline);
    let report = engine.refresh(&display).unwrap();
    assert_eq!(report.flushes, 1, "draw buffer was returned to its slot");
    assert_eq!(frames.lock().unwrap()[0].at(0, 0), RED);
}

#[test]
fn layer_allocation_failure_aborts_the_refresh() {
    let engine = Engine::new();
    let display = engine
        .create_display(
            DisplayConfig::partial(8, 8, 8)
                .with_format(ColorFormat::Rgb888)
                .with_layer_memory_limit(64),
        )
        .unwrap();
    display.add_software_unit(color_fill(), ExecutionMode::Inline);
    let frames = acking_target(&display);
    display.set_painter(|d: &Display, base: &Arc<Layer>, area: &Area| {
        let fx = d.create_layer(*area, ColorFormat::Argb8888);
        fx.push_task(TaskKind::Rectangle, *area, Arc::new(RED));
        base.push_composite(*area, &fx, Arc::new(()));
    });

    display.invalidate_all();
    let err = engine.refresh(&display).unwrap_err();
    assert!(
        matches!(err, RenderError::BufferAlloc { bytes: 256, .. }),
        "got {err:?}"
    );
    assert_eq!(display.layers().len(), 1, "transient layer pruned");
    assert_eq!(display.dirty_areas(), vec![display.screen_area()]);
    assert_eq!(
        display.memory_budget().map(|b| b.used()),
        Some(0),
        "nothing left charged"
    );
    assert!(frames.lock().unwrap().is_empty(), "nothing flushed");
}

#[test]
fn refresh_emits_lifecycle_events() {
    let (engine, display, _frames) = setup(DisplayConfig::partial(8, 8, 4));
    solid_painter(&display, RED);
    let events: Arc<Mutex<Vec<DisplayEvent>>> = Arc::default();
    let log = Arc::clone(&events);
    display.set_event_handler(move |_, e| log.lock().unwrap().push(*e));

    display.invalidate_all();
    engine.refresh(&display).unwrap();

    let events = events.lock().unwrap();
    assert_eq!(
        *events,
        vec![
            DisplayEvent::InvalidatedArea(display.screen_area()),
            DisplayEvent::RenderStart,
            DisplayEvent::RenderReady,
            DisplayEvent::RenderReady,
        ]
    );
}

#[test]
fn idle_refresh_does_nothing() {
    let (engine, display, frames) = setup(DisplayConfig::partial(8, 8, 8));
    let report = engine.refresh(&display).unwrap();
    assert!(report.is_idle(), "nothing was dirty");
    assert_eq!(display.refresh_count(), 0, "idle refreshes are not counted");
    assert!(frames.lock().unwrap().is_empty(), "nothing flushed");
}

#[test]
fn refresh_all_covers_every_display() {
    let engine = Engine::new();
    let flushed = Arc::new(AtomicU64::new(0));
    for _ in 0..3 {
        let display = engine.create_display(DisplayConfig::partial(8, 8, 8)).unwrap();
        display.add_software_unit(color_fill(), ExecutionMode::Inline);
        let count = Arc::clone(&flushed);
        display.set_flush_target(move |frame: FlushFrame| {
            count.fetch_add(1, Ordering::Relaxed);
            frame.ready();
        });
        display.invalidate_all();
    }
    let results = engine.refresh_all();
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|(_, r)| r.is_ok()), "all refreshed");
    assert_eq!(flushed.load(Ordering::Relaxed), 3);
}

#[cfg(feature = "trace")]
mod tracing {
    use super::*;
    use basalt_core::trace::{FlushEvent, FlushStage, RefreshSummary, TaskEvent, TraceSink, Tracer};

    #[derive(Default)]
    struct Counts {
        tasks: usize,
        submits: usize,
        readies: usize,
        summaries: Vec<RefreshSummary>,
    }

    impl TraceSink for Counts {
        fn on_task(&mut self, _: &TaskEvent) {
            self.tasks += 1;
        }

        fn on_flush(&mut self, e: &FlushEvent) {
            match e.stage {
                FlushStage::Submit => self.submits += 1,
                FlushStage::Ready => self.readies += 1,
            }
        }

        fn on_refresh_summary(&mut self, s: &RefreshSummary) {
            self.summaries.push(*s);
        }
    }

    #[test]
    fn refresh_is_traced() {
        let (tracer, counts) = Tracer::with_sink(Counts::default());
        let engine = Engine::new().with_tracer(tracer);
        let display = engine
            .create_display(DisplayConfig::partial(8, 8, 4).with_format(ColorFormat::Rgb888))
            .unwrap();
        display.add_software_unit(color_fill(), ExecutionMode::Inline);
        solid_painter(&display, RED);
        let _frames = acking_target(&display);

        display.invalidate_all();
        engine.refresh(&display).unwrap();

        let counts = counts.lock();
        assert_eq!(counts.tasks, 4, "claimed and ready for two tasks");
        assert_eq!(counts.submits, 2);
        assert_eq!(counts.readies, 2, "every flush acknowledged");
        assert_eq!(counts.summaries.len(), 1);
        assert_eq!(counts.summaries[0].tasks, 2);
        assert_eq!(counts.summaries[0].flushes, 2);
        assert_eq!(counts.summaries[0].dirty_areas, 1);
    }
}

#[cfg(feature = "std")]
mod workers {
    use super::*;
    use std::thread;

    /// Start and end ticks of every rendered task, by area.
    type Spans = Arc<Mutex<Vec<(Area, u64, u64)>>>;

    fn recording_fill(spans: &Spans, seq: &Arc<AtomicU64>) -> Renderers {
        let spans = Arc::clone(spans);
        let seq = Arc::clone(seq);
        Renderers::new().with(TaskKind::Rectangle, move |t: &mut DrawTarget, v: &TaskView| {
            let start = seq.fetch_add(1, Ordering::SeqCst);
            thread::sleep(std::time::Duration::from_millis(2));
            if let Some(color) = v.descriptor::<Color>() {
                t.fill(&v.area, *color);
            }
            let end = seq.fetch_add(1, Ordering::SeqCst);
            spans.lock().unwrap().push((v.area, start, end));
        })
    }

    #[test]
    fn disjoint_tasks_run_side_by_side_and_flush_once() {
        let spans = Spans::default();
        let seq = Arc::new(AtomicU64::new(0));
        disjoint_tasks_flush_once(&recording_fill(&spans, &seq), ExecutionMode::Worker);

        let spans = spans.lock().unwrap();
        assert_eq!(spans.len(), 3);
        let concurrent = spans
            .iter()
            .enumerate()
            .any(|(i, a)| spans[i + 1..].iter().any(|b| a.1 < b.2 && b.1 < a.2));
        assert!(concurrent, "two workers rendered at the same time: {spans:?}");
    }

    #[test]
    fn overlapping_tasks_never_run_concurrently() {
        let spans = Spans::default();
        let seq = Arc::new(AtomicU64::new(0));
        let engine = Engine::new();
        let display = engine
            .create_display(DisplayConfig::partial(32, 8, 8).with_format(ColorFormat::Rgb888))
            .unwrap();
        display.add_software_units(2, &recording_fill(&spans, &seq), ExecutionMode::Worker);
        let frames = acking_target(&display);

        let first = Area::new(0, 0, 15, 7);
        let second = Area::new(8, 0, 23, 7);
        display.set_painter(move |_: &Display, base: &Arc<Layer>, _: &Area| {
            base.push_task(TaskKind::Rectangle, first, Arc::new(RED));
            base.push_task(TaskKind::Rectangle, second, Arc::new(BLUE));
        });

        display.invalidate_all();
        let report = engine.refresh(&display).unwrap();
        assert_eq!(report.tasks, 2);

        let spans = spans.lock().unwrap();
        let (_, _, first_end) = spans.iter().find(|s| s.0 == first).unwrap();
        let (_, second_start, _) = spans.iter().find(|s| s.0 == second).unwrap();
        assert!(first_end < second_start, "second task started before the first ended");

        let frames = frames.lock().unwrap();
        assert_eq!(frames[0].at(10, 0), BLUE, "later task wins the overlap");
        assert_eq!(frames[0].at(2, 0), RED);
    }

    #[test]
    fn disjoint_tasks_each_run_once_across_workers() {
        let spans = Spans::default();
        let seq = Arc::new(AtomicU64::new(0));
        let engine = Engine::new();
        let display = engine
            .create_display(DisplayConfig::partial(64, 8, 8).with_format(ColorFormat::Rgb888))
            .unwrap();
        display.add_software_units(4, &recording_fill(&spans, &seq), ExecutionMode::Worker);
        let frames = acking_target(&display);
        display.set_painter(|_: &Display, base: &Arc<Layer>, _: &Area| {
            for i in 0..16 {
                let x = i * 4;
                base.push_task(TaskKind::Rectangle, Area::new(x, 0, x + 3, 7), Arc::new(BLUE));
            }
        });

        display.invalidate_all();
        let report = engine.refresh(&display).unwrap();
        assert_eq!(report.tasks, 16);

        let spans = spans.lock().unwrap();
        assert_eq!(spans.len(), 16, "each task rendered exactly once");
        let mut areas: Vec<_> = spans.iter().map(|s| s.0.x1).collect();
        areas.sort_unstable();
        areas.dedup();
        assert_eq!(areas.len(), 16, "no task claimed twice");

        let frames = frames.lock().unwrap();
        assert!((0..64).all(|x| frames[0].at(x, 4) == BLUE), "whole row painted");
    }

    #[test]
    fn acknowledgment_from_another_thread() {
        let engine = Engine::new();
        let display = engine
            .create_display(DisplayConfig::partial(8, 8, 2).with_format(ColorFormat::Rgb888))
            .unwrap();
        display.add_software_unit(color_fill(), ExecutionMode::Worker);
        solid_painter(&display, RED);

        let (tx, rx) = std::sync::mpsc::channel::<FlushFrame>();
        let panel = thread::spawn(move || {
            let mut n = 0;
            for frame in rx {
                thread::sleep(std::time::Duration::from_millis(1));
                frame.ready();
                n += 1;
            }
            n
        });
        display.set_flush_target(move |frame: FlushFrame| {
            tx.send(frame).unwrap();
        });

        display.invalidate_all();
        let report = engine.refresh(&display).unwrap();
        assert_eq!(report.flushes, 4);

        display.set_flush_target(|frame: FlushFrame| frame.ready());
        assert_eq!(panel.join().unwrap(), 4);
        assert_eq!(display.flush_state(), FlushState::Idle);
    }
}
