// Copyright 2026 the Basalt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Simulated display refresh that exercises the whole pipeline.
//!
//! A 240x160 panel in partial mode with two draw buffers is driven by two
//! worker render units. Each frame a card slides across the screen; the old
//! and new card positions are invalidated and the display is refreshed. A
//! "panel" thread receives flushed bands and acknowledges them after a short
//! transfer delay.
//!
//! Events go to both a [`PrettyPrintSink`] (stdout) and a [`RecorderSink`];
//! the recording is exported as a Chrome trace at the end.

use std::fs::File;
use std::io::BufWriter;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use basalt_core::area::Area;
use basalt_core::color::{Color, ColorFormat};
use basalt_core::display::{Display, DisplayConfig};
use basalt_core::engine::Engine;
use basalt_core::flush::FlushFrame;
use basalt_core::layer::Layer;
use basalt_core::output::DisplayId;
use basalt_core::task::TaskKind;
use basalt_core::time::Timebase;
use basalt_core::trace::{
    DamageRect, DirtyOverflowEvent, FlushEvent, PhaseBeginEvent, PhaseEndEvent,
    RefreshBeginEvent, RefreshSummary, TaskEvent, TraceSink, Tracer,
};
use basalt_core::unit::ExecutionMode;
use basalt_render::{LayerDescriptor, RectDescriptor, software_renderers};

use basalt_debug::pretty::PrettyPrintSink;
use basalt_debug::recorder::RecorderSink;

const FRAME_COUNT: u32 = 30;
const WIDTH: u32 = 240;
const HEIGHT: u32 = 160;
const BAND_ROWS: u32 = 40;
const CARD: Area = Area::from_origin_size(0, 50, 60, 40);
/// Simulated bus transfer time per flushed band.
const TRANSFER: Duration = Duration::from_micros(300);

/// Forwards every event to a pretty printer and a recorder.
struct Tee {
    pretty: PrettyPrintSink,
    recorder: RecorderSink,
}

impl TraceSink for Tee {
    fn on_refresh_begin(&mut self, e: &RefreshBeginEvent) {
        self.pretty.on_refresh_begin(e);
        self.recorder.on_refresh_begin(e);
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        self.pretty.on_phase_begin(e);
        self.recorder.on_phase_begin(e);
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        self.pretty.on_phase_end(e);
        self.recorder.on_phase_end(e);
    }

    fn on_task(&mut self, e: &TaskEvent) {
        self.pretty.on_task(e);
        self.recorder.on_task(e);
    }

    fn on_flush(&mut self, e: &FlushEvent) {
        self.pretty.on_flush(e);
        self.recorder.on_flush(e);
    }

    fn on_dirty_overflow(&mut self, e: &DirtyOverflowEvent) {
        self.pretty.on_dirty_overflow(e);
        self.recorder.on_dirty_overflow(e);
    }

    fn on_refresh_summary(&mut self, s: &RefreshSummary) {
        self.pretty.on_refresh_summary(s);
        self.recorder.on_refresh_summary(s);
    }

    fn on_dirty_areas(&mut self, display: DisplayId, refresh_index: u64, rects: &[DamageRect]) {
        self.pretty.on_dirty_areas(display, refresh_index, rects);
        self.recorder.on_dirty_areas(display, refresh_index, rects);
    }
}

fn main() {
    let timebase = Timebase::NANOS;

    // -- sinks -------------------------------------------------------------
    let (tracer, sinks) = Tracer::with_sink(Tee {
        pretty: PrettyPrintSink::new(Box::new(std::io::stdout()), timebase),
        recorder: RecorderSink::new(),
    });

    // -- display -----------------------------------------------------------
    let engine = Engine::new().with_tracer(tracer);
    let display = engine
        .create_display(
            DisplayConfig::partial(WIDTH, HEIGHT, BAND_ROWS)
                .with_format(ColorFormat::Rgb565)
                .with_double_buffer(),
        )
        .expect("demo display config is valid");
    display.add_software_units(2, &software_renderers(), ExecutionMode::Worker);

    // -- panel -------------------------------------------------------------
    let (frames_tx, frames_rx) = mpsc::channel::<FlushFrame>();
    let panel = thread::spawn(move || {
        let mut bands = 0_u32;
        for frame in frames_rx {
            thread::sleep(TRANSFER);
            bands += 1;
            frame.ready();
        }
        bands
    });
    display.set_flush_target(move |frame: FlushFrame| {
        if let Err(mpsc::SendError(frame)) = frames_tx.send(frame) {
            // Panel is gone; hand the buffer straight back.
            frame.ready();
        }
    });
    display.set_wait_callback(|_| thread::yield_now());

    // -- scene -------------------------------------------------------------
    let card_x = Arc::new(AtomicI32::new(0));
    let painter_x = Arc::clone(&card_x);
    display.set_painter(move |d: &Display, base: &Arc<Layer>, area: &Area| {
        base.push_task(
            TaskKind::Rectangle,
            *area,
            Arc::new(RectDescriptor::solid(Color::rgb(20, 24, 32))),
        );

        let card = CARD.translate(painter_x.load(Ordering::Relaxed), 0);
        if !card.overlaps(area) {
            return;
        }
        // The card is drawn into its own layer and composited with a little
        // transparency, like a widget with an opacity style.
        let layer = d.create_layer(card, ColorFormat::Argb8888);
        layer.push_task(
            TaskKind::Rectangle,
            card,
            Arc::new(RectDescriptor::solid(Color::rgb(80, 160, 255)).with_border(Color::WHITE, 2)),
        );
        base.push_composite(card, &layer, Arc::new(LayerDescriptor { opa: 220 }));
    });

    // -- frames ------------------------------------------------------------
    display.invalidate_all();
    let mut flushes = 0;
    for frame in 0..FRAME_COUNT {
        if frame > 0 {
            let old = CARD.translate(card_x.load(Ordering::Relaxed), 0);
            let next = (card_x.load(Ordering::Relaxed) + 6) % (WIDTH as i32);
            card_x.store(next, Ordering::Relaxed);
            display.invalidate(&old);
            display.invalidate(&CARD.translate(next, 0));
        }
        let report = engine.refresh(&display).expect("refresh failed");
        flushes += report.flushes;
    }

    // Replacing the flush target drops the sender so the panel thread ends.
    display.set_flush_target(|frame: FlushFrame| frame.ready());
    let bands = panel.join().expect("panel thread panicked");
    println!("{FRAME_COUNT} frames, {flushes} flushes, {bands} bands on the panel");

    // -- export Chrome trace -----------------------------------------------
    let path = "trace.json";
    let file = File::create(path).expect("failed to create trace.json");
    let mut writer = BufWriter::new(file);
    let sinks = sinks.lock();
    basalt_debug::chrome::export(sinks.recorder.as_bytes(), timebase, &mut writer)
        .expect("failed to write Chrome trace");

    println!("Wrote {path}");
}
