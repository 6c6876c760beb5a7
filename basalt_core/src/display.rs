// Copyright 2026 the Basalt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Displays: the state one refresh cycle works on.
//!
//! A [`Display`] ties together everything that belongs to one screen: its
//! geometry and pixel formats, the draw buffers and their flush handoff, the
//! invalidation tracker, the layers painters draw into, the render units that
//! execute draw tasks, and the callbacks to the outside world (flush target,
//! wait callback, painter, event handler).
//!
//! Displays are created by [`Engine::create_display`](crate::engine::Engine::create_display)
//! from a [`DisplayConfig`] and shared as `Arc<Display>`. Every method takes
//! `&self`; each piece of mutable state sits behind its own lock so
//! invalidation from an input thread never waits on rendering.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use crate::area::Area;
use crate::buffer::{MemoryBudget, PixelBuffer};
use crate::color::ColorFormat;
use crate::error::{ConfigError, ProtocolViolation, RenderError};
use crate::flush::{FlushState, FlushTarget, Handoff, WaitCallback};
use crate::invalidate::{DirtySet, InvalidateOutcome, InvalidationConfig, InvalidationTracker};
use crate::layer::{Layer, LayerId};
use crate::output::DisplayId;
use crate::refresh::Painter;
use crate::renderer::Renderers;
use crate::sync::Signal;
use crate::time::{Clock, Duration, HostTime};
use crate::trace::{DirtyOverflowEvent, Tracer};
use crate::unit::{
    Accelerated, AcceleratedUnit, Accelerator, ExecutionMode, RenderUnit, SoftwareUnit, UnitContext,
    UnitId,
};

/// How dirty areas reach the draw buffers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RenderMode {
    /// Dirty areas are rendered in horizontal bands into a small buffer and
    /// flushed band by band.
    #[default]
    Partial,
    /// The buffer covers the whole screen; only dirty areas are redrawn, at
    /// their absolute position.
    Direct,
    /// The whole screen is redrawn on every refresh.
    Full,
}

/// Display rotation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Rotation {
    /// As configured.
    #[default]
    None,
    /// 90° clockwise; width and height swap.
    Deg90,
    /// 180°.
    Deg180,
    /// 270° clockwise; width and height swap.
    Deg270,
}

impl Rotation {
    /// Returns `true` if width and height swap.
    #[must_use]
    pub const fn is_transposed(self) -> bool {
        matches!(self, Self::Deg90 | Self::Deg270)
    }
}

/// Something the host may want to react to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayEvent {
    /// An area was accepted for redraw (already clipped to the screen).
    InvalidatedArea(Area),
    /// A refresh is about to paint.
    RenderStart,
    /// All tasks of a refresh finished; flushing follows.
    RenderReady,
    /// Resolution, rotation, or another parameter changed.
    ParameterChanged,
}

/// Receives [`DisplayEvent`]s.
pub type EventHandler = dyn Fn(DisplayId, &DisplayEvent) + Send + Sync;

/// Display settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayConfig {
    /// Horizontal resolution before rotation.
    pub width: u32,
    /// Vertical resolution before rotation.
    pub height: u32,
    /// Format tasks render in.
    pub format: ColorFormat,
    /// Format handed to the flush target, when it differs from `format`.
    pub flush_format: Option<ColorFormat>,
    /// How dirty areas reach the buffers.
    pub render_mode: RenderMode,
    /// Pixels per draw buffer.
    pub buffer_pixels: usize,
    /// Allocate a second draw buffer.
    pub double_buffered: bool,
    /// Dots per inch.
    pub dpi: u32,
    /// Initial rotation.
    pub rotation: Rotation,
    /// Panel offset added to flushed areas.
    pub offset: (i32, i32),
    /// Whether renderers should antialias.
    pub antialiasing: bool,
    /// Clear each band before painting so the screen can be see-through.
    pub transparent: bool,
    /// Dirty area tracking.
    pub invalidation: InvalidationConfig,
    /// Byte limit for transient layer buffers.
    pub layer_memory_limit: Option<usize>,
}

/// Dots per inch assumed when nothing else is known.
pub const DEFAULT_DPI: u32 = 130;

impl DisplayConfig {
    const fn base(width: u32, height: u32, render_mode: RenderMode, buffer_pixels: usize) -> Self {
        Self {
            width,
            height,
            format: ColorFormat::Rgb565,
            flush_format: None,
            render_mode,
            buffer_pixels,
            double_buffered: false,
            dpi: DEFAULT_DPI,
            rotation: Rotation::None,
            offset: (0, 0),
            antialiasing: true,
            transparent: false,
            invalidation: InvalidationConfig::DEFAULT,
            layer_memory_limit: None,
        }
    }

    /// Partial rendering into a buffer of `rows` full-width lines.
    #[must_use]
    pub const fn partial(width: u32, height: u32, rows: u32) -> Self {
        Self::base(width, height, RenderMode::Partial, width as usize * rows as usize)
    }

    /// Direct rendering into a screen-sized buffer.
    #[must_use]
    pub const fn direct(width: u32, height: u32) -> Self {
        Self::base(width, height, RenderMode::Direct, width as usize * height as usize)
    }

    /// Full-screen rendering into a screen-sized buffer.
    #[must_use]
    pub const fn full(width: u32, height: u32) -> Self {
        Self::base(width, height, RenderMode::Full, width as usize * height as usize)
    }

    /// Sets the render format.
    #[must_use]
    pub const fn with_format(mut self, format: ColorFormat) -> Self {
        self.format = format;
        self
    }

    /// Converts each band to `format` before flushing.
    #[must_use]
    pub const fn with_flush_format(mut self, format: ColorFormat) -> Self {
        self.flush_format = Some(format);
        self
    }

    /// Enables double buffering.
    #[must_use]
    pub const fn with_double_buffer(mut self) -> Self {
        self.double_buffered = true;
        self
    }

    /// Sets the dpi.
    #[must_use]
    pub const fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi;
        self
    }

    /// Sets the initial rotation.
    #[must_use]
    pub const fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Sets the panel offset.
    #[must_use]
    pub const fn with_offset(mut self, x: i32, y: i32) -> Self {
        self.offset = (x, y);
        self
    }

    /// Makes the screen transparent.
    #[must_use]
    pub const fn with_transparent(mut self, transparent: bool) -> Self {
        self.transparent = transparent;
        self
    }

    /// Sets the dirty area tracking parameters.
    #[must_use]
    pub const fn with_invalidation(mut self, invalidation: InvalidationConfig) -> Self {
        self.invalidation = invalidation;
        self
    }

    /// Limits the bytes transient layers may allocate.
    #[must_use]
    pub const fn with_layer_memory_limit(mut self, bytes: usize) -> Self {
        self.layer_memory_limit = Some(bytes);
        self
    }

    /// Width and height after rotation.
    #[must_use]
    pub const fn logical_resolution(&self) -> (u32, u32) {
        if self.rotation.is_transposed() {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }

    /// Checks the settings are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (width, height) = self.logical_resolution();
        if width == 0 || height == 0 {
            return Err(ConfigError::ZeroResolution { width, height });
        }
        let needed = match self.render_mode {
            RenderMode::Partial => width as usize,
            RenderMode::Direct | RenderMode::Full => width as usize * height as usize,
        };
        if self.buffer_pixels < needed {
            return Err(ConfigError::BufferTooSmall {
                needed,
                available: self.buffer_pixels,
            });
        }
        if let Some(to) = self.flush_format
            && to != self.format
        {
            if self.render_mode != RenderMode::Partial {
                return Err(ConfigError::ConversionRequiresPartial);
            }
            if !self.format.converts_in_place(to) {
                return Err(ConfigError::UnsupportedConversion {
                    from: self.format,
                    to,
                });
            }
        }
        Ok(())
    }
}

/// Shared services a display hands to its units and handoff.
#[derive(Clone)]
pub(crate) struct Env {
    pub(crate) signal: Arc<Signal>,
    pub(crate) tracer: Tracer,
    pub(crate) clock: Arc<dyn Clock>,
}

#[derive(Clone, Copy, Debug)]
struct Params {
    width: u32,
    height: u32,
    rotation: Rotation,
    dpi: u32,
    offset: (i32, i32),
    antialiasing: bool,
    transparent: bool,
}

impl Params {
    fn logical(&self) -> (u32, u32) {
        if self.rotation.is_transposed() {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }

    fn screen(&self) -> Area {
        let (w, h) = self.logical();
        Area::from_origin_size(0, 0, to_i32(w), to_i32(h))
    }
}

fn to_i32(v: u32) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}

/// One screen and everything needed to refresh it.
pub struct Display {
    id: DisplayId,
    format: ColorFormat,
    flush_format: Option<ColorFormat>,
    mode: RenderMode,
    buffer_pixels: usize,
    full_redraw: AtomicBool,
    params: spin::Mutex<Params>,
    invalidation: spin::Mutex<InvalidationTracker>,
    layers: spin::Mutex<Vec<Arc<Layer>>>,
    next_layer: AtomicU32,
    units: spin::Mutex<Vec<Arc<dyn RenderUnit>>>,
    next_unit: AtomicU32,
    pub(crate) handoff: Handoff,
    flush_target: spin::Mutex<Option<Arc<dyn FlushTarget>>>,
    wait: spin::Mutex<Option<Arc<WaitCallback<'static>>>>,
    painter: spin::Mutex<Option<Arc<dyn Painter>>>,
    events: spin::Mutex<Option<Arc<EventHandler>>>,
    budget: Option<Arc<MemoryBudget>>,
    env: Env,
    last_activity: AtomicU64,
    refreshing: AtomicBool,
    refresh_count: AtomicU64,
    dispatch_error: spin::Mutex<Option<RenderError>>,
    previous_areas: spin::Mutex<Vec<Area>>,
}

impl Display {
    pub(crate) fn new(id: DisplayId, config: &DisplayConfig, env: Env) -> Result<Self, ConfigError> {
        config.validate()?;
        let params = Params {
            width: config.width,
            height: config.height,
            rotation: config.rotation,
            dpi: config.dpi,
            offset: config.offset,
            antialiasing: config.antialiasing,
            transparent: config.transparent,
        };
        let pixels = u32::try_from(config.buffer_pixels).map_err(|_| ConfigError::BufferTooSmall {
            needed: config.buffer_pixels,
            available: u32::MAX as usize,
        })?;
        let buffer = || PixelBuffer::new(config.format, pixels, 1);
        let handoff = Handoff::new(
            id,
            buffer(),
            config.double_buffered.then(buffer),
            env.tracer.clone(),
            Arc::clone(&env.clock),
        );
        let screen = params.screen();
        let base = Arc::new(Layer::new(
            LayerId(0),
            id,
            config.format,
            screen,
            false,
            None,
            Arc::clone(&env.signal),
        ));
        log::debug!(
            "{id}: {}x{} {:?} {:?}, {} pixel buffer{}",
            screen.width(),
            screen.height(),
            config.format,
            config.render_mode,
            config.buffer_pixels,
            if config.double_buffered { " x2" } else { "" },
        );
        Ok(Self {
            id,
            format: config.format,
            flush_format: config.flush_format.filter(|f| *f != config.format),
            mode: config.render_mode,
            buffer_pixels: config.buffer_pixels,
            full_redraw: AtomicBool::new(config.render_mode == RenderMode::Full),
            params: spin::Mutex::new(params),
            invalidation: spin::Mutex::new(InvalidationTracker::new(config.invalidation)),
            layers: spin::Mutex::new(alloc::vec![base]),
            next_layer: AtomicU32::new(1),
            units: spin::Mutex::new(Vec::new()),
            next_unit: AtomicU32::new(0),
            handoff,
            flush_target: spin::Mutex::new(None),
            wait: spin::Mutex::new(None),
            painter: spin::Mutex::new(None),
            events: spin::Mutex::new(None),
            budget: config
                .layer_memory_limit
                .map(|limit| Arc::new(MemoryBudget::limited(limit))),
            last_activity: AtomicU64::new(env.clock.now().ticks()),
            env,
            refreshing: AtomicBool::new(false),
            refresh_count: AtomicU64::new(0),
            dispatch_error: spin::Mutex::new(None),
            previous_areas: spin::Mutex::new(Vec::new()),
        })
    }

    /// The display's id.
    #[must_use]
    pub fn id(&self) -> DisplayId {
        self.id
    }

    /// Format tasks render in.
    #[must_use]
    pub fn color_format(&self) -> ColorFormat {
        self.format
    }

    /// Format the flush target receives, if it differs from the render
    /// format.
    #[must_use]
    pub fn flush_format(&self) -> Option<ColorFormat> {
        self.flush_format
    }

    /// How dirty areas reach the buffers.
    #[must_use]
    pub fn render_mode(&self) -> RenderMode {
        self.mode
    }

    /// Pixels per draw buffer.
    #[must_use]
    pub fn buffer_pixels(&self) -> usize {
        self.buffer_pixels
    }

    /// Returns `true` with two draw buffers.
    #[must_use]
    pub fn is_double_buffered(&self) -> bool {
        self.handoff.is_double_buffered()
    }

    // --- geometry -------------------------------------------------------

    /// Width and height after rotation.
    #[must_use]
    pub fn resolution(&self) -> (u32, u32) {
        self.params.lock().logical()
    }

    /// Width and height as configured, before rotation.
    #[must_use]
    pub fn physical_resolution(&self) -> (u32, u32) {
        let p = self.params.lock();
        (p.width, p.height)
    }

    /// The visible area, `(0, 0)` to `(width - 1, height - 1)`.
    #[must_use]
    pub fn screen_area(&self) -> Area {
        self.params.lock().screen()
    }

    /// Changes the resolution, then redraws everything.
    ///
    /// In direct and full mode the new screen must fit the draw buffer.
    pub fn set_resolution(&self, width: u32, height: u32) -> Result<(), ConfigError> {
        self.update_params(|p| {
            p.width = width;
            p.height = height;
        })
    }

    /// Panel offset added to flushed areas.
    #[must_use]
    pub fn offset(&self) -> (i32, i32) {
        self.params.lock().offset
    }

    /// Sets the panel offset.
    pub fn set_offset(&self, x: i32, y: i32) {
        self.params.lock().offset = (x, y);
        self.emit(&DisplayEvent::ParameterChanged);
    }

    /// `area` in panel coordinates.
    #[must_use]
    pub fn physical_area(&self, area: &Area) -> Area {
        let (x, y) = self.offset();
        area.translate(x, y)
    }

    /// Current rotation.
    #[must_use]
    pub fn rotation(&self) -> Rotation {
        self.params.lock().rotation
    }

    /// Rotates the display, then redraws everything.
    pub fn set_rotation(&self, rotation: Rotation) -> Result<(), ConfigError> {
        self.update_params(|p| p.rotation = rotation)
    }

    /// Dots per inch.
    #[must_use]
    pub fn dpi(&self) -> u32 {
        self.params.lock().dpi
    }

    /// Sets the dpi.
    pub fn set_dpi(&self, dpi: u32) {
        self.params.lock().dpi = dpi;
        self.emit(&DisplayEvent::ParameterChanged);
    }

    /// Scales `n` pixels designed at 160 dpi to this display.
    ///
    /// Non-zero inputs never scale below 1.
    #[must_use]
    pub fn dpx(&self, n: i32) -> i32 {
        if n == 0 {
            return 0;
        }
        let scaled = (i64::from(self.dpi()) * i64::from(n) + 80) / 160;
        i32::try_from(scaled.max(1)).unwrap_or(i32::MAX)
    }

    /// Whether renderers should antialias.
    #[must_use]
    pub fn antialiasing(&self) -> bool {
        self.params.lock().antialiasing
    }

    /// Turns antialiasing on or off.
    pub fn set_antialiasing(&self, on: bool) {
        self.params.lock().antialiasing = on;
        self.emit(&DisplayEvent::ParameterChanged);
    }

    /// Whether bands are cleared before painting.
    #[must_use]
    pub fn is_transparent(&self) -> bool {
        self.params.lock().transparent
    }

    /// Makes the screen transparent or opaque.
    pub fn set_transparent(&self, on: bool) {
        self.params.lock().transparent = on;
        self.emit(&DisplayEvent::ParameterChanged);
    }

    fn update_params(&self, f: impl FnOnce(&mut Params)) -> Result<(), ConfigError> {
        let screen = {
            let mut params = self.params.lock();
            let mut next = *params;
            f(&mut next);
            let (width, height) = next.logical();
            if width == 0 || height == 0 {
                return Err(ConfigError::ZeroResolution { width, height });
            }
            let needed = match self.mode {
                RenderMode::Partial => width as usize,
                RenderMode::Direct | RenderMode::Full => width as usize * height as usize,
            };
            if needed > self.buffer_pixels {
                return Err(ConfigError::BufferTooSmall {
                    needed,
                    available: self.buffer_pixels,
                });
            }
            *params = next;
            next.screen()
        };
        self.base_layer().resize(screen);
        self.emit(&DisplayEvent::ParameterChanged);
        self.invalidate_all();
        Ok(())
    }

    // --- invalidation ---------------------------------------------------

    /// Marks `area` for redraw.
    ///
    /// The area is clipped to the screen; empty results and calls while
    /// invalidation is paused are ignored. In full render mode any
    /// invalidation redraws the whole screen.
    pub fn invalidate(&self, area: &Area) -> InvalidateOutcome {
        let screen = self.screen_area();
        let Some(clipped) = area.intersect(&screen) else {
            return InvalidateOutcome::Ignored;
        };
        if self.full_redraw.load(Ordering::Relaxed) {
            return self.invalidate_all();
        }
        let (outcome, overflows) = {
            let mut tracker = self.invalidation.lock();
            (tracker.invalidate(&clipped, &screen), tracker.overflow_count())
        };
        match outcome {
            InvalidateOutcome::Ignored => {}
            InvalidateOutcome::Overflowed => {
                self.report_overflow(overflows);
                self.emit(&DisplayEvent::InvalidatedArea(clipped));
            }
            InvalidateOutcome::Covered | InvalidateOutcome::Stored(_) => {
                self.emit(&DisplayEvent::InvalidatedArea(clipped));
            }
        }
        outcome
    }

    /// Hands back areas a failed refresh checked out, even while
    /// invalidation is paused.
    pub(crate) fn restore_dirty(&self, dirty: &DirtySet) {
        if dirty.is_empty() {
            return;
        }
        let screen = self.screen_area();
        let overflowed = {
            let mut tracker = self.invalidation.lock();
            let before = tracker.overflow_count();
            tracker.restore(dirty, &screen);
            let after = tracker.overflow_count();
            (after != before).then_some(after)
        };
        if let Some(overflows) = overflowed {
            self.report_overflow(overflows);
        }
    }

    fn report_overflow(&self, overflows: u64) {
        log::warn!("{}: too many dirty areas, redrawing the whole screen", self.id);
        if self.env.tracer.is_enabled() {
            self.env.tracer.dirty_overflow(&DirtyOverflowEvent {
                display: self.id,
                overflow_count: overflows,
                timestamp: self.env.clock.now(),
            });
        }
    }

    /// Marks a `kurbo` rectangle for redraw, rounding outward.
    pub fn invalidate_rect(&self, rect: kurbo::Rect) -> InvalidateOutcome {
        self.invalidate(&Area::from_rect(rect))
    }

    /// Marks the whole screen for redraw.
    pub fn invalidate_all(&self) -> InvalidateOutcome {
        let screen = self.screen_area();
        let outcome = self.invalidation.lock().invalidate_all(&screen);
        if outcome != InvalidateOutcome::Ignored {
            self.emit(&DisplayEvent::InvalidatedArea(screen));
        }
        outcome
    }

    /// Suspends invalidation. Calls nest.
    pub fn disable_invalidation(&self) {
        self.invalidation.lock().disable();
    }

    /// Undoes one [`disable_invalidation`](Self::disable_invalidation).
    pub fn enable_invalidation(&self) -> Result<(), ProtocolViolation> {
        self.invalidation.lock().enable()
    }

    /// Returns `true` unless invalidation is suspended.
    #[must_use]
    pub fn is_invalidation_enabled(&self) -> bool {
        self.invalidation.lock().is_enabled()
    }

    /// Suspends invalidation until the guard drops.
    #[must_use = "invalidation resumes when the guard is dropped"]
    pub fn pause_invalidation(&self) -> InvalidationPause<'_> {
        self.disable_invalidation();
        InvalidationPause { display: self }
    }

    /// A copy of the current dirty areas.
    #[must_use]
    pub fn dirty_areas(&self) -> Vec<Area> {
        self.invalidation.lock().active().copied().collect()
    }

    /// Takes the dirty areas, leaving the set empty.
    pub fn checkout_dirty(&self) -> DirtySet {
        self.invalidation.lock().checkout()
    }

    /// How many times the dirty set collapsed to the full screen.
    #[must_use]
    pub fn overflow_count(&self) -> u64 {
        self.invalidation.lock().overflow_count()
    }

    // --- layers ---------------------------------------------------------

    /// The layer backed by the draw buffer.
    #[must_use]
    pub fn base_layer(&self) -> Arc<Layer> {
        // The base layer is created with the display and never removed.
        let layers = self.layers.lock();
        Arc::clone(&layers[0])
    }

    /// Creates a transient layer covering `area`.
    ///
    /// Its buffer is allocated on first claim and charged to the display's
    /// layer memory budget. Composite it onto another layer with
    /// [`Layer::push_composite`]; once that task is ready the layer retires.
    pub fn create_layer(&self, area: Area, format: ColorFormat) -> Arc<Layer> {
        let id = LayerId(self.next_layer.fetch_add(1, Ordering::Relaxed));
        let layer = Arc::new(Layer::new(
            id,
            self.id,
            format,
            area,
            true,
            self.budget.clone(),
            Arc::clone(&self.env.signal),
        ));
        self.layers.lock().push(Arc::clone(&layer));
        layer
    }

    /// Every layer, base first.
    #[must_use]
    pub fn layers(&self) -> Vec<Arc<Layer>> {
        self.layers.lock().clone()
    }

    /// Drops transient layers. With `all` unset only retired ones go.
    pub(crate) fn prune_layers(&self, all: bool) -> usize {
        let mut layers = self.layers.lock();
        let before = layers.len();
        layers.retain(|l| !l.is_transient() || (!all && !l.is_retired()));
        before - layers.len()
    }

    /// Returns `true` once every task on every live layer is ready.
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.layers
            .lock()
            .iter()
            .all(|l| l.is_retired() || l.is_drained())
    }

    /// The budget transient layers are charged against.
    #[must_use]
    pub fn memory_budget(&self) -> Option<&Arc<MemoryBudget>> {
        self.budget.as_ref()
    }

    // --- units ----------------------------------------------------------

    /// Services for units created by the caller.
    #[must_use]
    pub fn unit_context(&self) -> UnitContext {
        UnitContext {
            display: self.id,
            signal: Arc::clone(&self.env.signal),
            tracer: self.env.tracer.clone(),
            clock: Arc::clone(&self.env.clock),
        }
    }

    /// Adds a unit built by `make` from its id and context.
    pub fn add_unit(&self, make: impl FnOnce(UnitId, UnitContext) -> Arc<dyn RenderUnit>) -> UnitId {
        let id = UnitId(self.next_unit.fetch_add(1, Ordering::Relaxed));
        let unit = make(id, self.unit_context());
        self.units.lock().push(unit);
        self.env.signal.notify();
        id
    }

    /// Adds a CPU unit.
    pub fn add_software_unit(&self, renderers: Renderers, mode: ExecutionMode) -> UnitId {
        self.add_unit(|id, ctx| Arc::new(SoftwareUnit::new(id, renderers, mode, ctx)))
    }

    /// Adds `n` CPU units sharing one renderer table.
    pub fn add_software_units(&self, n: usize, renderers: &Renderers, mode: ExecutionMode) -> Vec<UnitId> {
        (0..n)
            .map(|_| self.add_software_unit(renderers.clone(), mode))
            .collect()
    }

    /// Adds a unit driving `accelerator`.
    pub fn add_accelerated_unit<A: Accelerator>(&self, accelerator: A, mode: ExecutionMode) -> UnitId {
        self.add_unit(|id, ctx| Arc::new(AcceleratedUnit::new(id, Accelerated(accelerator), mode, ctx)))
    }

    /// Removes a unit. A task it is running still completes.
    pub fn remove_unit(&self, id: UnitId) -> bool {
        let removed = {
            let mut units = self.units.lock();
            units.iter().position(|u| u.id() == id).map(|i| units.remove(i))
        };
        // Dropped outside the lock: a worker joins its thread here.
        removed.is_some()
    }

    /// Every unit, in the order they are offered work.
    #[must_use]
    pub fn units(&self) -> Vec<Arc<dyn RenderUnit>> {
        self.units.lock().clone()
    }

    /// Number of units.
    #[must_use]
    pub fn unit_count(&self) -> usize {
        self.units.lock().len()
    }

    pub(crate) fn record_dispatch_error(&self, e: RenderError) {
        let mut slot = self.dispatch_error.lock();
        if slot.is_none() {
            *slot = Some(e);
        }
    }

    pub(crate) fn take_dispatch_error(&self) -> Option<RenderError> {
        self.dispatch_error.lock().take()
    }

    // --- callbacks ------------------------------------------------------

    /// Sets where finished pixels go.
    pub fn set_flush_target(&self, target: impl FlushTarget + 'static) {
        *self.flush_target.lock() = Some(Arc::new(target));
    }

    pub(crate) fn flush_target(&self) -> Option<Arc<dyn FlushTarget>> {
        self.flush_target.lock().clone()
    }

    /// Sets the callback polled while waiting for a flush acknowledgment.
    pub fn set_wait_callback(&self, wait: impl Fn(DisplayId) + Send + Sync + 'static) {
        *self.wait.lock() = Some(Arc::new(wait));
    }

    pub(crate) fn wait_callback(&self) -> Option<Arc<WaitCallback<'static>>> {
        self.wait.lock().clone()
    }

    /// Sets what pushes draw tasks for each dirty area.
    pub fn set_painter(&self, painter: impl Painter + 'static) {
        *self.painter.lock() = Some(Arc::new(painter));
    }

    pub(crate) fn painter(&self) -> Option<Arc<dyn Painter>> {
        self.painter.lock().clone()
    }

    /// Sets the receiver of [`DisplayEvent`]s.
    pub fn set_event_handler(&self, handler: impl Fn(DisplayId, &DisplayEvent) + Send + Sync + 'static) {
        *self.events.lock() = Some(Arc::new(handler));
    }

    pub(crate) fn emit(&self, event: &DisplayEvent) {
        let handler = self.events.lock().clone();
        if let Some(handler) = handler {
            handler(self.id, event);
        }
    }

    // --- flush state ----------------------------------------------------

    /// Whether a frame is with the hardware.
    #[must_use]
    pub fn flush_state(&self) -> FlushState {
        self.handoff.state()
    }

    /// Returns `true` while a frame is with the hardware.
    #[must_use]
    pub fn is_flushing(&self) -> bool {
        self.flush_state() == FlushState::Flushing
    }

    /// Returns `true` if the most recent frame was the last of its refresh.
    #[must_use]
    pub fn is_last_chunk(&self) -> bool {
        self.handoff.is_last_chunk()
    }

    /// Slot rendering goes to next.
    #[must_use]
    pub fn active_buffer(&self) -> usize {
        self.handoff.active_index()
    }

    /// Frames submitted so far.
    #[must_use]
    pub fn flush_count(&self) -> u64 {
        self.handoff.counts().0
    }

    // --- activity -------------------------------------------------------

    /// Records user activity at `now`.
    pub fn trigger_activity(&self, now: HostTime) {
        self.last_activity.store(now.ticks(), Ordering::Relaxed);
    }

    /// Time since the last recorded activity.
    #[must_use]
    pub fn inactive_time(&self, now: HostTime) -> Duration {
        now.saturating_duration_since(HostTime(self.last_activity.load(Ordering::Relaxed)))
    }

    // --- refresh bookkeeping -------------------------------------------

    /// Refreshes completed so far.
    #[must_use]
    pub fn refresh_count(&self) -> u64 {
        self.refresh_count.load(Ordering::Relaxed)
    }

    /// Returns `true` while a refresh is running.
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }

    pub(crate) fn begin_refresh(&self) -> Result<u64, ProtocolViolation> {
        if self.refreshing.swap(true, Ordering::AcqRel) {
            return Err(crate::error::violation(ProtocolViolation::RefreshInProgress));
        }
        Ok(self.refresh_count.load(Ordering::Relaxed))
    }

    pub(crate) fn end_refresh(&self, counted: bool) {
        if counted {
            self.refresh_count.fetch_add(1, Ordering::Relaxed);
        }
        self.refreshing.store(false, Ordering::Release);
    }

    pub(crate) fn env(&self) -> &Env {
        &self.env
    }

    /// Areas rendered by the previous refresh, for direct-mode buffer sync.
    pub(crate) fn swap_previous_areas(&self, areas: Vec<Area>) -> Vec<Area> {
        core::mem::replace(&mut *self.previous_areas.lock(), areas)
    }
}

impl fmt::Debug for Display {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Display")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("format", &self.format)
            .field("resolution", &self.resolution())
            .field("layers", &self.layers.lock().len())
            .field("units", &self.unit_count())
            .finish_non_exhaustive()
    }
}

/// Keeps invalidation suspended; see [`Display::pause_invalidation`].
#[derive(Debug)]
pub struct InvalidationPause<'a> {
    display: &'a Display,
}

impl Drop for InvalidationPause<'_> {
    fn drop(&mut self) {
        _ = self.display.enable_invalidation();
    }
}
