// Copyright 2026 the Basalt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types.
//!
//! Failures fall into three groups:
//!
//! - **Resource exhaustion.** A layer buffer that cannot be allocated is
//!   reported as [`RenderError::BufferAlloc`] and aborts the current refresh of
//!   that display. Dirty-rectangle overflow is *not* an error; it degrades to a
//!   full-screen redraw and is counted instead.
//! - **Protocol violations.** A collaborator broke a call contract (flushing
//!   twice, acknowledging nothing, claiming a task twice). These panic in debug
//!   builds, are logged at error level, and are returned as
//!   [`RenderError::Protocol`] or otherwise ignored in release builds.
//! - **Configuration.** [`ConfigError`] rejects display settings that cannot
//!   work before any rendering happens.

use crate::color::ColorFormat;
use crate::layer::LayerId;
use crate::output::DisplayId;

/// A broken call contract between the core and a collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ProtocolViolation {
    /// A flush was submitted while the previous one was still in flight.
    #[error("flush submitted while a flush is already in flight")]
    FlushInFlight,
    /// A flush was acknowledged while none was pending.
    #[error("flush acknowledged with no flush pending")]
    UnexpectedAcknowledge,
    /// A task that is not queued was claimed.
    #[error("claimed a task that is not queued")]
    TaskNotQueued,
    /// A task that is not in progress was completed.
    #[error("completed a task that is not in progress")]
    TaskNotInProgress,
    /// Invalidation was enabled more often than it was disabled.
    #[error("invalidation enabled without a matching disable")]
    UnbalancedEnable,
    /// A refresh was started while another refresh of the same display was
    /// still running.
    #[error("refresh started while the display is already refreshing")]
    RefreshInProgress,
}

/// Reports a protocol violation.
///
/// Panics in debug builds. In release builds the violation is logged and
/// handed back so the caller can return it.
#[track_caller]
pub(crate) fn violation(v: ProtocolViolation) -> ProtocolViolation {
    log::error!("protocol violation: {v}");
    if cfg!(debug_assertions) {
        panic!("protocol violation: {v}");
    }
    v
}

/// Rejected display configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ConfigError {
    /// Width or height is zero.
    #[error("display resolution must be non-zero, got {width}x{height}")]
    ZeroResolution {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },
    /// The draw buffer cannot hold what the render mode needs.
    #[error("draw buffer holds {available} pixels but {needed} are required")]
    BufferTooSmall {
        /// Pixels required.
        needed: usize,
        /// Pixels provided.
        available: usize,
    },
    /// A flush format differing from the render format only works with
    /// partial rendering.
    #[error("flush format conversion requires partial render mode")]
    ConversionRequiresPartial,
    /// No in-place conversion exists between the two formats.
    #[error("cannot convert pixels from {from:?} to {to:?} in place")]
    UnsupportedConversion {
        /// Source format.
        from: ColorFormat,
        /// Target format.
        to: ColorFormat,
    },
}

/// An error surfaced by dispatch or refresh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    /// A layer buffer could not be allocated.
    #[error("cannot allocate {bytes} bytes for {layer}")]
    BufferAlloc {
        /// Layer whose buffer was requested.
        layer: LayerId,
        /// Requested size.
        bytes: usize,
    },
    /// A collaborator broke a call contract.
    #[error(transparent)]
    Protocol(#[from] ProtocolViolation),
    /// The display has tasks to run but no render unit to run them.
    #[error("{0} has no render units")]
    NoRenderUnits(DisplayId),
    /// The display has nowhere to send finished pixels.
    #[error("{0} has no flush target")]
    NoFlushTarget(DisplayId),
    /// The display configuration cannot be honored.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
