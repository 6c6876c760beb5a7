// Copyright 2026 the Basalt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Stock software renderers for basalt draw tasks.
//!
//! `basalt_core` treats draw tasks as opaque; the renderers here give two of
//! the task kinds a concrete meaning so a display can be brought up without
//! writing any drawing code:
//!
//! - [`FillRenderer`] draws [`TaskKind::Rectangle`] tasks described by a
//!   [`RectDescriptor`]: a solid or translucent fill with an optional border.
//! - [`CompositeRenderer`] draws [`TaskKind::Layer`] tasks: it blends the
//!   source layer of the task onto the target, with the opacity given by a
//!   [`LayerDescriptor`].
//!
//! [`software_renderers`] returns a [`Renderers`] table with both installed;
//! add label and image renderers to it as needed.

#![no_std]
#![cfg_attr(docsrs, feature(doc_cfg))]

extern crate alloc;

mod composite;
mod fill;

pub use composite::{CompositeRenderer, LayerDescriptor};
pub use fill::{Border, FillRenderer, RectDescriptor};

use basalt_core::renderer::Renderers;
use basalt_core::task::TaskKind;

/// A renderer table with the stock rectangle and layer renderers.
#[must_use]
pub fn software_renderers() -> Renderers {
    Renderers::new()
        .with(TaskKind::Rectangle, FillRenderer)
        .with(TaskKind::Layer, CompositeRenderer)
}
