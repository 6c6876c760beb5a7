// Copyright 2026 the Basalt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dirty-rectangle tracking.
//!
//! An [`InvalidationTracker`] accumulates the areas of one display that no
//! longer match what the application wants to show. Each insertion is merged
//! against the areas already recorded:
//!
//! 1. an area inside an existing entry is discarded;
//! 2. existing entries inside the new area are marked *joined* (superseded);
//! 3. an existing entry that overlaps the new area is merged into it when
//!    their bounding union is smaller than the sum of both sizes plus
//!    [`merge_slack`](InvalidationConfig::merge_slack). A merge restarts the
//!    scan, since the grown area may now swallow further entries.
//!
//! Joined entries are compacted away before the new area is stored. When no
//! slot is left the whole set collapses to one area covering the screen and
//! [`overflow_count`](InvalidationTracker::overflow_count) increments. Dirty
//! state is never dropped; overflow trades redraw work for correctness.
//!
//! Merging only ever grows areas: the union of the active entries always
//! covers every accepted input.
//!
//! Invalidation can be suspended with a nesting counter
//! ([`disable`](InvalidationTracker::disable) /
//! [`enable`](InvalidationTracker::enable)). While suspended, every insertion
//! is ignored; only [`restore`](InvalidationTracker::restore), which hands
//! back areas a failed refresh checked out, still goes through.

use alloc::vec::Vec;

use crate::area::Area;
use crate::error::{ProtocolViolation, violation};

/// Tunables for an [`InvalidationTracker`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InvalidationConfig {
    /// Maximum number of stored areas before collapsing to full screen.
    pub capacity: usize,
    /// Extra pixels two overlapping areas may waste when merged.
    ///
    /// Zero merges only when the union is strictly smaller than the two
    /// areas together; larger values trade over-redraw for fewer entries.
    pub merge_slack: u64,
}

impl InvalidationConfig {
    /// 32 entries, no slack.
    pub const DEFAULT: Self = Self {
        capacity: 32,
        merge_slack: 0,
    };

    /// Returns a copy with the given capacity (at least one).
    #[must_use]
    pub const fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = if capacity == 0 { 1 } else { capacity };
        self
    }

    /// Returns a copy with the given merge slack.
    #[must_use]
    pub const fn with_merge_slack(mut self, slack: u64) -> Self {
        self.merge_slack = slack;
        self
    }
}

impl Default for InvalidationConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// What happened to an invalidated area.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvalidateOutcome {
    /// Invalidation is suspended or the clipped area was empty.
    Ignored,
    /// The area was already covered by an existing entry.
    Covered,
    /// The area (possibly merged with others) was stored.
    Stored(Area),
    /// The set ran out of slots and now covers the whole screen.
    Overflowed,
}

/// Merged dirty areas taken out of a tracker for one refresh.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DirtySet {
    areas: Vec<Area>,
}

impl DirtySet {
    /// The areas, in insertion order.
    #[must_use]
    pub fn areas(&self) -> &[Area] {
        &self.areas
    }

    /// Number of areas.
    #[must_use]
    pub fn len(&self) -> usize {
        self.areas.len()
    }

    /// Returns `true` if nothing is dirty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }

    /// Bounding box of all areas.
    #[must_use]
    pub fn bounds(&self) -> Area {
        self.areas.iter().fold(Area::EMPTY, |acc, a| acc.join(a))
    }

    /// Total pixels across areas.
    #[must_use]
    pub fn pixel_count(&self) -> u64 {
        self.areas.iter().map(Area::size).sum()
    }
}

impl From<Vec<Area>> for DirtySet {
    fn from(areas: Vec<Area>) -> Self {
        Self { areas }
    }
}

impl<'a> IntoIterator for &'a DirtySet {
    type Item = &'a Area;
    type IntoIter = core::slice::Iter<'a, Area>;

    fn into_iter(self) -> Self::IntoIter {
        self.areas.iter()
    }
}

/// Per-display dirty-rectangle set.
#[derive(Debug)]
pub struct InvalidationTracker {
    config: InvalidationConfig,
    areas: Vec<Area>,
    joined: Vec<bool>,
    disabled: u32,
    overflows: u64,
}

impl InvalidationTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new(config: InvalidationConfig) -> Self {
        let config = config.with_capacity(config.capacity);
        Self {
            config,
            areas: Vec::with_capacity(config.capacity),
            joined: Vec::with_capacity(config.capacity),
            disabled: 0,
            overflows: 0,
        }
    }

    /// The tracker's configuration.
    #[must_use]
    pub fn config(&self) -> &InvalidationConfig {
        &self.config
    }

    /// Records `area`, clipped to `screen`.
    pub fn invalidate(&mut self, area: &Area, screen: &Area) -> InvalidateOutcome {
        if !self.is_enabled() {
            return InvalidateOutcome::Ignored;
        }
        let Some(area) = area.intersect(screen) else {
            return InvalidateOutcome::Ignored;
        };
        self.insert(area, screen)
    }

    /// Puts back areas taken by [`checkout`](Self::checkout) that were never
    /// drawn.
    ///
    /// Suspension does not apply: these areas were accepted once already.
    /// They are clipped to `screen` and merged like new insertions. An area
    /// left entirely outside `screen` means the geometry changed in between,
    /// so the whole screen is marked instead.
    pub fn restore(&mut self, dirty: &DirtySet, screen: &Area) {
        if screen.is_empty() {
            return;
        }
        for area in dirty {
            match area.intersect(screen) {
                Some(clipped) => _ = self.insert(clipped, screen),
                None if area.is_empty() => {}
                None => {
                    self.areas.clear();
                    self.joined.clear();
                    self.areas.push(*screen);
                    self.joined.push(false);
                    return;
                }
            }
        }
    }

    fn insert(&mut self, mut area: Area, screen: &Area) -> InvalidateOutcome {

        if self.active().any(|a| a.contains(&area)) {
            return InvalidateOutcome::Covered;
        }

        let slack = self.config.merge_slack;
        'rescan: loop {
            for i in 0..self.areas.len() {
                if self.joined[i] {
                    continue;
                }
                let existing = self.areas[i];
                if area.contains(&existing) {
                    self.joined[i] = true;
                    continue;
                }
                if area.overlaps(&existing) {
                    let union = area.join(&existing);
                    if union.size() < area.size() + existing.size() + slack {
                        self.joined[i] = true;
                        area = union;
                        continue 'rescan;
                    }
                }
            }
            break;
        }

        self.compact();
        if self.areas.len() >= self.config.capacity {
            self.areas.clear();
            self.joined.clear();
            self.areas.push(*screen);
            self.joined.push(false);
            self.overflows += 1;
            return InvalidateOutcome::Overflowed;
        }
        self.areas.push(area);
        self.joined.push(false);
        InvalidateOutcome::Stored(area)
    }

    /// Replaces the set with one area covering `screen`.
    ///
    /// Ignored while invalidation is suspended.
    pub fn invalidate_all(&mut self, screen: &Area) -> InvalidateOutcome {
        if !self.is_enabled() || screen.is_empty() {
            return InvalidateOutcome::Ignored;
        }
        self.areas.clear();
        self.joined.clear();
        self.areas.push(*screen);
        self.joined.push(false);
        InvalidateOutcome::Stored(*screen)
    }

    /// Suspends invalidation (nests).
    pub fn disable(&mut self) {
        self.disabled += 1;
    }

    /// Undoes one [`disable`](Self::disable).
    ///
    /// Enabling an already enabled tracker is a protocol violation.
    pub fn enable(&mut self) -> Result<(), ProtocolViolation> {
        if self.disabled == 0 {
            return Err(violation(ProtocolViolation::UnbalancedEnable));
        }
        self.disabled -= 1;
        Ok(())
    }

    /// Returns `true` when no [`disable`](Self::disable) is outstanding.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.disabled == 0
    }

    /// Takes the active areas and leaves the set empty.
    pub fn checkout(&mut self) -> DirtySet {
        let areas = self.active().copied().collect();
        self.areas.clear();
        self.joined.clear();
        DirtySet { areas }
    }

    /// Iterates over the active (not joined) areas.
    pub fn active(&self) -> impl Iterator<Item = &Area> + '_ {
        self.areas
            .iter()
            .zip(&self.joined)
            .filter(|(_, joined)| !**joined)
            .map(|(a, _)| a)
    }

    /// Number of active areas.
    #[must_use]
    pub fn len(&self) -> usize {
        self.active().count()
    }

    /// Returns `true` if nothing is dirty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active().next().is_none()
    }

    /// How many times the set has collapsed to full screen.
    #[must_use]
    pub fn overflow_count(&self) -> u64 {
        self.overflows
    }

    fn compact(&mut self) {
        let mut keep = self.joined.iter().map(|j| !*j);
        self.areas.retain(|_| keep.next().unwrap_or(true));
        self.joined.clear();
        self.joined.resize(self.areas.len(), false);
    }
}

impl Default for InvalidationTracker {
    fn default() -> Self {
        Self::new(InvalidationConfig::DEFAULT)
    }
}
