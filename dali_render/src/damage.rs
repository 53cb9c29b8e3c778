// Copyright 2026 the DALi Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Screen-space damage for partial re-rendering.

use alloc::vec::Vec;

use dali_core::render_list::RenderList;
use kurbo::Rect;

/// A region of the surface that needs re-rendering.
///
/// The Render thread uses this to scissor, or skip, a frame whose items
/// did not change.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum DamageRegion {
    /// The entire surface needs redrawing.
    #[default]
    Full,
    /// Axis-aligned rectangles in surface coordinates.
    Rects(Vec<Rect>),
    /// Nothing changed; the previous frame can be reused.
    None,
}

impl DamageRegion {
    /// Collects the updated areas of every item that changed.
    #[must_use]
    pub fn from_render_list(list: &RenderList) -> Self {
        let rects: Vec<Rect> = list
            .iter()
            .filter(|item| item.updated)
            .map(|item| item.updated_area)
            .filter(|rect| rect.area() > 0.0)
            .collect();
        if rects.is_empty() {
            Self::None
        } else {
            Self::Rects(rects)
        }
    }

    /// Returns `true` if no region needs redrawing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Adds one rectangle.
    pub fn add_rect(&mut self, rect: Rect) {
        match self {
            Self::Full => {}
            Self::Rects(rects) => rects.push(rect),
            Self::None => *self = Self::Rects(alloc::vec![rect]),
        }
    }

    /// Merges another damage region into this one.
    pub fn merge(&mut self, other: &Self) {
        match (&mut *self, other) {
            (Self::Full, _) | (_, Self::None) => {}
            (_, Self::Full) => *self = Self::Full,
            (Self::None, _) => *self = other.clone(),
            (Self::Rects(a), Self::Rects(b)) => a.extend_from_slice(b),
        }
    }

    /// Smallest rectangle covering the damage, clipped to `surface`.
    ///
    /// `None` when nothing is damaged or the damage lies off the surface.
    #[must_use]
    pub fn bounds(&self, surface: Rect) -> Option<Rect> {
        let bounds = match self {
            Self::Full => surface,
            Self::Rects(rects) => rects
                .iter()
                .copied()
                .reduce(|a, b| a.union(b))?
                .intersect(surface),
            Self::None => return None,
        };
        (bounds.area() > 0.0).then_some(bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_is_absorbing_for_full() {
        let mut damage = DamageRegion::None;
        damage.merge(&DamageRegion::Rects(alloc::vec![Rect::new(0.0, 0.0, 1.0, 1.0)]));
        assert_eq!(damage, DamageRegion::Rects(alloc::vec![Rect::new(0.0, 0.0, 1.0, 1.0)]));
        damage.merge(&DamageRegion::None);
        assert!(!damage.is_empty());
        damage.merge(&DamageRegion::Full);
        assert_eq!(damage, DamageRegion::Full);
        damage.add_rect(Rect::new(5.0, 5.0, 6.0, 6.0));
        assert_eq!(damage, DamageRegion::Full);
    }

    #[test]
    fn bounds_clip_to_surface() {
        let surface = Rect::new(0.0, 0.0, 100.0, 100.0);
        let mut damage = DamageRegion::None;
        assert_eq!(damage.bounds(surface), None);
        damage.add_rect(Rect::new(-10.0, 10.0, 20.0, 20.0));
        damage.add_rect(Rect::new(50.0, 50.0, 60.0, 200.0));
        assert_eq!(damage.bounds(surface), Some(Rect::new(0.0, 10.0, 60.0, 100.0)));
        assert_eq!(DamageRegion::Full.bounds(surface), Some(surface));
        let off_screen = DamageRegion::Rects(alloc::vec![Rect::new(200.0, 200.0, 210.0, 210.0)]);
        assert_eq!(off_screen.bounds(surface), None);
    }

    #[test]
    fn empty_list_has_no_damage() {
        let list = RenderList::default();
        assert!(DamageRegion::from_render_list(&list).is_empty());
    }
}
