//! Render Surface
//!
//! Narrow interface to the host's rendering layer. The engine only needs
//! regions it can measure, show, fill with markup and slide around; the
//! actual pixel work happens on the other side of this trait.

use std::cell::RefCell;
use std::rc::Rc;

use crate::page::SlideAxis;

/// Render region id type
pub type RegionId = u32;

/// Opaque renderable area owned by the host.
pub trait RenderSurface {
    /// Create a region with the given height, stacked after existing ones.
    fn create_region(&mut self, height: f32) -> RegionId;

    fn remove_region(&mut self, region: RegionId);

    /// Viewport dimensions of the container.
    fn measure(&self) -> (f32, f32);

    fn set_visible(&mut self, region: RegionId, visible: bool);

    /// Inject rendered markup into a region.
    fn set_content(&mut self, region: RegionId, markup: &str);

    fn set_region_height(&mut self, region: RegionId, height: f32);

    /// Top offset of a region in document coordinates.
    fn region_top(&self, region: RegionId) -> f32;

    /// Slide the whole container to an offset over a duration.
    fn slide_container(&mut self, axis: SlideAxis, offset: f32, duration_ms: u64);

    /// Scroll the viewport to an offset over a duration.
    fn scroll_viewport(&mut self, offset: f32, duration_ms: u64);

    /// Slide a single region to an offset over a duration.
    fn slide_region(&mut self, region: RegionId, axis: SlideAxis, offset: f32, duration_ms: u64);
}

/// One recorded surface operation.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceOp {
    Create(RegionId),
    Remove(RegionId),
    Visible(RegionId, bool),
    Content(RegionId, String),
    Height(RegionId, f32),
    SlideContainer {
        axis: SlideAxis,
        offset: f32,
        duration_ms: u64,
    },
    Scroll {
        offset: f32,
        duration_ms: u64,
    },
    SlideRegion {
        region: RegionId,
        axis: SlideAxis,
        offset: f32,
        duration_ms: u64,
    },
}

#[derive(Debug)]
struct Region {
    id: RegionId,
    height: f32,
    visible: bool,
    content: String,
}

#[derive(Debug)]
struct HeadlessInner {
    width: f32,
    height: f32,
    next_region: RegionId,
    regions: Vec<Region>,
    ops: Vec<SurfaceOp>,
}

/// Surface that records operations instead of rendering.
///
/// Regions stack vertically; offsets derive from region order and height.
/// Clones share state, so a test can keep a handle while the container
/// owns the other.
#[derive(Debug, Clone)]
pub struct HeadlessSurface {
    inner: Rc<RefCell<HeadlessInner>>,
}

impl HeadlessSurface {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            inner: Rc::new(RefCell::new(HeadlessInner {
                width,
                height,
                next_region: 1,
                regions: Vec::new(),
                ops: Vec::new(),
            })),
        }
    }

    /// Recorded operations so far.
    pub fn ops(&self) -> Vec<SurfaceOp> {
        self.inner.borrow().ops.clone()
    }

    pub fn clear_ops(&self) {
        self.inner.borrow_mut().ops.clear();
    }

    /// Current markup of a region.
    pub fn content(&self, region: RegionId) -> Option<String> {
        self.inner
            .borrow()
            .regions
            .iter()
            .find(|r| r.id == region)
            .map(|r| r.content.clone())
    }

    pub fn is_visible(&self, region: RegionId) -> bool {
        self.inner
            .borrow()
            .regions
            .iter()
            .find(|r| r.id == region)
            .map(|r| r.visible)
            .unwrap_or(false)
    }

    pub fn region_count(&self) -> usize {
        self.inner.borrow().regions.len()
    }

    pub fn resize(&self, width: f32, height: f32) {
        let mut inner = self.inner.borrow_mut();
        inner.width = width;
        inner.height = height;
    }
}

impl Default for HeadlessSurface {
    fn default() -> Self {
        Self::new(1024.0, 768.0)
    }
}

impl RenderSurface for HeadlessSurface {
    fn create_region(&mut self, height: f32) -> RegionId {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_region;
        inner.next_region += 1;
        inner.regions.push(Region {
            id,
            height,
            visible: true,
            content: String::new(),
        });
        inner.ops.push(SurfaceOp::Create(id));
        id
    }

    fn remove_region(&mut self, region: RegionId) {
        let mut inner = self.inner.borrow_mut();
        inner.regions.retain(|r| r.id != region);
        inner.ops.push(SurfaceOp::Remove(region));
    }

    fn measure(&self) -> (f32, f32) {
        let inner = self.inner.borrow();
        (inner.width, inner.height)
    }

    fn set_visible(&mut self, region: RegionId, visible: bool) {
        let mut inner = self.inner.borrow_mut();
        if let Some(r) = inner.regions.iter_mut().find(|r| r.id == region) {
            r.visible = visible;
        }
        inner.ops.push(SurfaceOp::Visible(region, visible));
    }

    fn set_content(&mut self, region: RegionId, markup: &str) {
        let mut inner = self.inner.borrow_mut();
        if let Some(r) = inner.regions.iter_mut().find(|r| r.id == region) {
            r.content = markup.to_string();
        }
        inner.ops.push(SurfaceOp::Content(region, markup.to_string()));
    }

    fn set_region_height(&mut self, region: RegionId, height: f32) {
        let mut inner = self.inner.borrow_mut();
        if let Some(r) = inner.regions.iter_mut().find(|r| r.id == region) {
            r.height = height;
        }
        inner.ops.push(SurfaceOp::Height(region, height));
    }

    fn region_top(&self, region: RegionId) -> f32 {
        let inner = self.inner.borrow();
        let mut top = 0.0;
        for r in &inner.regions {
            if r.id == region {
                return top;
            }
            top += r.height;
        }
        0.0
    }

    fn slide_container(&mut self, axis: SlideAxis, offset: f32, duration_ms: u64) {
        self.inner.borrow_mut().ops.push(SurfaceOp::SlideContainer {
            axis,
            offset,
            duration_ms,
        });
    }

    fn scroll_viewport(&mut self, offset: f32, duration_ms: u64) {
        self.inner.borrow_mut().ops.push(SurfaceOp::Scroll {
            offset,
            duration_ms,
        });
    }

    fn slide_region(&mut self, region: RegionId, axis: SlideAxis, offset: f32, duration_ms: u64) {
        self.inner.borrow_mut().ops.push(SurfaceOp::SlideRegion {
            region,
            axis,
            offset,
            duration_ms,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regions_stack() {
        let mut surface = HeadlessSurface::new(800.0, 600.0);
        let a = surface.create_region(600.0);
        let b = surface.create_region(600.0);
        assert_eq!(surface.region_top(a), 0.0);
        assert_eq!(surface.region_top(b), 600.0);
    }

    #[test]
    fn test_content_and_visibility() {
        let mut surface = HeadlessSurface::default();
        let r = surface.create_region(768.0);
        assert!(surface.is_visible(r));
        surface.set_visible(r, false);
        surface.set_content(r, "<p>hi</p>");
        assert!(!surface.is_visible(r));
        assert_eq!(surface.content(r).as_deref(), Some("<p>hi</p>"));
    }

    #[test]
    fn test_clone_shares_state() {
        let mut surface = HeadlessSurface::default();
        let handle = surface.clone();
        let r = surface.create_region(100.0);
        assert_eq!(handle.region_count(), 1);
        assert_eq!(handle.ops(), vec![SurfaceOp::Create(r)]);
    }
}
