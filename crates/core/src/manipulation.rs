//! Resize handles and the resize transforms behind them
//!
//! Handles are the small control points drawn on a selected annotation.
//! Endpoint shapes (lines, arrows) expose their two endpoints; box shapes
//! expose the corners and edge midpoints of their bounding box.

use crate::geometry::{Bounds, Point};

/// One of the eight named anchors of a bounding box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ResizeHandle {
    TopLeft,
    Top,
    TopRight,
    Left,
    Right,
    BottomLeft,
    Bottom,
    BottomRight,
}

impl ResizeHandle {
    /// All handles, corners and edges interleaved row by row
    pub const ALL: [ResizeHandle; 8] = [
        ResizeHandle::TopLeft,
        ResizeHandle::Top,
        ResizeHandle::TopRight,
        ResizeHandle::Left,
        ResizeHandle::Right,
        ResizeHandle::BottomLeft,
        ResizeHandle::Bottom,
        ResizeHandle::BottomRight,
    ];
}

/// Handle anchor with its position in image space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManipulationHandle {
    pub handle: ResizeHandle,
    pub position: Point,
}

impl ManipulationHandle {
    pub fn new(handle: ResizeHandle, position: Point) -> Self {
        Self { handle, position }
    }

    /// Check if a point hits this handle
    pub fn hit_test(&self, point: &Point, radius: f32) -> bool {
        point.distance_to(&self.position) <= radius
    }
}

/// Handles for a two-point shape: start maps to top-left, end to bottom-right
pub(crate) fn endpoint_handles(start: Point, end: Point) -> Vec<ManipulationHandle> {
    vec![
        ManipulationHandle::new(ResizeHandle::TopLeft, start),
        ManipulationHandle::new(ResizeHandle::BottomRight, end),
    ]
}

/// Corner and edge-midpoint handles of a box (y-up: top is `max_y`)
pub(crate) fn box_handles(bounds: &Bounds) -> Vec<ManipulationHandle> {
    let center = bounds.center();
    ResizeHandle::ALL
        .iter()
        .map(|&handle| {
            let position = match handle {
                ResizeHandle::TopLeft => Point::new(bounds.min_x, bounds.max_y),
                ResizeHandle::Top => Point::new(center.x, bounds.max_y),
                ResizeHandle::TopRight => Point::new(bounds.max_x, bounds.max_y),
                ResizeHandle::Left => Point::new(bounds.min_x, center.y),
                ResizeHandle::Right => Point::new(bounds.max_x, center.y),
                ResizeHandle::BottomLeft => Point::new(bounds.min_x, bounds.min_y),
                ResizeHandle::Bottom => Point::new(center.x, bounds.min_y),
                ResizeHandle::BottomRight => Point::new(bounds.max_x, bounds.min_y),
            };
            ManipulationHandle::new(handle, position)
        })
        .collect()
}

/// New diagonal corners for a box shape after dragging `handle` to `point`.
///
/// The edges the handle does not touch stay where they were. The result is
/// not normalized; a handle dragged past the opposite edge flips the box.
pub(crate) fn resize_box_corners(
    bounds: &Bounds,
    handle: ResizeHandle,
    point: Point,
) -> (Point, Point) {
    let Bounds {
        min_x,
        min_y,
        max_x,
        max_y,
    } = *bounds;

    match handle {
        ResizeHandle::TopLeft => (Point::new(point.x, min_y), Point::new(max_x, point.y)),
        ResizeHandle::Top => (Point::new(min_x, min_y), Point::new(max_x, point.y)),
        ResizeHandle::TopRight => (Point::new(min_x, min_y), point),
        ResizeHandle::Left => (Point::new(point.x, min_y), Point::new(max_x, max_y)),
        ResizeHandle::Right => (Point::new(min_x, min_y), Point::new(point.x, max_y)),
        ResizeHandle::BottomLeft => (point, Point::new(max_x, max_y)),
        ResizeHandle::Bottom => (Point::new(min_x, point.y), Point::new(max_x, max_y)),
        ResizeHandle::BottomRight => (Point::new(min_x, max_y), point),
    }
}

/// Target box for a freehand rescale, without normalization.
///
/// Width and height are signed: dragging a handle across the opposite edge
/// yields a non-positive extent, which callers reject.
fn rescaled_box(old: &Bounds, handle: ResizeHandle, point: Point) -> (f32, f32, f32, f32) {
    // (x, y, width, height)
    match handle {
        ResizeHandle::TopLeft => (point.x, old.min_y, old.max_x - point.x, point.y - old.min_y),
        ResizeHandle::Top => (old.min_x, old.min_y, old.width(), point.y - old.min_y),
        ResizeHandle::TopRight => (
            old.min_x,
            old.min_y,
            point.x - old.min_x,
            point.y - old.min_y,
        ),
        ResizeHandle::Left => (point.x, old.min_y, old.max_x - point.x, old.height()),
        ResizeHandle::Right => (old.min_x, old.min_y, point.x - old.min_x, old.height()),
        ResizeHandle::BottomLeft => (point.x, point.y, old.max_x - point.x, old.max_y - point.y),
        ResizeHandle::Bottom => (old.min_x, point.y, old.width(), old.max_y - point.y),
        ResizeHandle::BottomRight => (
            old.min_x,
            point.y,
            point.x - old.min_x,
            old.max_y - point.y,
        ),
    }
}

/// Uniformly rescale `points` from their bounding box into the box produced
/// by dragging `handle` to `point`.
///
/// Returns `None` when either the current or the resulting box has no
/// positive width or height.
pub(crate) fn rescale_points(
    points: &[Point],
    handle: ResizeHandle,
    point: Point,
) -> Option<Vec<Point>> {
    let old = Bounds::from_points(points)?;
    if old.is_degenerate() {
        return None;
    }

    let (x, y, width, height) = rescaled_box(&old, handle, point);
    if width <= 0.0 || height <= 0.0 {
        return None;
    }

    let scale_x = width / old.width();
    let scale_y = height / old.height();

    Some(
        points
            .iter()
            .map(|p| {
                Point::new(
                    x + (p.x - old.min_x) * scale_x,
                    y + (p.y - old.min_y) * scale_y,
                )
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> Bounds {
        Bounds::from_corners(Point::new(0.0, 0.0), Point::new(100.0, 100.0))
    }

    #[test]
    fn test_handle_hit_test() {
        let handle = ManipulationHandle::new(ResizeHandle::TopLeft, Point::new(100.0, 100.0));

        assert!(handle.hit_test(&Point::new(104.0, 104.0), 8.0));
        assert!(!handle.hit_test(&Point::new(120.0, 120.0), 8.0));
    }

    #[test]
    fn test_box_handles_positions() {
        let handles = box_handles(&unit_box());
        assert_eq!(handles.len(), 8);

        let find = |h: ResizeHandle| handles.iter().find(|m| m.handle == h).unwrap().position;
        assert_eq!(find(ResizeHandle::TopLeft), Point::new(0.0, 100.0));
        assert_eq!(find(ResizeHandle::Top), Point::new(50.0, 100.0));
        assert_eq!(find(ResizeHandle::Right), Point::new(100.0, 50.0));
        assert_eq!(find(ResizeHandle::BottomRight), Point::new(100.0, 0.0));
    }

    #[test]
    fn test_endpoint_handles() {
        let handles = endpoint_handles(Point::new(1.0, 2.0), Point::new(3.0, 4.0));
        assert_eq!(handles.len(), 2);
        assert_eq!(handles[0].handle, ResizeHandle::TopLeft);
        assert_eq!(handles[1].position, Point::new(3.0, 4.0));
    }

    #[test]
    fn test_resize_corner_keeps_opposite_corner() {
        let (a, b) = resize_box_corners(&unit_box(), ResizeHandle::TopRight, Point::new(150.0, 130.0));
        let resized = Bounds::from_corners(a, b);
        assert_eq!(resized.min_x, 0.0);
        assert_eq!(resized.min_y, 0.0);
        assert_eq!(resized.max_x, 150.0);
        assert_eq!(resized.max_y, 130.0);
    }

    #[test]
    fn test_resize_edge_moves_single_edge() {
        let (a, b) = resize_box_corners(&unit_box(), ResizeHandle::Left, Point::new(-20.0, 999.0));
        let resized = Bounds::from_corners(a, b);
        assert_eq!(resized.min_x, -20.0);
        assert_eq!(resized.max_x, 100.0);
        assert_eq!(resized.min_y, 0.0);
        assert_eq!(resized.max_y, 100.0);

        let (a, b) = resize_box_corners(&unit_box(), ResizeHandle::Bottom, Point::new(999.0, -10.0));
        let resized = Bounds::from_corners(a, b);
        assert_eq!(resized.min_y, -10.0);
        assert_eq!(resized.max_y, 100.0);
        assert_eq!(resized.max_x, 100.0);
    }

    #[test]
    fn test_rescale_points_doubles_width() {
        let points = vec![Point::new(0.0, 0.0), Point::new(50.0, 100.0), Point::new(100.0, 50.0)];
        let scaled = rescale_points(&points, ResizeHandle::Right, Point::new(200.0, 50.0)).unwrap();
        assert_eq!(scaled[0], Point::new(0.0, 0.0));
        assert_eq!(scaled[1], Point::new(100.0, 100.0));
        assert_eq!(scaled[2], Point::new(200.0, 50.0));
    }

    #[test]
    fn test_rescale_rejects_collapsed_box() {
        let points = vec![Point::new(0.0, 0.0), Point::new(100.0, 100.0)];
        assert!(rescale_points(&points, ResizeHandle::Right, Point::new(0.0, 50.0)).is_none());
        assert!(rescale_points(&points, ResizeHandle::Top, Point::new(50.0, -10.0)).is_none());
    }

    #[test]
    fn test_rescale_rejects_flat_source() {
        let points = vec![Point::new(0.0, 10.0), Point::new(100.0, 10.0)];
        assert!(rescale_points(&points, ResizeHandle::Top, Point::new(50.0, 40.0)).is_none());
    }
}
