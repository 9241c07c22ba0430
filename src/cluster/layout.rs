use crate::ir::Point;

pub fn centroid(points: impl IntoIterator<Item = Point>) -> Point {
    let mut sum_x = 0.0f64;
    let mut sum_y = 0.0f64;
    let mut count = 0usize;
    for point in points {
        sum_x += point.x as f64;
        sum_y += point.y as f64;
        count += 1;
    }
    if count == 0 {
        return Point::default();
    }
    Point::new((sum_x / count as f64) as f32, (sum_y / count as f64) as f32)
}

/// Equal angular spacing on a circle, first slot at the top, clockwise in
/// screen coordinates.
pub fn ring_positions(center: Point, radius: f32, count: usize) -> Vec<Point> {
    if count == 0 {
        return Vec::new();
    }
    (0..count)
        .map(|index| {
            let angle = (index as f32 / count as f32) * std::f32::consts::TAU
                - std::f32::consts::FRAC_PI_2;
            Point::new(center.x + radius * angle.cos(), center.y + radius * angle.sin())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centroid_is_mean() {
        let c = centroid([Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(5.0, 30.0)]);
        assert!((c.x - 5.0).abs() < 1e-4);
        assert!((c.y - 10.0).abs() < 1e-4);
        assert_eq!(centroid(Vec::new()), Point::default());
    }

    #[test]
    fn ring_starts_at_top_and_keeps_radius() {
        let ring = ring_positions(Point::new(100.0, 100.0), 50.0, 4);
        assert_eq!(ring.len(), 4);
        assert!((ring[0].x - 100.0).abs() < 1e-3);
        assert!((ring[0].y - 50.0).abs() < 1e-3);
        assert!((ring[1].x - 150.0).abs() < 1e-3);
        for point in &ring {
            let dist = ((point.x - 100.0).powi(2) + (point.y - 100.0).powi(2)).sqrt();
            assert!((dist - 50.0).abs() < 1e-3);
        }
    }
}
