//! Address-range interpolation along street centerlines.
//!
//! A TIGER edge carries a range of house numbers per side of the street but no
//! positions for individual houses. The engine spreads the numbers of one side
//! evenly along the edge's arc length and pushes every point off the centerline,
//! to the left or right of the direction of travel, so the two sides of the
//! street do not collide.

use crate::constants;
use crate::domain::Address;

/// Side of the street relative to the line's vertex order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    fn sign(self) -> f64 {
        match self {
            Side::Left => 1.0,
            Side::Right => -1.0,
        }
    }
}

/// Inclusive house-number range; either end may be missing in the source data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRange {
    pub start: Option<i64>,
    pub end: Option<i64>,
}

impl AddressRange {
    pub fn new(start: Option<i64>, end: Option<i64>) -> Self {
        Self { start, end }
    }

    pub fn is_complete(&self) -> bool {
        self.start.is_some() && self.end.is_some()
    }

    /// Number of houses the range holds under odd/even addressing.
    ///
    /// Counts the span's magnitude, so a descending range such as `(21, 19)` holds
    /// two houses and is later numbered with a negative step.
    pub fn house_count(&self) -> u64 {
        match (self.start, self.end) {
            (Some(start), Some(end)) => start.abs_diff(end) / 2 + 1,
            _ => 0,
        }
    }

    /// More houses than any real street edge carries; treated as corrupt data.
    pub fn is_oversized(&self) -> bool {
        self.house_count() > constants::MAX_HOUSES_PER_SIDE
    }
}

/// One interpolated house position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpolatedPoint {
    pub house_number: i64,
    pub longitude: f64,
    pub latitude: f64,
}

#[derive(Debug, Clone, Copy)]
struct Segment {
    origin: [f64; 2],
    delta: [f64; 2],
    length: f64,
    /// Arc length of the polyline before this segment
    offset: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct Interpolator {
    offset_degrees: f64,
}

impl Interpolator {
    pub fn new(offset_degrees: f64) -> Self {
        Self { offset_degrees }
    }

    pub fn offset_degrees(&self) -> f64 {
        self.offset_degrees
    }

    /// Positions and numbers for one side of a line.
    ///
    /// Numbers step by two from `start` toward `end`, whichever direction that is;
    /// positions always follow the vertex order of `vertices` (`[x, y]` pairs in degrees).
    /// Incomplete and oversized ranges yield nothing.
    pub fn interpolate(
        &self,
        vertices: &[[f64; 2]],
        range: AddressRange,
        side: Side,
    ) -> Vec<InterpolatedPoint> {
        let (start, end) = match (range.start, range.end) {
            (Some(start), Some(end)) => (start, end),
            _ => return Vec::new(),
        };

        let segments = build_segments(vertices);
        let total_length = match segments.last() {
            Some(last) => last.offset + last.length,
            None => return Vec::new(),
        };

        if range.is_oversized() {
            return Vec::new();
        }
        let count = range.house_count() as usize;
        // Descending ranges keep their direction: numbering steps down from `start`
        let step: i64 = if end >= start { 2 } else { -2 };
        let sign = side.sign();

        let mut points = Vec::new();
        let mut current = 0;
        for i in 0..count {
            let target = total_length * (i as f64 + 0.5) / count as f64;
            // Targets only grow, so the bracketing segment never moves backwards
            while current + 1 < segments.len()
                && segments[current].offset + segments[current].length < target
            {
                current += 1;
            }
            let segment = &segments[current];
            let t = ((target - segment.offset) / segment.length).clamp(0.0, 1.0);

            let [dx, dy] = segment.delta;
            let normal = [-dy / segment.length, dx / segment.length];
            let x = segment.origin[0] + t * dx + sign * self.offset_degrees * normal[0];
            let y = segment.origin[1] + t * dy + sign * self.offset_degrees * normal[1];

            points.push(InterpolatedPoint {
                house_number: start + step * i as i64,
                longitude: x,
                latitude: y,
            });
        }
        points
    }

    /// Interpolated addresses for one side, sharing every attribute of `template`
    /// except the house number and position.
    pub fn addresses(
        &self,
        vertices: &[[f64; 2]],
        range: AddressRange,
        side: Side,
        template: &Address,
    ) -> Vec<Address> {
        self.interpolate(vertices, range, side)
            .into_iter()
            .map(|point| Address {
                house_number: Some(point.house_number.to_string()),
                latitude: point.latitude,
                longitude: point.longitude,
                ..template.clone()
            })
            .collect()
    }
}

impl Default for Interpolator {
    fn default() -> Self {
        Self::new(crate::constants::DEFAULT_OFFSET_DEGREES)
    }
}

fn build_segments(vertices: &[[f64; 2]]) -> Vec<Segment> {
    let mut segments = Vec::with_capacity(vertices.len().saturating_sub(1));
    let mut travelled = 0.0;
    for pair in vertices.windows(2) {
        let delta = [pair[1][0] - pair[0][0], pair[1][1] - pair[0][1]];
        let length = delta[0].hypot(delta[1]);
        if !length.is_finite() || length <= 0.0 {
            continue;
        }
        segments.push(Segment {
            origin: pair[0],
            delta,
            length,
            offset: travelled,
        });
        travelled += length;
    }
    segments
}
