use address_importer::interpolation::{AddressRange, Interpolator, Side};
use proptest::prelude::*;

/// Polylines with strictly eastward steps, so every segment has length.
fn arb_line() -> impl Strategy<Value = Vec<[f64; 2]>> {
    (
        -120.0f64..-70.0,
        25.0f64..49.0,
        prop::collection::vec((0.0005f64..0.05, -0.05f64..0.05), 1..6),
    )
        .prop_map(|(x, y, steps)| {
            let mut vertices = vec![[x, y]];
            for (dx, dy) in steps {
                let [px, py] = vertices[vertices.len() - 1];
                vertices.push([px + dx, py + dy]);
            }
            vertices
        })
}

fn arb_range() -> impl Strategy<Value = AddressRange> {
    (0i64..5_000, 0i64..300, any::<bool>()).prop_map(|(start, span, descending)| {
        let end = if descending { start - span } else { start + span };
        AddressRange::new(Some(start), Some(end))
    })
}

fn arb_side() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Left), Just(Side::Right)]
}

proptest! {
    #[test]
    fn interpolation_is_deterministic(line in arb_line(), range in arb_range(), side in arb_side()) {
        let interpolator = Interpolator::default();
        let first = interpolator.interpolate(&line, range, side);
        let second = interpolator.interpolate(&line, range, side);

        prop_assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            prop_assert_eq!(a.house_number, b.house_number);
            prop_assert_eq!(a.longitude.to_bits(), b.longitude.to_bits());
            prop_assert_eq!(a.latitude.to_bits(), b.latitude.to_bits());
        }
    }

    #[test]
    fn numbers_step_by_two_from_start(line in arb_line(), range in arb_range(), side in arb_side()) {
        let points = Interpolator::default().interpolate(&line, range, side);
        let (start, end) = (range.start.unwrap(), range.end.unwrap());

        prop_assert_eq!(points.len(), (start.abs_diff(end) / 2 + 1) as usize);
        prop_assert_eq!(points[0].house_number, start);
        for pair in points.windows(2) {
            prop_assert_eq!((pair[1].house_number - pair[0].house_number).abs(), 2);
        }
    }

    #[test]
    fn straight_line_points_sit_at_offset_on_their_side(
        line in arb_line().prop_map(|v| vec![v[0], v[1]]),
        range in arb_range(),
        side in arb_side(),
        offset in 0.00001f64..0.001,
    ) {
        let [ox, oy] = line[0];
        let (dx, dy) = (line[1][0] - ox, line[1][1] - oy);
        let length = dx.hypot(dy);

        for point in Interpolator::new(offset).interpolate(&line, range, side) {
            let cross = dx * (point.latitude - oy) - dy * (point.longitude - ox);
            let distance = cross / length;
            let expected = match side {
                Side::Left => offset,
                Side::Right => -offset,
            };
            prop_assert!((distance - expected).abs() < 1e-9);
        }
    }
}
