//! Bézier cursor-path generation (spec.md §4.3 step 5): a human click
//! doesn't teleport the pointer straight to the target, it approaches
//! along a gently curved, slightly uneven path with an occasional
//! overshoot-then-correct on long moves.

use rand::Rng;

pub type Point = (f64, f64);

/// One planned mouse-move waypoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waypoint {
    pub x: f64,
    pub y: f64,
}

/// Plan the sequence of waypoints a synthetic `mousemove` stream should
/// visit between `start` and `end`. Always ends exactly on `end`.
pub fn plan_path<R: Rng + ?Sized>(start: Point, end: Point, rng: &mut R) -> Vec<Waypoint> {
    let (sx, sy) = start;
    let (ex, ey) = end;
    let dx = ex - sx;
    let dy = ey - sy;
    let distance = dx.hypot(dy);

    if distance < f64::EPSILON {
        return vec![Waypoint { x: ex, y: ey }];
    }

    let (perp_x, perp_y) = (-dy / distance, dx / distance);
    let max_offset = (distance * 0.35).min(120.0);
    let cp1_offset = rng.gen_range(-max_offset..=max_offset);
    let cp2_offset = rng.gen_range(-max_offset..=max_offset);

    let cp1 = (
        sx + dx * 0.3 + perp_x * cp1_offset,
        sy + dy * 0.3 + perp_y * cp1_offset,
    );
    let cp2 = (
        sx + dx * 0.7 + perp_x * cp2_offset,
        sy + dy * 0.7 + perp_y * cp2_offset,
    );

    let steps = ((distance / 4.0).min(100.0).max(15.0)) as usize;
    let jitter_amplitude = (distance * 0.003).min(1.5);

    let mut path = Vec::with_capacity(steps + 2);
    for i in 0..=steps {
        let t = i as f64 / steps as f64;
        let eased = ease_in_out(t);
        let (bx, by) = cubic_bezier((sx, sy), cp1, cp2, (ex, ey), eased);
        let jitter = (std::f64::consts::PI * t).sin() * jitter_amplitude;
        let point = Waypoint {
            x: bx + perp_x * jitter,
            y: by + perp_y * jitter,
        };
        path.push(point);
        if i != 0 && i != steps && rng.gen_bool(0.08) {
            path.push(point);
        }
    }

    if let Some(last) = path.last_mut() {
        last.x = ex;
        last.y = ey;
    }

    if distance > 200.0 {
        let magnitude = 20.0_f64.min(distance * 0.06) * (0.4 + 0.6 * rng.r#gen::<f64>());
        let dir = (dx / distance, dy / distance);
        path.push(Waypoint {
            x: ex + dir.0 * magnitude,
            y: ey + dir.1 * magnitude,
        });
        path.push(Waypoint { x: ex, y: ey });
    }

    path
}

fn ease_in_out(t: f64) -> f64 {
    0.5 - 0.5 * (std::f64::consts::PI * t).cos()
}

fn cubic_bezier(p0: Point, p1: Point, p2: Point, p3: Point, t: f64) -> Point {
    let mt = 1.0 - t;
    let a = mt * mt * mt;
    let b = 3.0 * mt * mt * t;
    let c = 3.0 * mt * t * t;
    let d = t * t * t;
    (
        a * p0.0 + b * p1.0 + c * p2.0 + d * p3.0,
        a * p0.1 + b * p1.1 + c * p2.1 + d * p3.1,
    )
}
