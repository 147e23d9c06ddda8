//! Pure physics and collision routines for the Pong simulation.
//!
//! Every function here is stateless: it takes the relevant slice of game
//! state plus an explicit `dt` in seconds and mutates it in place. The
//! simulation tick in `game` decides ordering; tests can call any routine
//! in isolation with hand-built states.

use shared::{
    BallState, GameSettings, GameState, PaddleState, Side, BALL_ACCELERATION,
    BALL_MAX_SPEED_FACTOR, CANVAS_HEIGHT, CANVAS_WIDTH, COLLISION_PADDING, FRICTION,
    MAX_BALL_ANGLE,
};

/// Integrates the ball position and applies the per-tick friction decay.
pub fn advance_ball(ball: &mut BallState, dt: f32) {
    ball.x += ball.velocity_x * dt;
    ball.y += ball.velocity_y * dt;

    ball.velocity_x *= FRICTION;
    ball.velocity_y *= FRICTION;
    ball.speed = ball_speed(ball);
}

/// Integrates the paddle position and clamps it into the canvas.
/// Paddles never move horizontally.
pub fn advance_paddle(paddle: &mut PaddleState, dt: f32) {
    paddle.y += paddle.velocity_y * dt;
    paddle.y = paddle.y.clamp(0.0, CANVAS_HEIGHT - paddle.height);
}

/// True when the ball's vertical extent crosses the top or bottom edge.
pub fn wall_collision(ball: &BallState) -> bool {
    ball.y - ball.radius <= 0.0 || ball.y + ball.radius >= CANVAS_HEIGHT
}

/// Inverts vertical velocity and clamps the ball back inside the canvas
/// so it cannot tunnel or stick to an edge.
pub fn resolve_wall_collision(ball: &mut BallState) {
    ball.velocity_y = -ball.velocity_y;

    if ball.y - ball.radius < 0.0 {
        ball.y = ball.radius;
    } else if ball.y + ball.radius > CANVAS_HEIGHT {
        ball.y = CANVAS_HEIGHT - ball.radius;
    }
}

/// Bounding-circle-vs-rectangle test against both paddles.
/// Returns the side whose paddle was hit, if any.
pub fn paddle_collision(state: &GameState) -> Option<Side> {
    for side in [Side::Left, Side::Right] {
        if circle_hits_rect(&state.ball, &state.player(side).paddle) {
            return Some(side);
        }
    }
    None
}

fn circle_hits_rect(ball: &BallState, paddle: &PaddleState) -> bool {
    let closest_x = ball.x.clamp(paddle.x, paddle.x + paddle.width);
    let closest_y = ball.y.clamp(paddle.y, paddle.y + paddle.height);

    let dx = ball.x - closest_x;
    let dy = ball.y - closest_y;

    (dx * dx + dy * dy).sqrt() < ball.radius + COLLISION_PADDING
}

/// Reflects the ball off the paddle on `side`.
///
/// The deflection angle is a linear map of the hit position along the
/// paddle (0 = top edge, 1 = bottom edge) into [-MAX_BALL_ANGLE,
/// +MAX_BALL_ANGLE], so identical hit offsets always produce identical
/// exit angles. Speed increases by `BALL_ACCELERATION` per hit, bounded
/// by the hard cap, and the ball is pushed outside the paddle so the
/// collision cannot re-trigger on the next tick.
pub fn resolve_paddle_collision(state: &mut GameState, side: Side) {
    let max_speed = max_ball_speed(&state.settings);
    let paddle = state.player(side).paddle.clone();
    let ball = &mut state.ball;

    let hit = ((ball.y - paddle.y) / paddle.height).clamp(0.0, 1.0);
    let offset = (hit - 0.5) * 2.0;
    let angle = offset * MAX_BALL_ANGLE;

    let new_speed = (ball.speed * BALL_ACCELERATION).min(max_speed);
    let direction = match side {
        Side::Left => 1.0,
        Side::Right => -1.0,
    };

    ball.velocity_x = angle.cos() * new_speed * direction;
    ball.velocity_y = angle.sin() * new_speed;
    ball.speed = new_speed;

    match side {
        Side::Left => ball.x = ball.x.max(paddle.x + paddle.width + ball.radius),
        Side::Right => ball.x = ball.x.min(paddle.x - ball.radius),
    }
}

/// True when the ball has fully crossed the left or right edge.
pub fn out_of_bounds(ball: &BallState) -> bool {
    ball.x - ball.radius < 0.0 || ball.x + ball.radius > CANVAS_WIDTH
}

/// Which side conceded the point for an out-of-bounds ball.
pub fn out_side(ball: &BallState) -> Side {
    if ball.x - ball.radius < 0.0 {
        Side::Left
    } else {
        Side::Right
    }
}

/// Fresh centered ball served toward the side that just conceded.
pub fn reset_ball(settings: &GameSettings, conceding: Side) -> BallState {
    BallState::new(settings, conceding)
}

pub fn ball_speed(ball: &BallState) -> f32 {
    (ball.velocity_x * ball.velocity_x + ball.velocity_y * ball.velocity_y).sqrt()
}

/// Hard speed limit for a match played with `settings`.
pub fn max_ball_speed(settings: &GameSettings) -> f32 {
    settings.initial_ball_speed() * BALL_MAX_SPEED_FACTOR
}

/// Rescales velocity so the magnitude does not exceed `max_speed`.
pub fn cap_ball_speed(ball: &mut BallState, max_speed: f32) {
    let speed = ball_speed(ball);
    if speed > max_speed {
        let ratio = max_speed / speed;
        ball.velocity_x *= ratio;
        ball.velocity_y *= ratio;
        ball.speed = max_speed;
    }
}

/// True when the ball is traveling toward the paddle on `side`.
pub fn heading_toward(ball: &BallState, side: Side) -> bool {
    match side {
        Side::Left => ball.velocity_x < 0.0,
        Side::Right => ball.velocity_x > 0.0,
    }
}

/// Seconds until the ball reaches the front face of the paddle on `side`,
/// or None when it is moving away or has already passed it.
pub fn time_until_paddle(state: &GameState, side: Side) -> Option<f32> {
    let ball = &state.ball;
    let paddle = &state.player(side).paddle;

    let time = match side {
        Side::Left => {
            if ball.velocity_x >= 0.0 {
                return None;
            }
            (ball.x - (paddle.x + paddle.width)) / -ball.velocity_x
        }
        Side::Right => {
            if ball.velocity_x <= 0.0 {
                return None;
            }
            (paddle.x - ball.x) / ball.velocity_x
        }
    };

    (time >= 0.0).then_some(time)
}

/// Predicts the ball's y coordinate when it reaches `target_x`, folding
/// the trajectory at the top/bottom edges as many times as needed.
/// Returns None when the ball is not moving toward `target_x`.
pub fn intersection_y(ball: &BallState, target_x: f32) -> Option<f32> {
    if (target_x < ball.x && ball.velocity_x >= 0.0)
        || (target_x > ball.x && ball.velocity_x <= 0.0)
    {
        return None;
    }

    let time = (target_x - ball.x) / ball.velocity_x;
    let mut y = ball.y + ball.velocity_y * time;

    while y < 0.0 || y > CANVAS_HEIGHT {
        if y < 0.0 {
            y = -y;
        } else {
            y = 2.0 * CANVAS_HEIGHT - y;
        }
    }

    Some(y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::{GameSettings, Participant, BALL_RADIUS};

    fn test_state() -> GameState {
        GameState::new(
            "test-game".to_string(),
            &Participant::Human {
                id: "p1".to_string(),
                name: "p1".to_string(),
            },
            &Participant::Human {
                id: "p2".to_string(),
                name: "p2".to_string(),
            },
            GameSettings::default(),
            Side::Right,
        )
    }

    #[test]
    fn test_advance_ball_integrates_and_decays() {
        let mut state = test_state();
        state.ball.velocity_x = 100.0;
        state.ball.velocity_y = -50.0;
        let (x0, y0) = (state.ball.x, state.ball.y);

        advance_ball(&mut state.ball, 0.1);

        assert_approx_eq!(state.ball.x, x0 + 10.0);
        assert_approx_eq!(state.ball.y, y0 - 5.0);
        assert_approx_eq!(state.ball.velocity_x, 99.0);
        assert_approx_eq!(state.ball.speed, ball_speed(&state.ball));
    }

    #[test]
    fn test_paddle_clamped_to_canvas() {
        let mut state = test_state();
        let paddle = &mut state.players[0].paddle;

        paddle.velocity_y = -10_000.0;
        advance_paddle(paddle, 1.0);
        assert_eq!(paddle.y, 0.0);

        paddle.velocity_y = 10_000.0;
        advance_paddle(paddle, 1.0);
        assert_approx_eq!(paddle.y, CANVAS_HEIGHT - paddle.height);
    }

    #[test]
    fn test_wall_collision_detection_and_resolution() {
        let mut state = test_state();
        state.ball.y = 2.0;
        state.ball.velocity_y = -120.0;

        assert!(wall_collision(&state.ball));
        resolve_wall_collision(&mut state.ball);

        assert_approx_eq!(state.ball.y, state.ball.radius);
        assert!(state.ball.velocity_y > 0.0);
        assert!(!wall_collision(&state.ball));
    }

    #[test]
    fn test_paddle_collision_detection() {
        let mut state = test_state();
        assert_eq!(paddle_collision(&state), None);

        let paddle = state.players[0].paddle.clone();
        state.ball.x = paddle.x + paddle.width + BALL_RADIUS;
        state.ball.y = paddle.center_y();
        assert_eq!(paddle_collision(&state), Some(Side::Left));
    }

    #[test]
    fn test_center_hit_exits_flat() {
        let mut state = test_state();
        let paddle = state.players[0].paddle.clone();
        state.ball.x = paddle.x + paddle.width + 1.0;
        state.ball.y = paddle.center_y();
        state.ball.velocity_x = -state.ball.speed;
        state.ball.velocity_y = 0.0;

        resolve_paddle_collision(&mut state, Side::Left);

        assert!(state.ball.velocity_x > 0.0);
        assert_approx_eq!(state.ball.velocity_y, 0.0, 1e-3);
        // Pushed clear of the paddle face.
        assert!(state.ball.x >= paddle.x + paddle.width + state.ball.radius);
    }

    #[test]
    fn test_edge_hit_maps_to_max_angle() {
        let mut state = test_state();
        let paddle = state.players[1].paddle.clone();
        state.ball.x = paddle.x - 1.0;
        state.ball.y = paddle.y + paddle.height; // bottom edge, hit offset 1.0
        state.ball.velocity_x = state.ball.speed;
        state.ball.velocity_y = 0.0;

        resolve_paddle_collision(&mut state, Side::Right);

        let angle = (state.ball.velocity_y / state.ball.speed).asin();
        assert_approx_eq!(angle, MAX_BALL_ANGLE, 1e-3);
        assert!(state.ball.velocity_x < 0.0);
    }

    #[test]
    fn test_paddle_hit_accelerates_up_to_cap() {
        let mut state = test_state();
        let cap = max_ball_speed(&state.settings);
        let paddle = state.players[0].paddle.clone();

        for _ in 0..40 {
            state.ball.x = paddle.x + paddle.width + 1.0;
            state.ball.y = paddle.center_y();
            resolve_paddle_collision(&mut state, Side::Left);
        }

        assert_approx_eq!(state.ball.speed, cap, 1e-2);
        assert!(ball_speed(&state.ball) <= cap + 1e-2);
    }

    #[test]
    fn test_out_of_bounds_sides() {
        let mut state = test_state();
        state.ball.x = -1.0;
        assert!(out_of_bounds(&state.ball));
        assert_eq!(out_side(&state.ball), Side::Left);

        state.ball.x = CANVAS_WIDTH + 1.0;
        assert_eq!(out_side(&state.ball), Side::Right);

        state.ball.x = CANVAS_WIDTH / 2.0;
        assert!(!out_of_bounds(&state.ball));
    }

    #[test]
    fn test_reset_ball_serves_toward_conceder() {
        let settings = GameSettings::default();

        let ball = reset_ball(&settings, Side::Left);
        assert!(ball.velocity_x < 0.0);
        assert_approx_eq!(ball.x, CANVAS_WIDTH / 2.0);

        let ball = reset_ball(&settings, Side::Right);
        assert!(ball.velocity_x > 0.0);
        assert_approx_eq!(ball.speed, settings.initial_ball_speed());
    }

    #[test]
    fn test_cap_ball_speed_preserves_direction() {
        let mut state = test_state();
        state.ball.velocity_x = 3000.0;
        state.ball.velocity_y = 4000.0;

        cap_ball_speed(&mut state.ball, 500.0);

        assert_approx_eq!(ball_speed(&state.ball), 500.0, 1e-3);
        assert_approx_eq!(state.ball.velocity_x / state.ball.velocity_y, 0.75, 1e-4);
    }

    #[test]
    fn test_time_until_paddle() {
        let mut state = test_state();
        state.ball.x = CANVAS_WIDTH / 2.0;
        state.ball.velocity_x = 200.0;

        let t = time_until_paddle(&state, Side::Right).unwrap();
        let expected = (state.players[1].paddle.x - state.ball.x) / 200.0;
        assert_approx_eq!(t, expected);

        // Moving away from the left paddle.
        assert!(time_until_paddle(&state, Side::Left).is_none());
    }

    #[test]
    fn test_intersection_y_direct_path() {
        let mut state = test_state();
        state.ball.x = 400.0;
        state.ball.y = 300.0;
        state.ball.velocity_x = 100.0;
        state.ball.velocity_y = 50.0;

        // 2 seconds to reach x=600, y drifts by 100.
        let y = intersection_y(&state.ball, 600.0).unwrap();
        assert_approx_eq!(y, 400.0);
    }

    #[test]
    fn test_intersection_y_reflects_off_walls() {
        let mut state = test_state();
        state.ball.x = 400.0;
        state.ball.y = 550.0;
        state.ball.velocity_x = 100.0;
        state.ball.velocity_y = 100.0;

        // Unfolded y = 550 + 100 * 2 = 750, reflected: 2*600 - 750 = 450.
        let y = intersection_y(&state.ball, 600.0).unwrap();
        assert_approx_eq!(y, 450.0);
        assert!((0.0..=CANVAS_HEIGHT).contains(&y));
    }

    #[test]
    fn test_intersection_y_none_when_moving_away() {
        let mut state = test_state();
        state.ball.velocity_x = -100.0;
        assert!(intersection_y(&state.ball, CANVAS_WIDTH).is_none());
    }
}
