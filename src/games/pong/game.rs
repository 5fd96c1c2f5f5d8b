use crate::games::pong::protocol::Steer;

pub const FIELD_WIDTH: f32 = 640.0;
pub const FIELD_HEIGHT: f32 = 480.0;
pub const BALL_RADIUS: f32 = 10.0;
/// Pixels per tick per unit of ball direction.
pub const BALL_SPEED: f32 = 3.0;
/// Pixels per tick per unit of steer.
pub const PADDLE_SPEED: f32 = 3.0;

const PADDLE_WIDTH: f32 = 30.0;
const PADDLE_HEIGHT: f32 = 120.0;
const PADDLE_TOP: f32 = 180.0;
const LEFT_PADDLE_X: f32 = 50.0;
const RIGHT_PADDLE_X: f32 = 560.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Whether a circle overlaps this rectangle.
    pub fn touches_circle(&self, center: Vec2, radius: f32) -> bool {
        let nearest_x = center.x.clamp(self.x, self.x + self.w);
        let nearest_y = center.y.clamp(self.y, self.y + self.h);
        let dx = center.x - nearest_x;
        let dy = center.y - nearest_y;
        dx * dx + dy * dy <= radius * radius
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ball {
    pub center: Vec2,
    /// Direction in units of [`BALL_SPEED`].
    pub velocity: Vec2,
    pub radius: f32,
}

impl Default for Ball {
    fn default() -> Self {
        Self {
            center: Vec2::new(FIELD_WIDTH / 2.0, FIELD_HEIGHT / 2.0),
            velocity: Vec2::new(-1.0, 1.0),
            radius: BALL_RADIUS,
        }
    }
}

/// Ball and paddles for one match.
#[derive(Debug, Clone, PartialEq)]
pub struct Court {
    pub ball: Ball,
    pub left: Rect,
    pub right: Rect,
    pub left_steer: Steer,
    pub right_steer: Steer,
}

impl Default for Court {
    fn default() -> Self {
        Self {
            ball: Ball::default(),
            left: Rect::new(LEFT_PADDLE_X, PADDLE_TOP, PADDLE_WIDTH, PADDLE_HEIGHT),
            right: Rect::new(RIGHT_PADDLE_X, PADDLE_TOP, PADDLE_WIDTH, PADDLE_HEIGHT),
            left_steer: Steer::Idle,
            right_steer: Steer::Idle,
        }
    }
}

impl Court {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_steer(&mut self, side: Side, steer: Steer) {
        match side {
            Side::Left => self.left_steer = steer,
            Side::Right => self.right_steer = steer,
        }
    }

    /// Puts the ball back in the middle; its direction is kept.
    pub fn recenter_ball(&mut self) {
        self.ball.center = Ball::default().center;
    }

    /// Advances one tick.
    pub fn step(&mut self) {
        move_paddle(&mut self.left, self.left_steer);
        move_paddle(&mut self.right, self.right_steer);

        let ball = &mut self.ball;
        ball.center.x += BALL_SPEED * ball.velocity.x;
        ball.center.y += BALL_SPEED * ball.velocity.y;

        if ball.center.y < ball.radius {
            ball.velocity.y = ball.velocity.y.abs();
        } else if ball.center.y > FIELD_HEIGHT - ball.radius {
            ball.velocity.y = -ball.velocity.y.abs();
        }

        // Direction is forced away from the paddle so a ball that is still
        // overlapping on the next tick does not flip back into it.
        if self.left.touches_circle(ball.center, ball.radius) {
            ball.velocity.x = ball.velocity.x.abs();
        } else if self.right.touches_circle(ball.center, ball.radius) {
            ball.velocity.x = -ball.velocity.x.abs();
        }
    }

    /// The side whose goal line the ball has fully crossed.
    pub fn ball_out(&self) -> Option<Side> {
        let ball = &self.ball;
        if ball.center.x < -ball.radius {
            Some(Side::Left)
        } else if ball.center.x > FIELD_WIDTH + ball.radius {
            Some(Side::Right)
        } else {
            None
        }
    }
}

fn move_paddle(paddle: &mut Rect, steer: Steer) {
    let dy = PADDLE_SPEED * f32::from(steer.value());
    paddle.y = (paddle.y + dy).clamp(0.0, FIELD_HEIGHT - paddle.h);
}
