use ratatui::layout::{Alignment, Rect as Area};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::games::pong::game::{Rect, Side, Vec2, FIELD_HEIGHT, FIELD_WIDTH};
use crate::games::pong::session::{Phase, RenderState};

/// Draws the court scaled to the terminal, with a status line on top.
pub fn render(frame: &mut Frame, view: &RenderState) {
    let area = frame.area();
    if area.height < 3 || area.width < 3 {
        return;
    }

    frame.render_widget(
        Paragraph::new(status_line(view)).alignment(Alignment::Center),
        Area::new(area.x, area.y, area.width, 1),
    );
    let field = Area::new(area.x, area.y + 1, area.width, area.height - 1);
    frame.render_widget(Block::default().borders(Borders::ALL), field);

    if view.phase != Phase::Playing {
        return;
    }
    let inner = Area::new(
        field.x + 1,
        field.y + 1,
        field.width.saturating_sub(2),
        field.height.saturating_sub(2),
    );
    if inner.width == 0 || inner.height == 0 {
        return;
    }

    for paddle in [view.left, view.right] {
        frame.render_widget(
            Block::default().borders(Borders::ALL),
            scale_rect(paddle, inner),
        );
    }
    if let Some(ball) = scale_point(view.ball.center, inner) {
        frame.render_widget(Paragraph::new("O"), ball);
    }
}

pub fn status_line(view: &RenderState) -> String {
    let side = match view.role.paddle() {
        Side::Left => "left paddle",
        Side::Right => "right paddle",
    };
    match view.phase {
        Phase::Connecting => "Connecting to server...".to_string(),
        Phase::Waiting(waiting) => match waiting.start_at {
            Some(at) => format!("Match starts at {at} | {side}"),
            None => "Waiting for opponent".to_string(),
        },
        Phase::Playing => format!("Playing {side} | Up/Down to move, Esc to quit"),
    }
}

/// Maps a court rectangle onto terminal cells, at least one cell each way.
fn scale_rect(rect: Rect, inner: Area) -> Area {
    let sx = f32::from(inner.width) / FIELD_WIDTH;
    let sy = f32::from(inner.height) / FIELD_HEIGHT;
    let max_x = inner.width.saturating_sub(1);
    let max_y = inner.height.saturating_sub(1);

    let x = ((rect.x * sx) as u16).min(max_x);
    let y = ((rect.y * sy) as u16).min(max_y);
    let w = ((rect.w * sx).round() as u16).clamp(1, inner.width - x);
    let h = ((rect.h * sy).round() as u16).clamp(1, inner.height - y);
    Area::new(inner.x + x, inner.y + y, w, h)
}

/// `None` while the point is off the field.
fn scale_point(point: Vec2, inner: Area) -> Option<Area> {
    if point.x < 0.0 || point.y < 0.0 || point.x >= FIELD_WIDTH || point.y >= FIELD_HEIGHT {
        return None;
    }
    let x = (point.x / FIELD_WIDTH * f32::from(inner.width)) as u16;
    let y = (point.y / FIELD_HEIGHT * f32::from(inner.height)) as u16;
    Some(Area::new(
        inner.x + x.min(inner.width - 1),
        inner.y + y.min(inner.height - 1),
        1,
        1,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::pong::game::Court;
    use crate::games::pong::session::{Role, Waiting};

    fn view(phase: Phase, role: Role) -> RenderState {
        let court = Court::new();
        RenderState {
            phase,
            role,
            peer_ready: true,
            ball: court.ball,
            left: court.left,
            right: court.right,
        }
    }

    #[test]
    fn test_status_line_per_phase() {
        let scheduled = Phase::Waiting(Waiting { start_at: Some(42) });
        assert_eq!(
            status_line(&view(scheduled, Role::Parent)),
            "Match starts at 42 | left paddle"
        );
        assert!(status_line(&view(Phase::Playing, Role::Child)).starts_with("Playing right paddle"));
        assert!(
            status_line(&view(Phase::Playing, Role::Unassigned)).starts_with("Playing right paddle")
        );
        let mut connecting = view(Phase::Connecting, Role::Unassigned);
        connecting.peer_ready = false;
        assert_eq!(status_line(&connecting), "Connecting to server...");
    }

    #[test]
    fn test_scaling_stays_inside_area() {
        let inner = Area::new(1, 2, 64, 24);
        let court = Court::new();
        let left = scale_rect(court.left, inner);
        assert_eq!((left.x, left.y, left.width, left.height), (6, 11, 3, 6));

        let corner = scale_rect(Rect::new(639.0, 479.0, 30.0, 120.0), inner);
        assert!(corner.right() <= inner.right());
        assert!(corner.bottom() <= inner.bottom());

        assert_eq!(scale_point(Vec2::new(-5.0, 10.0), inner), None);
        assert_eq!(
            scale_point(Vec2::new(320.0, 240.0), inner),
            Some(Area::new(33, 14, 1, 1))
        );
    }
}
