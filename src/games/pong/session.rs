//! Client session state machine.
//!
//! ```text
//!   Connecting --welcome--> Waiting --start / clock--> Playing
//!       ^                      |                          |
//!       +------ any failure ---+--------------------------+
//! ```
//!
//! The host loop calls [`Session::on_tick`] once per frame; the session never
//! blocks and never owns the loop.

use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info, trace, warn};

use crate::core::config::{ClientConfig, StartTrigger};
use crate::core::error::{NetError, Result};
use crate::core::transport::{ConnectionState, LineStream};
use crate::games::pong::game::{Ball, Court, Rect, Side};
use crate::games::pong::protocol::{Message, Steer};

/// Source of wall-clock seconds for scheduled starts.
pub trait Clock {
    fn now_epoch_secs(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_secs(&self) -> i64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(since) => since.as_secs() as i64,
            Err(before) => -(before.duration().as_secs() as i64),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    #[default]
    Unassigned,
    /// Left paddle; decides when a goal happened.
    Parent,
    Child,
}

impl Role {
    /// Anyone not told `isParent` plays on the right.
    pub fn paddle(self) -> Side {
        match self {
            Self::Parent => Side::Left,
            Self::Unassigned | Self::Child => Side::Right,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Waiting {
    /// Epoch second announced by `start,<t>`.
    pub start_at: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connecting,
    Waiting(Waiting),
    Playing,
}

/// Everything that lives for one connection and goes away with it.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub role: Role,
    pub court: Court,
    /// Set after sending `goal`, cleared when the reset comes back.
    pub goal_signaled: bool,
}

/// What the renderer gets each tick.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderState {
    pub phase: Phase,
    pub role: Role,
    pub peer_ready: bool,
    pub ball: Ball,
    pub left: Rect,
    pub right: Rect,
}

pub struct Session<C = SystemClock> {
    config: ClientConfig,
    link: LineStream,
    phase: Phase,
    state: SessionState,
    clock: C,
    peer_ready: bool,
    connect_attempts: u64,
}

impl Session<SystemClock> {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> Session<C> {
    pub fn with_clock(config: ClientConfig, clock: C) -> Self {
        let link = LineStream::new(config.link.clone());
        Self {
            config,
            link,
            phase: Phase::Connecting,
            state: SessionState::default(),
            clock,
            peer_ready: false,
            connect_attempts: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn role(&self) -> Role {
        self.state.role
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// TCP is up. Says nothing about the server having greeted us.
    pub fn transport_connected(&self) -> bool {
        self.link.is_connected()
    }

    /// The server has acknowledged this client.
    pub fn peer_ready(&self) -> bool {
        self.peer_ready
    }

    pub fn link_state(&self) -> ConnectionState {
        self.link.state()
    }

    pub fn connect_attempts(&self) -> u64 {
        self.connect_attempts
    }

    /// One frame: drain inbound units, update state, send.
    pub fn on_tick(&mut self, steer: Steer) -> RenderState {
        self.link.poll();
        let next = match self.phase {
            Phase::Connecting => self.tick_connecting(),
            Phase::Waiting(waiting) => self.tick_waiting(waiting),
            Phase::Playing => self.tick_playing(steer),
        };
        self.transition(next);
        self.render_state()
    }

    pub fn render_state(&self) -> RenderState {
        RenderState {
            phase: self.phase,
            role: self.state.role,
            peer_ready: self.peer_ready,
            ball: self.state.court.ball,
            left: self.state.court.left,
            right: self.state.court.right,
        }
    }

    /// Closes the connection; the next tick starts over.
    pub fn shutdown(&mut self) {
        self.reset();
        self.phase = Phase::Connecting;
    }

    fn tick_connecting(&mut self) -> Phase {
        match self.link.state() {
            ConnectionState::Errored => {
                if let Some(error) = self.link.last_error() {
                    warn!(%error, attempt = self.connect_attempts, "retrying connect");
                }
                self.link.disconnect();
                self.dial();
                Phase::Connecting
            }
            ConnectionState::Disconnected => {
                self.dial();
                Phase::Connecting
            }
            ConnectionState::Connecting => Phase::Connecting,
            ConnectionState::Connected => {
                if self.config.start_trigger == StartTrigger::Connected {
                    self.peer_ready = true;
                    return Phase::Waiting(Waiting::default());
                }
                self.await_welcome()
            }
        }
    }

    fn await_welcome(&mut self) -> Phase {
        if let Err(error) = self.receive() {
            return self.recover(error);
        }
        loop {
            match self.next_message() {
                Ok(Some(Message::Welcome)) => {
                    info!("server welcomed us");
                    self.peer_ready = true;
                    return Phase::Waiting(Waiting::default());
                }
                Ok(Some(other)) => self.apply_common(other),
                Ok(None) => return Phase::Connecting,
                Err(error) => return self.recover(error),
            }
        }
    }

    fn tick_waiting(&mut self, mut waiting: Waiting) -> Phase {
        if !self.link.is_connected() {
            let error = self
                .link
                .last_error()
                .cloned()
                .unwrap_or_else(NetError::not_connected);
            return self.recover(error);
        }

        let trigger = self.config.start_trigger;
        if trigger == StartTrigger::Connected {
            return Phase::Playing;
        }
        if let Err(error) = self.receive() {
            return self.recover(error);
        }

        loop {
            if let Some(start_at) = waiting.start_at {
                if self.clock.now_epoch_secs() >= start_at {
                    return Phase::Playing;
                }
            }

            let message = match self.next_message() {
                Ok(Some(message)) => message,
                Ok(None) => return Phase::Waiting(waiting),
                Err(error) => return self.recover(error),
            };

            match (message, trigger) {
                (Message::Start(Some(start_at)), StartTrigger::Scheduled) => {
                    info!(start_at, "match scheduled");
                    waiting.start_at = Some(start_at);
                }
                (Message::Start(None), StartTrigger::Scheduled) => {
                    return self.recover(NetError::protocol("start without a time"));
                }
                (Message::Start(_), _) => return Phase::Playing,
                (other, _) => self.apply_common(other),
            }
        }
    }

    fn tick_playing(&mut self, steer: Steer) -> Phase {
        if let Err(error) = self.link.send_text(&Message::Move(steer).encode()) {
            return self.recover(error);
        }
        if let Err(error) = self.receive() {
            return self.recover(error);
        }

        loop {
            match self.next_message() {
                Ok(Some(Message::Goal)) => {
                    debug!("goal acknowledged, ball reset");
                    self.state.court.recenter_ball();
                    self.state.goal_signaled = false;
                }
                Ok(Some(other)) => self.apply_common(other),
                Ok(None) => break,
                Err(error) => return self.recover(error),
            }
        }

        self.state.court.step();

        if self.state.role == Role::Parent && !self.state.goal_signaled {
            if let Some(side) = self.state.court.ball_out() {
                if let Err(error) = self.link.send_text(&Message::Goal.encode()) {
                    return self.recover(error);
                }
                info!(?side, "ball out, goal signaled");
                self.state.goal_signaled = true;
            }
        }
        Phase::Playing
    }

    /// Messages that mean the same in every phase.
    fn apply_common(&mut self, message: Message) {
        match message {
            Message::IsParent => match self.state.role {
                Role::Unassigned => {
                    info!("assigned parent role");
                    self.state.role = Role::Parent;
                }
                role => warn!(?role, "ignoring repeated role assignment"),
            },
            Message::Parent(steer) => self.state.court.set_steer(Side::Left, steer),
            Message::Child(steer) => self.state.court.set_steer(Side::Right, steer),
            other => debug!(msg = %other, phase = ?self.phase, "ignored"),
        }
    }

    /// Next unit already pulled in by [`receive`](Self::receive).
    fn next_message(&mut self) -> Result<Option<Message>> {
        let Some(unit) = self.link.take_line()? else {
            return Ok(None);
        };
        trace!(unit = unit.trim_end(), "received");
        Message::parse(&unit).map(Some)
    }

    /// One socket read per tick; the drain loops work from the buffer.
    fn receive(&mut self) -> Result<()> {
        self.link.receive().map(|_| ())
    }

    fn dial(&mut self) {
        self.connect_attempts += 1;
        self.link.connect(&self.config.server_addr);
    }

    fn recover(&mut self, error: NetError) -> Phase {
        if error.is_transport() {
            warn!(%error, phase = ?self.phase, "connection lost");
        } else {
            warn!(%error, phase = ?self.phase, "dropping connection after bad input");
        }
        self.reset();
        Phase::Connecting
    }

    fn reset(&mut self) {
        self.link.disconnect();
        self.state = SessionState::default();
        self.peer_ready = false;
    }

    fn transition(&mut self, next: Phase) {
        if std::mem::discriminant(&self.phase) == std::mem::discriminant(&next) {
            self.phase = next;
            return;
        }
        info!(from = ?self.phase, to = ?next, "phase change");
        self.phase = next;
        match next {
            Phase::Connecting => self.reset(),
            Phase::Waiting(_) => {}
            Phase::Playing => {
                let court = &mut self.state.court;
                *court = Court {
                    left_steer: court.left_steer,
                    right_steer: court.right_steer,
                    ..Court::new()
                };
                self.state.goal_signaled = false;
            }
        }
    }
}
