//! Match relay.
//!
//! Seats two clients, tells the first one it is the parent, announces the
//! start, then turns each `move` into `parent,<v>` / `child,<v>` for both
//! seats and repeats the parent's `goal` to both. Runs on the same
//! non-blocking tick model as the clients.

use std::io;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};

use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::core::config::{RelayConfig, RelayStart};
use crate::core::error::{NetError, Result};
use crate::core::transport::LineStream;
use crate::games::pong::protocol::Message;
use crate::games::pong::session::{Clock, SystemClock};

const SEATS: usize = 2;
const PARENT_SEAT: usize = 0;

struct Seat {
    link: LineStream,
    addr: SocketAddr,
}

pub struct Relay {
    listener: TcpListener,
    config: RelayConfig,
    seats: [Option<Seat>; SEATS],
    started: bool,
}

impl Relay {
    pub fn bind(config: RelayConfig) -> Result<Self> {
        let listener = TcpListener::bind(&config.bind_addr)?;
        listener.set_nonblocking(true)?;
        info!(addr = %listener.local_addr()?, start = ?config.start, "relay listening");
        Ok(Self {
            listener,
            config,
            seats: [None, None],
            started: false,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn seated(&self) -> usize {
        self.seats.iter().flatten().count()
    }

    pub fn match_started(&self) -> bool {
        self.started
    }

    /// One pass: accept, start the match once full, forward traffic.
    pub fn tick(&mut self, now: i64) {
        self.accept_pending();

        if !self.started && self.seated() == SEATS {
            self.start_match(now);
        }

        let mut outgoing = Vec::new();
        for index in 0..SEATS {
            match self.drain_seat(index) {
                Ok(messages) => outgoing.extend(messages),
                Err(error) => self.release(index, error),
            }
        }
        for message in outgoing {
            if let Err((index, error)) = self.broadcast(message) {
                self.release(index, error);
            }
        }
    }

    /// Ticks on the configured cadence until Ctrl-C.
    pub async fn run(mut self) -> Result<()> {
        let mut interval = tokio::time::interval(self.config.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = interval.tick() => self.tick(SystemClock.now_epoch_secs()),
                signal = &mut shutdown => {
                    signal?;
                    info!("relay shutting down");
                    break;
                }
            }
        }
        self.close_all();
        Ok(())
    }

    fn accept_pending(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, addr)) => self.seat(stream, addr),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    break;
                }
            }
        }
    }

    fn seat(&mut self, stream: TcpStream, addr: SocketAddr) {
        let free = if self.started {
            None
        } else {
            self.seats.iter().position(Option::is_none)
        };
        let Some(index) = free else {
            warn!(%addr, "match full, turning peer away");
            let _ = stream.shutdown(Shutdown::Both);
            return;
        };

        let mut link = match LineStream::from_accepted(stream, self.config.link.clone()) {
            Ok(link) => link,
            Err(error) => {
                warn!(%addr, %error, "could not adopt socket");
                return;
            }
        };
        if let Err(error) = link.send_text(&Message::Welcome.encode()) {
            warn!(%addr, %error, "greeting failed");
            return;
        }
        info!(%addr, seat = index, "peer seated");
        self.seats[index] = Some(Seat { link, addr });
    }

    fn start_match(&mut self, now: i64) {
        let start = match self.config.start {
            RelayStart::Scheduled { delay_secs } => Message::Start(Some(now + delay_secs)),
            RelayStart::Signal => Message::Start(None),
        };

        let announced = self
            .send_to(PARENT_SEAT, Message::IsParent)
            .map_err(|error| (PARENT_SEAT, error))
            .and_then(|()| self.broadcast(start));
        match announced {
            Ok(()) => {
                self.started = true;
                info!(%start, "match started");
            }
            Err((index, error)) => self.release(index, error),
        }
    }

    /// Reads everything a seat has sent and maps it to what both seats get.
    fn drain_seat(&mut self, index: usize) -> Result<Vec<Message>> {
        let Some(seat) = self.seats[index].as_mut() else {
            return Ok(Vec::new());
        };

        seat.link.receive()?;
        let mut outgoing = Vec::new();
        while let Some(unit) = seat.link.take_line()? {
            match Message::parse(&unit)? {
                Message::Move(steer) if index == PARENT_SEAT => {
                    outgoing.push(Message::Parent(steer))
                }
                Message::Move(steer) => outgoing.push(Message::Child(steer)),
                Message::Goal if index == PARENT_SEAT => outgoing.push(Message::Goal),
                other => debug!(seat = index, msg = %other, "ignored"),
            }
        }
        Ok(outgoing)
    }

    fn send_to(&mut self, index: usize, message: Message) -> Result<()> {
        match self.seats[index].as_mut() {
            Some(seat) => seat.link.send_text(&message.encode()),
            None => Err(NetError::not_connected()),
        }
    }

    fn broadcast(&mut self, message: Message) -> std::result::Result<(), (usize, NetError)> {
        for index in 0..SEATS {
            if self.seats[index].is_some() {
                self.send_to(index, message).map_err(|error| (index, error))?;
            }
        }
        Ok(())
    }

    /// Frees a seat. Once a match is running, losing either player ends it.
    fn release(&mut self, index: usize, error: NetError) {
        let Some(mut seat) = self.seats[index].take() else {
            return;
        };
        warn!(seat = index, addr = %seat.addr, %error, "seat lost");
        seat.link.disconnect();

        if self.started {
            info!("match over, waiting for two players");
            self.close_all();
        }
    }

    fn close_all(&mut self) {
        for mut seat in self.seats.iter_mut().filter_map(Option::take) {
            seat.link.disconnect();
        }
        self.started = false;
    }
}
