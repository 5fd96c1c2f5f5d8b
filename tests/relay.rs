//! Integration tests for the match relay.
//!
//! The relay is ticked by hand. Players are either plain blocking sockets
//! that read what the relay wrote, or full client sessions.

use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::{Shutdown, TcpStream};
use std::thread;
use std::time::Duration;

use lanpong::core::config::{ClientConfig, RelayConfig, RelayStart};
use lanpong::games::pong::{Clock, Phase, Relay, Role, Session, Steer, SystemClock};

const NOW: i64 = 1_700_000_000;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn bind_relay(start: RelayStart) -> (Relay, String) {
    let relay = Relay::bind(RelayConfig::new("127.0.0.1:0").with_start(start)).expect("bind relay");
    let addr = relay.local_addr().unwrap().to_string();
    (relay, addr)
}

/// Ticks with short pauses so loopback traffic lands between passes.
fn tick(relay: &mut Relay, passes: usize) {
    for _ in 0..passes {
        thread::sleep(Duration::from_millis(5));
        relay.tick(NOW);
    }
}

struct Player {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Player {
    fn join(addr: &str) -> Self {
        let stream = TcpStream::connect(addr).expect("connect to relay");
        stream
            .set_read_timeout(Some(Duration::from_millis(500)))
            .unwrap();
        let writer = stream.try_clone().unwrap();
        Self {
            reader: BufReader::new(stream),
            writer,
        }
    }

    fn send(&mut self, text: &str) {
        self.writer.write_all(text.as_bytes()).unwrap();
    }

    fn line(&mut self) -> String {
        let mut line = String::new();
        self.reader.read_line(&mut line).expect("relay went quiet");
        line
    }

    /// True once the relay has closed its end.
    fn closed(&mut self) -> bool {
        let mut line = String::new();
        matches!(self.reader.read_line(&mut line), Ok(0))
    }

    /// True when nothing arrives within the read timeout.
    fn quiet(&mut self) -> bool {
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Err(e) => matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut),
            Ok(_) => false,
        }
    }

    fn leave(self) {
        let _ = self.writer.shutdown(Shutdown::Both);
    }
}

/// One relay pass followed by one tick of each session.
fn pass(relay: &mut Relay, a: &mut Session, b: &mut Session, steer_a: Steer) {
    relay.tick(SystemClock.now_epoch_secs());
    a.on_tick(steer_a);
    b.on_tick(Steer::Idle);
}

/// Two seated players with the match announced and the preamble consumed.
fn started_match() -> (Relay, String, Player, Player) {
    let (mut relay, addr) = bind_relay(RelayStart::Signal);
    let mut parent = Player::join(&addr);
    tick(&mut relay, 2);
    let mut child = Player::join(&addr);
    tick(&mut relay, 2);
    assert!(relay.match_started());

    assert_eq!(parent.line(), "welcome\n");
    assert_eq!(parent.line(), "isParent\n");
    assert_eq!(parent.line(), "start\n");
    assert_eq!(child.line(), "welcome\n");
    assert_eq!(child.line(), "start\n");
    (relay, addr, parent, child)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn first_seat_becomes_parent_and_both_get_the_start_time() {
    let (mut relay, addr) = bind_relay(RelayStart::Scheduled { delay_secs: 3 });

    let mut first = Player::join(&addr);
    tick(&mut relay, 2);
    assert_eq!(relay.seated(), 1);
    assert!(!relay.match_started());
    assert_eq!(first.line(), "welcome\n");

    let mut second = Player::join(&addr);
    tick(&mut relay, 2);
    assert_eq!(relay.seated(), 2);
    assert!(relay.match_started());

    assert_eq!(first.line(), "isParent\n");
    assert_eq!(first.line(), "start,1700000003\n");
    assert_eq!(second.line(), "welcome\n");
    assert_eq!(second.line(), "start,1700000003\n");
}

#[test]
fn moves_come_back_tagged_by_seat() {
    let (mut relay, _addr, mut parent, mut child) = started_match();

    parent.send("move,1\n");
    child.send("move,-1\n");
    tick(&mut relay, 3);

    for player in [&mut parent, &mut child] {
        assert_eq!(player.line(), "parent,1\n");
        assert_eq!(player.line(), "child,-1\n");
    }
}

#[test]
fn only_the_parent_can_score() {
    let (mut relay, _addr, mut parent, mut child) = started_match();

    child.send("goal\n");
    tick(&mut relay, 3);
    parent.send("goal\n");
    tick(&mut relay, 3);

    assert_eq!(parent.line(), "goal\n");
    assert_eq!(child.line(), "goal\n");
    assert!(parent.quiet());
    assert!(child.quiet());
}

#[test]
fn third_peer_is_turned_away() {
    let (mut relay, addr, _parent, _child) = started_match();

    let mut late = Player::join(&addr);
    tick(&mut relay, 2);
    assert!(late.closed());
    assert_eq!(relay.seated(), 2);
    assert!(relay.match_started());
}

#[test]
fn losing_a_player_ends_the_match() {
    let (mut relay, addr, mut parent, child) = started_match();

    child.leave();
    tick(&mut relay, 5);
    assert_eq!(relay.seated(), 0);
    assert!(!relay.match_started());
    assert!(parent.closed());

    let mut next = Player::join(&addr);
    tick(&mut relay, 2);
    assert_eq!(relay.seated(), 1);
    assert_eq!(next.line(), "welcome\n");
}

#[test]
fn garbage_before_the_match_frees_the_seat() {
    let (mut relay, addr) = bind_relay(RelayStart::Signal);
    let mut player = Player::join(&addr);
    tick(&mut relay, 2);
    assert_eq!(player.line(), "welcome\n");

    player.send("hello\n");
    tick(&mut relay, 3);
    assert_eq!(relay.seated(), 0);
    assert!(player.closed());
}

#[tokio::test]
async fn two_sessions_play_through_the_relay() {
    let (mut relay, addr) = bind_relay(RelayStart::Scheduled { delay_secs: 0 });
    let config = ClientConfig::new(addr).with_connect_timeout(Duration::from_secs(1));
    let mut a = Session::new(config.clone());
    let mut b = Session::new(config);

    tokio::time::timeout(Duration::from_secs(5), async {
        while a.phase() != Phase::Playing || b.phase() != Phase::Playing {
            pass(&mut relay, &mut a, &mut b, Steer::Idle);
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("both sessions should reach Playing");

    // Only seat 0 is told `isParent`; the other peer stays unassigned and
    // plays the right paddle.
    let mut roles = [a.role(), b.role()];
    roles.sort_by_key(|role| *role != Role::Parent);
    assert_eq!(roles, [Role::Parent, Role::Unassigned]);
    assert!(a.peer_ready() && b.peer_ready());

    // Whoever holds the parent seat steers; both courts must see the left
    // paddle move the same way.
    let (parent, child) = if a.role() == Role::Parent {
        (&mut a, &mut b)
    } else {
        (&mut b, &mut a)
    };
    tokio::time::timeout(Duration::from_secs(5), async {
        while parent.state().court.left_steer != Steer::Down
            || child.state().court.left_steer != Steer::Down
        {
            pass(&mut relay, parent, child, Steer::Down);
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("relayed steer should reach both courts");
    assert_eq!(child.state().court.right_steer, Steer::Idle);
}
