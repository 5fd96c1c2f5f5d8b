//! Text messages exchanged between clients and the relay.
//!
//! One message per line, comma-separated, tag first:
//! `welcome`, `start[,<epoch>]`, `isParent`, `parent,<v>`, `child,<v>`,
//! `goal`, `move,<v>`.

use std::fmt;

use crate::core::error::{NetError, Result};

/// Paddle velocity before scaling: one of -1, 0, +1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Steer {
    Up,
    #[default]
    Idle,
    Down,
}

impl Steer {
    /// Both keys held cancel out.
    pub fn from_keys(up: bool, down: bool) -> Self {
        match (up, down) {
            (true, false) => Self::Up,
            (false, true) => Self::Down,
            _ => Self::Idle,
        }
    }

    pub fn value(self) -> i8 {
        match self {
            Self::Up => -1,
            Self::Idle => 0,
            Self::Down => 1,
        }
    }

    pub fn from_value(value: i64) -> Result<Self> {
        match value {
            -1 => Ok(Self::Up),
            0 => Ok(Self::Idle),
            1 => Ok(Self::Down),
            other => Err(NetError::protocol(format!(
                "paddle velocity {other} out of range"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    Welcome,
    /// `None` is the bare signal form.
    Start(Option<i64>),
    IsParent,
    Parent(Steer),
    Child(Steer),
    Goal,
    Move(Steer),
}

impl Message {
    /// Parses one raw unit. A single trailing `\n` is stripped first.
    pub fn parse(unit: &str) -> Result<Self> {
        let line = unit.strip_suffix('\n').unwrap_or(unit);
        let mut fields = line.split(',');
        let tag = fields.next().unwrap_or_default();
        let payload: Vec<&str> = fields.collect();

        let message = match (tag, payload.as_slice()) {
            ("welcome", []) => Self::Welcome,
            ("start", []) => Self::Start(None),
            ("start", [at]) => Self::Start(Some(parse_int(tag, at)?)),
            ("isParent", []) => Self::IsParent,
            ("parent", [v]) => Self::Parent(parse_steer(tag, v)?),
            ("child", [v]) => Self::Child(parse_steer(tag, v)?),
            ("goal", []) => Self::Goal,
            ("move", [v]) => Self::Move(parse_steer(tag, v)?),
            ("welcome" | "start" | "isParent" | "parent" | "child" | "goal" | "move", _) => {
                return Err(NetError::protocol(format!(
                    "'{tag}' with {} payload field(s)",
                    payload.len()
                )))
            }
            _ => return Err(NetError::protocol(format!("unknown tag '{tag}'"))),
        };
        Ok(message)
    }

    /// Wire form including the delimiter.
    pub fn encode(&self) -> String {
        format!("{self}\n")
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Welcome => write!(f, "welcome"),
            Self::Start(None) => write!(f, "start"),
            Self::Start(Some(at)) => write!(f, "start,{at}"),
            Self::IsParent => write!(f, "isParent"),
            Self::Parent(steer) => write!(f, "parent,{}", steer.value()),
            Self::Child(steer) => write!(f, "child,{}", steer.value()),
            Self::Goal => write!(f, "goal"),
            Self::Move(steer) => write!(f, "move,{}", steer.value()),
        }
    }
}

fn parse_int(tag: &str, field: &str) -> Result<i64> {
    field
        .trim()
        .parse()
        .map_err(|e| NetError::protocol(format!("bad '{tag}' payload '{field}': {e}")))
}

fn parse_steer(tag: &str, field: &str) -> Result<Steer> {
    Steer::from_value(parse_int(tag, field)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strips_one_delimiter() {
        assert_eq!(Message::parse("welcome\n").unwrap(), Message::Welcome);
        assert_eq!(Message::parse("goal").unwrap(), Message::Goal);
        assert!(Message::parse("goal\n\n").is_err());
    }

    #[test]
    fn test_parse_payloads() {
        assert_eq!(
            Message::parse("start,1700000000\n").unwrap(),
            Message::Start(Some(1_700_000_000))
        );
        assert_eq!(Message::parse("start\n").unwrap(), Message::Start(None));
        assert_eq!(Message::parse("parent,1\n").unwrap(), Message::Parent(Steer::Down));
        assert_eq!(Message::parse("child,-1\n").unwrap(), Message::Child(Steer::Up));
        assert_eq!(Message::parse("move,0\n").unwrap(), Message::Move(Steer::Idle));
        assert_eq!(
            Message::parse("start,-5\n").unwrap(),
            Message::Start(Some(-5))
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in [
            "parent\n",
            "child,1,2\n",
            "move,fast\n",
            "move,2\n",
            "goal,1\n",
            "start,soon\n",
            "ping\n",
            "\n",
        ] {
            assert!(
                matches!(Message::parse(bad), Err(NetError::Protocol(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_encode() {
        assert_eq!(Message::Move(Steer::Up).encode(), "move,-1\n");
        assert_eq!(Message::Start(Some(42)).encode(), "start,42\n");
        assert_eq!(Message::IsParent.encode(), "isParent\n");
        assert_eq!(Message::Child(Steer::Idle).to_string(), "child,0");
    }

    #[test]
    fn test_steer_from_keys() {
        assert_eq!(Steer::from_keys(true, false), Steer::Up);
        assert_eq!(Steer::from_keys(false, true), Steer::Down);
        assert_eq!(Steer::from_keys(true, true), Steer::Idle);
        assert_eq!(Steer::from_keys(false, false), Steer::Idle);
    }
}
