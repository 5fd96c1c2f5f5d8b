pub mod pong;
