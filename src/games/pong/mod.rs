pub mod client;
pub mod game;
pub mod protocol;
pub mod relay;
pub mod renderer;
pub mod session;

pub use client::run_client;
pub use game::{Court, Side};
pub use protocol::{Message, Steer};
pub use relay::Relay;
pub use session::{Clock, Phase, RenderState, Role, Session, SystemClock};
