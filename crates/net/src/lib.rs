//! External I/O collaborators: the TCP frame streamer and the two local
//! datagram sockets that connect the pipeline to the motor controller.

mod error;
mod motor;
mod route;
mod streamer;

pub use error::{Error, Result};
pub use motor::MotorSink;
pub use route::RouteSource;
pub use streamer::FrameStreamer;
