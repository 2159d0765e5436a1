//! Client for the V2EX forum: sign-in, the daily login reward and the
//! notification feed, plus checkpointed delivery of new notifications.

pub mod config;
pub mod delta;
pub mod duration;
pub mod error;
pub mod extract;
pub mod markup;
pub mod mission;
pub mod notifications;
pub mod session;
pub mod signin;

pub use error::{Error, Result, SignInFailure};
pub use session::{Session, SessionOptions};
