//! Ports - 差し替え可能な依存の抽象化
//!
//! The queue only needs time and ids from the outside world.

pub mod clock;
pub mod id_generator;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
