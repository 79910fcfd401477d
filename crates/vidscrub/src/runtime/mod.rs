pub mod clock;
pub mod subscription;

pub use clock::{Scheduler, TimerId, TimerKind};
pub use subscription::OnceRegistry;
