pub mod channels;
pub mod memory;
pub mod subscriber;
pub mod transport;
pub mod typing_notifier;

pub use memory::LoopbackRealtime;
pub use subscriber::{RealtimeSink, RealtimeSubscriber};
pub use transport::{RealtimeError, RealtimeTransport};
pub use typing_notifier::TypingNotifier;
