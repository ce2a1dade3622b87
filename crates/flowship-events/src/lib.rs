//! Publication events and observers.
//!
//! Publishers emit events while they work (state transitions, build log
//! lines, push progress, uploads) so that consumers can display progress,
//! log it, or ignore it. The [`PublishContext`] travels with every publisher
//! call and also carries the caller's deadline and cancellation token.

mod context;
mod event;
mod observer;

pub use context::{Interrupt, PublishContext};
pub use event::{PublicationEvent, PublicationState};
pub use observer::{ChannelObserver, NoopObserver, PublicationObserver, TracingObserver};
