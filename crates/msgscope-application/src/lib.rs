//! Application layer for msgscope.
//!
//! Turns session logs into ordered streams of domain messages and tracks
//! session lifecycles. Storage, architecture and payload encoding are
//! supplied through the traits in `msgscope-core`.

pub mod cache;
pub mod injection_service;
pub mod msg_service;
pub mod session_messages;
pub mod session_service;
pub mod status_tracker;
pub mod stream;
pub mod transformer;

pub use cache::{MessageCacheStats, MessageCaches, PayloadCache};
pub use injection_service::InjectionService;
pub use msg_service::MessageStreamService;
pub use session_messages::SessionMessages;
pub use session_service::SessionService;
pub use status_tracker::{SessionStatusTracker, SessionWatch, StatusSubscription};
pub use stream::{MsgResult, MsgStream};
pub use transformer::{RecordError, RecordTransformer, Transformed};
