//! Channel abstraction for the two remote sides of the bridge: the operator's
//! mailbox and the remote-messaging service.

pub mod channel;
pub mod email;
pub mod email_types;
pub mod imessage;

pub use channel::*;
pub use email::EmailTransport;
pub use imessage::AppleScriptSink;
