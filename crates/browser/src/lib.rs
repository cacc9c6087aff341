//! Remote control for a browser-hosted chat application.
//!
//! Attaches to an already-running browser through its remote debugging
//! endpoint, finds the chat tab, injects and submits user text, then
//! polls the streaming reply until it stabilizes, returning the rendered
//! answer as markdown.
//!
//! - [`cdp`]: call-scoped evaluate channel over the debugging WebSocket
//! - [`tabs`]: target discovery against the `/json` directory
//! - [`script`]: the page-side script templates
//! - [`convert`]: rendered-HTML to markdown conversion
//! - [`stabilize`]: the repeated-identical-sample debounce
//! - [`driver`]: the send/observe state machine tying it together
//! - [`launch`]: debug-mode browser bootstrap

pub mod cdp;
pub mod convert;
pub mod driver;
pub mod launch;
pub mod script;
pub mod stabilize;
pub mod tabs;

pub use cdp::{Channel, TransportSettings};
pub use convert::html_to_markdown;
pub use driver::{
    ChatDriver, ChatMessages, ChatOutcome, ChatResult, ChatTransport, CdpTransport, Clock,
    DriveState, TokioClock,
};
pub use launch::{ensure_running, BrowserKind};
pub use stabilize::{ImageRef, ObservedSample, StabilizeState, Verdict};
pub use tabs::{find_chat_tab, TabDescriptor, TabRegistry};
