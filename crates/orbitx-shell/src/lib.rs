//! orbitx-shell: terminal output decoding and shell-integration tracking.
//!
//! Raw pane bytes go through a per-pane [`Utf8StreamDecoder`], the decoded
//! text is scanned by [`ShellProtocolParser`] for OSC 133/633 command markers
//! and OSC 7 cwd announcements, and the resulting [`ProtocolEvent`]s drive a
//! [`CommandLifecycleTracker`] and a [`CwdTracker`] per pane.
//!
//! All state lives in a [`ShellIntegrationRegistry`] keyed by pane id. This
//! crate performs no I/O; callers feed bytes in and dispatch the returned
//! [`ShellNotification`]s.

pub mod config;
pub mod cwd;
pub mod decoder;
pub mod error;
pub mod lifecycle;
pub mod protocol;
pub mod registry;

pub use config::ShellIntegrationConfig;
pub use cwd::{CwdTracker, decode_cwd_value};
pub use decoder::Utf8StreamDecoder;
pub use error::CwdDecodeError;
pub use lifecycle::{CommandEvent, CommandLifecycleTracker, CommandRecord, CommandState};
pub use protocol::{ProtocolEvent, ShellProtocolParser};
pub use registry::{PaneId, PaneOutput, ShellIntegrationRegistry, ShellNotification};
