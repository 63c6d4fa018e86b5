//! Use cases - host operations and event handling.
//!
//! Each module covers one concern of the bridge. Use cases work over the
//! transport and the port traits in `infrastructure::ports`.

pub mod callbacks;
pub mod compatibility;
pub mod dispatch;
pub mod remote_app;

pub use callbacks::{Callback, CallbackHandle, CallbackRegistry};
pub use compatibility::{Compatibility, CompatibilityPolicy, HostVersion, MIN_SUPPORTED_VERSION};
pub use dispatch::{DispatchAction, InboundDispatcher};
pub use remote_app::{PainterApp, RemoteAppError};
