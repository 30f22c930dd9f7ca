//! Named signal channels between the HUB, this process and the Modeler.

pub mod endpoint;
pub mod mock;
pub mod notifier;
pub mod peer;
pub mod signal;
pub mod wait;

pub use endpoint::ChannelAddr;
pub use notifier::{ModelerNotifier, ReportSink};
pub use peer::{HubPeer, ModelerPeer};
pub use signal::{HubSignal, HubSignalChannel, SignalChannel, SignalSession};
pub use wait::{cancellable, ExitSignal, WaitPolicy};
