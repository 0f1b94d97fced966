pub mod poller;
pub mod state;

pub use poller::CompletionPoller;
pub use state::{DetectionState, DetectorSettings, Phase, Transition};
