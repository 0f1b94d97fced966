pub mod injector;
pub mod locator;
pub mod region;

pub use injector::InputInjector;
pub use locator::{ElementLocator, LocatedElement, SurfaceKind};
pub use region::{CandidateRegion, Observation, PayloadHeuristic, RegionObserver, RegionSnapshot};
