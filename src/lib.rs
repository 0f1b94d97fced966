pub mod adapters;
pub mod browser;
pub mod core;
pub mod detect;
pub mod diagnostics;
pub mod dom;
pub mod errors;
pub mod extract;
pub mod messages;
pub mod prompt;
pub mod store;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod types;
pub mod utils;
pub mod validate;

pub use adapters::{AdapterRegistry, SiteAdapter};
pub use browser::ChatSession;
#[cfg(feature = "chrome")]
pub use browser::ChromeBrowser;
pub use self::core::{BrowserTrait, Config};
pub use diagnostics::{DiagnosticsLog, NoopLog, RingBufferLog};
pub use errors::{AutomationError, Result};
pub use extract::{ExtractionPipeline, ExtractionResult, Strategy};
pub use messages::{AgentRequest, AgentResponse, AutomationAgent};
pub use prompt::Language;
pub use store::{FileScriptStore, SaveOutcome, ScriptStore};
pub use types::*;
pub use validate::{ScriptSchema, ValidationOutcome, Validator};
