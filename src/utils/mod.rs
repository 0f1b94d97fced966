pub mod javascript;

pub use javascript::{JavaScriptRunner, ScriptTag};
