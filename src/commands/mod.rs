//! Built-in command kinds.

mod navigate;
mod pause;
mod save_markup;
mod save_text;

pub use navigate::Navigate;
pub use pause::Pause;
pub use save_markup::SaveMarkup;
pub use save_text::{SaveText, sanitize_tag};

use crate::command::Command;
use crate::registry::Registry;

pub const NAVIGATE: &str = "navigate";
pub const PAUSE: &str = "pause";
pub const SAVE_MARKUP: &str = "save_markup";
pub const SAVE_TEXT: &str = "save_text";

/// Register every built-in kind on `registry`.
///
/// Registration only fails on a name clash; a clash means the registry was
/// already populated, which is logged and skipped.
pub fn register_builtins(registry: &mut Registry) {
    let results = [
        registry.register(NAVIGATE, |r| {
            Ok(Box::new(Navigate::from_record(r)?) as Box<dyn Command>)
        }),
        registry.register(PAUSE, |r| {
            Ok(Box::new(Pause::from_record(r)?) as Box<dyn Command>)
        }),
        registry.register(SAVE_MARKUP, |r| {
            Ok(Box::new(SaveMarkup::from_record(r)?) as Box<dyn Command>)
        }),
        registry.register(SAVE_TEXT, |r| {
            Ok(Box::new(SaveText::from_record(r)?) as Box<dyn Command>)
        }),
    ];

    for result in results {
        if let Err(e) = result {
            tracing::warn!("skipping built-in: {e}");
        }
    }
}
