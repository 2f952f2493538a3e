//! Trigger → sound resolution.
//!
//! All three functions are pure: they scan the supplied document snapshot in
//! display order and return the sound of the first binding that matches *and*
//! has a non-empty sound.  A binding that matches but is inert does not stop
//! the scan, so a later binding with the same key or id can still answer.
//!
//! `None` is the normal "nothing bound" answer and callers are expected to
//! ignore it quietly.

use crate::domain::document::ConfigDocument;
use crate::domain::trigger::Trigger;

/// Returns the sound bound to the logical key `key_name`.
pub fn resolve_by_key<'a>(doc: &'a ConfigDocument, key_name: &str) -> Option<&'a str> {
    doc.buttons
        .iter()
        .filter(|b| b.key_name() == Some(key_name))
        .find_map(|b| b.sound_ref())
}

/// Returns the sound bound to button `button_id`.
///
/// Duplicate ids resolve to the first binding in sequence order.
pub fn resolve_by_id(doc: &ConfigDocument, button_id: i64) -> Option<&str> {
    doc.buttons
        .iter()
        .filter(|b| b.id == button_id)
        .find_map(|b| b.sound_ref())
}

/// Resolves either kind of [`Trigger`].
pub fn resolve<'a>(doc: &'a ConfigDocument, trigger: &Trigger) -> Option<&'a str> {
    match trigger {
        Trigger::Key(key) => resolve_by_key(doc, key.as_str()),
        Trigger::ButtonId(id) => resolve_by_id(doc, *id),
    }
}
