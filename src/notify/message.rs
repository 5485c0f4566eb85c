//! Telegram HTML formatters for notifications.
//!
//! Region names come from the static catalog and never contain markup, so
//! they are inserted as is.

use chrono::{DateTime, Utc};

use crate::catalog;
use crate::notify::Transition;

/// Formats the message announcing a region transition.
///
/// Priority regions (see [`catalog::Region::priority`]) get an emphasized
/// message with shelter instructions.
///
/// # Arguments
///
/// * `transition` - The detected change
/// * `at` - Time of the snapshot that revealed it
///
/// # Examples
///
/// ```ignore
/// let message = format_transition(&transition, fetched_at);
/// assert!(message.contains("Air raid alert"));
/// ```
pub fn format_transition(transition: &Transition, at: DateTime<Utc>) -> String {
    let time = at.format("%H:%M:%S UTC");
    let priority = catalog::by_id(transition.region_id).is_some_and(|region| region.priority);

    match (transition.current, priority) {
        (true, true) => format!(
            "🚨🚨 <b>AIR RAID ALERT</b> 🚨🚨\n\n📍 <b>{}</b>\n\n⚠️ Go to the nearest shelter now!\n⚠️ Follow civil defence instructions!\n\n<i>{}</i>",
            transition.name, time
        ),
        (false, true) => format!(
            "✅ <b>ALL CLEAR</b>\n\n📍 <b>{}</b>\n\nℹ️ You may leave the shelter\nℹ️ Keep following official updates\n\n<i>{}</i>",
            transition.name, time
        ),
        (true, false) => format!(
            "⚠️ <b>Air raid alert</b>\n\n📍 {}\n<i>{}</i>",
            transition.name, time
        ),
        (false, false) => format!(
            "✅ <b>All clear</b>\n\n📍 {}\n<i>{}</i>",
            transition.name, time
        ),
    }
}

/// Formats an operational notice, e.g. a source outage.
pub fn format_system_alert(text: &str) -> String {
    format!("‼️ 🔧 <b>System notice</b>\n\n{}", text)
}
