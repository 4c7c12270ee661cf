//! Push-channel notices reconciled into the snippet URL cache. The listener
//! never starts playback; it only makes a URL available for the next
//! scheduling decision.

use crate::conversation::MessageId;
use crate::events::SnippetNotice;
use crate::log_debug;
use crate::player::SnippetPlayer;
use crate::snippets::SnippetCache;

/// Apply one notice to the cache. Returns true when a URL was recorded, false
/// when the notice was stale (the message already finished playing).
pub fn apply_notice(
    notice: &SnippetNotice,
    player: &SnippetPlayer,
    cache: &mut SnippetCache,
) -> bool {
    let id = MessageId::new(notice.message_id.clone());
    if player.is_played(&id) {
        log_debug(&format!("discarding stale snippet notice for {id}"));
        return false;
    }
    // Indexless notices announce the next unplayed snippet of the message.
    let index = notice.snippet.unwrap_or_else(|| player.next_unplayed(&id));
    cache.confirm(&id, index, &notice.url);
    true
}
