use crate::buffer::EventWindowBuffer;

/// Decides whether the window holds enough lookahead to stop pulling events.
pub trait FillPolicy {
    fn need_more(&self, buffer: &EventWindowBuffer, min_keep: usize, exhausted: bool) -> bool;
}

/// Default GL1 fill policy.
///
/// Never reports ready while only one distinct sequence is buffered, so the
/// oldest event always has at least one successor before it is handed out.
/// A minimum key count is enforced only for `min_keep > 2`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LookaheadPolicy;

impl FillPolicy for LookaheadPolicy {
    fn need_more(&self, buffer: &EventWindowBuffer, min_keep: usize, exhausted: bool) -> bool {
        if exhausted {
            return false;
        }
        let (Some(first), Some(last)) = (buffer.first_key(), buffer.last_key()) else {
            return true;
        };

        if min_keep > 2 && buffer.len() < min_keep {
            return true;
        }
        first >= last
    }
}
