//! Token rotation for a single team queue.

use indexmap::IndexMap;

/// Compute the queue ordering after the current holder passes the token.
///
/// The head moves to the tail, then every skip-flagged person reaching the head
/// is moved to the tail as well, consuming their flag. Skip passes are bounded
/// by the queue length so a fully flagged queue still terminates, leaving
/// plain round-robin order with every visited flag cleared.
///
/// Queues of one person or fewer are returned unchanged.
pub fn pass_token(queue: &[String], skip_flags: &mut IndexMap<String, bool>) -> Vec<String> {
    let mut next = queue.to_vec();
    if next.len() <= 1 {
        return next;
    }

    next.rotate_left(1);

    for _ in 0..next.len() {
        let head = &next[0];
        if !skip_flags.get(head).copied().unwrap_or(false) {
            break;
        }
        skip_flags.insert(head.clone(), false);
        next.rotate_left(1);
    }

    next
}
