//! ID utilities.

use ulid::Ulid;

/// Generate a unique id for a live websocket connection.
///
/// The registry compares these ids on disconnect so that a stale close can
/// never evict a handle registered by a newer connection.
pub fn new_conn_id() -> Ulid {
    Ulid::new()
}
