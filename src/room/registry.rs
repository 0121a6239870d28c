//! Live WebSocket handles, per room and slot, local to this process.

use dashmap::DashMap;
use tokio::sync::mpsc::UnboundedSender;
use ulid::Ulid;

use super::PerMark;
use crate::game::Mark;
use crate::util::id::new_conn_id;
use crate::ws::protocol::ServerMessage;

/// Push handle for one socket. The writer task on the other end serializes
/// and sends; dropping the receiver makes every later push a no-op.
#[derive(Debug, Clone)]
pub struct ConnHandle {
    pub id: Ulid,
    tx: UnboundedSender<ServerMessage>,
}

impl ConnHandle {
    pub fn new(tx: UnboundedSender<ServerMessage>) -> ConnHandle {
        ConnHandle {
            id: new_conn_id(),
            tx,
        }
    }

    fn push(&self, msg: ServerMessage) {
        let _ = self.tx.send(msg);
    }
}

/// Which sockets currently speak for which slot of which room.
///
/// Holds no game state. Room state outlives entries here; entries here never
/// outlive their socket by more than the disconnect cleanup.
#[derive(Default)]
pub struct ConnectionRegistry {
    rooms: DashMap<String, PerMark<Option<ConnHandle>>>,
}

impl ConnectionRegistry {
    pub fn new() -> ConnectionRegistry {
        ConnectionRegistry::default()
    }

    /// Bind `handle` to a slot, displacing any stale predecessor.
    pub fn register(&self, room_id: &str, mark: Mark, handle: ConnHandle) {
        let mut slots = self.rooms.entry(room_id.to_string()).or_default();
        *slots.get_mut(mark) = Some(handle);
    }

    pub fn send_to(&self, room_id: &str, mark: Mark, msg: &ServerMessage) {
        if let Some(slots) = self.rooms.get(room_id) {
            if let Some(handle) = slots.get(mark) {
                handle.push(msg.clone());
            }
        }
    }

    pub fn broadcast(&self, room_id: &str, msg: &ServerMessage) {
        if let Some(slots) = self.rooms.get(room_id) {
            for mark in [Mark::X, Mark::O] {
                if let Some(handle) = slots.get(mark) {
                    handle.push(msg.clone());
                }
            }
        }
    }

    /// Clear whichever slot `conn_id` currently owns, returning it. Slots are
    /// matched by id, not by remembered mark, for two reasons: a rematch may
    /// have swapped the handle to the other slot, and a socket displaced by a
    /// reconnect finds someone else's id here and must leave the slot alone.
    pub fn clear_connection(&self, room_id: &str, conn_id: Ulid) -> Option<Mark> {
        let cleared = match self.rooms.get_mut(room_id) {
            Some(mut slots) => {
                let mut cleared = None;
                for mark in [Mark::X, Mark::O] {
                    let slot = slots.get_mut(mark);
                    if slot.as_ref().is_some_and(|handle| handle.id == conn_id) {
                        *slot = None;
                        cleared = Some(mark);
                    }
                }
                cleared
            }
            None => None,
        };
        self.rooms
            .remove_if(room_id, |_, slots| slots.x.is_none() && slots.o.is_none());
        cleared
    }

    /// Swap the X and O handles of a room. Rematches flip marks while both
    /// sockets stay on their existing connections.
    pub fn swap_slots(&self, room_id: &str) {
        if let Some(mut slots) = self.rooms.get_mut(room_id) {
            slots.swap();
        }
    }

    /// Drop every handle of a room. Used on eviction.
    pub fn remove_room(&self, room_id: &str) {
        self.rooms.remove(room_id);
    }

    #[cfg(test)]
    fn has_room(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn handle_pair() -> (ConnHandle, UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ConnHandle::new(tx), rx)
    }

    #[test]
    fn send_to_reaches_only_the_addressed_slot() {
        let registry = ConnectionRegistry::new();
        let (x_handle, mut x_rx) = handle_pair();
        let (o_handle, mut o_rx) = handle_pair();
        registry.register("r1", Mark::X, x_handle);
        registry.register("r1", Mark::O, o_handle);

        registry.send_to("r1", Mark::X, &ServerMessage::Full);
        assert_eq!(x_rx.try_recv().unwrap(), ServerMessage::Full);
        assert!(o_rx.try_recv().is_err());
    }

    #[test]
    fn broadcast_reaches_both_slots() {
        let registry = ConnectionRegistry::new();
        let (x_handle, mut x_rx) = handle_pair();
        let (o_handle, mut o_rx) = handle_pair();
        registry.register("r1", Mark::X, x_handle);
        registry.register("r1", Mark::O, o_handle);

        registry.broadcast("r1", &ServerMessage::Full);
        assert!(x_rx.try_recv().is_ok());
        assert!(o_rx.try_recv().is_ok());
    }

    #[test]
    fn pushes_to_dropped_receivers_are_swallowed() {
        let registry = ConnectionRegistry::new();
        let (handle, rx) = handle_pair();
        registry.register("r1", Mark::X, handle);
        drop(rx);
        registry.broadcast("r1", &ServerMessage::Full);
    }

    #[test]
    fn clear_skips_slots_taken_over_by_a_newer_connection() {
        let registry = ConnectionRegistry::new();
        let (old_handle, _old_rx) = handle_pair();
        let old_id = old_handle.id;
        registry.register("r1", Mark::X, old_handle);

        let (new_handle, mut new_rx) = handle_pair();
        registry.register("r1", Mark::X, new_handle);

        assert_eq!(registry.clear_connection("r1", old_id), None);
        registry.send_to("r1", Mark::X, &ServerMessage::Full);
        assert!(new_rx.try_recv().is_ok());
    }

    #[test]
    fn clear_finds_a_handle_moved_by_a_swap() {
        let registry = ConnectionRegistry::new();
        let (x_handle, _x_rx) = handle_pair();
        let (o_handle, _o_rx) = handle_pair();
        let x_id = x_handle.id;
        registry.register("r1", Mark::X, x_handle);
        registry.register("r1", Mark::O, o_handle);

        registry.swap_slots("r1");
        assert_eq!(registry.clear_connection("r1", x_id), Some(Mark::O));
    }

    #[test]
    fn clearing_the_last_slot_drops_the_room_entry() {
        let registry = ConnectionRegistry::new();
        let (handle, _rx) = handle_pair();
        let id = handle.id;
        registry.register("r1", Mark::X, handle);

        assert_eq!(registry.clear_connection("r1", id), Some(Mark::X));
        assert!(!registry.has_room("r1"));
    }

    #[test]
    fn swap_moves_handles_between_slots() {
        let registry = ConnectionRegistry::new();
        let (x_handle, mut x_rx) = handle_pair();
        let (o_handle, mut o_rx) = handle_pair();
        registry.register("r1", Mark::X, x_handle);
        registry.register("r1", Mark::O, o_handle);

        registry.swap_slots("r1");
        registry.send_to("r1", Mark::X, &ServerMessage::Full);
        assert!(o_rx.try_recv().is_ok());
        assert!(x_rx.try_recv().is_err());
    }
}
