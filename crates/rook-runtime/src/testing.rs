//! Test doubles for the runtime's seams.
//!
//! Exposed publicly so integration tests and downstream crates can drive the
//! runtime without a network or a real game.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use rook_core::protocol::ServerMessage;
use rook_core::{
    AppliedMove, ConnectionId, GameState, MoveInput, MoveOracle, MoveVerdict, OracleError, Role,
    SessionId, TerminalResult,
};
use rook_store::{MemorySessionStore, RecordUpdate, SessionRecord, SessionStore, StoreError};

use crate::router::Transport;

// ─────────────────────────────────────────────────────────────────────────────
// Transport
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Mailboxes {
    inboxes: HashMap<ConnectionId, Vec<ServerMessage>>,
    rooms: HashMap<SessionId, BTreeSet<ConnectionId>>,
    closed: HashSet<ConnectionId>,
}

impl Mailboxes {
    fn deliver(&mut self, connection_id: &ConnectionId, message: &ServerMessage) -> bool {
        if self.closed.contains(connection_id) {
            return false;
        }
        self.inboxes
            .entry(connection_id.clone())
            .or_default()
            .push(message.clone());
        true
    }
}

/// Transport that records every frame per connection.
#[derive(Default)]
pub struct RecordingTransport {
    boxes: Mutex<Mailboxes>,
}

impl RecordingTransport {
    /// Create an empty transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every frame delivered to `connection_id`, in order.
    pub fn messages_for(&self, connection_id: &ConnectionId) -> Vec<ServerMessage> {
        self.boxes
            .lock()
            .inboxes
            .get(connection_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Wire tags of the frames delivered to `connection_id`, in order.
    pub fn kinds_for(&self, connection_id: &ConnectionId) -> Vec<&'static str> {
        self.messages_for(connection_id)
            .iter()
            .map(ServerMessage::kind)
            .collect()
    }

    /// Drain and return the frames delivered to `connection_id`.
    pub fn take(&self, connection_id: &ConnectionId) -> Vec<ServerMessage> {
        self.boxes
            .lock()
            .inboxes
            .remove(connection_id)
            .unwrap_or_default()
    }

    /// Members of a session's room.
    pub fn room(&self, session_id: &SessionId) -> Vec<ConnectionId> {
        self.boxes
            .lock()
            .rooms
            .get(session_id)
            .map(|r| r.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Simulate a dead socket: later sends to this connection are dropped.
    pub fn close(&self, connection_id: &ConnectionId) {
        let _ = self.boxes.lock().closed.insert(connection_id.clone());
    }
}

impl Transport for RecordingTransport {
    fn send(&self, connection_id: &ConnectionId, message: &ServerMessage) -> bool {
        self.boxes.lock().deliver(connection_id, message)
    }

    fn join_room(&self, connection_id: &ConnectionId, session_id: &SessionId) {
        let _ = self
            .boxes
            .lock()
            .rooms
            .entry(session_id.clone())
            .or_default()
            .insert(connection_id.clone());
    }

    fn leave_room(&self, connection_id: &ConnectionId, session_id: &SessionId) {
        let mut boxes = self.boxes.lock();
        if let Some(room) = boxes.rooms.get_mut(session_id) {
            let _ = room.remove(connection_id);
            if room.is_empty() {
                let _ = boxes.rooms.remove(session_id);
            }
        }
    }

    fn broadcast(&self, session_id: &SessionId, message: &ServerMessage) -> usize {
        let mut boxes = self.boxes.lock();
        let members: Vec<ConnectionId> = boxes
            .rooms
            .get(session_id)
            .map(|r| r.iter().cloned().collect())
            .unwrap_or_default();
        members
            .iter()
            .filter(|conn| boxes.deliver(conn, message))
            .count()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory store whose writes can be made to fail on demand.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemorySessionStore,
    fail_creates: AtomicBool,
    fail_reads: AtomicBool,
    fail_updates: AtomicBool,
    update_attempts: AtomicUsize,
}

impl FlakyStore {
    /// Create a store that succeeds until told otherwise.
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle failures for `create`.
    pub fn fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    /// Toggle failures for `get`.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Toggle failures for `update`.
    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    /// Number of `update` calls, failed or not.
    pub fn update_attempts(&self) -> usize {
        self.update_attempts.load(Ordering::SeqCst)
    }
}

impl SessionStore for FlakyStore {
    fn create(&self, record: &SessionRecord) -> rook_store::Result<()> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(StoreError::Internal("injected create failure".into()));
        }
        self.inner.create(record)
    }

    fn get(&self, id: &SessionId) -> rook_store::Result<Option<SessionRecord>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Internal("injected read failure".into()));
        }
        self.inner.get(id)
    }

    fn update(&self, id: &SessionId, update: &RecordUpdate) -> rook_store::Result<()> {
        let _ = self.update_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Internal("injected update failure".into()));
        }
        self.inner.update(id, update)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Oracles
// ─────────────────────────────────────────────────────────────────────────────

/// Count-to-target game.
///
/// State is `"<total>/<role to move>"`. A move adds 1, 2, or 3 to the
/// total; the player who lands exactly on the target wins, overshooting is
/// illegal.
#[derive(Clone, Copy, Debug)]
pub struct TallyOracle {
    target: u32,
}

impl Default for TallyOracle {
    fn default() -> Self {
        Self { target: 10 }
    }
}

impl TallyOracle {
    /// Play to a custom target.
    pub fn with_target(target: u32) -> Self {
        Self { target }
    }

    fn decode(state: &GameState) -> Result<(u32, Role), OracleError> {
        let corrupt = || OracleError::CorruptState(state.to_string());
        let (total, role) = state.as_str().split_once('/').ok_or_else(corrupt)?;
        let total = total.parse().map_err(|_| corrupt())?;
        let role = match role {
            "A" => Role::A,
            "B" => Role::B,
            _ => return Err(corrupt()),
        };
        Ok((total, role))
    }

    fn encode(total: u32, to_move: Role) -> GameState {
        GameState::new(format!("{total}/{to_move}"))
    }
}

impl MoveOracle for TallyOracle {
    fn new_game(&self) -> GameState {
        Self::encode(0, Role::A)
    }

    fn apply_move(&self, state: &GameState, input: &MoveInput) -> Result<MoveVerdict, OracleError> {
        let (total, mover) = Self::decode(state)?;
        let step = match input.as_str().parse::<u32>() {
            Ok(n @ 1..=3) => n,
            _ => {
                return Ok(MoveVerdict::Illegal {
                    reason: format!("step must be 1, 2 or 3, got {input}"),
                });
            }
        };
        if total + step > self.target {
            return Ok(MoveVerdict::Illegal {
                reason: format!("{} overshoots {}", total + step, self.target),
            });
        }
        Ok(MoveVerdict::Legal(AppliedMove {
            state: Self::encode(total + step, mover.other()),
            notation: format!("+{step}"),
        }))
    }

    fn turn_of(&self, state: &GameState) -> Result<Role, OracleError> {
        Self::decode(state).map(|(_, role)| role)
    }

    fn terminal_result(&self, state: &GameState) -> Result<TerminalResult, OracleError> {
        let (total, to_move) = Self::decode(state)?;
        Ok(if total == self.target {
            TerminalResult::Winner(to_move.other())
        } else {
            TerminalResult::Ongoing
        })
    }
}

/// Wraps an oracle and stalls inside `apply_move`, tracking overlap.
pub struct SlowOracle<O> {
    inner: O,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

impl<O: MoveOracle> SlowOracle<O> {
    /// Delay every `apply_move` by `delay`.
    pub fn new(inner: O, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Highest number of concurrent `apply_move` calls observed.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Total `apply_move` calls.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<O: MoveOracle> MoveOracle for SlowOracle<O> {
    fn new_game(&self) -> GameState {
        self.inner.new_game()
    }

    fn apply_move(&self, state: &GameState, input: &MoveInput) -> Result<MoveVerdict, OracleError> {
        let _ = self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        let verdict = self.inner.apply_move(state, input);
        let _ = self.in_flight.fetch_sub(1, Ordering::SeqCst);
        verdict
    }

    fn turn_of(&self, state: &GameState) -> Result<Role, OracleError> {
        self.inner.turn_of(state)
    }

    fn terminal_result(&self, state: &GameState) -> Result<TerminalResult, OracleError> {
        self.inner.terminal_result(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn mv(s: &str) -> MoveInput {
        MoveInput::from_notation(s).unwrap()
    }

    #[test]
    fn tally_counts_to_target() {
        let oracle = TallyOracle::default();
        let mut state = oracle.new_game();
        for step in ["3", "3", "3"] {
            let MoveVerdict::Legal(applied) = oracle.apply_move(&state, &mv(step)).unwrap() else {
                panic!("expected legal");
            };
            state = applied.state;
        }
        assert_eq!(state.as_str(), "9/B");
        assert_eq!(oracle.terminal_result(&state).unwrap(), TerminalResult::Ongoing);

        let MoveVerdict::Legal(applied) = oracle.apply_move(&state, &mv("1")).unwrap() else {
            panic!("expected legal");
        };
        assert_eq!(
            oracle.terminal_result(&applied.state).unwrap(),
            TerminalResult::Winner(Role::B)
        );
    }

    #[test]
    fn tally_rejects_overshoot_and_bad_steps() {
        let oracle = TallyOracle::with_target(2);
        let state = oracle.new_game();
        assert_matches!(oracle.apply_move(&state, &mv("3")), Ok(MoveVerdict::Illegal { .. }));
        assert_matches!(oracle.apply_move(&state, &mv("e4")), Ok(MoveVerdict::Illegal { .. }));
    }

    #[test]
    fn tally_flags_corrupt_state() {
        let oracle = TallyOracle::default();
        assert_matches!(
            oracle.turn_of(&GameState::new("garbage")),
            Err(OracleError::CorruptState(_))
        );
    }

    #[test]
    fn recording_transport_drops_after_close() {
        let transport = RecordingTransport::new();
        let conn = ConnectionId::from("c1");
        assert!(transport.send(&conn, &ServerMessage::Pong));
        transport.close(&conn);
        assert!(!transport.send(&conn, &ServerMessage::Pong));
        assert_eq!(transport.messages_for(&conn).len(), 1);
    }

    #[test]
    fn flaky_store_fails_on_demand() {
        let store = FlakyStore::new();
        let record = SessionRecord::new(SessionId::from("s1"), GameState::new("0/A"));
        store.create(&record).unwrap();
        store.fail_updates(true);
        assert!(store.update(&record.id, &RecordUpdate::default()).is_err());
        store.fail_updates(false);
        store.update(&record.id, &RecordUpdate::default()).unwrap();
        assert_eq!(store.update_attempts(), 2);
    }
}
