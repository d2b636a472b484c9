//! Façade the transport layer talks to.
//!
//! `GameHub` owns the registry, the binding map, the coordinator and the
//! router, and turns each decoded client message into calls on them. Replies
//! and membership notifications are emitted while the affected session's
//! token is held so they interleave correctly with state updates.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};

use rook_core::protocol::{ClientMessage, MembershipChange, MovePayload, ServerMessage};
use rook_core::{ConnectionId, GameError, MoveInput, MoveOracle, Role, SessionId, SessionStatus};
use rook_store::SessionStore;

use crate::binding::{ConnectionBinding, Unbound};
use crate::coordinator::MoveCoordinator;
use crate::reaper::IdleReaper;
use crate::reconciler::StateReconciler;
use crate::registry::SessionRegistry;
use crate::router::{BroadcastRouter, MoveOutcome, Transport};

/// Entry point for every client request.
pub struct GameHub {
    registry: Arc<SessionRegistry>,
    binding: Arc<ConnectionBinding>,
    coordinator: Arc<MoveCoordinator>,
    router: BroadcastRouter,
}

impl GameHub {
    /// Assemble the runtime over a store, an oracle and a transport.
    pub fn new(
        store: Arc<dyn SessionStore>,
        oracle: Arc<dyn MoveOracle>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let reconciler = Arc::new(StateReconciler::new(store));
        let registry = Arc::new(SessionRegistry::new(reconciler, oracle));
        let binding = Arc::new(ConnectionBinding::new());
        let router = BroadcastRouter::new(transport);
        let coordinator = Arc::new(MoveCoordinator::new(
            registry.clone(),
            binding.clone(),
            router.clone(),
        ));
        Self {
            registry,
            binding,
            coordinator,
            router,
        }
    }

    /// Dispatch one decoded client message. Failures are reported to the
    /// sender only.
    pub async fn handle(&self, connection_id: &ConnectionId, message: ClientMessage) {
        let result = match message {
            ClientMessage::CreateSession => self.create_session(connection_id).await.map(drop),
            ClientMessage::JoinSession { session_id } => {
                self.join_session(connection_id, &session_id).await.map(drop)
            }
            ClientMessage::Move { mv, session_id } => self
                .submit_move(connection_id, mv, session_id)
                .await
                .map(drop),
            ClientMessage::LeaveSession => self.leave_session(connection_id).await.map(drop),
            ClientMessage::Ping => {
                let _ = self.router.reply(connection_id, &ServerMessage::Pong);
                Ok(())
            }
        };
        if let Err(e) = result {
            self.reject(connection_id, &e);
        }
    }

    /// Report a failed request to its sender.
    pub fn reject(&self, connection_id: &ConnectionId, err: &GameError) {
        if err.is_client_error() {
            debug!(connection_id = %connection_id, code = err.code(), error = %err, "request rejected");
        } else {
            error!(connection_id = %connection_id, error = %err, "request failed");
        }
        let _ = self.router.error(connection_id, err);
    }

    /// Create a session and seat the caller as `A`.
    #[instrument(skip(self))]
    pub async fn create_session(&self, connection_id: &ConnectionId) -> Result<SessionId, GameError> {
        let session = self.registry.create_session()?;
        let _ = self.leave_current(connection_id).await;

        let session_id = session.id().clone();
        let state = session.acquire().await;

        let bound = self.binding.bind(connection_id, &session_id)?;
        self.router.join_room(connection_id, &session_id);
        session.touch();
        let _ = self.router.reply(
            connection_id,
            &ServerMessage::SessionCreated {
                session_id: session_id.clone(),
                role: bound.role,
            },
        );
        drop(state);

        info!(session_id = %session_id, "session opened by creator");
        Ok(session_id)
    }

    /// Seat the caller in an existing session.
    ///
    /// The session is cold-loaded from the store if it is not cached. When the
    /// second seat fills, the session moves to `InProgress`. A connection
    /// already seated in this session keeps its role.
    #[instrument(skip(self))]
    pub async fn join_session(
        &self,
        connection_id: &ConnectionId,
        session_id: &SessionId,
    ) -> Result<Role, GameError> {
        let bound = loop {
            let session = self.registry.lookup_session(session_id)?;
            let mut state = session.acquire().await;
            if state.retired {
                continue;
            }

            let turn = self.registry.oracle().turn_of(&state.game_state)?;
            let bound = self.binding.bind(connection_id, session_id)?;
            self.router.join_room(connection_id, session_id);
            session.touch();

            if bound.newly_bound
                && bound.participants == Role::ALL.len()
                && state.status == SessionStatus::WaitingForOpponent
            {
                state.status = SessionStatus::InProgress;
                if let Err(e) = self
                    .registry
                    .reconciler()
                    .persist_status(session_id, SessionStatus::InProgress)
                {
                    state.unpersisted = true;
                    warn!(session_id = %session_id, error = %e, "status change not yet durable");
                }
            }

            let _ = self.router.reply(
                connection_id,
                &ServerMessage::SessionJoined {
                    session_id: session_id.clone(),
                    role: bound.role,
                    state: state.game_state.clone(),
                    turn,
                    status: state.status,
                },
            );
            if bound.newly_bound {
                self.router.membership_changed(
                    session_id,
                    connection_id,
                    bound.role,
                    MembershipChange::Joined,
                    bound.participants,
                );
            }
            break bound;
        };

        if let Some(released) = &bound.released {
            self.announce_departure(connection_id, released).await;
        }
        info!(role = %bound.role, participants = bound.participants, "joined session");
        Ok(bound.role)
    }

    /// Normalize a move payload and run it through the coordinator.
    ///
    /// The move runs on its own task: once accepted, it completes even if
    /// the submitting connection goes away.
    pub async fn submit_move(
        &self,
        connection_id: &ConnectionId,
        payload: MovePayload,
        expected_session: Option<SessionId>,
    ) -> Result<MoveOutcome, GameError> {
        let input = MoveInput::try_from(payload)?;
        if let Some(expected) = expected_session {
            match self.binding.resolve(connection_id) {
                Some((current, _)) if current == expected => {}
                _ => return Err(GameError::NotBound),
            }
        }

        let coordinator = self.coordinator.clone();
        let connection_id = connection_id.clone();
        tokio::spawn(async move { coordinator.submit_move(&connection_id, &input).await })
            .await
            .map_err(|e| GameError::Internal(format!("move task failed: {e}")))?
    }

    /// Explicit leave. Replies `sessionLeft`.
    pub async fn leave_session(&self, connection_id: &ConnectionId) -> Result<SessionId, GameError> {
        let unbound = self
            .leave_current(connection_id)
            .await
            .ok_or(GameError::NotBound)?;
        let _ = self.router.reply(
            connection_id,
            &ServerMessage::SessionLeft {
                session_id: unbound.session_id.clone(),
            },
        );
        Ok(unbound.session_id)
    }

    /// Connection closed. Unbinds and notifies the room; game state is untouched.
    pub async fn disconnect(&self, connection_id: &ConnectionId) {
        if let Some(unbound) = self.leave_current(connection_id).await {
            debug!(
                connection_id = %connection_id,
                session_id = %unbound.session_id,
                "disconnected participant unbound"
            );
        }
    }

    async fn leave_current(&self, connection_id: &ConnectionId) -> Option<Unbound> {
        let (session_id, _) = self.binding.resolve(connection_id)?;
        let session = self.registry.get_cached(&session_id);
        let guard = match &session {
            Some(s) => Some(s.acquire().await),
            None => None,
        };

        let unbound = self.binding.unbind(connection_id)?;
        self.notify_left(connection_id, &unbound);
        if let Some(s) = &session {
            s.touch();
        }
        drop(guard);
        Some(unbound)
    }

    async fn announce_departure(&self, connection_id: &ConnectionId, unbound: &Unbound) {
        let session = self.registry.get_cached(&unbound.session_id);
        let _guard = match &session {
            Some(s) => Some(s.acquire().await),
            None => None,
        };
        self.notify_left(connection_id, unbound);
    }

    fn notify_left(&self, connection_id: &ConnectionId, unbound: &Unbound) {
        self.router.leave_room(connection_id, &unbound.session_id);
        self.router.membership_changed(
            &unbound.session_id,
            connection_id,
            unbound.role,
            MembershipChange::Left,
            unbound.remaining,
        );
    }

    /// Background reaper over this hub's sessions.
    pub fn idle_reaper(&self, idle_timeout: Duration, interval: Duration) -> IdleReaper {
        IdleReaper::new(
            self.registry.clone(),
            self.binding.clone(),
            self.coordinator.clone(),
            idle_timeout,
            interval,
        )
    }

    /// Number of sessions cached in memory.
    pub fn active_sessions(&self) -> usize {
        self.registry.active_count()
    }

    /// Session registry.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Connection bindings.
    pub fn binding(&self) -> &Arc<ConnectionBinding> {
        &self.binding
    }

    /// Move coordinator.
    pub fn coordinator(&self) -> &Arc<MoveCoordinator> {
        &self.coordinator
    }
}
