use futures::future::join_all;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{oneshot, watch};

use super::refresh::{self, RenewedCredentials};
use crate::error::{ApiError, RefreshError};
use crate::store::TokenService;
use crate::transport::{ApiRequest, ApiResponse, Transport};

/// Whether the client currently holds a usable session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Authenticated,
    Unauthenticated,
}

type ReplayOutcome = Result<ApiResponse, ApiError>;

/// A request that failed with 401 while a renewal was already in flight
struct PendingReplay {
    request: ApiRequest,

    /// Delivered instead of a replay if the renewal fails
    failure: ApiError,

    reply: oneshot::Sender<ReplayOutcome>,
}

#[derive(Default)]
struct RefreshState {
    /// True iff a renewal exchange is outstanding
    refreshing: bool,

    /// Empty whenever `refreshing` is false
    pending: VecDeque<PendingReplay>,

    /// Advanced by every reset; a renewal started under an older epoch
    /// must not write credentials
    epoch: u64,
}

enum Role {
    Leader {
        epoch: u64,
        request: ApiRequest,
        failure: ApiError,
    },
    Follower(oneshot::Receiver<ReplayOutcome>),
}

/// Armed while the leader owns the renewal. If the leading request is
/// dropped before the renewal resolves, the queue is failed and the
/// coordinator goes back to idle.
struct LeaderGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    epoch: u64,
    armed: bool,
}

impl LeaderGuard<'_> {
    /// Take the queue, go idle, and disarm
    fn drain(&mut self) -> VecDeque<PendingReplay> {
        self.armed = false;
        let mut state = self.coordinator.state();
        state.refreshing = false;
        std::mem::take(&mut state.pending)
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let pending = {
            let mut state = self.coordinator.state();
            // A reset already failed the queue of this epoch
            if state.epoch != self.epoch {
                return;
            }
            state.refreshing = false;
            std::mem::take(&mut state.pending)
        };

        tracing::warn!(
            pending = pending.len(),
            "Refresh abandoned by its caller, failing queued requests"
        );
        for replay in pending {
            let _ = replay.reply.send(Err(replay.failure));
        }
    }
}

/// Held while credentials are written outside the coordinator
pub struct SessionLease<'a> {
    _guard: tokio::sync::MutexGuard<'a, ()>,
}

/// Single-flight token refresh.
///
/// The first request to observe a 401 while idle becomes the leader and
/// performs the one renewal exchange. Requests failing with 401 before it
/// resolves are queued and, on success, replayed once with the renewed
/// credential in arrival order. On failure both credentials are cleared
/// and every queued request gets its original 401 back.
pub struct RefreshCoordinator {
    transport: Arc<dyn Transport>,
    tokens: TokenService,
    state: Mutex<RefreshState>,

    /// Serializes credential writes between renewal and login/logout
    write_lease: tokio::sync::Mutex<()>,

    auth_state: watch::Sender<AuthState>,
}

impl RefreshCoordinator {
    pub fn new(transport: Arc<dyn Transport>, tokens: TokenService) -> Self {
        let (auth_state, _) = watch::channel(AuthState::Unauthenticated);
        Self {
            transport,
            tokens,
            state: Mutex::new(RefreshState::default()),
            write_lease: tokio::sync::Mutex::new(()),
            auth_state,
        }
    }

    fn state(&self) -> MutexGuard<'_, RefreshState> {
        // No code path panics while holding the lock
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_refreshing(&self) -> bool {
        self.state().refreshing
    }

    pub fn pending_len(&self) -> usize {
        self.state().pending.len()
    }

    /// Paths of queued replays, in replay order
    pub fn pending_paths(&self) -> Vec<String> {
        self.state()
            .pending
            .iter()
            .map(|p| p.request.path.clone())
            .collect()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.auth_state.subscribe()
    }

    pub fn auth_state(&self) -> AuthState {
        *self.auth_state.borrow()
    }

    pub(crate) fn publish(&self, state: AuthState) {
        self.auth_state.send_if_modified(|current| {
            let changed = *current != state;
            *current = state;
            changed
        });
    }

    /// Recover a request that failed with 401 and has not been retried.
    ///
    /// Resolves to the replayed response, or to `failure` if the session
    /// could not be renewed.
    pub async fn recover(&self, mut request: ApiRequest, failure: ApiError) -> ReplayOutcome {
        request.mark_retried();

        // Check-and-set with no suspension in between
        let role = {
            let mut state = self.state();
            if state.refreshing {
                let (reply, outcome) = oneshot::channel();
                tracing::debug!(
                    request_id = %request.id(),
                    path = %request.path,
                    pending = state.pending.len() + 1,
                    "Refresh in flight, queueing request for replay"
                );
                state.pending.push_back(PendingReplay {
                    request,
                    failure,
                    reply,
                });
                Role::Follower(outcome)
            } else {
                state.refreshing = true;
                Role::Leader {
                    epoch: state.epoch,
                    request,
                    failure,
                }
            }
        };

        match role {
            Role::Follower(outcome) => outcome.await.unwrap_or_else(|_| {
                Err(ApiError::Internal(anyhow::anyhow!(
                    "Refresh was abandoned before replaying request"
                )))
            }),
            Role::Leader {
                epoch,
                request,
                failure,
            } => {
                let mut leader = LeaderGuard {
                    coordinator: self,
                    epoch,
                    armed: true,
                };

                tracing::warn!(
                    request_id = %request.id(),
                    path = %request.path,
                    "Access token rejected, starting refresh"
                );
                let outcome = match self.renew().await {
                    Ok(renewed) => self.complete(&mut leader, request, failure, renewed).await,
                    Err(reason) => self.abort(&mut leader, failure, reason).await,
                };
                outcome
            }
        }
    }

    /// Fail every queued replay and return to idle under a new epoch.
    ///
    /// The returned lease keeps an in-flight renewal from writing
    /// credentials until the caller has finished its own writes.
    pub async fn reset(&self) -> SessionLease<'_> {
        let guard = self.write_lease.lock().await;

        let pending = {
            let mut state = self.state();
            state.epoch += 1;
            state.refreshing = false;
            std::mem::take(&mut state.pending)
        };

        if !pending.is_empty() {
            tracing::debug!(pending = pending.len(), "Session reset, failing queued requests");
        }
        for replay in pending {
            let _ = replay.reply.send(Err(replay.failure));
        }

        SessionLease { _guard: guard }
    }

    async fn renew(&self) -> Result<RenewedCredentials, RefreshError> {
        let refresh_token = self
            .tokens
            .refresh_token()
            .await?
            .ok_or(RefreshError::MissingCredential)?;
        refresh::exchange(self.transport.as_ref(), &refresh_token).await
    }

    fn current_epoch(&self) -> u64 {
        self.state().epoch
    }

    async fn complete(
        &self,
        leader: &mut LeaderGuard<'_>,
        request: ApiRequest,
        failure: ApiError,
        renewed: RenewedCredentials,
    ) -> ReplayOutcome {
        let pending = {
            let _lease = self.write_lease.lock().await;
            if self.current_epoch() != leader.epoch {
                tracing::warn!("Session was reset during refresh, discarding renewed token");
                return Err(failure);
            }

            if let Err(e) = self.tokens.save_access_token(&renewed.access_token).await {
                tracing::error!(error = %e, "Failed to persist renewed access token");
            }
            if let Some(ref rotated) = renewed.refresh_token {
                if let Err(e) = self.tokens.save_refresh_token(rotated).await {
                    tracing::error!(error = %e, "Failed to persist rotated refresh token");
                }
            }

            leader.drain()
        };

        tracing::info!(
            replays = pending.len() + 1,
            "Refresh succeeded, replaying requests"
        );

        let token = renewed.access_token.as_str();
        let queued: Vec<_> = pending
            .into_iter()
            .map(|replay| self.deliver(replay, token))
            .collect();
        let (outcome, _) = tokio::join!(self.replay(request, token), join_all(queued));
        outcome
    }

    async fn abort(
        &self,
        leader: &mut LeaderGuard<'_>,
        failure: ApiError,
        reason: RefreshError,
    ) -> ReplayOutcome {
        let pending = {
            let _lease = self.write_lease.lock().await;
            if self.current_epoch() != leader.epoch {
                tracing::debug!(error = %reason, "Refresh failed after session reset");
                return Err(failure);
            }

            match reason {
                RefreshError::MissingCredential => {
                    tracing::warn!("No refresh token stored, ending session")
                }
                ref other => tracing::error!(error = %other, "Token refresh failed, ending session"),
            }

            if let Err(e) = self.tokens.clear().await {
                tracing::error!(error = %e, "Failed to clear credentials");
            }
            let pending = leader.drain();
            self.publish(AuthState::Unauthenticated);
            pending
        };

        for replay in pending {
            let _ = replay.reply.send(Err(replay.failure));
        }

        Err(failure)
    }

    async fn deliver(&self, replay: PendingReplay, token: &str) {
        let outcome = self.replay(replay.request, token).await;
        if replay.reply.send(outcome).is_err() {
            tracing::debug!("Caller went away before its replay completed");
        }
    }

    /// Reissue once with the renewed credential; a second 401 is final
    async fn replay(&self, mut request: ApiRequest, token: &str) -> ReplayOutcome {
        request
            .set_bearer(token)
            .map_err(|e| ApiError::Internal(e.into()))?;

        tracing::debug!(
            request_id = %request.id(),
            path = %request.path,
            "Replaying request with renewed token"
        );

        self.transport.send(&request).await?.into_result()
    }
}
