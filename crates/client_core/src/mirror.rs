//! Observer-side mirror of the active snapshot.
//!
//! A background task polls the command service on a fixed interval and adopts
//! the fetched snapshot only when it differs from the one already adopted, so
//! subscribers are woken (and the observer resized) only on real changes.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use shared::{
    domain::{ActiveSnapshot, Character},
    error::ApiError,
    protocol::{CommandReply, CommandRequest},
};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    error::ClientError,
    service::{request_active, request_groups},
    CommandService,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorState {
    Idle,
    Polling,
    Disposed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The fetched snapshot replaced the adopted one.
    Adopted,
    /// The fetch matched the adopted sequence; at most the focus index was updated.
    Unchanged,
    /// No fetch happened: a poll was already in flight or the mirror is disposed.
    Skipped,
}

/// True when `fetched` differs from `adopted` in length, or in name or breed
/// at some position.
pub fn needs_adoption(adopted: &[Character], fetched: &[Character]) -> bool {
    if adopted.len() != fetched.len() {
        return true;
    }
    adopted
        .iter()
        .zip(fetched)
        .any(|(old, new)| old.name != new.name || old.breed != new.breed)
}

/// Observer height for `count` rows; an empty snapshot still gets one row.
pub fn observer_height(count: usize, row_height: u32) -> u32 {
    let rows = u32::try_from(count.max(1)).unwrap_or(u32::MAX);
    rows.saturating_mul(row_height)
}

/// Recomputes the observer height whenever the adopted member count changes.
#[derive(Debug, Clone)]
pub struct ResizeEffect {
    last_count: Option<usize>,
    row_height: u32,
}

impl ResizeEffect {
    pub fn new(row_height: u32) -> Self {
        Self {
            last_count: None,
            row_height,
        }
    }

    /// New height when the member count changed since the last call.
    pub fn observe(&mut self, snapshot: &ActiveSnapshot) -> Option<u32> {
        let count = snapshot.len();
        if self.last_count == Some(count) {
            return None;
        }
        self.last_count = Some(count);
        Some(observer_height(count, self.row_height))
    }
}

pub struct ActiveMirror {
    service: Arc<dyn CommandService>,
    adopted: watch::Sender<Arc<ActiveSnapshot>>,
    state: Mutex<MirrorState>,
}

impl ActiveMirror {
    pub fn new(service: Arc<dyn CommandService>) -> Arc<Self> {
        let (adopted, _) = watch::channel(Arc::new(ActiveSnapshot::default()));
        Arc::new(Self {
            service,
            adopted,
            state: Mutex::new(MirrorState::Idle),
        })
    }

    pub fn state(&self) -> MirrorState {
        *self.lock_state()
    }

    /// The last adopted snapshot.
    pub fn current(&self) -> Arc<ActiveSnapshot> {
        self.adopted.borrow().clone()
    }

    /// Receiver woken on every adoption.
    pub fn subscribe(&self) -> watch::Receiver<Arc<ActiveSnapshot>> {
        self.adopted.subscribe()
    }

    /// One poll: fetch, diff, adopt on difference.
    pub async fn tick(&self) -> Result<SyncOutcome, ClientError> {
        if !self.begin_poll() {
            return Ok(SyncOutcome::Skipped);
        }

        let reply = self.service.execute(CommandRequest::ListActive).await;
        if !self.end_poll() {
            return Ok(SyncOutcome::Skipped);
        }

        let fetched = match reply {
            Ok(CommandReply::Active(snapshot)) => snapshot,
            Ok(_) => {
                return Err(ClientError::PollFailed(ApiError::internal(
                    "unexpected reply to list_active",
                )))
            }
            Err(err) => return Err(ClientError::PollFailed(err)),
        };

        if !needs_adoption(&self.current().characters, &fetched.characters) {
            self.follow_focus(&fetched);
            return Ok(SyncOutcome::Unchanged);
        }
        self.adopt(fetched);
        Ok(SyncOutcome::Adopted)
    }

    /// Flips `enabled` for the member at `index` of the focused group, then
    /// adopts a fresh snapshot regardless of the diff.
    ///
    /// The index is checked against the adopted snapshot; the command uses the
    /// focus and flag of a snapshot fetched right before sending it.
    pub async fn toggle_enabled(&self, index: usize) -> Result<(), ClientError> {
        if self.state() == MirrorState::Disposed {
            return Err(ClientError::rejected("mirror is disposed"));
        }

        let adopted_len = self.current().len();
        if index >= adopted_len {
            return Err(ClientError::rejected(format!(
                "no active member at position {index} (have {adopted_len})"
            )));
        }

        let latest = request_active(self.service.as_ref(), CommandRequest::ListActive).await?;
        let member = latest.characters.get(index).ok_or_else(|| {
            ClientError::rejected(format!(
                "no active member at position {index} (have {})",
                latest.len()
            ))
        })?;

        request_groups(
            self.service.as_ref(),
            CommandRequest::SetMemberEnabled {
                id: latest.focus,
                index,
                value: !member.enabled,
            },
        )
        .await?;

        let fetched = request_active(self.service.as_ref(), CommandRequest::ListActive).await?;
        self.adopt(fetched);
        Ok(())
    }

    /// Starts polling every `period`, the first poll immediately.
    pub fn spawn(self: &Arc<Self>, period: Duration) -> MirrorHandle {
        let mirror = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                match mirror.tick().await {
                    Ok(SyncOutcome::Skipped) if mirror.state() == MirrorState::Disposed => break,
                    Ok(_) => {}
                    Err(err) => warn!(error = %err, "active snapshot poll failed"),
                }
            }
        });

        MirrorHandle {
            mirror: Arc::clone(self),
            task,
        }
    }

    /// Terminal: later ticks are skipped and in-flight fetches discarded.
    pub fn dispose(&self) {
        *self.lock_state() = MirrorState::Disposed;
    }

    fn adopt(&self, snapshot: ActiveSnapshot) {
        info!(
            focus = snapshot.focus.0,
            members = snapshot.len(),
            "adopted active snapshot"
        );
        self.adopted.send_replace(Arc::new(snapshot));
    }

    /// Records a new focus index without waking subscribers.
    fn follow_focus(&self, fetched: &ActiveSnapshot) {
        self.adopted.send_if_modified(|adopted| {
            if adopted.focus != fetched.focus {
                debug!(
                    from = adopted.focus.0,
                    to = fetched.focus.0,
                    "active focus moved"
                );
                *adopted = Arc::new(ActiveSnapshot::new(
                    fetched.focus,
                    adopted.characters.clone(),
                ));
            }
            false
        });
    }

    fn begin_poll(&self) -> bool {
        let mut state = self.lock_state();
        if *state != MirrorState::Idle {
            return false;
        }
        *state = MirrorState::Polling;
        true
    }

    fn end_poll(&self) -> bool {
        let mut state = self.lock_state();
        if *state == MirrorState::Disposed {
            return false;
        }
        *state = MirrorState::Idle;
        true
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, MirrorState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Owns the polling task; disposing or dropping it stops polling.
pub struct MirrorHandle {
    mirror: Arc<ActiveMirror>,
    task: JoinHandle<()>,
}

impl MirrorHandle {
    pub fn mirror(&self) -> &Arc<ActiveMirror> {
        &self.mirror
    }

    pub fn dispose(self) {
        self.mirror.dispose();
    }
}

impl Drop for MirrorHandle {
    fn drop(&mut self) {
        self.mirror.dispose();
        self.task.abort();
    }
}

#[cfg(test)]
#[path = "tests/mirror_tests.rs"]
mod tests;
