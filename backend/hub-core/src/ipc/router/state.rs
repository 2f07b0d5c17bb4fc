//! Router state. Only the router actor owns one; every method is synchronous.

use super::events::HubEvent;

use crate::token::TokenService;

use models::protocol::payloads::{
    InstanceListPayload, MarkTaskAssignmentPayload, MarkTaskNotifyPayload, MarkTaskResultPayload,
    TokenRequestPayload, TokenResponsePayload,
};
use models::{ClientId, ConnectedClient, HubMessage, MarkTask};

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, TimeDelta, Utc};
use log::{debug, info, warn};
use tokio::sync::mpsc::UnboundedSender;

/// How long a completed or failed task stays queryable.
pub(crate) const FINISHED_TASK_RETENTION: TimeDelta = TimeDelta::hours(1);
pub(crate) const MAX_FINISHED_TASKS: usize = 256;
/// Pending and assigned tasks beyond this evict the oldest one.
pub(crate) const MAX_OPEN_TASKS: usize = 1024;

pub(crate) struct RouterState {
    /// Registration order; the fallback routing target is the first entry.
    clients: Vec<ConnectedClient>,
    senders: HashMap<ClientId, UnboundedSender<String>>,
    tasks: HashMap<String, MarkTask>,
    /// Finished task ids in completion order.
    finished: VecDeque<(String, DateTime<Utc>)>,
    tokens: TokenService,
    events: Vec<HubEvent>,
}

impl RouterState {
    pub(crate) fn new(tokens: TokenService) -> Self {
        Self {
            clients: Vec::new(),
            senders: HashMap::new(),
            tasks: HashMap::new(),
            finished: VecDeque::new(),
            tokens,
            events: Vec::new(),
        }
    }

    /// Events raised since the last call.
    pub(crate) fn take_events(&mut self) -> Vec<HubEvent> {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn clients(&self) -> &[ConnectedClient] {
        &self.clients
    }

    pub(crate) fn task(&self, task_id: &str) -> Option<&MarkTask> {
        self.tasks.get(task_id)
    }

    pub(crate) fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub(crate) fn sender(&self, client_id: &ClientId) -> Option<UnboundedSender<String>> {
        self.senders.get(client_id).cloned()
    }

    pub(crate) fn focused_id(&self) -> Option<ClientId> {
        self.clients
            .iter()
            .find(|c| c.is_focused)
            .map(|c| c.id.clone())
    }

    /// Focused client, else the first connected one, else `None`.
    pub(crate) fn route_to_focused_atem(&self) -> Option<ClientId> {
        self.focused_id()
            .or_else(|| self.clients.first().map(|c| c.id.clone()))
    }

    pub(crate) fn add_client(&mut self, client: ConnectedClient, sender: UnboundedSender<String>) {
        if let Some(existing) = self.clients.iter().position(|c| c.id == client.id) {
            warn!("Client {} registered twice, replacing", client.id);
            self.clients.remove(existing);
        }
        info!("Registered client {} ({})", client.id, client.hostname);
        let client_id = client.id.clone();
        let at = client.connected_at;
        self.senders.insert(client_id.clone(), sender);
        self.clients.push(client);

        // Authenticating counts as activity: the newcomer takes focus.
        if !self.update_focus(&client_id, None, None, at) {
            self.broadcast_instances();
        }
    }

    pub(crate) fn remove_client(&mut self, client_id: &ClientId) {
        let Some(index) = self.clients.iter().position(|c| &c.id == client_id) else {
            debug!("Remove for unknown client {}", client_id);
            return;
        };
        let removed = self.clients.remove(index);
        self.senders.remove(client_id);
        info!("Removed client {} ({})", removed.id, removed.hostname);

        if removed.is_focused {
            self.events.push(HubEvent::FocusChanged(None));
        }
        self.broadcast_instances();
    }

    /// Record activity and make `client_id` the sole focused client.
    ///
    /// Returns whether focus moved. The instance list is only re-broadcast
    /// when it did.
    pub(crate) fn update_focus(
        &mut self,
        client_id: &ClientId,
        hostname: Option<&str>,
        tag: Option<&str>,
        at: DateTime<Utc>,
    ) -> bool {
        if !self.clients.iter().any(|c| &c.id == client_id) {
            return false;
        }

        let previous = self.focused_id();
        for client in &mut self.clients {
            if &client.id == client_id {
                client.touch(hostname, tag, at);
                client.is_focused = true;
            } else {
                client.is_focused = false;
            }
        }

        let changed = previous.as_ref() != Some(client_id);
        if changed {
            debug!("Focus moved to {}", client_id);
            self.events
                .push(HubEvent::FocusChanged(Some(client_id.clone())));
            self.broadcast_instances();
        }
        changed
    }

    pub(crate) fn instance_list(&self) -> HubMessage {
        HubMessage::InstanceList(InstanceListPayload {
            instances: self.clients.clone(),
            focused_id: self.focused_id(),
        })
    }

    fn broadcast_instances(&mut self) {
        let list = self.instance_list();
        self.broadcast(&list);
        self.events
            .push(HubEvent::InstancesChanged(self.clients.clone()));
    }

    /// Returns false if the client is unknown, gone, or the frame failed to
    /// encode.
    pub(crate) fn send(&self, client_id: &ClientId, message: &HubMessage) -> bool {
        let Some(sender) = self.senders.get(client_id) else {
            warn!("Dropping {} for unknown client {}", message.kind(), client_id);
            return false;
        };
        let text = match message.encode() {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to encode {}: {}", message.kind(), e);
                return false;
            }
        };
        sender.send(text).is_ok()
    }

    pub(crate) fn broadcast(&self, message: &HubMessage) {
        let text = match message.encode() {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to encode {}: {}", message.kind(), e);
                return;
            }
        };
        for sender in self.senders.values() {
            let _ = sender.send(text.clone());
        }
    }

    /// Send to the routing target. Returns who received it.
    pub(crate) fn send_to_focused(&self, message: &HubMessage) -> Option<ClientId> {
        let target = self.route_to_focused_atem()?;
        self.send(&target, message).then_some(target)
    }

    /// Handle one inbound message from an authenticated client.
    ///
    /// `auth_request` is not handled here; it needs an async approval and the
    /// actor spawns it separately.
    pub(crate) fn dispatch(&mut self, from: &ClientId, message: HubMessage, at: DateTime<Utc>) {
        if let Some((hostname, tag)) = message.activity_metadata() {
            self.update_focus(from, hostname, tag, at);
        }

        match message {
            HubMessage::TokenRequest(request) => self.handle_token_request(from, request),
            HubMessage::ProjectListResponse(response) => {
                info!(
                    "Client {} reported {} projects",
                    from,
                    response.projects.len()
                );
                self.events.push(HubEvent::ProjectList {
                    client_id: from.clone(),
                    projects: response.projects,
                });
            }
            HubMessage::AgentListResponse(response) => {
                self.events.push(HubEvent::AgentList {
                    client_id: from.clone(),
                    agents: response.agents,
                });
            }
            HubMessage::UserCommand(command) => {
                self.events.push(HubEvent::UserCommand {
                    client_id: from.clone(),
                    command,
                });
            }
            HubMessage::StatusUpdate(update) => {
                self.events.push(HubEvent::UserStatus {
                    client_id: from.clone(),
                    status: update.status,
                });
            }
            HubMessage::MarkTaskNotify(notify) => self.handle_mark_task_notify(notify, at),
            HubMessage::MarkTaskResult(result) => self.handle_mark_task_result(from, result, at),
            HubMessage::VoiceResponse(response) => {
                self.events.push(HubEvent::VoiceResponse(response));
            }
            HubMessage::ProjectListRequest(_) | HubMessage::AgentListRequest(_) => {
                debug!("Client {} sent a request kind only the hub sends", from);
            }
            HubMessage::Unhandled { kind } => {
                debug!("Dropping unhandled message kind '{}' from {}", kind, from);
            }
            other => {
                debug!("Dropping {} from {}", other.kind(), from);
            }
        }
    }

    fn handle_token_request(&mut self, from: &ClientId, request: TokenRequestPayload) {
        let generated = self.tokens.generate_token(&request.channel, &request.uid);
        if generated.token.is_empty() {
            warn!(
                "Token request from {} for channel '{}' produced no token",
                from, request.channel
            );
        }
        let response = HubMessage::TokenResponse(TokenResponsePayload {
            token: generated.token,
            expires_in: generated.expires_in,
            channel: request.channel,
            uid: request.uid,
        });
        self.send(from, &response);
    }

    fn handle_mark_task_notify(&mut self, notify: MarkTaskNotifyPayload, at: DateTime<Utc>) {
        self.prune_finished(at);
        if let Some(existing) = self.tasks.get(&notify.task_id) {
            if existing.status != models::MarkTaskStatus::Pending {
                debug!(
                    "Ignoring notify for task {} already {:?}",
                    notify.task_id, existing.status
                );
                return;
            }
        }

        let mut task = MarkTask::new(notify.task_id.clone(), notify.description, at);
        let assignment = HubMessage::MarkTaskAssignment(MarkTaskAssignmentPayload {
            task_id: task.task_id.clone(),
            description: task.description.clone(),
            received_at: task.received_at,
        });

        match self.send_to_focused(&assignment) {
            Some(target) => {
                if let Err(e) = task.assign(target.clone(), at) {
                    warn!("{}", e);
                } else {
                    info!("Task {} assigned to {}", task.task_id, target);
                }
            }
            None => info!("Task {} pending: no connected client", task.task_id),
        }

        self.events.push(HubEvent::MarkTaskUpdated(task.clone()));
        self.tasks.insert(task.task_id.clone(), task);
        self.evict_open_overflow();
    }

    fn handle_mark_task_result(
        &mut self,
        from: &ClientId,
        result: MarkTaskResultPayload,
        at: DateTime<Utc>,
    ) {
        let Some(task) = self.tasks.get_mut(&result.task_id) else {
            warn!("Result from {} for unknown task {}", from, result.task_id);
            return;
        };
        match task.finish(result.success, result.message) {
            Ok(()) => {
                info!("Task {} finished: {:?}", task.task_id, task.status);
                self.events.push(HubEvent::MarkTaskUpdated(task.clone()));
                self.finished.push_back((result.task_id, at));
            }
            Err(e) => warn!("{}", e),
        }
        self.prune_finished(at);
    }

    /// Drop finished tasks older than the retention window, and the oldest
    /// ones beyond the cap.
    pub(crate) fn prune_finished(&mut self, now: DateTime<Utc>) {
        while let Some((task_id, finished_at)) = self.finished.front() {
            let expired = now - *finished_at >= FINISHED_TASK_RETENTION;
            if !expired && self.finished.len() <= MAX_FINISHED_TASKS {
                break;
            }
            debug!("Forgetting finished task {}", task_id);
            self.tasks.remove(task_id);
            self.finished.pop_front();
        }
    }

    fn evict_open_overflow(&mut self) {
        let open = self.tasks.len().saturating_sub(self.finished.len());
        if open <= MAX_OPEN_TASKS {
            return;
        }
        let oldest = self
            .tasks
            .values()
            .filter(|t| !t.status.is_terminal())
            .min_by_key(|t| t.received_at)
            .map(|t| t.task_id.clone());
        if let Some(task_id) = oldest {
            warn!("Too many open tasks; dropping {}", task_id);
            self.tasks.remove(&task_id);
        }
    }
}
