use models::protocol::payloads::{AgentInfo, ProjectInfo, UserCommandPayload, VoiceResponsePayload};
use models::{ClientId, ConnectedClient, MarkTask};

/// Everything in-process observers can learn about the hub.
#[derive(Debug, Clone, PartialEq)]
pub enum HubEvent {
    InstancesChanged(Vec<ConnectedClient>),
    FocusChanged(Option<ClientId>),
    ProjectList {
        client_id: ClientId,
        projects: Vec<ProjectInfo>,
    },
    AgentList {
        client_id: ClientId,
        agents: Vec<AgentInfo>,
    },
    UserCommand {
        client_id: ClientId,
        command: UserCommandPayload,
    },
    UserStatus {
        client_id: ClientId,
        status: String,
    },
    MarkTaskUpdated(MarkTask),
    VoiceResponse(VoiceResponsePayload),
    /// Short user-facing status from the voice workflow.
    VoiceStatus(String),
}
