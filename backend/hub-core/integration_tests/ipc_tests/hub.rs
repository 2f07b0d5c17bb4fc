use crate::ipc_tests::helpers::{
    TEST_HUB_ID, connect_to_hub, eventually, expect_policy_close, is_connection_closed, pair,
    receive_message, receive_until, resume, send_message, start_test_hub,
};

use hub_core::token::decode_token;

use models::protocol::payloads::{
    AuthErrorCode, MarkTaskNotifyPayload, SessionVerifyRequestPayload, TokenRequestPayload,
    UserCommandPayload,
};
use models::{HubMessage, MarkTaskStatus};

/// **VALUE**: Verifies pairing, session resume, focus and task routing end to end.
///
/// **WHY THIS MATTERS**: This is the hub's main job: admit instances, track
/// which one the user is working in, and deliver work there.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - Pairing doesn't return a reusable session
/// - Session auth doesn't register the client
/// - Focus isn't moved by user activity
/// - Mark tasks are delivered to the wrong instance
#[tokio::test]
async fn given_paired_instances_when_task_announced_then_focused_instance_assigned() {
    // GIVEN: A hub that approves pairing
    let (handle, context) = start_test_hub(true).await;

    // GIVEN: Instance A pairs
    let mut a = connect_to_hub(handle.port()).await;
    let paired = pair(&mut a, "laptop").await;
    assert_eq!(paired.hub_id, TEST_HUB_ID);
    let session_id = paired.session_id.expect("pairing returns a session id");
    assert!(paired.session_token.is_some());

    // THEN: A is registered and focused
    match receive_until(&mut a, |m| matches!(m, HubMessage::InstanceList(_))).await {
        HubMessage::InstanceList(list) => {
            assert_eq!(list.instances.len(), 1);
            assert_eq!(list.focused_id.as_ref(), Some(&list.instances[0].id));
        }
        _ => unreachable!(),
    }

    // GIVEN: Instance B resumes A's session from another socket
    let mut b = connect_to_hub(handle.port()).await;
    match resume(&mut b, &session_id).await {
        HubMessage::AuthSuccess(success) => {
            assert_eq!(success.session_id.as_deref(), Some(session_id.as_str()))
        }
        other => panic!("Expected auth_success, got {}", other.kind()),
    }
    let router = context.router.clone();
    assert!(eventually(|| {
        let router = router.clone();
        async move { router.get_instances().await.len() == 2 }
    }).await);

    // WHEN: B reports user activity, then A announces a task
    send_message(
        &mut b,
        &HubMessage::UserCommand(UserCommandPayload {
            command: String::from("git status"),
            source: None,
            hostname: Some(String::from("desktop")),
            tag: None,
        }),
    )
    .await;
    let b_id = match receive_until(&mut b, |m| {
        matches!(m, HubMessage::InstanceList(list) if list.focused_id.is_some())
    })
    .await
    {
        HubMessage::InstanceList(list) => list.focused_id.expect("focused"),
        _ => unreachable!(),
    };

    send_message(
        &mut a,
        &HubMessage::MarkTaskNotify(MarkTaskNotifyPayload {
            task_id: String::from("task-1"),
            status: String::from("new"),
            description: String::from("Fix the build"),
        }),
    )
    .await;

    // THEN: B receives the assignment and the router records it
    match receive_until(&mut b, |m| matches!(m, HubMessage::MarkTaskAssignment(_))).await {
        HubMessage::MarkTaskAssignment(assignment) => {
            assert_eq!(assignment.task_id, "task-1");
            assert_eq!(assignment.description, "Fix the build");
        }
        _ => unreachable!(),
    }
    let task = context
        .router
        .get_mark_task("task-1")
        .await
        .expect("task recorded");
    assert_eq!(task.status, MarkTaskStatus::Assigned);
    assert_eq!(task.assigned_to, Some(b_id));

    handle.shutdown();
}

/// **VALUE**: Verifies traffic before auth is rejected with auth_error and close 1008.
///
/// **BUG THIS CATCHES**: An unauthenticated socket being able to drive the router.
#[tokio::test]
async fn given_unauthenticated_when_send_command_then_rejected_and_closed() {
    let (handle, context) = start_test_hub(true).await;
    let mut ws = connect_to_hub(handle.port()).await;

    send_message(
        &mut ws,
        &HubMessage::UserCommand(UserCommandPayload {
            command: String::from("rm -rf"),
            source: None,
            hostname: None,
            tag: None,
        }),
    )
    .await;

    match receive_message(&mut ws).await {
        HubMessage::AuthError(error) => assert_eq!(error.code, AuthErrorCode::NotAuthenticated),
        other => panic!("Expected auth_error, got {}", other.kind()),
    }
    expect_policy_close(&mut ws).await;
    assert!(context.router.get_instances().await.is_empty());

    handle.shutdown();
}

/// **VALUE**: Verifies a denied pairing closes the socket.
#[tokio::test]
async fn given_denying_hub_when_pair_then_pairing_denied() {
    let (handle, _context) = start_test_hub(false).await;
    let mut ws = connect_to_hub(handle.port()).await;

    send_message(
        &mut ws,
        &HubMessage::Auth(models::protocol::payloads::AuthPayload {
            pairing_code: Some(String::from("00000000")),
            hostname: Some(String::from("intruder")),
            ..Default::default()
        }),
    )
    .await;

    match receive_message(&mut ws).await {
        HubMessage::AuthError(error) => assert_eq!(error.code, AuthErrorCode::PairingDenied),
        other => panic!("Expected auth_error, got {}", other.kind()),
    }
    expect_policy_close(&mut ws).await;

    handle.shutdown();
}

/// **VALUE**: Verifies relays can verify sessions without authenticating.
#[tokio::test]
async fn given_unauthenticated_relay_when_verify_session_then_answered_and_kept_open() {
    let (handle, context) = start_test_hub(true).await;
    let session = context.sessions.create("laptop").await;
    let mut relay = connect_to_hub(handle.port()).await;

    send_message(
        &mut relay,
        &HubMessage::SessionVerifyRequest(SessionVerifyRequestPayload {
            session_id: session.id.clone(),
            request_id: String::from("verify-1"),
        }),
    )
    .await;

    match receive_message(&mut relay).await {
        HubMessage::SessionVerifyResponse(response) => {
            assert!(response.valid);
            assert_eq!(response.request_id, "verify-1");
            assert_eq!(response.hub_id.as_deref(), Some(TEST_HUB_ID));
        }
        other => panic!("Expected session_verify_response, got {}", other.kind()),
    }
    assert!(!is_connection_closed(&mut relay).await);

    handle.shutdown();
}

/// **VALUE**: Verifies authenticated token requests get a signed token for the uid.
#[tokio::test]
async fn given_authenticated_when_token_request_then_token_response() {
    let (handle, _context) = start_test_hub(true).await;
    let mut ws = connect_to_hub(handle.port()).await;
    pair(&mut ws, "laptop").await;

    send_message(
        &mut ws,
        &HubMessage::TokenRequest(TokenRequestPayload {
            channel: String::from("hub-voice"),
            uid: String::from("2001"),
        }),
    )
    .await;

    match receive_until(&mut ws, |m| matches!(m, HubMessage::TokenResponse(_))).await {
        HubMessage::TokenResponse(response) => {
            assert_eq!(response.uid, "2001");
            let decoded = decode_token(&response.token).expect("valid token");
            assert_eq!(decoded.rtc_uid(), Some(2001));
        }
        _ => unreachable!(),
    }

    handle.shutdown();
}

/// **VALUE**: Verifies a disconnect removes the instance from the router.
#[tokio::test]
async fn given_registered_client_when_socket_closes_then_unregistered() {
    let (handle, context) = start_test_hub(true).await;
    let mut ws = connect_to_hub(handle.port()).await;
    pair(&mut ws, "laptop").await;
    let router = context.router.clone();
    assert!(eventually(|| {
        let router = router.clone();
        async move { router.get_instances().await.len() == 1 }
    }).await);

    ws.close(None).await.expect("close");
    drop(ws);

    assert!(eventually(|| {
        let router = router.clone();
        async move { router.get_instances().await.is_empty() }
    }).await);

    handle.shutdown();
}
