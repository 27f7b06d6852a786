// SPDX-FileCopyrightText: 2026 Ensign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for the orchestration engine.
//!
//! Each test builds an isolated harness with an in-memory secure store and
//! mock collaborators. Tests are independent and order-insensitive.

use std::sync::Arc;
use std::time::Duration;

use ethers_core::types::{Address, U256};

use ensign_agent::{
    Agent, ExpectedAction, FormResponse, RunOutcome, SessionStatus, SignatureOutcome,
    ToolRegistry,
};
use ensign_config::load_config_from_str;
use ensign_core::traits::surface::InteractionRequest;
use ensign_core::types::Identity;
use ensign_flow::{FlowStatus, FlowType};
use ensign_store::{MemoryBackend, SecureStateStore};
use ensign_test_utils::{
    MockChain, MockProvider, MockSurface, NameEntry, blocks_response, text_response,
    tool_response,
};

const TEST_CONFIG: &str = r#"
[store]
signing_secret = "e2e-test-secret"

[chain]
min_wait_secs = 0
wait_margin_secs = 0
"#;

struct Harness {
    agent: Agent,
    provider: Arc<MockProvider>,
    surface: Arc<MockSurface>,
    chain: Arc<MockChain>,
}

fn harness_with(chain: MockChain, responses: Vec<ensign_core::traits::provider::ProviderResponse>, extra_config: &str) -> Harness {
    let config = load_config_from_str(&format!("{TEST_CONFIG}\n{extra_config}")).unwrap();
    let provider = Arc::new(MockProvider::with_responses(responses));
    let surface = Arc::new(MockSurface::new());
    let chain = Arc::new(chain);
    let store = Arc::new(SecureStateStore::new(
        Arc::new(MemoryBackend::new()),
        config.store.signing_secret.clone(),
        Duration::from_secs(config.store.max_entry_age_secs),
    ));
    let agent = Agent::new(
        provider.clone(),
        surface.clone(),
        chain.clone(),
        store,
        ToolRegistry::with_builtin_tools(),
        config,
    );
    Harness {
        agent,
        provider,
        surface,
        chain,
    }
}

fn harness(responses: Vec<ensign_core::traits::provider::ProviderResponse>) -> Harness {
    harness_with(MockChain::new(), responses, "")
}

fn identity() -> Identity {
    Identity::new("user-1", "conv-1", "chan-1")
}

// ---- Scenario A: availability check with a 4-decimal price ----

#[tokio::test]
async fn check_name_calls_availability_once_and_formats_price() {
    let h = harness(vec![
        tool_response(
            Some("Let me check that name."),
            "name_status",
            serde_json::json!({"name": "alice.eth"}),
        ),
        text_response("alice.eth is available for 0.0042 ETH for one year."),
    ]);

    let outcome = h.agent.handle_message(&identity(), "check alice.eth").await.unwrap();
    assert_eq!(outcome, RunOutcome::Complete);
    assert_eq!(h.chain.name_status_calls(), 1);
    assert_eq!(h.provider.call_count(), 2);

    let messages = h.surface.sent_messages().await;
    assert!(
        messages.iter().any(|m| m.contains("0.0042")),
        "expected a 4-decimal price in {messages:?}"
    );

    // No pending marker after a text-only final turn.
    let session = h
        .agent
        .sessions()
        .load(&identity().user_id, &identity().conversation_id)
        .await
        .unwrap()
        .unwrap();
    assert!(session.pending_tool_call.is_none());
    assert_eq!(session.status, SessionStatus::Active);
}

// ---- Scenario B: registration prepare -> commit confirm -> wait fires ----

#[tokio::test]
async fn registration_wait_flips_estimate_and_readies_flow() {
    let h = harness(vec![tool_response(
        None,
        "prepare_registration",
        serde_json::json!({"name": "alice.eth"}),
    )]);
    let id = identity();

    let outcome = h.agent.handle_message(&id, "register alice.eth").await.unwrap();
    assert!(matches!(
        outcome,
        RunOutcome::AwaitingAction(ExpectedAction::SignTransaction { .. })
    ));

    let flow = h
        .agent
        .flows()
        .get_active_flow(&id.user_id, &id.conversation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(flow.status, FlowStatus::Step1Pending);
    let reg = flow.data.as_registration().unwrap();
    assert!(reg.costs.as_ref().unwrap().is_register_estimate);
    assert!(reg.commitment.is_some());

    // A commit signature confirmation arrives.
    h.provider
        .push(text_response("Commit confirmed -- the wait has started."))
        .await;
    let outcome = h
        .agent
        .handle_signature_result(
            &id,
            SignatureOutcome::Success {
                tx_hash: "0xc0ffee".into(),
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::Complete);

    // The zero-length test wait elapses and the continuation fires.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let flow = h
        .agent
        .flows()
        .get_active_flow(&id.user_id, &id.conversation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(flow.status, FlowStatus::Step1Complete);
    let reg = flow.data.as_registration().unwrap();
    assert!(!reg.costs.as_ref().unwrap().is_register_estimate);
    assert_eq!(reg.commit_tx_hash.as_deref(), Some("0xc0ffee"));

    let messages = h.surface.sent_messages().await;
    assert!(
        messages.iter().any(|m| m.contains("wait")),
        "expected a wait-complete notification in {messages:?}"
    );
}

#[tokio::test]
async fn registration_completes_after_submit_and_register_signature() {
    let h = harness(vec![tool_response(
        None,
        "prepare_registration",
        serde_json::json!({"name": "alice.eth"}),
    )]);
    let id = identity();

    h.agent.handle_message(&id, "register alice.eth").await.unwrap();
    h.provider.push(text_response("Waiting now.")).await;
    h.agent
        .handle_signature_result(
            &id,
            SignatureOutcome::Success {
                tx_hash: "0xc0ffee".into(),
            },
        )
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // The user asks to finish; the model calls submit_registration.
    h.provider
        .push(tool_response(None, "submit_registration", serde_json::json!({})))
        .await;
    let outcome = h.agent.handle_message(&id, "finish the registration").await.unwrap();
    assert!(matches!(
        outcome,
        RunOutcome::AwaitingAction(ExpectedAction::SignTransaction { .. })
    ));
    let flow = h
        .agent
        .flows()
        .get_active_flow(&id.user_id, &id.conversation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(flow.status, FlowStatus::Step2Pending);

    // Register signature confirms; the flow completes and is cleared.
    h.provider
        .push(text_response("Done -- alice.eth is yours."))
        .await;
    let outcome = h
        .agent
        .handle_signature_result(
            &id,
            SignatureOutcome::Success {
                tx_hash: "0xbeef".into(),
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::Complete);
    assert!(
        h.agent
            .flows()
            .get_active_flow(&id.user_id, &id.conversation_id)
            .await
            .unwrap()
            .is_none()
    );
}

// ---- Scenario C: cancel clears everything without a model call ----

#[tokio::test]
async fn cancel_skips_tools_and_clears_flow() {
    let h = harness(vec![tool_response(
        None,
        "prepare_registration",
        serde_json::json!({"name": "alice.eth"}),
    )]);
    let id = identity();

    h.agent.handle_message(&id, "register alice.eth").await.unwrap();
    let calls_before = h.provider.call_count();

    let outcome = h.agent.handle_message(&id, "cancel").await.unwrap();
    assert_eq!(outcome, RunOutcome::Complete);
    // No model turn for the cancel.
    assert_eq!(h.provider.call_count(), calls_before);

    assert!(
        h.agent
            .flows()
            .get_active_flow(&id.user_id, &id.conversation_id)
            .await
            .unwrap()
            .is_none()
    );
    let session = h
        .agent
        .sessions()
        .load(&id.user_id, &id.conversation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.status, SessionStatus::Active);
    assert!(session.pending_tool_call.is_none());

    let messages = h.surface.sent_messages().await;
    assert!(messages.last().unwrap().contains("Cancelled"));
}

// ---- Scenario D: deterministic bridge amounts ----

#[tokio::test]
async fn identical_bridge_requests_produce_identical_inputs() {
    let mut inputs = Vec::new();
    for _ in 0..2 {
        let h = harness(vec![tool_response(
            None,
            "prepare_bridge",
            serde_json::json!({"amount_eth": "1"}),
        )]);
        let outcome = h.agent.handle_message(&identity(), "bridge 1 eth").await.unwrap();
        assert!(matches!(outcome, RunOutcome::AwaitingAction(_)));

        let interactions = h.surface.sent_interactions().await;
        let InteractionRequest::Transaction(tx) = interactions.last().unwrap().clone() else {
            panic!("expected a transaction request");
        };
        inputs.push(tx.value);
    }
    assert_eq!(inputs[0], inputs[1]);
    // Input exceeds the 1 ETH target to cover fees.
    assert!(inputs[0] > U256::from(1_000_000_000_000_000_000u64));
}

// ---- Turn loop properties ----

#[tokio::test]
async fn max_turns_is_a_distinct_outcome_with_capped_calls() {
    let mut responses = Vec::new();
    for _ in 0..10 {
        responses.push(tool_response(
            None,
            "name_status",
            serde_json::json!({"name": "alice.eth"}),
        ));
    }
    let h = harness_with(MockChain::new(), responses, "[agent]\nmax_turns = 3");

    let outcome = h.agent.handle_message(&identity(), "loop forever").await.unwrap();
    assert_eq!(outcome, RunOutcome::MaxTurns);
    assert_eq!(h.provider.call_count(), 3);
}

#[tokio::test]
async fn suspension_skips_same_turn_siblings() {
    use ensign_core::traits::provider::ContentBlock;

    let h = harness(vec![blocks_response(vec![
        ContentBlock::ToolUse {
            id: "toolu_1".into(),
            name: "prepare_registration".into(),
            input: serde_json::json!({"name": "alice.eth"}),
        },
        ContentBlock::ToolUse {
            id: "toolu_2".into(),
            name: "name_status".into(),
            input: serde_json::json!({"name": "bob.eth"}),
        },
    ])]);
    let id = identity();

    let outcome = h.agent.handle_message(&id, "register alice.eth").await.unwrap();
    assert!(matches!(outcome, RunOutcome::AwaitingAction(_)));
    // prepare_registration checked alice.eth once; the sibling lookup for
    // bob.eth never ran.
    assert_eq!(h.chain.name_status_calls(), 1);
    assert_eq!(h.provider.call_count(), 1);

    let session = h
        .agent
        .sessions()
        .load(&id.user_id, &id.conversation_id)
        .await
        .unwrap()
        .unwrap();
    let pending = session.pending_tool_call.unwrap();
    assert_eq!(pending.tool_name, "prepare_registration");
    assert_eq!(session.status, SessionStatus::AwaitingSignature);
}

#[tokio::test]
async fn unknown_tool_is_a_tool_level_error_not_a_crash() {
    let h = harness(vec![
        tool_response(None, "not_a_real_tool", serde_json::json!({})),
        text_response("Sorry, let me try something else."),
    ]);

    let outcome = h.agent.handle_message(&identity(), "do a thing").await.unwrap();
    assert_eq!(outcome, RunOutcome::Complete);
    assert_eq!(h.provider.call_count(), 2);
}

#[tokio::test]
async fn empty_input_gets_a_retry_prompt_without_a_model_call() {
    let h = harness(vec![]);
    let outcome = h.agent.handle_message(&identity(), "   ").await.unwrap();
    assert_eq!(outcome, RunOutcome::Complete);
    assert_eq!(h.provider.call_count(), 0);
    assert!(!h.surface.sent_messages().await.is_empty());
}

// ---- Resume edge cases ----

#[tokio::test]
async fn resume_without_session_reports_no_session() {
    let h = harness(vec![]);
    let outcome = h
        .agent
        .handle_signature_result(
            &identity(),
            SignatureOutcome::Success {
                tx_hash: "0x1".into(),
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::NoSession);
    assert!(
        h.surface
            .sent_messages()
            .await
            .last()
            .unwrap()
            .contains("no active session")
    );
}

#[tokio::test]
async fn resume_with_vanished_flow_fails_closed() {
    let h = harness(vec![tool_response(
        None,
        "prepare_registration",
        serde_json::json!({"name": "alice.eth"}),
    )]);
    let id = identity();

    h.agent.handle_message(&id, "register alice.eth").await.unwrap();
    // The flow evaporates (expiry, integrity discard) while the signature is
    // out with the user.
    h.agent
        .flows()
        .clear_active_flow(&id.user_id, &id.conversation_id)
        .await
        .unwrap();

    let outcome = h
        .agent
        .handle_signature_result(
            &id,
            SignatureOutcome::Success {
                tx_hash: "0x1".into(),
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::Failed);

    let session = h
        .agent
        .sessions()
        .load(&id.user_id, &id.conversation_id)
        .await
        .unwrap()
        .unwrap();
    assert!(session.pending_tool_call.is_none());
}

#[tokio::test]
async fn rejected_signature_fails_and_clears_the_flow() {
    let h = harness(vec![tool_response(
        None,
        "prepare_registration",
        serde_json::json!({"name": "alice.eth"}),
    )]);
    let id = identity();

    h.agent.handle_message(&id, "register alice.eth").await.unwrap();
    h.provider
        .push(text_response("Understood, I won't proceed."))
        .await;
    let outcome = h
        .agent
        .handle_signature_result(
            &id,
            SignatureOutcome::Rejected {
                reason: Some("changed my mind".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::Complete);
    assert!(
        h.agent
            .flows()
            .get_active_flow(&id.user_id, &id.conversation_id)
            .await
            .unwrap()
            .is_none()
    );
}

// ---- Wallet selection form ----

#[tokio::test]
async fn multiple_wallets_detour_through_a_selection_form() {
    let wallet_a = Address::repeat_byte(0xaa);
    let wallet_b = Address::repeat_byte(0xbb);
    let chain = MockChain::new().with_wallets(vec![wallet_a, wallet_b]);
    let h = harness_with(
        chain,
        vec![tool_response(
            None,
            "prepare_registration",
            serde_json::json!({"name": "alice.eth"}),
        )],
        "",
    );
    let id = identity();

    let outcome = h.agent.handle_message(&id, "register alice.eth").await.unwrap();
    assert!(matches!(
        outcome,
        RunOutcome::AwaitingAction(ExpectedAction::SelectWallet { .. })
    ));
    let flow = h
        .agent
        .flows()
        .get_active_flow(&id.user_id, &id.conversation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(flow.status, FlowStatus::AwaitingWallet);

    // The user answers the form; the model re-runs the prepare tool, which
    // now continues with the chosen wallet.
    let request_id = h.surface.last_request_id().await.unwrap();
    h.provider
        .push(tool_response(
            None,
            "prepare_registration",
            serde_json::json!({"name": "alice.eth"}),
        ))
        .await;
    let outcome = h
        .agent
        .handle_form_response(
            &id,
            FormResponse {
                request_id,
                values: [("wallet".to_string(), format!("{wallet_b:?}"))]
                    .into_iter()
                    .collect(),
            },
        )
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        RunOutcome::AwaitingAction(ExpectedAction::SignTransaction { .. })
    ));

    let flow = h
        .agent
        .flows()
        .get_active_flow(&id.user_id, &id.conversation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(flow.status, FlowStatus::Step1Pending);
    let reg = flow.data.as_registration().unwrap();
    assert_eq!(reg.signer, Some(wallet_b));
    // The commitment owner is the chosen wallet.
    assert_eq!(reg.commitment.as_ref().unwrap().params.owner, wallet_b);
}

// ---- Subdomain multi-step ----

#[tokio::test]
async fn subdomain_with_external_recipient_takes_three_steps() {
    let wallet = Address::repeat_byte(0x11);
    let recipient = Address::repeat_byte(0x22);
    let chain = MockChain::new().with_name(
        "alice.eth",
        NameEntry {
            available: false,
            owner: wallet,
            ..NameEntry::default()
        },
    );
    let h = harness_with(
        chain,
        vec![tool_response(
            None,
            "prepare_subdomain",
            serde_json::json!({
                "parent": "alice.eth",
                "label": "pay",
                "recipient": format!("{recipient:?}"),
            }),
        )],
        "",
    );
    let id = identity();

    let outcome = h.agent.handle_message(&id, "make pay.alice.eth").await.unwrap();
    assert!(matches!(outcome, RunOutcome::AwaitingAction(_)));
    let flow = h
        .agent
        .flows()
        .get_active_flow(&id.user_id, &id.conversation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(flow.flow_type(), FlowType::Subdomain);
    assert_eq!(flow.status, FlowStatus::Step1Pending);

    // Step 1 confirms; the model continues with step 2.
    h.provider
        .push(tool_response(None, "continue_subdomain", serde_json::json!({})))
        .await;
    let outcome = h
        .agent
        .handle_signature_result(
            &id,
            SignatureOutcome::Success {
                tx_hash: "0xstep1".into(),
            },
        )
        .await
        .unwrap();
    assert!(matches!(outcome, RunOutcome::AwaitingAction(_)));

    // Step 2 confirms; step 3 goes out.
    h.provider
        .push(tool_response(None, "continue_subdomain", serde_json::json!({})))
        .await;
    h.agent
        .handle_signature_result(
            &id,
            SignatureOutcome::Success {
                tx_hash: "0xstep2".into(),
            },
        )
        .await
        .unwrap();

    // Step 3 confirms; the flow completes.
    h.provider
        .push(text_response("pay.alice.eth is all set."))
        .await;
    let outcome = h
        .agent
        .handle_signature_result(
            &id,
            SignatureOutcome::Success {
                tx_hash: "0xstep3".into(),
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::Complete);
    assert!(
        h.agent
            .flows()
            .get_active_flow(&id.user_id, &id.conversation_id)
            .await
            .unwrap()
            .is_none()
    );
    assert_eq!(h.surface.interaction_count().await, 3);
}

// ---- Waiter recovery after restart ----

#[tokio::test]
async fn recover_pending_waits_reschedules_confirmed_commits() {
    let h = harness(vec![tool_response(
        None,
        "prepare_registration",
        serde_json::json!({"name": "alice.eth"}),
    )]);
    let id = identity();

    h.agent.handle_message(&id, "register alice.eth").await.unwrap();

    // Record the commit confirmation directly, as if the process died right
    // after persisting it and before its in-memory timer could fire.
    h.agent
        .flows()
        .update_flow_data(&id.user_id, &id.conversation_id, |d| {
            if let Some(reg) = d.as_registration_mut() {
                reg.commit_tx_hash = Some("0xdead".into());
                reg.commit_confirmed_at = Some(ensign_core::types::now_ms() - 1_000);
            }
        })
        .await
        .unwrap();

    let recovered = h.agent.waiter().recover_pending_waits().await.unwrap();
    assert_eq!(recovered, 1);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let flow = h
        .agent
        .flows()
        .get_active_flow(&id.user_id, &id.conversation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(flow.status, FlowStatus::Step1Complete);
    assert!(!flow.data.as_registration().unwrap().costs.as_ref().unwrap().is_register_estimate);
}

// ---- One active flow per user ----

#[tokio::test]
async fn second_operation_in_another_conversation_is_refused() {
    let h = harness(vec![tool_response(
        None,
        "prepare_registration",
        serde_json::json!({"name": "alice.eth"}),
    )]);
    let first = identity();
    h.agent.handle_message(&first, "register alice.eth").await.unwrap();

    // Same user, different conversation.
    let second = Identity::new("user-1", "conv-2", "chan-1");
    h.provider
        .push(tool_response(
            None,
            "prepare_registration",
            serde_json::json!({"name": "bob.eth"}),
        ))
        .await;
    h.provider
        .push(text_response("You already have something running."))
        .await;
    let outcome = h.agent.handle_message(&second, "register bob.eth").await.unwrap();
    // The tool refused; the loop carried on to a text turn.
    assert_eq!(outcome, RunOutcome::Complete);
    assert!(
        h.agent
            .flows()
            .get_active_flow(&second.user_id, &second.conversation_id)
            .await
            .unwrap()
            .is_none()
    );
}
