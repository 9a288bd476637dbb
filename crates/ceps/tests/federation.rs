//! Cross-host scenarios: relay round trips, one-shot redemption, and
//! sharing flows over the in-memory network.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use ceps::core::VALIDATION_TOKEN_TTL_MS;
use ceps::{
    AppName, DenialError, GrantType, HostId, MessageBox, MessageDraft, PermissionName, RecordId,
    ShareAction, ShareRequest, TableId, TokenSource, UserId, ValidationClaims, ValidationScope,
};
use ceps::{CepsError, RightsRequest};
use ceps_testkit::{init_tracing, messaging_grant, two_hosts};

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct NotePayload {
    title: String,
    body: String,
}

fn alice() -> UserId {
    UserId::new("alice")
}

fn bob() -> UserId {
    UserId::new("bob")
}

fn note_bytes() -> Vec<u8> {
    let mut buf = Vec::new();
    ciborium::into_writer(
        &NotePayload {
            title: "trip".into(),
            body: "we should go".into(),
        },
        &mut buf,
    )
    .unwrap();
    buf
}

fn draft_to_bob() -> MessageDraft {
    MessageDraft {
        recipient_id: bob(),
        recipient_host: HostId::new("b.test"),
        messaging_permission: PermissionName::new("link"),
        contact_permission: PermissionName::new("friends"),
        table_id: TableId::new("journal.entries"),
        record_id: RecordId::new("r1"),
        record: note_bytes(),
        app_id: AppName::new("app"),
    }
}

#[tokio::test]
async fn two_host_relay_round_trip() -> Result<()> {
    init_tracing();
    let (_network, a, b) = two_hosts().await;

    a.seed_grant(&alice(), messaging_grant("journal.entries", "app", "link", bob()))
        .await;
    a.befriend(&alice(), bob(), HostId::new("b.test"));

    let sent = a.node.relay_message(&alice(), draft_to_bob()).await?;
    assert_eq!(sent.record.sender_host, HostId::new("a.test"));

    // The payload crossed the wire intact.
    let inbox = b.node.messages(&bob(), MessageBox::Got).await?;
    assert_eq!(inbox.len(), 1);
    let payload: NotePayload = ciborium::from_reader(inbox[0].record.record.as_slice())?;
    assert_eq!(payload.title, "trip");
    assert!(!inbox[0].record.read);

    // Outbox copy stays on the sending host.
    let outbox = a.node.messages(&alice(), MessageBox::Sent).await?;
    assert_eq!(outbox.len(), 1);
    assert!(b.node.messages(&alice(), MessageBox::Sent).await?.is_empty());

    // Recipient-side read flip.
    assert!(b.node.verify_delivery(&bob(), &inbox[0].meta.id).await?);
    assert!(b.node.mark_read(&bob(), &inbox[0].meta.id).await?);
    let inbox = b.node.messages(&bob(), MessageBox::Got).await?;
    assert!(inbox[0].record.read);

    Ok(())
}

#[tokio::test]
async fn relay_to_unknown_host_leaves_outbox_copy_only() -> Result<()> {
    let (_network, a, _b) = two_hosts().await;
    a.seed_grant(&alice(), messaging_grant("journal.entries", "app", "link", bob()))
        .await;
    a.befriend(&alice(), bob(), HostId::new("offline.test"));

    let mut draft = draft_to_bob();
    draft.recipient_host = HostId::new("offline.test");
    let err = a.node.relay_message(&alice(), draft).await.unwrap_err();
    assert!(matches!(err, CepsError::Transport(_)));

    // The outbox write happened before the failed hop.
    assert_eq!(a.node.messages(&alice(), MessageBox::Sent).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn validation_token_redeems_exactly_once() -> Result<()> {
    let (_network, a, _b) = two_hosts().await;

    let scope = ValidationScope {
        data_owner_user: alice(),
        data_owner_host: HostId::new("a.test"),
        requestor_user: bob(),
        requestor_host: HostId::new("b.test"),
        table_id: TableId::new("journal.entries"),
        permission: PermissionName::new("link"),
        app_id: AppName::new("app"),
        record_id: None,
    };
    let token = a.node.issue_validation_token(scope).await?;
    assert!(token.expiry - VALIDATION_TOKEN_TTL_MS <= ceps::core::now_millis());

    let claims = ValidationClaims {
        data_owner_user: alice(),
        table_id: TableId::new("journal.entries"),
        permission: PermissionName::new("link"),
        requestor_user: bob(),
        requestor_host: Some(HostId::new("b.test")),
    };

    let cred = a
        .node
        .redeem_validation_token(&token.validation_token, &claims)
        .await?;
    assert_eq!(cred.requestor_id, bob());
    assert_eq!(cred.owner_id, alice());

    // The minted access credential is live on host A.
    a.node
        .validate_credential(
            &cred.token_value,
            Some(&AppName::new("app")),
            None,
            TokenSource::Api,
        )
        .await?;

    // Second redemption finds nothing.
    let err = a
        .node
        .redeem_validation_token(&token.validation_token, &claims)
        .await
        .unwrap_err();
    assert!(matches!(err, CepsError::Denied(DenialError::NoStateFound)));
    Ok(())
}

#[tokio::test]
async fn share_then_resolve_write_own() -> Result<()> {
    let (_network, a, _b) = two_hosts().await;

    // Alice grants Bob write_own over her journal through the journal
    // app (self-ownership authorizes her to share it).
    let changed = a
        .node
        .share_records(
            &alice(),
            &ShareRequest {
                owner_id: alice(),
                requestor_app: AppName::new("journal"),
                table_id: TableId::new("journal.entries"),
                name: PermissionName::new("collab"),
                grant_type: GrantType::WriteOwn,
                action: ShareAction::Grant,
                grantees: vec!["bob".into()],
                do_not_list: false,
            },
        )
        .await?;
    assert_eq!(changed.len(), 1);

    let caps = a
        .node
        .resolve_rights(&RightsRequest::new(
            alice(),
            AppName::new("journal"),
            bob(),
            TableId::new("journal.entries"),
        ))
        .await?;
    assert!(caps.write_own);
    assert!(!caps.can_write);

    // Bob may write his own records in Alice's table, nothing else.
    assert!(caps.authorize_write(&bob(), &bob()));
    assert!(!caps.authorize_write(&bob(), &alice()));
    Ok(())
}

#[tokio::test]
async fn group_share_expands_before_writing() -> Result<()> {
    let (_network, a, _b) = two_hosts().await;
    a.add_group(&alice(), "climbers", vec![bob(), UserId::new("carol")]);

    let changed = a
        .node
        .share_records(
            &alice(),
            &ShareRequest {
                owner_id: alice(),
                requestor_app: AppName::new("journal"),
                table_id: TableId::new("journal.entries"),
                name: PermissionName::new("collab"),
                grant_type: GrantType::ReadAll,
                action: ShareAction::Grant,
                grantees: vec!["group:climbers".into()],
                do_not_list: false,
            },
        )
        .await?;
    assert!(changed[0].record.covers(&bob()));
    assert!(changed[0].record.covers(&UserId::new("carol")));
    Ok(())
}

#[tokio::test]
async fn public_share_covers_remote_strangers() -> Result<()> {
    let (_network, a, _b) = two_hosts().await;

    a.node
        .share_records(
            &alice(),
            &ShareRequest {
                owner_id: alice(),
                requestor_app: AppName::new("journal"),
                table_id: TableId::new("journal.entries"),
                name: PermissionName::new("feed"),
                grant_type: GrantType::ReadAll,
                action: ShareAction::Grant,
                grantees: vec!["_public".into()],
                do_not_list: true,
            },
        )
        .await?;

    let caps = a
        .node
        .resolve_rights(&RightsRequest::new(
            alice(),
            AppName::new("journal"),
            UserId::new("stranger"),
            TableId::new("journal.entries"),
        ))
        .await?;
    assert!(caps.can_read);
    assert!(caps.granted[0].record.covers(&UserId::new("stranger")));
    Ok(())
}

#[tokio::test]
async fn actor_without_share_capability_is_refused() -> Result<()> {
    let (_network, a, _b) = two_hosts().await;

    let err = a
        .node
        .share_records(
            &bob(),
            &ShareRequest {
                owner_id: alice(),
                requestor_app: AppName::new("journal"),
                table_id: TableId::new("journal.entries"),
                name: PermissionName::new("collab"),
                grant_type: GrantType::ReadAll,
                action: ShareAction::Grant,
                grantees: vec!["bob".into()],
                do_not_list: false,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CepsError::Denied(DenialError::Forbidden { .. })));
    Ok(())
}

#[tokio::test]
async fn login_validate_logout_round_trip() -> Result<()> {
    let (_network, a, _b) = two_hosts().await;

    let cred = a.node.login(&alice(), true).await?;
    let validated = a
        .node
        .validate_credential(&cred.token_value, None, Some(&alice()), TokenSource::Page)
        .await?;
    assert!(validated.is_account());

    assert!(a.node.logout(&cred.token_value).await?);
    let err = a
        .node
        .validate_credential(&cred.token_value, None, None, TokenSource::Api)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CepsError::Denied(DenialError::Unauthenticated)
    ));
    Ok(())
}
