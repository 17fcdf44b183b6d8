//! Service-level tests that exercise the business rules without HTTP.

use helpdesk::config::Config;
use helpdesk::domain::{Principal, TicketId, TicketStatus, UserId, UserRole};
use helpdesk::models::{NewTicket, NewUser, UserPatch};
use helpdesk::services::{AuthError, TicketError};
use helpdesk::state::SharedState;

const PASSWORD: &str = "secret123";

fn test_config() -> Config {
    let db_path =
        std::env::temp_dir().join(format!("helpdesk-service-test-{}.db", uuid::Uuid::new_v4()));

    let mut config = Config::default();
    config.general.database_path = format!("sqlite:{}", db_path.display());
    config.security.argon2_memory_cost_kib = 1024;
    config.security.argon2_time_cost = 1;
    config.bootstrap.admin_password = "admin-password".to_string();
    config
}

async fn setup() -> SharedState {
    setup_with(test_config()).await
}

async fn setup_with(config: Config) -> SharedState {
    SharedState::new(config)
        .await
        .expect("failed to build shared state")
}

fn new_user(email: &str, role: Option<UserRole>) -> NewUser {
    NewUser {
        email: email.to_string(),
        password: PASSWORD.to_string(),
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        role,
        ..NewUser::default()
    }
}

async fn user(state: &SharedState, email: &str, role: UserRole) -> Principal {
    state
        .auth_service
        .provision(new_user(email, Some(role)))
        .await
        .unwrap()
        .principal()
}

async fn admin(state: &SharedState) -> Principal {
    state
        .auth_service
        .verify_credentials("admin@example.com", "admin-password")
        .await
        .unwrap()
        .principal()
}

fn ticket(title: &str) -> NewTicket {
    NewTicket {
        title: title.to_string(),
        description: "details".to_string(),
        ..NewTicket::default()
    }
}

#[tokio::test]
async fn test_verify_credentials() {
    let state = setup().await;
    let auth = &state.auth_service;
    let created = auth.register(new_user("X@Y.com", None), None).await.unwrap();
    assert_eq!(created.email, "x@y.com");
    assert_eq!(created.role, UserRole::Customer);

    let user = auth.verify_credentials(" x@y.COM ", PASSWORD).await.unwrap();
    assert_eq!(user.id, created.id);

    assert!(matches!(
        auth.verify_credentials("x@y.com", "wrong-pass").await,
        Err(AuthError::InvalidCredentials)
    ));
    assert!(matches!(
        auth.verify_credentials("nobody@y.com", PASSWORD).await,
        Err(AuthError::InvalidCredentials)
    ));
}

#[tokio::test]
async fn test_register_rules() {
    let state = setup().await;
    let auth = &state.auth_service;
    let admin = admin(&state).await;

    let customer = auth
        .register(new_user("x@y.com", None), None)
        .await
        .unwrap()
        .principal();
    assert!(matches!(
        auth.register(new_user("x@y.com", None), None).await,
        Err(AuthError::DuplicateEmail)
    ));
    assert!(matches!(
        auth.register(new_user("s@y.com", Some(UserRole::Support)), None)
            .await,
        Err(AuthError::Forbidden)
    ));

    assert!(matches!(
        auth.create_user(&customer, new_user("s@y.com", Some(UserRole::Support)))
            .await,
        Err(AuthError::Forbidden)
    ));

    let support = auth
        .create_user(&admin, new_user("s@y.com", Some(UserRole::Support)))
        .await
        .unwrap();
    assert_eq!(support.role, UserRole::Support);
}

#[tokio::test]
async fn test_ticket_listing_is_scoped() {
    let state = setup().await;
    let tickets = &state.ticket_service;
    let admin = admin(&state).await;
    let alice = user(&state, "a@example.com", UserRole::Customer).await;
    let bob = user(&state, "b@example.com", UserRole::Customer).await;
    let support = user(&state, "s@example.com", UserRole::Support).await;

    let a1 = tickets.create_ticket(&alice, ticket("first")).await.unwrap();
    let a2 = tickets.create_ticket(&alice, ticket("second")).await.unwrap();
    let b1 = tickets.create_ticket(&bob, ticket("bob")).await.unwrap();

    let fetched = tickets.get_ticket(&alice, a1.id).await.unwrap();
    assert_eq!(fetched, a1);
    assert_eq!(fetched.status, TicketStatus::Open);
    assert_eq!(fetched.priority, "medium");

    let ids: Vec<TicketId> = tickets
        .list_tickets(&alice)
        .await
        .unwrap()
        .iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(ids, vec![a2.id, a1.id]);

    assert!(tickets.list_tickets(&support).await.unwrap().is_empty());
    assert_eq!(tickets.list_tickets(&admin).await.unwrap().len(), 3);

    tickets
        .assign_ticket(&admin, b1.id, Some(support.id))
        .await
        .unwrap();
    let assigned = tickets.list_tickets(&support).await.unwrap();
    assert_eq!(assigned.len(), 1);
    assert_eq!(assigned[0].id, b1.id);

    assert!(matches!(
        tickets.get_ticket(&bob, a1.id).await,
        Err(TicketError::NotFound)
    ));
    assert!(matches!(
        tickets.get_ticket(&support, a1.id).await,
        Err(TicketError::NotFound)
    ));
}

#[tokio::test]
async fn test_only_admins_delete_tickets() {
    let state = setup().await;
    let tickets = &state.ticket_service;
    let admin = admin(&state).await;
    let alice = user(&state, "a@example.com", UserRole::Customer).await;
    let support = user(&state, "s@example.com", UserRole::Support).await;

    let t = tickets.create_ticket(&alice, ticket("keep me")).await.unwrap();
    state
        .comment_service
        .add_comment(&alice, t.id, "hello")
        .await
        .unwrap();

    for actor in [&alice, &support] {
        assert!(matches!(
            tickets.delete_ticket(actor, t.id).await,
            Err(TicketError::Forbidden)
        ));
        assert!(matches!(
            tickets.delete_ticket(actor, TicketId::new(9999)).await,
            Err(TicketError::Forbidden)
        ));
    }
    assert!(tickets.get_ticket(&alice, t.id).await.is_ok());

    tickets.delete_ticket(&admin, t.id).await.unwrap();
    assert!(matches!(
        tickets.get_ticket(&admin, t.id).await,
        Err(TicketError::NotFound)
    ));
    assert!(state.store.comments().list_for_ticket(t.id).await.unwrap().is_empty());
    assert!(matches!(
        tickets.delete_ticket(&admin, t.id).await,
        Err(TicketError::NotFound)
    ));
}

#[tokio::test]
async fn test_invalid_assignee_leaves_ticket_unchanged() {
    let state = setup().await;
    let tickets = &state.ticket_service;
    let admin = admin(&state).await;
    let alice = user(&state, "a@example.com", UserRole::Customer).await;
    let support = user(&state, "s@example.com", UserRole::Support).await;

    let t = tickets.create_ticket(&alice, ticket("printer")).await.unwrap();
    tickets
        .assign_ticket(&admin, t.id, Some(support.id))
        .await
        .unwrap();

    for assignee in [alice.id, UserId::new(9999)] {
        assert!(matches!(
            tickets.assign_ticket(&admin, t.id, Some(assignee)).await,
            Err(TicketError::InvalidAssignee)
        ));
    }
    let unchanged = tickets.get_ticket(&admin, t.id).await.unwrap();
    assert_eq!(unchanged.assigned_to_id, Some(support.id));

    // Admins are valid assignees too.
    let reassigned = tickets
        .assign_ticket(&admin, t.id, Some(admin.id))
        .await
        .unwrap();
    assert_eq!(reassigned.assigned_to_id, Some(admin.id));

    let cleared = tickets.assign_ticket(&admin, t.id, None).await.unwrap();
    assert_eq!(cleared.assigned_to_id, None);
}

#[tokio::test]
async fn test_status_changes_respect_assignment() {
    let state = setup().await;
    let tickets = &state.ticket_service;
    let admin = admin(&state).await;
    let alice = user(&state, "a@example.com", UserRole::Customer).await;
    let s1 = user(&state, "s1@example.com", UserRole::Support).await;
    let s2 = user(&state, "s2@example.com", UserRole::Support).await;

    let t = tickets.create_ticket(&alice, ticket("vpn")).await.unwrap();
    tickets.assign_ticket(&admin, t.id, Some(s1.id)).await.unwrap();

    assert!(matches!(
        tickets.update_status(&s2, t.id, TicketStatus::InProgress).await,
        Err(TicketError::Forbidden)
    ));
    assert!(matches!(
        tickets.update_status(&alice, t.id, TicketStatus::Closed).await,
        Err(TicketError::Forbidden)
    ));

    let updated = tickets
        .update_status(&s1, t.id, TicketStatus::Closed)
        .await
        .unwrap();
    assert_eq!(updated.status, TicketStatus::Closed);

    assert!(matches!(
        tickets.update_status(&admin, t.id, TicketStatus::Open).await,
        Err(TicketError::InvalidTransition {
            from: TicketStatus::Closed,
            to: TicketStatus::Open,
        })
    ));
}

#[tokio::test]
async fn test_admin_reopen_when_allowed() {
    let mut config = test_config();
    config.tickets.allow_reopen = true;
    let state = setup_with(config).await;
    let tickets = &state.ticket_service;
    let admin = admin(&state).await;
    let alice = user(&state, "a@example.com", UserRole::Customer).await;
    let support = user(&state, "s@example.com", UserRole::Support).await;

    let t = tickets.create_ticket(&alice, ticket("reopen")).await.unwrap();
    tickets.assign_ticket(&admin, t.id, Some(support.id)).await.unwrap();
    tickets
        .update_status(&support, t.id, TicketStatus::Resolved)
        .await
        .unwrap();

    assert!(matches!(
        tickets.update_status(&support, t.id, TicketStatus::Open).await,
        Err(TicketError::InvalidTransition { .. })
    ));
    let reopened = tickets
        .update_status(&admin, t.id, TicketStatus::Open)
        .await
        .unwrap();
    assert_eq!(reopened.status, TicketStatus::Open);
}

#[tokio::test]
async fn test_filing_on_behalf_of_a_customer() {
    let state = setup().await;
    let tickets = &state.ticket_service;
    let admin = admin(&state).await;
    let alice = user(&state, "a@example.com", UserRole::Customer).await;
    let bob = user(&state, "b@example.com", UserRole::Customer).await;
    let support = user(&state, "s@example.com", UserRole::Support).await;

    let for_alice = NewTicket {
        on_behalf_of: Some(alice.id),
        ..ticket("phoned in")
    };
    let t = tickets.create_ticket(&admin, for_alice.clone()).await.unwrap();
    assert_eq!(t.user_id, alice.id);

    assert!(matches!(
        tickets.create_ticket(&bob, for_alice).await,
        Err(TicketError::Forbidden)
    ));

    let for_support = NewTicket {
        on_behalf_of: Some(support.id),
        ..ticket("nope")
    };
    assert!(matches!(
        tickets.create_ticket(&admin, for_support).await,
        Err(TicketError::Validation(_))
    ));
    assert!(matches!(
        tickets.create_ticket(&support, ticket("nope")).await,
        Err(TicketError::Forbidden)
    ));
}

#[tokio::test]
async fn test_reset_token_rules() {
    let state = setup().await;
    let auth = &state.auth_service;
    let alice = user(&state, "a@example.com", UserRole::Customer).await;
    user(&state, "b@example.com", UserRole::Customer).await;

    let reset = auth.request_password_reset("a@example.com").await.unwrap();
    assert!(matches!(
        auth.consume_reset_token(&reset.token, "new-password", Some("b@example.com"))
            .await,
        Err(AuthError::ExpiredOrInvalidToken)
    ));
    assert!(matches!(
        auth.consume_reset_token(&reset.token, "short", None).await,
        Err(AuthError::Validation(_))
    ));

    let remember = auth.set_remember_token(alice.id).await.unwrap();
    auth.consume_reset_token(&reset.token, "new-password", Some("A@example.com"))
        .await
        .unwrap();
    assert!(auth.verify_remember_token(&remember).await.unwrap().is_none());
    assert!(matches!(
        auth.consume_reset_token(&reset.token, "other-password", None)
            .await,
        Err(AuthError::ExpiredOrInvalidToken)
    ));
    auth.verify_credentials("a@example.com", "new-password")
        .await
        .unwrap();

    // A newer token replaces the older one.
    let first = auth.set_reset_token(alice.id).await.unwrap();
    let second = auth.set_reset_token(alice.id).await.unwrap();
    assert!(matches!(
        auth.consume_reset_token(&first.token, "third-password", None)
            .await,
        Err(AuthError::ExpiredOrInvalidToken)
    ));
    auth.consume_reset_token(&second.token, "third-password", None)
        .await
        .unwrap();

    assert!(matches!(
        auth.request_password_reset("nobody@example.com").await,
        Err(AuthError::UserNotFound)
    ));
}

#[tokio::test]
async fn test_reset_token_expires() {
    let mut config = test_config();
    config.security.reset_token_ttl_minutes = 0;
    let state = setup_with(config).await;
    let auth = &state.auth_service;
    user(&state, "a@example.com", UserRole::Customer).await;

    let reset = auth.request_password_reset("a@example.com").await.unwrap();
    assert!(matches!(
        auth.consume_reset_token(&reset.token, "new-password", None)
            .await,
        Err(AuthError::ExpiredOrInvalidToken)
    ));
    auth.verify_credentials("a@example.com", PASSWORD)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_profile_updates() {
    let state = setup().await;
    let auth = &state.auth_service;
    let admin = admin(&state).await;
    let alice = user(&state, "a@example.com", UserRole::Customer).await;
    let bob = user(&state, "b@example.com", UserRole::Customer).await;

    assert!(matches!(
        auth.update_user(
            &alice,
            bob.id,
            UserPatch {
                first_name: Some("Mallory".to_string()),
                ..UserPatch::default()
            }
        )
        .await,
        Err(AuthError::Forbidden)
    ));
    assert!(matches!(
        auth.update_user(&alice, alice.id, UserPatch::default()).await,
        Err(AuthError::Validation(_))
    ));

    let remember = auth.set_remember_token(alice.id).await.unwrap();
    let updated = auth
        .update_user(
            &alice,
            alice.id,
            UserPatch {
                password: Some("changed-password".to_string()),
                phone: Some("555-0100".to_string()),
                ..UserPatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.phone.as_deref(), Some("555-0100"));
    assert!(auth.verify_remember_token(&remember).await.unwrap().is_none());
    auth.verify_credentials("a@example.com", "changed-password")
        .await
        .unwrap();

    let promoted = auth
        .update_user(
            &admin,
            bob.id,
            UserPatch {
                role: Some(UserRole::Support),
                ..UserPatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(promoted.role, UserRole::Support);
}

#[tokio::test]
async fn test_last_admin_keeps_role() {
    let state = setup().await;
    let auth = &state.auth_service;
    let admin = admin(&state).await;
    let demote = UserPatch {
        role: Some(UserRole::Customer),
        ..UserPatch::default()
    };

    assert!(matches!(
        auth.update_user(&admin, admin.id, demote.clone()).await,
        Err(AuthError::Validation(_))
    ));

    user(&state, "second-admin@example.com", UserRole::Admin).await;
    let demoted = auth.update_user(&admin, admin.id, demote).await.unwrap();
    assert_eq!(demoted.role, UserRole::Customer);
}

#[tokio::test]
async fn test_bootstrap_admin_is_idempotent() {
    let config = test_config();
    let bootstrap = config.bootstrap.clone();
    let state = setup_with(config).await;
    let auth = &state.auth_service;

    assert!(auth.ensure_bootstrap_admin(&bootstrap).await.unwrap().is_none());
    assert!(auth.ensure_bootstrap_admin(&bootstrap).await.unwrap().is_none());

    let admin = admin(&state).await;
    let users = auth.list_users(&admin).await.unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].role, UserRole::Admin);
}

#[tokio::test]
async fn test_support_staff_listing() {
    let state = setup().await;
    let auth = &state.auth_service;
    let alice = user(&state, "a@example.com", UserRole::Customer).await;
    user(&state, "s1@example.com", UserRole::Support).await;
    user(&state, "s2@example.com", UserRole::Support).await;

    let staff = auth.list_support_staff(&alice).await.unwrap();
    assert_eq!(staff.len(), 2);
    assert!(staff.iter().all(|u| u.role == UserRole::Support));

    assert!(matches!(
        auth.list_users(&alice).await,
        Err(AuthError::Forbidden)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writes_do_not_fail() {
    let state = setup().await;
    let tickets = &state.ticket_service;
    let admin = admin(&state).await;
    let alice = user(&state, "a@example.com", UserRole::Customer).await;
    let s1 = user(&state, "s1@example.com", UserRole::Support).await;
    let s2 = user(&state, "s2@example.com", UserRole::Support).await;

    let t1 = tickets.create_ticket(&alice, ticket("one")).await.unwrap();
    let t2 = tickets.create_ticket(&alice, ticket("two")).await.unwrap();

    for _ in 0..20 {
        let (a, b) = tokio::join!(
            tickets.assign_ticket(&admin, t1.id, Some(s1.id)),
            tickets.assign_ticket(&admin, t1.id, Some(s2.id)),
        );
        a.unwrap();
        b.unwrap();

        let (a, b) = tokio::join!(
            tickets.assign_ticket(&admin, t1.id, Some(s1.id)),
            tickets.assign_ticket(&admin, t2.id, Some(s2.id)),
        );
        a.unwrap();
        b.unwrap();

        let (a, b) = tokio::join!(
            tickets.create_ticket(&alice, ticket("burst")),
            state.comment_service.add_comment(&alice, t1.id, "ping"),
        );
        a.unwrap();
        b.unwrap();
    }

    let t1 = tickets.get_ticket(&admin, t1.id).await.unwrap();
    assert!(t1.assigned_to_id == Some(s1.id) || t1.assigned_to_id == Some(s2.id));
    assert_eq!(tickets.list_tickets(&alice).await.unwrap().len(), 22);
}

#[tokio::test]
async fn test_ticket_text_is_stored_as_submitted() {
    let state = setup().await;
    let tickets = &state.ticket_service;
    let alice = user(&state, "a@example.com", UserRole::Customer).await;

    let input = NewTicket {
        title: "  Printer broken ".to_string(),
        description: "\tPaper jam on floor 2\n".to_string(),
        priority: Some("High".to_string()),
        ..NewTicket::default()
    };
    let created = tickets.create_ticket(&alice, input.clone()).await.unwrap();
    let fetched = tickets.get_ticket(&alice, created.id).await.unwrap();

    assert_eq!(fetched.title, input.title);
    assert_eq!(fetched.description, input.description);
    assert_eq!(fetched.priority, "High");
    assert_eq!(fetched, created);

    let blank = NewTicket {
        title: "   ".to_string(),
        ..ticket("ignored")
    };
    assert!(matches!(
        tickets.create_ticket(&alice, blank).await,
        Err(TicketError::Validation(_))
    ));
}

#[tokio::test]
async fn test_remember_token_expires() {
    let state = setup().await;
    let auth = &state.auth_service;
    let alice = user(&state, "a@example.com", UserRole::Customer).await;

    let token = auth.set_remember_token(alice.id).await.unwrap();
    let found = auth.verify_remember_token(&token).await.unwrap();
    assert_eq!(found.map(|u| u.id), Some(alice.id));

    let past = helpdesk::db::timestamp_after(chrono::Duration::minutes(-1));
    helpdesk::db::UserRepository::new(state.store.writer())
        .set_remember_token(alice.id, &token, &past)
        .await
        .unwrap();
    assert!(auth.verify_remember_token(&token).await.unwrap().is_none());

    auth.clear_remember_token(alice.id).await.unwrap();
    assert!(auth.verify_remember_token(&token).await.unwrap().is_none());
}
