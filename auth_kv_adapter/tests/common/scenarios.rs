//! Contract scenarios shared by every backend.
//!
//! Each takes a fresh identifier suffix so several can run against one
//! shared store.

use auth_kv_adapter::{
    AccountRef, AdapterError, AuthAdapter, KvAdapter, KvStore, SessionUpdate,
};

use super::fixtures::{
    TestUsers, github_account, google_account, session_for, unique_suffix, verification_for,
};

/// create_user then get_user_by_email returns an equal record
pub async fn user_round_trip<S: KvStore>(adapter: &KvAdapter<S>) {
    let suffix = unique_suffix();
    let alice = TestUsers::alice(&suffix);

    let created = adapter.create_user(alice.clone()).await.unwrap();

    assert_eq!(created, alice);
    assert_eq!(
        adapter.get_user_by_email(&alice.email).await.unwrap(),
        Some(alice.clone())
    );
    assert_eq!(adapter.get_user(&alice.id).await.unwrap(), Some(alice));
}

/// Email changes move the index and the old address stops resolving
pub async fn user_email_change<S: KvStore>(adapter: &KvAdapter<S>) {
    let suffix = unique_suffix();
    let bob = TestUsers::bob(&suffix);
    adapter.create_user(bob.clone()).await.unwrap();

    let mut moved = bob.clone();
    moved.email = format!("robert-{suffix}@example.com");
    adapter.update_user(moved.clone()).await.unwrap();

    assert_eq!(adapter.get_user_by_email(&bob.email).await.unwrap(), None);
    assert_eq!(
        adapter.get_user_by_email(&moved.email).await.unwrap(),
        Some(moved)
    );

    let ghost = TestUsers::alice(&unique_suffix());
    assert!(matches!(
        adapter.update_user(ghost).await,
        Err(AdapterError::UserNotFound(_))
    ));
}

/// Linking makes the user reachable by account; unlinking twice is safe
pub async fn account_link_unlink<S: KvStore>(adapter: &KvAdapter<S>) {
    let suffix = unique_suffix();
    let alice = TestUsers::alice(&suffix);
    adapter.create_user(alice.clone()).await.unwrap();
    let account = github_account(&alice.id, &suffix);
    let account_ref = account.account_ref();

    adapter.link_account(account.clone()).await.unwrap();
    assert_eq!(
        adapter.get_user_by_account(&account_ref).await.unwrap(),
        Some(alice.clone())
    );
    assert_eq!(
        adapter.get_accounts_by_user(&alice.id).await.unwrap(),
        vec![account.clone()]
    );

    assert_eq!(
        adapter.unlink_account(&account_ref).await.unwrap(),
        Some(account)
    );
    assert_eq!(adapter.unlink_account(&account_ref).await.unwrap(), None);
    assert_eq!(adapter.get_user_by_account(&account_ref).await.unwrap(), None);
    assert!(adapter.get_accounts_by_user(&alice.id).await.unwrap().is_empty());
}

/// Deleting a user removes both linked accounts
pub async fn delete_user_cascade<S: KvStore>(adapter: &KvAdapter<S>) {
    let suffix = unique_suffix();
    let alice = TestUsers::alice(&suffix);
    adapter.create_user(alice.clone()).await.unwrap();
    let github = github_account(&alice.id, &suffix);
    let google = google_account(&alice.id, &suffix);
    adapter.link_account(github.clone()).await.unwrap();
    adapter.link_account(google.clone()).await.unwrap();

    adapter.delete_user(&alice.id).await.unwrap();

    assert_eq!(adapter.get_user(&alice.id).await.unwrap(), None);
    assert_eq!(adapter.get_user_by_email(&alice.email).await.unwrap(), None);
    for account_ref in [github.account_ref(), google.account_ref()] {
        assert_eq!(adapter.get_user_by_account(&account_ref).await.unwrap(), None);
        assert_eq!(adapter.unlink_account(&account_ref).await.unwrap(), None);
    }
    assert!(adapter.get_accounts_by_user(&alice.id).await.unwrap().is_empty());
    assert!(
        !adapter
            .pending_user_deletions()
            .await
            .unwrap()
            .contains(&alice.id)
    );

    // Deleting again is a no-op
    adapter.delete_user(&alice.id).await.unwrap();
}

/// Session create, lookup, merge update and delete
pub async fn session_lifecycle<S: KvStore>(adapter: &KvAdapter<S>) {
    let suffix = unique_suffix();
    let alice = TestUsers::alice(&suffix);
    let bob = TestUsers::bob(&suffix);
    let token = format!("tok1-{suffix}");

    // A session whose user does not exist yet resolves to nothing
    let session = session_for(&alice.id, &token);
    adapter.create_session(session.clone()).await.unwrap();
    assert_eq!(adapter.get_session_and_user(&token).await.unwrap(), None);

    adapter.create_user(alice.clone()).await.unwrap();
    let found = adapter.get_session_and_user(&token).await.unwrap().unwrap();
    assert_eq!(found.session, session);
    assert_eq!(found.user, alice);

    // Updating only the owner keeps the expiry
    adapter.create_user(bob.clone()).await.unwrap();
    let updated = adapter
        .update_session(SessionUpdate::new(&token).user_id(&bob.id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.user_id, bob.id);
    assert_eq!(updated.expires, session.expires);
    let found = adapter.get_session_and_user(&token).await.unwrap().unwrap();
    assert_eq!(found.user, bob);

    assert_eq!(
        adapter
            .update_session(SessionUpdate::new(format!("missing-{suffix}")).user_id(&bob.id))
            .await
            .unwrap(),
        None
    );

    assert_eq!(
        adapter.delete_session(&token).await.unwrap(),
        Some(updated)
    );
    assert_eq!(adapter.delete_session(&token).await.unwrap(), None);
    assert_eq!(adapter.get_session_and_user(&token).await.unwrap(), None);
}

/// A verification token can be used once, and only with the right value
pub async fn verification_single_use<S: KvStore>(adapter: &KvAdapter<S>) {
    let suffix = unique_suffix();
    let identifier = format!("carol-{suffix}@example.com");
    let token = verification_for(&identifier, "4b1d3a7c9e");
    adapter.create_verification_token(token.clone()).await.unwrap();

    assert_eq!(
        adapter
            .use_verification_token(&identifier, "4b1d3a7c9f")
            .await
            .unwrap(),
        None
    );
    assert_eq!(
        adapter
            .use_verification_token(&identifier, "4b1d3a7c9e")
            .await
            .unwrap(),
        Some(token)
    );
    assert_eq!(
        adapter
            .use_verification_token(&identifier, "4b1d3a7c9e")
            .await
            .unwrap(),
        None
    );
}

/// Identifiers that would make keys ambiguous are refused
pub async fn invalid_identifiers<S: KvStore>(adapter: &KvAdapter<S>) {
    let dyn_adapter: &dyn AuthAdapter = adapter;

    assert!(matches!(
        dyn_adapter.get_user("a:b").await,
        Err(AdapterError::InvalidKey(_))
    ));
    assert!(matches!(
        dyn_adapter
            .get_user_by_account(&AccountRef::new("git:hub", "1"))
            .await,
        Err(AdapterError::InvalidKey(_))
    ));
    assert!(matches!(
        dyn_adapter.use_verification_token("", "t").await,
        Err(AdapterError::InvalidKey(_))
    ));
}
