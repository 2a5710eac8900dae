#![cfg(test)]

use super::*;
use soroban_sdk::{contract, contractimpl, symbol_short, testutils::Address as _, Address, Env};

// -------------------------------------------------------------------
// Test consumer
// -------------------------------------------------------------------

/// Minimal consumer implementing the coordinator's callback interface.
/// Records the last delivered (request_id, random_word) pair.
#[contract]
pub struct TestConsumer;

#[contractimpl]
impl TestConsumer {
    pub fn fulfill_random_words(env: Env, coordinator: Address, request_id: u64, random_word: u64) {
        coordinator.require_auth();
        env.storage()
            .instance()
            .set(&symbol_short!("LAST"), &(request_id, random_word));
    }

    pub fn last_delivery(env: Env) -> Option<(u64, u64)> {
        env.storage().instance().get(&symbol_short!("LAST"))
    }
}

// -------------------------------------------------------------------
// Helpers
// -------------------------------------------------------------------

struct Setup<'a> {
    client: VrfCoordinatorClient<'a>,
    consumer_client: TestConsumerClient<'a>,
    admin: Address,
    oracle: Address,
    consumer_id: Address,
}

fn setup(env: &Env) -> Setup<'_> {
    let admin = Address::generate(env);
    let oracle = Address::generate(env);

    let coordinator_id = env.register(VrfCoordinator, ());
    let client = VrfCoordinatorClient::new(env, &coordinator_id);

    let consumer_id = env.register(TestConsumer, ());
    let consumer_client = TestConsumerClient::new(env, &consumer_id);

    env.mock_all_auths();

    client.init(&admin, &oracle);
    client.add_consumer(&admin, &consumer_id);

    Setup {
        client,
        consumer_client,
        admin,
        oracle,
        consumer_id,
    }
}

// -------------------------------------------------------------------
// init
// -------------------------------------------------------------------

#[test]
fn test_init_rejects_reinit() {
    let env = Env::default();
    let s = setup(&env);
    env.mock_all_auths();

    let result = s.client.try_init(&s.admin, &s.oracle);
    assert!(result.is_err());
}

#[test]
fn test_request_before_init_rejected() {
    let env = Env::default();
    let coordinator_id = env.register(VrfCoordinator, ());
    let client = VrfCoordinatorClient::new(&env, &coordinator_id);
    env.mock_all_auths();

    let consumer = Address::generate(&env);
    let result = client.try_request_random_words(&consumer);
    assert!(result.is_err());
}

// -------------------------------------------------------------------
// consumer whitelist
// -------------------------------------------------------------------

#[test]
fn test_request_from_unlisted_consumer_rejected() {
    let env = Env::default();
    let s = setup(&env);
    env.mock_all_auths();

    let stranger = Address::generate(&env);
    let result = s.client.try_request_random_words(&stranger);
    assert_eq!(result, Err(Ok(Error::UnauthorizedConsumer)));
}

#[test]
fn test_removed_consumer_cannot_request() {
    let env = Env::default();
    let s = setup(&env);
    env.mock_all_auths();

    s.client.remove_consumer(&s.admin, &s.consumer_id);

    let result = s.client.try_request_random_words(&s.consumer_id);
    assert_eq!(result, Err(Ok(Error::UnauthorizedConsumer)));
}

#[test]
fn test_add_consumer_by_non_admin_rejected() {
    let env = Env::default();
    let s = setup(&env);
    env.mock_all_auths();

    let stranger = Address::generate(&env);
    let result = s.client.try_add_consumer(&stranger, &stranger);
    assert!(result.is_err());
}

// -------------------------------------------------------------------
// request ids
// -------------------------------------------------------------------

#[test]
fn test_request_ids_start_at_one_and_increase() {
    let env = Env::default();
    let s = setup(&env);
    env.mock_all_auths();

    assert_eq!(s.client.request_random_words(&s.consumer_id), 1);
    assert_eq!(s.client.request_random_words(&s.consumer_id), 2);
    assert_eq!(s.client.request_random_words(&s.consumer_id), 3);
}

#[test]
fn test_request_id_counter_overflow_rejected() {
    let env = Env::default();
    let s = setup(&env);
    env.mock_all_auths();

    env.as_contract(&s.client.address, || {
        env.storage()
            .instance()
            .set(&DataKey::NextRequestId, &u64::MAX);
    });

    let result = s.client.try_request_random_words(&s.consumer_id);
    assert_eq!(result, Err(Ok(Error::Overflow)));
}

#[test]
fn test_pending_consumer_recorded() {
    let env = Env::default();
    let s = setup(&env);
    env.mock_all_auths();

    let id = s.client.request_random_words(&s.consumer_id);
    assert_eq!(s.client.get_pending_consumer(&id), s.consumer_id);
}

// -------------------------------------------------------------------
// fulfillment
// -------------------------------------------------------------------

#[test]
fn test_fulfill_delivers_to_consumer() {
    let env = Env::default();
    let s = setup(&env);
    env.mock_all_auths();

    let id = s.client.request_random_words(&s.consumer_id);
    s.client.fulfill_random_words(&s.oracle, &id, &777u64);

    assert_eq!(s.consumer_client.last_delivery(), Some((id, 777u64)));
}

#[test]
fn test_fulfill_by_non_oracle_rejected() {
    let env = Env::default();
    let s = setup(&env);
    env.mock_all_auths();

    let id = s.client.request_random_words(&s.consumer_id);

    let stranger = Address::generate(&env);
    let result = s.client.try_fulfill_random_words(&stranger, &id, &1u64);
    assert_eq!(result, Err(Ok(Error::NotAuthorized)));
}

#[test]
fn test_fulfill_unknown_id_rejected() {
    let env = Env::default();
    let s = setup(&env);
    env.mock_all_auths();

    let result = s.client.try_fulfill_random_words(&s.oracle, &99u64, &1u64);
    assert_eq!(result, Err(Ok(Error::UnknownRequest)));
}

#[test]
fn test_fulfill_same_id_twice_rejected() {
    let env = Env::default();
    let s = setup(&env);
    env.mock_all_auths();

    let id = s.client.request_random_words(&s.consumer_id);
    s.client.fulfill_random_words(&s.oracle, &id, &42u64);

    let result = s.client.try_fulfill_random_words(&s.oracle, &id, &42u64);
    assert_eq!(result, Err(Ok(Error::UnknownRequest)));

    // The pending entry is gone.
    let pending = s.client.try_get_pending_consumer(&id);
    assert_eq!(pending, Err(Ok(Error::UnknownRequest)));
}
