//! Raffle VRF Coordinator Contract
//!
//! On-chain half of the randomness oracle, implementing a two-phase
//! request/fulfill model with a callback into the consumer:
//!
//! 1. A whitelisted consumer contract calls `request_random_words` and
//!    receives a monotonically increasing `request_id`.
//! 2. An off-chain oracle service observes the `RandomWordsRequested` event,
//!    produces a random word, and calls `fulfill_random_words`.
//! 3. The coordinator removes the pending entry and invokes
//!    `fulfill_random_words(coordinator, request_id, random_word)` on the
//!    consumer contract, which correlates the id against its own pending
//!    request.
//!
//! Each `request_id` can be fulfilled at most once: fulfillment deletes the
//! pending entry, so a redelivery finds nothing and returns `UnknownRequest`.
//!
//! ## Consumer interface
//! A consumer must export:
//!
//!   `fulfill_random_words(coordinator: Address, request_id: u64, random_word: u64)`
//!
//! and should authenticate the call with `coordinator.require_auth()`, which
//! passes under contract-invoker auth when this coordinator is the direct
//! caller.
//!
//! ## Storage Strategy
//! - `instance()`: Admin, Oracle, NextRequestId. Fixed contract-level config
//!   plus one small counter.
//! - `persistent()`: Consumer whitelist entries and PendingRequest entries,
//!   each a separate ledger entry with TTL bumped on every write so an open
//!   request never expires before the oracle answers.
#![no_std]
#![allow(unexpected_cfgs)]

use soroban_sdk::{
    contract, contracterror, contractevent, contractimpl, contracttype, vec, Address, Env,
    IntoVal, Symbol,
};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Persistent storage TTL in ledgers (~30 days at 5 s/ledger).
/// Bumped on every persistent write so no request expires while pending.
pub const PERSISTENT_BUMP_LEDGERS: u32 = 518_400;

/// Name of the callback function invoked on the consumer at fulfillment.
const FULFILL_FN: &str = "fulfill_random_words";

// ---------------------------------------------------------------------------
// Error Types
// ---------------------------------------------------------------------------

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Error {
    AlreadyInitialized   = 1,
    NotInitialized       = 2,
    NotAuthorized        = 3,
    /// The `consumer` passed to `request_random_words` is not whitelisted.
    UnauthorizedConsumer = 4,
    /// No pending request exists for this `request_id` (never issued, or
    /// already fulfilled).
    UnknownRequest       = 5,
    Overflow             = 6,
}

// ---------------------------------------------------------------------------
// Storage Types
// ---------------------------------------------------------------------------

/// All storage key discriminants.
///
/// Instance keys (Admin, Oracle, NextRequestId): contract config and the id
/// counter. Persistent keys: per-consumer whitelist entries and per-request
/// pending entries.
#[contracttype]
pub enum DataKey {
    // --- instance() ---
    Admin,
    Oracle,
    /// The id the next `request_random_words` call will be assigned.
    NextRequestId,
    // --- persistent() ---
    /// Presence flag for whitelisted consumer contract addresses.
    Consumer(Address),
    /// Consumer awaiting fulfillment, keyed by request id.
    PendingRequest(u64),
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[contractevent]
pub struct RandomWordsRequested {
    #[topic]
    pub request_id: u64,
    #[topic]
    pub consumer: Address,
}

#[contractevent]
pub struct RandomWordsFulfilled {
    #[topic]
    pub request_id: u64,
    pub consumer: Address,
    pub random_word: u64,
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

#[contract]
pub struct VrfCoordinator;

#[contractimpl]
impl VrfCoordinator {
    // -----------------------------------------------------------------------
    // init
    // -----------------------------------------------------------------------

    /// Initialize the coordinator. May only be called once.
    ///
    /// `oracle` is the sole address permitted to call `fulfill_random_words`.
    /// It is expected to be a backend service watching `RandomWordsRequested`
    /// events.
    pub fn init(env: Env, admin: Address, oracle: Address) -> Result<(), Error> {
        if env.storage().instance().has(&DataKey::Admin) {
            return Err(Error::AlreadyInitialized);
        }

        admin.require_auth();

        env.storage().instance().set(&DataKey::Admin, &admin);
        env.storage().instance().set(&DataKey::Oracle, &oracle);
        env.storage().instance().set(&DataKey::NextRequestId, &1u64);

        Ok(())
    }

    // -----------------------------------------------------------------------
    // add_consumer / remove_consumer
    // -----------------------------------------------------------------------

    /// Add a consumer contract to the whitelist. Admin only.
    pub fn add_consumer(env: Env, admin: Address, consumer: Address) -> Result<(), Error> {
        require_initialized(&env)?;
        require_admin(&env, &admin)?;

        let key = DataKey::Consumer(consumer);
        env.storage().persistent().set(&key, &());
        env.storage()
            .persistent()
            .extend_ttl(&key, PERSISTENT_BUMP_LEDGERS, PERSISTENT_BUMP_LEDGERS);

        Ok(())
    }

    /// Remove a consumer contract from the whitelist. Admin only.
    ///
    /// Requests already pending for this consumer remain fulfillable.
    pub fn remove_consumer(env: Env, admin: Address, consumer: Address) -> Result<(), Error> {
        require_initialized(&env)?;
        require_admin(&env, &admin)?;

        env.storage().persistent().remove(&DataKey::Consumer(consumer));

        Ok(())
    }

    // -----------------------------------------------------------------------
    // request_random_words
    // -----------------------------------------------------------------------

    /// Submit a randomness request. Only whitelisted consumers may call this.
    ///
    /// Returns the assigned `request_id`. Ids start at 1 and increase by one
    /// per request, so a consumer can treat 0 as "no request".
    pub fn request_random_words(env: Env, consumer: Address) -> Result<u64, Error> {
        require_initialized(&env)?;

        consumer.require_auth();

        if !env
            .storage()
            .persistent()
            .has(&DataKey::Consumer(consumer.clone()))
        {
            return Err(Error::UnauthorizedConsumer);
        }

        let request_id: u64 = env
            .storage()
            .instance()
            .get(&DataKey::NextRequestId)
            .unwrap_or(1);
        let next_id = request_id.checked_add(1).ok_or(Error::Overflow)?;
        env.storage()
            .instance()
            .set(&DataKey::NextRequestId, &next_id);

        let key = DataKey::PendingRequest(request_id);
        env.storage().persistent().set(&key, &consumer);
        env.storage()
            .persistent()
            .extend_ttl(&key, PERSISTENT_BUMP_LEDGERS, PERSISTENT_BUMP_LEDGERS);

        RandomWordsRequested { request_id, consumer }.publish(&env);

        Ok(request_id)
    }

    // -----------------------------------------------------------------------
    // fulfill_random_words
    // -----------------------------------------------------------------------

    /// Deliver a random word for a pending request. Oracle only.
    ///
    /// The pending entry is removed before the consumer callback, so the same
    /// `request_id` cannot be delivered twice even if the consumer re-enters.
    /// A failing consumer callback aborts the whole invocation, leaving the
    /// request pending and the delivery retriable.
    pub fn fulfill_random_words(
        env: Env,
        oracle: Address,
        request_id: u64,
        random_word: u64,
    ) -> Result<(), Error> {
        require_initialized(&env)?;
        require_oracle(&env, &oracle)?;

        let key = DataKey::PendingRequest(request_id);
        let consumer: Address = env
            .storage()
            .persistent()
            .get(&key)
            .ok_or(Error::UnknownRequest)?;

        env.storage().persistent().remove(&key);

        env.invoke_contract::<()>(
            &consumer,
            &Symbol::new(&env, FULFILL_FN),
            vec![
                &env,
                env.current_contract_address().into_val(&env),
                request_id.into_val(&env),
                random_word.into_val(&env),
            ],
        );

        RandomWordsFulfilled { request_id, consumer, random_word }.publish(&env);

        Ok(())
    }

    // -----------------------------------------------------------------------
    // get_pending_consumer
    // -----------------------------------------------------------------------

    /// Return the consumer awaiting fulfillment for `request_id`.
    ///
    /// Returns `UnknownRequest` if the request was never issued or has
    /// already been fulfilled.
    pub fn get_pending_consumer(env: Env, request_id: u64) -> Result<Address, Error> {
        require_initialized(&env)?;

        env.storage()
            .persistent()
            .get(&DataKey::PendingRequest(request_id))
            .ok_or(Error::UnknownRequest)
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn require_initialized(env: &Env) -> Result<(), Error> {
    if !env.storage().instance().has(&DataKey::Admin) {
        return Err(Error::NotInitialized);
    }
    Ok(())
}

/// Verify that `caller` is the stored admin and has signed the invocation.
fn require_admin(env: &Env, caller: &Address) -> Result<(), Error> {
    let admin: Address = env
        .storage()
        .instance()
        .get(&DataKey::Admin)
        .ok_or(Error::NotInitialized)?;
    caller.require_auth();
    if caller != &admin {
        return Err(Error::NotAuthorized);
    }
    Ok(())
}

/// Verify that `caller` is the stored oracle and has signed the invocation.
fn require_oracle(env: &Env, caller: &Address) -> Result<(), Error> {
    let oracle: Address = env
        .storage()
        .instance()
        .get(&DataKey::Oracle)
        .ok_or(Error::NotInitialized)?;
    caller.require_auth();
    if caller != &oracle {
        return Err(Error::NotAuthorized);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test;
