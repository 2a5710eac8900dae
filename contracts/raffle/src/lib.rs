//! Raffle Contract
//!
//! A recurring lottery: players pay a fixed entrance fee in a SEP-41 token to
//! join the current round; once the configured interval has elapsed and the
//! round holds at least one funded entry, any automation caller may trigger the
//! draw; a VRF coordinator delivers a random word asynchronously and the
//! contract pays the entire pool to one player, then reopens for the next
//! round.
//!
//! ## Round Flow
//! 1. Players call `enter` while the round is `Open` → tokens transfer in,
//!    one entry slot per call (repeat entries allowed).
//! 2. A keeper polls `check_upkeep` (read-only) and calls `perform_upkeep`
//!    when it reports ready → the round flips to `Calculating` and a
//!    randomness request is submitted to the coordinator.
//! 3. The coordinator calls `fulfill_random_words` back into this contract →
//!    the winner is drawn from the entry list frozen at trigger time, the
//!    pool pays out, and the round returns to `Open`.
//!
//! ## State Model
//! `RaffleState` is a tagged variant: `Open` carries nothing, `Calculating`
//! carries the pending request id. One field, one invariant — the round is
//! open exactly when no request is outstanding, and only one request can ever
//! be in flight.
//!
//! An unfulfilled request leaves the round in `Calculating` indefinitely;
//! there is no timeout or cancel path. Liveness of the draw is the oracle
//! operator's responsibility.
//!
//! ## Storage Strategy
//! - `instance()`: Admin, Coordinator, Token, EntranceFee, Interval. Immutable
//!   contract config; all instance keys share one ledger entry and TTL.
//! - `persistent()`: State, Players, PoolBalance, LastTimestamp, RecentWinner.
//!   Round state rewritten every cycle, each entry with its own TTL bumped on
//!   every write so an active round never expires mid-draw.
#![no_std]
#![allow(unexpected_cfgs)]

use soroban_sdk::{
    contract, contracterror, contractevent, contractimpl, contracttype, token::TokenClient,
    Address, Bytes, Env, IntoVal, Val, Vec,
};

use raffle_vrf_coordinator::VrfCoordinatorClient;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Persistent storage TTL in ledgers (~30 days at 5 s/ledger).
/// Bumped on every persistent write so round state never expires mid-cycle.
pub const PERSISTENT_BUMP_LEDGERS: u32 = 518_400;

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
    /// `entrance_fee <= 0` or `interval == 0` at init.
    InvalidConfig        = 4,
    /// `amount < entrance_fee` on `enter`.
    InsufficientPayment  = 5,
    /// `enter` while the round is `Calculating`.
    RaffleNotOpen        = 6,
    /// `perform_upkeep` while the readiness predicate does not hold.
    UpkeepNotNeeded      = 7,
    /// Callback with a request id that is not the outstanding one — stale,
    /// foreign, or already settled.
    UnknownRequest       = 8,
    /// `get_player` index past the end of the entry list.
    PlayerNotFound       = 9,
    /// The pool transfer to the winner failed; the settlement reverts whole.
    PayoutTransferFailed = 10,
    Overflow             = 11,
}

// ---------------------------------------------------------------------------
// Storage Types
// ---------------------------------------------------------------------------

/// Discriminants for all storage keys.
///
/// Instance keys (Admin..Interval): contract config, one ledger entry.
/// Persistent keys (State..RecentWinner): per-round mutable state, each with
/// its own TTL.
#[contracttype]
pub enum DataKey {
    // --- instance() ---
    Admin,
    Coordinator,
    Token,
    EntranceFee,
    Interval,
    // --- persistent() ---
    State,
    /// Entry slots in insertion order; the same player may hold several.
    Players,
    /// Sum of all payments taken in since the last payout.
    PoolBalance,
    /// Timestamp of the last settlement (or of init, before the first draw).
    LastTimestamp,
    /// Winner of the most recent settled round; absent until the first draw.
    RecentWinner,
}

/// Round lifecycle state.
///
/// `Calculating` carries the id of the outstanding randomness request, so
/// "open" and "request pending" cannot disagree.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RaffleState {
    Open,
    Calculating(u64),
}

/// Snapshot returned by `check_upkeep`.
///
/// `upkeep_needed` is the conjunction of the four predicate fields; the
/// counters are informational for keepers and dashboards. Holding this struct
/// grants no authority — `perform_upkeep` re-evaluates from storage.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UpkeepStatus {
    pub upkeep_needed: bool,
    pub is_open: bool,
    pub has_players: bool,
    pub has_balance: bool,
    pub interval_elapsed: bool,
    pub num_players: u32,
    pub pool_balance: i128,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[contractevent]
pub struct RaffleEntered {
    #[topic]
    pub player: Address,
    pub amount: i128,
}

#[contractevent]
pub struct RaffleWinnerRequested {
    #[topic]
    pub request_id: u64,
}

#[contractevent]
pub struct WinnerPicked {
    #[topic]
    pub winner: Address,
    pub request_id: u64,
    pub amount: i128,
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

#[contract]
pub struct Raffle;

#[contractimpl]
impl Raffle {
    // -----------------------------------------------------------------------
    // init
    // -----------------------------------------------------------------------

    /// Initialize the raffle. May only be called once; config is immutable
    /// afterwards.
    ///
    /// `coordinator` is the VRF coordinator contract this raffle requests
    /// randomness from — it is also the only address whose
    /// `fulfill_random_words` callback is accepted. `token` must be a deployed
    /// SEP-41 contract; all entry fees and payouts move through it.
    /// `interval` is the minimum round length in seconds.
    pub fn init(
        env: Env,
        admin: Address,
        coordinator: Address,
        token: Address,
        entrance_fee: i128,
        interval: u64,
    ) -> Result<(), Error> {
        if env.storage().instance().has(&DataKey::Admin) {
            return Err(Error::AlreadyInitialized);
        }

        if entrance_fee <= 0 || interval == 0 {
            return Err(Error::InvalidConfig);
        }

        admin.require_auth();

        env.storage().instance().set(&DataKey::Admin, &admin);
        env.storage().instance().set(&DataKey::Coordinator, &coordinator);
        env.storage().instance().set(&DataKey::Token, &token);
        env.storage().instance().set(&DataKey::EntranceFee, &entrance_fee);
        env.storage().instance().set(&DataKey::Interval, &interval);

        // Seed round state so downstream reads never encounter None.
        set_persistent(&env, DataKey::State, &RaffleState::Open);
        set_persistent(&env, DataKey::Players, &Vec::<Address>::new(&env));
        set_persistent(&env, DataKey::PoolBalance, &0i128);
        set_persistent(&env, DataKey::LastTimestamp, &env.ledger().timestamp());

        Ok(())
    }

    // -----------------------------------------------------------------------
    // enter
    // -----------------------------------------------------------------------

    /// Enter the current round. One entry slot per call — calling again adds
    /// another slot and another chance to win.
    ///
    /// The full `amount` transfers into the pool; paying above the entrance
    /// fee is accepted and not refunded, it simply grows the pot.
    pub fn enter(env: Env, player: Address, amount: i128) -> Result<(), Error> {
        require_initialized(&env)?;

        let entrance_fee: i128 = env
            .storage()
            .instance()
            .get(&DataKey::EntranceFee)
            .ok_or(Error::NotInitialized)?;
        if amount < entrance_fee {
            return Err(Error::InsufficientPayment);
        }

        if get_state(&env) != RaffleState::Open {
            return Err(Error::RaffleNotOpen);
        }

        player.require_auth();

        let token = get_token(&env);
        TokenClient::new(&env, &token).transfer(
            &player,
            env.current_contract_address(),
            &amount,
        );

        let mut players = get_players(&env);
        players.push_back(player.clone());
        set_persistent(&env, DataKey::Players, &players);

        let new_pool = get_pool_balance(&env)
            .checked_add(amount)
            .ok_or(Error::Overflow)?;
        set_persistent(&env, DataKey::PoolBalance, &new_pool);

        RaffleEntered { player, amount }.publish(&env);

        Ok(())
    }

    // -----------------------------------------------------------------------
    // check_upkeep
    // -----------------------------------------------------------------------

    /// Report whether the round is ready to draw. Read-only; callable in any
    /// state and at any cadence.
    ///
    /// Ready means: round is `Open`, at least one entry exists, the pool is
    /// funded, and `interval` seconds have passed since the last settlement.
    pub fn check_upkeep(env: Env) -> Result<UpkeepStatus, Error> {
        require_initialized(&env)?;
        Ok(evaluate_upkeep(&env))
    }

    // -----------------------------------------------------------------------
    // perform_upkeep
    // -----------------------------------------------------------------------

    /// Trigger the draw. Permissionless — readiness is re-evaluated from
    /// storage, so a caller cannot fake it with a stale `check_upkeep` result.
    /// `_perform_data` is the keeper-supplied context blob; it is accepted for
    /// keeper interface parity and carries no authority.
    ///
    /// Flips the round to `Calculating`, submits a randomness request to the
    /// coordinator, and returns the assigned request id. Concurrent keepers
    /// serialize on the ledger; the first wins and the rest get
    /// `UpkeepNotNeeded` (the round is no longer `Open`).
    pub fn perform_upkeep(env: Env, _perform_data: Bytes) -> Result<u64, Error> {
        require_initialized(&env)?;

        if !evaluate_upkeep(&env).upkeep_needed {
            return Err(Error::UpkeepNotNeeded);
        }

        let coordinator: Address = env
            .storage()
            .instance()
            .get(&DataKey::Coordinator)
            .ok_or(Error::NotInitialized)?;
        let request_id = VrfCoordinatorClient::new(&env, &coordinator)
            .request_random_words(&env.current_contract_address());

        set_persistent(&env, DataKey::State, &RaffleState::Calculating(request_id));

        RaffleWinnerRequested { request_id }.publish(&env);

        Ok(request_id)
    }

    // -----------------------------------------------------------------------
    // fulfill_random_words
    // -----------------------------------------------------------------------

    /// Settle the round with the coordinator's random word. Coordinator only.
    ///
    /// The winner index is `random_word % num_players` over the entry list as
    /// it stood at `perform_upkeep` time — `enter` requires `Open`, so no slot
    /// can be added or removed while the request is outstanding.
    ///
    /// Settlement is all-or-nothing: any error return (including a failed
    /// pool transfer) reverts the invocation, leaving the round `Calculating`
    /// with the request still outstanding and the delivery retriable. A
    /// replay of an already-settled id finds the round `Open` again and gets
    /// `UnknownRequest`.
    pub fn fulfill_random_words(
        env: Env,
        coordinator: Address,
        request_id: u64,
        random_word: u64,
    ) -> Result<(), Error> {
        require_initialized(&env)?;
        require_coordinator(&env, &coordinator)?;

        match get_state(&env) {
            RaffleState::Calculating(pending) if pending == request_id => {}
            _ => return Err(Error::UnknownRequest),
        }

        let players = get_players(&env);
        let num_players = players.len();
        let winner_index = (random_word % num_players as u64) as u32;
        let winner = players
            .get(winner_index)
            .expect("Raffle: no players while calculating");

        let prize = get_pool_balance(&env);

        // Reset the round before the external token transfer (reentrancy
        // safety); an error return reverts all of it together.
        set_persistent(&env, DataKey::State, &RaffleState::Open);
        set_persistent(&env, DataKey::Players, &Vec::<Address>::new(&env));
        set_persistent(&env, DataKey::PoolBalance, &0i128);
        set_persistent(&env, DataKey::LastTimestamp, &env.ledger().timestamp());
        set_persistent(&env, DataKey::RecentWinner, &winner);

        let token = get_token(&env);
        if TokenClient::new(&env, &token)
            .try_transfer(&env.current_contract_address(), &winner, &prize)
            .is_err()
        {
            return Err(Error::PayoutTransferFailed);
        }

        WinnerPicked { winner, request_id, amount: prize }.publish(&env);

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Query surface
    // -----------------------------------------------------------------------

    /// Current round state; `Calculating` includes the pending request id.
    pub fn get_raffle_state(env: Env) -> Result<RaffleState, Error> {
        require_initialized(&env)?;
        Ok(get_state(&env))
    }

    pub fn get_entrance_fee(env: Env) -> Result<i128, Error> {
        require_initialized(&env)?;
        env.storage()
            .instance()
            .get(&DataKey::EntranceFee)
            .ok_or(Error::NotInitialized)
    }

    /// Minimum round length in seconds.
    pub fn get_interval(env: Env) -> Result<u64, Error> {
        require_initialized(&env)?;
        env.storage()
            .instance()
            .get(&DataKey::Interval)
            .ok_or(Error::NotInitialized)
    }

    /// Entry slot at `index`, in insertion order.
    pub fn get_player(env: Env, index: u32) -> Result<Address, Error> {
        require_initialized(&env)?;
        get_players(&env).get(index).ok_or(Error::PlayerNotFound)
    }

    /// Number of entry slots in the current round (repeat entries counted).
    pub fn get_num_players(env: Env) -> Result<u32, Error> {
        require_initialized(&env)?;
        Ok(get_players(&env).len())
    }

    pub fn get_players(env: Env) -> Result<Vec<Address>, Error> {
        require_initialized(&env)?;
        Ok(get_players(&env))
    }

    pub fn get_pool_balance(env: Env) -> Result<i128, Error> {
        require_initialized(&env)?;
        Ok(get_pool_balance(&env))
    }

    /// Timestamp of the last settlement, or of init before the first draw.
    pub fn get_last_timestamp(env: Env) -> Result<u64, Error> {
        require_initialized(&env)?;
        Ok(get_last_timestamp(&env))
    }

    /// Winner of the most recent settled round; `None` before the first draw.
    pub fn get_recent_winner(env: Env) -> Result<Option<Address>, Error> {
        require_initialized(&env)?;
        Ok(env.storage().persistent().get(&DataKey::RecentWinner))
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

/// Verify that `caller` is the configured coordinator and authorized the
/// invocation. Under contract-invoker auth this passes when the coordinator
/// contract calls back directly.
fn require_coordinator(env: &Env, caller: &Address) -> Result<(), Error> {
    let coordinator: Address = env
        .storage()
        .instance()
        .get(&DataKey::Coordinator)
        .ok_or(Error::NotInitialized)?;
    caller.require_auth();
    if caller != &coordinator {
        return Err(Error::NotAuthorized);
    }
    Ok(())
}

/// Evaluate the draw-readiness predicate against current storage.
fn evaluate_upkeep(env: &Env) -> UpkeepStatus {
    let is_open = get_state(env) == RaffleState::Open;
    let num_players = get_players(env).len();
    let pool_balance = get_pool_balance(env);
    let interval: u64 = env
        .storage()
        .instance()
        .get(&DataKey::Interval)
        .expect("Raffle: interval not set");

    let has_players = num_players > 0;
    let has_balance = pool_balance > 0;
    let elapsed = env.ledger().timestamp().saturating_sub(get_last_timestamp(env));
    let interval_elapsed = elapsed >= interval;

    UpkeepStatus {
        upkeep_needed: is_open && has_players && has_balance && interval_elapsed,
        is_open,
        has_players,
        has_balance,
        interval_elapsed,
        num_players,
        pool_balance,
    }
}

fn get_token(env: &Env) -> Address {
    env.storage()
        .instance()
        .get(&DataKey::Token)
        .expect("Raffle: token not set")
}

fn get_state(env: &Env) -> RaffleState {
    env.storage()
        .persistent()
        .get(&DataKey::State)
        .unwrap_or(RaffleState::Open)
}

fn get_players(env: &Env) -> Vec<Address> {
    env.storage()
        .persistent()
        .get(&DataKey::Players)
        .unwrap_or(Vec::new(env))
}

fn get_pool_balance(env: &Env) -> i128 {
    env.storage()
        .persistent()
        .get(&DataKey::PoolBalance)
        .unwrap_or(0)
}

fn get_last_timestamp(env: &Env) -> u64 {
    env.storage()
        .persistent()
        .get(&DataKey::LastTimestamp)
        .unwrap_or(0)
}

/// Write a value to persistent storage and extend its TTL in one step.
fn set_persistent<V: IntoVal<Env, Val>>(env: &Env, key: DataKey, value: &V) {
    env.storage().persistent().set(&key, value);
    env.storage()
        .persistent()
        .extend_ttl(&key, PERSISTENT_BUMP_LEDGERS, PERSISTENT_BUMP_LEDGERS);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
