//! Collar lending simulation.
//!
//! Walks the vault lifecycle end to end: registry setup, provider deposits,
//! opening a vault, settling above and below the entry price, and rolling.

use collar_core::*;
use rust_decimal_macros::dec;
use std::error::Error;
use tracing_subscriber::EnvFilter;

const OWNER: AccountId = AccountId(0x01);
const MANAGER: AccountId = AccountId(0x10);
const POOL: AccountId = AccountId(0x20);
const ADAPTER: AccountId = AccountId(0x30);
const ROUTER: AccountId = AccountId(0x40);
const FACTORY: AccountId = AccountId(0x41);
const BORROWER: AccountId = AccountId(0xb0);
const PROVIDER: AccountId = AccountId(0xc0);

const USDC: AssetId = AssetId(1);
const WETH: AssetId = AssetId(2);

const DAY: u64 = 24 * 60 * 60;
const T0: u64 = 1_700_000_000;
const CALL_TICK: u32 = 11_000;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("Collar Lending Simulation");
    println!("One pool, 90% LTV, 3 day collars, call strike at 110%\n");

    scenario_1_open_vault()?;
    scenario_2_settle_above_entry()?;
    scenario_3_settle_below_entry()?;
    scenario_4_roll()?;

    println!("\nAll simulations completed successfully.");
    Ok(())
}

/// Registry, pool and router wired the way a deployment would be.
fn deploy() -> Result<VaultManager, Box<dyn Error>> {
    let mut registry = Registry::new(OWNER);
    registry.add_supported_cash_asset(OWNER, USDC)?;
    registry.add_supported_collateral_asset(OWNER, WETH)?;
    registry.add_collar_duration(OWNER, 3 * DAY)?;
    registry.add_ltv(OWNER, Bps(9000))?;
    registry.set_counterparty_authorization(OWNER, MANAGER, true, true)?;
    registry.set_counterparty_authorization(OWNER, POOL, false, true)?;

    let router = FixedRateRouter::new(ROUTER, FACTORY).with_rate(WETH, USDC, dec!(2000));
    let adapter = SwapAdapter::new(ADAPTER, Box::new(router), 3000)?;

    let mut manager = VaultManager::new(MANAGER, ManagerConfig::default(), registry, adapter)?;
    manager.set_time(Timestamp::from_secs(T0));
    manager.add_pool(LiquidityPool::new(PoolId(1), POOL, USDC, MANAGER, PoolConfig::default())?)?;

    let ledger = manager.ledger_mut();
    ledger.mint(USDC, ROUTER, Amount::from(1_000_000))?;
    ledger.mint(USDC, PROVIDER, Amount::from(10_000))?;
    ledger.mint(WETH, BORROWER, Amount::from(20))?;

    manager.deposit_to_ticks(PoolId(1), PROVIDER, PROVIDER, &[Amount::from(5000)], &[CALL_TICK])?;
    manager
        .registry_mut()
        .record_price(OWNER, WETH, USDC, Timestamp::from_secs(T0), Price::new_unchecked(dec!(2000)))?;
    Ok(manager)
}

fn open(manager: &mut VaultManager) -> Result<VaultId, ManagerError> {
    manager.open_vault(
        BORROWER,
        AssetSpecifiers {
            collateral_asset: WETH,
            collateral_amount: Amount::from(10),
            cash_asset: USDC,
            min_cash_amount: Amount::from(19_000),
            swap_data: Vec::new(),
        },
        CollarOpts {
            expiry: Timestamp::from_secs(T0 + 3 * DAY),
            ltv: Bps(9000),
        },
        LiquidityOpts {
            pool_id: PoolId(1),
            ticks: vec![CALL_TICK],
            amounts: vec![Amount::from(2000)],
        },
    )
}

fn print_vault(manager: &VaultManager, vault_id: VaultId) {
    if let Some(vault) = manager.get_vault(vault_id) {
        println!(
            "  Vault {}: {:?}, cash {}, unlocked {}, locked {}, entry ${}",
            vault.id.0,
            vault.state,
            vault.cash_amount,
            vault.unlocked_cash_balance,
            vault.locked_cash_balance,
            vault.initial_price
        );
    }
}

fn print_pool(manager: &VaultManager) {
    if let Some(pool) = manager.pool(PoolId(1)) {
        let level = pool.tick(CALL_TICK);
        println!(
            "  Pool tick {}: deposited {}, locked {}, provider may withdraw {}",
            CALL_TICK,
            level.deposited,
            level.locked,
            pool.withdrawable(PROVIDER, CALL_TICK)
        );
    }
}

/// Swap 10 WETH to cash and lock the at-risk tenth against provider liquidity.
fn scenario_1_open_vault() -> Result<(), Box<dyn Error>> {
    println!("Scenario 1: Open Vault\n");

    let mut manager = deploy()?;
    print_pool(&manager);

    let vault_id = open(&mut manager)?;
    println!("  Borrower swaps 10 WETH at $2000 and opens vault {}", vault_id.0);
    print_vault(&manager, vault_id);
    print_pool(&manager);

    manager.withdraw_cash(BORROWER, vault_id, Amount::from(18_000))?;
    println!(
        "  Borrower withdraws the unlocked cash, wallet holds {} USDC",
        manager.ledger().balance_of(USDC, BORROWER)
    );

    let mismatch = manager.open_vault(
        BORROWER,
        AssetSpecifiers {
            collateral_asset: WETH,
            collateral_amount: Amount::from(1),
            cash_asset: USDC,
            min_cash_amount: Amount::zero(),
            swap_data: Vec::new(),
        },
        CollarOpts {
            expiry: Timestamp::from_secs(T0 + 3 * DAY),
            ltv: Bps(9000),
        },
        LiquidityOpts {
            pool_id: PoolId(1),
            ticks: vec![CALL_TICK],
            amounts: vec![Amount::from(100)],
        },
    );
    if let Err(e) = mismatch {
        println!("  Mis-sized lock rejected: {}", e);
    }
    println!("  Vault count: {}\n", manager.vault_count());
    Ok(())
}

/// Price ends between entry and the call: borrower gains, providers pay.
fn scenario_2_settle_above_entry() -> Result<(), Box<dyn Error>> {
    println!("Scenario 2: Settle Above Entry\n");

    let mut manager = deploy()?;
    let vault_id = open(&mut manager)?;

    manager
        .registry_mut()
        .record_price(OWNER, WETH, USDC, Timestamp::from_secs(T0 + 2 * DAY), Price::new_unchecked(dec!(2100)))?;
    manager.advance_time(3 * DAY);

    let result = manager.settle_vault(vault_id)?;
    println!(
        "  Settled at ${}: borrower gets {}, providers get {}",
        result.final_price, result.borrower_payout, result.provider_payout
    );
    print_vault(&manager, vault_id);
    print_pool(&manager);
    println!();
    Ok(())
}

/// Price ends between the put and entry: providers collect part of the locked cash.
fn scenario_3_settle_below_entry() -> Result<(), Box<dyn Error>> {
    println!("Scenario 3: Settle Below Entry\n");

    let mut manager = deploy()?;
    let vault_id = open(&mut manager)?;

    manager.advance_time(DAY);
    if let Err(e) = manager.settle_vault(vault_id) {
        println!("  Early settlement rejected: {}", e);
    }

    manager
        .registry_mut()
        .record_price(OWNER, WETH, USDC, Timestamp::from_secs(T0 + 2 * DAY), Price::new_unchecked(dec!(1900)))?;
    manager.advance_time(2 * DAY);

    let result = manager.settle_vault(vault_id)?;
    println!(
        "  Settled at ${}: borrower gets {}, providers get {}",
        result.final_price, result.borrower_payout, result.provider_payout
    );
    print_vault(&manager, vault_id);
    print_pool(&manager);
    println!();
    Ok(())
}

/// Close a vault a day in and reopen the whole cash position for another three days.
fn scenario_4_roll() -> Result<(), Box<dyn Error>> {
    println!("Scenario 4: Roll\n");

    let mut manager = deploy()?;
    let vault_id = open(&mut manager)?;

    manager
        .registry_mut()
        .record_price(OWNER, WETH, USDC, Timestamp::from_secs(T0 + DAY / 2), Price::new_unchecked(dec!(2100)))?;
    manager.advance_time(DAY);

    let now = manager.time();
    let rolled = manager.roll_vault(
        BORROWER,
        vault_id,
        RollOpts {
            collar: CollarOpts {
                expiry: now.plus(3 * DAY),
                ltv: Bps(9000),
            },
            ticks: vec![CALL_TICK],
            amounts: vec![Amount::from(2100)],
        },
    )?;
    println!(
        "  Rolled at ${} into vault {}, carrying {} cash",
        rolled.settlement.final_price, rolled.new_vault_id.0, rolled.carried_cash
    );
    print_vault(&manager, vault_id);
    print_vault(&manager, rolled.new_vault_id);
    print_pool(&manager);
    println!("  Manager events: {}", manager.events().events().len());
    Ok(())
}
