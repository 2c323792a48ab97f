//! Conversions between basis points, tick indices and absolute prices.
//!
//! A tick is a basis-point level divided by the pool's scale factor, so with a
//! scale factor of 10 tick 1000 means 100% of the unit price and tick 1100
//! means 110%. Everything here truncates toward zero; collar strikes are
//! quantized to the scale factor before they reach the pool.

use crate::types::BPS_DENOMINATOR;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TickMathError {
    #[error("Scale factor {0} must be non-zero and divide 10000")]
    InvalidScaleFactor(u32),

    #[error("Arithmetic overflow")]
    Overflow,

    #[error("Unit price must be positive")]
    ZeroUnitPrice,
}

pub fn validate_scale_factor(scale_factor: u32) -> Result<(), TickMathError> {
    if scale_factor == 0 || BPS_DENOMINATOR % scale_factor != 0 {
        return Err(TickMathError::InvalidScaleFactor(scale_factor));
    }
    Ok(())
}

/// Number of ticks that make up 100% of the unit price.
pub fn ticks_per_unit(scale_factor: u32) -> Result<u32, TickMathError> {
    validate_scale_factor(scale_factor)?;
    Ok(BPS_DENOMINATOR / scale_factor)
}

pub fn bps_to_tick(bps: u32, scale_factor: u32) -> Result<u32, TickMathError> {
    validate_scale_factor(scale_factor)?;
    Ok(bps / scale_factor)
}

pub fn tick_to_bps(tick: u32, scale_factor: u32) -> Result<u32, TickMathError> {
    validate_scale_factor(scale_factor)?;
    tick.checked_mul(scale_factor).ok_or(TickMathError::Overflow)
}

/// `unit_price * tick / (10000 / scale_factor)`.
pub fn tick_to_price(tick: u32, scale_factor: u32, unit_price: Decimal) -> Result<Decimal, TickMathError> {
    let per_unit = ticks_per_unit(scale_factor)?;
    let scaled = unit_price
        .checked_mul(Decimal::from(tick))
        .ok_or(TickMathError::Overflow)?;
    scaled
        .checked_div(Decimal::from(per_unit))
        .ok_or(TickMathError::Overflow)
}

/// Inverse of [`tick_to_price`], rounding down.
pub fn price_to_tick(price: Decimal, scale_factor: u32, unit_price: Decimal) -> Result<u32, TickMathError> {
    let per_unit = ticks_per_unit(scale_factor)?;
    if unit_price <= Decimal::ZERO {
        return Err(TickMathError::ZeroUnitPrice);
    }
    let scaled = price
        .checked_mul(Decimal::from(per_unit))
        .ok_or(TickMathError::Overflow)?;
    let ticks = scaled
        .checked_div(unit_price)
        .ok_or(TickMathError::Overflow)?
        .floor();
    ticks.to_u32().ok_or(TickMathError::Overflow)
}
