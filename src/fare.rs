use crate::error::{invalid_input_error, Error};

/// Flat fare in currency units (₹) for trips under one kilometre.
pub const MINIMUM_FARE: i64 = 40;

/// Fare for the first full kilometre.
pub const FIRST_KM_FARE: i64 = 50;

/// Rate per kilometre beyond the first.
pub const PER_KM_RATE: i64 = 10;

/// Fares are rounded to the nearest multiple of this step.
pub const FARE_STEP: i64 = 10;

/// Fixed advance collected before a prebooked search starts.
pub const ADVANCE_FEE: i64 = 10;

/// Penalty for cancelling after a driver has been found.
pub const CANCELLATION_FEE: i64 = 5;

/// Platform cut on driver earnings.
pub const COMMISSION_RATE: f64 = 0.10;

/// Price a trip of the given distance.
///
/// Tiered: flat below one kilometre, flat at exactly one, then
/// `PER_KM_RATE` for every kilometre beyond the first. The result is
/// rounded half-up to the nearest `FARE_STEP`.
pub fn compute_fare(distance_km: f64) -> Result<i64, Error> {
    if distance_km < 0.0 || !distance_km.is_finite() {
        return Err(invalid_input_error());
    }

    let fare = if distance_km < 1.0 {
        MINIMUM_FARE as f64
    } else if distance_km == 1.0 {
        FIRST_KM_FARE as f64
    } else {
        FIRST_KM_FARE as f64 + (distance_km - 1.0) * PER_KM_RATE as f64
    };

    // rounded in f64 so an oversized distance saturates at the cast
    Ok(((fare / FARE_STEP as f64).round() * FARE_STEP as f64) as i64)
}

/// Commission owed on earnings. No rounding, that is the caller's call.
pub fn compute_commission(earnings: f64) -> f64 {
    earnings * COMMISSION_RATE
}

pub fn format_currency(amount: i64) -> String {
    format!("₹{}", amount)
}

#[test]
fn fare_reference_points() {
    assert_eq!(compute_fare(0.5).unwrap(), 40);
    assert_eq!(compute_fare(1.0).unwrap(), 50);
    assert_eq!(compute_fare(2.0).unwrap(), 60);
    assert_eq!(compute_fare(5.0).unwrap(), 90);
}

#[test]
fn fare_rounds_half_up_to_nearest_step() {
    // 50 + 0.2 * 10 = 52 rounds down, 50 + 0.5 * 10 = 55 rounds up
    assert_eq!(compute_fare(1.2).unwrap(), 50);
    assert_eq!(compute_fare(1.5).unwrap(), 60);
    assert_eq!(compute_fare(2.4).unwrap(), 60);
    assert_eq!(compute_fare(2.5).unwrap(), 70);
}

#[test]
fn fare_is_a_non_negative_multiple_of_the_step() {
    let mut previous = 0;

    for quarter_kms in 0..=120 {
        let distance_km = f64::from(quarter_kms) * 0.25;
        let fare = compute_fare(distance_km).unwrap();

        assert!(fare >= MINIMUM_FARE);
        assert_eq!(fare % FARE_STEP, 0);
        assert!(fare >= previous, "fare must not decrease with distance");

        previous = fare;
    }
}

#[test]
fn fare_is_deterministic() {
    assert_eq!(compute_fare(7.3).unwrap(), compute_fare(7.3).unwrap());
}

#[test]
fn negative_distance_is_rejected() {
    let err = compute_fare(-0.1).unwrap_err();
    assert_eq!(err.code, 101);
}

#[test]
fn non_finite_distance_is_rejected() {
    assert_eq!(compute_fare(f64::NAN).unwrap_err().code, 101);
    assert_eq!(compute_fare(f64::INFINITY).unwrap_err().code, 101);
    assert_eq!(compute_fare(f64::NEG_INFINITY).unwrap_err().code, 101);
}

#[test]
fn oversized_distance_saturates_instead_of_overflowing() {
    assert_eq!(compute_fare(1.0e18).unwrap(), i64::MAX);
}

#[test]
fn commission_is_ten_percent() {
    assert_eq!(compute_commission(850.0), 85.0);
    assert_eq!(compute_commission(0.0), 0.0);
}

#[test]
fn currency_uses_rupee_prefix() {
    assert_eq!(format_currency(40), "₹40");
}
