// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Points calculation for a single activity.
//!
//! Rounding is floor after applying the multiplier: 12.5 km at 1 pt/km earns
//! 12 points. Output is never negative and never an error.

use crate::services::provider::ProviderActivity;
use crate::services::rates::{CategoryRate, RateRule, RateTable};

/// Points for one activity under the given table. Ineligible categories earn 0.
pub fn compute_points(activity: &ProviderActivity, table: &RateTable) -> u64 {
    table
        .rule_for(&activity.category)
        .map(|rate| {
            points_for_rate(
                rate,
                activity.distance_meters,
                activity.moving_time_secs,
                activity.calories,
            )
        })
        .unwrap_or(0)
}

/// Apply a category rate to raw activity metrics.
///
/// The distance and energy components are summed before flooring. A flat
/// session with no moving time earns nothing, calories included.
pub fn points_for_rate(
    rate: CategoryRate,
    distance_meters: f64,
    moving_time_secs: u64,
    calories: f64,
) -> u64 {
    let energy = calorie_component(rate.per_calorie, calories);
    match rate.rule {
        RateRule::PerKm(multiplier) => {
            floor_points(distance_component(multiplier, distance_meters) + energy)
        }
        RateRule::PerSession(points) => {
            if moving_time_secs == 0 {
                0
            } else {
                points.saturating_add(floor_points(energy))
            }
        }
    }
}

fn distance_component(multiplier: f64, distance_meters: f64) -> f64 {
    if !distance_meters.is_finite() || distance_meters <= 0.0 {
        return 0.0;
    }
    (distance_meters / 1000.0) * multiplier
}

fn calorie_component(per_calorie: Option<f64>, calories: f64) -> f64 {
    match per_calorie {
        Some(multiplier) if calories.is_finite() && calories > 0.0 => calories * multiplier,
        _ => 0.0,
    }
}

fn floor_points(raw: f64) -> u64 {
    if !raw.is_finite() || raw <= 0.0 {
        return 0;
    }
    // Float-to-int `as` saturates at u64::MAX.
    raw.floor() as u64
}
