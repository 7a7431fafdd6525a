use crate::models::{MoistureRange, SoilType, TreeProfile, WeatherSnapshot};

/// Below the target range the need grows 10% per point of deficit; above
/// it the need decays 5% per point of excess, floored at 10%.
pub fn moisture_factor(current_moisture: f64, target_range: &MoistureRange) -> f64 {
    if target_range.is_below(current_moisture) {
        let deficit = target_range.lower() - current_moisture;
        1.0 + deficit / 10.0
    } else if target_range.is_above(current_moisture) {
        let excess = current_moisture - target_range.upper();
        (1.0 - excess / 20.0).max(0.1)
    } else {
        1.0
    }
}

pub fn soil_factor(soil_type: SoilType) -> f64 {
    match soil_type {
        SoilType::Sandy => 1.3,      // drains fast, retains little
        SoilType::Loamy => 1.0,      // reference soil
        SoilType::Clay => 0.8,       // retains well
        SoilType::Loess => 1.1,
        SoilType::Calcareous => 1.2,
    }
}

/// Young trees need more water; bands are evaluated ascending, first
/// match wins.
pub fn age_factor(age_years: u32) -> f64 {
    if age_years < 3 {
        1.5
    } else if age_years < 10 {
        1.2
    } else if age_years < 30 {
        1.0
    } else if age_years < 50 {
        0.9
    } else {
        0.8
    }
}

/// Estimated liters for one parcel today, rounded to 0.1L. Each factor
/// appends one reason line documenting its inputs; those lines are part
/// of the recommendation's audit trail, not diagnostics.
pub fn calculate(
    profile: &TreeProfile,
    weather: &WeatherSnapshot,
    current_moisture: f64,
    target_range: &MoistureRange,
    reasons: &mut Vec<String>,
) -> f64 {
    let base = profile.base_water_need_liters;
    let moisture = moisture_factor(current_moisture, target_range);
    let weather_factor = weather.water_need_factor();
    let soil = soil_factor(profile.soil_type);
    let age = age_factor(profile.age_years);

    let total = base * moisture * weather_factor * soil * age;

    reasons.push(format!("Base: {:.1}L/day ({})", base, profile.variety));
    reasons.push(format!(
        "Moisture factor: {:.2} (current: {:.1}%)",
        moisture, current_moisture
    ));
    reasons.push(format!(
        "Weather factor: {:.2} ({:.1}°C, ET0={:.1}mm)",
        weather_factor, weather.temperature_celsius, weather.evapotranspiration_mm
    ));
    reasons.push(format!(
        "Soil factor: {:.2} ({})",
        soil, profile.soil_type
    ));
    reasons.push(format!(
        "Age factor: {:.2} ({} years)",
        age, profile.age_years
    ));

    (total * 10.0).round() / 10.0
}
