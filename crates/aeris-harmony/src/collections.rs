//! TEMPO collection ids and per-gas coverage variables.
//!
//! Collection ids come from CMR and are pinned here so the worker never
//! has to search CMR on the hot path.

use aeris_core::GasType;

/// CMR concept id for a gas's TEMPO collection.
pub fn collection_id(gas: GasType) -> &'static str {
    match gas {
        GasType::No2 => "C2930763263-LARC_CLOUD",
        GasType::Ch2o => "C2930763264-LARC_CLOUD",
        GasType::Ai => "C2930763265-LARC_CLOUD",
        GasType::Pm => "C2930763266-LARC_CLOUD",
        GasType::O3 => "C2930763267-LARC_CLOUD",
    }
}

/// Coverage variable path within the collection.
pub fn variable_path(gas: GasType) -> &'static str {
    match gas {
        GasType::No2 | GasType::Ch2o => "product/vertical_column_troposphere",
        GasType::Ai => "product/aerosol_index_354_388",
        GasType::Pm => "product/aerosol_optical_depth_550",
        GasType::O3 => "product/ozone_total_column",
    }
}
