pub mod aggregate;
pub mod assoc;
pub mod engine;
pub mod inputs;
pub mod rng;

pub use aggregate::{
    asset_damage_rows, asset_loss_rows, tag_damage_rows, tag_loss_rows, total_damage,
    total_losses, AssetDamageRow, AssetLossRow, TagDamageRow, TagLossRow, TotalDamage, TotalLoss,
};
pub use assoc::{associate_assets, haversine_km, Association, AssociationResult};
pub use engine::{
    run_scenario, run_scenario_sequential, AssetOutcome, RealizationOutcome, ScenarioOutcome,
    ScenarioSettings,
};
pub use inputs::ScenarioInputs;
pub use rng::Rng;
