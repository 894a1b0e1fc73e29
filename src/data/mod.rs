pub mod consequence;
pub mod exposure;
pub mod fragility;
pub mod gmf;
pub mod loader;

pub use consequence::{ConsequenceFunction, ConsequenceModel};
pub use exposure::{Asset, Exposure, COST_TYPES};
pub use fragility::{DamageFunction, FragilityFunctionSet, FragilityModel, NO_DAMAGE};
pub use gmf::{GroundMotionFields, Site};
