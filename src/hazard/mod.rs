//! Classical hazard curves from rupture-level ground-motion distributions.

pub mod curves;
pub mod model;
pub mod probability_map;

pub use curves::{calc_hazard_curves, pmap_from_group, write_hazard_curves, HazardCurves};
pub use model::{
    load_hazard_model, GroundMotion, HazardModel, ImtLevels, Interdependence, Occurrence,
    Rupture, RuptureSite, Source, SourceGroup,
};
pub use probability_map::{ProbabilityCurve, ProbabilityMap};
