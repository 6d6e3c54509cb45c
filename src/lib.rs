#![doc = "District screening public API"]
mod catalog;
mod config;
mod district;
mod feature;
mod geom;
mod screening;
mod table;
mod wfs;

pub mod cli;
pub mod commands;

#[doc(inline)]
pub use catalog::{LayerCatalog, LayerDefinition};

#[doc(inline)]
pub use config::{
    DistrictLevelConfig, PortalConfig, StatMapping, StatsConfig, StatsSourceConfig,
};

#[doc(inline)]
pub use district::{
    stats::{StatsKeys, StatsRecord},
    AttrBag, District, DistrictLevel, DistrictLevels,
};

#[doc(inline)]
pub use feature::{Feature, Geom, GeomKind, PropertyMap};

#[doc(inline)]
pub use geom::ProjectionSet;

#[doc(inline)]
pub use screening::{
    FeatureCache, LayerIds, LayerInputs, LayerSpec, LevelSelector, RunLogSnapshot, RunStatus,
    Screening, ScreeningOptions, Timescope,
};

#[doc(inline)]
pub use table::{results_frame, write_table, TableFormat};

#[doc(inline)]
pub use wfs::{FeatureService, FetchOptions, TypeSchema, WfsClient};
