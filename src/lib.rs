pub mod elvl;
pub mod errors;
pub mod lvz;
pub mod parser_config;
pub mod traits;
pub mod utils;
pub mod validation;

pub use elvl::{
    AutoWarp, ElvlChunk, ElvlCollection, LevelFile, MapTile, RawChunk, Region, RegionColor,
    TileGrid,
};
pub use errors::*;
pub use lvz::{
    CompiledImage, CompiledMapObject, CompiledScreenObject, CompressedPackage, CompressedSection,
    DecompressedSection, DisplayMode, ImageIndex, ImageRef, LvzCollection, LvzPackage, MapObject,
    ObjectFormat, RenderLayer, Resource, ScreenAnchor, ScreenObject, SectionFailure,
};
pub use parser_config::*;
pub use traits::*;
pub use validation::{LvzValidate, ValidationCode, ValidationConfig, ValidationContext};
