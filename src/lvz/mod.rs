//! LVZ packages
//!
//! A package is a `CONT` container of individually compressed sections. Each
//! section is either an embedded resource file or, when its file time is zero,
//! the object data describing images and where they are drawn.

pub mod collection;
pub mod objects;
pub mod package;
pub mod section;


pub use collection::{ImageRef, LvzCollection, MapObject, ScreenObject};
pub use objects::{
    pack_mode_time, pack_object_header, pack_screen_coordinate, unpack_mode_time,
    unpack_object_header, unpack_screen_coordinate, write_object_section, CompiledImage,
    CompiledMapObject, CompiledScreenObject, DisplayMode, ImageIndex, ObjectFormat, ObjectSection,
    RenderLayer, ScreenAnchor,
};
pub use package::{LvzPackage, Resource};
pub use section::{CompressedPackage, CompressedSection, DecompressedSection, SectionFailure};
