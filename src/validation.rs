//! Range checks for package entities, in compiled and editable form.
//!
//! Validators return a [`ValidationCode`]; [`ValidationContext`] turns a failing
//! code into an [`LvzError::Validation`] when the config asks for it.

use serde::{Deserialize, Serialize};

use crate::errors::{LvzError, LvzResult};
use crate::lvz::{CompiledImage, CompiledMapObject, CompiledScreenObject, MapObject, Resource, ScreenObject};

pub const MAX_OBJECT_ID: i64 = 32767;
pub const MIN_MAP_COORDINATE: i64 = -32767;
pub const MAX_MAP_COORDINATE: i64 = 32767;
pub const MIN_SCREEN_COORDINATE: i64 = -2048;
pub const MAX_SCREEN_COORDINATE: i64 = 2047;
pub const MAX_SCREEN_TYPE: i64 = 11;
pub const MAX_DISPLAY_MODE: i64 = 5;
pub const MAX_LAYER: i64 = 7;
pub const MAX_DISPLAY_TIME: i64 = 100_000_000;
pub const MIN_FRAME_COUNT: i64 = 1;
pub const MAX_FRAME_COUNT: i64 = 32767;
pub const MAX_ANIMATION_TIME: i64 = 100_000_000;
pub const MAX_RESOURCE_TIME: i64 = u32::MAX as i64;

/// Outcome of validating one entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValidationCode {
    Success,
    ImageUndefined,
    IdOutOfRange,
    CoordinateOutOfRange,
    CoordinateTypeOutOfRange,
    DisplayModeOutOfRange,
    LayerOutOfRange,
    DisplayTimeOutOfRange,
    ImageIndexOutOfRange,
    FrameCountOutOfRange,
    AnimationTimeOutOfRange,
    ResourceNameEmpty,
    ResourceTimeNegative,
    ResourceTimeOutOfRange,
    ImageFileNameEmpty,
}

impl ValidationCode {
    pub fn as_u16(self) -> u16 {
        match self {
            Self::Success => 0,
            Self::ImageUndefined => 1,
            Self::IdOutOfRange => 2,
            Self::CoordinateOutOfRange => 3,
            Self::CoordinateTypeOutOfRange => 4,
            Self::DisplayModeOutOfRange => 5,
            Self::LayerOutOfRange => 6,
            Self::DisplayTimeOutOfRange => 7,
            Self::ImageIndexOutOfRange => 8,
            Self::FrameCountOutOfRange => 9,
            Self::AnimationTimeOutOfRange => 10,
            Self::ResourceNameEmpty => 11,
            Self::ResourceTimeNegative => 12,
            Self::ResourceTimeOutOfRange => 13,
            Self::ImageFileNameEmpty => 14,
        }
    }

    pub fn is_success(self) -> bool {
        self == Self::Success
    }

    /// Human-readable description of the condition
    pub fn message(self) -> &'static str {
        match self {
            Self::Success => "valid",
            Self::ImageUndefined => "no image is assigned",
            Self::IdOutOfRange => "object id must be between 0 and 32767",
            Self::CoordinateOutOfRange => {
                "coordinate out of range (map: -32767 to 32767, screen: -2048 to 2047)"
            },
            Self::CoordinateTypeOutOfRange => "screen coordinate type must be between 0 and 11",
            Self::DisplayModeOutOfRange => "display mode must be between 0 and 5",
            Self::LayerOutOfRange => "layer must be between 0 and 7",
            Self::DisplayTimeOutOfRange => "display time must be between 0 and 100000000",
            Self::ImageIndexOutOfRange => "image index does not reference a defined image",
            Self::FrameCountOutOfRange => "frame counts must be between 1 and 32767",
            Self::AnimationTimeOutOfRange => "animation time must be between 0 and 100000000",
            Self::ResourceNameEmpty => "resource name must not be empty",
            Self::ResourceTimeNegative => "resource time must not be negative",
            Self::ResourceTimeOutOfRange => "resource time must be between 1 and 4294967295",
            Self::ImageFileNameEmpty => "image file name must not be empty",
        }
    }
}

/// Configuration for when validation runs
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    /// Validate every entity after decompiling a package
    pub validate_decoded: bool,
    /// Validate every entity before compiling a package
    pub validate_before_compile: bool,
    /// Fail instead of skipping sections whose magic is not `CONT`
    pub strict_mode: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            validate_decoded: true,
            validate_before_compile: true,
            strict_mode: false,
        }
    }
}

/// Validation context: what an entity may reference
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationContext {
    pub image_count: usize,
}

/// Trait for validatable package entities
pub trait LvzValidate {
    /// Name used in error messages ("map object 12", "resource 'a.bm2'")
    fn describe(&self) -> String;

    /// Pure range check
    fn check(&self, context: &ValidationContext) -> ValidationCode;

    /// Turn a failed check into an error
    fn validate(&self, context: &ValidationContext) -> LvzResult<()> {
        match self.check(context) {
            ValidationCode::Success => Ok(()),
            code => Err(LvzError::Validation {
                entity: self.describe(),
                code,
                message: code.message().to_string(),
            }),
        }
    }
}

fn in_range(value: i64, min: i64, max: i64) -> bool {
    (min..=max).contains(&value)
}

/// Layer, mode and display time ranges shared by both object kinds
fn check_display(layer: u8, mode: u8, display_time: u32) -> ValidationCode {
    if i64::from(layer) > MAX_LAYER {
        return ValidationCode::LayerOutOfRange;
    }
    if i64::from(mode) > MAX_DISPLAY_MODE {
        return ValidationCode::DisplayModeOutOfRange;
    }
    if i64::from(display_time) > MAX_DISPLAY_TIME {
        return ValidationCode::DisplayTimeOutOfRange;
    }
    ValidationCode::Success
}

pub fn validate_map_object(object: &CompiledMapObject, image_count: usize) -> ValidationCode {
    if i64::from(object.id) > MAX_OBJECT_ID {
        return ValidationCode::IdOutOfRange;
    }
    if !in_range(i64::from(object.x), MIN_MAP_COORDINATE, MAX_MAP_COORDINATE)
        || !in_range(i64::from(object.y), MIN_MAP_COORDINATE, MAX_MAP_COORDINATE)
    {
        return ValidationCode::CoordinateOutOfRange;
    }
    if object.image.get() >= image_count {
        return ValidationCode::ImageIndexOutOfRange;
    }
    check_display(object.layer, object.mode, object.display_time)
}

pub fn validate_screen_object(object: &CompiledScreenObject, image_count: usize) -> ValidationCode {
    if i64::from(object.id) > MAX_OBJECT_ID {
        return ValidationCode::IdOutOfRange;
    }
    if !in_range(i64::from(object.x), MIN_SCREEN_COORDINATE, MAX_SCREEN_COORDINATE)
        || !in_range(i64::from(object.y), MIN_SCREEN_COORDINATE, MAX_SCREEN_COORDINATE)
    {
        return ValidationCode::CoordinateOutOfRange;
    }
    if i64::from(object.x_type) > MAX_SCREEN_TYPE || i64::from(object.y_type) > MAX_SCREEN_TYPE {
        return ValidationCode::CoordinateTypeOutOfRange;
    }
    if object.image.get() >= image_count {
        return ValidationCode::ImageIndexOutOfRange;
    }
    check_display(object.layer, object.mode, object.display_time)
}

pub fn validate_image(image: &CompiledImage) -> ValidationCode {
    if image.file_name.is_empty() {
        return ValidationCode::ImageFileNameEmpty;
    }
    if !in_range(i64::from(image.x_frames), MIN_FRAME_COUNT, MAX_FRAME_COUNT)
        || !in_range(i64::from(image.y_frames), MIN_FRAME_COUNT, MAX_FRAME_COUNT)
    {
        return ValidationCode::FrameCountOutOfRange;
    }
    if !in_range(i64::from(image.animation_time), 0, MAX_ANIMATION_TIME) {
        return ValidationCode::AnimationTimeOutOfRange;
    }
    ValidationCode::Success
}

pub fn validate_resource(resource: &Resource) -> ValidationCode {
    if resource.name.is_empty() {
        return ValidationCode::ResourceNameEmpty;
    }
    if resource.time < 0 {
        return ValidationCode::ResourceTimeNegative;
    }
    // A file time of 0 marks the object section on disk
    if resource.time == 0 || resource.time > MAX_RESOURCE_TIME {
        return ValidationCode::ResourceTimeOutOfRange;
    }
    ValidationCode::Success
}

/// Editable objects hold typed layer/mode/anchor values, so only the id,
/// coordinates, time and image assignment can be out of range.
pub fn validate_editable_map_object(object: &MapObject) -> ValidationCode {
    if object.image.is_none() {
        return ValidationCode::ImageUndefined;
    }
    if i64::from(object.id) > MAX_OBJECT_ID {
        return ValidationCode::IdOutOfRange;
    }
    if !in_range(i64::from(object.x), MIN_MAP_COORDINATE, MAX_MAP_COORDINATE)
        || !in_range(i64::from(object.y), MIN_MAP_COORDINATE, MAX_MAP_COORDINATE)
    {
        return ValidationCode::CoordinateOutOfRange;
    }
    if i64::from(object.display_time) > MAX_DISPLAY_TIME {
        return ValidationCode::DisplayTimeOutOfRange;
    }
    ValidationCode::Success
}

pub fn validate_editable_screen_object(object: &ScreenObject) -> ValidationCode {
    if object.image.is_none() {
        return ValidationCode::ImageUndefined;
    }
    if i64::from(object.id) > MAX_OBJECT_ID {
        return ValidationCode::IdOutOfRange;
    }
    if !in_range(i64::from(object.x), MIN_SCREEN_COORDINATE, MAX_SCREEN_COORDINATE)
        || !in_range(i64::from(object.y), MIN_SCREEN_COORDINATE, MAX_SCREEN_COORDINATE)
    {
        return ValidationCode::CoordinateOutOfRange;
    }
    if i64::from(object.display_time) > MAX_DISPLAY_TIME {
        return ValidationCode::DisplayTimeOutOfRange;
    }
    ValidationCode::Success
}

impl LvzValidate for CompiledMapObject {
    fn describe(&self) -> String {
        format!("map object {}", self.id)
    }

    fn check(&self, context: &ValidationContext) -> ValidationCode {
        validate_map_object(self, context.image_count)
    }
}

impl LvzValidate for CompiledScreenObject {
    fn describe(&self) -> String {
        format!("screen object {}", self.id)
    }

    fn check(&self, context: &ValidationContext) -> ValidationCode {
        validate_screen_object(self, context.image_count)
    }
}

impl LvzValidate for CompiledImage {
    fn describe(&self) -> String {
        format!("image '{}'", self.file_name)
    }

    fn check(&self, _context: &ValidationContext) -> ValidationCode {
        validate_image(self)
    }
}

impl LvzValidate for Resource {
    fn describe(&self) -> String {
        format!("resource '{}'", self.name)
    }

    fn check(&self, _context: &ValidationContext) -> ValidationCode {
        validate_resource(self)
    }
}

impl LvzValidate for MapObject {
    fn describe(&self) -> String {
        format!("map object {}", self.id)
    }

    fn check(&self, _context: &ValidationContext) -> ValidationCode {
        validate_editable_map_object(self)
    }
}

impl LvzValidate for ScreenObject {
    fn describe(&self) -> String {
        format!("screen object {}", self.id)
    }

    fn check(&self, _context: &ValidationContext) -> ValidationCode {
        validate_editable_screen_object(self)
    }
}
