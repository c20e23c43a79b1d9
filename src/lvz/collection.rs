//! Editable view of a package
//!
//! Objects hold shared references to their images instead of indices, so an
//! editor can add, remove and reorder images and objects freely. `apply`
//! turns the view back into a compiled package with fresh indices.

use std::rc::Rc;

use super::objects::{
    CompiledImage, CompiledMapObject, CompiledScreenObject, DisplayMode, ImageIndex, RenderLayer,
    ScreenAnchor,
};
use super::package::{LvzPackage, Resource};
use crate::errors::{LvzError, LvzResult};
use crate::validation::{LvzValidate, ValidationCode, ValidationContext};

pub type ImageRef = Rc<CompiledImage>;

#[derive(Debug, Clone, PartialEq)]
pub struct MapObject {
    pub id: u16,
    pub x: i32,
    pub y: i32,
    pub image: Option<ImageRef>,
    pub layer: RenderLayer,
    pub mode: DisplayMode,
    pub display_time: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScreenObject {
    pub id: u16,
    pub x: i32,
    pub x_anchor: ScreenAnchor,
    pub y: i32,
    pub y_anchor: ScreenAnchor,
    pub image: Option<ImageRef>,
    pub layer: RenderLayer,
    pub mode: DisplayMode,
    pub display_time: u32,
}

impl MapObject {
    /// Validated constructor for objects placed by an editor
    pub fn new(
        id: u16,
        x: i32,
        y: i32,
        image: ImageRef,
        layer: RenderLayer,
        mode: DisplayMode,
        display_time: u32,
    ) -> LvzResult<Self> {
        let object = Self {
            id,
            x,
            y,
            image: Some(image),
            layer,
            mode,
            display_time,
        };
        object.validate(&ValidationContext::default())?;
        Ok(object)
    }
}

impl ScreenObject {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u16,
        x: i32,
        x_anchor: ScreenAnchor,
        y: i32,
        y_anchor: ScreenAnchor,
        image: ImageRef,
        layer: RenderLayer,
        mode: DisplayMode,
        display_time: u32,
    ) -> LvzResult<Self> {
        let object = Self {
            id,
            x,
            x_anchor,
            y,
            y_anchor,
            image: Some(image),
            layer,
            mode,
            display_time,
        };
        object.validate(&ValidationContext::default())?;
        Ok(object)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LvzCollection {
    pub resources: Vec<Resource>,
    pub images: Vec<ImageRef>,
    pub map_objects: Vec<MapObject>,
    pub screen_objects: Vec<ScreenObject>,
}

fn invalid(entity: String, code: ValidationCode) -> LvzError {
    LvzError::Validation {
        entity,
        code,
        message: code.message().to_string(),
    }
}

impl LvzPackage {
    /// Resolve image indices into shared image references.
    ///
    /// The package is validated first, so every index and enum value is known
    /// to be in range.
    pub fn collect(&self) -> LvzResult<LvzCollection> {
        self.validate()?;

        let images: Vec<ImageRef> = self.images.iter().cloned().map(Rc::new).collect();
        let resolve = |index: ImageIndex| images.get(index.get()).cloned();

        let mut map_objects = Vec::with_capacity(self.map_objects.len());
        for object in &self.map_objects {
            let describe = || object.describe();
            map_objects.push(MapObject {
                id: object.id,
                x: object.x,
                y: object.y,
                image: resolve(object.image),
                layer: object
                    .layer()
                    .ok_or_else(|| invalid(describe(), ValidationCode::LayerOutOfRange))?,
                mode: object
                    .mode()
                    .ok_or_else(|| invalid(describe(), ValidationCode::DisplayModeOutOfRange))?,
                display_time: object.display_time,
            });
        }

        let mut screen_objects = Vec::with_capacity(self.screen_objects.len());
        for object in &self.screen_objects {
            let describe = || object.describe();
            let anchor = |value: Option<ScreenAnchor>| {
                value.ok_or_else(|| invalid(describe(), ValidationCode::CoordinateTypeOutOfRange))
            };
            screen_objects.push(ScreenObject {
                id: object.id,
                x: object.x,
                x_anchor: anchor(object.x_anchor())?,
                y: object.y,
                y_anchor: anchor(object.y_anchor())?,
                image: resolve(object.image),
                layer: object
                    .layer()
                    .ok_or_else(|| invalid(describe(), ValidationCode::LayerOutOfRange))?,
                mode: object
                    .mode()
                    .ok_or_else(|| invalid(describe(), ValidationCode::DisplayModeOutOfRange))?,
                display_time: object.display_time,
            });
        }

        Ok(LvzCollection {
            resources: self.resources.clone(),
            images,
            map_objects,
            screen_objects,
        })
    }
}

impl LvzCollection {
    /// Register an image and return the shared reference objects should hold
    pub fn add_image(&mut self, image: CompiledImage) -> ImageRef {
        let image = Rc::new(image);
        self.images.push(Rc::clone(&image));
        image
    }

    /// Images no object refers to
    pub fn unused_images(&self) -> Vec<ImageRef> {
        self.images
            .iter()
            .filter(|image| {
                let used = |held: &Option<ImageRef>| held.as_ref().is_some_and(|h| Rc::ptr_eq(h, *image));
                !self.map_objects.iter().any(|o| used(&o.image))
                    && !self.screen_objects.iter().any(|o| used(&o.image))
            })
            .cloned()
            .collect()
    }

    /// Build a compiled package.
    ///
    /// Images keep their collection order; images held by objects but missing
    /// from the list are appended in first-use order. Objects without an image
    /// are rejected.
    pub fn apply(&self, name: &str) -> LvzResult<LvzPackage> {
        let context = ValidationContext::default();
        let mut images: Vec<ImageRef> = Vec::with_capacity(self.images.len());
        for image in &self.images {
            if !images.iter().any(|known| Rc::ptr_eq(known, image)) {
                images.push(Rc::clone(image));
            }
        }

        let mut index_of = |image: &ImageRef| -> ImageIndex {
            match images.iter().position(|known| Rc::ptr_eq(known, image)) {
                Some(index) => ImageIndex::new(index),
                None => {
                    images.push(Rc::clone(image));
                    ImageIndex::new(images.len() - 1)
                },
            }
        };

        let mut map_objects = Vec::with_capacity(self.map_objects.len());
        for object in &self.map_objects {
            object.validate(&context)?;
            let image = object
                .image
                .as_ref()
                .ok_or_else(|| invalid(object.describe(), ValidationCode::ImageUndefined))?;
            map_objects.push(CompiledMapObject {
                id: object.id,
                x: object.x,
                y: object.y,
                image: index_of(image),
                layer: object.layer as u8,
                mode: object.mode as u8,
                display_time: object.display_time,
            });
        }

        let mut screen_objects = Vec::with_capacity(self.screen_objects.len());
        for object in &self.screen_objects {
            object.validate(&context)?;
            let image = object
                .image
                .as_ref()
                .ok_or_else(|| invalid(object.describe(), ValidationCode::ImageUndefined))?;
            screen_objects.push(CompiledScreenObject {
                id: object.id,
                x: object.x,
                x_type: object.x_anchor as u8,
                y: object.y,
                y_type: object.y_anchor as u8,
                image: index_of(image),
                layer: object.layer as u8,
                mode: object.mode as u8,
                display_time: object.display_time,
            });
        }

        let package = LvzPackage {
            name: name.to_string(),
            resources: self.resources.clone(),
            images: images.iter().map(|image| image.as_ref().clone()).collect(),
            map_objects,
            screen_objects,
            source_format: None,
        };
        package.validate()?;
        Ok(package)
    }
}
