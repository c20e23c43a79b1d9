use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::objects::{
    write_object_section, CompiledImage, CompiledMapObject, CompiledScreenObject, ImageIndex,
    ObjectFormat, ObjectSection,
};
use super::section::{CompressedPackage, CompressedSection, SectionFailure};
use crate::errors::{LvzError, LvzResult};
use crate::parser_config::ParserConfig;
use crate::traits::LvzWriter;
use crate::validation::{LvzValidate, ValidationConfig, ValidationContext};

/// An embedded file, usually an image
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    pub data: Vec<u8>,
    /// Modification time in seconds since the Unix epoch
    pub time: i64,
}

impl Resource {
    /// Build a resource from user input, rejecting an empty name or unusable time
    pub fn new(name: impl Into<String>, data: Vec<u8>, time: i64) -> LvzResult<Self> {
        let resource = Self {
            name: name.into(),
            data,
            time,
        };
        resource.validate(&ValidationContext::default())?;
        Ok(resource)
    }
}

/// Decoded package contents: resources, images and placed objects
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LvzPackage {
    pub name: String,
    pub resources: Vec<Resource>,
    pub images: Vec<CompiledImage>,
    pub map_objects: Vec<CompiledMapObject>,
    pub screen_objects: Vec<CompiledScreenObject>,
    /// Layout of the object section this package was read from, if any
    pub source_format: Option<ObjectFormat>,
}

impl LvzPackage {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn from_path(path: &str) -> LvzResult<Self> {
        Self::from_path_with_config(path, &ParserConfig::default(), &ValidationConfig::default())
    }

    pub fn from_path_with_config(
        path: &str,
        parser_config: &ParserConfig,
        validation_config: &ValidationConfig,
    ) -> LvzResult<Self> {
        CompressedPackage::from_path_with_config(path, parser_config, validation_config)?
            .decompress_with_config(parser_config, validation_config)
    }

    /// Like [`Self::from_path_with_config`], but resources that fail to inflate
    /// are left out and returned alongside the package
    pub fn from_path_recovering(
        path: &str,
        parser_config: &ParserConfig,
        validation_config: &ValidationConfig,
    ) -> LvzResult<(Self, Vec<SectionFailure>)> {
        CompressedPackage::from_path_with_config(path, parser_config, validation_config)?
            .decompress_recovering(parser_config, validation_config)
    }

    pub fn from_bytes(name: &str, data: &[u8]) -> LvzResult<Self> {
        Self::from_bytes_with_config(name, data, &ParserConfig::default(), &ValidationConfig::default())
    }

    pub fn from_bytes_with_config(
        name: &str,
        data: &[u8],
        parser_config: &ParserConfig,
        validation_config: &ValidationConfig,
    ) -> LvzResult<Self> {
        let mut bytes = Bytes::copy_from_slice(data);
        CompressedPackage::from_bytes_with_config(name, &mut bytes, parser_config, validation_config)?
            .decompress_with_config(parser_config, validation_config)
    }

    pub fn from_bytes_recovering(
        name: &str,
        data: &[u8],
        parser_config: &ParserConfig,
        validation_config: &ValidationConfig,
    ) -> LvzResult<(Self, Vec<SectionFailure>)> {
        let mut bytes = Bytes::copy_from_slice(data);
        CompressedPackage::from_bytes_with_config(name, &mut bytes, parser_config, validation_config)?
            .decompress_recovering(parser_config, validation_config)
    }

    pub fn validation_context(&self) -> ValidationContext {
        ValidationContext {
            image_count: self.images.len(),
        }
    }

    /// Validate every entity against the package's image list
    pub fn validate(&self) -> LvzResult<()> {
        let context = self.validation_context();
        for resource in &self.resources {
            resource.validate(&context)?;
        }
        for image in &self.images {
            image.validate(&context)?;
        }
        for object in &self.map_objects {
            object.validate(&context)?;
        }
        for object in &self.screen_objects {
            object.validate(&context)?;
        }
        Ok(())
    }

    pub fn image(&self, index: ImageIndex) -> Option<&CompiledImage> {
        self.images.get(index.get())
    }

    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.name == name)
    }

    pub fn has_object_data(&self) -> bool {
        !self.images.is_empty() || !self.map_objects.is_empty() || !self.screen_objects.is_empty()
    }

    /// Add a resource unless an identical one is already present.
    ///
    /// Returns `false` for an exact duplicate; a different resource with the
    /// same name is an error.
    pub fn add_resource(&mut self, resource: Resource) -> LvzResult<bool> {
        resource.validate(&self.validation_context())?;
        match self.resources.iter().find(|r| r.name == resource.name) {
            Some(existing) if *existing == resource => Ok(false),
            Some(_) => Err(LvzError::DuplicateSection {
                name: resource.name,
            }),
            None => {
                self.resources.push(resource);
                Ok(true)
            },
        }
    }

    pub fn add_image(&mut self, image: CompiledImage) -> LvzResult<ImageIndex> {
        image.validate(&self.validation_context())?;
        self.images.push(image);
        Ok(ImageIndex::new(self.images.len() - 1))
    }

    pub fn add_map_object(&mut self, object: CompiledMapObject) -> LvzResult<()> {
        object.validate(&self.validation_context())?;
        self.map_objects.push(object);
        Ok(())
    }

    pub fn add_screen_object(&mut self, object: CompiledScreenObject) -> LvzResult<()> {
        object.validate(&self.validation_context())?;
        self.screen_objects.push(object);
        Ok(())
    }

    /// Append a decoded object section, shifting its image indices past the
    /// images already present
    pub(crate) fn merge_object_section(&mut self, section: ObjectSection) -> LvzResult<()> {
        let base = self.images.len();
        let image_count = section.images.len();
        let check = |id: u16, index: ImageIndex| {
            if index.get() >= image_count {
                return Err(LvzError::ImageIndexOutOfBounds {
                    object_id: id,
                    index: index.get(),
                    image_count,
                });
            }
            Ok(ImageIndex::new(base + index.get()))
        };

        for mut object in section.map_objects {
            object.image = check(object.id, object.image)?;
            self.map_objects.push(object);
        }
        for mut object in section.screen_objects {
            object.image = check(object.id, object.image)?;
            self.screen_objects.push(object);
        }
        self.images.extend(section.images);

        self.source_format = match (self.source_format, section.format) {
            (Some(ObjectFormat::Clv1), _) => Some(ObjectFormat::Clv1),
            (_, Some(format)) => Some(format),
            (current, None) => current,
        };
        Ok(())
    }

    pub fn compile(&self) -> LvzResult<CompressedPackage> {
        self.compile_with_config(&ValidationConfig::default())
    }

    /// Build the on-disk form: object data first, then resources sorted by name
    pub fn compile_with_config(&self, config: &ValidationConfig) -> LvzResult<CompressedPackage> {
        if config.validate_before_compile {
            self.validate()?;
        }

        let mut package = CompressedPackage::new(&self.name);
        if self.has_object_data() {
            let mut buffer = BytesMut::new();
            write_object_section(&mut buffer, &self.images, &self.map_objects, &self.screen_objects)?;
            package.add_section(CompressedSection::compress("", 0, &buffer)?)?;
        }

        let mut resources: Vec<&Resource> = self.resources.iter().collect();
        resources.sort_by(|a, b| a.name.cmp(&b.name));
        for resource in resources {
            package.add_section(CompressedSection::from_resource(resource)?)?;
        }

        debug!(
            package = %self.name,
            sections = package.sections.len(),
            "compiled package"
        );
        Ok(package)
    }

    /// Compile and serialize to bytes
    pub fn to_bytes(&self) -> LvzResult<Vec<u8>> {
        let mut buffer = BytesMut::new();
        self.compile()?.to_bytes(&mut buffer)?;
        Ok(buffer.to_vec())
    }

    pub fn save(&self, path: &str) -> LvzResult<()> {
        self.compile()?.write_to_path(path)
    }
}
