use crate::errors::{LvzError, LvzResult};

/// Configuration for resource limits while decoding packages and map metadata
///
/// Counts and sizes in both formats come straight from the file, so every
/// allocation they drive is checked against these limits first. It's separate
/// from ValidationConfig which handles semantic validation of decoded entities.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Maximum number of sections in one package
    pub max_sections: usize,

    /// Maximum inflated size of a single section (bytes)
    pub max_section_size: u32,

    /// Maximum inflated size of all sections of one package (bytes)
    pub max_total_size: usize,

    /// Maximum number of objects in one object section
    pub max_objects: usize,

    /// Maximum number of images in one object section
    pub max_images: usize,

    /// Maximum number of chunks in one ELVL block (top level and per region)
    pub max_elvl_chunks: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_sections: 4096,
            max_section_size: 16 * 1024 * 1024, // 16MB per section
            max_total_size: 128 * 1024 * 1024,  // 128MB per package
            max_objects: 65_536,
            max_images: 65_536,
            max_elvl_chunks: 65_536,
        }
    }
}

impl ParserConfig {
    /// Create a security-focused configuration with strict limits
    pub fn security_focused() -> Self {
        Self {
            max_sections: 512,
            max_section_size: 4 * 1024 * 1024,
            max_total_size: 32 * 1024 * 1024,
            max_objects: 8_192,
            max_images: 1_024,
            max_elvl_chunks: 8_192,
        }
    }

    /// Create a permissive configuration for unusually large packages
    pub fn permissive() -> Self {
        Self {
            max_sections: 65_536,
            max_section_size: 256 * 1024 * 1024,
            max_total_size: 1024 * 1024 * 1024,
            max_objects: 1_000_000,
            max_images: 1_000_000,
            max_elvl_chunks: 1_000_000,
        }
    }

    fn check(field: &str, size: usize, limit: usize) -> LvzResult<()> {
        if size > limit {
            return Err(LvzError::DataSizeExceedsLimit {
                field: field.to_string(),
                size,
                limit,
            });
        }
        Ok(())
    }

    /// Check if section count is within limits
    pub fn check_section_count(&self, count: usize) -> LvzResult<()> {
        Self::check("section_count", count, self.max_sections)
    }

    /// Check if a declared section size is acceptable before inflating it
    pub fn check_section_size(&self, size: u32) -> LvzResult<()> {
        Self::check("section_size", size as usize, self.max_section_size as usize)
    }

    pub fn check_total_size(&self, size: usize) -> LvzResult<()> {
        Self::check("package_size", size, self.max_total_size)
    }

    /// Check object and image counts of an object section
    pub fn check_object_counts(&self, objects: usize, images: usize) -> LvzResult<()> {
        Self::check("object_count", objects, self.max_objects)?;
        Self::check("image_count", images, self.max_images)
    }

    pub fn check_chunk_count(&self, count: usize) -> LvzResult<()> {
        Self::check("elvl_chunk_count", count, self.max_elvl_chunks)
    }
}
