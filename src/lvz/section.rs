use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::objects::ObjectSection;
use super::package::{LvzPackage, Resource};
use crate::errors::{LvzError, LvzResult};
use crate::parser_config::ParserConfig;
use crate::traits::{LvzParser, LvzWriter};
use crate::utils::{
    bytes_to_string, compress, decompress, ensure_remaining, get_cstring, get_tag, write_cstring,
    CONT_MAGIC,
};
use crate::validation::ValidationConfig;

/// One named, individually compressed blob of a package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressedSection {
    pub decompressed_size: u32,
    /// Modification time; 0 marks the object-data section
    pub file_time: u32,
    pub name: String,
    pub data: Vec<u8>,
}

/// Inflated section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecompressedSection {
    pub decompressed_size: u32,
    pub file_time: u32,
    pub name: String,
    pub data: Vec<u8>,
}

impl DecompressedSection {
    pub fn is_object_section(&self) -> bool {
        self.file_time == 0
    }

    pub fn into_resource(self) -> Resource {
        Resource {
            name: self.name,
            data: self.data,
            time: i64::from(self.file_time),
        }
    }
}

impl CompressedSection {
    /// Deflate `payload` into a section
    pub fn compress(name: &str, file_time: u32, payload: &[u8]) -> LvzResult<Self> {
        let decompressed_size = u32::try_from(payload.len()).map_err(|_| LvzError::FieldNotEncodable {
            field: format!("size of section '{}'", name),
            value: payload.len() as i64,
            max: i64::from(u32::MAX),
        })?;
        Ok(Self {
            decompressed_size,
            file_time,
            name: name.to_string(),
            data: compress(payload, name)?,
        })
    }

    pub fn from_resource(resource: &Resource) -> LvzResult<Self> {
        let file_time = u32::try_from(resource.time).map_err(|_| LvzError::FieldNotEncodable {
            field: format!("time of resource '{}'", resource.name),
            value: resource.time,
            max: i64::from(u32::MAX),
        })?;
        Self::compress(&resource.name, file_time, &resource.data)
    }

    pub fn compressed_size(&self) -> usize {
        self.data.len()
    }

    pub fn is_object_section(&self) -> bool {
        self.file_time == 0
    }

    /// Inflate the payload, checking it against the declared size
    pub fn inflate(&self, config: &ParserConfig) -> LvzResult<DecompressedSection> {
        config.check_section_size(self.decompressed_size)?;
        // Inflation stops one byte past the declared size
        let data = decompress(&self.data, &self.name, self.decompressed_size as usize)?;
        if data.len() != self.decompressed_size as usize {
            return Err(LvzError::SectionSizeMismatch {
                section: self.name.clone(),
                header_size: self.decompressed_size,
                actual_size: data.len(),
            });
        }
        Ok(DecompressedSection {
            decompressed_size: self.decompressed_size,
            file_time: self.file_time,
            name: self.name.clone(),
            data,
        })
    }

    /// Read one section record, returning the magic it was stored under
    fn read(data: &mut Bytes, offset: usize) -> LvzResult<([u8; 4], Self)> {
        let start = data.remaining();
        let magic = get_tag(data, offset)?;
        ensure_remaining(data, 12, offset + 4)?;
        let decompressed_size = data.get_u32_le();
        let file_time = data.get_u32_le();
        let compressed_size = data.get_u32_le() as usize;
        let name = get_cstring(data, offset + 16)?;

        ensure_remaining(data, compressed_size, offset + start - data.remaining())?;
        let payload = data.split_to(compressed_size).to_vec();

        Ok((
            magic,
            Self {
                decompressed_size,
                file_time,
                name,
                data: payload,
            },
        ))
    }
}

impl LvzParser for CompressedSection {
    fn from_bytes(data: &mut Bytes) -> LvzResult<Self> {
        let (magic, section) = Self::read(data, 0)?;
        if magic != CONT_MAGIC {
            return Err(LvzError::InvalidMagicBytes {
                expected: bytes_to_string(&CONT_MAGIC),
                found: bytes_to_string(&magic),
                offset: 0,
            });
        }
        Ok(section)
    }
}

impl LvzWriter for CompressedSection {
    fn to_bytes(&self, buffer: &mut BytesMut) -> LvzResult<()> {
        let compressed_size = u32::try_from(self.data.len()).map_err(|_| LvzError::FieldNotEncodable {
            field: format!("compressed size of section '{}'", self.name),
            value: self.data.len() as i64,
            max: i64::from(u32::MAX),
        })?;
        buffer.put_slice(&CONT_MAGIC);
        buffer.put_u32_le(self.decompressed_size);
        buffer.put_u32_le(self.file_time);
        buffer.put_u32_le(compressed_size);
        write_cstring(buffer, &self.name, "section name")?;
        buffer.put_slice(&self.data);
        Ok(())
    }
}

/// A resource section that could not be inflated
#[derive(Debug, Clone, PartialEq)]
pub struct SectionFailure {
    /// Position among the package's sections
    pub index: usize,
    pub name: String,
    pub error: LvzError,
}

/// A package as stored on disk: ordered compressed sections
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompressedPackage {
    pub name: String,
    pub sections: Vec<CompressedSection>,
}

impl CompressedPackage {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            sections: Vec::new(),
        }
    }

    /// Append a section; names must be unique and there is at most one object section
    pub fn add_section(&mut self, section: CompressedSection) -> LvzResult<()> {
        let duplicate = self.sections.iter().any(|existing| {
            existing.name == section.name
                || (existing.is_object_section() && section.is_object_section())
        });
        if duplicate {
            return Err(LvzError::DuplicateSection { name: section.name });
        }
        self.sections.push(section);
        Ok(())
    }

    pub fn from_bytes_with_config(
        name: &str,
        data: &mut Bytes,
        parser_config: &ParserConfig,
        validation_config: &ValidationConfig,
    ) -> LvzResult<Self> {
        let total = data.len();
        let magic = get_tag(data, 0)?;
        if magic != CONT_MAGIC {
            return Err(LvzError::InvalidMagicBytes {
                expected: bytes_to_string(&CONT_MAGIC),
                found: bytes_to_string(&magic),
                offset: 0,
            });
        }
        ensure_remaining(data, 4, 4)?;
        let count = data.get_u32_le() as usize;
        parser_config.check_section_count(count)?;

        let mut package = Self::new(name);
        for index in 0..count {
            let offset = total - data.len();
            let (magic, section) = CompressedSection::read(data, offset)?;
            if magic != CONT_MAGIC {
                if validation_config.strict_mode {
                    return Err(LvzError::UnknownSectionMagic {
                        index,
                        found: bytes_to_string(&magic),
                    });
                }
                warn!(
                    index,
                    magic = %bytes_to_string(&magic),
                    name = %section.name,
                    "skipping section without CONT magic"
                );
                continue;
            }
            // Raw reads keep duplicate names; only add_section enforces uniqueness
            package.sections.push(section);
        }

        if data.has_remaining() {
            debug!(trailing = data.remaining(), "package has bytes after its last section");
        }
        debug!(
            package = %package.name,
            sections = package.sections.len(),
            declared = count,
            "read compressed package"
        );
        Ok(package)
    }

    pub fn from_path(path: &str) -> LvzResult<Self> {
        Self::from_path_with_config(path, &ParserConfig::default(), &ValidationConfig::default())
    }

    pub fn from_path_with_config(
        path: &str,
        parser_config: &ParserConfig,
        validation_config: &ValidationConfig,
    ) -> LvzResult<Self> {
        let file_data = std::fs::read(path).map_err(|e| LvzError::from_io(&e, path))?;
        let name = std::path::Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string());
        Self::from_bytes_with_config(&name, &mut Bytes::from(file_data), parser_config, validation_config)
    }

    pub fn write_to_path(&self, path: &str) -> LvzResult<()> {
        let mut buffer = BytesMut::new();
        self.to_bytes(&mut buffer)?;
        std::fs::write(path, &buffer).map_err(|e| LvzError::FileWriteError {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }

    /// Inflate every section independently
    pub fn decompress_sections(&self, config: &ParserConfig) -> Vec<LvzResult<DecompressedSection>> {
        self.sections.iter().map(|section| section.inflate(config)).collect()
    }

    pub fn decompress(&self) -> LvzResult<LvzPackage> {
        self.decompress_with_config(&ParserConfig::default(), &ValidationConfig::default())
    }

    /// Inflate all sections and decode the object data.
    ///
    /// The first failed resource section fails the whole call; use
    /// [`Self::decompress_recovering`] to keep the sections that did inflate.
    pub fn decompress_with_config(
        &self,
        parser_config: &ParserConfig,
        validation_config: &ValidationConfig,
    ) -> LvzResult<LvzPackage> {
        let (package, failures) = self.decompress_recovering(parser_config, validation_config)?;
        match failures.into_iter().next() {
            Some(failure) => Err(failure.error),
            None => Ok(package),
        }
    }

    /// Inflate all sections, isolating resource sections that fail.
    ///
    /// A broken resource is left out of the package and reported with its
    /// index. Object data, package size limits and validation stay fatal.
    pub fn decompress_recovering(
        &self,
        parser_config: &ParserConfig,
        validation_config: &ValidationConfig,
    ) -> LvzResult<(LvzPackage, Vec<SectionFailure>)> {
        let mut package = LvzPackage::new(&self.name);
        let mut failures = Vec::new();
        let mut total_size = 0usize;

        for (index, section) in self.sections.iter().enumerate() {
            // Declared sizes bound every inflation, so the budget is checked up front
            total_size = total_size.saturating_add(section.decompressed_size as usize);
            parser_config.check_total_size(total_size)?;

            if section.is_object_section() {
                let inflated = section.inflate(parser_config)?;
                let mut payload = Bytes::from(inflated.data);
                let objects = ObjectSection::from_bytes_with_config(&mut payload, parser_config)?;
                package.merge_object_section(objects)?;
                continue;
            }

            match section.inflate(parser_config) {
                Ok(inflated) => package.resources.push(inflated.into_resource()),
                Err(error) => {
                    warn!(index, section = %section.name, %error, "dropping resource section");
                    failures.push(SectionFailure {
                        index,
                        name: section.name.clone(),
                        error,
                    });
                },
            }
        }

        if validation_config.validate_decoded {
            package.validate()?;
        }

        debug!(
            package = %package.name,
            resources = package.resources.len(),
            failed = failures.len(),
            images = package.images.len(),
            map_objects = package.map_objects.len(),
            screen_objects = package.screen_objects.len(),
            "decompressed package"
        );
        Ok((package, failures))
    }
}

impl LvzParser for CompressedPackage {
    fn from_bytes(data: &mut Bytes) -> LvzResult<Self> {
        Self::from_bytes_with_config("", data, &ParserConfig::default(), &ValidationConfig::default())
    }
}

impl LvzWriter for CompressedPackage {
    fn to_bytes(&self, buffer: &mut BytesMut) -> LvzResult<()> {
        let count = u32::try_from(self.sections.len()).map_err(|_| LvzError::FieldNotEncodable {
            field: "section count".to_string(),
            value: self.sections.len() as i64,
            max: i64::from(u32::MAX),
        })?;
        buffer.put_slice(&CONT_MAGIC);
        buffer.put_u32_le(count);
        for section in &self.sections {
            section.to_bytes(buffer)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package_bytes(package: &CompressedPackage) -> Bytes {
        let mut buffer = BytesMut::new();
        package.to_bytes(&mut buffer).unwrap();
        buffer.freeze()
    }

    #[test]
    fn test_section_layout() {
        let section = CompressedSection {
            decompressed_size: 3,
            file_time: 99,
            name: "a.bm2".to_string(),
            data: vec![1, 2],
        };
        let mut buffer = BytesMut::new();
        section.to_bytes(&mut buffer).unwrap();

        let mut expected = b"CONT".to_vec();
        expected.extend_from_slice(&3u32.to_le_bytes());
        expected.extend_from_slice(&99u32.to_le_bytes());
        expected.extend_from_slice(&2u32.to_le_bytes());
        expected.extend_from_slice(b"a.bm2\0");
        expected.extend_from_slice(&[1, 2]);
        assert_eq!(&buffer[..], &expected[..]);

        let parsed = CompressedSection::from_bytes(&mut Bytes::from(expected)).unwrap();
        assert_eq!(parsed, section);
    }

    #[test]
    fn test_add_section_rejects_duplicates() {
        let mut package = CompressedPackage::new("test.lvz");
        package.add_section(CompressedSection::compress("", 0, b"CLV2").unwrap()).unwrap();
        package.add_section(CompressedSection::compress("a.bm2", 5, b"x").unwrap()).unwrap();

        match package.add_section(CompressedSection::compress("a.bm2", 6, b"y").unwrap()) {
            Err(LvzError::DuplicateSection { name }) => assert_eq!(name, "a.bm2"),
            other => panic!("Expected DuplicateSection, got {:?}", other),
        }
        assert!(package
            .add_section(CompressedSection::compress("objects", 0, b"CLV2").unwrap())
            .is_err());
        assert_eq!(package.sections.len(), 2);
    }

    #[test]
    fn test_foreign_section_magic() {
        let mut package = CompressedPackage::new("");
        package.add_section(CompressedSection::compress("keep.bm2", 5, b"keep").unwrap()).unwrap();
        package.add_section(CompressedSection::compress("skip.bm2", 5, b"skip").unwrap()).unwrap();
        let mut raw = package_bytes(&package).to_vec();

        // Second section record starts right after the first one
        let first_len = 16 + "keep.bm2".len() + 1 + package.sections[0].data.len();
        raw[8 + first_len..8 + first_len + 4].copy_from_slice(b"JUNK");

        let lenient = CompressedPackage::from_bytes(&mut Bytes::from(raw.clone())).unwrap();
        assert_eq!(lenient.sections.len(), 1);
        assert_eq!(lenient.sections[0].name, "keep.bm2");

        let strict = ValidationConfig {
            strict_mode: true,
            ..ValidationConfig::default()
        };
        match CompressedPackage::from_bytes_with_config(
            "",
            &mut Bytes::from(raw),
            &ParserConfig::default(),
            &strict,
        ) {
            Err(LvzError::UnknownSectionMagic { index, found }) => {
                assert_eq!(index, 1);
                assert_eq!(found, "JUNK");
            },
            other => panic!("Expected UnknownSectionMagic, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_package_magic() {
        let mut data = Bytes::from_static(b"PK\x03\x04\0\0\0\0");
        assert!(matches!(
            CompressedPackage::from_bytes(&mut data),
            Err(LvzError::InvalidMagicBytes { offset: 0, .. })
        ));
    }

    #[test]
    fn test_truncated_payload() {
        let mut package = CompressedPackage::new("");
        package.add_section(CompressedSection::compress("a", 5, &[0; 100]).unwrap()).unwrap();
        let raw = package_bytes(&package);
        let mut cut = raw.slice(..raw.len() - 1);
        assert!(matches!(
            CompressedPackage::from_bytes(&mut cut),
            Err(LvzError::BufferUnderflow { .. })
        ));
    }

    #[test]
    fn test_size_mismatch_reported_per_section() {
        let mut package = CompressedPackage::new("");
        package.add_section(CompressedSection::compress("good", 5, b"hello").unwrap()).unwrap();
        let mut bad = CompressedSection::compress("bad", 5, b"hello").unwrap();
        bad.decompressed_size = 6;
        package.add_section(bad).unwrap();
        let mut corrupt = CompressedSection::compress("corrupt", 5, b"hello").unwrap();
        corrupt.data = vec![0x78, 0x9C, 0xFF, 0xFF];
        package.add_section(corrupt).unwrap();

        let results = package.decompress_sections(&ParserConfig::default());
        assert_eq!(results[0].as_ref().unwrap().data, b"hello".to_vec());
        assert!(matches!(
            results[1],
            Err(LvzError::SectionSizeMismatch { header_size: 6, actual_size: 5, .. })
        ));
        assert!(matches!(results[2], Err(LvzError::DecompressionFailed { .. })));

        assert!(package.decompress().is_err());
    }

    #[test]
    fn test_broken_resource_is_isolated() {
        let mut package = CompressedPackage::new("mixed.lvz");
        package.add_section(CompressedSection::compress("good.bm2", 5, b"pixels").unwrap()).unwrap();
        let mut bad = CompressedSection::compress("bad.bm2", 6, b"pixels").unwrap();
        bad.data = vec![0x78, 0x9C, 0xFF, 0xFF, 0xFF, 0xFF];
        package.add_section(bad).unwrap();
        package.add_section(CompressedSection::compress("tail.wa2", 7, b"sound").unwrap()).unwrap();

        let (decoded, failures) = package
            .decompress_recovering(&ParserConfig::default(), &ValidationConfig::default())
            .unwrap();
        let names: Vec<&str> = decoded.resources.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["good.bm2", "tail.wa2"]);
        assert_eq!(decoded.resources[0].data, b"pixels".to_vec());

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].index, 1);
        assert_eq!(failures[0].name, "bad.bm2");
        assert!(matches!(failures[0].error, LvzError::DecompressionFailed { .. }));

        match package.decompress() {
            Err(LvzError::DecompressionFailed { section, .. }) => assert_eq!(section, "bad.bm2"),
            other => panic!("Expected DecompressionFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_broken_object_section_stays_fatal() {
        let mut package = CompressedPackage::new("objects.lvz");
        let mut objects = CompressedSection::compress("", 0, b"CLV2").unwrap();
        objects.data = vec![0x78, 0x9C, 0xFF, 0xFF];
        package.add_section(objects).unwrap();
        package.add_section(CompressedSection::compress("good.bm2", 5, b"pixels").unwrap()).unwrap();

        assert!(matches!(
            package.decompress_recovering(&ParserConfig::default(), &ValidationConfig::default()),
            Err(LvzError::DecompressionFailed { .. })
        ));
    }

    #[test]
    fn test_inflation_stops_at_declared_size() {
        // 8 MiB of zeros deflate to a few KiB
        let bomb = vec![0u8; 8 * 1024 * 1024];
        let mut section = CompressedSection::compress("bomb.bm2", 5, &bomb).unwrap();
        assert!(section.data.len() < 64 * 1024);
        section.decompressed_size = 16;

        match section.inflate(&ParserConfig::security_focused()) {
            Err(LvzError::DataSizeExceedsLimit { field, size, limit }) => {
                assert!(field.contains("bomb.bm2"));
                assert_eq!(limit, 16);
                assert_eq!(size, 17);
            },
            other => panic!("Expected DataSizeExceedsLimit, got {:?}", other),
        }
    }

    #[test]
    fn test_total_size_checked_before_inflating() {
        let config = ParserConfig {
            max_total_size: 10,
            ..ParserConfig::default()
        };
        let mut package = CompressedPackage::new("");
        package.add_section(CompressedSection::compress("a", 5, &[1; 6]).unwrap()).unwrap();
        package.add_section(CompressedSection::compress("b", 5, &[2; 6]).unwrap()).unwrap();

        assert!(matches!(
            package.decompress_recovering(&config, &ValidationConfig::default()),
            Err(LvzError::DataSizeExceedsLimit { size: 12, limit: 10, .. })
        ));
    }

    #[test]
    fn test_declared_size_limit() {
        let mut package = CompressedPackage::new("");
        let mut section = CompressedSection::compress("big", 5, b"tiny").unwrap();
        section.decompressed_size = u32::MAX;
        package.add_section(section).unwrap();

        let results = package.decompress_sections(&ParserConfig::security_focused());
        assert!(matches!(results[0], Err(LvzError::DataSizeExceedsLimit { .. })));
    }

    #[test]
    fn test_resource_sections_become_resources() {
        let mut package = CompressedPackage::new("res.lvz");
        package
            .add_section(CompressedSection::compress("zone.cfg", 1_234, b"[Misc]").unwrap())
            .unwrap();

        let decoded = package.decompress().unwrap();
        assert_eq!(decoded.name, "res.lvz");
        assert_eq!(
            decoded.resources,
            vec![Resource {
                name: "zone.cfg".to_string(),
                data: b"[Misc]".to_vec(),
                time: 1_234,
            }]
        );
        assert!(decoded.images.is_empty());
    }
}
