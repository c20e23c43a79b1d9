//! LVZ and ELVL Test Data Builders
//!
//! Builder pattern implementations for generating packages and map files,
//! including legacy encodings and damaged data for error testing.

use bytes::{BufMut, BytesMut};
use lvz_parser::{
    lvz::{pack_mode_time, pack_object_header, write_object_section},
    elvl::Attribute, AutoWarp, CompiledImage, CompiledMapObject,
    CompiledScreenObject, CompressedSection, ElvlChunk, ElvlCollection, ImageIndex, LevelFile,
    LvzPackage, LvzResult, LvzWriter, MapTile, RawChunk, Region, RegionColor, Resource,
};

/// Main builder for LVZ packages with a fluent API
#[derive(Debug)]
pub struct LvzBuilder {
    name: String,
    resources: Vec<(String, Vec<u8>, i64)>,
    objects: ObjectsBuilder,
    legacy: bool,
    foreign_sections: Vec<([u8; 4], String, Vec<u8>)>,
}

impl Default for LvzBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LvzBuilder {
    pub fn new() -> Self {
        Self {
            name: "test.lvz".to_string(),
            resources: Vec::new(),
            objects: ObjectsBuilder::default(),
            legacy: false,
            foreign_sections: Vec::new(),
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Embed a resource file
    pub fn resource(mut self, name: &str, data: &[u8], time: i64) -> Self {
        self.resources.push((name.to_string(), data.to_vec(), time));
        self
    }

    /// Configure images and objects
    pub fn objects<F>(mut self, f: F) -> Self
    where
        F: FnOnce(ObjectsBuilder) -> ObjectsBuilder,
    {
        self.objects = f(self.objects);
        self
    }

    /// Store the object section under the old `CLV1` tag
    pub fn legacy_clv1(mut self) -> Self {
        self.legacy = true;
        self
    }

    /// Append a section stored under a magic other than `CONT`
    pub fn foreign_section(mut self, magic: &[u8; 4], name: &str, data: &[u8]) -> Self {
        self.foreign_sections
            .push((*magic, name.to_string(), data.to_vec()));
        self
    }

    /// Build the package model, validating every entity on the way in
    pub fn build(self) -> LvzResult<LvzPackage> {
        let mut package = LvzPackage::new(&self.name);
        for (name, data, time) in self.resources {
            package.add_resource(Resource::new(name, data, time)?)?;
        }
        for image in self.objects.images {
            package.add_image(image)?;
        }
        for object in self.objects.map_objects {
            package.add_map_object(object)?;
        }
        for object in self.objects.screen_objects {
            package.add_screen_object(object)?;
        }
        Ok(package)
    }

    /// Build as bytes, applying any legacy tag and foreign sections
    pub fn build_bytes(self) -> LvzResult<Vec<u8>> {
        let legacy = self.legacy;
        let foreign_sections = self.foreign_sections.clone();
        let package = self.build()?;
        let mut compiled = package.compile()?;

        if legacy && package.has_object_data() {
            let payload = legacy_object_section(&package)?;
            compiled.sections[0] = CompressedSection::compress("", 0, &payload)?;
        }

        let mut buffer = BytesMut::new();
        buffer.put_slice(b"CONT");
        buffer.put_u32_le((compiled.sections.len() + foreign_sections.len()) as u32);
        for section in &compiled.sections {
            section.to_bytes(&mut buffer)?;
        }
        for (magic, name, data) in foreign_sections {
            let start = buffer.len();
            CompressedSection::compress(&name, 1, &data)?.to_bytes(&mut buffer)?;
            buffer[start..start + 4].copy_from_slice(&magic);
        }
        Ok(buffer.to_vec())
    }
}

/// `CLV1` object data: screen coordinates are plain 16-bit offsets without anchors
fn legacy_object_section(package: &LvzPackage) -> LvzResult<BytesMut> {
    let mut buffer = BytesMut::new();
    buffer.put_slice(b"CLV1");
    buffer.put_u32_le((package.map_objects.len() + package.screen_objects.len()) as u32);
    buffer.put_u32_le(package.images.len() as u32);
    for object in &package.map_objects {
        buffer.put_u16_le(pack_object_header(object.id, true)?);
        buffer.put_i16_le(object.x as i16);
        buffer.put_i16_le(object.y as i16);
        buffer.put_u8(object.image.get() as u8);
        buffer.put_u8(object.layer);
        buffer.put_u16_le(pack_mode_time(object.mode, object.display_time)?);
    }
    for object in &package.screen_objects {
        buffer.put_u16_le(pack_object_header(object.id, false)?);
        buffer.put_i16_le(object.x as i16);
        buffer.put_i16_le(object.y as i16);
        buffer.put_u8(object.image.get() as u8);
        buffer.put_u8(object.layer);
        buffer.put_u16_le(pack_mode_time(object.mode, object.display_time)?);
    }
    for image in &package.images {
        buffer.put_i16_le(image.x_frames as i16);
        buffer.put_i16_le(image.y_frames as i16);
        buffer.put_i16_le(image.animation_time as i16);
        buffer.put_slice(image.file_name.as_bytes());
        buffer.put_u8(0);
    }
    Ok(buffer)
}

/// Builder for the object data of a package
#[derive(Debug, Default)]
pub struct ObjectsBuilder {
    images: Vec<CompiledImage>,
    map_objects: Vec<CompiledMapObject>,
    screen_objects: Vec<CompiledScreenObject>,
    last_added: Option<LastObject>,
}

#[derive(Debug, Clone, Copy)]
enum LastObject {
    Map,
    Screen,
}

impl ObjectsBuilder {
    /// Add an image definition; objects refer to it by insertion order
    pub fn image(mut self, file_name: &str, x_frames: i32, y_frames: i32, animation_time: i32) -> Self {
        self.images.push(CompiledImage {
            file_name: file_name.to_string(),
            x_frames,
            y_frames,
            animation_time,
        });
        self
    }

    /// Map object on the default layer, always shown
    pub fn map_object(mut self, id: u16, x: i32, y: i32, image: usize) -> Self {
        self.map_objects.push(CompiledMapObject {
            id,
            x,
            y,
            image: ImageIndex::new(image),
            layer: 0,
            mode: 0,
            display_time: 0,
        });
        self.last_added = Some(LastObject::Map);
        self
    }

    /// Screen object; coordinates are `(offset, anchor type)` pairs
    pub fn screen_object(mut self, id: u16, x: (i32, u8), y: (i32, u8), image: usize) -> Self {
        self.screen_objects.push(CompiledScreenObject {
            id,
            x: x.0,
            x_type: x.1,
            y: y.0,
            y_type: y.1,
            image: ImageIndex::new(image),
            layer: 0,
            mode: 0,
            display_time: 0,
        });
        self.last_added = Some(LastObject::Screen);
        self
    }

    /// Set layer, display mode and display time of the object added last
    pub fn display(mut self, layer: u8, mode: u8, display_time: u32) -> Self {
        match self.last_added {
            Some(LastObject::Screen) => {
                if let Some(object) = self.screen_objects.last_mut() {
                    object.layer = layer;
                    object.mode = mode;
                    object.display_time = display_time;
                }
            },
            Some(LastObject::Map) => {
                if let Some(object) = self.map_objects.last_mut() {
                    object.layer = layer;
                    object.mode = mode;
                    object.display_time = display_time;
                }
            },
            None => {},
        }
        self
    }
}

/// Ready-made packages
pub struct LvzGenerators;

impl LvzGenerators {
    /// One image shown on the map and on screen, plus its bitmap
    pub fn banner_package() -> LvzBuilder {
        LvzBuilder::new()
            .name("banner.lvz")
            .resource("banner.bm2", &[0x42; 96], 1_100_000_000)
            .resource("intro.wa2", b"RIFF....WAVE", 1_100_000_500)
            .objects(|o| {
                o.image("banner.bm2", 4, 2, 150)
                    .map_object(10, 512, -512, 0)
                    .display(3, 1, 500)
                    .screen_object(11, (-20, 2), (15, 5), 0)
                    .display(7, 2, 4095)
            })
    }

    /// Resources only, no object section
    pub fn resources_only() -> LvzBuilder {
        LvzBuilder::new()
            .name("sounds.lvz")
            .resource("zeta.wa2", &[1, 2, 3], 7)
            .resource("alpha.wa2", &[4, 5, 6], 8)
    }

    /// A `CLV1` package as written by older tools
    pub fn legacy_package() -> LvzBuilder {
        LvzBuilder::new()
            .name("legacy.lvz")
            .legacy_clv1()
            .resource("old.bmp", &[0x0F; 32], 900_000_000)
            .objects(|o| {
                o.image("old.bmp", 1, 1, 0)
                    .map_object(1, 100, 200, 0)
                    .screen_object(2, (30, 0), (40, 0), 0)
            })
    }
}

/// Damaged packages for error testing
pub struct InvalidLvzGenerators;

impl InvalidLvzGenerators {
    /// Container magic is not `CONT`
    pub fn invalid_magic() -> Vec<u8> {
        let mut data = LvzGenerators::resources_only().build_bytes().unwrap();
        data[..4].copy_from_slice(b"CONX");
        data
    }

    /// Cut off inside the last section's payload
    pub fn truncated() -> Vec<u8> {
        let mut data = LvzGenerators::banner_package().build_bytes().unwrap();
        data.truncate(data.len() - 3);
        data
    }

    /// A resource whose header disagrees with its inflated size
    pub fn size_mismatch() -> Vec<u8> {
        let mut section = CompressedSection::compress("wrong.bin", 5, &[9; 40]).unwrap();
        section.decompressed_size = 41;
        let mut buffer = BytesMut::new();
        buffer.put_slice(b"CONT");
        buffer.put_u32_le(1);
        section.to_bytes(&mut buffer).unwrap();
        buffer.to_vec()
    }

    /// Two good resources around one whose stream is not DEFLATE data
    pub fn one_corrupt_resource() -> Vec<u8> {
        let mut corrupt = CompressedSection::compress("bad.bm2", 6, &[7; 32]).unwrap();
        corrupt.data = vec![0x78, 0x9C, 0xFF, 0xFF, 0xFF, 0xFF];
        let mut buffer = BytesMut::new();
        buffer.put_slice(b"CONT");
        buffer.put_u32_le(3);
        CompressedSection::compress("good.bm2", 5, &[1; 32])
            .unwrap()
            .to_bytes(&mut buffer)
            .unwrap();
        corrupt.to_bytes(&mut buffer).unwrap();
        CompressedSection::compress("theme.wa2", 7, b"RIFF")
            .unwrap()
            .to_bytes(&mut buffer)
            .unwrap();
        buffer.to_vec()
    }

    /// Object section whose map object points past the image table
    pub fn dangling_image_index() -> Vec<u8> {
        let mut payload = BytesMut::new();
        let image = CompiledImage {
            file_name: "only.bm2".to_string(),
            x_frames: 1,
            y_frames: 1,
            animation_time: 0,
        };
        let object = CompiledMapObject {
            id: 1,
            x: 0,
            y: 0,
            image: ImageIndex::new(3),
            layer: 0,
            mode: 0,
            display_time: 0,
        };
        write_object_section(&mut payload, &[image], &[object], &[]).unwrap();

        let mut buffer = BytesMut::new();
        buffer.put_slice(b"CONT");
        buffer.put_u32_le(1);
        CompressedSection::compress("", 0, &payload)
            .unwrap()
            .to_bytes(&mut buffer)
            .unwrap();
        buffer.to_vec()
    }
}

/// Builder for map files carrying ELVL metadata
#[derive(Debug)]
pub struct ElvlBuilder {
    collection: ElvlCollection,
    bitmap_len: usize,
    tiles: Vec<MapTile>,
}

impl Default for ElvlBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ElvlBuilder {
    pub fn new() -> Self {
        Self {
            collection: ElvlCollection::default(),
            bitmap_len: 54,
            tiles: Vec::new(),
        }
    }

    pub fn attribute(mut self, key: &str, value: &str) -> Self {
        self.collection.attributes.push(Attribute::new(key, value));
        self
    }

    /// Configure a region
    pub fn region<F>(mut self, name: &str, f: F) -> Self
    where
        F: FnOnce(RegionBuilder) -> RegionBuilder,
    {
        self.collection.regions.push(f(RegionBuilder::new(name)).build());
        self
    }

    /// Top-level chunk the library does not interpret
    pub fn raw_chunk(mut self, tag: &[u8; 4], data: &[u8]) -> Self {
        self.collection.chunks.push(ElvlChunk::Raw {
            tag: *tag,
            data: data.to_vec(),
        });
        self
    }

    pub fn wall_tiles(mut self, tiles: [u8; 16]) -> Self {
        self.collection.chunks.push(ElvlChunk::WallTiles(tiles));
        self
    }

    /// Size of the tileset bitmap placed before the metadata
    pub fn bitmap_len(mut self, len: usize) -> Self {
        self.bitmap_len = len;
        self
    }

    pub fn tile(mut self, x: u16, y: u16, tile: u8) -> Self {
        self.tiles.push(MapTile { x, y, tile });
        self
    }

    pub fn build(self) -> ElvlCollection {
        self.collection
    }

    /// Encode a whole `.lvl` file: bitmap, metadata, tile records
    pub fn build_map_bytes(self) -> LvzResult<Vec<u8>> {
        let mut bitmap = vec![0x11; self.bitmap_len];
        bitmap[..2].copy_from_slice(b"BM");
        let mut level = LevelFile {
            bitmap,
            elvl: self.collection,
            tile_data: Vec::new(),
        };
        level.set_tiles(&self.tiles)?;
        level.to_bytes()
    }
}

/// Builder for a single region
#[derive(Debug)]
pub struct RegionBuilder {
    region: Region,
}

impl RegionBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            region: Region::new(name),
        }
    }

    /// Mark every tile of an inclusive rectangle
    pub fn rect(mut self, x0: usize, y0: usize, x1: usize, y1: usize) -> Self {
        for y in y0..=y1 {
            for x in x0..=x1 {
                self.region.tiles.set(x, y, true);
            }
        }
        self
    }

    pub fn tile(mut self, x: usize, y: usize) -> Self {
        self.region.tiles.set(x, y, true);
        self
    }

    pub fn base(mut self) -> Self {
        self.region.is_base = true;
        self
    }

    pub fn no_antiwarp(mut self) -> Self {
        self.region.no_antiwarp = true;
        self
    }

    pub fn no_weapons(mut self) -> Self {
        self.region.no_weapons = true;
        self
    }

    pub fn no_flag_drops(mut self) -> Self {
        self.region.no_flag_drops = true;
        self
    }

    pub fn auto_warp(mut self, x: i16, y: i16, arena: Option<&str>) -> Self {
        self.region.auto_warp = Some(AutoWarp {
            x,
            y,
            arena: arena.map(str::to_string),
        });
        self
    }

    pub fn color(mut self, r: u8, g: u8, b: u8) -> Self {
        self.region.color = Some(RegionColor { r, g, b });
        self
    }

    pub fn python(mut self, code: &str) -> Self {
        self.region.python = Some(code.to_string());
        self
    }

    /// Sub-chunk the library does not interpret
    pub fn unknown_chunk(mut self, tag: &[u8; 4], data: &[u8]) -> Self {
        self.region
            .unknown_chunks
            .push(RawChunk::new(*tag, data.to_vec()));
        self
    }

    pub fn build(self) -> Region {
        self.region
    }
}
