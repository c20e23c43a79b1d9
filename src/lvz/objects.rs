//! Object-data section: image definitions and placed objects
//!
//! Layout: format tag, object count, image count, object records, image records.
//! `CLV2` records are ten bytes with several values packed into shared words;
//! `CLV1` stores screen coordinates as plain 16-bit values without anchors.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::{LvzError, LvzResult};
use crate::parser_config::ParserConfig;
use crate::traits::{LvzParser, LvzWriter};
use crate::utils::{ensure_remaining, get_cstring, get_tag, tag_to_string, write_cstring};
use crate::validation::{LvzValidate, ValidationContext};

/// Largest display time the packed mode/time word can hold
pub const MAX_ENCODED_DISPLAY_TIME: u32 = 0x0FFF;

/// Largest image index an object record can hold
pub const MAX_ENCODED_IMAGE_INDEX: usize = 0xFF;

/// Largest animation time an image record can hold
pub const MAX_ENCODED_ANIMATION_TIME: i32 = i16::MAX as i32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectFormat {
    /// Legacy layout, read only
    Clv1,
    Clv2,
}

impl ObjectFormat {
    pub fn tag(self) -> [u8; 4] {
        match self {
            Self::Clv1 => *b"CLV1",
            Self::Clv2 => *b"CLV2",
        }
    }

    pub fn from_tag(tag: &[u8; 4]) -> Option<Self> {
        match tag {
            b"CLV1" => Some(Self::Clv1),
            b"CLV2" => Some(Self::Clv2),
            _ => None,
        }
    }
}

/// When an object is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisplayMode {
    ShowAlways = 0,
    EnterZone = 1,
    EnterArena = 2,
    Kill = 3,
    Death = 4,
    ServerControlled = 5,
}

impl DisplayMode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::ShowAlways),
            1 => Some(Self::EnterZone),
            2 => Some(Self::EnterArena),
            3 => Some(Self::Kill),
            4 => Some(Self::Death),
            5 => Some(Self::ServerControlled),
            _ => None,
        }
    }
}

/// Draw order relative to the rest of the game screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RenderLayer {
    BelowAll = 0,
    AfterBackground = 1,
    AfterTiles = 2,
    AfterWeapons = 3,
    AfterShips = 4,
    AfterGauges = 5,
    AfterChat = 6,
    TopMost = 7,
}

impl RenderLayer {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::BelowAll),
            1 => Some(Self::AfterBackground),
            2 => Some(Self::AfterTiles),
            3 => Some(Self::AfterWeapons),
            4 => Some(Self::AfterShips),
            5 => Some(Self::AfterGauges),
            6 => Some(Self::AfterChat),
            7 => Some(Self::TopMost),
            _ => None,
        }
    }
}

/// Screen position a screen object's coordinate is relative to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScreenAnchor {
    /// Top left corner of the screen
    Normal = 0,
    Center = 1,
    BottomRight = 2,
    StatsBox = 3,
    SpecialsTopRight = 4,
    SpecialsBottomRight = 5,
    BelowEnergy = 6,
    ChatTopLeft = 7,
    RadarTopLeft = 8,
    RadarText = 9,
    WeaponsTopLeft = 10,
    WeaponsBottomLeft = 11,
}

impl ScreenAnchor {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Normal),
            1 => Some(Self::Center),
            2 => Some(Self::BottomRight),
            3 => Some(Self::StatsBox),
            4 => Some(Self::SpecialsTopRight),
            5 => Some(Self::SpecialsBottomRight),
            6 => Some(Self::BelowEnergy),
            7 => Some(Self::ChatTopLeft),
            8 => Some(Self::RadarTopLeft),
            9 => Some(Self::RadarText),
            10 => Some(Self::WeaponsTopLeft),
            11 => Some(Self::WeaponsBottomLeft),
            _ => None,
        }
    }

    /// Single-letter prefix used in coordinate strings ("C-20")
    pub fn prefix(self) -> Option<char> {
        match self {
            Self::Normal => None,
            Self::Center => Some('C'),
            Self::BottomRight => Some('B'),
            Self::StatsBox => Some('S'),
            Self::SpecialsTopRight => Some('G'),
            Self::SpecialsBottomRight => Some('F'),
            Self::BelowEnergy => Some('E'),
            Self::ChatTopLeft => Some('T'),
            Self::RadarTopLeft => Some('R'),
            Self::RadarText => Some('O'),
            Self::WeaponsTopLeft => Some('W'),
            Self::WeaponsBottomLeft => Some('V'),
        }
    }
}

/// Position of an image within its package's image list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageIndex(usize);

impl ImageIndex {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn get(self) -> usize {
        self.0
    }
}

/// Image definition: file name plus animation layout
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompiledImage {
    pub file_name: String,
    pub x_frames: i32,
    pub y_frames: i32,
    /// Time for one full animation cycle, in 1/100 s
    pub animation_time: i32,
}

impl CompiledImage {
    /// Build an image definition from user input, rejecting out-of-range values
    pub fn new(
        file_name: impl Into<String>,
        x_frames: i32,
        y_frames: i32,
        animation_time: i32,
    ) -> LvzResult<Self> {
        let image = Self {
            file_name: file_name.into(),
            x_frames,
            y_frames,
            animation_time,
        };
        image.validate(&ValidationContext::default())?;
        Ok(image)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledMapObject {
    pub id: u16,
    pub x: i32,
    pub y: i32,
    pub image: ImageIndex,
    pub layer: u8,
    pub mode: u8,
    /// 1/10 s; 0 shows the object indefinitely
    pub display_time: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledScreenObject {
    pub id: u16,
    pub x: i32,
    pub x_type: u8,
    pub y: i32,
    pub y_type: u8,
    pub image: ImageIndex,
    pub layer: u8,
    pub mode: u8,
    pub display_time: u32,
}

impl CompiledMapObject {
    pub fn layer(&self) -> Option<RenderLayer> {
        RenderLayer::from_u8(self.layer)
    }

    pub fn mode(&self) -> Option<DisplayMode> {
        DisplayMode::from_u8(self.mode)
    }
}

impl CompiledScreenObject {
    pub fn layer(&self) -> Option<RenderLayer> {
        RenderLayer::from_u8(self.layer)
    }

    pub fn mode(&self) -> Option<DisplayMode> {
        DisplayMode::from_u8(self.mode)
    }

    pub fn x_anchor(&self) -> Option<ScreenAnchor> {
        ScreenAnchor::from_u8(self.x_type)
    }

    pub fn y_anchor(&self) -> Option<ScreenAnchor> {
        ScreenAnchor::from_u8(self.y_type)
    }
}

fn not_encodable(field: &str, value: i64, max: i64) -> LvzError {
    LvzError::FieldNotEncodable {
        field: field.to_string(),
        value,
        max,
    }
}

/// `(id << 1) | is_map`
pub fn pack_object_header(id: u16, is_map: bool) -> LvzResult<u16> {
    if id > 0x7FFF {
        return Err(not_encodable("object id", i64::from(id), 0x7FFF));
    }
    Ok((id << 1) | u16::from(is_map))
}

pub fn unpack_object_header(word: u16) -> (u16, bool) {
    (word >> 1, word & 1 == 1)
}

/// `(mode << 12) | time`; the time keeps 12 bits
pub fn pack_mode_time(mode: u8, display_time: u32) -> LvzResult<u16> {
    if mode > 0x0F {
        return Err(not_encodable("display mode", i64::from(mode), 0x0F));
    }
    if display_time > MAX_ENCODED_DISPLAY_TIME {
        return Err(not_encodable(
            "display time",
            i64::from(display_time),
            i64::from(MAX_ENCODED_DISPLAY_TIME),
        ));
    }
    Ok((u16::from(mode) << 12) | display_time as u16)
}

pub fn unpack_mode_time(word: u16) -> (u8, u32) {
    ((word >> 12) as u8, u32::from(word & 0x0FFF))
}

/// `(coordinate << 4) | anchor`, coordinate as signed 12 bits
pub fn pack_screen_coordinate(coordinate: i32, anchor: u8, field: &str) -> LvzResult<u16> {
    if !(-2048..=2047).contains(&coordinate) {
        return Err(not_encodable(field, i64::from(coordinate), 2047));
    }
    if anchor > 0x0F {
        return Err(not_encodable("screen coordinate type", i64::from(anchor), 0x0F));
    }
    Ok(((coordinate as u16) << 4) | u16::from(anchor))
}

pub fn unpack_screen_coordinate(word: u16) -> (i32, u8) {
    (i32::from((word as i16) >> 4), (word & 0x0F) as u8)
}

fn map_coordinate(value: i32, field: &str) -> LvzResult<i16> {
    i16::try_from(value).map_err(|_| not_encodable(field, i64::from(value), i64::from(i16::MAX)))
}

fn image_index_byte(index: ImageIndex) -> LvzResult<u8> {
    u8::try_from(index.get())
        .map_err(|_| not_encodable("image index", index.get() as i64, MAX_ENCODED_IMAGE_INDEX as i64))
}

/// Decoded object-data section, before image indices are checked
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObjectSection {
    pub format: Option<ObjectFormat>,
    pub images: Vec<CompiledImage>,
    pub map_objects: Vec<CompiledMapObject>,
    pub screen_objects: Vec<CompiledScreenObject>,
}

/// Size of one object record
const OBJECT_RECORD_LEN: usize = 10;

/// Size of an image record without its file name
const IMAGE_RECORD_FIXED_LEN: usize = 6;

impl ObjectSection {
    pub fn from_bytes_with_config(data: &mut Bytes, config: &ParserConfig) -> LvzResult<Self> {
        let total = data.len();
        let tag = get_tag(data, 0)?;
        let format = ObjectFormat::from_tag(&tag).ok_or_else(|| LvzError::UnsupportedObjectFormat {
            found: tag_to_string(&tag),
        })?;
        if format == ObjectFormat::Clv1 {
            warn!("object section uses the legacy CLV1 layout; screen anchors default to normal");
        }

        ensure_remaining(data, 8, 4)?;
        let object_count = data.get_u32_le() as usize;
        let image_count = data.get_u32_le() as usize;
        config.check_object_counts(object_count, image_count)?;

        // Records are fixed size, so a hostile count fails before any allocation
        let needed = object_count
            .saturating_mul(OBJECT_RECORD_LEN)
            .saturating_add(image_count.saturating_mul(IMAGE_RECORD_FIXED_LEN));
        ensure_remaining(data, needed, 12)?;

        let mut section = Self {
            format: Some(format),
            ..Self::default()
        };

        for _ in 0..object_count {
            let (id, is_map) = unpack_object_header(data.get_u16_le());
            if is_map {
                let x = i32::from(data.get_i16_le());
                let y = i32::from(data.get_i16_le());
                let image = ImageIndex::new(usize::from(data.get_u8()));
                let layer = data.get_u8();
                let (mode, display_time) = unpack_mode_time(data.get_u16_le());
                section.map_objects.push(CompiledMapObject {
                    id,
                    x,
                    y,
                    image,
                    layer,
                    mode,
                    display_time,
                });
            } else {
                let ((x, x_type), (y, y_type)) = match format {
                    ObjectFormat::Clv1 => (
                        (i32::from(data.get_i16_le()), 0),
                        (i32::from(data.get_i16_le()), 0),
                    ),
                    ObjectFormat::Clv2 => (
                        unpack_screen_coordinate(data.get_u16_le()),
                        unpack_screen_coordinate(data.get_u16_le()),
                    ),
                };
                let image = ImageIndex::new(usize::from(data.get_u8()));
                let layer = data.get_u8();
                let (mode, display_time) = unpack_mode_time(data.get_u16_le());
                section.screen_objects.push(CompiledScreenObject {
                    id,
                    x,
                    x_type,
                    y,
                    y_type,
                    image,
                    layer,
                    mode,
                    display_time,
                });
            }
        }

        for _ in 0..image_count {
            let offset = total - data.len();
            ensure_remaining(data, IMAGE_RECORD_FIXED_LEN, offset)?;
            let x_frames = i32::from(data.get_i16_le());
            let y_frames = i32::from(data.get_i16_le());
            let animation_time = i32::from(data.get_i16_le());
            let file_name = get_cstring(data, offset + IMAGE_RECORD_FIXED_LEN)?;
            section.images.push(CompiledImage {
                file_name,
                x_frames,
                y_frames,
                animation_time,
            });
        }

        if data.has_remaining() {
            debug!(trailing = data.remaining(), "object section has trailing bytes");
        }
        debug!(
            format = ?format,
            map_objects = section.map_objects.len(),
            screen_objects = section.screen_objects.len(),
            images = section.images.len(),
            "decoded object section"
        );
        Ok(section)
    }

    pub fn object_count(&self) -> usize {
        self.map_objects.len() + self.screen_objects.len()
    }
}

impl LvzParser for ObjectSection {
    fn from_bytes(data: &mut Bytes) -> LvzResult<Self> {
        Self::from_bytes_with_config(data, &ParserConfig::default())
    }
}

/// Write a `CLV2` object-data payload
pub fn write_object_section(
    buffer: &mut BytesMut,
    images: &[CompiledImage],
    map_objects: &[CompiledMapObject],
    screen_objects: &[CompiledScreenObject],
) -> LvzResult<()> {
    let count = |value: usize, field: &str| {
        u32::try_from(value).map_err(|_| not_encodable(field, value as i64, i64::from(u32::MAX)))
    };

    buffer.put_slice(&ObjectFormat::Clv2.tag());
    buffer.put_u32_le(count(map_objects.len() + screen_objects.len(), "object count")?);
    buffer.put_u32_le(count(images.len(), "image count")?);

    for object in map_objects {
        buffer.put_u16_le(pack_object_header(object.id, true)?);
        buffer.put_i16_le(map_coordinate(object.x, "map x")?);
        buffer.put_i16_le(map_coordinate(object.y, "map y")?);
        buffer.put_u8(image_index_byte(object.image)?);
        buffer.put_u8(object.layer);
        buffer.put_u16_le(pack_mode_time(object.mode, object.display_time)?);
    }

    for object in screen_objects {
        buffer.put_u16_le(pack_object_header(object.id, false)?);
        buffer.put_u16_le(pack_screen_coordinate(object.x, object.x_type, "screen x")?);
        buffer.put_u16_le(pack_screen_coordinate(object.y, object.y_type, "screen y")?);
        buffer.put_u8(image_index_byte(object.image)?);
        buffer.put_u8(object.layer);
        buffer.put_u16_le(pack_mode_time(object.mode, object.display_time)?);
    }

    for image in images {
        for (field, value) in [
            ("x frames", image.x_frames),
            ("y frames", image.y_frames),
            ("animation time", image.animation_time),
        ] {
            let value = i16::try_from(value).map_err(|_| {
                not_encodable(field, i64::from(value), i64::from(MAX_ENCODED_ANIMATION_TIME))
            })?;
            buffer.put_i16_le(value);
        }
        write_cstring(buffer, &image.file_name, "image file name")?;
    }

    Ok(())
}

/// Always writes `CLV2`, whatever the section was read from
impl LvzWriter for ObjectSection {
    fn to_bytes(&self, buffer: &mut BytesMut) -> LvzResult<()> {
        write_object_section(buffer, &self.images, &self.map_objects, &self.screen_objects)
    }
}
