pub type ObjectId = u32;

/// RGB display colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color(pub u8, pub u8, pub u8);

pub const DEFAULT_PALETTE: [Color; 8] = [
    Color(0, 0, 255),
    Color(0, 255, 0),
    Color(255, 0, 0),
    Color(0, 255, 255),
    Color(255, 0, 255),
    Color(255, 255, 0),
    Color(128, 0, 128),
    Color(255, 165, 0),
];

impl Color {
    /// Pick a palette entry for an object id, wrapping around.
    ///
    /// Ids are allocated from 1, so id 1 takes the first entry.
    pub fn for_object(object_id: ObjectId, palette: &[Color]) -> Color {
        if palette.is_empty() {
            return DEFAULT_PALETTE[0];
        }
        let slot = (object_id.saturating_sub(1) as usize) % palette.len();
        palette[slot]
    }
}

/// A logical object tracked across frames
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectDefinition {
    pub id: ObjectId,
    pub name: String,
    pub color: Color,
}
