use image::RgbaImage;

/// One-slot buffer for a portrait waiting for a partner.
///
/// Owned by a single display surface; a surface never holds more than one
/// portrait, and a held portrait is consumed by the first pairing it joins.
#[derive(Debug, Clone, Default)]
pub struct PortraitHold {
    slot: Option<RgbaImage>,
}

impl PortraitHold {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }

    pub fn peek(&self) -> Option<&RgbaImage> {
        self.slot.as_ref()
    }

    /// Removes and returns the held portrait, leaving the slot empty.
    pub fn take(&mut self) -> Option<RgbaImage> {
        self.slot.take()
    }

    /// Stores `portrait`, replacing anything already held.
    pub fn hold(&mut self, portrait: RgbaImage) {
        self.slot = Some(portrait);
    }
}
