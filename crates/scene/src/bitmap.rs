//! Bitmap node state.

use gpu::TextureKey;

/// A textured quad.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    texture: Option<TextureKey>,
    /// Display size.
    pub width: f32,
    pub height: f32,
    /// Display size fixed at creation instead of following the texture.
    sized: bool,
    /// URL textures are shared through the texture cache and never released
    /// by the node.
    owns_texture: bool,
}

impl Bitmap {
    /// Bitmap over a texture the node owns, `pixel_width` x `pixel_height`
    /// pixels. `size` fixes the display size.
    pub fn owned(texture: TextureKey, pixel_width: u32, pixel_height: u32, size: Option<(f32, f32)>) -> Self {
        let (width, height) = size.unwrap_or((pixel_width as f32, pixel_height as f32));
        Self { texture: Some(texture), width, height, sized: size.is_some(), owns_texture: true }
    }

    /// Bitmap whose shared texture is still loading. `size` fixes the display
    /// size; otherwise it follows the texture once attached.
    pub fn pending(size: Option<(f32, f32)>) -> Self {
        let (width, height) = size.unwrap_or((0.0, 0.0));
        Self { texture: None, width, height, sized: size.is_some(), owns_texture: false }
    }

    pub fn texture(&self) -> Option<TextureKey> {
        self.texture
    }

    pub fn owns_texture(&self) -> bool {
        self.owns_texture
    }

    /// Attach a texture of `width` x `height` pixels, or record new contents
    /// of the current one.
    pub fn attach(&mut self, texture: TextureKey, width: u32, height: u32) {
        self.texture = Some(texture);
        if !self.sized {
            self.width = width as f32;
            self.height = height as f32;
        }
    }

    pub(crate) fn take_owned_texture(&mut self) -> Option<TextureKey> {
        if self.owns_texture {
            self.texture.take()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn test_pending_follows_texture_size() {
        let mut keys: SlotMap<TextureKey, ()> = SlotMap::with_key();
        let key = keys.insert(());

        let mut b = Bitmap::pending(None);
        assert_eq!((b.width, b.height), (0.0, 0.0));
        b.attach(key, 64, 32);
        assert_eq!((b.width, b.height), (64.0, 32.0));
        assert_eq!(b.take_owned_texture(), None);

        let mut fixed = Bitmap::pending(Some((10.0, 10.0)));
        fixed.attach(key, 64, 32);
        assert_eq!((fixed.width, fixed.height), (10.0, 10.0));

        let mut owned = Bitmap::owned(key, 4, 2, None);
        assert_eq!((owned.width, owned.height), (4.0, 2.0));
        owned.attach(key, 8, 8);
        assert_eq!((owned.width, owned.height), (8.0, 8.0));
        assert!(Bitmap::owned(key, 4, 2, Some((1.0, 1.0))).owns_texture());
        assert_eq!(owned.take_owned_texture(), Some(key));
        assert_eq!(owned.texture(), None);
    }
}
