//! Texture lookup seam
//!
//! Pixel data lives outside the model. Hosts implement [`TextureResolver`] to
//! map a texture reference to whatever image container they use.

use super::Texture;

pub trait TextureResolver {
    type Image;

    fn resolve(&self, texture: &Texture) -> Option<Self::Image>;
}

impl<F, I> TextureResolver for F
where
    F: Fn(&Texture) -> Option<I>,
{
    type Image = I;

    fn resolve(&self, texture: &Texture) -> Option<I> {
        self(texture)
    }
}

#[cfg(test)]
mod tests {
    use hashbrown::HashMap;

    use super::*;
    use crate::model::MaterialInstance;

    struct Library(HashMap<String, u32>);

    impl TextureResolver for Library {
        type Image = u32;

        fn resolve(&self, texture: &Texture) -> Option<u32> {
            self.0
                .get(&format!("{}{}", texture.directory, texture.filename))
                .copied()
        }
    }

    fn material() -> MaterialInstance {
        let texture = |name: &str| Texture {
            directory: "/tex/".into(),
            filename: name.into(),
        };
        MaterialInstance {
            textures: vec![
                ("Base_Tex_SRGB".into(), texture("base.ftex")),
                ("NormalMap_Tex_NRM".into(), texture("missing.ftex")),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_textures() {
        let library = Library(HashMap::from([("/tex/base.ftex".to_string(), 7)]));
        let material = material();
        let resolved = material.resolve_textures(&library);
        assert_eq!(resolved, [("Base_Tex_SRGB", Some(7)), ("NormalMap_Tex_NRM", None)]);
    }

    #[test]
    fn test_closure_resolver() {
        let resolver = |t: &Texture| Some(t.filename.len());
        let material = material();
        let resolved = material.resolve_textures(&resolver);
        assert_eq!(resolved[1], ("NormalMap_Tex_NRM", Some(12)));
    }
}
