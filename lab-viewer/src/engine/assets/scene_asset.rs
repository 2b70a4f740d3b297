use std::borrow::Cow;
use std::collections::HashMap;

use base64::Engine;
use bevy::prelude::*;
use thiserror::Error;

use crate::engine::assets::bounds::SceneBounds;
use constants::render_settings::DEFAULT_SURFACE_COLOUR;

/// Bytes of files a glTF document references by relative URI, keyed by the URI as written.
pub type ExternalFiles = HashMap<String, Vec<u8>>;

#[derive(Debug, Error)]
pub enum SceneDecodeError {
    #[error(transparent)]
    Gltf(#[from] gltf::Error),
    #[error("missing external buffer {0}")]
    MissingBuffer(String),
    #[error("buffer {index} holds {actual} bytes, expected {expected}")]
    BufferLength {
        index: usize,
        expected: usize,
        actual: usize,
    },
}

/// Relative URIs a document needs fetched before it can be decoded.
#[derive(Debug, Default, PartialEq)]
pub struct ExternalRefs {
    /// Geometry buffers. A model without them cannot be built.
    pub buffers: Vec<String>,
    /// Images. A missing one leaves its surfaces untextured.
    pub images: Vec<String>,
}

impl ExternalRefs {
    pub fn of(document: &gltf::Document) -> Self {
        let mut refs = Self::default();
        for buffer in document.buffers() {
            if let gltf::buffer::Source::Uri(uri) = buffer.source() {
                if is_external(uri) && !refs.buffers.iter().any(|b| b == uri) {
                    refs.buffers.push(uri.to_string());
                }
            }
        }
        for image in document.images() {
            if let gltf::image::Source::Uri { uri, .. } = image.source() {
                if is_external(uri) && !refs.images.iter().any(|i| i == uri) {
                    refs.images.push(uri.to_string());
                }
            }
        }
        refs
    }
}

fn is_external(uri: &str) -> bool {
    !uri.starts_with("data:")
}

/// Decoded base-colour image, tightly packed RGBA8.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// One triangle-list primitive from a decoded model, in model space.
#[derive(Debug, Clone)]
pub struct SurfaceGeometry {
    pub node_name: Option<String>,
    pub mesh_name: Option<String>,
    pub material_name: Option<String>,
    pub base_colour: [f32; 4],
    /// Index into [`SceneAsset::textures`].
    pub base_colour_texture: Option<usize>,
    pub positions: Vec<[f32; 3]>,
    pub normals: Option<Vec<[f32; 3]>>,
    pub uvs: Option<Vec<[f32; 2]>>,
    pub indices: Vec<u32>,
    /// Node-to-model transform accumulated through the node hierarchy.
    pub transform: Mat4,
}

impl SurfaceGeometry {
    /// Names checked when classifying the surface, most specific first.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        [&self.material_name, &self.mesh_name, &self.node_name]
            .into_iter()
            .filter_map(|n| n.as_deref())
    }

    /// Triangles in model space.
    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.indices.chunks_exact(3).filter_map(|tri| {
            let p = |i: u32| self.positions.get(i as usize).map(|v| Vec3::from_array(*v));
            Some([
                self.transform.transform_point3(p(tri[0])?),
                self.transform.transform_point3(p(tri[1])?),
                self.transform.transform_point3(p(tri[2])?),
            ])
        })
    }

    /// Bounds in model space, `None` for a surface without vertices.
    pub fn local_bounds(&self) -> Option<SceneBounds> {
        SceneBounds::from_points(
            self.positions
                .iter()
                .map(|p| self.transform.transform_point3(Vec3::from_array(*p))),
        )
    }
}

/// Decoded, read-only model geometry. Shared between every node that instances it.
#[derive(Debug, Clone, Default)]
pub struct SceneAsset {
    pub surfaces: Vec<SurfaceGeometry>,
    /// One slot per glTF image, `None` where the image could not be decoded.
    pub textures: Vec<Option<TextureData>>,
}

impl SceneAsset {
    /// Decode a `.glb` or self-contained `.gltf` byte buffer.
    pub fn from_gltf_bytes(bytes: &[u8]) -> Result<Self, SceneDecodeError> {
        Self::from_gltf(gltf::Gltf::from_slice(bytes)?, &ExternalFiles::new())
    }

    /// Decode a parsed document whose external buffers and images are in `files`.
    pub fn from_gltf(gltf: gltf::Gltf, files: &ExternalFiles) -> Result<Self, SceneDecodeError> {
        let gltf::Gltf { document, mut blob } = gltf;
        let buffers = load_buffers(&document, &mut blob, files)?;
        let textures = document
            .images()
            .map(|image| decode_image(&image, &buffers, files))
            .collect();

        let mut surfaces = Vec::new();
        let scene = document
            .default_scene()
            .or_else(|| document.scenes().next());
        if let Some(scene) = scene {
            for node in scene.nodes() {
                collect_node(&node, Mat4::IDENTITY, &buffers, &mut surfaces);
            }
        }

        Ok(Self { surfaces, textures })
    }

    /// Decoded texture a surface samples, if it has both the image and UVs.
    pub fn texture_of(&self, surface: &SurfaceGeometry) -> Option<(usize, &TextureData)> {
        surface.uvs.as_ref()?;
        let index = surface.base_colour_texture?;
        Some((index, self.textures.get(index)?.as_ref()?))
    }

    /// Bounds of every surface after applying `world`.
    pub fn bounds(&self, world: &Mat4) -> Option<SceneBounds> {
        self.surfaces
            .iter()
            .filter_map(|s| s.local_bounds())
            .map(|b| b.transformed(world))
            .reduce(|a, b| a.union(&b))
    }

    pub fn triangle_count(&self) -> usize {
        self.surfaces.iter().map(|s| s.indices.len() / 3).sum()
    }
}

fn load_buffers(
    document: &gltf::Document,
    blob: &mut Option<Vec<u8>>,
    files: &ExternalFiles,
) -> Result<Vec<gltf::buffer::Data>, SceneDecodeError> {
    document
        .buffers()
        .map(|buffer| {
            let mut data = match buffer.source() {
                gltf::buffer::Source::Uri(uri) if is_external(uri) => files
                    .get(uri)
                    .cloned()
                    .ok_or_else(|| SceneDecodeError::MissingBuffer(uri.to_string()))?,
                source => gltf::buffer::Data::from_source_and_blob(source, None, blob)?.0,
            };
            if data.len() < buffer.length() {
                return Err(SceneDecodeError::BufferLength {
                    index: buffer.index(),
                    expected: buffer.length(),
                    actual: data.len(),
                });
            }
            // Accessors read in 4-byte strides.
            while data.len() % 4 != 0 {
                data.push(0);
            }
            Ok(gltf::buffer::Data(data))
        })
        .collect()
}

fn decode_image(
    gltf_image: &gltf::Image,
    buffers: &[gltf::buffer::Data],
    files: &ExternalFiles,
) -> Option<TextureData> {
    let encoded: Cow<[u8]> = match gltf_image.source() {
        gltf::image::Source::View { view, .. } => {
            let buffer = buffers.get(view.buffer().index())?;
            Cow::Borrowed(buffer.0.get(view.offset()..view.offset() + view.length())?)
        }
        gltf::image::Source::Uri { uri, .. } => match uri.strip_prefix("data:") {
            Some(data) => Cow::Owned(decode_data_uri(data)?),
            None => Cow::Borrowed(files.get(uri)?.as_slice()),
        },
    };

    match image::load_from_memory(&encoded) {
        Ok(decoded) => {
            let rgba = decoded.to_rgba8();
            Some(TextureData {
                width: rgba.width(),
                height: rgba.height(),
                rgba: rgba.into_raw(),
            })
        }
        Err(e) => {
            warn!("Skipping image {}: {e}", gltf_image.index());
            None
        }
    }
}

fn decode_data_uri(data: &str) -> Option<Vec<u8>> {
    let (_, payload) = data.split_once(";base64,")?;
    base64::engine::general_purpose::STANDARD.decode(payload).ok()
}

fn collect_node(
    node: &gltf::Node,
    parent: Mat4,
    buffers: &[gltf::buffer::Data],
    out: &mut Vec<SurfaceGeometry>,
) {
    let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());

    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                debug!(
                    "Skipping non-triangle primitive in mesh {:?}",
                    mesh.name().unwrap_or("<unnamed>")
                );
                continue;
            }

            let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|d| d.0.as_slice()));
            let Some(positions) = reader.read_positions() else {
                continue;
            };
            let positions: Vec<[f32; 3]> = positions.collect();
            let normals = reader.read_normals().map(|n| n.collect());
            let indices = reader
                .read_indices()
                .map(|i| i.into_u32().collect())
                .unwrap_or_else(|| (0..positions.len() as u32).collect());

            let material = primitive.material();
            let pbr = material.pbr_metallic_roughness();
            let base_colour = if material.index().is_some() {
                pbr.base_color_factor()
            } else {
                DEFAULT_SURFACE_COLOUR
            };
            let texture = pbr.base_color_texture();
            let uvs = reader
                .read_tex_coords(texture.as_ref().map_or(0, |t| t.tex_coord()))
                .map(|uv| uv.into_f32().collect());

            out.push(SurfaceGeometry {
                node_name: node.name().map(str::to_string),
                mesh_name: mesh.name().map(str::to_string),
                material_name: material.name().map(str::to_string),
                base_colour,
                base_colour_texture: texture.map(|t| t.texture().source().index()),
                positions,
                normals,
                uvs,
                indices,
                transform: world,
            });
        }
    }

    for child in node.children() {
        collect_node(&child, world, buffers, out);
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn decodes_embedded_gltf() {
        let asset = SceneAsset::from_gltf_bytes(&triangle_gltf("Wall_North", "Plaster")).unwrap();
        assert_eq!(asset.surfaces.len(), 1);

        let surface = &asset.surfaces[0];
        assert_eq!(surface.node_name.as_deref(), Some("Wall_North"));
        assert_eq!(surface.material_name.as_deref(), Some("Plaster"));
        assert_eq!(surface.indices, vec![0, 1, 2]);
        assert_eq!(surface.base_colour, [0.2, 0.4, 0.6, 1.0]);

        // Node translation is baked into the surface transform.
        let bounds = asset.bounds(&Mat4::IDENTITY).unwrap();
        assert_eq!(bounds.min, Vec3::new(0.0, 2.0, 0.0));
        assert_eq!(bounds.max, Vec3::new(1.0, 3.0, 0.0));
    }

    #[test]
    fn external_buffer_and_texture_decode() {
        let (json, bin) = textured_triangle("tri.bin", "textures/wall.png");
        let files = ExternalFiles::from([
            ("tri.bin".to_string(), bin),
            ("textures/wall.png".to_string(), png(2, 2, [200, 10, 10, 255])),
        ]);
        let asset = SceneAsset::from_gltf(gltf::Gltf::from_slice(&json).unwrap(), &files).unwrap();

        let surface = &asset.surfaces[0];
        assert_eq!(surface.positions.len(), 3);
        assert_eq!(surface.uvs.as_deref(), Some(&[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]][..]));

        let (index, texture) = asset.texture_of(surface).unwrap();
        assert_eq!(index, 0);
        assert_eq!((texture.width, texture.height), (2, 2));
        assert_eq!(texture.rgba.len(), 16);
        assert_eq!(&texture.rgba[..4], &[200, 10, 10, 255]);
    }

    #[test]
    fn external_refs_list_relative_uris() {
        let (json, _) = textured_triangle("tri.bin", "wall.png");
        let refs = ExternalRefs::of(&gltf::Gltf::from_slice(&json).unwrap().document);
        assert_eq!(refs.buffers, vec!["tri.bin".to_string()]);
        assert_eq!(refs.images, vec!["wall.png".to_string()]);

        let embedded = triangle_gltf("Wall", "Plaster");
        let refs = ExternalRefs::of(&gltf::Gltf::from_slice(&embedded).unwrap().document);
        assert_eq!(refs, ExternalRefs::default());
    }

    #[test]
    fn missing_external_buffer_is_an_error() {
        let (json, _) = textured_triangle("tri.bin", "wall.png");
        let err = SceneAsset::from_gltf(gltf::Gltf::from_slice(&json).unwrap(), &ExternalFiles::new())
            .unwrap_err();
        assert!(matches!(err, SceneDecodeError::MissingBuffer(uri) if uri == "tri.bin"));
    }

    #[test]
    fn short_external_buffer_is_rejected() {
        let (json, mut bin) = textured_triangle("tri.bin", "wall.png");
        bin.truncate(40);
        let files = ExternalFiles::from([("tri.bin".to_string(), bin)]);
        let err = SceneAsset::from_gltf(gltf::Gltf::from_slice(&json).unwrap(), &files).unwrap_err();
        assert!(matches!(
            err,
            SceneDecodeError::BufferLength { expected: 60, actual: 40, .. }
        ));
    }

    #[test]
    fn missing_image_leaves_surface_untextured() {
        let (json, bin) = textured_triangle("tri.bin", "wall.png");
        let files = ExternalFiles::from([("tri.bin".to_string(), bin)]);
        let asset = SceneAsset::from_gltf(gltf::Gltf::from_slice(&json).unwrap(), &files).unwrap();

        assert_eq!(asset.textures, vec![None]);
        assert_eq!(asset.surfaces[0].base_colour_texture, Some(0));
        assert!(asset.texture_of(&asset.surfaces[0]).is_none());
    }

    #[test]
    fn rejects_garbage() {
        assert!(SceneAsset::from_gltf_bytes(b"not a model").is_err());
    }

    #[test]
    fn box_fixture_has_twelve_triangles() {
        let asset = box_asset(Vec3::ZERO, Vec3::ONE);
        assert_eq!(asset.triangle_count(), 12);
        assert_eq!(asset.surfaces[0].triangles().count(), 12);
    }
}
