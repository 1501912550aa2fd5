extern crate lbvh_broadphase as lbvh;

extern crate bincode;
extern crate cgmath;

#[macro_use]
extern crate serde;

use cgmath::Vector3;
use lbvh::Aabb;
use thiserror::Error;

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

const FORMAT_SIGNATURE: [u8;8] = *b"LBVHSCNE";
const FORMAT_VERSION: (u16, u16) = (1, 0);

#[derive(Deserialize, Serialize)]
struct Header {
    signature: [u8;8],
    version: (u16, u16)
}

/// A frame of moving objects: one box and one unit heading per object id
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Scene {
    pub object_bounds: Vec<Aabb>,
    pub headings: Vec<Vector3<f32>>
}

#[derive(Debug, Error)]
pub enum SceneIOError {
    #[error("scene i/o failed: {0}")]
    IOError(#[from] std::io::Error),
    #[error("scene encoding failed: {0}")]
    BincodeError(#[from] bincode::Error),
    #[error("not a scene file (signature {0:?})")]
    InvalidSignature([u8;8]),
    #[error("unsupported scene version {0:?}")]
    InvalidVersion((u16, u16)),
    #[error("{bounds} boxes but {headings} headings")]
    LengthMismatch {
        bounds: usize,
        headings: usize
    }
}

impl Scene {
    pub fn len(&self) -> usize {
        self.object_bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.object_bounds.is_empty()
    }

    fn check(&self) -> Result<(), SceneIOError> {
        if self.object_bounds.len() != self.headings.len() {
            return Err(SceneIOError::LengthMismatch{
                bounds: self.object_bounds.len(),
                headings: self.headings.len()
            });
        }
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Scene, SceneIOError> {
        let mut reader = BufReader::new(File::open(path)?);

        let header: Header = bincode::deserialize_from(&mut reader)?;

        if header.signature != FORMAT_SIGNATURE {
            return Err(SceneIOError::InvalidSignature(header.signature));
        }

        if header.version.0 != FORMAT_VERSION.0 {
            return Err(SceneIOError::InvalidVersion(header.version));
        }

        let scene: Scene = bincode::deserialize_from(reader)?;
        scene.check()?;
        Ok(scene)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), SceneIOError> {
        self.check()?;

        let mut writer = BufWriter::new(File::create(path)?);

        bincode::serialize_into(&mut writer, &Header{
            signature: FORMAT_SIGNATURE,
            version: FORMAT_VERSION
        })?;

        bincode::serialize_into(writer, self)?;
        Ok(())
    }
}
