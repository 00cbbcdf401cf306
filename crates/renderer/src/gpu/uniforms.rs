use bytemuck::{Pod, Zeroable};

use crate::types::{UniformLocation, UniformValue, UniformWrite};

/// Size of the std140 `SdfParams` block: four vec3+float rows.
const PARAMS_BLOCK_SIZE: usize = 64;

/// CPU mirror of the `SdfParams` uniform block.
///
/// Values are written at the byte offsets naga reported for the linked
/// program, so the mirror never assumes a member order.
#[repr(C, align(16))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct SdfUniforms {
    bytes: [u8; PARAMS_BLOCK_SIZE],
}

unsafe impl Zeroable for SdfUniforms {}
unsafe impl Pod for SdfUniforms {}

impl Default for SdfUniforms {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl SdfUniforms {
    pub fn apply(&mut self, writes: &[UniformWrite]) {
        for write in writes {
            self.write(write.location, write.value);
        }
    }

    fn write(&mut self, location: UniformLocation, value: UniformValue) {
        let offset = location.0 as usize;
        let floats: &[f32] = match &value {
            UniformValue::Float(value) => std::slice::from_ref(value),
            UniformValue::Vec3(values) => values,
        };
        let bytes: &[u8] = bytemuck::cast_slice(floats);
        match self.bytes.get_mut(offset..offset + bytes.len()) {
            Some(slot) => slot.copy_from_slice(bytes),
            None => tracing::warn!(offset, "uniform write outside the parameter block"),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}
