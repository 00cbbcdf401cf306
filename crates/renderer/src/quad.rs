/// Two triangles covering normalised device coordinates.
pub const QUAD_VERTEX_COUNT: usize = 6;

pub const QUAD_POSITIONS: [[f32; 2]; QUAD_VERTEX_COUNT] = [
    [-1.0, -1.0],
    [1.0, -1.0],
    [-1.0, 1.0],
    [1.0, 1.0],
    [-1.0, 1.0],
    [1.0, -1.0],
];

/// UV attribute for the quad with x scaled by the surface aspect ratio, so
/// ray directions built from it stay undistorted.
///
/// Returns `None` for a degenerate surface (zero width or height).
pub fn aspect_uvs(width: u32, height: u32) -> Option<[[f32; 2]; QUAD_VERTEX_COUNT]> {
    if width == 0 || height == 0 {
        return None;
    }
    let aspect = width as f32 / height as f32;
    Some(QUAD_POSITIONS.map(|[x, y]| [x * aspect, y]))
}
