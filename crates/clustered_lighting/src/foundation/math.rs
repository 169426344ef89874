//! Math utilities and types
//!
//! Provides the nalgebra aliases and camera-matrix helpers used by the
//! light registry and the cluster assigner.

pub use nalgebra::{Matrix4, Point3, Vector3, Vector4};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;
}

/// Math utility functions
pub mod utils {
    use super::constants;

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// Clamp an integer cluster coordinate into `[0, count)`.
    ///
    /// Returns `None` when `count` is zero.
    pub fn clamp_index(value: i64, count: u32) -> Option<u32> {
        if count == 0 {
            return None;
        }
        let max = i64::from(count) - 1;
        // Clamped into [0, count - 1] so the narrowing cannot truncate
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Some(value.clamp(0, max) as u32)
    }
}

/// Extension trait for Mat4 with camera-matrix conveniences
pub trait Mat4Ext {
    /// Create a right-handed perspective projection matrix.
    ///
    /// View space looks down `-Z`; the resulting clip `w` equals the positive
    /// view-space depth, so anything behind the camera ends up with `w <= 0`.
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Create a right-handed look-at view matrix
    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4;

    /// Transform a world-space position into homogeneous coordinates
    fn transform_position(&self, position: &Vec3) -> Vec4;
}

impl Mat4Ext for Mat4 {
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        // P = [1/(a·tan(φ/2))  0            0              0           ]
        //     [0               1/tan(φ/2)   0              0           ]
        //     [0               0            (f+n)/(n-f)    2fn/(n-f)   ]
        //     [0               0            -1             0           ]
        let tan_half_fovy = (fov_y * 0.5).tan();

        let mut result = Mat4::zeros();
        result[(0, 0)] = 1.0 / (aspect * tan_half_fovy);
        result[(1, 1)] = 1.0 / tan_half_fovy;
        result[(2, 2)] = (far + near) / (near - far);
        result[(2, 3)] = (2.0 * far * near) / (near - far);
        result[(3, 2)] = -1.0;

        result
    }

    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
        Mat4::look_at_rh(&Point3::from(eye), &Point3::from(target), &up)
    }

    fn transform_position(&self, position: &Vec3) -> Vec4 {
        self * position.push(1.0)
    }
}
