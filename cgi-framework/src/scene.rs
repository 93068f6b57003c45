use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// Camera the lighting pass reconstructs world positions with
#[derive(Copy, Clone, Debug)]
pub struct DeferredCamera {
    pub view_proj: Mat4,
    pub eye_position: Vec3,
}

impl DeferredCamera {
    pub fn look_at(
        eye_position: Vec3,
        target: Vec3,
        aspect_ratio: f32,
        fov_y_radians: f32,
    ) -> Self {
        let view = Mat4::look_at_rh(eye_position, target, Vec3::unit_y());
        // Reverse-z, the G-buffer pass clears depth to 0 and tests with GreaterOrEqual
        let proj = Mat4::perspective_infinite_reverse_rh(fov_y_radians, aspect_ratio, 0.1);
        DeferredCamera {
            view_proj: proj * view,
            eye_position,
        }
    }

    pub(crate) fn view_constants(&self) -> ViewConstants {
        ViewConstants {
            inv_view_proj: self.view_proj.inverse().to_cols_array_2d(),
            eye_position: self.eye_position.extend(1.0).into(),
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub struct DirectionalLight {
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

impl DirectionalLight {
    pub(crate) fn light_constants(&self) -> LightConstants {
        LightConstants {
            position_or_direction: self.direction.normalize().extend(0.0).into(),
            color_intensity: self.color.extend(self.intensity).into(),
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub struct OmniLight {
    pub position: Vec3,
    pub radius: f32,
    pub color: Vec3,
    pub intensity: f32,
}

impl OmniLight {
    pub(crate) fn light_constants(&self) -> LightConstants {
        LightConstants {
            position_or_direction: self.position.extend(self.radius).into(),
            color_intensity: self.color.extend(self.intensity).into(),
        }
    }
}

/// Screen-space reflection settings
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ReflectionParams {
    pub strength: f32,
    pub max_distance: f32,
    pub thickness: f32,
    pub max_steps: u32,
}

impl Default for ReflectionParams {
    fn default() -> Self {
        ReflectionParams {
            strength: 0.5,
            max_distance: 0.25,
            thickness: 0.01,
            max_steps: 16,
        }
    }
}

impl ReflectionParams {
    pub(crate) fn reflection_constants(&self) -> ReflectionConstants {
        ReflectionConstants {
            strength: self.strength,
            max_distance: self.max_distance,
            thickness: self.thickness,
            max_steps: self.max_steps,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ToneMapParams {
    pub exposure: f32,
    pub gamma: f32,
}

impl Default for ToneMapParams {
    fn default() -> Self {
        ToneMapParams {
            exposure: 1.0,
            gamma: 2.2,
        }
    }
}

impl ToneMapParams {
    pub(crate) fn tone_map_constants(&self) -> ToneMapConstants {
        ToneMapConstants {
            exposure: self.exposure,
            gamma: self.gamma,
            padding: [0.0; 2],
        }
    }
}

//
// GPU layouts of the shader constants in `shaders`
//

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub(crate) struct LightConstants {
    pub position_or_direction: [f32; 4],
    pub color_intensity: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub(crate) struct ViewConstants {
    pub inv_view_proj: [[f32; 4]; 4],
    pub eye_position: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub(crate) struct ReflectionConstants {
    pub strength: f32,
    pub max_distance: f32,
    pub thickness: f32,
    pub max_steps: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub(crate) struct ToneMapConstants {
    pub exposure: f32,
    pub gamma: f32,
    pub padding: [f32; 2],
}
