use cgmath::{InnerSpace, Zero};

#[cfg_attr(rustfmt, rustfmt_skip)]
#[allow(unused)]
pub const OPENGL_TO_WGPU_MATRIX: cgmath::Matrix4<f32> = cgmath::Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

// Held movement keys.
#[derive(Debug, Default, Copy, Clone)]
pub struct MoveInput {
    pub forward: bool,
    pub back: bool,
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
}

impl MoveInput {
    // Unit length direction in world axes, or zero when nothing (or only opposing keys) is held.
    pub fn direction(&self) -> cgmath::Vector3<f32> {
        let axis = |positive: bool, negative: bool| match (positive, negative) {
            (true, false) => 1.0,
            (false, true) => -1.0,
            _ => 0.0,
        };
        let direction = cgmath::Vector3::new(
            axis(self.left, self.right),
            axis(self.up, self.down),
            axis(self.forward, self.back),
        );
        if direction.is_zero() {
            direction
        } else {
            direction.normalize()
        }
    }
}

pub struct CameraMotion {
    // World units per millisecond.
    pub linear_speed: f32,
}

impl Default for CameraMotion {
    fn default() -> CameraMotion {
        CameraMotion { linear_speed: 0.01 }
    }
}

pub struct PerspectiveState {
    pub fov: cgmath::Rad<f32>,
    pub near: f32,
    pub far: f32,
}

pub struct CameraState {
    pub position: cgmath::Point3<f32>,
    pub direction: cgmath::Vector3<f32>,
    pub perspective: PerspectiveState,
}

impl Default for CameraState {
    fn default() -> CameraState {
        CameraState {
            position: cgmath::Point3::new(0.0, 0.0, -10.0),
            direction: cgmath::Vector3::unit_z(),
            perspective: PerspectiveState {
                fov: cgmath::Rad(0.7),
                near: 0.001,
                far: 1000.0,
            },
        }
    }
}

impl CameraState {
    // World up. Billboards stay upright regardless of where the camera looks.
    pub fn up(&self) -> cgmath::Vector3<f32> {
        cgmath::Vector3::unit_y()
    }

    pub fn right(&self) -> cgmath::Vector3<f32> {
        self.direction.cross(self.up()).normalize()
    }

    pub fn update(&mut self, dt: f32, input: &MoveInput, motion_params: &CameraMotion) {
        self.position += input.direction() * (motion_params.linear_speed * dt);
    }
}

pub struct Camera {
    pub motion_params: CameraMotion,
    pub screen_size: (u32, u32),
    pub state: CameraState,
}

impl Default for Camera {
    fn default() -> Camera {
        Camera {
            motion_params: CameraMotion::default(),

            // The size of the user's window output.
            screen_size: (640, 480),
            state: CameraState::default(),
        }
    }
}

impl Camera {
    pub fn from_params(params: &super::swarm_params::CameraParams, screen_size: (u32, u32)) -> Self {
        Camera {
            motion_params: CameraMotion {
                linear_speed: params.move_speed,
            },
            screen_size,
            state: CameraState {
                position: params.position.into(),
                direction: cgmath::Vector3::from(params.direction).normalize(),
                perspective: PerspectiveState {
                    fov: cgmath::Rad(params.fov),
                    near: params.near,
                    far: params.far,
                },
            },
        }
    }

    pub fn view_projection(&self) -> cgmath::Matrix4<f32> {
        let aspect = self.screen_size.0 as f32 / self.screen_size.1.max(1) as f32;
        let perspective = &self.state.perspective;
        let mx_projection =
            cgmath::perspective(perspective.fov, aspect, perspective.near, perspective.far);
        let mx_view = cgmath::Matrix4::look_to_rh(
            self.state.position,
            self.state.direction,
            self.state.up(),
        );
        OPENGL_TO_WGPU_MATRIX * mx_projection * mx_view
    }

    /// Outputs the 4x4 view projection matrix followed by the camera right and up
    /// vectors, each padded to 4 floats.
    pub fn to_uniform_data(&self) -> [f32; 16 + 4 + 4] {
        let vp = self.view_projection();
        let right = self.state.right();
        let up = self.state.up();

        let mut raw = [0f32; 16 + 4 + 4];
        raw[..16].copy_from_slice(&AsRef::<[f32; 16]>::as_ref(&vp)[..]);
        raw[16..19].copy_from_slice(&AsRef::<[f32; 3]>::as_ref(&right)[..]);
        raw[20..23].copy_from_slice(&AsRef::<[f32; 3]>::as_ref(&up)[..]);
        raw
    }

    pub fn update_state(&mut self, dt: f32, input: &MoveInput) {
        self.state.update(dt, input, &self.motion_params);
    }
}
