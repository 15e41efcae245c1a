use glam::Vec3;

/// Fallback size used whenever a form input fails to parse.
pub const DEFAULT_SIZE: f32 = 10.0;

/// Mannequin proportions as entered in the size form. Owned by the viewer
/// state and overwritten wholesale on every submission; the values are
/// applied to the mannequin's scale unchecked, so negative or zero sizes
/// mirror or collapse the mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeParams {
    pub leg: f32,
    pub arm: f32,
    pub torso: f32,
}

impl Default for SizeParams {
    fn default() -> Self {
        Self {
            leg: DEFAULT_SIZE,
            arm: DEFAULT_SIZE,
            torso: DEFAULT_SIZE,
        }
    }
}

impl SizeParams {
    /// Parses raw form inputs, substituting [`DEFAULT_SIZE`] for anything
    /// that is not a finite number.
    pub fn from_inputs(leg: &str, arm: &str, torso: &str) -> Self {
        Self {
            leg: parse_size(leg),
            arm: parse_size(arm),
            torso: parse_size(torso),
        }
    }

    /// Scale vector written into the mannequin's transform each frame.
    /// Arm size spans the x axis, leg length the y axis, torso depth z.
    pub fn scale(&self) -> Vec3 {
        Vec3::new(self.arm, self.leg, self.torso)
    }
}

fn parse_size(input: &str) -> f32 {
    match input.trim().parse::<f32>() {
        Ok(value) if value.is_finite() => value,
        _ => DEFAULT_SIZE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_inputs_fall_back_to_default() {
        for input in ["", "abc", "12abc", "NaN", "inf", "--4"] {
            assert_eq!(parse_size(input), DEFAULT_SIZE, "input: {input:?}");
        }
    }

    #[test]
    fn valid_inputs_parse_exactly() {
        assert_eq!(parse_size("5"), 5.0);
        assert_eq!(parse_size("7.25"), 7.25);
        assert_eq!(parse_size(" 3.5 "), 3.5);
        assert_eq!(parse_size("-2"), -2.0);
        assert_eq!(parse_size("0"), 0.0);
    }

    #[test]
    fn mixed_form_submission() {
        let params = SizeParams::from_inputs("5", "7", "bad");
        assert_eq!(
            params,
            SizeParams {
                leg: 5.0,
                arm: 7.0,
                torso: DEFAULT_SIZE,
            }
        );
    }

    #[test]
    fn scale_maps_arm_leg_torso_to_xyz() {
        let params = SizeParams {
            leg: 1.0,
            arm: 2.0,
            torso: 3.0,
        };
        assert_eq!(params.scale(), Vec3::new(2.0, 1.0, 3.0));
    }
}
