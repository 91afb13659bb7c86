use crate::pose::{LandmarkIndex, Pose};
use std::collections::BTreeMap;
use std::fmt;

/// Vertex angle in degrees at `b` formed by the rays towards `a` and `c`.
///
/// Always in `[0, 180]` and symmetric in `a`/`c`. The result is meaningless when
/// `a == b` or `c == b`.
pub fn angle(a: (f32, f32), b: (f32, f32), c: (f32, f32)) -> f64 {
    let (ax, ay) = (a.0 as f64, a.1 as f64);
    let (bx, by) = (b.0 as f64, b.1 as f64);
    let (cx, cy) = (c.0 as f64, c.1 as f64);

    let radians = (cy - by).atan2(cx - bx) - (ay - by).atan2(ax - bx);
    let degrees = radians.to_degrees().abs();
    if degrees > 180.0 {
        360.0 - degrees
    } else {
        degrees
    }
}

/// Joints whose angle is tracked, measured on the left side of the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Joint {
    Knee,
    Hip,
    Shoulder,
    Elbow,
}

impl Joint {
    pub const ALL: [Joint; 4] = [Joint::Knee, Joint::Hip, Joint::Shoulder, Joint::Elbow];

    /// Label shown to users.
    pub fn name(self) -> &'static str {
        match self {
            Joint::Knee => "Ginocchio",
            Joint::Hip => "Anca",
            Joint::Shoulder => "Spalla",
            Joint::Elbow => "Gomito",
        }
    }

    /// `(a, vertex, c)` landmark triple.
    pub fn landmarks(self) -> (LandmarkIndex, LandmarkIndex, LandmarkIndex) {
        use LandmarkIndex::*;
        match self {
            Joint::Knee => (LeftHip, LeftKnee, LeftAnkle),
            Joint::Hip => (LeftShoulder, LeftHip, LeftKnee),
            Joint::Shoulder => (LeftElbow, LeftShoulder, LeftHip),
            Joint::Elbow => (LeftShoulder, LeftElbow, LeftWrist),
        }
    }
}

impl fmt::Display for Joint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Joint angles of one frame. Joints whose landmarks were not detected are absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JointAngles(BTreeMap<Joint, f64>);

impl JointAngles {
    /// Extract angles from `pose` in pixel space of a `width` x `height` frame.
    pub fn from_pose(pose: &Pose, width: u32, height: u32) -> Self {
        let mut angles = BTreeMap::new();
        for joint in Joint::ALL {
            let (a, b, c) = joint.landmarks();
            let (Some(a), Some(b), Some(c)) = (pose.get(a), pose.get(b), pose.get(c)) else {
                continue;
            };
            let value = angle(
                a.to_pixel(width, height),
                b.to_pixel(width, height),
                c.to_pixel(width, height),
            );
            angles.insert(joint, value);
        }
        Self(angles)
    }

    pub fn get(&self, joint: Joint) -> Option<f64> {
        self.0.get(&joint).copied()
    }

    /// Lookup by display name, e.g. `"Gomito"`.
    pub fn by_name(&self, name: &str) -> Option<f64> {
        self.0
            .iter()
            .find(|(joint, _)| joint.name() == name)
            .map(|(_, value)| *value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Joint, f64)> + '_ {
        self.0.iter().map(|(joint, value)| (*joint, *value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::Landmark;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn right_angle() {
        assert!(close(angle((1.0, 0.0), (0.0, 0.0), (0.0, 1.0)), 90.0));
    }

    #[test]
    fn straight_line() {
        assert!(close(angle((-1.0, 0.0), (0.0, 0.0), (1.0, 0.0)), 180.0));
    }

    #[test]
    fn reflex_angle_folds() {
        // raw difference is 270 degrees
        let value = angle((0.0, -1.0), (0.0, 0.0), (-1.0, 0.0));
        assert!(close(value, 90.0));
    }

    #[test]
    fn symmetric_and_bounded() {
        let points = [
            (0.3, 0.9),
            (-2.0, 1.5),
            (4.0, -3.0),
            (0.01, 0.02),
            (-0.7, -0.2),
            (10.0, 0.5),
        ];
        let b = (0.1, -0.4);
        for a in points {
            for c in points {
                let forward = angle(a, b, c);
                let backward = angle(c, b, a);
                assert!((0.0..=180.0).contains(&forward), "{forward}");
                assert!(close(forward, backward));
            }
        }
    }

    fn full_pose() -> Pose {
        let mut landmarks = vec![Landmark::default(); LandmarkIndex::COUNT];
        // upright arm hanging down, leg straight
        landmarks[LandmarkIndex::LeftShoulder as usize] = Landmark::new(0.5, 0.2);
        landmarks[LandmarkIndex::LeftElbow as usize] = Landmark::new(0.5, 0.35);
        landmarks[LandmarkIndex::LeftWrist as usize] = Landmark::new(0.6, 0.35);
        landmarks[LandmarkIndex::LeftHip as usize] = Landmark::new(0.5, 0.5);
        landmarks[LandmarkIndex::LeftKnee as usize] = Landmark::new(0.5, 0.7);
        landmarks[LandmarkIndex::LeftAnkle as usize] = Landmark::new(0.5, 0.9);
        Pose::new(landmarks)
    }

    #[test]
    fn extracts_all_joints() {
        let angles = JointAngles::from_pose(&full_pose(), 100, 100);
        assert_eq!(angles.len(), 4);
        assert!(close(angles.get(Joint::Knee).unwrap_or(-1.0), 180.0));
        assert!(close(angles.get(Joint::Hip).unwrap_or(-1.0), 180.0));
        assert!(close(angles.get(Joint::Shoulder).unwrap_or(-1.0), 0.0));
        assert!(close(angles.by_name("Gomito").unwrap_or(-1.0), 90.0));
    }

    #[test]
    fn pixel_space_accounts_for_aspect_ratio() {
        let mut landmarks = vec![Landmark::default(); LandmarkIndex::COUNT];
        landmarks[LandmarkIndex::LeftShoulder as usize] = Landmark::new(0.5, 0.0);
        landmarks[LandmarkIndex::LeftElbow as usize] = Landmark::new(0.5, 0.5);
        landmarks[LandmarkIndex::LeftWrist as usize] = Landmark::new(1.0, 0.0);
        let pose = Pose::new(landmarks);

        let square = JointAngles::from_pose(&pose, 100, 100);
        assert!(close(square.get(Joint::Elbow).unwrap_or(-1.0), 45.0));

        let wide = JointAngles::from_pose(&pose, 200, 100);
        let expected = (100.0f64 / 50.0).atan().to_degrees();
        assert!(close(wide.get(Joint::Elbow).unwrap_or(-1.0), expected));
    }

    #[test]
    fn missing_landmarks_omit_keys() {
        // up to and including the left hip (index 23), no knee or ankle
        let pose = Pose::new(full_pose().landmarks[..24].to_vec());
        let angles = JointAngles::from_pose(&pose, 100, 100);
        assert!(angles.get(Joint::Knee).is_none());
        assert!(angles.get(Joint::Hip).is_none());
        assert!(angles.get(Joint::Shoulder).is_some());
        assert!(angles.get(Joint::Elbow).is_some());
        assert_eq!(angles.len(), 2);
    }

    #[test]
    fn joint_names() {
        let names: Vec<_> = Joint::ALL.iter().map(|j| j.to_string()).collect();
        assert_eq!(names, ["Ginocchio", "Anca", "Spalla", "Gomito"]);
    }
}
