use smallvec::SmallVec;

/// Landmark indices of the 33-point body topology used by the annotator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum LandmarkIndex {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl LandmarkIndex {
    pub const COUNT: usize = 33;
}

/// A single landmark in normalized image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Landmark {
    /// 0.0..=1.0 across the frame width
    pub x: f32,
    /// 0.0..=1.0 across the frame height
    pub y: f32,
    /// Depth relative to the hips, same scale as `x`.
    pub z: f32,
    pub visibility: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            z: 0.0,
            visibility: 1.0,
        }
    }

    /// Pixel position in a `width` x `height` frame.
    pub fn to_pixel(&self, width: u32, height: u32) -> (f32, f32) {
        (self.x * width as f32, self.y * height as f32)
    }
}

/// Landmarks of one detected person.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pose {
    pub landmarks: Vec<Landmark>,
}

impl Pose {
    pub fn new(landmarks: Vec<Landmark>) -> Self {
        Self { landmarks }
    }

    /// Landmark at `index`, or `None` when the detector did not report it.
    pub fn get(&self, index: LandmarkIndex) -> Option<&Landmark> {
        self.landmarks.get(index as usize)
    }
}

/// Output of one `detect` call. The pipeline runs single-subject, so at most one pose
/// is expected, but the type does not enforce it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoseResult {
    pub poses: SmallVec<[Pose; 1]>,
}

impl PoseResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn single(pose: Pose) -> Self {
        let mut poses = SmallVec::new();
        poses.push(pose);
        Self { poses }
    }

    /// The pose angles are extracted from.
    pub fn primary(&self) -> Option<&Pose> {
        self.poses.first()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_landmark_is_none() {
        let pose = Pose::new(vec![Landmark::new(0.5, 0.5); 12]);
        assert!(pose.get(LandmarkIndex::LeftShoulder).is_some());
        assert!(pose.get(LandmarkIndex::LeftElbow).is_none());
    }

    #[test]
    fn landmark_to_pixel() {
        let lm = Landmark::new(0.5, 0.25);
        assert_eq!(lm.to_pixel(640, 480), (320.0, 120.0));
    }

    #[test]
    fn primary_is_first_pose() {
        let result = PoseResult::single(Pose::new(vec![Landmark::new(0.1, 0.2)]));
        assert_eq!(result.primary().map(|p| p.landmarks.len()), Some(1));
        assert!(PoseResult::empty().primary().is_none());
    }
}
