use crate::pose::{LandmarkIndex, Pose};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};

/// Bone connections of the 33-point topology, `(from, to)`.
pub const SKELETON_CONNECTIONS: [(LandmarkIndex, LandmarkIndex); 35] = {
    use LandmarkIndex::*;
    [
        // face
        (Nose, LeftEyeInner),
        (LeftEyeInner, LeftEye),
        (LeftEye, LeftEyeOuter),
        (LeftEyeOuter, LeftEar),
        (Nose, RightEyeInner),
        (RightEyeInner, RightEye),
        (RightEye, RightEyeOuter),
        (RightEyeOuter, RightEar),
        (MouthLeft, MouthRight),
        // upper body
        (LeftShoulder, RightShoulder),
        (LeftShoulder, LeftElbow),
        (LeftElbow, LeftWrist),
        (LeftWrist, LeftPinky),
        (LeftWrist, LeftIndex),
        (LeftWrist, LeftThumb),
        (LeftPinky, LeftIndex),
        (RightShoulder, RightElbow),
        (RightElbow, RightWrist),
        (RightWrist, RightPinky),
        (RightWrist, RightIndex),
        (RightWrist, RightThumb),
        (RightPinky, RightIndex),
        // torso
        (LeftShoulder, LeftHip),
        (RightShoulder, RightHip),
        (LeftHip, RightHip),
        // lower body
        (LeftHip, LeftKnee),
        (LeftKnee, LeftAnkle),
        (LeftAnkle, LeftHeel),
        (LeftHeel, LeftFootIndex),
        (LeftAnkle, LeftFootIndex),
        (RightHip, RightKnee),
        (RightKnee, RightAnkle),
        (RightAnkle, RightHeel),
        (RightHeel, RightFootIndex),
        (RightAnkle, RightFootIndex),
    ]
};

pub const LANDMARK_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);
pub const CONNECTION_COLOR: Rgba<u8> = Rgba([0, 255, 255, 255]);
pub const LANDMARK_RADIUS: i32 = 2;
/// Connection lines are drawn this many pixels wide.
pub const CONNECTION_THICKNESS: i32 = 2;

/// Draw `pose` onto `image` in place.
pub fn draw_pose(image: &mut RgbaImage, pose: &Pose) {
    let (width, height) = image.dimensions();

    for (from, to) in SKELETON_CONNECTIONS {
        let (Some(a), Some(b)) = (pose.get(from), pose.get(to)) else {
            continue;
        };
        let (ax, ay) = a.to_pixel(width, height);
        let (bx, by) = b.to_pixel(width, height);
        for offset in 0..CONNECTION_THICKNESS {
            let offset = offset as f32;
            draw_line_segment_mut(image, (ax + offset, ay), (bx + offset, by), CONNECTION_COLOR);
            draw_line_segment_mut(image, (ax, ay + offset), (bx, by + offset), CONNECTION_COLOR);
        }
    }

    for landmark in &pose.landmarks {
        let (x, y) = landmark.to_pixel(width, height);
        draw_filled_circle_mut(
            image,
            (x.round() as i32, y.round() as i32),
            LANDMARK_RADIUS,
            LANDMARK_COLOR,
        );
    }
}
