use crate::shared::bounding_box::BoundingBox;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaceRole {
    /// The largest face in the frame; outlined but never blurred.
    Primary,
    Secondary,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaceDetection {
    pub bbox: BoundingBox,
    pub role: FaceRole,
}

/// Marks the first face of maximum area as primary, everything else as
/// secondary. Input order is preserved.
pub fn assign_roles(boxes: &[BoundingBox]) -> Vec<FaceDetection> {
    let primary = boxes
        .iter()
        .enumerate()
        .fold(None::<(usize, i64)>, |best, (i, b)| match best {
            Some((_, area)) if area >= b.area() => best,
            _ => Some((i, b.area())),
        })
        .map(|(i, _)| i);

    boxes
        .iter()
        .enumerate()
        .map(|(i, &bbox)| FaceDetection {
            bbox,
            role: if Some(i) == primary {
                FaceRole::Primary
            } else {
                FaceRole::Secondary
            },
        })
        .collect()
}
