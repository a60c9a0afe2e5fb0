use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::blurring::domain::frame_blurrer::FrameBlurrer;
use crate::detection::domain::face_roles::{FaceDetection, FaceRole};
use crate::shared::bounding_box::BoundingBox;
use crate::shared::error::FrameError;
use crate::shared::frame::Frame;

/// Outline thickness in pixels.
pub const OUTLINE_THICKNESS: i32 = 2;

const LABEL_SCALE: f32 = 16.0;
const LABEL_TEXT_COLOR: Rgb<u8> = Rgb([0, 0, 0]);

// Text size used for the label tab when no font is available.
const ESTIMATED_CHAR_WIDTH: u32 = 9;
const ESTIMATED_TEXT_HEIGHT: u32 = 11;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RedactionCategory {
    PrimaryFace,
    SecondaryFace,
    Document,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RedactionStyle {
    pub color: Rgb<u8>,
    pub label: &'static str,
}

impl RedactionCategory {
    pub fn style(self) -> RedactionStyle {
        match self {
            RedactionCategory::PrimaryFace => RedactionStyle {
                color: Rgb([136, 255, 0]),
                label: "Speaker",
            },
            RedactionCategory::SecondaryFace => RedactionStyle {
                color: Rgb([255, 50, 50]),
                label: "Face [blurred]",
            },
            RedactionCategory::Document => RedactionStyle {
                color: Rgb([0, 100, 255]),
                label: "ID Card [blurred]",
            },
        }
    }
}

/// Where a label tab and its text go, given the box's top-left corner and
/// the text size. Pushed down when the box is near the top of the frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct LabelLayout {
    tab_x1: i32,
    tab_y1: i32,
    tab_x2: i32,
    tab_y2: i32,
    text_x: i32,
    text_y: i32,
}

fn label_layout(x1: i32, y1: i32, tw: i32, th: i32) -> LabelLayout {
    let ly = (y1 - 4).max(th + 8);
    LabelLayout {
        tab_x1: x1,
        tab_y1: ly - th - 6,
        tab_x2: x1 + tw + 8,
        tab_y2: ly + 2,
        text_x: x1 + 4,
        text_y: ly - 2 - th,
    }
}

/// Blurs non-primary faces and documents, then outlines and labels every
/// box. Holds no per-frame state.
pub struct RedactionRenderer {
    face_blurrer: Box<dyn FrameBlurrer>,
    document_blurrer: Box<dyn FrameBlurrer>,
    font: Option<FontVec>,
}

impl RedactionRenderer {
    pub fn new(
        face_blurrer: Box<dyn FrameBlurrer>,
        document_blurrer: Box<dyn FrameBlurrer>,
        font: Option<FontVec>,
    ) -> Self {
        if font.is_none() {
            log::warn!("No label font available; labels are drawn without text");
        }
        Self {
            face_blurrer,
            document_blurrer,
            font,
        }
    }

    /// Redact and annotate `frame`.
    ///
    /// Secondary faces are blurred then outlined, the primary face is only
    /// outlined, then documents are blurred and outlined on top.
    pub fn render(
        &self,
        mut frame: Frame,
        faces: &[FaceDetection],
        documents: &[BoundingBox],
    ) -> Result<Frame, FrameError> {
        if frame.channels() != 3 {
            return Err(FrameError::RenderFailure(format!(
                "expected 3-channel frame, got {}",
                frame.channels()
            )));
        }
        if faces.is_empty() && documents.is_empty() {
            return Ok(frame);
        }
        let index = frame.index();

        let secondary: Vec<BoundingBox> = faces
            .iter()
            .filter(|f| f.role == FaceRole::Secondary)
            .map(|f| f.bbox)
            .collect();
        self.face_blurrer
            .blur(&mut frame, &secondary)
            .map_err(|e| FrameError::RenderFailure(format!("face blur: {e}")))?;

        let mut image = into_image(frame)?;
        for bbox in &secondary {
            self.draw_box(&mut image, bbox, RedactionCategory::SecondaryFace);
        }
        for face in faces.iter().filter(|f| f.role == FaceRole::Primary) {
            self.draw_box(&mut image, &face.bbox, RedactionCategory::PrimaryFace);
        }

        let mut frame = Frame::from_rgb_image(image, index);
        self.document_blurrer
            .blur(&mut frame, documents)
            .map_err(|e| FrameError::RenderFailure(format!("document blur: {e}")))?;

        let mut image = into_image(frame)?;
        for bbox in documents {
            self.draw_box(&mut image, bbox, RedactionCategory::Document);
        }

        Ok(Frame::from_rgb_image(image, index))
    }

    fn draw_box(&self, image: &mut RgbImage, bbox: &BoundingBox, category: RedactionCategory) {
        let style = category.style();

        // Inclusive corners, grown inward
        for t in 0..OUTLINE_THICKNESS {
            let w = bbox.width() + 1 - 2 * t;
            let h = bbox.height() + 1 - 2 * t;
            if w <= 0 || h <= 0 {
                break;
            }
            let rect = Rect::at(bbox.x1() + t, bbox.y1() + t).of_size(w as u32, h as u32);
            draw_hollow_rect_mut(image, rect, style.color);
        }

        let (tw, th) = self.text_size(style.label);
        let layout = label_layout(bbox.x1(), bbox.y1(), tw as i32, th as i32);
        let tab = Rect::at(layout.tab_x1, layout.tab_y1).of_size(
            (layout.tab_x2 - layout.tab_x1 + 1) as u32,
            (layout.tab_y2 - layout.tab_y1 + 1) as u32,
        );
        draw_filled_rect_mut(image, tab, style.color);

        if let Some(font) = &self.font {
            draw_text_mut(
                image,
                LABEL_TEXT_COLOR,
                layout.text_x,
                layout.text_y,
                PxScale::from(LABEL_SCALE),
                font,
                style.label,
            );
        }
    }

    fn text_size(&self, text: &str) -> (u32, u32) {
        match &self.font {
            Some(font) => text_size(PxScale::from(LABEL_SCALE), font, text),
            None => (
                ESTIMATED_CHAR_WIDTH * text.chars().count() as u32,
                ESTIMATED_TEXT_HEIGHT,
            ),
        }
    }
}

fn into_image(frame: Frame) -> Result<RgbImage, FrameError> {
    frame
        .into_rgb_image()
        .ok_or_else(|| FrameError::RenderFailure("frame buffer does not match its size".into()))
}
