//! Temporal stabilization of per-frame document detections.
//!
//! Raw boxes become *candidates*; a candidate seen on `confirm_frames`
//! consecutive frames is promoted to a *confirmed* track, which is what gets
//! redacted. Confirmed tracks survive up to `forget_frames` frames without a
//! matching detection. Candidates tolerate no misses at all.
//!
//! Matching is greedy first-match on IoU, in input order, not an optimal
//! assignment. Box positions are only ever blended, never replaced.

use serde::{Deserialize, Serialize};

use crate::shared::bounding_box::BoundingBox;

pub const DEFAULT_IOU_THRESHOLD: f64 = 0.3;
pub const DEFAULT_CONFIRM_FRAMES: u32 = 4;
pub const DEFAULT_FORGET_FRAMES: u32 = 8;
pub const DEFAULT_SMOOTH_ALPHA: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Boxes match when their IoU is strictly greater than this.
    pub iou_threshold: f64,
    /// Consecutive hits needed before a candidate is confirmed.
    pub confirm_frames: u32,
    /// Consecutive misses a confirmed track survives.
    pub forget_frames: u32,
    /// Weight of the new observation when blending, in (0, 1].
    pub smooth_alpha: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            confirm_frames: DEFAULT_CONFIRM_FRAMES,
            forget_frames: DEFAULT_FORGET_FRAMES,
            smooth_alpha: DEFAULT_SMOOTH_ALPHA,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..1.0).contains(&self.iou_threshold) {
            return Err(format!(
                "iou_threshold must be in [0, 1), got {}",
                self.iou_threshold
            ));
        }
        if self.confirm_frames == 0 {
            return Err("confirm_frames must be at least 1".to_string());
        }
        if !(self.smooth_alpha > 0.0 && self.smooth_alpha <= 1.0) {
            return Err(format!(
                "smooth_alpha must be in (0, 1], got {}",
                self.smooth_alpha
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Candidate {
    bbox: BoundingBox,
    hits: u32,
}

/// A stabilized document region that is currently being redacted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConfirmedTrack {
    pub bbox: BoundingBox,
    pub misses: u32,
}

/// Candidate/confirmed hysteresis tracker for one video stream.
///
/// `update` takes `&mut self`, so at most one update runs per instance.
/// Use one instance per independent stream.
pub struct DocumentTracker {
    config: TrackerConfig,
    candidates: Vec<Candidate>,
    confirmed: Vec<ConfirmedTrack>,
}

impl DocumentTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            candidates: Vec::new(),
            confirmed: Vec::new(),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn confirmed(&self) -> &[ConfirmedTrack] {
        &self.confirmed
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    /// Forgets all candidates and confirmed tracks.
    pub fn reset(&mut self) {
        self.candidates.clear();
        self.confirmed.clear();
    }

    /// Advances one frame with this frame's raw document boxes and returns
    /// the confirmed boxes, in track order.
    pub fn update(&mut self, raw: &[BoundingBox]) -> Vec<BoundingBox> {
        let claimed = self.match_candidates(raw);

        for (bbox, _) in raw.iter().zip(&claimed).filter(|(_, &c)| !c) {
            self.candidates.push(Candidate { bbox: *bbox, hits: 1 });
        }

        self.promote_candidates();
        self.refresh_confirmed(raw);

        self.confirmed.iter().map(|t| t.bbox).collect()
    }

    /// Each candidate claims the first unclaimed raw box it overlaps.
    /// Unmatched candidates have their hit count reset.
    fn match_candidates(&mut self, raw: &[BoundingBox]) -> Vec<bool> {
        let threshold = self.config.iou_threshold;
        let alpha = self.config.smooth_alpha;
        let mut claimed = vec![false; raw.len()];

        for cand in &mut self.candidates {
            let hit = raw
                .iter()
                .enumerate()
                .find(|(j, r)| !claimed[*j] && cand.bbox.iou(r) > threshold)
                .map(|(j, _)| j);

            match hit {
                Some(j) => {
                    claimed[j] = true;
                    cand.bbox = cand.bbox.blend(&raw[j], alpha);
                    cand.hits += 1;
                }
                None => cand.hits = 0,
            }
        }

        claimed
    }

    fn promote_candidates(&mut self) {
        let threshold = self.config.iou_threshold;
        let pending = std::mem::take(&mut self.candidates);

        for cand in pending {
            if cand.hits >= self.config.confirm_frames {
                let duplicate = self
                    .confirmed
                    .iter()
                    .any(|t| t.bbox.iou(&cand.bbox) > threshold);
                if duplicate {
                    log::debug!("Dropping candidate {:?}: already confirmed", cand.bbox);
                } else {
                    log::debug!("Confirmed document at {:?}", cand.bbox);
                    self.confirmed.push(ConfirmedTrack {
                        bbox: cand.bbox,
                        misses: 0,
                    });
                }
            } else if cand.hits > 0 {
                self.candidates.push(cand);
            }
        }
    }

    /// Every raw box refreshes the first confirmed track it overlaps,
    /// regardless of whether a candidate already claimed it. One track may
    /// be refreshed by several raw boxes in the same frame.
    fn refresh_confirmed(&mut self, raw: &[BoundingBox]) {
        let threshold = self.config.iou_threshold;
        let alpha = self.config.smooth_alpha;
        let mut refreshed = vec![false; self.confirmed.len()];

        for r in raw {
            if let Some(i) = self
                .confirmed
                .iter()
                .position(|t| t.bbox.iou(r) > threshold)
            {
                let track = &mut self.confirmed[i];
                track.bbox = track.bbox.blend(r, alpha);
                track.misses = 0;
                refreshed[i] = true;
            }
        }

        for (track, _) in self
            .confirmed
            .iter_mut()
            .zip(&refreshed)
            .filter(|(_, &r)| !r)
        {
            track.misses += 1;
        }

        let forget = self.config.forget_frames;
        self.confirmed.retain(|t| {
            let keep = t.misses <= forget;
            if !keep {
                log::debug!("Forgetting document at {:?}", t.bbox);
            }
            keep
        });
    }
}

impl Default for DocumentTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn bbox(x1: i32, y1: i32, x2: i32, y2: i32) -> BoundingBox {
        BoundingBox::new(x1, y1, x2, y2).unwrap()
    }

    fn card() -> BoundingBox {
        bbox(100, 100, 200, 160)
    }

    fn config(confirm: u32, forget: u32, alpha: f64) -> TrackerConfig {
        TrackerConfig {
            iou_threshold: 0.3,
            confirm_frames: confirm,
            forget_frames: forget,
            smooth_alpha: alpha,
        }
    }

    // ── Config ───────────────────────────────────────────────────────

    #[test]
    fn test_default_config() {
        let c = TrackerConfig::default();
        assert_eq!(c.confirm_frames, 4);
        assert_eq!(c.forget_frames, 8);
        assert!((c.iou_threshold - 0.3).abs() < f64::EPSILON);
        assert!((c.smooth_alpha - 0.6).abs() < f64::EPSILON);
        assert!(c.validate().is_ok());
    }

    #[rstest]
    #[case::alpha_zero(config(4, 8, 0.0))]
    #[case::alpha_above_one(config(4, 8, 1.5))]
    #[case::confirm_zero(config(0, 8, 0.6))]
    #[case::iou_one(TrackerConfig { iou_threshold: 1.0, ..TrackerConfig::default() })]
    fn test_invalid_config(#[case] c: TrackerConfig) {
        assert!(c.validate().is_err());
    }

    // ── Candidates ───────────────────────────────────────────────────

    #[test]
    fn test_empty_input_is_noop() {
        let mut t = DocumentTracker::default();
        assert!(t.update(&[]).is_empty());
        assert_eq!(t.candidate_count(), 0);
    }

    #[test]
    fn test_unmatched_box_becomes_candidate() {
        let mut t = DocumentTracker::default();
        assert!(t.update(&[card()]).is_empty());
        assert_eq!(t.candidate_count(), 1);
    }

    #[test]
    fn test_candidate_dropped_after_single_miss() {
        let mut t = DocumentTracker::default();
        t.update(&[card()]);
        t.update(&[card()]);
        t.update(&[]);
        assert_eq!(t.candidate_count(), 0);
    }

    #[test]
    fn test_candidate_claims_only_one_raw_box() {
        // Two identical raw boxes: the existing candidate claims the first,
        // the second starts a new candidate.
        let mut t = DocumentTracker::default();
        t.update(&[card()]);
        t.update(&[card(), card()]);
        assert_eq!(t.candidate_count(), 2);
    }

    #[test]
    fn test_candidate_position_is_blended() {
        let mut t = DocumentTracker::new(config(3, 8, 0.5));
        t.update(&[bbox(100, 100, 200, 160)]);
        t.update(&[bbox(110, 100, 210, 160)]);
        let out = t.update(&[bbox(110, 100, 210, 160)]);
        // candidate: 100 -> 105 -> 107.5 (rounds to 108), then refresh: 109
        assert_eq!(out, vec![bbox(109, 100, 209, 160)]);
    }

    #[test]
    fn test_confirm_frames_one_confirms_immediately() {
        let mut t = DocumentTracker::new(config(1, 8, 0.6));
        assert_eq!(t.update(&[card()]), vec![card()]);
    }

    // ── Confirmation ─────────────────────────────────────────────────

    #[test]
    fn test_confirmed_on_fourth_consecutive_frame() {
        let mut t = DocumentTracker::default();
        for _ in 0..3 {
            assert!(t.update(&[card()]).is_empty());
        }
        assert_eq!(t.update(&[card()]), vec![card()]);
        assert_eq!(t.candidate_count(), 0);
    }

    #[test]
    fn test_gap_restarts_confirmation() {
        let mut t = DocumentTracker::default();
        for _ in 0..3 {
            t.update(&[card()]);
        }
        t.update(&[]);
        for _ in 0..3 {
            assert!(t.update(&[card()]).is_empty());
        }
        assert_eq!(t.update(&[card()]).len(), 1);
    }

    #[test]
    fn test_overlapping_candidates_confirm_once() {
        let mut t = DocumentTracker::default();
        let a = bbox(100, 100, 200, 160);
        let b = bbox(105, 102, 205, 162);
        assert!(a.iou(&b) > 0.3);
        for _ in 0..3 {
            t.update(&[a, b]);
        }
        let out = t.update(&[a, b]);
        assert_eq!(out.len(), 1);
        assert_eq!(t.confirmed().len(), 1);
        assert_eq!(t.candidate_count(), 0);
    }

    #[test]
    fn test_candidate_overlapping_confirmed_is_not_promoted() {
        let mut t = DocumentTracker::default();
        for _ in 0..4 {
            t.update(&[card()]);
        }
        // Both boxes keep reaching the confirm count as fresh candidates,
        // but each overlaps the confirmed track and is dropped on promotion.
        let near = bbox(120, 100, 220, 160);
        for _ in 0..6 {
            let out = t.update(&[card(), near]);
            assert_eq!(out.len(), 1);
        }
    }

    #[test]
    fn test_disjoint_documents_tracked_separately() {
        let mut t = DocumentTracker::default();
        let a = bbox(0, 0, 60, 40);
        let b = bbox(300, 300, 360, 340);
        let mut out = Vec::new();
        for _ in 0..4 {
            out = t.update(&[a, b]);
        }
        assert_eq!(out, vec![a, b]);
    }

    // ── Confirmed tracks ─────────────────────────────────────────────

    #[test]
    fn test_confirmed_survives_forget_frames_misses() {
        let mut t = DocumentTracker::default();
        for _ in 0..4 {
            t.update(&[card()]);
        }
        for miss in 1..=8 {
            assert_eq!(t.update(&[]).len(), 1, "still redacted after {miss} misses");
        }
        assert!(t.update(&[]).is_empty());
    }

    #[test]
    fn test_refresh_resets_miss_count() {
        let mut t = DocumentTracker::default();
        for _ in 0..4 {
            t.update(&[card()]);
        }
        for _ in 0..5 {
            t.update(&[]);
        }
        assert_eq!(t.confirmed()[0].misses, 5);
        t.update(&[card()]);
        assert_eq!(t.confirmed()[0].misses, 0);
    }

    #[test]
    fn test_raw_box_refreshes_first_overlapping_track_only() {
        // Two confirmed tracks are built from disjoint boxes; a single raw
        // box overlapping both refreshes only the first one in track order.
        let mut t = DocumentTracker::default();
        let a = bbox(0, 0, 100, 100);
        let b = bbox(60, 0, 160, 100);
        for _ in 0..4 {
            t.update(&[a]);
        }
        for _ in 0..4 {
            t.update(&[b]);
        }
        assert_eq!(t.confirmed().len(), 2);

        let spanning = bbox(30, 0, 130, 100);
        assert!(spanning.iou(&a) > 0.3 && spanning.iou(&b) > 0.3);
        t.update(&[spanning]);
        assert_eq!(t.confirmed()[0].misses, 0);
        assert_eq!(t.confirmed()[1].misses, 1);
    }

    #[test]
    fn test_two_raw_boxes_refresh_same_track_twice() {
        let mut t = DocumentTracker::new(config(1, 8, 0.5));
        t.update(&[bbox(100, 100, 200, 200)]);
        let out = t.update(&[bbox(110, 100, 210, 200), bbox(110, 100, 210, 200)]);
        // 100 -> 105 -> 107.5 (rounds to 108)
        assert_eq!(out[0], bbox(108, 100, 208, 200));
    }

    #[test]
    fn test_alpha_one_follows_detection_exactly() {
        let mut t = DocumentTracker::new(config(4, 8, 1.0));
        let jitter = [0, 2, -2, 1, -1, 2, 0, -2];
        for (frame, dx) in jitter.iter().enumerate() {
            let raw = bbox(100 + dx, 100 - dx, 200 + dx, 160);
            let out = t.update(&[raw]);
            if frame >= 3 {
                assert_eq!(out, vec![raw]);
            }
        }
    }

    #[test]
    fn test_reset_clears_state() {
        let mut t = DocumentTracker::default();
        for _ in 0..4 {
            t.update(&[card()]);
        }
        t.update(&[bbox(0, 0, 40, 40)]);
        t.reset();
        assert!(t.confirmed().is_empty());
        assert_eq!(t.candidate_count(), 0);
        assert!(t.update(&[]).is_empty());
    }
}
