//! Detection module (Step 2 in the pipeline).
//! Raw detector output arrives as a batch of parallel arrays (labels, bboxes, scores).
//! This module validates that batch and de-duplicates it with a greedy IoU pass,
//! then drops low-confidence boxes.
//! The suppression is order-dependent on purpose: index pairs are visited i<j in input order.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::ReconstructError;

/// Axis-aligned box in pixel space: (x_min, y_min) top-left, (x_max, y_max) bottom-right.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl BBox {
    pub fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Self {
        Self { x_min, y_min, x_max, y_max }
    }

    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    /// Zero for degenerate boxes.
    pub fn area(&self) -> f64 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// Integer midpoint, floored per axis: `floor((max - min) / 2) + min`.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.width() / 2.0).floor() + self.x_min,
            (self.height() / 2.0).floor() + self.y_min,
        )
    }
}

impl From<[f64; 4]> for BBox {
    fn from(b: [f64; 4]) -> Self {
        BBox::new(b[0], b[1], b[2], b[3])
    }
}

/// One scored box produced by the object detector.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: i64,
    pub bbox: BBox,
    pub score: f64,
}

/// Detector output for one frame, as parallel arrays.
/// Arrays are optional here so that a missing one surfaces as `MalformedBatch`
/// instead of a deserialization error.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DetectionBatch {
    #[serde(default)]
    pub labels: Option<Vec<i64>>,
    #[serde(default)]
    pub bboxes: Option<Vec<[f64; 4]>>,
    #[serde(default)]
    pub scores: Option<Vec<f64>>,
}

impl DetectionBatch {
    pub fn from_detections(detections: &[Detection]) -> Self {
        Self {
            labels: Some(detections.iter().map(|d| d.label).collect()),
            bboxes: Some(
                detections
                    .iter()
                    .map(|d| [d.bbox.x_min, d.bbox.y_min, d.bbox.x_max, d.bbox.y_max])
                    .collect(),
            ),
            scores: Some(detections.iter().map(|d| d.score).collect()),
        }
    }

    /// Zips the three arrays into detections. Fails if any array is missing or lengths differ.
    pub fn into_detections(self) -> Result<Vec<Detection>, ReconstructError> {
        let missing = |name: &str| ReconstructError::MalformedBatch {
            reason: format!("missing '{}' array", name),
        };
        let labels = self.labels.ok_or_else(|| missing("labels"))?;
        let bboxes = self.bboxes.ok_or_else(|| missing("bboxes"))?;
        let scores = self.scores.ok_or_else(|| missing("scores"))?;

        if labels.len() != bboxes.len() || labels.len() != scores.len() {
            return Err(ReconstructError::MalformedBatch {
                reason: format!(
                    "array lengths differ: {} labels, {} bboxes, {} scores",
                    labels.len(),
                    bboxes.len(),
                    scores.len()
                ),
            });
        }

        Ok(labels
            .into_iter()
            .zip(bboxes)
            .zip(scores)
            .map(|((label, bbox), score)| Detection {
                label,
                bbox: BBox::from(bbox),
                score,
            })
            .collect())
    }
}

/// Intersection over union of two boxes, in [0, 1]. Zero-area overlap or union yields 0.
pub fn intersection_over_union(a: &BBox, b: &BBox) -> f64 {
    let x_left = a.x_min.max(b.x_min);
    let y_top = a.y_min.max(b.y_min);
    let x_right = a.x_max.min(b.x_max);
    let y_bottom = a.y_max.min(b.y_max);

    let intersection = (x_right - x_left).max(0.0) * (y_bottom - y_top).max(0.0);
    if intersection == 0.0 {
        return 0.0;
    }

    let union = a.area() + b.area() - intersection;
    if union <= 0.0 {
        return 0.0;
    }
    intersection / union
}

/// Greedy single-pass suppression followed by a score cut.
///
/// For each pair (i, j), i < j, with IoU above `iou_threshold`, the strictly lower score is
/// zeroed; on a tie, `j` loses. Zeroed scores are never restored. Survivors keep their
/// relative order and their (possibly zeroed) score.
pub fn filter_detections(
    detections: &[Detection],
    iou_threshold: f64,
    score_threshold: f64,
) -> Vec<Detection> {
    let mut scores: Vec<f64> = detections.iter().map(|d| d.score).collect();
    let mut suppressed = 0usize;

    for i in 0..detections.len() {
        for j in (i + 1)..detections.len() {
            if intersection_over_union(&detections[i].bbox, &detections[j].bbox) > iou_threshold {
                if scores[i] < scores[j] {
                    scores[i] = 0.0;
                } else {
                    scores[j] = 0.0;
                }
                suppressed += 1;
            }
        }
    }

    let kept: Vec<Detection> = detections
        .iter()
        .zip(scores)
        .filter(|(_, score)| *score >= score_threshold)
        .map(|(d, score)| Detection { score, ..*d })
        .collect();

    debug!(
        "filter: {} in, {} overlapping pairs, {} kept",
        detections.len(),
        suppressed,
        kept.len()
    );
    kept
}

/// Validates a raw batch and filters it in one step.
pub fn filter_batch(
    batch: DetectionBatch,
    iou_threshold: f64,
    score_threshold: f64,
) -> Result<Vec<Detection>, ReconstructError> {
    let detections = batch.into_detections()?;
    Ok(filter_detections(&detections, iou_threshold, score_threshold))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn det(label: i64, b: [f64; 4], score: f64) -> Detection {
        Detection { label, bbox: BBox::from(b), score }
    }

    #[test]
    fn test_iou_identity_and_symmetry() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(5.0, 0.0, 15.0, 10.0);
        assert_relative_eq!(intersection_over_union(&a, &a), 1.0);
        assert_relative_eq!(intersection_over_union(&a, &b), intersection_over_union(&b, &a));
        // overlap 50, union 150
        assert_relative_eq!(intersection_over_union(&a, &b), 1.0 / 3.0);
    }

    #[test]
    fn test_iou_disjoint_and_degenerate() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let far = BBox::new(20.0, 20.0, 30.0, 30.0);
        let touching = BBox::new(10.0, 0.0, 20.0, 10.0);
        let flat = BBox::new(2.0, 2.0, 2.0, 8.0);
        assert_eq!(intersection_over_union(&a, &far), 0.0);
        assert_eq!(intersection_over_union(&a, &touching), 0.0);
        assert_eq!(intersection_over_union(&flat, &flat), 0.0);
        assert_eq!(intersection_over_union(&a, &flat), 0.0);
    }

    #[test]
    fn test_filter_drops_lower_duplicate() {
        let input = vec![
            det(9, [0.0, 0.0, 10.0, 10.0], 0.9),
            det(9, [0.0, 0.0, 10.0, 10.0], 0.4),
        ];
        let out = filter_detections(&input, 0.3, 0.1);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].score, 0.9);
    }

    #[test]
    fn test_filter_lower_first_is_zeroed() {
        let input = vec![
            det(5, [0.0, 0.0, 10.0, 10.0], 0.4),
            det(4, [0.0, 0.0, 10.0, 10.0], 0.9),
        ];
        let out = filter_detections(&input, 0.3, 0.1);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].label, 4);
    }

    #[test]
    fn test_filter_tie_zeroes_later() {
        let input = vec![
            det(1, [0.0, 0.0, 10.0, 10.0], 0.7),
            det(2, [1.0, 1.0, 10.0, 10.0], 0.7),
        ];
        let out = filter_detections(&input, 0.5, 0.5);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].label, 1);
    }

    #[test]
    fn test_filter_compares_current_scores() {
        // (a,b) zeroes a, (a,c) compares 0.0 against 0.6 and zeroes a again, (b,c) zeroes c.
        let a = det(1, [0.0, 0.0, 10.0, 10.0], 0.5);
        let b = det(2, [0.0, 0.0, 10.0, 10.0], 0.8);
        let c = det(3, [0.0, 0.0, 10.0, 10.0], 0.6);
        let out = filter_detections(&[a, b, c], 0.5, 0.1);
        assert_eq!(out.iter().map(|d| d.label).collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_filter_order_dependence() {
        // A overlaps B, B overlaps C, A does not overlap C.
        let a = det(1, [0.0, 0.0, 10.0, 10.0], 0.6);
        let b = det(2, [2.0, 0.0, 12.0, 10.0], 0.7);
        let c = det(3, [4.0, 0.0, 14.0, 10.0], 0.5);
        // (a,b): a zeroed. (a,c): iou = 60/140 < 0.5. (b,c): c zeroed.
        let out = filter_detections(&[a, b, c], 0.5, 0.1);
        assert_eq!(out.iter().map(|d| d.label).collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_filter_keeps_order_and_zero_threshold_keeps_zeroed() {
        let input = vec![
            det(3, [0.0, 0.0, 10.0, 10.0], 0.9),
            det(4, [50.0, 50.0, 60.0, 60.0], 0.8),
            det(5, [0.0, 0.0, 10.0, 10.0], 0.2),
        ];
        let out = filter_detections(&input, 0.3, 0.0);
        assert_eq!(out.iter().map(|d| d.label).collect::<Vec<_>>(), vec![3, 4, 5]);
        assert_eq!(out[2].score, 0.0);
    }

    #[test]
    fn test_filter_score_threshold_is_inclusive() {
        let input = vec![det(3, [0.0, 0.0, 10.0, 10.0], 0.5)];
        assert_eq!(filter_detections(&input, 0.5, 0.5).len(), 1);
        assert!(filter_detections(&input, 0.5, 0.51).is_empty());
    }

    #[test]
    fn test_batch_missing_array_is_malformed() {
        let batch: DetectionBatch =
            serde_json::from_str(r#"{"labels": [1], "bboxes": [[0, 0, 1, 1]]}"#).unwrap();
        let err = filter_batch(batch, 0.5, 0.5).unwrap_err();
        assert!(matches!(err, ReconstructError::MalformedBatch { .. }));
        assert!(err.to_string().contains("scores"));
    }

    #[test]
    fn test_batch_length_mismatch_is_malformed() {
        let batch = DetectionBatch {
            labels: Some(vec![1, 2]),
            bboxes: Some(vec![[0.0, 0.0, 1.0, 1.0]]),
            scores: Some(vec![0.9, 0.8]),
        };
        assert!(matches!(
            batch.into_detections(),
            Err(ReconstructError::MalformedBatch { .. })
        ));
    }

    #[test]
    fn test_batch_from_json() {
        let batch: DetectionBatch = serde_json::from_str(
            r#"{"labels": [14, 9], "bboxes": [[0, 0, 800, 800], [400, 400, 500, 500]], "scores": [0.99, 0.8]}"#,
        )
        .unwrap();
        let dets = batch.into_detections().unwrap();
        assert_eq!(dets.len(), 2);
        assert_eq!(dets[1].bbox, BBox::new(400.0, 400.0, 500.0, 500.0));
    }

    #[test]
    fn test_center_floors() {
        let b = BBox::new(401.0, 10.0, 500.0, 21.0);
        // (99 / 2).floor() + 401 = 450, (11 / 2).floor() + 10 = 15
        assert_eq!(b.center(), (450.0, 15.0));
    }
}
