use crate::shared::detection::Detection;

/// A scored corner-form box as decoded from raw model output.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Candidate {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub score: f64,
}

impl Candidate {
    pub fn to_detection(&self) -> Detection {
        Detection::from_corners(
            [self.x1 as f32, self.y1 as f32],
            [self.x2 as f32, self.y2 as f32],
        )
    }
}

/// Greedy NMS: sort by score descending, suppress boxes overlapping a kept one.
pub(crate) fn nms(candidates: &mut [Candidate], iou_thresh: f64) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<Candidate> = Vec::new();
    for c in candidates.iter() {
        if keep.iter().all(|k| iou(k, c) <= iou_thresh) {
            keep.push(c.clone());
        }
    }
    keep
}

pub(crate) fn iou(a: &Candidate, b: &Candidate) -> f64 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = (a.x2 - a.x1) * (a.y2 - a.y1);
    let area_b = (b.x2 - b.x1) * (b.y2 - b.y1);
    inter / (area_a + area_b - inter)
}
