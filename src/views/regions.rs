use crate::error::{ViewError, ViewWarning};
use crate::pose::{KeypointSet, PartName};

use super::{BoundingBox, ViewName, ViewSpec};

const SHOULDERS_AND_HIPS: &[PartName] = &[
    PartName::LeftShoulder,
    PartName::RightShoulder,
    PartName::LeftHip,
    PartName::RightHip,
];
const SLEEVE_PARTS: &[PartName] = &[PartName::Nose, PartName::LeftHip];
const WAIST_PARTS: &[PartName] = &[
    PartName::LeftShoulder,
    PartName::RightShoulder,
    PartName::LeftHip,
    PartName::RightHip,
    PartName::LeftKnee,
    PartName::RightKnee,
];
const LENGTH_PARTS: &[PartName] = &[
    PartName::LeftKnee,
    PartName::RightKnee,
    PartName::LeftAnkle,
    PartName::RightAnkle,
];
const ZOOMED_PARTS: &[PartName] = &[
    PartName::LeftShoulder,
    PartName::RightShoulder,
    PartName::LeftHip,
];

/// 領域計算の定数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionRules {
    /// length ビューの上下マージン（ピクセル）
    pub length_margin_y: f32,
    /// length ビューの左右マージン（ピクセル）
    pub length_margin_x: f32,
    /// zoomed ビューの一辺（ピクセル）
    pub zoom_size: f32,
    /// zoomed ビューもキャンバスにクランプするか
    pub clamp_zoomed: bool,
}

impl Default for RegionRules {
    fn default() -> Self {
        Self {
            length_margin_y: 30.0,
            length_margin_x: 60.0,
            zoom_size: 150.0,
            clamp_zoomed: false,
        }
    }
}

/// ビューごとの必須キーポイント
pub fn required_parts(view: ViewName) -> &'static [PartName] {
    match view {
        ViewName::Full => &[],
        ViewName::Neck => SHOULDERS_AND_HIPS,
        ViewName::Sleeve => SLEEVE_PARTS,
        ViewName::Waist => WAIST_PARTS,
        ViewName::Length => LENGTH_PARTS,
        ViewName::Zoomed => ZOOMED_PARTS,
    }
}

/// 単一ビューの評価結果
#[derive(Debug, Clone, PartialEq)]
pub enum ViewOutcome {
    Planned(ViewSpec),
    Skipped(ViewWarning),
    Failed(ViewError),
}

/// 生成するビューの一覧と警告
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ViewPlan {
    pub views: Vec<ViewSpec>,
    pub warnings: Vec<ViewWarning>,
}

impl ViewPlan {
    pub fn get(&self, name: ViewName) -> Option<&ViewSpec> {
        self.views.iter().find(|v| v.name == name)
    }

    pub fn names(&self) -> Vec<ViewName> {
        self.views.iter().map(|v| v.name).collect()
    }
}

/// 1ビュー分の領域を評価
///
/// 必須キーポイントが欠けていれば、waist は Skipped、それ以外は Failed。
pub fn evaluate_view(
    view: ViewName,
    keypoints: &KeypointSet,
    canvas_w: u32,
    canvas_h: u32,
    rules: &RegionRules,
) -> ViewOutcome {
    let required = required_parts(view);
    let missing = keypoints.missing(required);
    if !missing.is_empty() {
        return if view.is_optional() {
            ViewOutcome::Skipped(ViewWarning::SkippedView { view, missing })
        } else {
            ViewOutcome::Failed(ViewError::MissingKeypoints { view, missing })
        };
    }

    if view == ViewName::Full {
        return ViewOutcome::Planned(ViewSpec {
            name: view,
            region: None,
        });
    }

    let w = canvas_w as f32;
    let h = canvas_h as f32;
    let region = match view {
        ViewName::Full => None,
        ViewName::Neck => neck_region(keypoints),
        ViewName::Sleeve => sleeve_region(keypoints, w),
        ViewName::Waist => waist_region(keypoints, w),
        ViewName::Length => length_region(keypoints, w, h, rules),
        ViewName::Zoomed => zoomed_region(keypoints, rules),
    };

    match region {
        Some(region) => {
            let clamp = view != ViewName::Zoomed || rules.clamp_zoomed;
            let region = if clamp {
                region.clamp_to_canvas(canvas_w, canvas_h)
            } else {
                region
            };
            ViewOutcome::Planned(ViewSpec {
                name: view,
                region: Some(region),
            })
        }
        None => ViewOutcome::Failed(ViewError::MissingKeypoints {
            view,
            missing: required.to_vec(),
        }),
    }
}

/// 全ビューの領域を計算
///
/// 必須ビューが1つでも欠ければ全体を失敗させる。切り出しより前に判定が終わる。
pub fn plan_views(
    keypoints: &KeypointSet,
    canvas_w: u32,
    canvas_h: u32,
    rules: &RegionRules,
) -> Result<ViewPlan, ViewError> {
    if canvas_w == 0 || canvas_h == 0 {
        return Err(ViewError::EmptyCanvas {
            width: canvas_w,
            height: canvas_h,
        });
    }

    let mut plan = ViewPlan::default();
    for view in ViewName::ALL {
        match evaluate_view(view, keypoints, canvas_w, canvas_h, rules) {
            ViewOutcome::Planned(spec) => plan.views.push(spec),
            ViewOutcome::Skipped(warning) => plan.warnings.push(warning),
            ViewOutcome::Failed(err) => return Err(err),
        }
    }
    Ok(plan)
}

/// 襟: 両肩のX範囲、上端から肩の最下点まで
fn neck_region(kps: &KeypointSet) -> Option<BoundingBox> {
    let ls = kps.get(PartName::LeftShoulder)?;
    let rs = kps.get(PartName::RightShoulder)?;
    Some(BoundingBox::from_corners(
        ls.x.min(rs.x),
        0.0,
        ls.x.max(rs.x),
        ls.y.max(rs.y),
    ))
}

/// 袖: 鼻から右端まで、鼻の高さから左腰まで
fn sleeve_region(kps: &KeypointSet, canvas_w: f32) -> Option<BoundingBox> {
    let nose = kps.get(PartName::Nose)?;
    let left_hip = kps.get(PartName::LeftHip)?;
    Some(BoundingBox::from_corners(
        nose.x,
        nose.y,
        canvas_w,
        left_hip.y,
    ))
}

/// 腰: 肩・腰・膝の中点から作る4隅の外接矩形
fn waist_region(kps: &KeypointSet, canvas_w: f32) -> Option<BoundingBox> {
    let rs = kps.get(PartName::RightShoulder)?;
    let lh = kps.get(PartName::LeftHip)?;
    let rh = kps.get(PartName::RightHip)?;
    let rk = kps.get(PartName::RightKnee)?;

    let top_left = (rh.x.min(lh.x) / 2.0, (rs.y + rh.y) / 2.0);
    let top_right = ((lh.x + canvas_w) / 2.0, top_left.1);
    let bottom_left = (top_left.0, (rh.y + rk.y) / 2.0);
    let bottom_right = (top_right.0, bottom_left.1);

    let left = top_left.0.min(bottom_left.0);
    let right = top_right.0.max(bottom_right.0);
    let top = top_left.1.min(bottom_left.1);
    let bottom = top_right.1.max(bottom_right.1);
    Some(BoundingBox::from_corners(left, top, right, bottom))
}

/// 丈: 膝から足首まで、マージン付き
fn length_region(
    kps: &KeypointSet,
    canvas_w: f32,
    canvas_h: f32,
    rules: &RegionRules,
) -> Option<BoundingBox> {
    let lk = kps.get(PartName::LeftKnee)?;
    let rk = kps.get(PartName::RightKnee)?;
    let la = kps.get(PartName::LeftAnkle)?;
    let ra = kps.get(PartName::RightAnkle)?;

    let top = (lk.y.min(rk.y) - rules.length_margin_y).max(0.0);
    let bottom = (la.y.max(ra.y) + rules.length_margin_y).min(canvas_h);
    let left = (lk.x.min(rk.x) - rules.length_margin_x).max(0.0);
    let right = (lk.x.max(rk.x) + rules.length_margin_x).min(canvas_w);
    Some(BoundingBox::from_corners(left, top, right, bottom))
}

/// 胴体中心の固定サイズ領域（キャンバス外にはみ出し得る）
fn zoomed_region(kps: &KeypointSet, rules: &RegionRules) -> Option<BoundingBox> {
    let ls = kps.get(PartName::LeftShoulder)?;
    let rs = kps.get(PartName::RightShoulder)?;
    let lh = kps.get(PartName::LeftHip)?;

    let half = rules.zoom_size / 2.0;
    let x = (ls.x + rs.x) / 2.0 - half;
    let y = (ls.y + lh.y) / 2.0 - half;
    Some(BoundingBox::new(x, y, rules.zoom_size, rules.zoom_size))
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: u32 = 400;
    const H: u32 = 600;

    fn full_body() -> KeypointSet {
        KeypointSet::new()
            .with(PartName::Nose, 200.0, 80.0)
            .with(PartName::LeftShoulder, 250.0, 150.0)
            .with(PartName::RightShoulder, 150.0, 150.0)
            .with(PartName::LeftHip, 230.0, 330.0)
            .with(PartName::RightHip, 170.0, 330.0)
            .with(PartName::LeftKnee, 235.0, 450.0)
            .with(PartName::RightKnee, 165.0, 450.0)
            .with(PartName::LeftAnkle, 240.0, 560.0)
            .with(PartName::RightAnkle, 160.0, 560.0)
    }

    fn without(set: &KeypointSet, parts: &[PartName]) -> KeypointSet {
        let mut out = KeypointSet::new();
        for kp in set.iter().filter(|k| !parts.contains(&k.part)) {
            out.insert(*kp);
        }
        out
    }

    fn region(plan: &ViewPlan, name: ViewName) -> BoundingBox {
        plan.get(name).and_then(|v| v.region).unwrap()
    }

    #[test]
    fn test_plan_all_views_present() {
        let plan = plan_views(&full_body(), W, H, &RegionRules::default()).unwrap();
        assert_eq!(plan.names(), ViewName::ALL.to_vec());
        assert!(plan.warnings.is_empty());
        assert_eq!(plan.get(ViewName::Full).unwrap().region, None);
    }

    #[test]
    fn test_geometry_per_view() {
        let plan = plan_views(&full_body(), W, H, &RegionRules::default()).unwrap();
        assert_eq!(region(&plan, ViewName::Neck), BoundingBox::new(150.0, 0.0, 100.0, 150.0));
        assert_eq!(region(&plan, ViewName::Sleeve), BoundingBox::new(200.0, 80.0, 200.0, 250.0));
        // 4隅: x = 170/2, (230+400)/2 ; y = (150+330)/2, (330+450)/2
        assert_eq!(region(&plan, ViewName::Waist), BoundingBox::new(85.0, 240.0, 230.0, 150.0));
        assert_eq!(region(&plan, ViewName::Length), BoundingBox::new(105.0, 420.0, 190.0, 170.0));
        assert_eq!(region(&plan, ViewName::Zoomed), BoundingBox::new(125.0, 165.0, 150.0, 150.0));
    }

    #[test]
    fn test_missing_essential_parts_fail_whole_plan() {
        for part in SHOULDERS_AND_HIPS {
            let kps = without(&full_body(), &[*part]);
            let err = plan_views(&kps, W, H, &RegionRules::default()).unwrap_err();
            match err {
                ViewError::MissingKeypoints { missing, .. } => assert!(missing.contains(part)),
                other => panic!("unexpected error {other:?}"),
            }
        }
    }

    #[test]
    fn test_missing_nose_fails_sleeve() {
        let kps = without(&full_body(), &[PartName::Nose]);
        let err = plan_views(&kps, W, H, &RegionRules::default()).unwrap_err();
        assert_eq!(
            err,
            ViewError::MissingKeypoints {
                view: ViewName::Sleeve,
                missing: vec![PartName::Nose],
            }
        );
    }

    #[test]
    fn test_knees_absent_skips_waist_only() {
        let kps = without(&full_body(), &[PartName::LeftKnee, PartName::RightKnee]);
        let rules = RegionRules::default();

        for view in [ViewName::Full, ViewName::Neck, ViewName::Sleeve] {
            assert!(matches!(
                evaluate_view(view, &kps, W, H, &rules),
                ViewOutcome::Planned(_)
            ));
        }
        assert_eq!(
            evaluate_view(ViewName::Waist, &kps, W, H, &rules),
            ViewOutcome::Skipped(ViewWarning::SkippedView {
                view: ViewName::Waist,
                missing: vec![PartName::LeftKnee, PartName::RightKnee],
            })
        );
        // 丈は膝が必須なので全体は失敗する
        let err = plan_views(&kps, W, H, &rules).unwrap_err();
        assert!(matches!(err, ViewError::MissingKeypoints { view: ViewName::Length, .. }));
    }

    #[test]
    fn test_waist_skipped_when_only_waist_parts_missing() {
        // 右膝だけ欠損
        let kps = without(&full_body(), &[PartName::RightKnee]);
        let outcome = evaluate_view(ViewName::Waist, &kps, W, H, &RegionRules::default());
        assert!(matches!(outcome, ViewOutcome::Skipped(_)));
    }

    #[test]
    fn test_length_clamped_to_canvas() {
        let kps = full_body()
            .with(PartName::LeftKnee, 380.0, 20.0)
            .with(PartName::RightKnee, 350.0, 25.0)
            .with(PartName::LeftAnkle, 370.0, 590.0)
            .with(PartName::RightAnkle, 360.0, 595.0);
        let plan = plan_views(&kps, W, H, &RegionRules::default()).unwrap();
        let length = region(&plan, ViewName::Length);
        assert_eq!(length, BoundingBox::new(290.0, 0.0, 110.0, 600.0));
        assert!(length.x >= 0.0 && length.y >= 0.0);
        assert!(length.right() <= W as f32 && length.bottom() <= H as f32);
    }

    #[test]
    fn test_zoomed_not_clamped_by_default() {
        let kps = full_body()
            .with(PartName::LeftShoulder, 40.0, 60.0)
            .with(PartName::RightShoulder, 20.0, 60.0)
            .with(PartName::LeftHip, 30.0, 100.0);
        let plan = plan_views(&kps, W, H, &RegionRules::default()).unwrap();
        assert_eq!(region(&plan, ViewName::Zoomed), BoundingBox::new(-45.0, 5.0, 150.0, 150.0));

        let rules = RegionRules {
            clamp_zoomed: true,
            ..RegionRules::default()
        };
        let plan = plan_views(&kps, W, H, &rules).unwrap();
        assert_eq!(region(&plan, ViewName::Zoomed), BoundingBox::new(0.0, 5.0, 105.0, 150.0));
    }

    #[test]
    fn test_degenerate_sleeve_floors_to_one_pixel() {
        // 鼻が左腰より下 → 高さが負
        let kps = full_body().with(PartName::Nose, 399.5, 400.0);
        let plan = plan_views(&kps, W, H, &RegionRules::default()).unwrap();
        let sleeve = region(&plan, ViewName::Sleeve);
        assert_eq!(sleeve.height, 1.0);
        assert_eq!(sleeve.x, 399.0);
        assert!(sleeve.right() <= W as f32);
    }

    #[test]
    fn test_shoulders_off_canvas_keep_neck_inside() {
        let kps = full_body()
            .with(PartName::LeftShoulder, 450.0, 150.0)
            .with(PartName::RightShoulder, 420.0, 150.0);
        let plan = plan_views(&kps, W, H, &RegionRules::default()).unwrap();
        let neck = region(&plan, ViewName::Neck);
        assert_eq!(neck, BoundingBox::new(399.0, 0.0, 1.0, 150.0));
        for spec in plan.views.iter().filter(|v| v.name != ViewName::Zoomed) {
            if let Some(r) = spec.region {
                assert!(r.x >= 0.0 && r.y >= 0.0, "{:?}", spec);
                assert!(r.width >= 1.0 && r.height >= 1.0, "{:?}", spec);
                assert!(r.right() <= W as f32 && r.bottom() <= H as f32, "{:?}", spec);
            }
        }
    }

    #[test]
    fn test_empty_canvas_rejected() {
        let err = plan_views(&full_body(), 0, 600, &RegionRules::default()).unwrap_err();
        assert_eq!(err, ViewError::EmptyCanvas { width: 0, height: 600 });
    }
}
