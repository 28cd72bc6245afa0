use serde::Deserialize;

/// PoseNet の部位名（17キーポイント）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(usize)]
pub enum PartName {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

impl PartName {
    pub const COUNT: usize = 17;

    pub const ALL: [PartName; PartName::COUNT] = [
        Self::Nose,
        Self::LeftEye,
        Self::RightEye,
        Self::LeftEar,
        Self::RightEar,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftWrist,
        Self::RightWrist,
        Self::LeftHip,
        Self::RightHip,
        Self::LeftKnee,
        Self::RightKnee,
        Self::LeftAnkle,
        Self::RightAnkle,
    ];

    /// ポーズモデルの部位名（camelCase）から変換。未知の名前は None
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.as_str() == name)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nose => "nose",
            Self::LeftEye => "leftEye",
            Self::RightEye => "rightEye",
            Self::LeftEar => "leftEar",
            Self::RightEar => "rightEar",
            Self::LeftShoulder => "leftShoulder",
            Self::RightShoulder => "rightShoulder",
            Self::LeftElbow => "leftElbow",
            Self::RightElbow => "rightElbow",
            Self::LeftWrist => "leftWrist",
            Self::RightWrist => "rightWrist",
            Self::LeftHip => "leftHip",
            Self::RightHip => "rightHip",
            Self::LeftKnee => "leftKnee",
            Self::RightKnee => "rightKnee",
            Self::LeftAnkle => "leftAnkle",
            Self::RightAnkle => "rightAnkle",
        }
    }
}

impl std::fmt::Display for PartName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 単一キーポイント
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub part: PartName,
    /// X座標（ピクセル）
    pub x: f32,
    /// Y座標（ピクセル）
    pub y: f32,
    /// 信頼度スコア。モデルが出さない場合は None
    pub confidence: Option<f32>,
}

impl Keypoint {
    pub fn new(part: PartName, x: f32, y: f32) -> Self {
        Self {
            part,
            x,
            y,
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// 信頼度が閾値以上か（スコアなしは常に有効）
    pub fn is_valid(&self, threshold: f32) -> bool {
        self.confidence.map_or(true, |c| c >= threshold)
    }
}

/// ポーズモデル出力の1要素: `{part, position: {x, y}, score?}`
#[derive(Debug, Clone, Deserialize)]
pub struct RawKeypoint {
    pub part: String,
    pub position: RawPosition,
    #[serde(default)]
    pub score: Option<f32>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RawPosition {
    pub x: f32,
    pub y: f32,
}

/// 部位 → キーポイントの部分写像
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeypointSet {
    keypoints: [Option<Keypoint>; PartName::COUNT],
}

impl KeypointSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// キーポイントを登録（同じ部位は後勝ち）
    pub fn insert(&mut self, keypoint: Keypoint) {
        self.keypoints[keypoint.part as usize] = Some(keypoint);
    }

    pub fn with(mut self, part: PartName, x: f32, y: f32) -> Self {
        self.insert(Keypoint::new(part, x, y));
        self
    }

    /// ポーズモデル出力から構築
    ///
    /// - 未知の部位名は無視
    /// - `min_confidence` 未満のキーポイントは欠損扱い
    pub fn from_raw(raw: &[RawKeypoint], min_confidence: f32) -> Self {
        let mut set = Self::new();
        for kp in raw {
            let Some(part) = PartName::from_name(&kp.part) else {
                continue;
            };
            let mut keypoint = Keypoint::new(part, kp.position.x, kp.position.y);
            if let Some(score) = kp.score {
                keypoint = keypoint.with_confidence(score);
            }
            if keypoint.is_valid(min_confidence) {
                set.insert(keypoint);
            }
        }
        set
    }

    /// 部位名でキーポイントを取得
    pub fn get(&self, part: PartName) -> Option<&Keypoint> {
        self.keypoints[part as usize].as_ref()
    }

    pub fn contains(&self, part: PartName) -> bool {
        self.get(part).is_some()
    }

    /// 要求部位のうち欠けているものを列挙（要求順）
    pub fn missing(&self, required: &[PartName]) -> Vec<PartName> {
        required
            .iter()
            .copied()
            .filter(|p| !self.contains(*p))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.keypoints.iter().filter(|k| k.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Keypoint> {
        self.keypoints.iter().flatten()
    }
}
