//! YOLO形式ラベルとCOCO形式との座標変換

use crate::error::{Error, Result};
use std::fmt;

/// 正規化座標の許容誤差
///
/// `[-ε, 1+ε]` の範囲内ははみ出し分を切り詰め、範囲外は不正とする。
pub const GEOMETRY_EPSILON: f64 = 0.01;

/// 正規化済みの中心座標形式ボックス
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YoloBox {
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
}

impl YoloBox {
    fn values(&self) -> [f64; 4] {
        [self.x_center, self.y_center, self.width, self.height]
    }

    /// 全要素が `[-eps, 1+eps]` に収まっているか
    pub fn is_within(&self, eps: f64) -> bool {
        self.values()
            .iter()
            .all(|v| v.is_finite() && *v >= -eps && *v <= 1.0 + eps)
    }

    /// `[0,1]` に切り詰めたボックス
    pub fn clamped(&self) -> YoloBox {
        YoloBox {
            x_center: self.x_center.clamp(0.0, 1.0),
            y_center: self.y_center.clamp(0.0, 1.0),
            width: self.width.clamp(0.0, 1.0),
            height: self.height.clamp(0.0, 1.0),
        }
    }

    /// 範囲検証して切り詰める
    pub fn validated(&self) -> Result<YoloBox> {
        if !self.is_within(GEOMETRY_EPSILON) {
            return Err(Error::Geometry(format!(
                "normalized box out of range: {} {} {} {}",
                self.x_center, self.y_center, self.width, self.height
            )));
        }
        Ok(self.clamped())
    }

    /// ピクセル座標の (x_min, y_min, x_max, y_max) に変換
    ///
    /// 描画用なので整数に丸め、画像範囲内に収める。
    pub fn to_pixel_tlbr(&self, img_w: u32, img_h: u32) -> (u32, u32, u32, u32) {
        let w = img_w as f64;
        let h = img_h as f64;
        let xc = self.x_center * w;
        let yc = self.y_center * h;
        let bw = self.width * w;
        let bh = self.height * h;

        let max_x = img_w.saturating_sub(1) as f64;
        let max_y = img_h.saturating_sub(1) as f64;

        let x_min = (xc - bw / 2.0).trunc().clamp(0.0, max_x);
        let y_min = (yc - bh / 2.0).trunc().clamp(0.0, max_y);
        let x_max = (xc + bw / 2.0).trunc().clamp(0.0, max_x);
        let y_max = (yc + bh / 2.0).trunc().clamp(0.0, max_y);

        (x_min as u32, y_min as u32, x_max as u32, y_max as u32)
    }
}

/// COCOボックス `[x_min, y_min, w, h]` をYOLO正規化形式に変換
///
/// 画像サイズが0以下の場合はエラー。範囲チェックは行わない。
pub fn coco_to_yolo(bbox: [f64; 4], img_w: f64, img_h: f64) -> Result<YoloBox> {
    check_image_size(img_w, img_h)?;

    let [x_min, y_min, w, h] = bbox;
    if w < 0.0 || h < 0.0 {
        return Err(Error::Geometry(format!("negative box size: {} x {}", w, h)));
    }

    Ok(YoloBox {
        x_center: (x_min + w / 2.0) / img_w,
        y_center: (y_min + h / 2.0) / img_h,
        width: w / img_w,
        height: h / img_h,
    })
}

/// YOLO正規化形式をCOCOボックスに戻す
pub fn yolo_to_coco(b: &YoloBox, img_w: f64, img_h: f64) -> [f64; 4] {
    let w = b.width * img_w;
    let h = b.height * img_h;
    [b.x_center * img_w - w / 2.0, b.y_center * img_h - h / 2.0, w, h]
}

fn check_image_size(img_w: f64, img_h: f64) -> Result<()> {
    if !(img_w > 0.0) {
        return Err(Error::Geometry(format!("image width must be positive (got {})", img_w)));
    }
    if !(img_h > 0.0) {
        return Err(Error::Geometry(format!("image height must be positive (got {})", img_h)));
    }
    Ok(())
}

/// ラベルファイルの1行
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelLine {
    pub class_id: i64,
    pub bbox: YoloBox,
}

impl LabelLine {
    /// `class x y w h` をパース
    pub fn parse(line: &str) -> Result<Self> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(Error::Parse(format!(
                "expected 5 fields, got {}: {:?}",
                parts.len(),
                line.trim()
            )));
        }

        let class_id = parts[0]
            .parse::<i64>()
            .map_err(|e| Error::Parse(format!("class id {:?}: {}", parts[0], e)))?;

        let mut values = [0.0f64; 4];
        for (slot, raw) in values.iter_mut().zip(&parts[1..]) {
            *slot = raw
                .parse::<f64>()
                .map_err(|e| Error::Parse(format!("coordinate {:?}: {}", raw, e)))?;
        }

        Ok(Self {
            class_id,
            bbox: YoloBox {
                x_center: values[0],
                y_center: values[1],
                width: values[2],
                height: values[3],
            },
        })
    }
}

impl fmt::Display for LabelLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.class_id, self.bbox.x_center, self.bbox.y_center, self.bbox.width, self.bbox.height
        )
    }
}

/// ラベルファイルの内容を生成（0件なら空文字列）
pub fn format_label_file(lines: &[LabelLine]) -> String {
    lines.iter().map(|l| format!("{}\n", l)).collect()
}

/// ラベルファイルをパース
///
/// 不正な行はスキップし、(行番号, エラー) として返す。空行は無視。
pub fn parse_label_file(content: &str) -> (Vec<LabelLine>, Vec<(usize, Error)>) {
    let mut lines = Vec::new();
    let mut errors = Vec::new();

    for (idx, raw) in content.lines().enumerate() {
        if raw.trim().is_empty() {
            continue;
        }
        match LabelLine::parse(raw) {
            Ok(line) => lines.push(line),
            Err(e) => errors.push((idx + 1, e)),
        }
    }

    (lines, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_coco_to_yolo_basic() {
        let b = coco_to_yolo([10.0, 10.0, 20.0, 20.0], 100.0, 100.0).unwrap();
        assert!(approx(b.x_center, 0.2));
        assert!(approx(b.y_center, 0.2));
        assert!(approx(b.width, 0.2));
        assert!(approx(b.height, 0.2));
    }

    #[test]
    fn test_coco_to_yolo_non_square() {
        let b = coco_to_yolo([0.0, 0.0, 640.0, 240.0], 640.0, 480.0).unwrap();
        assert!(approx(b.x_center, 0.5));
        assert!(approx(b.y_center, 0.25));
        assert!(approx(b.width, 1.0));
        assert!(approx(b.height, 0.5));
    }

    #[test]
    fn test_coco_to_yolo_rejects_bad_image_size() {
        assert!(matches!(coco_to_yolo([0.0, 0.0, 1.0, 1.0], 0.0, 10.0), Err(Error::Geometry(_))));
        assert!(matches!(coco_to_yolo([0.0, 0.0, 1.0, 1.0], 10.0, -5.0), Err(Error::Geometry(_))));
        assert!(matches!(coco_to_yolo([0.0, 0.0, 1.0, 1.0], f64::NAN, 10.0), Err(Error::Geometry(_))));
    }

    #[test]
    fn test_coco_to_yolo_rejects_negative_box() {
        assert!(coco_to_yolo([0.0, 0.0, -1.0, 1.0], 10.0, 10.0).is_err());
    }

    #[test]
    fn test_round_trip() {
        let cases = [
            ([10.0, 10.0, 20.0, 20.0], 100.0, 100.0),
            ([123.5, 77.25, 300.0, 12.0], 1920.0, 1080.0),
            ([0.0, 0.0, 3264.0, 2448.0], 3264.0, 2448.0),
        ];
        for (bbox, w, h) in cases {
            let y = coco_to_yolo(bbox, w, h).unwrap();
            let back = yolo_to_coco(&y, w, h);
            for (a, b) in bbox.iter().zip(back.iter()) {
                assert!((a - b).abs() < 1e-6, "{:?} -> {:?}", bbox, back);
            }
        }
    }

    #[test]
    fn test_validated_clamps_small_overshoot() {
        let b = YoloBox { x_center: 1.004, y_center: 0.5, width: 0.1, height: -0.002 };
        let v = b.validated().unwrap();
        assert_eq!(v.x_center, 1.0);
        assert_eq!(v.height, 0.0);
    }

    #[test]
    fn test_validated_rejects_far_outside() {
        let b = coco_to_yolo([150.0, 10.0, 20.0, 20.0], 100.0, 100.0).unwrap();
        assert!(matches!(b.validated(), Err(Error::Geometry(_))));
    }

    #[test]
    fn test_label_line_format() {
        let line = LabelLine {
            class_id: 3,
            bbox: coco_to_yolo([10.0, 10.0, 20.0, 20.0], 100.0, 100.0).unwrap(),
        };
        assert_eq!(line.to_string(), "3 0.2 0.2 0.2 0.2");
        assert_eq!(format_label_file(&[line]), "3 0.2 0.2 0.2 0.2\n");
        assert_eq!(format_label_file(&[]), "");
    }

    #[test]
    fn test_label_line_parse() {
        let line = LabelLine::parse("7 0.5 0.25 0.1 0.2").unwrap();
        assert_eq!(line.class_id, 7);
        assert!(approx(line.bbox.y_center, 0.25));
        assert!(LabelLine::parse("7 0.5 0.25 0.1").is_err());
        assert!(LabelLine::parse("x 0.5 0.25 0.1 0.2").is_err());
    }

    #[test]
    fn test_parse_label_file_skips_malformed() {
        let content = "0 0.5 0.5 0.1 0.1\n\nbroken line\n1 0.2 0.2 0.2 0.2\n";
        let (lines, errors) = parse_label_file(content);
        assert_eq!(lines.len(), 2);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, 3);
    }

    #[test]
    fn test_to_pixel_tlbr_clamps() {
        let b = YoloBox { x_center: 0.05, y_center: 0.5, width: 0.2, height: 0.2 };
        let (x1, y1, x2, y2) = b.to_pixel_tlbr(100, 100);
        assert_eq!((x1, y1, x2, y2), (0, 40, 15, 60));

        let edge = YoloBox { x_center: 1.0, y_center: 1.0, width: 0.5, height: 0.5 };
        let (_, _, x2, y2) = edge.to_pixel_tlbr(100, 50);
        assert_eq!((x2, y2), (99, 49));
    }
}
