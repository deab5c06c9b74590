//! The calibrated target map: ordered sample points with semantic roles.
//!
//! The map holds exactly eight button slots followed by the game-over and
//! ready sentinels, in the order the original rig was calibrated. Order
//! matters twice: taps are issued in slot order, and calibration nudges
//! apply to a suffix of the list (later points are calibrated relative to
//! earlier ones, so moving one target drags everything after it).

use anyhow::{Result, bail};
use image::RgbImage;

use crate::config::RigConfig;
use crate::vision::classify::{ColorCategory, classify};

/// Number of tappable button slots.
pub const BUTTON_SLOTS: usize = 8;

/// Crosshair arm length, in pixels, for the overlay markers.
const MARKER_RADIUS: i32 = 5;

/// Semantic role of a calibrated point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetRole {
    /// Tappable button, index 0..8 in calibrated order.
    Button(u8),
    /// Fires when the game shows its failure screen.
    GameOverSentinel,
    /// Fires when the game shows the go signal for a level.
    ReadySentinel,
}

/// One calibrated pixel coordinate plus its role.
#[derive(Clone, Copy, Debug)]
pub struct TargetPoint {
    pub x: i32,
    pub y: i32,
    pub role: TargetRole,
}

/// Classification of every target region for one frame.
#[derive(Clone, Copy, Debug)]
pub struct FrameClassification {
    pub buttons: [ColorCategory; BUTTON_SLOTS],
    pub game_over: ColorCategory,
    pub ready: ColorCategory,
}

impl FrameClassification {
    /// A frame is eligible for gameplay processing only when every sampled
    /// region read as a definite color. Ineligible frames are skipped, which
    /// is the normal backpressure against motion blur and lighting flicker.
    pub fn eligible(&self) -> bool {
        self.buttons.iter().all(|c| *c != ColorCategory::Unknown)
            && self.game_over != ColorCategory::Unknown
            && self.ready != ColorCategory::Unknown
    }
}

/// Ordered target points with the current calibration focus.
pub struct TargetMap {
    points: Vec<TargetPoint>,
    focus: usize,
    frame_width: u32,
    frame_height: u32,
}

impl TargetMap {
    /// Builds the map from config. The target list must be exactly the eight
    /// button slots plus the two trailing sentinels (game-over, then ready).
    pub fn from_config(cfg: &RigConfig) -> Result<Self> {
        if cfg.targets.len() != BUTTON_SLOTS + 2 {
            bail!(
                "expected {} targets (8 buttons + game-over + ready sentinel), got {}",
                BUTTON_SLOTS + 2,
                cfg.targets.len()
            );
        }
        let points = cfg
            .targets
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let role = match i {
                    i if i < BUTTON_SLOTS => TargetRole::Button(i as u8),
                    i if i == BUTTON_SLOTS => TargetRole::GameOverSentinel,
                    _ => TargetRole::ReadySentinel,
                };
                TargetPoint { x: t.x, y: t.y, role }
            })
            .collect();
        Ok(Self {
            points,
            focus: 0,
            frame_width: cfg.frame_width,
            frame_height: cfg.frame_height,
        })
    }

    pub fn points(&self) -> &[TargetPoint] {
        &self.points
    }

    pub fn focus(&self) -> usize {
        self.focus
    }

    /// Cycles the calibration focus forward, wrapping past the last point.
    pub fn advance_focus(&mut self) {
        self.focus = (self.focus + 1) % self.points.len();
    }

    /// Shifts the focused point and every later point by (dx, dy), clamped
    /// to the frame. Suffix adjustment is deliberate: nudging an early point
    /// keeps the relative spacing of everything calibrated after it.
    pub fn nudge(&mut self, dx: i32, dy: i32) {
        let (w, h) = (self.frame_width as i32, self.frame_height as i32);
        for pt in &mut self.points[self.focus..] {
            pt.x = (pt.x + dx).clamp(0, w - 1);
            pt.y = (pt.y + dy).clamp(0, h - 1);
        }
    }

    /// Samples every target against the frame.
    pub fn classify(&self, frame: &RgbImage) -> FrameClassification {
        let mut buttons = [ColorCategory::Unknown; BUTTON_SLOTS];
        let mut game_over = ColorCategory::Unknown;
        let mut ready = ColorCategory::Unknown;
        for pt in &self.points {
            let cat = sample(frame, pt.x, pt.y);
            match pt.role {
                TargetRole::Button(i) => buttons[i as usize] = cat,
                TargetRole::GameOverSentinel => game_over = cat,
                TargetRole::ReadySentinel => ready = cat,
            }
        }
        FrameClassification { buttons, game_over, ready }
    }

    /// Draws a crosshair marker over every target. Known categories render
    /// as the inverse of their canonical color; an Unknown sample renders by
    /// inverting the pixels it covers, so the marker stays visible whatever
    /// is underneath.
    pub fn draw_markers(&self, frame: &mut RgbImage, classes: &FrameClassification) {
        for pt in &self.points {
            let cat = match pt.role {
                TargetRole::Button(i) => classes.buttons[i as usize],
                TargetRole::GameOverSentinel => classes.game_over,
                TargetRole::ReadySentinel => classes.ready,
            };
            let ink = cat.canonical_rgb().map(|[r, g, b]| [255 - r, 255 - g, 255 - b]);
            for o in -MARKER_RADIUS..=MARKER_RADIUS {
                if o == 0 {
                    continue;
                }
                plot(frame, pt.x + o, pt.y, ink);
                plot(frame, pt.x, pt.y + o, ink);
                plot(frame, pt.x + o, pt.y + o, ink);
                plot(frame, pt.x + o, pt.y - o, ink);
            }
        }
    }
}

fn sample(frame: &RgbImage, x: i32, y: i32) -> ColorCategory {
    if x < 0 || y < 0 || x as u32 >= frame.width() || y as u32 >= frame.height() {
        return ColorCategory::Unknown;
    }
    let [r, g, b] = frame.get_pixel(x as u32, y as u32).0;
    classify(r, g, b)
}

fn plot(frame: &mut RgbImage, x: i32, y: i32, ink: Option<[u8; 3]>) {
    if x < 0 || y < 0 || x as u32 >= frame.width() || y as u32 >= frame.height() {
        return;
    }
    let px = frame.get_pixel_mut(x as u32, y as u32);
    px.0 = match ink {
        Some(rgb) => rgb,
        None => {
            let [r, g, b] = px.0;
            [255 - r, 255 - g, 255 - b]
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RigConfig;

    fn map() -> TargetMap {
        TargetMap::from_config(&RigConfig::default()).unwrap()
    }

    fn flat_frame(rgb: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(640, 360, image::Rgb(rgb))
    }

    #[test]
    fn default_config_builds_a_full_map() {
        let map = map();
        assert_eq!(map.points().len(), BUTTON_SLOTS + 2);
        assert_eq!(map.points()[0].role, TargetRole::Button(0));
        assert_eq!(map.points()[BUTTON_SLOTS].role, TargetRole::GameOverSentinel);
        assert_eq!(map.points().last().unwrap().role, TargetRole::ReadySentinel);
    }

    #[test]
    fn wrong_target_count_is_rejected() {
        let mut cfg = RigConfig::default();
        cfg.targets.pop();
        assert!(TargetMap::from_config(&cfg).is_err());
    }

    #[test]
    fn nudge_applies_to_suffix_only() {
        let mut map = map();
        let before: Vec<_> = map.points().iter().map(|p| (p.x, p.y)).collect();
        map.advance_focus();
        map.advance_focus();
        map.nudge(3, -2);
        for (i, pt) in map.points().iter().enumerate() {
            if i < 2 {
                assert_eq!((pt.x, pt.y), before[i], "point {i} before focus moved");
            } else {
                assert_eq!((pt.x, pt.y), (before[i].0 + 3, before[i].1 - 2));
            }
        }
    }

    #[test]
    fn nudge_clamps_to_frame_bounds() {
        let mut map = map();
        for _ in 0..1000 {
            map.nudge(-1, -1);
        }
        assert!(map.points().iter().all(|p| p.x == 0 && p.y == 0));
        for _ in 0..1000 {
            map.nudge(1, 1);
        }
        assert!(map.points().iter().all(|p| p.x == 639 && p.y == 359));
    }

    #[test]
    fn focus_wraps_past_the_last_point() {
        let mut map = map();
        for _ in 0..map.points().len() {
            map.advance_focus();
        }
        assert_eq!(map.focus(), 0);
    }

    #[test]
    fn classify_reads_every_region() {
        let map = map();
        let classes = map.classify(&flat_frame([255, 0, 0]));
        assert!(classes.buttons.iter().all(|c| *c == ColorCategory::Red));
        assert_eq!(classes.game_over, ColorCategory::Red);
        assert_eq!(classes.ready, ColorCategory::Red);
        assert!(classes.eligible());
    }

    #[test]
    fn one_unknown_region_makes_the_frame_ineligible() {
        let map = map();
        let mut frame = flat_frame([255, 255, 255]);
        let pt = map.points()[3];
        frame.put_pixel(pt.x as u32, pt.y as u32, image::Rgb([0, 0, 0]));
        let classes = map.classify(&frame);
        assert_eq!(classes.buttons[3], ColorCategory::Unknown);
        assert!(!classes.eligible());
    }

    #[test]
    fn out_of_frame_target_reads_unknown() {
        let map = map();
        let small = RgbImage::from_pixel(4, 4, image::Rgb([255, 255, 255]));
        assert!(!map.classify(&small).eligible());
    }

    #[test]
    fn markers_invert_the_canonical_color() {
        let map = map();
        let mut frame = flat_frame([255, 0, 0]);
        let classes = map.classify(&frame);
        map.draw_markers(&mut frame, &classes);
        let pt = map.points()[0];
        // Red sample renders cyan arms.
        let arm = frame.get_pixel((pt.x + 1) as u32, pt.y as u32).0;
        assert_eq!(arm, [0, 255, 255]);
        // The sampled pixel itself is left untouched.
        let center = frame.get_pixel(pt.x as u32, pt.y as u32).0;
        assert_eq!(center, [255, 0, 0]);
    }
}
