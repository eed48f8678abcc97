/// URL-based image transformations
///
/// A transformation is one URL path component such as
/// `g_face,h_400,w_400,c_thumb`. A chain of them is applied left to right
/// by the image service.
///
/// [`EditImageRequest`] is the body of the transform endpoint. Each section
/// has a `use_filter` switch; [`EditImageRequest::transformations`] turns
/// the enabled sections into a chain in a fixed order: circle, effect,
/// resize, rotate.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// One step of a transformation chain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transformation {
    params: Vec<(&'static str, String)>,
}

impl Transformation {
    pub fn new() -> Self {
        Self::default()
    }

    fn param(mut self, key: &'static str, value: impl ToString) -> Self {
        self.params.push((key, value.to_string()));
        self
    }

    pub fn gravity(self, value: &str) -> Self {
        self.param("g", value)
    }

    pub fn height(self, value: u32) -> Self {
        self.param("h", value)
    }

    pub fn width(self, value: u32) -> Self {
        self.param("w", value)
    }

    pub fn crop(self, value: &str) -> Self {
        self.param("c", value)
    }

    pub fn radius(self, value: &str) -> Self {
        self.param("r", value)
    }

    pub fn effect(self, value: &str) -> Self {
        self.param("e", value)
    }

    pub fn angle(self, value: impl ToString) -> Self {
        self.param("a", value)
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Renders the step as a URL path component
    pub fn to_url_component(&self) -> String {
        self.params
            .iter()
            .map(|(key, value)| format!("{}_{}", key, value))
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn default_side() -> u32 {
    400
}

fn default_degree() -> i32 {
    45
}

/// Crops the image to a circle around the detected face
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CircleSection {
    #[serde(default)]
    pub use_filter: bool,

    #[serde(default = "default_side")]
    #[validate(range(max = 4000))]
    pub height: u32,

    #[serde(default = "default_side")]
    #[validate(range(max = 4000))]
    pub width: u32,
}

/// Artistic effects; when several are selected the last one listed wins
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EffectSection {
    #[serde(default)]
    pub use_filter: bool,
    #[serde(default)]
    pub art_audrey: bool,
    #[serde(default)]
    pub art_zorro: bool,
    #[serde(default)]
    pub blur: bool,
    #[serde(default)]
    pub cartoonify: bool,
}

impl EffectSection {
    fn selected(&self) -> Option<&'static str> {
        [
            (self.art_audrey, "art:audrey"),
            (self.art_zorro, "art:zorro"),
            (self.blur, "blur:300"),
            (self.cartoonify, "cartoonify"),
        ]
        .into_iter()
        .filter(|(enabled, _)| *enabled)
        .map(|(_, name)| name)
        .last()
    }
}

/// Resizes with `crop` or `fill`; `fill` wins when both are set
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ResizeSection {
    #[serde(default)]
    pub use_filter: bool,
    #[serde(default)]
    pub crop: bool,
    #[serde(default)]
    pub fill: bool,

    #[serde(default = "default_side")]
    #[validate(range(max = 4000))]
    pub height: u32,

    #[serde(default = "default_side")]
    #[validate(range(max = 4000))]
    pub width: u32,
}

/// Scales, flips vertically, then rotates by `degree`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RotateSection {
    #[serde(default)]
    pub use_filter: bool,

    #[serde(default = "default_side")]
    #[validate(range(max = 4000))]
    pub width: u32,

    #[serde(default = "default_degree")]
    #[validate(range(min = -360, max = 360, message = "Degree must be between -360 and 360"))]
    pub degree: i32,
}

impl Default for CircleSection {
    fn default() -> Self {
        Self {
            use_filter: false,
            height: default_side(),
            width: default_side(),
        }
    }
}

impl Default for ResizeSection {
    fn default() -> Self {
        Self {
            use_filter: false,
            crop: false,
            fill: false,
            height: default_side(),
            width: default_side(),
        }
    }
}

impl Default for RotateSection {
    fn default() -> Self {
        Self {
            use_filter: false,
            width: default_side(),
            degree: default_degree(),
        }
    }
}

/// Body of the image transform endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct EditImageRequest {
    #[serde(default)]
    #[validate(nested)]
    pub circle: CircleSection,

    #[serde(default)]
    pub effect: EffectSection,

    #[serde(default)]
    #[validate(nested)]
    pub resize: ResizeSection,

    #[serde(default)]
    #[validate(nested)]
    pub rotate: RotateSection,
}

impl EditImageRequest {
    /// Builds the transformation chain for the enabled sections
    ///
    /// Sections with zero dimensions (or a zero degree for rotate) are
    /// skipped. An empty result means nothing was selected.
    pub fn transformations(&self) -> Vec<Transformation> {
        let mut chain = Vec::new();

        let circle = &self.circle;
        if circle.use_filter && circle.height > 0 && circle.width > 0 {
            chain.push(
                Transformation::new()
                    .gravity("face")
                    .height(circle.height)
                    .width(circle.width)
                    .crop("thumb"),
            );
            chain.push(Transformation::new().radius("max"));
        }

        if self.effect.use_filter {
            if let Some(effect) = self.effect.selected() {
                chain.push(Transformation::new().effect(effect));
            }
        }

        let resize = &self.resize;
        if resize.use_filter && resize.height > 0 && resize.width > 0 {
            let mode = if resize.fill {
                Some("fill")
            } else if resize.crop {
                Some("crop")
            } else {
                None
            };

            if let Some(mode) = mode {
                chain.push(
                    Transformation::new()
                        .gravity("auto")
                        .height(resize.height)
                        .width(resize.width)
                        .crop(mode),
                );
            }
        }

        let rotate = &self.rotate;
        if rotate.use_filter && rotate.width > 0 && rotate.degree != 0 {
            chain.push(Transformation::new().width(rotate.width).crop("scale"));
            chain.push(Transformation::new().angle("vflip"));
            chain.push(Transformation::new().angle(rotate.degree));
        }

        chain
    }
}

/// Joins a chain into `t1/t2/...`
pub fn chain_to_path(chain: &[Transformation]) -> String {
    chain
        .iter()
        .filter(|t| !t.is_empty())
        .map(Transformation::to_url_component)
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(req: &EditImageRequest) -> Vec<String> {
        req.transformations()
            .iter()
            .map(Transformation::to_url_component)
            .collect()
    }

    #[test]
    fn test_nothing_selected() {
        assert!(EditImageRequest::default().transformations().is_empty());
    }

    #[test]
    fn test_circle() {
        let mut req = EditImageRequest::default();
        req.circle.use_filter = true;

        assert_eq!(paths(&req), vec!["g_face,h_400,w_400,c_thumb", "r_max"]);
    }

    #[test]
    fn test_circle_with_zero_side_is_skipped() {
        let mut req = EditImageRequest::default();
        req.circle.use_filter = true;
        req.circle.width = 0;

        assert!(req.transformations().is_empty());
    }

    #[test]
    fn test_last_selected_effect_wins() {
        let mut req = EditImageRequest::default();
        req.effect.use_filter = true;
        req.effect.art_audrey = true;
        req.effect.blur = true;

        assert_eq!(paths(&req), vec!["e_blur:300"]);
    }

    #[test]
    fn test_effect_requires_use_filter() {
        let mut req = EditImageRequest::default();
        req.effect.cartoonify = true;

        assert!(req.transformations().is_empty());
    }

    #[test]
    fn test_resize_modes() {
        let mut req = EditImageRequest::default();
        req.resize.use_filter = true;
        req.resize.height = 300;
        req.resize.width = 200;
        assert!(req.transformations().is_empty(), "no mode selected");

        req.resize.crop = true;
        assert_eq!(paths(&req), vec!["g_auto,h_300,w_200,c_crop"]);

        req.resize.fill = true;
        assert_eq!(paths(&req), vec!["g_auto,h_300,w_200,c_fill"]);
    }

    #[test]
    fn test_rotate() {
        let mut req = EditImageRequest::default();
        req.rotate.use_filter = true;
        req.rotate.degree = -90;

        assert_eq!(paths(&req), vec!["w_400,c_scale", "a_vflip", "a_-90"]);
    }

    #[test]
    fn test_full_chain_order() {
        let req: EditImageRequest = serde_json::from_value(serde_json::json!({
            "circle": {"use_filter": true, "height": 300, "width": 300},
            "effect": {"use_filter": true, "art_zorro": true},
            "resize": {"use_filter": true, "crop": true},
            "rotate": {"use_filter": true}
        }))
        .unwrap();

        assert_eq!(
            chain_to_path(&req.transformations()),
            "g_face,h_300,w_300,c_thumb/r_max/e_art:zorro/g_auto,h_400,w_400,c_crop/w_400,c_scale/a_vflip/a_45"
        );
    }

    #[test]
    fn test_degree_validation() {
        let mut req = EditImageRequest::default();
        req.rotate.degree = 400;
        assert!(req.validate().is_err());

        req.rotate.degree = -360;
        assert!(req.validate().is_ok());
    }
}
