//! Colour spaces (PDF 8.6) and their conversion to device colours.
//!
//! Colour management is approximate: calibrated spaces are treated as their
//! device counterparts, ICC profiles fall back to their component count or
//! `/Alternate`, and special spaces without a tint transform evaluator map
//! tints onto gray.

use super::library::Library;
use super::parser::PDFObject;
use crate::rendering::graphics_state::Color;
use log::debug;
use std::sync::Arc;

/// Nesting limit for colour spaces built from other colour spaces.
const MAX_NESTING: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub enum ColorSpace {
    DeviceGray,
    DeviceRGB,
    DeviceCMYK,
    CalGray,
    CalRGB,
    Lab {
        /// `/Range [amin amax bmin bmax]`
        range: [f64; 4],
    },
    ICCBased {
        components: usize,
        alternate: Box<ColorSpace>,
    },
    Indexed {
        base: Box<ColorSpace>,
        hival: usize,
        lookup: Arc<[u8]>,
    },
    Separation {
        name: String,
        alternate: Box<ColorSpace>,
    },
    DeviceN {
        components: usize,
        alternate: Box<ColorSpace>,
    },
    Pattern {
        /// Colour space of uncoloured tiling patterns
        underlying: Option<Box<ColorSpace>>,
    },
}

impl ColorSpace {
    /// Device space named by a bare name, including inline-image
    /// abbreviations. Other names need a resource lookup.
    pub fn from_device_name(name: &str) -> Option<ColorSpace> {
        match name {
            "DeviceGray" | "G" => Some(ColorSpace::DeviceGray),
            "DeviceRGB" | "RGB" => Some(ColorSpace::DeviceRGB),
            "DeviceCMYK" | "CMYK" => Some(ColorSpace::DeviceCMYK),
            "Pattern" => Some(ColorSpace::Pattern { underlying: None }),
            _ => None,
        }
    }

    /// Builds a colour space from a name or a family array.
    pub fn parse(library: &Library, object: &PDFObject) -> Option<ColorSpace> {
        Self::parse_nested(library, object, 0)
    }

    fn parse_nested(library: &Library, object: &PDFObject, depth: usize) -> Option<ColorSpace> {
        if depth > MAX_NESTING {
            debug!("colour space nesting too deep");
            return None;
        }
        let object = library.resolve(object);
        if let Some(name) = object.as_name() {
            return Self::from_device_name(name).or_else(|| match name {
                "CalGray" => Some(ColorSpace::CalGray),
                "CalRGB" => Some(ColorSpace::CalRGB),
                _ => None,
            });
        }

        let items = object.as_array()?;
        let family = library.resolve(items.first()?).as_name()?;
        let param = |index: usize| items.get(index).map(|o| library.resolve(o));
        let nested = |index: usize| {
            items
                .get(index)
                .and_then(|o| Self::parse_nested(library, o, depth + 1))
        };

        match family {
            "DeviceGray" | "G" | "DeviceRGB" | "RGB" | "DeviceCMYK" | "CMYK" => {
                Self::from_device_name(family)
            }
            "CalGray" => Some(ColorSpace::CalGray),
            "CalRGB" => Some(ColorSpace::CalRGB),
            "Lab" => {
                let range = param(1)
                    .and_then(|d| d.as_dict())
                    .and_then(|d| library.get_number_array(d, "Range"))
                    .and_then(|r| <[f64; 4]>::try_from(r.get(..4)?).ok())
                    .unwrap_or([-100.0, 100.0, -100.0, 100.0]);
                Some(ColorSpace::Lab { range })
            }
            "ICCBased" => {
                let dict = param(1)?.as_dict()?;
                let declared = library.get_int(dict, "N");
                let alternate = library
                    .get_object(dict, "Alternate")
                    .and_then(|a| Self::parse_nested(library, a, depth + 1));
                let components = declared
                    .map(|n| n.clamp(1, 4) as usize)
                    .or_else(|| alternate.as_ref().map(|a| a.components()))
                    .unwrap_or(3);
                let alternate = alternate
                    .filter(|a| a.components() == components)
                    .unwrap_or_else(|| Self::device_for_components(components));
                Some(ColorSpace::ICCBased {
                    components,
                    alternate: Box::new(alternate),
                })
            }
            "Indexed" | "I" => {
                let base = nested(1)?;
                let hival = param(2)?.as_i64()?.clamp(0, 255) as usize;
                let lookup: Arc<[u8]> = match param(3)? {
                    PDFObject::Stream(stream) => {
                        library.decode_stream(stream).ok()?.data.clone().into()
                    }
                    other => other.as_bytes()?.into(),
                };
                Some(ColorSpace::Indexed {
                    base: Box::new(base),
                    hival,
                    lookup,
                })
            }
            "Separation" => Some(ColorSpace::Separation {
                name: param(1)?.as_name().unwrap_or_default().to_string(),
                alternate: Box::new(nested(2).unwrap_or(ColorSpace::DeviceGray)),
            }),
            "DeviceN" => Some(ColorSpace::DeviceN {
                components: param(1)?.as_array()?.len().max(1),
                alternate: Box::new(nested(2).unwrap_or(ColorSpace::DeviceGray)),
            }),
            "Pattern" => Some(ColorSpace::Pattern {
                underlying: nested(1).map(Box::new),
            }),
            other => {
                debug!("unknown colour space family /{}", other);
                None
            }
        }
    }

    fn device_for_components(components: usize) -> ColorSpace {
        match components {
            1 => ColorSpace::DeviceGray,
            4 => ColorSpace::DeviceCMYK,
            _ => ColorSpace::DeviceRGB,
        }
    }

    /// Number of colour components an operand list must supply.
    pub fn components(&self) -> usize {
        match self {
            ColorSpace::DeviceGray
            | ColorSpace::CalGray
            | ColorSpace::Indexed { .. }
            | ColorSpace::Separation { .. } => 1,
            ColorSpace::DeviceRGB | ColorSpace::CalRGB | ColorSpace::Lab { .. } => 3,
            ColorSpace::DeviceCMYK => 4,
            ColorSpace::ICCBased { components, .. } | ColorSpace::DeviceN { components, .. } => {
                *components
            }
            ColorSpace::Pattern { underlying } => {
                underlying.as_ref().map_or(0, |space| space.components())
            }
        }
    }

    /// Colour selected when the space is set (PDF 8.6.8, table 73).
    pub fn initial_color(&self) -> Color {
        match self {
            ColorSpace::DeviceCMYK => Color::CMYK(0.0, 0.0, 0.0, 1.0),
            ColorSpace::DeviceRGB | ColorSpace::CalRGB => Color::RGB(0.0, 0.0, 0.0),
            ColorSpace::Lab { .. } => self.convert(&[0.0, 0.0, 0.0]),
            ColorSpace::ICCBased { alternate, .. } => alternate.initial_color(),
            ColorSpace::Indexed { .. } => self.convert(&[0.0]),
            // Tint 1.0 is full colorant.
            ColorSpace::Separation { .. } => Color::Gray(0.0),
            ColorSpace::DeviceN { components, .. } => self.convert(&vec![1.0; *components]),
            _ => Color::black(),
        }
    }

    /// Converts operands to a colour; a wrong number of components yields
    /// the initial colour.
    pub fn to_color(&self, components: &[f64]) -> Color {
        if components.len() != self.components() {
            debug!(
                "{} components given for a {}-component colour space",
                components.len(),
                self.components()
            );
            return self.initial_color();
        }
        self.convert(components)
    }

    fn convert(&self, c: &[f64]) -> Color {
        match self {
            ColorSpace::DeviceGray | ColorSpace::CalGray => Color::Gray(c[0]),
            ColorSpace::DeviceRGB | ColorSpace::CalRGB => Color::RGB(c[0], c[1], c[2]),
            ColorSpace::DeviceCMYK => Color::CMYK(c[0], c[1], c[2], c[3]),
            ColorSpace::Lab { range } => lab_to_rgb(
                c[0],
                c[1].max(range[0]).min(range[1]),
                c[2].max(range[2]).min(range[3]),
            ),
            ColorSpace::ICCBased { alternate, .. } => alternate.convert(c),
            ColorSpace::Indexed {
                base,
                hival,
                lookup,
            } => {
                let index = (c[0].round().max(0.0) as usize).min(*hival);
                let n = base.components();
                let start = index * n;
                match lookup.get(start..start + n) {
                    Some(entry) => {
                        let values: Vec<f64> = entry.iter().map(|&b| b as f64 / 255.0).collect();
                        base.convert(&values)
                    }
                    None => base.initial_color(),
                }
            }
            ColorSpace::Separation { .. } => Color::Gray(1.0 - c[0].clamp(0.0, 1.0)),
            ColorSpace::DeviceN { .. } => {
                let coverage = c.iter().map(|v| v.clamp(0.0, 1.0)).fold(0.0, f64::max);
                Color::Gray(1.0 - coverage)
            }
            ColorSpace::Pattern { underlying } => underlying
                .as_ref()
                .map_or(Color::black(), |space| space.convert(c)),
        }
    }

    /// Default `/Decode` range for image samples in this space.
    pub fn default_decode(&self, bits_per_component: u32) -> Vec<f64> {
        match self {
            ColorSpace::Indexed { .. } => vec![0.0, ((1u32 << bits_per_component) - 1) as f64],
            ColorSpace::Lab { range } => vec![0.0, 100.0, range[0], range[1], range[2], range[3]],
            _ => [0.0, 1.0].repeat(self.components().max(1)),
        }
    }
}

/// CIE L*a*b* (D65 white) to sRGB.
fn lab_to_rgb(l: f64, a: f64, b: f64) -> Color {
    let fy = (l + 16.0) / 116.0;
    let fx = fy + a / 500.0;
    let fz = fy - b / 200.0;
    let inv = |t: f64| {
        if t > 6.0 / 29.0 {
            t * t * t
        } else {
            3.0 * (6.0f64 / 29.0).powi(2) * (t - 4.0 / 29.0)
        }
    };
    let (x, y, z) = (0.9505 * inv(fx), inv(fy), 1.089 * inv(fz));
    let r = 3.2406 * x - 1.5372 * y - 0.4986 * z;
    let g = -0.9689 * x + 1.8758 * y + 0.0415 * z;
    let bl = 0.0557 * x - 0.2040 * y + 1.0570 * z;
    let gamma = |v: f64| {
        let v = v.clamp(0.0, 1.0);
        if v <= 0.003_130_8 {
            12.92 * v
        } else {
            1.055 * v.powf(1.0 / 2.4) - 0.055
        }
    };
    Color::RGB(gamma(r), gamma(g), gamma(bl))
}
