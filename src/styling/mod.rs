//! Colormaps and default visual style.

use std::collections::HashMap;
use std::sync::Mutex;

use glam::Vec4;
use once_cell::sync::Lazy;

use crate::error::{Error, Result};

/// User-registered colormaps, consulted by [`ColormapSpec::from_name`]
/// before the built-in library.
static CUSTOM_COLORMAPS: Lazy<Mutex<HashMap<String, ColormapSpec>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Register (or replace) a named colormap process-wide.
pub fn register_colormap(name: &str, spec: ColormapSpec) -> Result<()> {
    spec.validate()?;
    CUSTOM_COLORMAPS
        .lock()
        .unwrap()
        .insert(name.to_string(), spec);
    Ok(())
}

/// A colormap description, before expansion into the 256-entry LUT.
///
/// Either a sequence of uniformly spaced RGB(A) stops, or a per-channel
/// map of (position, value) stops sorted by position.
#[derive(Debug, Clone, PartialEq)]
pub enum ColormapSpec {
    /// 1..=256 uniformly spaced RGBA stops.
    Stops(Vec<Vec4>),
    /// Independent (position, value) stop lists per channel, positions in
    /// [0, 1] ascending.
    Channels {
        red: Vec<(f32, f32)>,
        green: Vec<(f32, f32)>,
        blue: Vec<(f32, f32)>,
        alpha: Vec<(f32, f32)>,
    },
}

impl Default for ColormapSpec {
    fn default() -> Self {
        gray()
    }
}

impl ColormapSpec {
    /// Validate stop counts, positions and finiteness.
    pub fn validate(&self) -> Result<()> {
        match self {
            ColormapSpec::Stops(stops) => {
                if stops.is_empty() || stops.len() > 256 {
                    return Err(Error::validation(format!(
                        "colormap must have 1..=256 stops, got {}",
                        stops.len()
                    )));
                }
                for (i, s) in stops.iter().enumerate() {
                    if !s.is_finite() {
                        return Err(Error::validation(format!(
                            "colormap stop {i} is not finite"
                        )));
                    }
                }
            }
            ColormapSpec::Channels {
                red,
                green,
                blue,
                alpha,
            } => {
                for (name, chan) in [
                    ("red", red),
                    ("green", green),
                    ("blue", blue),
                    ("alpha", alpha),
                ] {
                    if chan.is_empty() {
                        return Err(Error::validation(format!("{name} channel has no stops")));
                    }
                    let mut prev = f32::NEG_INFINITY;
                    for &(pos, val) in chan {
                        if !pos.is_finite() || !val.is_finite() {
                            return Err(Error::validation(format!(
                                "{name} channel has a non-finite stop"
                            )));
                        }
                        if pos < prev {
                            return Err(Error::validation(format!(
                                "{name} channel stops are not sorted by position"
                            )));
                        }
                        prev = pos;
                    }
                }
            }
        }
        Ok(())
    }

    /// Look up a named colormap: user-registered maps first, then the
    /// built-in library.
    pub fn from_name(name: &str) -> Result<ColormapSpec> {
        if let Some(custom) = CUSTOM_COLORMAPS.lock().unwrap().get(name) {
            return Ok(custom.clone());
        }
        let map = match name {
            "gray" | "grey" => gray(),
            "jet" => jet(),
            "hot" => hot(),
            "cool" => cool(),
            "bone" => bone(),
            "copper" => copper(),
            "pink" => pink(),
            "hsv" => hsv(),
            "viridis" => viridis(),
            "summer" => summer(),
            "autumn" => autumn(),
            "winter" => winter(),
            "spring" => spring(),
            _ => {
                return Err(Error::validation(format!("unknown colormap {name:?}")));
            }
        };
        Ok(map)
    }
}

fn stops(rgb: &[(f32, f32, f32)]) -> ColormapSpec {
    ColormapSpec::Stops(rgb.iter().map(|&(r, g, b)| Vec4::new(r, g, b, 1.0)).collect())
}

pub fn gray() -> ColormapSpec {
    stops(&[(0.0, 0.0, 0.0), (1.0, 1.0, 1.0)])
}

pub fn jet() -> ColormapSpec {
    stops(&[
        (0.0, 0.0, 0.5),
        (0.0, 0.0, 1.0),
        (0.0, 1.0, 1.0),
        (1.0, 1.0, 0.0),
        (1.0, 0.0, 0.0),
        (0.5, 0.0, 0.0),
    ])
}

pub fn hot() -> ColormapSpec {
    ColormapSpec::Channels {
        red: vec![(0.0, 0.0), (0.375, 1.0), (1.0, 1.0)],
        green: vec![(0.0, 0.0), (0.375, 0.0), (0.75, 1.0), (1.0, 1.0)],
        blue: vec![(0.0, 0.0), (0.75, 0.0), (1.0, 1.0)],
        alpha: vec![(0.0, 1.0), (1.0, 1.0)],
    }
}

pub fn cool() -> ColormapSpec {
    stops(&[(0.0, 1.0, 1.0), (1.0, 0.0, 1.0)])
}

pub fn bone() -> ColormapSpec {
    ColormapSpec::Channels {
        red: vec![(0.0, 0.0), (0.746, 0.652), (1.0, 1.0)],
        green: vec![(0.0, 0.0), (0.365, 0.319), (0.746, 0.777), (1.0, 1.0)],
        blue: vec![(0.0, 0.0), (0.365, 0.444), (1.0, 1.0)],
        alpha: vec![(0.0, 1.0), (1.0, 1.0)],
    }
}

pub fn copper() -> ColormapSpec {
    ColormapSpec::Channels {
        red: vec![(0.0, 0.0), (0.81, 1.0), (1.0, 1.0)],
        green: vec![(0.0, 0.0), (1.0, 0.78)],
        blue: vec![(0.0, 0.0), (1.0, 0.5)],
        alpha: vec![(0.0, 1.0), (1.0, 1.0)],
    }
}

pub fn pink() -> ColormapSpec {
    stops(&[
        (0.12, 0.0, 0.0),
        (0.76, 0.57, 0.44),
        (0.9, 0.87, 0.69),
        (1.0, 1.0, 1.0),
    ])
}

pub fn hsv() -> ColormapSpec {
    stops(&[
        (1.0, 0.0, 0.0),
        (1.0, 1.0, 0.0),
        (0.0, 1.0, 0.0),
        (0.0, 1.0, 1.0),
        (0.0, 0.0, 1.0),
        (1.0, 0.0, 1.0),
        (1.0, 0.0, 0.0),
    ])
}

pub fn viridis() -> ColormapSpec {
    stops(&[
        (0.267, 0.005, 0.329),
        (0.283, 0.141, 0.458),
        (0.254, 0.265, 0.530),
        (0.207, 0.372, 0.553),
        (0.164, 0.471, 0.558),
        (0.128, 0.567, 0.551),
        (0.135, 0.659, 0.518),
        (0.267, 0.749, 0.441),
        (0.478, 0.821, 0.318),
        (0.741, 0.873, 0.150),
        (0.993, 0.906, 0.144),
    ])
}

pub fn summer() -> ColormapSpec {
    stops(&[(0.0, 0.5, 0.4), (1.0, 1.0, 0.4)])
}

pub fn autumn() -> ColormapSpec {
    stops(&[(1.0, 0.0, 0.0), (1.0, 1.0, 0.0)])
}

pub fn winter() -> ColormapSpec {
    stops(&[(0.0, 0.0, 1.0), (0.0, 1.0, 0.5)])
}

pub fn spring() -> ColormapSpec {
    stops(&[(1.0, 0.0, 1.0), (1.0, 1.0, 0.0)])
}

/// Default figure/axes palette.
#[derive(Debug, Clone)]
pub struct Theme {
    pub figure_background: Vec4,
    pub axes_background: Vec4,
    pub axis_color: Vec4,
    pub grid_color: Vec4,
    pub text_color: Vec4,
    /// Cycled over successive lines in one axes.
    pub line_colors: Vec<Vec4>,
}

impl Default for Theme {
    fn default() -> Self {
        Theme {
            figure_background: Vec4::new(0.8, 0.8, 0.8, 1.0),
            axes_background: Vec4::new(1.0, 1.0, 1.0, 1.0),
            axis_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            grid_color: Vec4::new(0.7, 0.7, 0.7, 0.6),
            text_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            line_colors: vec![
                Vec4::new(0.0, 0.0, 1.0, 1.0),
                Vec4::new(0.0, 0.5, 0.0, 1.0),
                Vec4::new(1.0, 0.0, 0.0, 1.0),
                Vec4::new(0.0, 0.75, 0.75, 1.0),
                Vec4::new(0.75, 0.0, 0.75, 1.0),
                Vec4::new(0.75, 0.75, 0.0, 1.0),
                Vec4::new(0.25, 0.25, 0.25, 1.0),
            ],
        }
    }
}

impl Theme {
    pub fn line_color(&self, index: usize) -> Vec4 {
        self.line_colors[index % self.line_colors.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_maps_resolve() {
        for name in [
            "gray", "jet", "hot", "cool", "bone", "copper", "pink", "hsv", "viridis",
            "summer", "autumn", "winter", "spring",
        ] {
            let map = ColormapSpec::from_name(name).unwrap();
            map.validate().unwrap();
        }
        assert!(ColormapSpec::from_name("plasma9000").is_err());
    }

    #[test]
    fn non_finite_stop_rejected() {
        let spec = ColormapSpec::Stops(vec![Vec4::new(f32::NAN, 0.0, 0.0, 1.0)]);
        assert!(spec.validate().is_err());
    }

    #[test]
    fn registered_colormaps_shadow_builtins() {
        let spec = ColormapSpec::Stops(vec![Vec4::new(0.1, 0.2, 0.3, 1.0)]);
        register_colormap("house-style", spec.clone()).unwrap();
        assert_eq!(ColormapSpec::from_name("house-style").unwrap(), spec);
    }

    #[test]
    fn unsorted_channel_rejected() {
        let spec = ColormapSpec::Channels {
            red: vec![(0.5, 1.0), (0.0, 0.0)],
            green: vec![(0.0, 0.0)],
            blue: vec![(0.0, 0.0)],
            alpha: vec![(0.0, 1.0)],
        };
        assert!(spec.validate().is_err());
    }
}
