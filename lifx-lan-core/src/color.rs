//! The HSBK color model, and conversions between protocol units, human units and RGB.
//!
//! On the wire every channel is a u16 spanning 0–65535.  People think of hue in degrees and of
//! saturation and brightness as percentages, so [HSBK] offers accessors in those units.  The
//! conversion rounds, which means a value written in human units and read back may move by one
//! unit of protocol resolution (65535/360 for hue, 65535/100 for saturation and brightness).
//!
//! RGB is derived from hue/saturation/brightness with a plain HSV transform on the normalized
//! channels.  RGB components are scaled by 256, matching what existing LIFX tooling produces
//! for the same wire values.

/// Bulb color (Hue-Saturation-Brightness-Kelvin)
///
/// # Notes:
///
/// Colors are represented as Hue-Saturation-Brightness-Kelvin, or HSBK
///
/// When a light is displaying whites, saturation will be zero, hue will be ignored, and only
/// brightness and kelvin will matter.
///
/// Normal values for "kelvin" are from 2500 (warm/yellow) to 9000 (cool/blue)
///
/// When a light is displaying colors, kelvin is ignored.
///
/// To display "pure" colors, set saturation to full (65535).
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct HSBK {
    pub hue: u16,
    pub saturation: u16,
    pub brightness: u16,
    pub kelvin: u16,
}

const MAX: f64 = 65535.0;
const RGB_SCALE: f64 = 256.0;

fn to_human(raw: u16, range: f64) -> f64 {
    (f64::from(raw) / MAX * range).round()
}

fn to_protocol(value: f64, range: f64) -> u16 {
    (value.clamp(0.0, range) / range * MAX).round() as u16
}

impl HSBK {
    /// Builds a color from an RGB triple and a color temperature.
    pub fn from_rgb(rgb: (u8, u8, u8), kelvin: u16) -> HSBK {
        let mut color = HSBK {
            kelvin,
            ..HSBK::default()
        };
        color.set_rgb(rgb);
        color
    }

    /// Hue in degrees, 0–360.
    pub fn hue_degrees(&self) -> f64 {
        to_human(self.hue, 360.0)
    }

    pub fn set_hue_degrees(&mut self, degrees: f64) {
        self.hue = to_protocol(degrees, 360.0);
    }

    /// Saturation in percent, 0–100.
    pub fn saturation_percent(&self) -> f64 {
        to_human(self.saturation, 100.0)
    }

    pub fn set_saturation_percent(&mut self, percent: f64) {
        self.saturation = to_protocol(percent, 100.0);
    }

    /// Brightness in percent, 0–100.
    pub fn brightness_percent(&self) -> f64 {
        to_human(self.brightness, 100.0)
    }

    pub fn set_brightness_percent(&mut self, percent: f64) {
        self.brightness = to_protocol(percent, 100.0);
    }

    /// The RGB rendering of hue, saturation and brightness.  Kelvin plays no part.
    pub fn rgb(&self) -> (u8, u8, u8) {
        let (r, g, b) = hsv_to_rgb(
            f64::from(self.hue) / MAX,
            f64::from(self.saturation) / MAX,
            f64::from(self.brightness) / MAX,
        );
        let scale = |c: f64| (c * RGB_SCALE).round().min(255.0) as u8;
        (scale(r), scale(g), scale(b))
    }

    /// Sets hue, saturation and brightness from an RGB triple, leaving kelvin alone.
    pub fn set_rgb(&mut self, rgb: (u8, u8, u8)) {
        let (r, g, b) = rgb;
        let (h, s, v) = rgb_to_hsv(
            f64::from(r) / RGB_SCALE,
            f64::from(g) / RGB_SCALE,
            f64::from(b) / RGB_SCALE,
        );
        // truncation, not rounding
        self.hue = (h * MAX) as u16;
        self.saturation = (s * MAX) as u16;
        self.brightness = (v * MAX) as u16;
    }

    pub fn describe(&self, short: bool) -> String {
        match short {
            true if self.saturation == 0 => format!("{}K", self.kelvin),
            true => format!(
                "{:.0}/{:.0}",
                self.hue_degrees(),
                self.saturation_percent()
            ),
            false if self.saturation == 0 => format!(
                "{:.0}% White ({})",
                self.brightness_percent(),
                describe_kelvin(self.kelvin)
            ),
            false => format!(
                "{:.0}% hue: {:.0} sat: {:.0}",
                self.brightness_percent(),
                self.hue_degrees(),
                self.saturation_percent()
            ),
        }
    }
}

impl std::fmt::Display for HSBK {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "hue: {}, saturation: {}, brightness: {}, kelvin: {}, rgb: {:?}",
            self.hue_degrees(),
            self.saturation_percent(),
            self.brightness_percent(),
            self.kelvin,
            self.rgb()
        )
    }
}

/// Describe (in english words) the color temperature as given in kelvin.
///
/// These descriptions match the values shown in the LIFX mobile app.
pub fn describe_kelvin(k: u16) -> &'static str {
    match k {
        0..=2500 => "Ultra Warm",
        2501..=2700 => "Incandescent",
        2701..=3000 => "Warm",
        3001..=3200 => "Neutral Warm",
        3201..=3500 => "Neutral",
        3501..=4000 => "Cool",
        4001..=4500 => "Cool Daylight",
        4501..=5000 => "Soft Daylight",
        5001..=5500 => "Daylight",
        5501..=6000 => "Noon Daylight",
        6001..=6500 => "Bright Daylight",
        6501..=7000 => "Cloudy Daylight",
        7001..=7500 => "Blue Daylight",
        7501..=8000 => "Blue Overcast",
        8001..=8500 => "Blue Water",
        _ => "Blue Ice",
    }
}

/// HSV to RGB on normalized channels (all inputs and outputs in 0.0–1.0).
pub fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (f64, f64, f64) {
    if s == 0.0 {
        return (v, v, v);
    }
    let i = (h * 6.0).trunc();
    let f = h * 6.0 - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match (i as i64).rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    }
}

/// RGB to HSV on normalized channels (all inputs and outputs in 0.0–1.0).
pub fn rgb_to_hsv(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    let maxc = r.max(g).max(b);
    let minc = r.min(g).min(b);
    let v = maxc;
    if minc == maxc {
        return (0.0, 0.0, v);
    }
    let range = maxc - minc;
    let s = range / maxc;
    let rc = (maxc - r) / range;
    let gc = (maxc - g) / range;
    let bc = (maxc - b) / range;
    let h = if r == maxc {
        bc - gc
    } else if g == maxc {
        2.0 + rc - bc
    } else {
        4.0 + gc - rc
    };
    ((h / 6.0).rem_euclid(1.0), s, v)
}
