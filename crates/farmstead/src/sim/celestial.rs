use std::f32::consts::PI;

use engine::Viewport;
use serde::{Deserialize, Serialize};

pub const HOURS_PER_DAY: f32 = 24.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    fn lerp(self, other: Rgb, t: f32) -> Rgb {
        Rgb {
            r: lerp(self.r, other.r, t),
            g: lerp(self.g, other.g, t),
            b: lerp(self.b, other.b, t),
        }
    }

    pub fn to_hex(self) -> String {
        let channel = |value: f32| value.round().clamp(0.0, 255.0) as u8;
        format!(
            "#{:02x}{:02x}{:02x}",
            channel(self.r),
            channel(self.g),
            channel(self.b)
        )
    }
}

const DEEP_NIGHT: Rgb = Rgb::new(10.0, 12.0, 40.0);
const DAWN: Rgb = Rgb::new(70.0, 60.0, 120.0);
const SUNRISE: Rgb = Rgb::new(250.0, 160.0, 100.0);
const MORNING: Rgb = Rgb::new(140.0, 195.0, 240.0);
const MIDDAY: Rgb = Rgb::new(100.0, 170.0, 255.0);
const AFTERNOON: Rgb = Rgb::new(125.0, 180.0, 240.0);
const SUNSET: Rgb = Rgb::new(250.0, 120.0, 70.0);
const DUSK: Rgb = Rgb::new(80.0, 55.0, 115.0);

/// Hour breakpoints. The last entry repeats the first one day later so the
/// curve closes without a jump at midnight.
const SKY_KEYS: [(f32, Rgb); 10] = [
    (0.0, DEEP_NIGHT),
    (5.0, DAWN),
    (6.0, SUNRISE),
    (9.0, MORNING),
    (12.0, MIDDAY),
    (15.0, AFTERNOON),
    (18.0, SUNSET),
    (19.5, DUSK),
    (21.0, DEEP_NIGHT),
    (24.0, DEEP_NIGHT),
];

const LIGHT_KEYS: [(f32, f32); 10] = [
    (0.0, 0.1),
    (5.0, 0.15),
    (6.0, 0.4),
    (9.0, 0.8),
    (12.0, 1.0),
    (15.0, 0.85),
    (18.0, 0.5),
    (19.5, 0.25),
    (21.0, 0.1),
    (24.0, 0.1),
];

/// Wraps any hour value into `[0, 24)`.
pub fn wrap_hours(hours: f32) -> f32 {
    let wrapped = hours.rem_euclid(HOURS_PER_DAY);
    if wrapped >= HOURS_PER_DAY || !wrapped.is_finite() {
        0.0
    } else {
        wrapped
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

fn sample<T: Copy>(keys: &[(f32, T)], time: f32, mix: impl Fn(T, T, f32) -> T) -> T {
    let time = wrap_hours(time);
    for pair in keys.windows(2) {
        let (start, from) = pair[0];
        let (end, to) = pair[1];
        if time >= start && time < end {
            return mix(from, to, (time - start) / (end - start));
        }
    }
    keys[0].1
}

pub fn sky_color(time_of_day: f32) -> Rgb {
    sample(&SKY_KEYS, time_of_day, Rgb::lerp)
}

/// Scene brightness multiplier in `[0.1, 1.0]`, brightest at noon.
pub fn ambient_light_factor(time_of_day: f32) -> f32 {
    sample(&LIGHT_KEYS, time_of_day, lerp)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CelestialBody {
    pub x: f32,
    pub y: f32,
    pub visible: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CelestialState {
    pub sun: CelestialBody,
    pub moon: CelestialBody,
    pub sky: Rgb,
    pub ambient_light: f32,
}

/// Screen-space arc shared by sun and moon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyArc {
    pub width: f32,
    pub horizon_y: f32,
    pub peak_y: f32,
    pub radius: f32,
}

impl SkyArc {
    pub fn for_viewport(viewport: Viewport, radius: f32) -> Self {
        let height = viewport.height as f32;
        Self {
            width: viewport.width as f32,
            horizon_y: height * 0.7,
            peak_y: height * 0.1,
            radius,
        }
    }

    /// Rises at 6:00, peaks at 12:00, sets at 18:00.
    pub fn sun_at(&self, time_of_day: f32) -> CelestialBody {
        let since_rise = (time_of_day - 6.0).rem_euclid(HOURS_PER_DAY);
        let height = (since_rise / 12.0 * PI).sin();
        let y = self.horizon_y - height * (self.horizon_y - self.peak_y);
        CelestialBody {
            x: since_rise / 12.0 * self.width,
            y,
            visible: y < self.horizon_y + self.radius / 2.0,
        }
    }

    pub fn moon_at(&self, time_of_day: f32) -> CelestialBody {
        self.sun_at(time_of_day + 12.0)
    }
}

pub fn celestial_state(time_of_day: f32, arc: &SkyArc) -> CelestialState {
    CelestialState {
        sun: arc.sun_at(time_of_day),
        moon: arc.moon_at(time_of_day),
        sky: sky_color(time_of_day),
        ambient_light: ambient_light_factor(time_of_day),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Rgb, b: Rgb, tolerance: f32) -> bool {
        (a.r - b.r).abs() <= tolerance
            && (a.g - b.g).abs() <= tolerance
            && (a.b - b.b).abs() <= tolerance
    }

    fn arc() -> SkyArc {
        SkyArc::for_viewport(
            Viewport {
                width: 1280,
                height: 720,
            },
            30.0,
        )
    }

    #[test]
    fn breakpoints_return_named_colours() {
        assert_eq!(sky_color(0.0), DEEP_NIGHT);
        assert_eq!(sky_color(6.0), SUNRISE);
        assert_eq!(sky_color(12.0), MIDDAY);
        assert_eq!(sky_color(19.5), DUSK);
        assert_eq!(ambient_light_factor(12.0), 1.0);
    }

    #[test]
    fn sky_and_light_are_continuous_at_every_breakpoint() {
        let epsilon = 1e-3;
        for (hour, _) in SKY_KEYS {
            let before = sky_color(hour - epsilon);
            let at = sky_color(hour);
            assert!(close(before, at, 0.5), "sky jumps at {hour}: {before:?} vs {at:?}");

            let light_before = ambient_light_factor(hour - epsilon);
            let light_at = ambient_light_factor(hour);
            assert!(
                (light_before - light_at).abs() < 0.01,
                "light jumps at {hour}"
            );
        }
    }

    #[test]
    fn light_stays_in_range_and_peaks_at_noon() {
        let mut hour = 0.0;
        while hour < 24.0 {
            let light = ambient_light_factor(hour);
            assert!((0.1..=1.0).contains(&light), "{light} at {hour}");
            assert!(light <= ambient_light_factor(12.0));
            hour += 0.1;
        }
    }

    #[test]
    fn wrap_hours_stays_in_day() {
        assert_eq!(wrap_hours(24.0), 0.0);
        assert_eq!(wrap_hours(25.5), 1.5);
        assert_eq!(wrap_hours(-1.0), 23.0);
        assert!(wrap_hours(-1e-9) < 24.0);
        assert_eq!(wrap_hours(f32::NAN), 0.0);
    }

    #[test]
    fn sun_peaks_at_noon_and_hides_at_midnight() {
        let arc = arc();
        let noon = arc.sun_at(12.0);
        assert!((noon.y - arc.peak_y).abs() < 1e-3);
        assert!(noon.visible);
        assert!((noon.x - arc.width * 0.5).abs() < 1e-3);

        let midnight = arc.sun_at(0.0);
        assert!(!midnight.visible);
        assert!(midnight.y > arc.horizon_y);
    }

    #[test]
    fn moon_is_half_a_day_out_of_phase() {
        let arc = arc();
        assert_eq!(arc.moon_at(0.0), arc.sun_at(12.0));
        assert!(arc.moon_at(0.0).visible);
        assert!(!arc.moon_at(12.0).visible);
    }

    #[test]
    fn hex_encoding_rounds_channels() {
        assert_eq!(Rgb::new(255.0, 0.4, 16.6).to_hex(), "#ff0011");
    }
}
